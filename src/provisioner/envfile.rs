//! Rendering and reading of the per-instance `KEY=VALUE` configuration
//! artifact bound into each container.

use std::{fmt::Write as _, fs, io, path::Path};

use crate::common::InstanceRecord;

/// Key carrying the display name, also used when rediscovering the working
/// set from env files.
pub const DISPLAY_NAME_KEY: &str = "STRATEGY_EXECUTOR_DISPLAY_NAME";

/// Render an instance record into env-file form. Proxy fields are only
/// present when the instance has a proxy assigned.
pub fn render(record: &InstanceRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ENV={}", record.environment);
    let _ = writeln!(out, "{DISPLAY_NAME_KEY}={}", record.display_name);
    let _ = writeln!(out, "STRATEGY_EXECUTOR_BENEFICIARY={}", record.beneficiary);
    let _ = writeln!(out, "SIGNER_PRIVATE_KEY={}", record.signing_key);

    if let Some(proxy) = &record.proxy {
        let _ = writeln!(out, "PROXY_USER={}", proxy.user);
        let _ = writeln!(out, "PROXY_PASS={}", proxy.pass);
        let _ = writeln!(out, "PROXY_IP={}", proxy.host);
        let _ = writeln!(out, "PROXY_PORT={}", proxy.port);
        let _ = writeln!(out, "STRATEGY_EXECUTOR_IP_ADDRESS={}", proxy.host);
    }

    out
}

/// Persist an instance record as an env file at the given path.
pub fn write(path: &Path, record: &InstanceRecord) -> io::Result<()> {
    fs::write(path, render(record))
}

/// Read an env file back into ordered key/value pairs.
pub fn read(path: &Path) -> io::Result<Vec<(String, String)>> {
    Ok(parse(&fs::read_to_string(path)?))
}

/// Parse env-file content into ordered key/value pairs. Blank lines and
/// `#` comments are skipped.
pub fn parse(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Look up the first value for a key among parsed pairs.
pub fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}
