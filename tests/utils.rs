use std::path::Path;

use armada::{FleetConfig, InMemoryRuntime, Provisioner};

/// Write a flat source file with one entry per line.
pub fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> eyre::Result<()> {
    let mut content = lines.iter().map(|line| line.as_ref()).collect::<Vec<_>>().join("\n");
    content.push('\n');
    std::fs::write(path, content)?;
    Ok(())
}

/// A fleet config rooted in the given scratch directory.
pub fn fleet_config(dir: &Path) -> FleetConfig {
    FleetConfig {
        state_dir: dir.join("fleet"),
        names_file: dir.join("names.txt"),
        beneficiaries_file: dir.join("beneficiaries.txt"),
        keys_file: dir.join("keys.txt"),
        image: "example/strategy-executor:latest".to_string(),
        ..FleetConfig::default()
    }
}

/// Seed aligned names / beneficiaries / keys files with `count` entries.
pub fn seed_sources(config: &FleetConfig, count: usize) -> eyre::Result<()> {
    let names: Vec<String> = (1..=count).map(|i| format!("name-{i}")).collect();
    let beneficiaries: Vec<String> = (1..=count).map(|i| format!("0xbene{i}")).collect();
    let keys: Vec<String> = (1..=count).map(|i| format!("0xkey{i}")).collect();

    write_lines(&config.names_file, &names)?;
    write_lines(&config.beneficiaries_file, &beneficiaries)?;
    write_lines(&config.keys_file, &keys)?;
    Ok(())
}

/// A provisioner over a fresh in-memory runtime.
pub fn provisioner(config: FleetConfig) -> Provisioner<InMemoryRuntime> {
    Provisioner::new(config, InMemoryRuntime::new())
}
