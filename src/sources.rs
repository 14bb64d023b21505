use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use tracing::debug;

use crate::{
    common::SourceError,
    config::{FleetConfig, IdentitySource},
};

/// Aligned credential lists loaded from flat files.
///
/// Each file holds one entry per line; entries are aligned by line number
/// across files. Order is preserved and duplicates are kept.
#[derive(Debug, Clone, Default)]
pub struct CredentialSources {
    /// Display names, one per instance.
    pub names: Vec<String>,
    /// Beneficiary addresses, one per instance.
    pub beneficiaries: Vec<String>,
    /// Signing keys, one per instance.
    pub keys: Vec<String>,
    /// Proxy descriptors. May be shorter than the fleet; reused cyclically.
    pub proxies: Vec<String>,
}

impl CredentialSources {
    /// Load every configured source file.
    ///
    /// The names file is only required when display names come from the list;
    /// the proxies file is only read when one is configured.
    pub fn load(config: &FleetConfig) -> Result<Self, SourceError> {
        let names = if matches!(config.identity_source, IdentitySource::List) {
            read_lines(&config.names_file)?
        } else {
            Vec::new()
        };
        let beneficiaries = read_lines(&config.beneficiaries_file)?;
        let keys = read_lines(&config.keys_file)?;
        let proxies = match &config.proxies_file {
            Some(path) => read_lines(path)?,
            None => Vec::new(),
        };

        debug!(
            names = names.len(),
            beneficiaries = beneficiaries.len(),
            keys = keys.len(),
            proxies = proxies.len(),
            "Loaded credential sources"
        );

        Ok(Self { names, beneficiaries, keys, proxies })
    }

    /// Check that every required list covers the requested instance count.
    ///
    /// The proxy list is exempt: it is reused cyclically instead.
    pub fn ensure_counts(&self, requested: usize, names_required: bool) -> Result<(), SourceError> {
        let mut required = vec![("beneficiaries", &self.beneficiaries), ("keys", &self.keys)];
        if names_required {
            required.push(("names", &self.names));
        }

        for (source, list) in required {
            if list.len() < requested {
                return Err(SourceError::InsufficientEntries {
                    src: source.to_string(),
                    have: list.len(),
                    need: requested,
                });
            }
        }

        Ok(())
    }

    /// The raw proxy descriptor for an instance index, reusing the list
    /// cyclically: `proxies[(index - 1) % len]`. `None` when no proxies are
    /// configured.
    pub fn proxy_for(&self, index: u32) -> Option<&str> {
        if self.proxies.is_empty() {
            return None;
        }

        let slot = (index as usize - 1) % self.proxies.len();
        Some(self.proxies[slot].as_str())
    }
}

/// Read a flat source file into an ordered list, one entry per line.
/// Blank lines are skipped; surrounding whitespace is trimmed.
fn read_lines(path: &Path) -> Result<Vec<String>, SourceError> {
    if !path.exists() {
        return Err(SourceError::MissingSource(path.to_path_buf()));
    }

    let io_err = |err| SourceError::Io { path: path.to_path_buf(), err };
    let file = BufReader::new(File::open(path).map_err(io_err)?);

    let mut entries = Vec::new();
    for line in file.lines() {
        let line = line.map_err(io_err)?;
        let entry = line.trim();
        if !entry.is_empty() {
            entries.push(entry.to_string());
        }
    }

    Ok(entries)
}
