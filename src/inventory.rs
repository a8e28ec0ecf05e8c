//! Device list ingestion

use std::{fs, path::Path};

use tracing::{debug, warn};

use crate::CardReportError;

/// Extracts hostnames from a newline-delimited device list.
///
/// Blank lines and lines starting with `#` are skipped. Order and duplicates are preserved.
pub fn parse_device_list(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

pub fn load_device_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>, CardReportError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let hosts = parse_device_list(&content);
    debug!("Read {} device(s) from {}", hosts.len(), path.display());
    if hosts.is_empty() {
        warn!("No devices listed in {}, reports will be empty", path.display());
    }
    Ok(hosts)
}
