use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    CardReportError, FlashSlot,
    brand::{CardInspector, nokia::SrosCard},
};

pub const DEFAULT_CARD_COMMAND: &str = SrosCard::CARD_DETAIL_COMMAND;
pub const DEFAULT_FILE_LIST_COMMAND: &str = SrosCard::FILE_LIST_COMMAND;
pub const MAX_SSH_TIMEOUT_SECONDS: u64 = 3600;
pub const MAX_READ_IDLE_MS: u64 = 60_000;

/// Expected capacity of a flash slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotExpectation {
    pub expected_size_mb: u64,
    pub tolerance_mb: u64,
}

impl SlotExpectation {
    pub fn size_ok(&self, size_mb: u64) -> bool {
        size_mb.abs_diff(self.expected_size_mb) <= self.tolerance_mb
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub cf2: SlotExpectation,
    pub cf3: SlotExpectation,
    /// Utilisation must stay strictly below this percentage.
    pub percent_used_ceiling: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cf2: SlotExpectation {
                expected_size_mb: 3904,
                tolerance_mb: 1,
            },
            cf3: SlotExpectation {
                expected_size_mb: 7800,
                tolerance_mb: 1,
            },
            percent_used_ceiling: 60,
        }
    }
}

impl Thresholds {
    pub fn expectation(&self, slot: FlashSlot) -> SlotExpectation {
        match slot {
            FlashSlot::Cf2 => self.cf2,
            FlashSlot::Cf3 => self.cf3,
        }
    }

    pub fn percent_ok(&self, percent_used: u64) -> bool {
        percent_used < self.percent_used_ceiling
    }
}

/// File names of the generated artifacts, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFiles {
    pub card_report: String,
    pub file_lists: String,
    pub html_report: String,
    pub json_summary: String,
}

impl Default for OutputFiles {
    fn default() -> Self {
        Self {
            card_report: "card_report.txt".to_string(),
            file_lists: "file_lists.txt".to_string(),
            html_report: "report.html".to_string(),
            json_summary: "summary.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub thresholds: Thresholds,
    pub ssh_timeout_seconds: u64,
    /// How long a shell must stay quiet before a command's output is considered complete.
    pub read_idle_ms: u64,
    pub ssh_port: u16,
    pub username: Option<String>,
    pub ssh_key_path: Option<String>,
    pub card_command: String,
    pub file_list_command: String,
    pub outputs: OutputFiles,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            ssh_timeout_seconds: 120,
            read_idle_ms: 2000,
            ssh_port: 22,
            username: None,
            ssh_key_path: None,
            card_command: DEFAULT_CARD_COMMAND.to_string(),
            file_list_command: DEFAULT_FILE_LIST_COMMAND.to_string(),
            outputs: OutputFiles::default(),
        }
    }
}

impl ReportConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CardReportError> {
        let content = fs::read_to_string(path)?;
        let config: ReportConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config if the file exists, otherwise falls back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, CardReportError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(
                "Config file '{}' not found, using default thresholds",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_file(path).map_err(|err| {
            CardReportError::Config(format!(
                "config file '{}' exists but cannot be loaded: {err}",
                path.display()
            ))
        })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CardReportError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CardReportError> {
        if !(1..=MAX_SSH_TIMEOUT_SECONDS).contains(&self.ssh_timeout_seconds) {
            return Err(CardReportError::Config(format!(
                "ssh_timeout_seconds must be between 1 and {MAX_SSH_TIMEOUT_SECONDS}"
            )));
        }
        if !(1..=MAX_READ_IDLE_MS).contains(&self.read_idle_ms) {
            return Err(CardReportError::Config(format!(
                "read_idle_ms must be between 1 and {MAX_READ_IDLE_MS}"
            )));
        }
        if self.ssh_port == 0 {
            return Err(CardReportError::Config(
                "ssh_port must be greater than zero".to_string(),
            ));
        }
        if self.card_command.trim().is_empty() || self.file_list_command.trim().is_empty() {
            return Err(CardReportError::Config(
                "card_command and file_list_command cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ssh_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh_timeout_seconds)
    }

    pub fn read_idle(&self) -> Duration {
        Duration::from_millis(self.read_idle_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_default_thresholds() {
        let thresholds = Thresholds::default();
        assert_eq!(thresholds.cf2.expected_size_mb, 3904);
        assert_eq!(thresholds.cf3.expected_size_mb, 7800);
        assert_eq!(thresholds.cf2.tolerance_mb, 1);
        assert_eq!(thresholds.cf3.tolerance_mb, 1);
        assert_eq!(thresholds.percent_used_ceiling, 60);
    }

    #[test]
    fn test_size_tolerance_is_inclusive() {
        let cf2 = Thresholds::default().expectation(FlashSlot::Cf2);
        assert!(cf2.size_ok(3904));
        assert!(cf2.size_ok(3903));
        assert!(cf2.size_ok(3905));
        assert!(!cf2.size_ok(3902));
        assert!(!cf2.size_ok(3906));
        assert!(!cf2.size_ok(0));
    }

    #[test]
    fn test_percent_ceiling_is_exclusive() {
        let thresholds = Thresholds::default();
        assert!(thresholds.percent_ok(0));
        assert!(thresholds.percent_ok(59));
        assert!(!thresholds.percent_ok(60));
        assert!(!thresholds.percent_ok(100));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        write!(
            file,
            r#"{{"ssh_timeout_seconds": 30, "thresholds": {{"percent_used_ceiling": 80}}}}"#
        )
        .expect("Failed to write temp file");

        let config = ReportConfig::load_from_file(file.path()).expect("Failed to load config");
        assert_eq!(config.ssh_timeout_seconds, 30);
        assert_eq!(config.thresholds.percent_used_ceiling, 80);
        assert_eq!(config.thresholds.cf3.expected_size_mb, 7800);
        assert_eq!(config.card_command, DEFAULT_CARD_COMMAND);
        assert_eq!(config.outputs.html_report, "report.html");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        write!(file, "{{ not json").expect("Failed to write temp file");

        let result = ReportConfig::load_or_default(file.path());
        assert!(matches!(result, Err(CardReportError::Config(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = ReportConfig::load_or_default(dir.path().join("absent.json"))
            .expect("Missing config should not be an error");
        assert_eq!(config, ReportConfig::default());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        write!(file, r#"{{"ssh_timeout_seconds": 0}}"#).expect("Failed to write temp file");

        let result = ReportConfig::load_from_file(file.path());
        assert!(matches!(result, Err(CardReportError::Config(_))));
    }

    #[test]
    fn test_out_of_range_timings_rejected() {
        let huge_timeout = ReportConfig {
            ssh_timeout_seconds: u64::MAX,
            ..ReportConfig::default()
        };
        assert!(matches!(
            huge_timeout.validate(),
            Err(CardReportError::Config(_))
        ));

        let no_idle = ReportConfig {
            read_idle_ms: 0,
            ..ReportConfig::default()
        };
        assert!(matches!(no_idle.validate(), Err(CardReportError::Config(_))));

        let limits = ReportConfig {
            ssh_timeout_seconds: MAX_SSH_TIMEOUT_SECONDS,
            read_idle_ms: MAX_READ_IDLE_MS,
            ..ReportConfig::default()
        };
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("cardreport.json");

        let config = ReportConfig {
            username: Some("admin".to_string()),
            ssh_port: 2222,
            ..ReportConfig::default()
        };
        config.save_to_file(&path).expect("Failed to save config");

        let loaded = ReportConfig::load_from_file(&path).expect("Failed to load config");
        assert_eq!(loaded, config);
        assert_eq!(loaded.ssh_timeout(), Duration::from_secs(120));
        assert_eq!(loaded.read_idle(), Duration::from_millis(2000));
    }
}
