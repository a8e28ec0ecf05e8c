#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::ssh::SshError;

pub mod brand;
pub mod cli;
pub mod collector;
pub mod config;
pub mod inventory;
pub mod report;
pub mod ssh;
#[cfg(test)]
mod tests;

/// Value shown for a field that never appeared in the device output.
pub const NOT_AVAILABLE: &str = "n/a";

/// Compact-flash slots the report tracks on each CPM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashSlot {
    Cf2,
    Cf3,
}

impl FlashSlot {
    pub const ALL: [FlashSlot; 2] = [FlashSlot::Cf2, FlashSlot::Cf3];

    /// Maps a slot label such as `cf3` or `CF3` to a tracked slot.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "cf2" => Some(FlashSlot::Cf2),
            "cf3" => Some(FlashSlot::Cf3),
            _ => None,
        }
    }
}

impl Display for FlashSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlashSlot::Cf2 => write!(f, "cf2"),
            FlashSlot::Cf3 => write!(f, "cf3"),
        }
    }
}

/// A single reported value together with its pass/fail verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldStatus {
    pub value: String,
    pub ok: bool,
}

impl Default for FieldStatus {
    fn default() -> Self {
        Self {
            value: NOT_AVAILABLE.to_string(),
            ok: false,
        }
    }
}

impl FieldStatus {
    pub fn new(value: impl Into<String>, ok: bool) -> Self {
        Self {
            value: value.into(),
            ok,
        }
    }

    pub fn is_not_equipped(&self) -> bool {
        self.value.to_lowercase().contains("not equip")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotReport {
    pub size: FieldStatus,
    pub percent_used: FieldStatus,
    pub state: FieldStatus,
}

/// Parsed flash health for one device, one row of the HTML table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device: String,
    pub cf2: SlotReport,
    pub cf3: SlotReport,
}

impl DeviceRecord {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            cf2: SlotReport::default(),
            cf3: SlotReport::default(),
        }
    }

    pub fn slot(&self, slot: FlashSlot) -> &SlotReport {
        match slot {
            FlashSlot::Cf2 => &self.cf2,
            FlashSlot::Cf3 => &self.cf3,
        }
    }

    pub fn slot_mut(&mut self, slot: FlashSlot) -> &mut SlotReport {
        match slot {
            FlashSlot::Cf2 => &mut self.cf2,
            FlashSlot::Cf3 => &mut self.cf3,
        }
    }
}

/// A host whose card output reported one or more flash slots as not equipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotEquipped {
    pub host: String,
    pub slots: Vec<FlashSlot>,
}

impl NotEquipped {
    pub fn slot_list(&self) -> String {
        self.slots
            .iter()
            .map(|slot| slot.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug)]
pub enum CardReportError {
    Config(String),
    Io(std::io::Error),
    Regex(regex::Error),
    Serde(String),
    Ssh(SshError),
    Template(askama::Error),
}

impl From<SshError> for CardReportError {
    fn from(err: SshError) -> Self {
        CardReportError::Ssh(err)
    }
}

impl From<std::io::Error> for CardReportError {
    fn from(err: std::io::Error) -> Self {
        CardReportError::Io(err)
    }
}

impl From<serde_json::Error> for CardReportError {
    fn from(err: serde_json::Error) -> Self {
        CardReportError::Serde(err.to_string())
    }
}

impl From<regex::Error> for CardReportError {
    fn from(err: regex::Error) -> Self {
        CardReportError::Regex(err)
    }
}

impl From<askama::Error> for CardReportError {
    fn from(err: askama::Error) -> Self {
        CardReportError::Template(err)
    }
}

impl std::fmt::Display for CardReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardReportError::Config(error) => write!(f, "Config error: {error}"),
            CardReportError::Io(error) => write!(f, "IO error: {error}"),
            CardReportError::Regex(error) => write!(f, "Regex error: {error}"),
            CardReportError::Serde(error) => write!(f, "Serde error: {error}"),
            CardReportError::Ssh(error) => write!(f, "SSH error: {error}"),
            CardReportError::Template(error) => write!(f, "Template error: {error}"),
        }
    }
}

impl std::error::Error for CardReportError {}

#[cfg(test)]
pub(crate) fn setup_test_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_test_writer()
                .with_level(true),
        )
        .with(tracing_subscriber::EnvFilter::new("debug"))
        .try_init();
}
