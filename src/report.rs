//! Renders the collected results into the raw dumps, the HTML table and the console summary.

use std::{
    fs,
    path::{Path, PathBuf},
};

use askama::Template;
use serde::Serialize;
use tracing::info;

use crate::{CardReportError, DeviceRecord, FieldStatus, FlashSlot, NotEquipped, config::OutputFiles};

pub const REPORT_TITLE: &str = "CF Card Summary";

/// Everything gathered during one run, in device visit order.
#[derive(Debug, Default, Serialize)]
pub struct ReportData {
    pub summary: Vec<DeviceRecord>,
    pub unreachable: Vec<String>,
    pub not_equipped: Vec<NotEquipped>,
    #[serde(skip)]
    pub raw_card: Vec<String>,
    #[serde(skip)]
    pub raw_files: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellClass {
    Ok,
    Warn,
    Fail,
}

impl CellClass {
    pub fn for_field(field: &FieldStatus) -> Self {
        if field.is_not_equipped() {
            CellClass::Warn
        } else if field.ok {
            CellClass::Ok
        } else {
            CellClass::Fail
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            CellClass::Ok => "ok",
            CellClass::Warn => "warn",
            CellClass::Fail => "fail",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            CellClass::Ok => "✅",
            CellClass::Warn | CellClass::Fail => "⚠️",
        }
    }
}

struct StatusCell<'a> {
    value: &'a str,
    css_class: &'static str,
    icon: &'static str,
}

impl<'a> From<&'a FieldStatus> for StatusCell<'a> {
    fn from(field: &'a FieldStatus) -> Self {
        let class = CellClass::for_field(field);
        Self {
            value: &field.value,
            css_class: class.css_class(),
            icon: class.icon(),
        }
    }
}

struct SummaryRow<'a> {
    device: &'a str,
    cells: Vec<StatusCell<'a>>,
}

impl<'a> From<&'a DeviceRecord> for SummaryRow<'a> {
    fn from(record: &'a DeviceRecord) -> Self {
        let mut cells = Vec::with_capacity(FlashSlot::ALL.len() * 3);
        for slot in FlashSlot::ALL {
            let report = record.slot(slot);
            cells.extend([&report.size, &report.percent_used, &report.state].map(StatusCell::from));
        }
        Self {
            device: &record.device,
            cells,
        }
    }
}

#[derive(Template)]
#[template(path = "report.html")]
struct SummaryTemplate<'a> {
    title: &'static str,
    generated_at: String,
    rows: Vec<SummaryRow<'a>>,
    unreachable: &'a [String],
    not_equipped: Vec<String>,
}

impl ReportData {
    pub fn render_html(&self) -> Result<String, CardReportError> {
        let template = SummaryTemplate {
            title: REPORT_TITLE,
            generated_at: chrono::Utc::now().to_rfc3339(),
            rows: self.summary.iter().map(SummaryRow::from).collect(),
            unreachable: &self.unreachable,
            not_equipped: self
                .not_equipped
                .iter()
                .map(|entry| format!("{}: {}", entry.host, entry.slot_list()))
                .collect(),
        };
        Ok(template.render()?)
    }

    pub fn render_card_dump(&self) -> String {
        self.raw_card.join("\n")
    }

    pub fn render_file_list_dump(&self) -> String {
        self.raw_files.join("\n")
    }

    pub fn render_json(&self) -> Result<String, CardReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The end-of-run summary printed to the console.
    pub fn summary_text(&self) -> String {
        let unreachable = if self.unreachable.is_empty() {
            "None".to_string()
        } else {
            self.unreachable.join(", ")
        };
        let not_equipped = if self.not_equipped.is_empty() {
            "None".to_string()
        } else {
            self.not_equipped
                .iter()
                .map(|entry| format!("{}({})", entry.host, entry.slot_list()))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!("=== SUMMARY ===\nUnreachable: {unreachable}\nNot-Equipped: {not_equipped}")
    }

    /// Writes the raw dumps and the HTML report, plus the JSON summary when asked.
    pub fn write_artifacts(
        &self,
        output_dir: &Path,
        files: &OutputFiles,
        include_json: bool,
    ) -> Result<Vec<PathBuf>, CardReportError> {
        fs::create_dir_all(output_dir)?;

        let mut artifacts = vec![
            (output_dir.join(&files.card_report), self.render_card_dump()),
            (
                output_dir.join(&files.file_lists),
                self.render_file_list_dump(),
            ),
            (output_dir.join(&files.html_report), self.render_html()?),
        ];
        if include_json {
            artifacts.push((output_dir.join(&files.json_summary), self.render_json()?));
        }

        let mut written = Vec::with_capacity(artifacts.len());
        for (path, content) in artifacts {
            fs::write(&path, content)?;
            info!("→ {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}
