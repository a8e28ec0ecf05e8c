use std::{collections::HashMap, time::Duration};

use crate::{
    brand::{CardInspector, nokia::SrosCard},
    collector::collect,
    config::{OutputFiles, ReportConfig},
    inventory::{load_device_list, parse_device_list},
    ssh::{Connector, Credentials, RemoteSession, SshError},
    *,
};

/// Replays canned command output for a fixed set of lab devices.
struct LabSession {
    outputs: HashMap<&'static str, String>,
}

impl RemoteSession for LabSession {
    async fn send(&mut self, command: &str) -> Result<String, SshError> {
        self.outputs
            .get(command)
            .cloned()
            .ok_or_else(|| SshError::Command(format!("unexpected command {command}")))
    }

    async fn disconnect(self) {}
}

struct LabConnector {
    card_detail: String,
}

impl LabConnector {
    fn new() -> Self {
        Self {
            card_detail: std::fs::read_to_string("src/tests/sros_card_detail.txt")
                .expect("Failed to read"),
        }
    }
}

impl Connector for LabConnector {
    type Session = LabSession;

    async fn open(
        &self,
        host: &str,
        credentials: &Credentials,
        _timeout: Duration,
    ) -> Result<LabSession, SshError> {
        if credentials.password.as_deref() != Some("lab") {
            return Err(SshError::Authentication(
                "All authentication methods failed".to_string(),
            ));
        }

        let card_detail = match host {
            "pe1-lab" => self.card_detail.clone(),
            // Same chassis with the cf3 card pulled from the active CPM
            "pe2-lab" => self
                .card_detail
                .replace(
                    "Flash - cf3:\n    Administrative State          : up\n    Operational state             : up",
                    "Flash - cf3:\n    Administrative State          : up\n    Operational state             : not equipped",
                ),
            _ => {
                return Err(SshError::Connection(format!(
                    "{host}: no route to host"
                )));
            }
        };

        let mut outputs = HashMap::new();
        outputs.insert(SrosCard::CARD_DETAIL_COMMAND, card_detail);
        outputs.insert(
            SrosCard::FILE_LIST_COMMAND,
            format!("file list | no-more\n\nVolume in drive cf3 on slot A is {host}.\n"),
        );
        Ok(LabSession { outputs })
    }
}

fn lab_credentials() -> Credentials {
    Credentials {
        username: Some("admin".to_string()),
        password: Some("lab".to_string()),
        ..Credentials::default()
    }
}

#[tokio::test]
async fn test_full_run_over_lab_devices() {
    setup_test_logging();

    let hosts = parse_device_list("# lab\npe1-lab\npe9-lab\npe2-lab\n");
    let data = collect(
        &LabConnector::new(),
        &hosts,
        &lab_credentials(),
        &ReportConfig::default(),
    )
    .await;

    assert_eq!(data.unreachable, vec!["pe9-lab"]);
    assert_eq!(data.summary.len(), 2);

    let pe1 = &data.summary[0];
    assert_eq!(pe1.device, "pe1-lab");
    assert_eq!(pe1.cf2.size, FieldStatus::new("3904 MB", true));
    assert_eq!(pe1.cf3.percent_used, FieldStatus::new("74 %", false));
    assert_eq!(pe1.cf3.state, FieldStatus::new("up", true));

    let pe2 = &data.summary[1];
    assert_eq!(pe2.device, "pe2-lab");
    assert_eq!(pe2.cf3.state, FieldStatus::new("not equipped", false));
    assert_eq!(
        data.not_equipped,
        vec![NotEquipped {
            host: "pe2-lab".to_string(),
            slots: vec![FlashSlot::Cf3],
        }]
    );

    assert_eq!(data.raw_card.len(), 2);
    assert!(data.raw_card[0].starts_with("=== pe1-lab ===\nshow card detail | no-more"));
    assert!(data.raw_files[1].contains("slot A is pe2-lab"));

    let html = data.render_html().expect("Failed to render");
    assert!(html.contains("<td>pe1-lab</td>"));
    assert!(html.contains("<td class=\"fail\">74 % ⚠️</td>"));
    assert!(html.contains("<td class=\"warn\">not equipped ⚠️</td>"));
    assert!(html.contains("<li>pe9-lab</li>"));
    assert!(html.contains("<li>pe2-lab: cf3</li>"));

    assert_eq!(
        data.summary_text(),
        "=== SUMMARY ===\nUnreachable: pe9-lab\nNot-Equipped: pe2-lab(cf3)"
    );
}

#[tokio::test]
async fn test_bad_credentials_mark_every_device_unreachable() {
    let credentials = Credentials {
        password: Some("wrong".to_string()),
        ..lab_credentials()
    };
    let hosts = parse_device_list("pe1-lab\npe2-lab\n");
    let data = collect(
        &LabConnector::new(),
        &hosts,
        &credentials,
        &ReportConfig::default(),
    )
    .await;

    assert_eq!(data.unreachable, vec!["pe1-lab", "pe2-lab"]);
    assert!(data.summary.is_empty());
    assert_eq!(data.render_card_dump(), "");
}

#[tokio::test]
async fn test_stricter_thresholds_flip_verdicts() {
    let mut config = ReportConfig::default();
    config.thresholds.percent_used_ceiling = 80;
    config.thresholds.cf2.expected_size_mb = 4096;

    let hosts = parse_device_list("pe1-lab\n");
    let data = collect(&LabConnector::new(), &hosts, &lab_credentials(), &config).await;

    let pe1 = &data.summary[0];
    assert_eq!(pe1.cf3.percent_used, FieldStatus::new("74 %", true));
    assert_eq!(pe1.cf2.size, FieldStatus::new("3904 MB", false));
}

#[tokio::test]
async fn test_run_writes_all_artifacts() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let hosts = parse_device_list("pe1-lab\npe2-lab\n");
    let data = collect(
        &LabConnector::new(),
        &hosts,
        &lab_credentials(),
        &ReportConfig::default(),
    )
    .await;

    let files = OutputFiles::default();
    data.write_artifacts(dir.path(), &files, true)
        .expect("Failed to write artifacts");

    let card_report =
        std::fs::read_to_string(dir.path().join(&files.card_report)).expect("Failed to read");
    assert!(card_report.starts_with("=== pe1-lab ===\n"));
    assert!(card_report.contains("\n=== pe2-lab ===\n"));

    let file_lists =
        std::fs::read_to_string(dir.path().join(&files.file_lists)).expect("Failed to read");
    assert_eq!(file_lists.matches("=== ").count(), 2);

    let summary: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(&files.json_summary)).expect("Failed to read"),
    )
    .expect("Invalid JSON");
    assert_eq!(summary["summary"].as_array().map(Vec::len), Some(2));
    assert_eq!(summary["not_equipped"][0]["host"], "pe2-lab");
}

#[tokio::test]
async fn test_commented_out_device_list_still_writes_reports() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let devices = dir.path().join("my_routers.txt");
    std::fs::write(&devices, "# all routers disabled\n\n").expect("Failed to write device list");

    let hosts = load_device_list(&devices).expect("Failed to load device list");
    assert!(hosts.is_empty());

    let data = collect(
        &LabConnector::new(),
        &hosts,
        &lab_credentials(),
        &ReportConfig::default(),
    )
    .await;

    let files = OutputFiles::default();
    let written = data
        .write_artifacts(dir.path(), &files, false)
        .expect("Failed to write artifacts");
    assert_eq!(written.len(), 3);
    assert_eq!(
        std::fs::read_to_string(dir.path().join(&files.card_report)).expect("Failed to read"),
        ""
    );
    let html =
        std::fs::read_to_string(dir.path().join(&files.html_report)).expect("Failed to read");
    assert!(html.contains("<th>CF2 Size</th>"));
    assert!(!html.contains("<li>"));
    assert_eq!(
        data.summary_text(),
        "=== SUMMARY ===\nUnreachable: None\nNot-Equipped: None"
    );
}
