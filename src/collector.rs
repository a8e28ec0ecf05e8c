//! Visits each device in turn and gathers everything the report needs.

use tracing::{debug, error, info, warn};

use crate::{
    NotEquipped,
    brand::{CardInspector, nokia::SrosCard},
    config::ReportConfig,
    report::ReportData,
    ssh::{Connector, Credentials, RemoteSession, SshError},
};

/// Sends one command and echoes it, and every output line, to the log.
async fn send_logged<S: RemoteSession>(
    session: &mut S,
    host: &str,
    command: &str,
) -> Result<String, SshError> {
    let output = session.send(command).await?;
    info!("[{host}] $ {command}");
    for line in output.lines() {
        debug!("[{host}] {line}");
    }
    Ok(output)
}

fn raw_entry(host: &str, output: &str) -> String {
    format!("=== {host} ===\n{output}\n")
}

/// Runs the card and file-list commands on one connected device.
async fn inspect_device<S: RemoteSession>(
    session: &mut S,
    host: &str,
    config: &ReportConfig,
    data: &mut ReportData,
) -> Result<(), crate::CardReportError> {
    let card_output = send_logged(session, host, &config.card_command).await?;
    data.raw_card.push(raw_entry(host, &card_output));

    let mut parser = SrosCard::new(host.to_string(), config.thresholds.clone());
    parser.parse_card_detail(&card_output)?;
    if !parser.missing_slots().is_empty() {
        let missing = NotEquipped {
            host: host.to_string(),
            slots: parser.missing_slots().to_vec(),
        };
        warn!("[{host}] flash not equipped: {}", missing.slot_list());
        data.not_equipped.push(missing);
    }
    data.summary.push(parser.build());

    let file_output = send_logged(session, host, &config.file_list_command).await?;
    data.raw_files.push(raw_entry(host, &file_output));

    Ok(())
}

/// Visits `hosts` strictly one at a time.
///
/// A host that cannot be reached, or whose session fails part-way, is listed as
/// unreachable and the loop moves on. Output already gathered for it is kept.
pub async fn collect<C: Connector>(
    connector: &C,
    hosts: &[String],
    credentials: &Credentials,
    config: &ReportConfig,
) -> ReportData {
    let mut data = ReportData::default();
    let timeout = config.ssh_timeout();

    for host in hosts {
        info!("=== {host} ===");

        let mut session = match connector.open(host, credentials, timeout).await {
            Ok(session) => session,
            Err(e) => {
                error!("{host} unreachable: {e}");
                data.unreachable.push(host.clone());
                continue;
            }
        };

        if let Err(e) = inspect_device(&mut session, host, config, &mut data).await {
            error!("{host} failed during collection: {e}");
            data.unreachable.push(host.clone());
        }

        session.disconnect().await;
    }

    info!(
        "Collected {} device(s), {} unreachable, {} with missing flash",
        data.summary.len(),
        data.unreachable.len(),
        data.not_equipped.len()
    );
    data
}
