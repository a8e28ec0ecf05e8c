//! CLI Handling module

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    collector::collect,
    config::ReportConfig,
    inventory::load_device_list,
    ssh::{Credentials, SshConnector},
};

/// Environment variable consulted before prompting for the SSH password.
pub const PASSWORD_ENV: &str = "SSH_PASSWORD";
/// Environment variable holding the passphrase for an encrypted key file.
pub const KEY_PASSPHRASE_ENV: &str = "SSH_KEY_PASSPHRASE";

/// cardreport - compact-flash health report for SR OS routers
#[derive(Parser)]
#[command(name = "cardreport")]
#[command(
    about = "Collects card and file-list output from SR OS routers and renders a flash health report"
)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Enable debug logging (shows full device output and SSH authentication details)
    #[arg(short, long)]
    debug: bool,

    /// Path to the thresholds/configuration file
    #[arg(short = 'c', long = "config", default_value = "cardreport.json")]
    config_path: PathBuf,

    /// Newline-delimited list of devices to visit
    #[arg(short = 'f', long = "devices", default_value = "my_routers.txt")]
    devices_path: PathBuf,

    /// Directory the reports are written to
    #[arg(short, long = "output-dir", default_value = ".")]
    output_dir: PathBuf,

    /// SSH username (prompted for if neither this nor the config file sets one)
    #[arg(short, long)]
    username: Option<String>,

    /// SSH private key file to try before the password
    #[arg(short, long)]
    keyfile: Option<String>,

    /// SSH port used when ~/.ssh/config does not set one
    #[arg(short, long)]
    port: Option<u16>,

    /// Connection and command timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Also write a JSON summary next to the HTML report
    #[arg(long)]
    json: bool,

    /// Do not prompt for a password (key-based authentication only)
    #[arg(long)]
    no_password: bool,

    /// Write the effective configuration to --config and exit
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    /// Applies command line overrides on top of the file configuration.
    fn apply_to(&self, config: &mut ReportConfig) {
        if let Some(ref username) = self.username {
            config.username = Some(username.clone());
        }
        if let Some(ref keyfile) = self.keyfile {
            config.ssh_key_path = Some(keyfile.clone());
        }
        if let Some(port) = self.port {
            config.ssh_port = port;
        }
        if let Some(timeout) = self.timeout {
            config.ssh_timeout_seconds = timeout;
        }
    }
}

fn prompt_username() -> io::Result<Option<String>> {
    print!("Username: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let username = line.trim();
    Ok((!username.is_empty()).then(|| username.to_string()))
}

fn gather_credentials(
    config: &ReportConfig,
    no_password: bool,
) -> Result<Credentials, Box<dyn std::error::Error>> {
    let username = match config.username.clone() {
        Some(username) => Some(username),
        None => prompt_username()?,
    };

    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => Some(password),
        Err(_) if no_password => None,
        Err(_) => Some(rpassword::prompt_password("Password: ")?),
    };

    Ok(Credentials {
        username,
        password,
        key_path: config.ssh_key_path.clone(),
        key_passphrase: std::env::var(KEY_PASSPHRASE_ENV).ok(),
    })
}

pub async fn main_func() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let cli = Cli::parse();

    let env_filter_str = if cli.debug { "debug" } else { "info" };

    let env_filter = EnvFilter::new(format!(
        "{env_filter_str},russh::client=info,russh::sshbuffer=info"
    ));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(cli.debug)
                .with_thread_ids(false)
                .with_level(true),
        )
        .with(env_filter)
        .init();

    let mut config = ReportConfig::load_or_default(&cli.config_path)?;
    cli.apply_to(&mut config);
    config.validate()?;

    if cli.write_config {
        config.save_to_file(&cli.config_path)?;
        info!("Wrote configuration to {}", cli.config_path.display());
        return Ok(());
    }

    let hosts = load_device_list(&cli.devices_path)?;
    info!(
        "Found {} device(s) in {}",
        hosts.len(),
        cli.devices_path.display()
    );

    let credentials = gather_credentials(&config, cli.no_password)?;
    if credentials.password.is_none() && credentials.key_path.is_none() {
        warn!("No password or key file given, relying on IdentityFile entries in ~/.ssh/config");
    }

    let connector = SshConnector::new(config.ssh_port, config.read_idle());
    let data = collect(&connector, &hosts, &credentials, &config).await;

    data.write_artifacts(&cli.output_dir, &config.outputs, cli.json)?;

    println!("\n{}", data.summary_text());

    Ok(())
}
