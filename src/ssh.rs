use std::{path::PathBuf, sync::Arc, time::Duration};

use russh::keys::{PrivateKeyWithHashAlg, decode_secret_key};
use russh::{Channel, ChannelMsg, Disconnect, client, keys::ssh_key};

use ssh_config::SSHConfig;
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

#[derive(Debug, Clone)]
pub enum AuthMethod {
    KeyFile {
        path: String,
        passphrase: Option<String>,
    },
    Password(String),
}

/// What the operator supplied for logging in to every device.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub key_path: Option<String>,
    pub key_passphrase: Option<String>,
}

#[derive(Debug)]
pub struct SshConnectionInfo {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub timeout: Duration,
    pub read_idle: Duration,
    pub successful_auth: Option<AuthMethod>,
}

pub struct SshClient {
    connection_info: SshConnectionInfo,
    session: Option<client::Handle<ClientHandler>>,
    shell: Option<Channel<client::Msg>>,
}

#[derive(Debug)]
pub enum SshError {
    Connection(String),
    Authentication(String),
    Command(String),
    Timeout,
}

impl std::fmt::Display for SshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SshError::Connection(msg) => write!(f, "Connection error: {}", msg),
            SshError::Authentication(msg) => write!(f, "Authentication error: {}", msg),
            SshError::Command(msg) => write!(f, "Command error: {}", msg),
            SshError::Timeout => write!(f, "Operation timed out"),
        }
    }
}

impl std::error::Error for SshError {}

/// A logged-in session that can run CLI commands on one device.
pub trait RemoteSession {
    fn send(&mut self, command: &str) -> impl Future<Output = Result<String, SshError>> + Send;
    fn disconnect(self) -> impl Future<Output = ()> + Send;
}

/// Opens [`RemoteSession`]s to devices by hostname.
pub trait Connector {
    type Session: RemoteSession + Send;

    fn open(
        &self,
        host: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Session, SshError>> + Send;
}

// Handler for russh client
#[derive(Clone)]
struct ClientHandler;

impl client::Handler for ClientHandler {
    type Error = russh::Error;
    #[allow(unused_variables)]
    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Per-host values found in `~/.ssh/config`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSettings {
    pub hostname: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub identity_file: Option<String>,
}

impl HostSettings {
    pub fn from_ssh_config(config_text: &str, host: &str) -> Result<Self, SshError> {
        let ssh_config = SSHConfig::parse_str(config_text)
            .map_err(|e| SshError::Connection(format!("Failed to parse SSH config: {:?}", e)))?;
        let host_config = ssh_config.query(host);

        let lookup = |key: &str| {
            host_config
                .get(key)
                .or_else(|| host_config.get(key.to_lowercase().as_str()))
                .map(|value| value.to_string())
        };

        let port = match lookup("Port") {
            Some(port) => Some(port.trim().parse::<u16>().map_err(|e| {
                SshError::Connection(format!("Invalid Port '{}' for {}: {}", port, host, e))
            })?),
            None => None,
        };

        Ok(Self {
            hostname: lookup("HostName"),
            user: lookup("User"),
            port,
            identity_file: lookup("IdentityFile").map(|path| expand_home(&path)),
        })
    }
}

fn expand_home(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home_dir) = dirs::home_dir()
    {
        return home_dir.join(stripped).to_string_lossy().to_string();
    }
    path.to_string()
}

fn load_ssh_config_text() -> Option<&'static str> {
    let ssh_config_path: PathBuf = dirs::home_dir()?.join(".ssh").join("config");

    match std::fs::read_to_string(&ssh_config_path) {
        Ok(config_content) => Some(Box::leak(config_content.into_boxed_str())),
        Err(e) => {
            debug!(
                "No SSH config loaded from {}: {}",
                ssh_config_path.display(),
                e
            );
            None
        }
    }
}

/// Connects to devices over SSH, honouring `~/.ssh/config` where present.
pub struct SshConnector {
    port: u16,
    read_idle: Duration,
    ssh_config: Option<&'static str>,
}

impl SshConnector {
    pub fn new(port: u16, read_idle: Duration) -> Self {
        Self {
            port,
            read_idle,
            ssh_config: load_ssh_config_text(),
        }
    }

    fn host_settings(&self, host: &str) -> HostSettings {
        match self.ssh_config {
            Some(text) => HostSettings::from_ssh_config(text, host).unwrap_or_else(|e| {
                warn!("Ignoring SSH config for {}: {}", host, e);
                HostSettings::default()
            }),
            None => HostSettings::default(),
        }
    }
}

impl Connector for SshConnector {
    type Session = SshClient;

    async fn open(
        &self,
        host: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<SshClient, SshError> {
        let settings = self.host_settings(host);

        let username = credentials
            .username
            .clone()
            .or(settings.user)
            .ok_or_else(|| {
                SshError::Authentication(format!("No username for {} (CLI, config or SSH config)", host))
            })?;
        let address = settings.hostname.unwrap_or_else(|| host.to_string());
        let port = settings.port.unwrap_or(self.port);
        let key_path = credentials.key_path.clone().or(settings.identity_file);

        debug!("Connecting to {} as {} ({}:{})", host, username, address, port);

        let mut client = SshClient::new(address, port, username, timeout, self.read_idle);
        tokio::time::timeout(timeout, async {
            client
                .discover_auth_method(
                    credentials.password.as_deref(),
                    key_path.as_deref(),
                    credentials.key_passphrase.as_deref(),
                )
                .await?;
            client.open_shell().await
        })
        .await
        .map_err(|_| SshError::Timeout)??;

        Ok(client)
    }
}

impl SshClient {
    pub fn new(
        host: String,
        port: u16,
        username: String,
        timeout: Duration,
        read_idle: Duration,
    ) -> Self {
        Self {
            connection_info: SshConnectionInfo {
                host,
                port,
                username,
                timeout,
                read_idle,
                successful_auth: None,
            },
            session: None,
            shell: None,
        }
    }

    pub fn connection_info(&self) -> &SshConnectionInfo {
        &self.connection_info
    }

    async fn create_session(&self) -> Result<client::Handle<ClientHandler>, SshError> {
        let mut config = client::Config::default();

        // SR OS releases in the field still negotiate older key exchanges
        config.preferred.kex = vec![
            russh::kex::CURVE25519,
            russh::kex::DH_G14_SHA256,
            russh::kex::DH_G16_SHA512,
            russh::kex::ECDH_SHA2_NISTP256,
            russh::kex::ECDH_SHA2_NISTP384,
            russh::kex::ECDH_SHA2_NISTP521,
            russh::kex::DH_G14_SHA1,
        ]
        .into();

        let handler = ClientHandler;

        let session = client::connect(
            Arc::new(config),
            (
                self.connection_info.host.as_str(),
                self.connection_info.port,
            ),
            handler,
        )
        .await
        .map_err(|e| SshError::Connection(e.to_string()))?;

        Ok(session)
    }

    async fn discover_auth_method(
        &mut self,
        password: Option<&str>,
        key_path: Option<&str>,
        key_passphrase: Option<&str>,
    ) -> Result<(), SshError> {
        let mut session = self.create_session().await?;

        let auth_methods = vec![
            key_path.map(|path| AuthMethod::KeyFile {
                path: path.to_string(),
                passphrase: key_passphrase.map(String::from),
            }),
            password.map(|pwd| AuthMethod::Password(pwd.to_string())),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

        for auth_method in auth_methods {
            if self
                .authenticate_session(&mut session, &auth_method)
                .await?
            {
                self.connection_info.successful_auth = Some(auth_method);
                self.session = Some(session);
                return Ok(());
            }
        }

        Err(SshError::Authentication(
            "All authentication methods failed".to_string(),
        ))
    }

    async fn authenticate_session(
        &self,
        session: &mut client::Handle<ClientHandler>,
        auth_method: &AuthMethod,
    ) -> Result<bool, SshError> {
        match auth_method {
            AuthMethod::KeyFile { path, passphrase } => {
                let Some(private_key) = load_private_key(path, passphrase.as_deref()) else {
                    return Ok(false);
                };
                let expanded_path = shellexpand::tilde(path);

                let key_with_hash = PrivateKeyWithHashAlg::new(Arc::new(private_key), None);

                match session
                    .authenticate_publickey(&self.connection_info.username, key_with_hash)
                    .await
                {
                    Ok(result) => {
                        let success = matches!(result, russh::client::AuthResult::Success);
                        if success {
                            debug!("Authenticated via key file: {}", expanded_path);
                        } else {
                            warn!("Key file authentication failed: {}", expanded_path);
                        }
                        Ok(success)
                    }
                    Err(e) => {
                        error!("Key file authentication error: {}", e);
                        Ok(false)
                    }
                }
            }
            AuthMethod::Password(password) => {
                match session
                    .authenticate_password(&self.connection_info.username, password)
                    .await
                {
                    Ok(result) => {
                        let success = matches!(result, russh::client::AuthResult::Success);
                        if success {
                            debug!("Authenticated via password");
                        } else {
                            debug!("Password authentication failed");
                        }
                        Ok(success)
                    }
                    Err(e) => {
                        debug!("Password authentication error: {}", e);
                        Ok(false)
                    }
                }
            }
        }
    }

    /// Starts an interactive shell and drains the login banner.
    async fn open_shell(&mut self) -> Result<(), SshError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| SshError::Authentication("No session available".to_string()))?;

        let mut channel = session.channel_open_session().await.map_err(|e| {
            SshError::Command(format!("Failed to create channel: {}", e))
        })?;
        channel
            .request_pty(false, "vt100", 511, 24, 0, 0, &[])
            .await
            .map_err(|e| SshError::Command(format!("Failed to request PTY: {}", e)))?;
        channel
            .request_shell(false)
            .await
            .map_err(|e| SshError::Command(format!("Failed to start shell: {}", e)))?;

        let banner = read_until_idle(
            &mut channel,
            self.connection_info.read_idle,
            self.connection_info.timeout,
        )
        .await?;
        trace!("Discarded {} bytes of login banner", banner.len());

        self.shell = Some(channel);
        Ok(())
    }

    /// Writes a command to the shell and returns everything echoed back until the
    /// session goes quiet, prompt and command echo included.
    pub async fn execute_command(&mut self, command: &str) -> Result<String, SshError> {
        debug!("Executing command: {}", command);

        let channel = self
            .shell
            .as_mut()
            .ok_or_else(|| SshError::Command("No shell channel open".to_string()))?;

        channel
            .data(format!("{}\n", command).as_bytes())
            .await
            .map_err(|e| SshError::Command(format!("Failed to send '{}': {}", command, e)))?;

        let output = read_until_idle(
            channel,
            self.connection_info.read_idle,
            self.connection_info.timeout,
        )
        .await?;

        let output = String::from_utf8_lossy(&output).to_string();
        debug!(
            "Command '{}' completed with {} bytes output",
            command,
            output.len()
        );
        Ok(output)
    }

    pub async fn close(mut self) {
        if let Some(channel) = self.shell.take()
            && let Err(e) = channel.close().await
        {
            debug!("Failed to close shell channel: {}", e);
        }
        if let Some(session) = self.session.take()
            && let Err(e) = session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
        {
            debug!(
                "Failed to disconnect from {}: {}",
                self.connection_info.host, e
            );
        }
    }
}

impl RemoteSession for SshClient {
    async fn send(&mut self, command: &str) -> Result<String, SshError> {
        self.execute_command(command).await
    }

    async fn disconnect(self) {
        self.close().await
    }
}

/// Reads and decrypts a private key, or `None` when it cannot be used.
fn load_private_key(path: &str, passphrase: Option<&str>) -> Option<ssh_key::PrivateKey> {
    let expanded_path = shellexpand::tilde(path);
    let key_path_buf = std::path::Path::new(expanded_path.as_ref());

    if !key_path_buf.exists() {
        debug!("SSH key file does not exist: {}", expanded_path);
        return None;
    }

    let key_data = match std::fs::read_to_string(key_path_buf) {
        Ok(data) => data,
        Err(e) => {
            debug!("Failed to read key file {}: {}", expanded_path, e);
            return None;
        }
    };

    if key_data.trim().is_empty() {
        debug!("Key file {} is empty", expanded_path);
        return None;
    }

    let is_encrypted_pem =
        key_data.contains("Proc-Type: 4,ENCRYPTED") || key_data.contains("DEK-Info:");
    if is_encrypted_pem && passphrase.is_none() {
        warn!(
            "Key {} is encrypted, set SSH_KEY_PASSPHRASE to use it",
            expanded_path
        );
        return None;
    }

    match decode_secret_key(&key_data, passphrase) {
        Ok(key) => Some(key),
        Err(e) => {
            debug!("Failed to decode key {}: {}", expanded_path, e);
            None
        }
    }
}

/// Collects channel output until nothing arrives for `idle`.
///
/// Before the first byte arrives only `limit` applies, so slow commands are not cut short.
async fn read_until_idle(
    channel: &mut Channel<client::Msg>,
    idle: Duration,
    limit: Duration,
) -> Result<Vec<u8>, SshError> {
    let deadline = Instant::now()
        .checked_add(limit)
        .ok_or_else(|| SshError::Command(format!("Read limit {:?} is out of range", limit)))?;
    let mut buffer = Vec::new();

    loop {
        let now = Instant::now();
        if now >= deadline {
            if buffer.is_empty() {
                error!("No output received within {:?}", limit);
                return Err(SshError::Timeout);
            }
            warn!("Output still arriving after {:?}, returning what we have", limit);
            break;
        }
        let remaining = deadline - now;
        let wait = if buffer.is_empty() {
            remaining
        } else {
            idle.min(remaining)
        };

        match tokio::time::timeout(wait, channel.wait()).await {
            Err(_) => {
                if buffer.is_empty() {
                    error!("No output received within {:?}", limit);
                    return Err(SshError::Timeout);
                }
                break;
            }
            Ok(Some(ChannelMsg::Data { data })) => {
                buffer.extend_from_slice(&data);
                trace!("Read {} bytes (total: {})", data.len(), buffer.len());
            }
            Ok(Some(ChannelMsg::ExtendedData { data, ext: 1 })) => {
                buffer.extend_from_slice(&data);
                trace!("Read {} bytes from stderr (total: {})", data.len(), buffer.len());
            }
            Ok(Some(ChannelMsg::Eof)) | Ok(Some(ChannelMsg::Close)) | Ok(None) => {
                debug!("Shell channel closed by device");
                if buffer.is_empty() {
                    return Err(SshError::Command("Shell closed by device".to_string()));
                }
                break;
            }
            Ok(Some(other)) => {
                trace!("Received other channel message: {:?}", other);
            }
        }
    }

    Ok(buffer)
}
