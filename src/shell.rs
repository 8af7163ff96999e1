//! Password-authenticated remote shell over SSH.
//!
//! Host keys are accepted without verification. Every transport and session
//! opened here is released again on both the success and the failure path.

use crate::device::Device;
use russh::{
    client::{
        self,
        Handle,
    },
    keys::ssh_key::PublicKey,
    ChannelMsg,
    Disconnect,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::time::timeout;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShellError {
    #[error("operation timed out: {0}")]
    Timeout(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("failed to establish SSH connection: {0}")]
    Connect(String),
    #[error("failed to create session: {0}")]
    Session(String),
    #[error("command execution failed: {0}")]
    Execution(String),
}

impl ShellError {
    /// Labels a connection failure from its text. Only used for reporting.
    pub fn classify(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let lowered = detail.to_lowercase();
        if lowered.contains("timeout") || lowered.contains("timed out") {
            Self::Timeout(detail)
        } else if lowered.contains("authentication") {
            Self::Auth(detail)
        } else {
            Self::Connect(detail)
        }
    }
}

/// Accepts any server host key.
struct AcceptAnyHostKey;

impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(&mut self, _server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Captured output of one remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Combined stdout and stderr, trailing whitespace removed.
    pub text: String,
    pub exit_status: Option<u32>,
}

impl CommandOutput {
    /// Fails unless the command reported exit status zero.
    pub fn ensure_success(self) -> Result<String, ShellError> {
        match self.exit_status {
            Some(0) => Ok(self.text),
            Some(status) => Err(ShellError::Execution(format!("process exited with status {status}"))),
            None => Err(ShellError::Execution(
                "remote command exited without exit status".to_string(),
            )),
        }
    }
}

/// An authenticated transport to one device.
pub struct ShellClient {
    handle: Handle<AcceptAnyHostKey>,
    target: String,
    timeout: Duration,
}

impl ShellClient {
    /// TCP connect, handshake and password authentication, bounded by `limit`.
    #[instrument(level = "debug", skip_all, fields(device = device.id, ip = %device.ip))]
    pub async fn connect(device: &Device, limit: Duration) -> Result<Self, ShellError> {
        let (ip, port) = device.address();
        let target = format!("{ip}:{port}");

        let attempt = async {
            let config = Arc::new(client::Config::default());
            let mut handle = client::connect(config, (ip, port), AcceptAnyHostKey)
                .await
                .map_err(|err| err.to_string())?;
            let auth = handle
                .authenticate_password(
                    device.credentials.username.as_str(),
                    device.credentials.password.as_str(),
                )
                .await
                .map_err(|err| err.to_string())?;
            if !auth.success() {
                return Err(format!(
                    "authentication rejected for user {:?}",
                    device.credentials.username
                ));
            }
            Ok(handle)
        };

        let handle = match timeout(limit, attempt).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(detail)) => return Err(ShellError::classify(detail)),
            Err(_) => {
                return Err(ShellError::classify(format!(
                    "timeout after {limit:?} connecting to {target}"
                )))
            }
        };
        debug!(addr = %target, "ssh transport established");

        Ok(Self {
            handle,
            target,
            timeout: limit,
        })
    }

    pub async fn open_session(&self) -> Result<ShellSession, ShellError> {
        let channel = timeout(self.timeout, self.handle.channel_open_session())
            .await
            .map_err(|_| ShellError::Session(format!("timeout after {:?}", self.timeout)))?
            .map_err(|err| ShellError::Session(err.to_string()))?;
        Ok(ShellSession {
            channel,
            timeout: self.timeout,
        })
    }

    /// Runs `command` in its own session. The session is closed afterwards
    /// whatever the outcome.
    pub async fn execute(&self, command: &str) -> Result<CommandOutput, ShellError> {
        let mut session = self.open_session().await?;
        let output = session.run(command).await;
        session.close().await;
        output
    }

    pub async fn close(self) {
        if let Err(err) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            debug!(addr = %self.target, "ssh disconnect failed: {err}");
        }
    }
}

/// One command channel on an authenticated transport.
pub struct ShellSession {
    channel: russh::Channel<client::Msg>,
    timeout: Duration,
}

impl ShellSession {
    pub async fn run(&mut self, command: &str) -> Result<CommandOutput, ShellError> {
        let channel = &mut self.channel;
        let collect = async move {
            channel.exec(true, command).await?;

            let mut output = Vec::new();
            let mut exit_status = None;
            while let Some(message) = channel.wait().await {
                match message {
                    ChannelMsg::Data { ref data } => output.extend_from_slice(&data[..]),
                    ChannelMsg::ExtendedData { ref data, .. } => output.extend_from_slice(&data[..]),
                    ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                    _ => {}
                }
            }
            Ok::<_, russh::Error>((output, exit_status))
        };

        let (output, exit_status) = timeout(self.timeout, collect)
            .await
            .map_err(|_| ShellError::Execution(format!("timeout after {:?}", self.timeout)))?
            .map_err(|err| ShellError::Execution(err.to_string()))?;

        Ok(CommandOutput {
            text: String::from_utf8_lossy(&output).trim_end().to_string(),
            exit_status,
        })
    }

    pub async fn close(self) {
        if let Err(err) = self.channel.close().await {
            trace!("ssh channel close failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        device::Credentials,
        test_server::SshServer,
    };
    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;

    fn device_with_password(port: u16, password: &str) -> Device {
        Device {
            credentials: Credentials {
                username: "monitor".to_string(),
                password: password.to_string(),
            },
            ..device_at(port)
        }
    }

    fn device_at(port: u16) -> Device {
        Device {
            id: 1,
            ip: "127.0.0.1".to_string(),
            system_type: "linux".to_string(),
            port,
            credentials: Credentials {
                username: "monitor".to_string(),
                password: "wrong".to_string(),
            },
        }
    }

    #[test]
    fn classifies_connection_failures_by_text() {
        assert!(matches!(
            ShellError::classify("Connection timed out (os error 110)"),
            ShellError::Timeout(_)
        ));
        assert!(matches!(ShellError::classify("read timeout"), ShellError::Timeout(_)));
        assert!(matches!(
            ShellError::classify("authentication rejected for user \"root\""),
            ShellError::Auth(_)
        ));
        assert!(matches!(
            ShellError::classify("Connection refused (os error 111)"),
            ShellError::Connect(_)
        ));
    }

    #[test]
    fn error_messages_carry_their_label() {
        assert_eq!(
            ShellError::classify("Connection refused").to_string(),
            "failed to establish SSH connection: Connection refused"
        );
        assert_eq!(
            ShellError::Execution("boom".to_string()).to_string(),
            "command execution failed: boom"
        );
    }

    #[test]
    fn exit_status_decides_success() {
        let ok = CommandOutput {
            text: "up 1 day".to_string(),
            exit_status: Some(0),
        };
        assert_eq!(ok.ensure_success().unwrap(), "up 1 day");

        let failed = CommandOutput {
            text: String::new(),
            exit_status: Some(127),
        };
        assert!(matches!(failed.ensure_success(), Err(ShellError::Execution(_))));

        let unknown = CommandOutput {
            text: String::new(),
            exit_status: None,
        };
        assert!(unknown.ensure_success().is_err());
    }

    #[tokio::test]
    async fn refused_connection_is_a_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = ShellClient::connect(&device_at(port), Duration::from_secs(2)).await;
        assert!(matches!(result, Err(ShellError::Connect(_))), "{:?}", result.err());
    }

    #[tokio::test]
    async fn silent_server_hits_the_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let result = ShellClient::connect(&device_at(port), Duration::from_millis(300)).await;
        assert!(matches!(result, Err(ShellError::Timeout(_))), "{:?}", result.err());
        server.abort();
    }

    #[tokio::test]
    async fn rejected_password_is_an_auth_error() {
        let server = SshServer::start("good", |_| (String::new(), 0)).await;
        let result = ShellClient::connect(&device_with_password(server.port, "bad"), Duration::from_secs(5)).await;
        assert!(matches!(result, Err(ShellError::Auth(_))), "{:?}", result.err());
    }

    #[tokio::test]
    async fn execute_captures_output_and_exit_status() {
        let server = SshServer::start("good", |command| match command {
            "uname" => ("Linux\n\n".to_string(), 0),
            _ => ("sh: not found\n".to_string(), 127),
        })
        .await;
        let client = ShellClient::connect(&device_with_password(server.port, "good"), Duration::from_secs(5))
            .await
            .unwrap();

        let ok = client.execute("uname").await.unwrap();
        let missing = client.execute("frobnicate").await.unwrap();
        client.close().await;

        assert_eq!(
            ok,
            CommandOutput {
                text: "Linux".to_string(),
                exit_status: Some(0),
            }
        );
        assert_eq!(missing.exit_status, Some(127));
        assert!(missing.ensure_success().is_err());
        assert_eq!(server.commands(), vec!["uname", "frobnicate"]);
    }

    #[tokio::test]
    async fn refused_session_is_a_session_error() {
        let server = SshServer::refusing_sessions("good").await;
        let client = ShellClient::connect(&device_with_password(server.port, "good"), Duration::from_secs(5))
            .await
            .unwrap();
        let result = client.open_session().await;
        client.close().await;
        assert!(matches!(result, Err(ShellError::Session(_))), "{:?}", result.err());
    }
}
