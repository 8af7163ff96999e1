//! In-process SSH server on loopback for exercising the shell, discovery and
//! metrics paths without a real host.
//!
//! Password auth succeeds only for the configured password. Every `exec`
//! request is recorded and answered by a responder returning the output and
//! exit status.

use russh::{
    keys::{
        key::safe_rng,
        Algorithm,
        PrivateKey,
    },
    server::{
        self,
        Auth,
        Msg,
        Session,
    },
    Channel,
    ChannelId,
    CryptoVec,
};
use std::{
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};
use tokio::{
    net::TcpListener,
    task::JoinHandle,
};

type Responder = Arc<dyn Fn(&str) -> (String, u32) + Send + Sync>;

pub struct SshServer {
    pub port: u16,
    commands: Arc<Mutex<Vec<String>>>,
    accept: JoinHandle<()>,
}

impl SshServer {
    pub async fn start<F>(password: &str, responder: F) -> Self
    where
        F: Fn(&str) -> (String, u32) + Send + Sync + 'static,
    {
        Self::start_with(password, true, Arc::new(responder)).await
    }

    /// Authenticates but refuses every session channel.
    pub async fn refusing_sessions(password: &str) -> Self {
        Self::start_with(password, false, Arc::new(|_: &str| (String::new(), 0))).await
    }

    async fn start_with(password: &str, sessions: bool, responder: Responder) -> Self {
        let mut config = server::Config {
            auth_rejection_time: Duration::from_millis(10),
            auth_rejection_time_initial: Some(Duration::ZERO),
            inactivity_timeout: None,
            ..Default::default()
        };
        config
            .keys
            .push(PrivateKey::random(&mut safe_rng(), Algorithm::Ed25519).unwrap());
        let config = Arc::new(config);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let connection = Connection {
            password: Arc::from(password),
            sessions,
            responder,
            commands: Arc::clone(&commands),
        };

        let accept = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let config = Arc::clone(&config);
                let handler = connection.clone();
                tokio::spawn(async move {
                    if let Ok(running) = server::run_stream(config, socket, handler).await {
                        let _ = running.await;
                    }
                });
            }
        });

        Self {
            port,
            commands,
            accept,
        }
    }

    /// Command lines received so far, in arrival order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl Drop for SshServer {
    fn drop(&mut self) {
        self.accept.abort();
    }
}

#[derive(Clone)]
struct Connection {
    password: Arc<str>,
    sessions: bool,
    responder: Responder,
    commands: Arc<Mutex<Vec<String>>>,
}

impl server::Handler for Connection {
    type Error = russh::Error;

    async fn auth_password(&mut self, _user: &str, password: &str) -> Result<Auth, Self::Error> {
        if password == &*self.password {
            Ok(Auth::Accept)
        } else {
            Ok(Auth::reject())
        }
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(self.sessions)
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let command = String::from_utf8_lossy(data).into_owned();
        self.commands.lock().unwrap().push(command.clone());
        let (output, exit_status) = (self.responder)(&command);

        session.channel_success(channel)?;
        session.data(channel, CryptoVec::from_slice(output.as_bytes()))?;
        session.exit_status_request(channel, exit_status)?;
        session.eof(channel)?;
        session.close(channel)?;
        Ok(())
    }
}

/// Answers a `;`-sequenced command line the way a shell would for `echo '…'`
/// segments; any other segment prints `out:<segment>`.
pub fn emulate_shell(command: &str) -> (String, u32) {
    let output = command
        .split("; ")
        .map(|segment| match segment.strip_prefix("echo '").and_then(|s| s.strip_suffix('\'')) {
            Some(text) => text.to_string(),
            None => format!("out:{segment}"),
        })
        .collect::<Vec<_>>()
        .join("\n");
    (format!("{output}\n"), 0)
}
