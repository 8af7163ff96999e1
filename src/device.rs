use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

pub const DEFAULT_SSH_PORT: u16 = 22;

/// One managed host as delivered in the input batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub ip: String,
    pub system_type: String,
    /// `0` selects [`DEFAULT_SSH_PORT`].
    #[serde(default)]
    pub port: u16,
    pub credentials: Credentials,
}

impl Device {
    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            DEFAULT_SSH_PORT
        } else {
            self.port
        }
    }

    pub fn address(&self) -> (&str, u16) {
        (self.ip.as_str(), self.effective_port())
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_wire_format_and_defaults_port() {
        let devices: Vec<Device> = serde_json::from_str(
            r#"[
                {"id": 1, "ip": "10.0.0.1", "system_type": "linux", "port": 2222,
                 "credentials": {"username": "root", "password": "pw"}},
                {"id": 2, "ip": "10.0.0.2", "system_type": "linux",
                 "credentials": {"username": "admin", "password": "pw"}}
            ]"#,
        )
        .unwrap();

        assert_eq!(devices[0].address(), ("10.0.0.1", 2222));
        assert_eq!(devices[1].port, 0);
        assert_eq!(devices[1].address(), ("10.0.0.2", 22));
    }

    #[test]
    fn debug_hides_password() {
        let credentials = Credentials {
            username: "root".to_string(),
            password: "hunter2".to_string(),
        };
        let printed = format!("{credentials:?}");
        assert!(printed.contains("root"));
        assert!(!printed.contains("hunter2"));
    }
}
