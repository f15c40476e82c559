use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BusError;

const IPC_DIR: &str = "/tmp/alerter";

/// Where a bus socket binds or connects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "address")]
pub enum Transport {
    /// Unix domain socket named `<name>.sock` under `/tmp/alerter/`.
    Ipc(String),

    Tcp { host: String, port: u16 },
}

impl Transport {
    pub fn ipc(name: &str) -> Self {
        Self::Ipc(name.to_string())
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// ZeroMQ endpoint address.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Ipc(_) => format!("ipc://{}", self.ipc_path().display()),
            Self::Tcp { host, port } => format!("tcp://{host}:{port}"),
        }
    }

    fn ipc_path(&self) -> PathBuf {
        match self {
            Self::Ipc(name) => Path::new(IPC_DIR).join(format!("{name}.sock")),
            Self::Tcp { .. } => PathBuf::new(),
        }
    }

    /// Create the socket directory before binding an IPC endpoint. No-op for TCP.
    pub fn ensure_ipc_dir(&self) -> std::io::Result<()> {
        if let Self::Ipc(_) = self {
            if let Some(parent) = self.ipc_path().parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

impl FromStr for Transport {
    type Err = BusError;

    /// Accepts `tcp://host:port` and `ipc://name`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("tcp://") {
            let (host, port) = rest
                .rsplit_once(':')
                .ok_or_else(|| BusError::InvalidEndpoint(s.to_string()))?;
            let port: u16 = port
                .parse()
                .map_err(|_| BusError::InvalidEndpoint(s.to_string()))?;
            if host.is_empty() {
                return Err(BusError::InvalidEndpoint(s.to_string()));
            }
            return Ok(Self::tcp(host, port));
        }
        if let Some(name) = s.strip_prefix("ipc://") {
            if name.is_empty() || name.contains('/') {
                return Err(BusError::InvalidEndpoint(s.to_string()));
            }
            return Ok(Self::ipc(name));
        }
        Err(BusError::InvalidEndpoint(s.to_string()))
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints() {
        assert_eq!(Transport::ipc("triggers").endpoint(), "ipc:///tmp/alerter/triggers.sock");
        assert_eq!(Transport::tcp("127.0.0.1", 5560).endpoint(), "tcp://127.0.0.1:5560");
    }

    #[test]
    fn parses_cli_endpoints() {
        assert_eq!(
            "tcp://defs.internal:5560".parse::<Transport>().unwrap(),
            Transport::tcp("defs.internal", 5560)
        );
        assert_eq!("ipc://triggers".parse::<Transport>().unwrap(), Transport::ipc("triggers"));
    }

    #[test]
    fn rejects_malformed_endpoints() {
        for bad in ["tcp://nohost", "tcp://:80", "tcp://h:notaport", "udp://h:1", "ipc://", "ipc://a/b"] {
            assert!(bad.parse::<Transport>().is_err(), "{bad} should be rejected");
        }
    }
}
