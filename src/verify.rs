//! Best-effort check that an exporter is listening on its port.
//!
//! Several tools can answer the question; the first one present on the host
//! is asked. Nothing here is fatal: an installed service counts as a success
//! even when its port could not be observed, since the check can race
//! process start-up.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::error::{InstallerError, Result};
use crate::preflight::command_exists;

#[async_trait]
pub trait PortObserver: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    async fn is_listening(&self, port: u16) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortCheck {
    Listening { observer: &'static str },
    NotObserved { observer: &'static str },
    /// No observer could be used on this host.
    Unavailable,
}

impl PortCheck {
    pub fn is_listening(&self) -> bool {
        matches!(self, Self::Listening { .. })
    }
}

impl fmt::Display for PortCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listening { observer } => write!(f, "listening (seen by {observer})"),
            Self::NotObserved { observer } => write!(f, "not observed by {observer}"),
            Self::Unavailable => f.write_str("no port inspection tool available"),
        }
    }
}

/// Asks the first available observer whether `port` has a listener.
pub async fn check_port(observers: &[Box<dyn PortObserver>], port: u16) -> PortCheck {
    let Some(observer) = observers.iter().find(|o| o.is_available()) else {
        return PortCheck::Unavailable;
    };

    let name = observer.name();
    match observer.is_listening(port).await {
        Ok(true) => PortCheck::Listening { observer: name },
        Ok(false) => PortCheck::NotObserved { observer: name },
        Err(e) => {
            tracing::warn!(observer = name, error = %e, "Port check failed");
            PortCheck::NotObserved { observer: name }
        }
    }
}

/// `ss`, `netstat`, `lsof`, then `/proc/net/tcp*`.
pub fn default_observers() -> Vec<Box<dyn PortObserver>> {
    vec![
        Box::new(Ss),
        Box::new(Netstat),
        Box::new(Lsof),
        Box::new(ProcNet::default()),
    ]
}

async fn command_stdout(program: &str, args: &[String]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| InstallerError::Command {
            command: format!("{} {}", program, args.join(" ")),
            detail: e.to_string(),
        })?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn address_has_port(address: &str, port: u16) -> bool {
    address
        .rsplit_once(':')
        .is_some_and(|(_, p)| p == port.to_string())
}

pub struct Ss;

#[async_trait]
impl PortObserver for Ss {
    fn name(&self) -> &'static str {
        "ss"
    }

    fn is_available(&self) -> bool {
        command_exists("ss")
    }

    async fn is_listening(&self, port: u16) -> Result<bool> {
        let stdout = command_stdout("ss", &["-tlnH".to_string()]).await?;
        Ok(parse_ss(&stdout, port))
    }
}

/// `ss -tlnH`: `State Recv-Q Send-Q Local:Port Peer:Port`
pub fn parse_ss(output: &str, port: u16) -> bool {
    output.lines().any(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        fields.first() == Some(&"LISTEN")
            && fields.get(3).is_some_and(|local| address_has_port(local, port))
    })
}

pub struct Netstat;

#[async_trait]
impl PortObserver for Netstat {
    fn name(&self) -> &'static str {
        "netstat"
    }

    fn is_available(&self) -> bool {
        command_exists("netstat")
    }

    async fn is_listening(&self, port: u16) -> Result<bool> {
        let stdout = command_stdout("netstat", &["-tln".to_string()]).await?;
        Ok(parse_netstat(&stdout, port))
    }
}

/// `netstat -tln`: `Proto Recv-Q Send-Q Local-Address Foreign-Address State`
pub fn parse_netstat(output: &str, port: u16) -> bool {
    output.lines().any(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        fields.first().is_some_and(|proto| proto.starts_with("tcp"))
            && fields.last() == Some(&"LISTEN")
            && fields.get(3).is_some_and(|local| address_has_port(local, port))
    })
}

pub struct Lsof;

#[async_trait]
impl PortObserver for Lsof {
    fn name(&self) -> &'static str {
        "lsof"
    }

    fn is_available(&self) -> bool {
        command_exists("lsof")
    }

    async fn is_listening(&self, port: u16) -> Result<bool> {
        let args = [
            "-nP".to_string(),
            format!("-iTCP:{port}"),
            "-sTCP:LISTEN".to_string(),
        ];
        // lsof exits 1 when nothing matches
        let stdout = command_stdout("lsof", &args).await?;
        Ok(parse_lsof(&stdout, port))
    }
}

/// `lsof -nP -iTCP:<port> -sTCP:LISTEN`: NAME column ends in `host:port (LISTEN)`.
pub fn parse_lsof(output: &str, port: u16) -> bool {
    output.lines().skip(1).any(|line| {
        line.trim_end().ends_with("(LISTEN)")
            && line
                .split_whitespace()
                .rev()
                .nth(1)
                .is_some_and(|name| address_has_port(name, port))
    })
}

/// Reads the kernel socket tables directly; works without any extra tool.
pub struct ProcNet {
    root: PathBuf,
}

impl Default for ProcNet {
    fn default() -> Self {
        Self::with_root(Path::new("/proc"))
    }
}

impl ProcNet {
    pub fn with_root(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn tables(&self) -> [PathBuf; 2] {
        [
            self.root.join("net").join("tcp"),
            self.root.join("net").join("tcp6"),
        ]
    }
}

#[async_trait]
impl PortObserver for ProcNet {
    fn name(&self) -> &'static str {
        "/proc/net/tcp"
    }

    fn is_available(&self) -> bool {
        self.tables().iter().any(|t| t.exists())
    }

    async fn is_listening(&self, port: u16) -> Result<bool> {
        for table in self.tables() {
            match tokio::fs::read_to_string(&table).await {
                Ok(content) if parse_proc_net_tcp(&content, port) => return Ok(true),
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(false)
    }
}

const TCP_LISTEN: &str = "0A";

/// `/proc/net/tcp{,6}`: `sl local_address rem_address st ...`, ports in hex.
pub fn parse_proc_net_tcp(content: &str, port: u16) -> bool {
    content.lines().skip(1).any(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let local_port = fields
            .get(1)
            .and_then(|local| local.rsplit_once(':'))
            .and_then(|(_, hex)| u16::from_str_radix(hex, 16).ok());
        local_port == Some(port) && fields.get(3) == Some(&TCP_LISTEN)
    })
}
