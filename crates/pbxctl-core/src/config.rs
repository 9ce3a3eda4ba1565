// ── Runtime configuration for a Pbx ──
//
// Fully resolved settings: credentials already looked up, paths already
// expanded. Produced by `pbxctl-config` from profiles, or built directly in
// tests.

use std::path::PathBuf;
use std::time::Duration;

use pbxctl_ami::ManagerConfig;

/// Default manager port.
pub const DEFAULT_AMI_PORT: u16 = 5038;

/// Everything needed to open the record store, reach the switch, and find
/// its configuration directory.
#[derive(Debug, Clone)]
pub struct PbxConfig {
    pub ami_host: String,
    pub ami_port: u16,
    /// Login credentials, reconnect policy and action timeout.
    pub manager: ManagerConfig,
    /// Bound on the initial connect + login in [`Pbx::connect`](crate::Pbx::connect).
    pub connect_timeout: Duration,
    /// Directory holding `sip.conf`, `extensions.conf` and `queues.conf`.
    pub config_dir: PathBuf,
    /// JSON snapshot of the record store. `None` keeps records in memory.
    pub data_file: Option<PathBuf>,
    /// Accept SIP trace records.
    pub sip_trace_enabled: bool,
}

impl Default for PbxConfig {
    fn default() -> Self {
        Self {
            ami_host: "localhost".into(),
            ami_port: DEFAULT_AMI_PORT,
            manager: ManagerConfig::new("admin", ""),
            connect_timeout: Duration::from_secs(10),
            config_dir: PathBuf::from("/etc/asterisk"),
            data_file: None,
            sip_trace_enabled: false,
        }
    }
}

impl PbxConfig {
    /// `host:port` of the manager interface, for messages.
    pub fn ami_target(&self) -> String {
        format!("{}:{}", self.ami_host, self.ami_port)
    }
}
