// ── Switch query/command facade ──
//
// Thin typed layer over the manager client: each method issues one or two
// actions and reshapes the key/value replies into structs. Queue runtime
// control goes through CLI passthrough, the way the switch exposes it.

use std::collections::BTreeMap;
use std::fmt;

use pbxctl_ami::{Action, ActionResponse, ManagerClient, ManagerEvent};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;
use crate::model::DEFAULT_EXTENSION_CONTEXT;
use crate::render::member_interface;

// ── Typed replies ────────────────────────────────────────────────────

/// Uptime and load summary from `CoreStatus` + `CoreSettings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SwitchStatus {
    pub version: Option<String>,
    pub ami_version: Option<String>,
    pub startup: Option<String>,
    pub last_reload: Option<String>,
    pub current_calls: u32,
    pub max_calls: Option<u32>,
}

/// One live channel from `CoreShowChannels`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelInfo {
    pub channel: String,
    pub state: String,
    pub caller_id_num: String,
    pub caller_id_name: String,
    pub connected_line_num: String,
    pub context: String,
    pub extension: String,
    pub priority: String,
    pub application: String,
    pub application_data: String,
    pub duration: String,
    pub bridge_id: Option<String>,
    pub unique_id: String,
}

impl ChannelInfo {
    /// `ChannelState` 6 is "Up": an answered call.
    pub fn is_up(&self) -> bool {
        self.state == "Up"
    }
}

/// One SIP peer from `SIPpeers`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PeerInfo {
    pub name: String,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub dynamic: bool,
    pub status: String,
}

impl PeerInfo {
    pub fn is_reachable(&self) -> bool {
        self.status.starts_with("OK")
    }
}

/// Device state reported by `ExtensionState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionStatus {
    NotFound,
    Idle,
    InUse,
    Busy,
    Unavailable,
    Ringing,
    InUseRinging,
    OnHold,
    Other(i32),
}

impl ExtensionStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::NotFound,
            0 => Self::Idle,
            1 => Self::InUse,
            2 => Self::Busy,
            4 => Self::Unavailable,
            8 => Self::Ringing,
            9 => Self::InUseRinging,
            16 => Self::OnHold,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for ExtensionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("not found"),
            Self::Idle => f.write_str("idle"),
            Self::InUse => f.write_str("in use"),
            Self::Busy => f.write_str("busy"),
            Self::Unavailable => f.write_str("unavailable"),
            Self::Ringing => f.write_str("ringing"),
            Self::InUseRinging => f.write_str("in use, ringing"),
            Self::OnHold => f.write_str("on hold"),
            Self::Other(code) => write!(f, "state {code}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionState {
    pub extension: String,
    pub context: String,
    pub code: i32,
    pub status: ExtensionStatus,
    pub hint: Option<String>,
}

/// Parameters for placing a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginateRequest {
    /// Channel to ring first. A bare number means `SIP/<number>`.
    pub channel: String,
    /// Extension to connect the answered channel to.
    pub extension: String,
    pub context: String,
    pub priority: u32,
    pub caller_id: Option<String>,
    /// Ring timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    pub variables: BTreeMap<String, String>,
}

impl OriginateRequest {
    pub fn new(channel: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            extension: extension.into(),
            context: DEFAULT_EXTENSION_CONTEXT.to_owned(),
            priority: 1,
            caller_id: None,
            timeout_ms: None,
            variables: BTreeMap::new(),
        }
    }

    fn into_action(self) -> Action {
        let channel = member_interface(&self.channel);
        let mut action = Action::new("Originate")
            .param("Channel", channel)
            .param("Exten", self.extension)
            .param("Context", self.context)
            .param("Priority", self.priority.to_string())
            .param("Async", "true")
            .param_opt("CallerID", self.caller_id)
            .param_opt("Timeout", self.timeout_ms.map(|t| t.to_string()));
        for (name, value) in &self.variables {
            action = action.variable(name, value);
        }
        action
    }
}

/// Result of an accepted `Originate`. With `Async` the call proceeds in
/// the background; its progress arrives as events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginateAccepted {
    pub message: Option<String>,
}

// ── Parsing helpers ──────────────────────────────────────────────────

fn text(event: &ManagerEvent, key: &str) -> String {
    event.get(key).unwrap_or_default().to_owned()
}

fn non_empty(event: &ManagerEvent, key: &str) -> Option<String> {
    event
        .get(key)
        .filter(|v| !v.is_empty() && *v != "(null)" && *v != "-none-")
        .map(str::to_owned)
}

fn channel_from(event: &ManagerEvent) -> ChannelInfo {
    ChannelInfo {
        channel: text(event, "Channel"),
        state: event
            .get("ChannelStateDesc")
            .unwrap_or_else(|| event.get("ChannelState").unwrap_or_default())
            .to_owned(),
        caller_id_num: text(event, "CallerIDNum"),
        caller_id_name: text(event, "CallerIDName"),
        connected_line_num: text(event, "ConnectedLineNum"),
        context: text(event, "Context"),
        extension: text(event, "Exten"),
        priority: text(event, "Priority"),
        application: text(event, "Application"),
        application_data: text(event, "ApplicationData"),
        duration: text(event, "Duration"),
        bridge_id: non_empty(event, "BridgeId").or_else(|| non_empty(event, "BridgedChannel")),
        unique_id: text(event, "Uniqueid"),
    }
}

fn peer_from(event: &ManagerEvent) -> PeerInfo {
    PeerInfo {
        name: text(event, "ObjectName"),
        address: non_empty(event, "IPaddress"),
        port: event
            .get("IPport")
            .and_then(|p| p.parse().ok())
            .filter(|p| *p != 0),
        dynamic: event
            .get("Dynamic")
            .is_some_and(|d| d.eq_ignore_ascii_case("yes")),
        status: text(event, "Status"),
    }
}

fn number(response: &ActionResponse, key: &str) -> Option<u32> {
    response.get(key).and_then(|v| v.trim().parse().ok())
}

// ── Switch ───────────────────────────────────────────────────────────

/// Typed commands and queries against a running switch.
#[derive(Clone)]
pub struct Switch {
    client: ManagerClient,
}

impl Switch {
    pub fn new(client: ManagerClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ManagerClient {
        &self.client
    }

    async fn run(&self, action: Action) -> Result<ActionResponse, CoreError> {
        debug!(action = action.name(), "switch action");
        Ok(self.client.execute(action).await?)
    }

    pub async fn status(&self) -> Result<SwitchStatus, CoreError> {
        let status = self.run(Action::new("CoreStatus")).await?;
        let settings = self.run(Action::new("CoreSettings")).await?;

        let joined = |date: Option<&str>, time: Option<&str>| match (date, time) {
            (Some(d), Some(t)) => Some(format!("{d} {t}")),
            (Some(d), None) => Some(d.to_owned()),
            (None, Some(t)) => Some(t.to_owned()),
            (None, None) => None,
        };

        Ok(SwitchStatus {
            version: settings.get("AsteriskVersion").map(str::to_owned),
            ami_version: settings.get("AMIversion").map(str::to_owned),
            startup: joined(status.get("CoreStartupDate"), status.get("CoreStartupTime")),
            last_reload: joined(status.get("CoreReloadDate"), status.get("CoreReloadTime")),
            current_calls: number(&status, "CoreCurrentCalls").unwrap_or(0),
            max_calls: number(&settings, "CoreMaxCalls").filter(|n| *n > 0),
        })
    }

    /// Live channels.
    pub async fn channels(&self) -> Result<Vec<ChannelInfo>, CoreError> {
        let response = self.run(Action::new("CoreShowChannels")).await?;
        Ok(response
            .events_named("CoreShowChannel")
            .map(channel_from)
            .collect())
    }

    /// Registered and configured SIP peers.
    pub async fn peers(&self) -> Result<Vec<PeerInfo>, CoreError> {
        let response = self.run(Action::new("SIPpeers")).await?;
        Ok(response.events_named("PeerEntry").map(peer_from).collect())
    }

    pub async fn extension_state(
        &self,
        extension: &str,
        context: Option<&str>,
    ) -> Result<ExtensionState, CoreError> {
        let context = context.unwrap_or(DEFAULT_EXTENSION_CONTEXT);
        let response = self
            .run(
                Action::new("ExtensionState")
                    .param("Exten", extension)
                    .param("Context", context),
            )
            .await?;

        let code = response
            .get("Status")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(-1);
        Ok(ExtensionState {
            extension: extension.to_owned(),
            context: context.to_owned(),
            code,
            status: ExtensionStatus::from_code(code),
            hint: response
                .get("Hint")
                .filter(|h| !h.is_empty())
                .map(str::to_owned),
        })
    }

    /// Place a call. Returns once the switch has queued it.
    pub async fn originate(
        &self,
        request: OriginateRequest,
    ) -> Result<OriginateAccepted, CoreError> {
        let response = self.run(request.into_action()).await?;
        Ok(OriginateAccepted {
            message: response.get("Message").map(str::to_owned),
        })
    }

    pub async fn hangup(&self, channel: &str) -> Result<(), CoreError> {
        self.run(Action::new("Hangup").param("Channel", channel))
            .await?;
        Ok(())
    }

    /// Run a CLI command and return its output lines.
    pub async fn command(&self, cli: &str) -> Result<Vec<String>, CoreError> {
        let response = self
            .run(Action::new("Command").param("Command", cli))
            .await?;
        Ok(response.output_lines())
    }

    /// Reload one module, or every module when `module` is `None`.
    pub async fn reload(&self, module: Option<&str>) -> Result<(), CoreError> {
        self.run(Action::new("Reload").param_opt("Module", module))
            .await?;
        Ok(())
    }

    // ── Queue runtime ────────────────────────────────────────────────

    /// `queue show` output, for one queue or all.
    pub async fn queue_status(&self, queue: Option<&str>) -> Result<Vec<String>, CoreError> {
        match queue {
            Some(name) => self.command(&format!("queue show {name}")).await,
            None => self.command("queue show").await,
        }
    }

    pub async fn pause_member(
        &self,
        queue: &str,
        member: &str,
        reason: Option<&str>,
    ) -> Result<Vec<String>, CoreError> {
        let mut cli = format!(
            "queue pause member {} queue {queue}",
            member_interface(member)
        );
        if let Some(reason) = reason {
            cli.push_str(" reason ");
            cli.push_str(reason);
        }
        self.command(&cli).await
    }

    pub async fn unpause_member(
        &self,
        queue: &str,
        member: &str,
    ) -> Result<Vec<String>, CoreError> {
        self.command(&format!(
            "queue unpause member {} queue {queue}",
            member_interface(member)
        ))
        .await
    }

    /// Add a member for this switch run only; `queues.conf` is untouched.
    pub async fn add_dynamic_member(
        &self,
        queue: &str,
        member: &str,
        penalty: Option<u32>,
    ) -> Result<Vec<String>, CoreError> {
        let mut cli = format!("queue add member {} to {queue}", member_interface(member));
        if let Some(penalty) = penalty {
            cli.push_str(&format!(" penalty {penalty}"));
        }
        self.command(&cli).await
    }

    pub async fn remove_dynamic_member(
        &self,
        queue: &str,
        member: &str,
    ) -> Result<Vec<String>, CoreError> {
        self.command(&format!(
            "queue remove member {} from {queue}",
            member_interface(member)
        ))
        .await
    }

    pub async fn reset_queue_stats(&self, queue: &str) -> Result<Vec<String>, CoreError> {
        self.command(&format!("queue reset stats {queue}")).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pbxctl_ami::ManagerMessage;

    use super::*;

    #[test]
    fn originate_action_defaults() {
        let mut request = OriginateRequest::new("101", "102");
        request.variables.insert("CALLER".into(), "pbxctl".into());
        let action = request.into_action();
        let params: Vec<(&str, &str)> = action
            .params()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            params,
            vec![
                ("Channel", "SIP/101"),
                ("Exten", "102"),
                ("Context", "internal"),
                ("Priority", "1"),
                ("Async", "true"),
                ("Variable", "CALLER=pbxctl"),
            ]
        );
    }

    #[test]
    fn extension_status_codes() {
        assert_eq!(ExtensionStatus::from_code(-1), ExtensionStatus::NotFound);
        assert_eq!(ExtensionStatus::from_code(0), ExtensionStatus::Idle);
        assert_eq!(ExtensionStatus::from_code(16), ExtensionStatus::OnHold);
        assert_eq!(ExtensionStatus::from_code(3), ExtensionStatus::Other(3));
        assert_eq!(ExtensionStatus::InUse.to_string(), "in use");
    }

    #[test]
    fn peer_entry_parsing() {
        let event = ManagerMessage::new()
            .with("Event", "PeerEntry")
            .with("ObjectName", "101")
            .with("IPaddress", "-none-")
            .with("IPport", "0")
            .with("Dynamic", "yes")
            .with("Status", "UNKNOWN");
        let peer = peer_from(&event);
        assert_eq!(peer.name, "101");
        assert_eq!(peer.address, None);
        assert_eq!(peer.port, None);
        assert!(peer.dynamic);
        assert!(!peer.is_reachable());
    }

    #[test]
    fn channel_parsing_prefers_state_description() {
        let event = ManagerMessage::new()
            .with("Event", "CoreShowChannel")
            .with("Channel", "SIP/101-00000001")
            .with("ChannelState", "6")
            .with("ChannelStateDesc", "Up")
            .with("Exten", "102")
            .with("BridgeId", "")
            .with("Uniqueid", "1700.1");
        let channel = channel_from(&event);
        assert!(channel.is_up());
        assert_eq!(channel.bridge_id, None);
        assert_eq!(channel.unique_id, "1700.1");
    }
}
