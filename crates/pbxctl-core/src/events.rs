// ── Call lifecycle logging ──
//
// Listener that writes module reloads and call progress to the tracing
// pipeline. Everything else on the event stream is ignored.

use std::sync::Arc;

use pbxctl_ami::{EventListener, ListenerError, ManagerEvent};
use strum::{Display, EnumString};
use tracing::{debug, info};

/// Events the logger reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum CallEvent {
    Reload,
    Newchannel,
    Hangup,
    DialBegin,
    BridgeEnter,
}

impl CallEvent {
    pub fn of(event: &ManagerEvent) -> Option<Self> {
        event.event_name()?.parse().ok()
    }
}

/// Logs [`CallEvent`]s and counts how many it has seen.
#[derive(Debug, Default)]
pub struct CallEventLogger {
    logged: u64,
}

impl CallEventLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logged(&self) -> u64 {
        self.logged
    }

    /// Log `event` if it is a call lifecycle event. Returns its kind.
    pub fn log(&mut self, event: &ManagerEvent) -> Option<CallEvent> {
        let kind = CallEvent::of(event)?;
        let field = |key: &str| event.get(key).unwrap_or_default();

        match kind {
            CallEvent::Reload => info!(
                module = field("Module"),
                status = field("Status"),
                "switch module reloaded"
            ),
            CallEvent::Newchannel => info!(
                channel = field("Channel"),
                caller = field("CallerIDNum"),
                exten = field("Exten"),
                unique_id = field("Uniqueid"),
                "channel created"
            ),
            CallEvent::Hangup => info!(
                channel = field("Channel"),
                cause = field("Cause"),
                cause_txt = field("Cause-txt"),
                unique_id = field("Uniqueid"),
                "channel hung up"
            ),
            CallEvent::DialBegin => info!(
                channel = field("Channel"),
                destination = field("DestChannel"),
                dial_string = field("DialString"),
                "dial started"
            ),
            CallEvent::BridgeEnter => debug!(
                channel = field("Channel"),
                bridge = field("BridgeUniqueid"),
                "channel joined bridge"
            ),
        }
        self.logged += 1;
        Some(kind)
    }
}

impl EventListener for CallEventLogger {
    fn name(&self) -> &str {
        "call-events"
    }

    async fn on_event(&mut self, event: Arc<ManagerEvent>) -> Result<(), ListenerError> {
        self.log(&event);
        Ok(())
    }
}
