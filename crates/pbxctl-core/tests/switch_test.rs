#![allow(clippy::unwrap_used)]

// Switch facade and CDR recording against a scripted in-memory switch.
//
// The fake answers each action from a table keyed by action name and
// records every action it receives, so tests can assert on both the typed
// results and the exact commands sent.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use pbxctl_ami::{
    AmiCodec, BoxedStream, Connector, Error, Frame, ManagerClient, ManagerConfig, ManagerMessage,
};
use pbxctl_core::{
    CdrRecorder, CoreError, CreateQueueRequest, ExtensionStatus, MemoryFs, MemoryStore,
    OriginateRequest, Pbx, RecordStore, Switch, SyncOrchestrator,
};
use pretty_assertions::assert_eq;
use tokio::io::AsyncWriteExt;
use tokio_util::codec::Framed;

const WAIT: Duration = Duration::from_secs(5);

type Script = fn(&ManagerMessage) -> Vec<ManagerMessage>;

// ── Fake switch ─────────────────────────────────────────────────────

struct ScriptedConnector {
    script: Script,
    received: Arc<Mutex<Vec<ManagerMessage>>>,
}

impl Connector for ScriptedConnector {
    fn connect(&self) -> BoxFuture<'_, Result<BoxedStream, Error>> {
        Box::pin(async move {
            let (client, mut server) = tokio::io::duplex(64 * 1024);
            let script = self.script;
            let received = Arc::clone(&self.received);
            tokio::spawn(async move {
                server
                    .write_all(b"Asterisk Call Manager/5.0.1\r\n")
                    .await
                    .unwrap();
                let mut framed = Framed::new(server, AmiCodec::server());
                while let Some(Ok(Frame::Message(action))) = framed.next().await {
                    let id = action.action_id().unwrap_or_default().to_owned();
                    let replies = if action.get("Action") == Some("Login") {
                        vec![ManagerMessage::new().with("Response", "Success")]
                    } else {
                        received.lock().unwrap().push(action.clone());
                        script(&action)
                    };
                    for reply in replies {
                        if framed
                            .send(reply.with("ActionID", id.as_str()))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                }
            });
            Ok(Box::new(client) as BoxedStream)
        })
    }

    fn describe(&self) -> String {
        "scripted".into()
    }
}

fn success() -> ManagerMessage {
    ManagerMessage::new().with("Response", "Success")
}

fn command_output(lines: &[&str]) -> Vec<ManagerMessage> {
    let mut reply = ManagerMessage::new().with("Response", "Success");
    for line in lines {
        reply = reply.with("Output", *line);
    }
    vec![reply]
}

fn script(action: &ManagerMessage) -> Vec<ManagerMessage> {
    match action.get("Action").unwrap_or_default() {
        "CoreStatus" => vec![
            success()
                .with("CoreStartupDate", "2026-10-18")
                .with("CoreStartupTime", "08:00:00")
                .with("CoreCurrentCalls", "2"),
        ],
        "CoreSettings" => vec![
            success()
                .with("AsteriskVersion", "18.20.0")
                .with("AMIversion", "7.0.3"),
        ],
        "CoreShowChannels" => vec![
            success()
                .with("EventList", "start")
                .with("Message", "Channels will follow"),
            ManagerMessage::new()
                .with("Event", "CoreShowChannel")
                .with("Channel", "SIP/101-00000001")
                .with("ChannelStateDesc", "Up")
                .with("Exten", "102")
                .with("Uniqueid", "1700000000.1"),
            ManagerMessage::new()
                .with("Event", "CoreShowChannelsComplete")
                .with("EventList", "Complete")
                .with("ListItems", "1"),
        ],
        "SIPpeers" => vec![
            success().with("EventList", "start"),
            ManagerMessage::new()
                .with("Event", "PeerEntry")
                .with("ObjectName", "101")
                .with("IPaddress", "10.0.0.21")
                .with("IPport", "5060")
                .with("Dynamic", "yes")
                .with("Status", "OK (12 ms)"),
            ManagerMessage::new()
                .with("Event", "PeerlistComplete")
                .with("EventList", "Complete"),
        ],
        "ExtensionState" => vec![success().with("Status", "1").with("Hint", "SIP/101")],
        "Originate" => vec![success().with("Message", "Originate successfully queued")],
        "Hangup" => vec![
            ManagerMessage::new()
                .with("Response", "Error")
                .with("Message", "No such channel"),
        ],
        "Command" => command_output(&["support has 0 calls (max unlimited)", "   Members:"]),
        _ => vec![success()],
    }
}

struct Harness {
    switch: Switch,
    received: Arc<Mutex<Vec<ManagerMessage>>>,
}

impl Harness {
    fn actions(&self, name: &str) -> Vec<ManagerMessage> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.get("Action") == Some(name))
            .cloned()
            .collect()
    }
}

async fn harness() -> Harness {
    let received = Arc::new(Mutex::new(Vec::new()));
    let client = ManagerClient::new(
        ManagerConfig::new("admin", "password"),
        Arc::new(ScriptedConnector {
            script,
            received: Arc::clone(&received),
        }),
    );
    client.start().await;
    client.wait_connected(WAIT).await.unwrap();
    Harness {
        switch: Switch::new(client),
        received,
    }
}

// ── Queries ─────────────────────────────────────────────────────────

#[tokio::test]
async fn status_combines_core_status_and_settings() {
    let h = harness().await;
    let status = h.switch.status().await.unwrap();
    assert_eq!(status.version.as_deref(), Some("18.20.0"));
    assert_eq!(status.startup.as_deref(), Some("2026-10-18 08:00:00"));
    assert_eq!(status.current_calls, 2);
    assert_eq!(status.last_reload, None);
}

#[tokio::test]
async fn list_actions_become_typed_rows() {
    let h = harness().await;

    let channels = h.switch.channels().await.unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].channel, "SIP/101-00000001");
    assert!(channels[0].is_up());

    let peers = h.switch.peers().await.unwrap();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].address.as_deref(), Some("10.0.0.21"));
    assert_eq!(peers[0].port, Some(5060));
    assert!(peers[0].is_reachable());
}

#[tokio::test]
async fn extension_state_defaults_to_internal_context() {
    let h = harness().await;
    let state = h.switch.extension_state("101", None).await.unwrap();
    assert_eq!(state.status, ExtensionStatus::InUse);
    assert_eq!(state.hint.as_deref(), Some("SIP/101"));

    let sent = h.actions("ExtensionState");
    assert_eq!(sent[0].get("Context"), Some("internal"));
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn originate_is_asynchronous() {
    let h = harness().await;
    let mut request = OriginateRequest::new("101", "102");
    request.caller_id = Some("\"Ops\" <100>".into());
    let accepted = h.switch.originate(request).await.unwrap();
    assert_eq!(
        accepted.message.as_deref(),
        Some("Originate successfully queued")
    );

    let sent = &h.actions("Originate")[0];
    assert_eq!(sent.get("Channel"), Some("SIP/101"));
    assert_eq!(sent.get("Async"), Some("true"));
    assert_eq!(sent.get("CallerID"), Some("\"Ops\" <100>"));
}

#[tokio::test]
async fn rejected_action_surfaces_message() {
    let h = harness().await;
    let err = h.switch.hangup("SIP/999-0001").await.unwrap_err();
    match err {
        CoreError::SwitchRejected { action, message } => {
            assert_eq!(action, "Hangup");
            assert_eq!(message, "No such channel");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn queue_runtime_uses_cli_commands() {
    let h = harness().await;
    h.switch
        .pause_member("support", "101", Some("lunch"))
        .await
        .unwrap();
    h.switch.unpause_member("support", "101").await.unwrap();
    h.switch
        .add_dynamic_member("support", "103", Some(2))
        .await
        .unwrap();
    h.switch
        .remove_dynamic_member("support", "103")
        .await
        .unwrap();
    h.switch.reset_queue_stats("support").await.unwrap();
    let lines = h.switch.queue_status(Some("support")).await.unwrap();
    assert_eq!(lines[0], "support has 0 calls (max unlimited)");

    let commands: Vec<String> = h
        .actions("Command")
        .iter()
        .map(|a| a.get("Command").unwrap().to_owned())
        .collect();
    assert_eq!(
        commands,
        vec![
            "queue pause member SIP/101 queue support reason lunch",
            "queue unpause member SIP/101 queue support",
            "queue add member SIP/103 to support penalty 2",
            "queue remove member SIP/103 from support",
            "queue reset stats support",
            "queue show support",
        ]
    );
}

#[tokio::test]
async fn reload_names_module_when_given() {
    let h = harness().await;
    h.switch.reload(Some("chan_sip.so")).await.unwrap();
    h.switch.reload(None).await.unwrap();

    let sent = h.actions("Reload");
    assert_eq!(sent[0].get("Module"), Some("chan_sip.so"));
    assert_eq!(sent[1].get("Module"), None);
}

// ── Through the Pbx facade ──────────────────────────────────────────

async fn connected_pbx(h: &Harness) -> Pbx {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let sync = SyncOrchestrator::new(Arc::clone(&store), Arc::new(MemoryFs::new()))
        .with_reloader(Arc::new(h.switch.client().clone()));
    Pbx::from_parts(store, sync, Some(h.switch.clone()))
}

#[tokio::test]
async fn queue_pause_requires_stored_member() {
    let h = harness().await;
    let pbx = connected_pbx(&h).await;
    let outcome = pbx
        .create_queue(CreateQueueRequest {
            name: "support".into(),
            members: vec!["101".into()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(outcome.sync.files_synced());
    assert_eq!(h.actions("Reload").len(), 1);
    assert_eq!(h.actions("Reload")[0].get("Module"), Some("app_queue.so"));

    pbx.pause_queue_member("support", "101", None)
        .await
        .unwrap();
    let err = pbx
        .pause_queue_member("support", "555", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }), "{err:?}");
    assert_eq!(h.actions("Command").len(), 1);
}

#[tokio::test]
async fn dashboard_reports_live_calls() {
    let h = harness().await;
    let pbx = connected_pbx(&h).await;
    let dashboard = pbx.dashboard().await.unwrap();
    assert_eq!(dashboard.active_calls, Some(1));
    assert_eq!(dashboard.extensions, 0);
    assert_eq!(
        dashboard.switch.and_then(|s| s.version).as_deref(),
        Some("18.20.0")
    );
}

#[tokio::test]
async fn cdr_events_are_recorded_once() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let recorder = CdrRecorder::new(Arc::clone(&store));
    let event = ManagerMessage::new()
        .with("Event", "Cdr")
        .with("UniqueID", "1700000000.7")
        .with("Source", "101")
        .with("Destination", "102")
        .with("StartTime", "2026-10-18 09:00:00")
        .with("Duration", "30")
        .with("BillableSeconds", "25")
        .with("Disposition", "ANSWERED");

    recorder.record(&event).await.unwrap();
    recorder.record(&event).await.unwrap();
    assert_eq!(store.call_records().count().await.unwrap(), 1);
}
