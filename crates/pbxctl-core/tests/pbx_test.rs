#![allow(clippy::unwrap_used)]

// End-to-end tests of the entity services: record store, rendering,
// merging and reload scheduling, with config files held in memory.

mod common;

use common::{RecordingReloader, extension, fixture, fixture_with, trunk};
use pbxctl_core::{
    ConfigFile, CoreError, CreateInboundRouteRequest, CreateOutboundRouteRequest,
    CreateQueueRequest, DestinationType, FileStatus, MemoryFs, ReloadStatus, UpdateTrunkRequest,
};
use pretty_assertions::assert_eq;

const HAND_WRITTEN_SIP: &str = "\
; site-specific settings, edited by hand
[general]
context=default
bindport=5060

[lobby-phone]
type=friend
host=10.0.0.20
";

// ── Extension lifecycle ─────────────────────────────────────────────

#[tokio::test]
async fn create_extension_writes_sip_and_dialplan() {
    let fx = fixture();
    let outcome = fx.pbx.create_extension(extension("101")).await.unwrap();

    assert_eq!(outcome.record.context, "internal");
    assert!(outcome.sync.files_synced());
    assert_eq!(fx.reloader.take(), vec!["chan_sip.so"]);

    // The dialplan changed too but was not reloaded, so the switch is not
    // fully live yet.
    assert!(!outcome.live_updated());
    assert_eq!(outcome.sync.reloads.len(), 2);
    assert_eq!(outcome.sync.reloads[0].status, ReloadStatus::Reloaded);
    assert_eq!(outcome.sync.reloads[1].module, "pbx_config.so");
    assert!(matches!(
        outcome.sync.reloads[1].status,
        ReloadStatus::Pending { .. }
    ));

    let sip = fx.fs.get("sip.conf").unwrap();
    assert!(sip.starts_with("[general]\n"));
    assert!(sip.contains(
        "[101](template-internal)\n; managed-by: pbxctl extension\ncallerid=\"User 101\" <101>\nsecret=pw101\nmailbox=101\n"
    ));

    let dialplan = fx.fs.get("extensions.conf").unwrap();
    assert!(dialplan.contains("exten => 101,1,NoOp(Dialing extension 101)\n"));
    assert!(dialplan.contains("exten => 101,n,Dial(SIP/101,20)\n"));
    assert!(!dialplan.contains("_X."));
}

#[tokio::test]
async fn delete_extension_leaves_other_sections_intact() {
    let fx = fixture_with(
        MemoryFs::new().with_file("sip.conf", HAND_WRITTEN_SIP),
        RecordingReloader::default(),
    );
    fx.pbx.create_extension(extension("101")).await.unwrap();
    fx.pbx.create_extension(extension("102")).await.unwrap();
    let before = fx.fs.get("sip.conf").unwrap();
    assert!(before.starts_with(HAND_WRITTEN_SIP));
    fx.reloader.take();

    let outcome = fx.pbx.delete_extension("101").await.unwrap();
    assert_eq!(outcome.record.extension, "101");

    let after = fx.fs.get("sip.conf").unwrap();
    assert!(!after.contains("[101]"));
    assert!(after.contains("[102](template-internal)"));
    assert!(after.starts_with(HAND_WRITTEN_SIP));

    let dialplan = fx.fs.get("extensions.conf").unwrap();
    assert!(!dialplan.contains("exten => 101,"));
    assert!(dialplan.contains("exten => 102,"));

    assert_eq!(fx.reloader.take(), vec!["chan_sip.so"]);
    assert_eq!(
        outcome.sync.reloads[0].status,
        ReloadStatus::Reloaded,
        "{:?}",
        outcome.sync
    );
}

#[tokio::test]
async fn lookup_by_id_or_key() {
    let fx = fixture();
    let created = fx
        .pbx
        .create_extension(extension("101"))
        .await
        .unwrap()
        .record;

    let by_key = fx.pbx.extension("101").await.unwrap();
    let by_id = fx.pbx.extension(&created.id.to_string()).await.unwrap();
    assert_eq!(by_key, by_id);

    let err = fx.pbx.extension("999").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }), "{err:?}");
}

// ── Sync behavior ───────────────────────────────────────────────────

#[tokio::test]
async fn trunk_change_is_live_after_one_reload() {
    let fx = fixture();
    let outcome = fx.pbx.create_trunk(trunk("T1")).await.unwrap();
    assert_eq!(fx.reloader.take(), vec!["chan_sip.so"]);
    assert_eq!(outcome.sync.reloads.len(), 1);
    assert!(outcome.live_updated());
}

#[tokio::test]
async fn queue_change_leaves_dialplan_reload_pending() {
    let fx = fixture();
    let outcome = fx
        .pbx
        .create_queue(CreateQueueRequest {
            name: "support".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(fx.reloader.take(), vec!["app_queue.so"]);
    assert!(!outcome.live_updated());
    let pending: Vec<&str> = outcome
        .sync
        .reloads
        .iter()
        .filter(|r| matches!(r.status, ReloadStatus::Pending { .. }))
        .map(|r| r.module.as_str())
        .collect();
    assert_eq!(pending, ["pbx_config.so"]);
}

#[tokio::test]
async fn full_sync_is_idempotent() {
    let fx = fixture();
    fx.pbx.create_extension(extension("101")).await.unwrap();
    fx.pbx.create_trunk(trunk("T1")).await.unwrap();

    fx.pbx.sync_all().await;
    let writes = fx.fs.write_count("sip.conf");
    fx.reloader.take();

    let second = fx.pbx.sync_all().await;
    assert_eq!(fx.fs.write_count("sip.conf"), writes);
    assert!(
        second
            .files
            .iter()
            .all(|f| f.status == FileStatus::Unchanged),
        "{second:?}"
    );
    assert!(
        second
            .reloads
            .iter()
            .all(|r| r.status == ReloadStatus::NotNeeded)
    );
    assert!(fx.reloader.take().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_each_land_once() {
    let fx = fixture();
    let (a, b, c, d) = tokio::join!(
        fx.pbx.create_extension(extension("101")),
        fx.pbx.create_extension(extension("102")),
        fx.pbx.create_extension(extension("103")),
        fx.pbx.create_extension(extension("104")),
    );
    for outcome in [a, b, c, d] {
        assert!(outcome.unwrap().sync.files_synced());
    }

    let sip = fx.fs.get("sip.conf").unwrap();
    let dialplan = fx.fs.get("extensions.conf").unwrap();
    for number in ["101", "102", "103", "104"] {
        let header = format!("[{number}](template-internal)");
        assert_eq!(sip.matches(&header).count(), 1, "{header} in:\n{sip}");
        let first_step = format!("exten => {number},1,");
        assert_eq!(
            dialplan.matches(&first_step).count(),
            1,
            "{first_step} in:\n{dialplan}"
        );
    }
}

#[tokio::test]
async fn preview_matches_written_file() {
    let fx = fixture();
    fx.pbx.create_extension(extension("101")).await.unwrap();
    let preview = fx.pbx.preview(ConfigFile::Sip).await.unwrap();
    assert_eq!(Some(preview), fx.fs.get("sip.conf"));
}

#[tokio::test]
async fn failing_file_does_not_block_others() {
    let fx = fixture();
    fx.fs.fail("sip.conf");

    let outcome = fx.pbx.create_extension(extension("101")).await.unwrap();
    assert!(!outcome.live_updated());

    let status = |file: ConfigFile| {
        outcome
            .sync
            .files
            .iter()
            .find(|f| f.file == file)
            .map(|f| f.status.clone())
            .unwrap()
    };
    assert!(matches!(status(ConfigFile::Sip), FileStatus::Failed { .. }));
    assert_eq!(status(ConfigFile::Dialplan), FileStatus::Written);
    // The failed sip.conf write, plus the dialplan reload left pending.
    assert_eq!(outcome.warnings().len(), 2);

    // The record is kept; the next sync repairs the file.
    assert!(fx.pbx.extension("101").await.is_ok());
    fx.fs.recover("sip.conf");
    fx.pbx.sync_all().await;
    assert!(
        fx.fs
            .get("sip.conf")
            .unwrap()
            .contains("[101](template-internal)")
    );
}

#[tokio::test]
async fn reload_failure_is_reported_not_raised() {
    let fx = fixture_with(MemoryFs::new(), RecordingReloader::failing());
    let outcome = fx.pbx.create_queue(CreateQueueRequest {
        name: "support".into(),
        members: vec!["101".into(), "102".into()],
        ..Default::default()
    });
    let outcome = outcome.await.unwrap();

    assert!(outcome.sync.files_synced());
    assert!(!outcome.live_updated());
    assert!(matches!(
        outcome.sync.reloads[0].status,
        ReloadStatus::Failed { .. }
    ));
    assert_eq!(outcome.sync.reloads[0].module, "app_queue.so");

    let queues = fx.fs.get("queues.conf").unwrap();
    assert!(queues.contains("[support]\n; managed-by: pbxctl queue\nstrategy = ringall\n"));
    assert!(queues.contains("member = SIP/101\nmember = SIP/102\n"));
    let dialplan = fx.fs.get("extensions.conf").unwrap();
    assert!(dialplan.contains("exten => support,n,Queue(support)\n"));
}

// ── Routes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn outbound_route_with_prefix() {
    let fx = fixture();
    fx.pbx.create_trunk(trunk("T1")).await.unwrap();
    fx.reloader.take();

    fx.pbx
        .create_outbound_route(CreateOutboundRouteRequest {
            name: "local".into(),
            pattern: "9NXXXXXX".into(),
            trunk: "T1".into(),
            prefix: Some("9".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let dialplan = fx.fs.get("extensions.conf").unwrap();
    assert!(dialplan.contains("exten => _9NXXXXXX,n,Set(OUTNUM=${EXTEN:1})\n"));
    assert!(dialplan.contains("exten => _9NXXXXXX,n,Dial(SIP/${OUTNUM}@T1,60)\n"));
    assert!(dialplan.contains("exten => _X.,1,Goto(outbound,${EXTEN},1)\n"));
    assert_eq!(fx.reloader.take(), vec!["pbx_config.so"]);
}

#[tokio::test]
async fn inbound_routes_render_did_blocks() {
    let fx = fixture();
    fx.pbx
        .create_inbound_route(CreateInboundRouteRequest {
            name: "main".into(),
            did: Some("5551000".into()),
            destination: "support".into(),
            destination_type: DestinationType::Queue,
            caller_id_name: Some("Main line".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let dialplan = fx.fs.get("extensions.conf").unwrap();
    assert!(dialplan.contains(
        "exten => 5551000,1,NoOp(Inbound call for DID: 5551000)\n\
         exten => 5551000,n,Set(CALLERID(name)=Main line)\n\
         exten => 5551000,n,Goto(queues,support,1)\n\
         exten => 5551000,n,Hangup()\n"
    ));
}

// ── Validation ──────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_extension_writes_nothing() {
    let fx = fixture();
    let mut request = extension("10 1");
    request.email = Some("nope".into());

    let err = fx.pbx.create_extension(request).await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }), "{err:?}");
    assert_eq!(fx.fs.write_count("sip.conf"), 0);
    assert!(fx.pbx.list_extensions().await.unwrap().is_empty());
    assert!(fx.reloader.take().is_empty());
}

#[tokio::test]
async fn sip_names_are_shared_between_kinds() {
    let fx = fixture();
    fx.pbx.create_extension(extension("101")).await.unwrap();

    let err = fx.pbx.create_trunk(trunk("101")).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict { .. }), "{err:?}");

    let err = fx.pbx.create_extension(extension("101")).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict { .. }), "{err:?}");

    let err = fx.pbx.create_trunk(trunk("general")).await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }), "{err:?}");
}

#[tokio::test]
async fn duplicate_did_is_a_conflict() {
    let fx = fixture();
    let route = |name: &str| CreateInboundRouteRequest {
        name: name.into(),
        did: Some("5551000".into()),
        destination: "101".into(),
        ..Default::default()
    };
    fx.pbx.create_inbound_route(route("a")).await.unwrap();
    let err = fx.pbx.create_inbound_route(route("b")).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict { .. }), "{err:?}");
}

#[tokio::test]
async fn outbound_routes_pin_their_trunk() {
    let fx = fixture();
    let route = CreateOutboundRouteRequest {
        name: "intl".into(),
        pattern: "_011.".into(),
        trunk: "T1".into(),
        ..Default::default()
    };

    let err = fx
        .pbx
        .create_outbound_route(route.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }), "{err:?}");

    fx.pbx.create_trunk(trunk("T1")).await.unwrap();
    fx.pbx.create_outbound_route(route).await.unwrap();

    let err = fx.pbx.delete_trunk("T1").await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict { .. }), "{err:?}");

    let rename = UpdateTrunkRequest {
        name: Some("T2".into()),
        ..Default::default()
    };
    let err = fx.pbx.update_trunk("T1", rename).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict { .. }), "{err:?}");

    fx.pbx.delete_outbound_route("intl").await.unwrap();
    fx.pbx.delete_trunk("T1").await.unwrap();
    assert!(!fx.fs.get("sip.conf").unwrap().contains("[T1]"));
}

// ── Queue members ───────────────────────────────────────────────────

#[tokio::test]
async fn queue_member_edits() {
    let fx = fixture();
    fx.pbx
        .create_queue(CreateQueueRequest {
            name: "sales".into(),
            members: vec!["101".into()],
            ..Default::default()
        })
        .await
        .unwrap();

    let queue = fx
        .pbx
        .add_queue_member("sales", "102")
        .await
        .unwrap()
        .record;
    assert_eq!(queue.members, vec!["101", "102"]);

    let err = fx.pbx.add_queue_member("sales", "102").await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict { .. }), "{err:?}");

    let queue = fx
        .pbx
        .remove_queue_member("sales", "101")
        .await
        .unwrap()
        .record;
    assert_eq!(queue.members, vec!["102"]);

    let err = fx
        .pbx
        .remove_queue_member("sales", "101")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }), "{err:?}");

    let text = fx.fs.get("queues.conf").unwrap();
    assert!(text.contains("member = SIP/102\n"));
    assert!(!text.contains("member = SIP/101"));
}

#[tokio::test]
async fn queue_runtime_needs_a_switch() {
    let fx = fixture();
    let err = fx.pbx.queue_status(None).await.unwrap_err();
    assert!(matches!(err, CoreError::NotConnected), "{err:?}");
}
