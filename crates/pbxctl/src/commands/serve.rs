//! `pbxctl serve`: stay logged in, record CDRs and call events, and follow
//! the session through reconnects until interrupted.

use std::time::Duration;

use pbxctl_ami::ConnectionState;
use pbxctl_core::{Pbx, PbxConfig};
use tracing::{error, info, warn};

use crate::cli::{GlobalOpts, ServeArgs};
use crate::error::CliError;

use super::util;

const GIVE_UP_CHECK: Duration = Duration::from_secs(1);

pub async fn handle(
    args: ServeArgs,
    config: PbxConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let pbx = Pbx::connect(&config).await?;
    let listeners = pbx.spawn_listeners()?;
    info!(
        switch = %config.ami_target(),
        listeners = listeners.len(),
        sip_trace = pbx.sip_trace_enabled(),
        "serving"
    );

    if args.sync {
        let report = pbx.sync_all().await;
        info!(
            written = report.written().count(),
            files = report.files.len(),
            "initial config sync"
        );
        util::report_sync(&report, global);
    }

    let result = supervise(&pbx).await;

    info!("shutting down");
    for listener in &listeners {
        listener.abort();
    }
    pbx.shutdown().await;
    result
}

/// Log state transitions until Ctrl-C, or until the client gives up
/// reconnecting.
async fn supervise(pbx: &Pbx) -> Result<(), CliError> {
    let client = pbx.switch()?.client().clone();
    let mut states = client.state_changes();
    let max_attempts = client.config().reconnect.max_attempts;
    let gave_up = || {
        client.state() == ConnectionState::Disconnected
            && max_attempts.is_some_and(|max| client.reconnect_attempts() > max)
    };
    let mut check = tokio::time::interval(GIVE_UP_CHECK);

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                return Ok(());
            }
            changed = states.changed() => {
                if changed.is_err() {
                    return Err(CliError::ConnectionLost);
                }
                let state = *states.borrow_and_update();
                match state {
                    ConnectionState::Connected => info!("switch session up"),
                    ConnectionState::Connecting => info!("reconnecting to switch"),
                    ConnectionState::Disconnected => {
                        warn!(attempts = client.reconnect_attempts(), "switch session down");
                    }
                }
            }
            _ = check.tick() => {
                if gave_up() {
                    error!(
                        attempts = client.reconnect_attempts(),
                        "switch unreachable, reconnect limit reached"
                    );
                    return Err(CliError::ConnectionLost);
                }
            }
        }
    }
}
