//! `pbxctl dashboard`: counts from the store plus live switch state when
//! the switch answers.

use pbxctl_ami::ReconnectPolicy;
use pbxctl_core::{Dashboard, Pbx, PbxConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

fn detail(d: &Dashboard) -> String {
    let calls = &d.calls_today;
    let mut pairs = vec![
        ("Extensions", d.extensions.to_string()),
        ("Trunks", d.trunks.to_string()),
        ("Queues", d.queues.to_string()),
        ("Inbound routes", d.inbound_routes.to_string()),
        ("Outbound routes", d.outbound_routes.to_string()),
        (
            "Calls today",
            format!(
                "{} ({} answered, {} no answer, {} busy, {} failed)",
                calls.total, calls.answered, calls.no_answer, calls.busy, calls.failed
            ),
        ),
        ("Avg duration", format!("{:.1}s", calls.average_duration)),
        (
            "Active calls",
            d.active_calls.map_or_else(|| "-".into(), |n| n.to_string()),
        ),
    ];
    match (&d.switch, &d.switch_error) {
        (Some(status), _) => {
            pairs.push(("Switch", output::or_dash(status.version.as_deref())));
            pairs.push(("Started", output::or_dash(status.startup.as_deref())));
        }
        (None, Some(error)) => pairs.push(("Switch", format!("unavailable: {error}"))),
        (None, None) => pairs.push(("Switch", "offline".into())),
    }
    output::detail(&pairs)
}

pub async fn handle(config: &PbxConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let (pbx, connect_error) = if global.offline {
        (Pbx::open(config).await?, None)
    } else {
        let mut cfg = config.clone();
        cfg.manager.reconnect = ReconnectPolicy::none();
        match Pbx::connect(&cfg).await {
            Ok(pbx) => (pbx, None),
            Err(e) => {
                tracing::debug!(error = %e, "dashboard continues without the switch");
                (Pbx::open(config).await?, Some(e.to_string()))
            }
        }
    };

    let result = pbx.dashboard().await;
    pbx.shutdown().await;
    let mut dashboard = result?;
    if dashboard.switch_error.is_none() {
        dashboard.switch_error = connect_error;
    }

    let out = output::render_single(&global.format(), &dashboard, detail, |d| {
        d.extensions.to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
