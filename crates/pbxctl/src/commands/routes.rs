//! Inbound and outbound route command handlers.

use tabled::Tabled;

use pbxctl_core::{
    CreateInboundRouteRequest, CreateOutboundRouteRequest, DestinationType, InboundRoute,
    OutboundRoute, PbxConfig, UpdateInboundRouteRequest, UpdateOutboundRouteRequest,
};

use crate::cli::{
    GlobalOpts, InboundRouteFields, InboundRoutesArgs, InboundRoutesCommand, KeyArg,
    OutboundRouteFields, OutboundRoutesArgs, OutboundRoutesCommand,
};
use crate::error::CliError;
use crate::output;

use super::{util, with_pbx};

// ── Inbound ─────────────────────────────────────────────────────────

#[derive(Tabled)]
struct InboundRow {
    #[tabled(rename = "Prio")]
    priority: i32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "DID")]
    did: String,
    #[tabled(rename = "Destination")]
    destination: String,
    #[tabled(rename = "Type")]
    destination_type: String,
}

impl From<&InboundRoute> for InboundRow {
    fn from(r: &InboundRoute) -> Self {
        Self {
            priority: r.priority,
            name: r.name.clone(),
            did: r.did.clone().unwrap_or_else(|| "(any)".into()),
            destination: r.destination.clone(),
            destination_type: r.destination_type.to_string(),
        }
    }
}

fn inbound_detail(r: &InboundRoute) -> String {
    output::detail(&[
        ("ID", r.id.to_string()),
        ("Name", r.name.clone()),
        ("DID", r.did.clone().unwrap_or_else(|| "(any)".into())),
        ("Destination", r.destination.clone()),
        ("Type", r.destination_type.to_string()),
        (
            "Caller ID name",
            output::or_dash(r.caller_id_name.as_deref()),
        ),
        ("Priority", r.priority.to_string()),
        ("Updated", r.updated_at.to_rfc3339()),
    ])
}

fn inbound_name(r: &InboundRoute) -> String {
    r.name.clone()
}

pub fn inbound_mutates(cmd: &InboundRoutesCommand) -> bool {
    !matches!(
        cmd,
        InboundRoutesCommand::List | InboundRoutesCommand::Get(_)
    )
}

pub async fn handle_inbound(
    args: InboundRoutesArgs,
    config: &PbxConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let live = !global.offline;

    match args.command {
        InboundRoutesCommand::List => {
            let all = with_pbx(config, false, |pbx| async move {
                pbx.list_inbound_routes().await
            })
            .await?;
            let out = output::render_list(
                &global.format(),
                &all,
                |r| InboundRow::from(r),
                inbound_name,
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        InboundRoutesCommand::Get(KeyArg { key }) => {
            let route = with_pbx(
                config,
                false,
                |pbx| async move { pbx.inbound_route(&key).await },
            )
            .await?;
            let out =
                output::render_single(&global.format(), &route, inbound_detail, inbound_name)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        InboundRoutesCommand::Create {
            name,
            destination,
            fields,
        } => {
            let InboundRouteFields {
                did,
                destination_type,
                caller_id_name,
                priority,
            } = fields;
            let request = CreateInboundRouteRequest {
                name,
                did,
                destination,
                destination_type: parse_destination_type(destination_type)?.unwrap_or_default(),
                caller_id_name,
                priority: priority.unwrap_or(0),
            };
            let outcome = with_pbx(config, live, |pbx| async move {
                pbx.create_inbound_route(request).await
            })
            .await?;
            let message = format!("Inbound route {} created", outcome.record.name);
            util::report_mutation(&outcome, &message, global, inbound_detail, inbound_name)
        }

        InboundRoutesCommand::Update {
            key,
            rename,
            destination,
            fields,
        } => {
            let InboundRouteFields {
                did,
                destination_type,
                caller_id_name,
                priority,
            } = fields;
            let request = UpdateInboundRouteRequest {
                name: rename,
                did,
                destination,
                destination_type: parse_destination_type(destination_type)?,
                caller_id_name,
                priority,
            };
            let outcome = with_pbx(config, live, |pbx| async move {
                pbx.update_inbound_route(&key, request).await
            })
            .await?;
            let message = format!("Inbound route {} updated", outcome.record.name);
            util::report_mutation(&outcome, &message, global, inbound_detail, inbound_name)
        }

        InboundRoutesCommand::Delete(KeyArg { key }) => {
            if !util::confirm(&format!("Delete inbound route {key}?"), global.yes)? {
                return Ok(());
            }
            let outcome = with_pbx(config, live, |pbx| async move {
                pbx.delete_inbound_route(&key).await
            })
            .await?;
            output::success(
                &format!("Inbound route {} deleted", outcome.record.name),
                &global.color,
                global.quiet,
            );
            util::report_sync(&outcome.sync, global);
            Ok(())
        }
    }
}

fn parse_destination_type(value: Option<String>) -> Result<Option<DestinationType>, CliError> {
    util::parse_enum("destination-type", value)
}

// ── Outbound ────────────────────────────────────────────────────────

#[derive(Tabled)]
struct OutboundRow {
    #[tabled(rename = "Prio")]
    priority: i32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Pattern")]
    pattern: String,
    #[tabled(rename = "Trunk")]
    trunk: String,
    #[tabled(rename = "Strip")]
    prefix: String,
    #[tabled(rename = "Prepend")]
    prepend: String,
}

impl From<&OutboundRoute> for OutboundRow {
    fn from(r: &OutboundRoute) -> Self {
        Self {
            priority: r.priority,
            name: r.name.clone(),
            pattern: r.pattern.clone(),
            trunk: r.trunk.clone(),
            prefix: output::or_dash(r.prefix.as_deref()),
            prepend: output::or_dash(r.prepend.as_deref()),
        }
    }
}

fn outbound_detail(r: &OutboundRoute) -> String {
    output::detail(&[
        ("ID", r.id.to_string()),
        ("Name", r.name.clone()),
        ("Pattern", r.pattern.clone()),
        ("Trunk", r.trunk.clone()),
        ("Strip prefix", output::or_dash(r.prefix.as_deref())),
        ("Prepend", output::or_dash(r.prepend.as_deref())),
        (
            "Caller ID name",
            output::or_dash(r.caller_id_name.as_deref()),
        ),
        (
            "Caller ID number",
            output::or_dash(r.caller_id_number.as_deref()),
        ),
        ("Priority", r.priority.to_string()),
        ("Updated", r.updated_at.to_rfc3339()),
    ])
}

fn outbound_name(r: &OutboundRoute) -> String {
    r.name.clone()
}

pub fn outbound_mutates(cmd: &OutboundRoutesCommand) -> bool {
    !matches!(
        cmd,
        OutboundRoutesCommand::List | OutboundRoutesCommand::Get(_)
    )
}

pub async fn handle_outbound(
    args: OutboundRoutesArgs,
    config: &PbxConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let live = !global.offline;

    match args.command {
        OutboundRoutesCommand::List => {
            let all = with_pbx(config, false, |pbx| async move {
                pbx.list_outbound_routes().await
            })
            .await?;
            let out = output::render_list(
                &global.format(),
                &all,
                |r| OutboundRow::from(r),
                outbound_name,
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OutboundRoutesCommand::Get(KeyArg { key }) => {
            let route = with_pbx(config, false, |pbx| async move {
                pbx.outbound_route(&key).await
            })
            .await?;
            let out =
                output::render_single(&global.format(), &route, outbound_detail, outbound_name)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OutboundRoutesCommand::Create {
            name,
            pattern,
            trunk,
            fields,
        } => {
            let OutboundRouteFields {
                prepend,
                prefix,
                caller_id_name,
                caller_id_number,
                priority,
            } = fields;
            let request = CreateOutboundRouteRequest {
                name,
                pattern,
                trunk,
                prepend,
                prefix,
                caller_id_name,
                caller_id_number,
                priority: priority.unwrap_or(0),
            };
            let outcome = with_pbx(config, live, |pbx| async move {
                pbx.create_outbound_route(request).await
            })
            .await?;
            let message = format!("Outbound route {} created", outcome.record.name);
            util::report_mutation(&outcome, &message, global, outbound_detail, outbound_name)
        }

        OutboundRoutesCommand::Update {
            key,
            rename,
            pattern,
            trunk,
            fields,
        } => {
            let OutboundRouteFields {
                prepend,
                prefix,
                caller_id_name,
                caller_id_number,
                priority,
            } = fields;
            let request = UpdateOutboundRouteRequest {
                name: rename,
                pattern,
                trunk,
                prepend,
                prefix,
                caller_id_name,
                caller_id_number,
                priority,
            };
            let outcome = with_pbx(config, live, |pbx| async move {
                pbx.update_outbound_route(&key, request).await
            })
            .await?;
            let message = format!("Outbound route {} updated", outcome.record.name);
            util::report_mutation(&outcome, &message, global, outbound_detail, outbound_name)
        }

        OutboundRoutesCommand::Delete(KeyArg { key }) => {
            if !util::confirm(&format!("Delete outbound route {key}?"), global.yes)? {
                return Ok(());
            }
            let outcome = with_pbx(config, live, |pbx| async move {
                pbx.delete_outbound_route(&key).await
            })
            .await?;
            output::success(
                &format!("Outbound route {} deleted", outcome.record.name),
                &global.color,
                global.quiet,
            );
            util::report_sync(&outcome.sync, global);
            Ok(())
        }
    }
}
