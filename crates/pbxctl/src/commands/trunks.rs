//! Trunk command handlers.

use tabled::Tabled;

use pbxctl_core::{
    CreateTrunkRequest, DtmfMode, NatMode, PbxConfig, SipTransport, Trunk, TrunkKind,
    UpdateTrunkRequest,
};

use crate::cli::{GlobalOpts, KeyArg, TrunkFields, TrunksArgs, TrunksCommand};
use crate::error::CliError;
use crate::output;

use super::{util, with_pbx};

#[derive(Tabled)]
struct TrunkRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "User")]
    username: String,
    #[tabled(rename = "Context")]
    context: String,
    #[tabled(rename = "Qualify")]
    qualify_freq: u32,
}

impl From<&Trunk> for TrunkRow {
    fn from(t: &Trunk) -> Self {
        Self {
            name: t.name.clone(),
            kind: t.kind.to_string(),
            host: t.host.clone(),
            username: output::or_dash(t.username.as_deref()),
            context: t.context.clone(),
            qualify_freq: t.qualify_freq,
        }
    }
}

fn detail(t: &Trunk) -> String {
    output::detail(&[
        ("ID", t.id.to_string()),
        ("Name", t.name.clone()),
        ("Kind", t.kind.to_string()),
        ("Host", t.host.clone()),
        ("Username", output::or_dash(t.username.as_deref())),
        (
            "Secret",
            if t.secret.as_deref().is_some_and(|s| !s.is_empty()) {
                "(set)".into()
            } else {
                "-".into()
            },
        ),
        ("Context", t.context.clone()),
        ("DTMF", t.dtmf_mode.to_string()),
        ("Transport", t.transport.to_string()),
        ("Insecure", t.insecure.clone()),
        ("NAT", t.nat.to_string()),
        ("Qualify", format!("{}s", t.qualify_freq)),
        ("Codecs", format!("-{} +{}", t.disallow, t.allow)),
        ("Updated", t.updated_at.to_rfc3339()),
    ])
}

fn name(t: &Trunk) -> String {
    t.name.clone()
}

pub fn mutates(cmd: &TrunksCommand) -> bool {
    !matches!(cmd, TrunksCommand::List | TrunksCommand::Get(_))
}

pub async fn handle(
    args: TrunksArgs,
    config: &PbxConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let live = !global.offline;

    match args.command {
        TrunksCommand::List => {
            let all = with_pbx(config, false, |pbx| async move { pbx.list_trunks().await }).await?;
            let out = output::render_list(&global.format(), &all, |r| TrunkRow::from(r), name)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        TrunksCommand::Get(KeyArg { key }) => {
            let trunk = with_pbx(config, false, |pbx| async move { pbx.trunk(&key).await }).await?;
            let out = output::render_single(&global.format(), &trunk, detail, name)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        TrunksCommand::Create {
            name: trunk_name,
            host,
            fields,
        } => {
            let f = parse_fields(fields)?;
            let request = CreateTrunkRequest {
                name: trunk_name,
                kind: f.kind,
                host,
                username: f.username,
                secret: f.secret,
                context: f.context,
                dtmf_mode: f.dtmf_mode,
                transport: f.transport,
                insecure: f.insecure,
                nat: f.nat,
                qualify_freq: f.qualify_freq,
                disallow: f.disallow,
                allow: f.allow,
            };
            let outcome = with_pbx(config, live, |pbx| async move {
                pbx.create_trunk(request).await
            })
            .await?;
            let message = format!("Trunk {} created", outcome.record.name);
            util::report_mutation(&outcome, &message, global, detail, name)
        }

        TrunksCommand::Update {
            key,
            rename,
            host,
            fields,
        } => {
            let f = parse_fields(fields)?;
            let request = UpdateTrunkRequest {
                name: rename,
                kind: f.kind,
                host,
                username: f.username,
                secret: f.secret,
                context: f.context,
                dtmf_mode: f.dtmf_mode,
                transport: f.transport,
                insecure: f.insecure,
                nat: f.nat,
                qualify_freq: f.qualify_freq,
                disallow: f.disallow,
                allow: f.allow,
            };
            let outcome = with_pbx(config, live, |pbx| async move {
                pbx.update_trunk(&key, request).await
            })
            .await?;
            let message = format!("Trunk {} updated", outcome.record.name);
            util::report_mutation(&outcome, &message, global, detail, name)
        }

        TrunksCommand::Delete(KeyArg { key }) => {
            if !util::confirm(&format!("Delete trunk {key}?"), global.yes)? {
                return Ok(());
            }
            let outcome = with_pbx(
                config,
                live,
                |pbx| async move { pbx.delete_trunk(&key).await },
            )
            .await?;
            output::success(
                &format!("Trunk {} deleted", outcome.record.name),
                &global.color,
                global.quiet,
            );
            util::report_sync(&outcome.sync, global);
            Ok(())
        }
    }
}

struct ParsedFields {
    kind: Option<TrunkKind>,
    username: Option<String>,
    secret: Option<String>,
    context: Option<String>,
    dtmf_mode: Option<DtmfMode>,
    transport: Option<SipTransport>,
    insecure: Option<String>,
    nat: Option<NatMode>,
    qualify_freq: Option<u32>,
    disallow: Option<String>,
    allow: Option<String>,
}

fn parse_fields(fields: TrunkFields) -> Result<ParsedFields, CliError> {
    Ok(ParsedFields {
        kind: util::parse_enum("kind", fields.kind)?,
        dtmf_mode: util::parse_enum("dtmf-mode", fields.dtmf_mode)?,
        transport: util::parse_enum("transport", fields.transport)?,
        nat: util::parse_enum("nat", fields.nat)?,
        username: fields.username,
        secret: fields.secret,
        context: fields.context,
        insecure: fields.insecure,
        qualify_freq: fields.qualify_freq,
        disallow: fields.disallow,
        allow: fields.allow,
    })
}
