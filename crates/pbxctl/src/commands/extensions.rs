//! Extension command handlers.

use tabled::Tabled;

use pbxctl_core::{
    CreateExtensionRequest, DtmfMode, Extension, NatMode, PbxConfig, SipTransport,
    UpdateExtensionRequest,
};

use crate::cli::{ExtensionFields, ExtensionsArgs, ExtensionsCommand, GlobalOpts, KeyArg};
use crate::error::CliError;
use crate::output;

use super::{util, with_pbx};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ExtensionRow {
    #[tabled(rename = "Ext")]
    extension: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Context")]
    context: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Transport")]
    transport: String,
    #[tabled(rename = "Limit")]
    call_limit: u32,
}

impl From<&Extension> for ExtensionRow {
    fn from(e: &Extension) -> Self {
        Self {
            extension: e.extension.clone(),
            name: e.name.clone(),
            context: e.context.clone(),
            host: e.host.clone(),
            transport: e.transport.to_string(),
            call_limit: e.call_limit,
        }
    }
}

fn detail(e: &Extension) -> String {
    output::detail(&[
        ("ID", e.id.to_string()),
        ("Extension", e.extension.clone()),
        ("Name", e.name.clone()),
        ("Context", e.context.clone()),
        ("Host", e.host.clone()),
        ("Call group", output::or_dash(e.call_group.as_deref())),
        ("Pickup group", output::or_dash(e.pickup_group.as_deref())),
        ("Mailbox", output::or_dash(e.mailbox.as_deref())),
        ("Email", output::or_dash(e.email.as_deref())),
        ("DTMF", e.dtmf_mode.to_string()),
        ("Transport", e.transport.to_string()),
        ("NAT", e.nat.to_string()),
        ("Call limit", e.call_limit.to_string()),
        ("Codecs", format!("-{} +{}", e.disallow, e.allow)),
        ("Updated", e.updated_at.to_rfc3339()),
    ])
}

fn number(e: &Extension) -> String {
    e.extension.clone()
}

/// Whether the subcommand writes to the store (and so reloads the switch).
pub fn mutates(cmd: &ExtensionsCommand) -> bool {
    !matches!(cmd, ExtensionsCommand::List | ExtensionsCommand::Get(_))
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    args: ExtensionsArgs,
    config: &PbxConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let live = !global.offline;

    match args.command {
        ExtensionsCommand::List => {
            let all = with_pbx(
                config,
                false,
                |pbx| async move { pbx.list_extensions().await },
            )
            .await?;
            let out =
                output::render_list(&global.format(), &all, |r| ExtensionRow::from(r), number)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ExtensionsCommand::Get(KeyArg { key }) => {
            let ext = with_pbx(
                config,
                false,
                |pbx| async move { pbx.extension(&key).await },
            )
            .await?;
            let out = output::render_single(&global.format(), &ext, detail, number)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ExtensionsCommand::Create(create) => {
            let fields = parse_fields(create.fields)?;
            let request = CreateExtensionRequest {
                extension: create.extension,
                name: create.name,
                secret: create.secret,
                context: fields.context,
                host: fields.host,
                call_group: fields.call_group,
                pickup_group: fields.pickup_group,
                mailbox: fields.mailbox,
                email: fields.email,
                dtmf_mode: fields.dtmf_mode,
                transport: fields.transport,
                nat: fields.nat,
                call_limit: fields.call_limit,
                disallow: fields.disallow,
                allow: fields.allow,
            };
            let outcome = with_pbx(config, live, |pbx| async move {
                pbx.create_extension(request).await
            })
            .await?;
            let message = format!("Extension {} created", outcome.record.extension);
            util::report_mutation(&outcome, &message, global, detail, number)
        }

        ExtensionsCommand::Update {
            key,
            number: renumber,
            name,
            secret,
            fields,
        } => {
            let fields = parse_fields(fields)?;
            let request = UpdateExtensionRequest {
                extension: renumber,
                name,
                secret,
                context: fields.context,
                host: fields.host,
                call_group: fields.call_group,
                pickup_group: fields.pickup_group,
                mailbox: fields.mailbox,
                email: fields.email,
                dtmf_mode: fields.dtmf_mode,
                transport: fields.transport,
                nat: fields.nat,
                call_limit: fields.call_limit,
                disallow: fields.disallow,
                allow: fields.allow,
            };
            let outcome = with_pbx(config, live, |pbx| async move {
                pbx.update_extension(&key, request).await
            })
            .await?;
            let message = format!("Extension {} updated", outcome.record.extension);
            util::report_mutation(&outcome, &message, global, detail, number)
        }

        ExtensionsCommand::Delete(KeyArg { key }) => {
            if !util::confirm(&format!("Delete extension {key}?"), global.yes)? {
                return Ok(());
            }
            let outcome = with_pbx(config, live, |pbx| async move {
                pbx.delete_extension(&key).await
            })
            .await?;
            output::success(
                &format!("Extension {} deleted", outcome.record.extension),
                &global.color,
                global.quiet,
            );
            util::report_sync(&outcome.sync, global);
            Ok(())
        }
    }
}

// ── Field parsing ───────────────────────────────────────────────────

/// `ExtensionFields` with the enum flags parsed.
struct ParsedFields {
    context: Option<String>,
    host: Option<String>,
    call_group: Option<String>,
    pickup_group: Option<String>,
    mailbox: Option<String>,
    email: Option<String>,
    dtmf_mode: Option<DtmfMode>,
    transport: Option<SipTransport>,
    nat: Option<NatMode>,
    call_limit: Option<u32>,
    disallow: Option<String>,
    allow: Option<String>,
}

fn parse_fields(fields: ExtensionFields) -> Result<ParsedFields, CliError> {
    Ok(ParsedFields {
        dtmf_mode: util::parse_enum("dtmf-mode", fields.dtmf_mode)?,
        transport: util::parse_enum("transport", fields.transport)?,
        nat: util::parse_enum("nat", fields.nat)?,
        context: fields.context,
        host: fields.host,
        call_group: fields.call_group,
        pickup_group: fields.pickup_group,
        mailbox: fields.mailbox,
        email: fields.email,
        call_limit: fields.call_limit,
        disallow: fields.disallow,
        allow: fields.allow,
    })
}
