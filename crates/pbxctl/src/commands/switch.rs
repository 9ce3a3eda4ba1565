//! Live switch commands: status, channels, peers, call control, console.

use std::collections::BTreeMap;

use tabled::Tabled;

use pbxctl_core::{
    ChannelInfo, ExtensionState, OriginateRequest, PbxConfig, PeerInfo, SwitchStatus,
};

use crate::cli::{Command, GlobalOpts, OriginateArgs};
use crate::error::CliError;
use crate::output;

use super::{util, with_pbx};

// ── Rows ────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct ChannelRow {
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Caller")]
    caller: String,
    #[tabled(rename = "Exten")]
    extension: String,
    #[tabled(rename = "App")]
    application: String,
    #[tabled(rename = "Duration")]
    duration: String,
}

impl From<&ChannelInfo> for ChannelRow {
    fn from(c: &ChannelInfo) -> Self {
        let caller = if c.caller_id_name.is_empty() {
            c.caller_id_num.clone()
        } else {
            format!("{} <{}>", c.caller_id_name, c.caller_id_num)
        };
        Self {
            channel: c.channel.clone(),
            state: c.state.clone(),
            caller,
            extension: format!("{}@{}", c.extension, c.context),
            application: c.application.clone(),
            duration: c.duration.clone(),
        }
    }
}

#[derive(Tabled)]
struct PeerRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Dynamic")]
    dynamic: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&PeerInfo> for PeerRow {
    fn from(p: &PeerInfo) -> Self {
        let address = match (&p.address, p.port) {
            (Some(addr), Some(port)) => format!("{addr}:{port}"),
            (Some(addr), None) => addr.clone(),
            (None, _) => "-".into(),
        };
        Self {
            name: p.name.clone(),
            address,
            dynamic: if p.dynamic { "yes" } else { "no" }.into(),
            status: p.status.clone(),
        }
    }
}

fn status_detail(s: &SwitchStatus) -> String {
    output::detail(&[
        ("Version", output::or_dash(s.version.as_deref())),
        ("AMI version", output::or_dash(s.ami_version.as_deref())),
        ("Started", output::or_dash(s.startup.as_deref())),
        ("Last reload", output::or_dash(s.last_reload.as_deref())),
        ("Current calls", s.current_calls.to_string()),
        (
            "Max calls",
            s.max_calls
                .map_or_else(|| "unlimited".into(), |n| n.to_string()),
        ),
    ])
}

fn state_detail(s: &ExtensionState) -> String {
    output::detail(&[
        ("Extension", format!("{}@{}", s.extension, s.context)),
        ("State", s.status.to_string()),
        ("Code", s.code.to_string()),
        ("Hint", output::or_dash(s.hint.as_deref())),
    ])
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(cmd: Command, config: &PbxConfig, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Status => {
            let status = with_pbx(
                config,
                true,
                |pbx| async move { pbx.switch()?.status().await },
            )
            .await?;
            let out = output::render_single(&global.format(), &status, status_detail, |s| {
                s.version.clone().unwrap_or_default()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        Command::Channels => {
            let channels = with_pbx(
                config,
                true,
                |pbx| async move { pbx.switch()?.channels().await },
            )
            .await?;
            let out = output::render_list(
                &global.format(),
                &channels,
                |r| ChannelRow::from(r),
                |c| c.channel.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        Command::Peers => {
            let peers = with_pbx(
                config,
                true,
                |pbx| async move { pbx.switch()?.peers().await },
            )
            .await?;
            let out = output::render_list(
                &global.format(),
                &peers,
                |r| PeerRow::from(r),
                |p| p.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        Command::ExtState { extension, context } => {
            let state = with_pbx(config, true, |pbx| async move {
                pbx.switch()?
                    .extension_state(&extension, context.as_deref())
                    .await
            })
            .await?;
            let out = output::render_single(&global.format(), &state, state_detail, |s| {
                s.status.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        Command::Originate(args) => {
            let request = originate_request(args)?;
            let summary = format!(
                "Call from {} to {} queued",
                request.channel, request.extension
            );
            let accepted = with_pbx(config, true, |pbx| async move {
                pbx.switch()?.originate(request).await
            })
            .await?;
            if let Some(message) = accepted.message.filter(|m| !m.is_empty()) {
                tracing::debug!(%message, "originate accepted");
            }
            output::success(&summary, &global.color, global.quiet);
            Ok(())
        }

        Command::Hangup { channel } => {
            let message = format!("Hung up {channel}");
            with_pbx(config, true, |pbx| async move {
                pbx.switch()?.hangup(&channel).await
            })
            .await?;
            output::success(&message, &global.color, global.quiet);
            Ok(())
        }

        Command::Cli { command } => {
            let line = command.join(" ");
            let lines = with_pbx(config, true, |pbx| async move {
                pbx.switch()?.command(&line).await
            })
            .await?;
            util::print_lines(&lines, global)
        }

        Command::Reload { module } => {
            let message = match &module {
                Some(m) => format!("Reloaded {m}"),
                None => "Reloaded all modules".into(),
            };
            with_pbx(config, true, |pbx| async move {
                pbx.switch()?.reload(module.as_deref()).await
            })
            .await?;
            output::success(&message, &global.color, global.quiet);
            Ok(())
        }

        other => Err(CliError::Internal(format!(
            "not a switch command: {other:?}"
        ))),
    }
}

fn originate_request(args: OriginateArgs) -> Result<OriginateRequest, CliError> {
    let mut request = OriginateRequest::new(args.channel, args.extension);
    if let Some(context) = args.context {
        request.context = context;
    }
    request.priority = args.priority;
    request.caller_id = args.caller_id;
    request.timeout_ms = args.timeout_ms;
    request.variables = parse_variables(&args.variables)?;
    Ok(request)
}

/// `NAME=VALUE` pairs; the value may itself contain `=`.
fn parse_variables(raw: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    raw.iter()
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok((name.trim().to_owned(), value.to_owned()))
            }
            _ => Err(CliError::Validation {
                field: "var".into(),
                reason: format!("expected NAME=VALUE, got '{pair}'"),
            }),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn variables_split_on_first_equals() {
        let vars = parse_variables(&["A=1".into(), "URL=x=y".into()]).unwrap();
        assert_eq!(vars["A"], "1");
        assert_eq!(vars["URL"], "x=y");
    }

    #[test]
    fn variable_without_name_is_rejected() {
        assert!(parse_variables(&["=1".into()]).is_err());
        assert!(parse_variables(&["novalue".into()]).is_err());
    }

    #[test]
    fn originate_keeps_default_context() {
        let request = originate_request(OriginateArgs {
            channel: "101".into(),
            extension: "102".into(),
            context: None,
            priority: 1,
            caller_id: None,
            timeout_ms: Some(30_000),
            variables: vec![],
        })
        .unwrap();
        assert_eq!(request.context, "internal");
        assert_eq!(request.timeout_ms, Some(30_000));
    }
}
