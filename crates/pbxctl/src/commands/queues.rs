//! Queue command handlers: stored definitions plus live runtime control.

use tabled::Tabled;

use pbxctl_core::{CreateQueueRequest, PbxConfig, Queue, QueueStrategy, UpdateQueueRequest};

use crate::cli::{GlobalOpts, KeyArg, QueueFields, QueueMemberArgs, QueuesArgs, QueuesCommand};
use crate::error::CliError;
use crate::output;

use super::{util, with_pbx};

#[derive(Tabled)]
struct QueueRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Strategy")]
    strategy: String,
    #[tabled(rename = "Timeout")]
    timeout: u32,
    #[tabled(rename = "Max")]
    maxlen: String,
    #[tabled(rename = "Members")]
    members: String,
}

impl From<&Queue> for QueueRow {
    fn from(q: &Queue) -> Self {
        Self {
            name: q.name.clone(),
            strategy: q.strategy.to_string(),
            timeout: q.timeout,
            maxlen: if q.maxlen == 0 {
                "∞".into()
            } else {
                q.maxlen.to_string()
            },
            members: if q.members.is_empty() {
                "-".into()
            } else {
                q.members.join(", ")
            },
        }
    }
}

fn detail(q: &Queue) -> String {
    output::detail(&[
        ("ID", q.id.to_string()),
        ("Name", q.name.clone()),
        ("Strategy", q.strategy.to_string()),
        ("Ring timeout", format!("{}s", q.timeout)),
        ("Wrap-up", format!("{}s", q.wrapuptime)),
        (
            "Max callers",
            if q.maxlen == 0 {
                "unlimited".into()
            } else {
                q.maxlen.to_string()
            },
        ),
        ("Announce", output::or_dash(q.announce.as_deref())),
        ("Music class", q.music_class.clone()),
        ("Members", output::or_dash(Some(&q.members.join(", ")))),
        ("Updated", q.updated_at.to_rfc3339()),
    ])
}

fn name(q: &Queue) -> String {
    q.name.clone()
}

/// Whether the subcommand changes the stored queue definitions.
pub fn mutates(cmd: &QueuesCommand) -> bool {
    matches!(
        cmd,
        QueuesCommand::Create { .. }
            | QueuesCommand::Update { .. }
            | QueuesCommand::Delete(_)
            | QueuesCommand::AddMember(_)
            | QueuesCommand::RemoveMember(_)
    )
}

pub async fn handle(
    args: QueuesArgs,
    config: &PbxConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let live = !global.offline;

    match args.command {
        QueuesCommand::List => {
            let all = with_pbx(config, false, |pbx| async move { pbx.list_queues().await }).await?;
            let out = output::render_list(&global.format(), &all, |r| QueueRow::from(r), name)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        QueuesCommand::Get(KeyArg { key }) => {
            let queue = with_pbx(config, false, |pbx| async move { pbx.queue(&key).await }).await?;
            let out = output::render_single(&global.format(), &queue, detail, name)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        QueuesCommand::Create {
            name: queue_name,
            fields,
        } => {
            let QueueFields {
                strategy,
                ring_timeout,
                wrapuptime,
                maxlen,
                announce,
                members,
                music_class,
            } = fields;
            let strategy = parse_strategy(strategy)?;
            let request = CreateQueueRequest {
                name: queue_name,
                strategy,
                timeout: ring_timeout,
                wrapuptime,
                maxlen,
                announce,
                members,
                music_class,
            };
            let outcome = with_pbx(config, live, |pbx| async move {
                pbx.create_queue(request).await
            })
            .await?;
            let message = format!("Queue {} created", outcome.record.name);
            util::report_mutation(&outcome, &message, global, detail, name)
        }

        QueuesCommand::Update {
            key,
            rename,
            fields,
        } => {
            let QueueFields {
                strategy,
                ring_timeout,
                wrapuptime,
                maxlen,
                announce,
                members,
                music_class,
            } = fields;
            let strategy = parse_strategy(strategy)?;
            let request = UpdateQueueRequest {
                name: rename,
                strategy,
                timeout: ring_timeout,
                wrapuptime,
                maxlen,
                announce,
                members: (!members.is_empty()).then_some(members),
                music_class,
            };
            let outcome = with_pbx(config, live, |pbx| async move {
                pbx.update_queue(&key, request).await
            })
            .await?;
            let message = format!("Queue {} updated", outcome.record.name);
            util::report_mutation(&outcome, &message, global, detail, name)
        }

        QueuesCommand::Delete(KeyArg { key }) => {
            if !util::confirm(&format!("Delete queue {key}?"), global.yes)? {
                return Ok(());
            }
            let outcome = with_pbx(
                config,
                live,
                |pbx| async move { pbx.delete_queue(&key).await },
            )
            .await?;
            output::success(
                &format!("Queue {} deleted", outcome.record.name),
                &global.color,
                global.quiet,
            );
            util::report_sync(&outcome.sync, global);
            Ok(())
        }

        QueuesCommand::AddMember(QueueMemberArgs { queue, member }) => {
            let message = format!("Added {member} to queue {queue}");
            let outcome = with_pbx(config, live, |pbx| async move {
                pbx.add_queue_member(&queue, &member).await
            })
            .await?;
            util::report_mutation(&outcome, &message, global, detail, name)
        }

        QueuesCommand::RemoveMember(QueueMemberArgs { queue, member }) => {
            let message = format!("Removed {member} from queue {queue}");
            let outcome = with_pbx(config, live, |pbx| async move {
                pbx.remove_queue_member(&queue, &member).await
            })
            .await?;
            util::report_mutation(&outcome, &message, global, detail, name)
        }

        // ── Runtime: always against the live switch ──
        QueuesCommand::Status { queue } => {
            let lines = with_pbx(config, true, |pbx| async move {
                pbx.queue_status(queue.as_deref()).await
            })
            .await?;
            util::print_lines(&lines, global)
        }

        QueuesCommand::Pause {
            member: QueueMemberArgs { queue, member },
            reason,
        } => {
            let message = format!("Paused {member} in queue {queue}");
            let lines = with_pbx(config, true, |pbx| async move {
                pbx.pause_queue_member(&queue, &member, reason.as_deref())
                    .await
            })
            .await?;
            runtime_done(&lines, &message, global)
        }

        QueuesCommand::Unpause(QueueMemberArgs { queue, member }) => {
            let message = format!("Unpaused {member} in queue {queue}");
            let lines = with_pbx(config, true, |pbx| async move {
                pbx.unpause_queue_member(&queue, &member).await
            })
            .await?;
            runtime_done(&lines, &message, global)
        }

        QueuesCommand::AddDynamic {
            member: QueueMemberArgs { queue, member },
            penalty,
        } => {
            let message = format!("Added dynamic member {member} to queue {queue}");
            let lines = with_pbx(config, true, |pbx| async move {
                pbx.add_dynamic_queue_member(&queue, &member, penalty).await
            })
            .await?;
            runtime_done(&lines, &message, global)
        }

        QueuesCommand::RemoveDynamic(QueueMemberArgs { queue, member }) => {
            let message = format!("Removed dynamic member {member} from queue {queue}");
            let lines = with_pbx(config, true, |pbx| async move {
                pbx.remove_dynamic_queue_member(&queue, &member).await
            })
            .await?;
            runtime_done(&lines, &message, global)
        }

        QueuesCommand::ResetStats { queue } => {
            let message = format!("Reset statistics of queue {queue}");
            let lines = with_pbx(config, true, |pbx| async move {
                pbx.reset_queue_stats(&queue).await
            })
            .await?;
            runtime_done(&lines, &message, global)
        }
    }
}

fn parse_strategy(value: Option<String>) -> Result<Option<QueueStrategy>, CliError> {
    util::parse_enum("strategy", value)
}

/// Echo whatever the switch console said, then confirm.
fn runtime_done(lines: &[String], message: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let lines: Vec<String> = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .cloned()
        .collect();
    util::print_lines(&lines, global)?;
    output::success(message, &global.color, global.quiet);
    Ok(())
}
