//! Continuous polling.

use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;

use ponwatch_core::{Notification, Poller, TerminalRef};

use crate::cli::{GlobalOpts, OutputFormat, RunArgs};
use crate::error::CliError;
use crate::output;

fn refs(list: &[TerminalRef]) -> String {
    list.iter()
        .map(|t| {
            let name = match t.description.as_deref() {
                Some(d) if !d.is_empty() => format!("{} ({d})", t.key.slot()),
                _ => t.key.slot().to_string(),
            };
            if t.alert_suppressed {
                format!("{name} [repeat]")
            } else {
                name
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// One human-readable line (or a few) per notification.
fn describe(n: &Notification, color: bool) -> String {
    let mut lines = Vec::new();
    match n {
        Notification::TerminalBatch {
            olt,
            registered,
            came_online,
            went_offline,
            removed,
        } => {
            if !registered.is_empty() {
                lines.push(format!("{olt}: {} new: {}", registered.len(), refs(registered)));
            }
            if !came_online.is_empty() {
                let tag = if color { "online".green().to_string() } else { "online".into() };
                lines.push(format!("{olt}: {} {tag}: {}", came_online.len(), refs(came_online)));
            }
            if !went_offline.is_empty() {
                let tag = if color { "offline".red().to_string() } else { "offline".into() };
                lines.push(format!("{olt}: {} {tag}: {}", went_offline.len(), refs(went_offline)));
            }
            if !removed.is_empty() {
                lines.push(format!("{olt}: {} removed: {}", removed.len(), refs(removed)));
            }
        }
        Notification::HealthThreshold {
            olt,
            metric,
            value,
            threshold,
        } => lines.push(format!("{olt}: {metric} at {value:.1} (threshold {threshold:.1})")),
        Notification::OltUnreachable { olt, error } => {
            let tag = if color { "unreachable".red().to_string() } else { "unreachable".into() };
            lines.push(format!("{olt}: {tag}: {error}"));
        }
        Notification::OltRecovered { olt } => {
            let tag = if color { "recovered".green().to_string() } else { "recovered".into() };
            lines.push(format!("{olt}: {tag}"));
        }
    }
    lines.join("\n")
}

fn render(n: &Notification, global: &GlobalOpts, color: bool) -> Result<String, CliError> {
    Ok(match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(n)?,
        OutputFormat::Yaml => format!("---\n{}", serde_yaml::to_string(n)?),
        OutputFormat::Table | OutputFormat::Plain => {
            let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            describe(n, color)
                .lines()
                .map(|l| format!("{stamp} {l}"))
                .collect::<Vec<_>>()
                .join("\n")
        }
    })
}

pub async fn handle(poller: &Poller, args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let mut rx = poller.notifications();

    tracing::info!(
        olts = poller.olts().count(),
        interval_secs = poller.config().poll_interval.as_secs(),
        "starting continuous polling"
    );
    if !args.no_initial_poll {
        let report = poller.poll_now().await;
        tracing::info!(
            polled = report.outcomes.len(),
            failed = report.failures.len(),
            "initial cycle finished"
        );
    }
    poller.start().await;

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, shutting down");
                break;
            }
            received = rx.recv() => match received {
                Ok(notification) => {
                    let line = render(&notification, global, color)?;
                    output::print_output(&line, global.quiet);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notification output fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    poller.stop().await;
    Ok(())
}
