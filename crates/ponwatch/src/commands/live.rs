//! Live bandwidth view.

use std::io::Write;

use tabled::Tabled;

use ponwatch_core::{LiveRate, LiveUpdate, Poller};

use crate::cli::{GlobalOpts, LiveArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct RateRow {
    #[tabled(rename = "Slot")]
    slot: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Down kbps")]
    rx: String,
    #[tabled(rename = "Up kbps")]
    tx: String,
    #[tabled(rename = "Now")]
    instant: String,
}

impl From<&LiveRate> for RateRow {
    fn from(r: &LiveRate) -> Self {
        let instant = match (r.instant_rx_kbps, r.instant_tx_kbps) {
            (Some(rx), Some(tx)) => format!("{rx:.0}/{tx:.0}"),
            _ => "-".into(),
        };
        Self {
            slot: r.slot.to_string(),
            mac: r.mac.to_string(),
            rx: format!("{:.1}", r.rx_kbps),
            tx: format!("{:.1}", r.tx_kbps),
            instant,
        }
    }
}

/// One frame per update. Tables redraw in place on a terminal; the
/// structured formats stream one document per update.
fn render(update: &LiveUpdate, format: &OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => {
            let mut rates = update.rates.clone();
            rates.sort_by(|a, b| b.rx_kbps.total_cmp(&a.rx_kbps));
            let table = output::render_list(
                format,
                &rates,
                |r| RateRow::from(r),
                |r| r.mac.to_string(),
            )?;
            Ok(format!(
                "{} at {}\n{table}",
                update.olt,
                update.captured_at.format("%H:%M:%S")
            ))
        }
        OutputFormat::Json | OutputFormat::JsonCompact => Ok(serde_json::to_string(update)?),
        OutputFormat::Yaml => Ok(format!("---\n{}", serde_yaml::to_string(update)?)),
        OutputFormat::Plain => Ok(update
            .rates
            .iter()
            .map(|r| format!("{} {:.1} {:.1}", r.mac, r.rx_kbps, r.tx_kbps))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

pub async fn handle(poller: &Poller, args: LiveArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let id = util::olt_id(&args.olt);
    let mut feed = poller.live(&id)?;
    let redraw = matches!(global.output, OutputFormat::Table)
        && std::io::IsTerminal::is_terminal(&std::io::stdout());
    if !global.quiet {
        eprintln!(
            "Live feed for {id} every {}s (Ctrl-C to stop)",
            poller.config().live.interval.as_secs()
        );
    }

    let mut seen = 0_u64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = feed.recv() => {
                let Some(update) = update else { break };
                let frame = render(&update, &global.output)?;
                if redraw {
                    let mut stdout = std::io::stdout().lock();
                    let _ = write!(stdout, "\x1b[2J\x1b[H");
                    let _ = stdout.flush();
                }
                output::print_output(&frame, global.quiet);

                seen += 1;
                if args.updates.is_some_and(|n| seen >= n) {
                    break;
                }
            }
        }
    }

    drop(feed);
    poller.stop().await;
    Ok(())
}
