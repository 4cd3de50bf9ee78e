//! Terminal listing.

use std::io::Write;
use std::sync::Arc;

use tabled::Tabled;
use tokio_stream::StreamExt;

use ponwatch_core::{OltId, Onu, PollMode, Poller, TerminalRepository};

use crate::cli::{GlobalOpts, OnusArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct OnuRow {
    #[tabled(rename = "Slot")]
    slot: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "RX dBm")]
    rx: String,
    #[tabled(rename = "TX dBm")]
    tx: String,
    #[tabled(rename = "ONU RX")]
    self_rx: String,
    #[tabled(rename = "Dist m")]
    distance: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

fn row(onu: &Onu, color: bool) -> OnuRow {
    OnuRow {
        slot: onu.key.slot().to_string(),
        mac: output::fmt_opt(onu.mac.as_ref()),
        description: onu.description.clone().unwrap_or_default(),
        state: output::paint_state(onu.state, color),
        rx: output::paint_rx(onu.olt_optics.rx_power_dbm, color),
        tx: output::fmt_opt(onu.olt_optics.tx_power_dbm.map(|v| format!("{v:.2}"))),
        self_rx: output::paint_rx(onu.self_reported.rx_power_dbm, color),
        distance: output::fmt_opt(onu.distance_m),
        last_seen: util::ago(onu.last_seen),
    }
}

/// Whether `onu` passes every filter flag.
fn matches(onu: &Onu, args: &OnusArgs) -> bool {
    if args.offline && onu.is_online() {
        return false;
    }
    if args.online && !onu.is_online() {
        return false;
    }
    if args.port.is_some_and(|p| p != onu.key.port) {
        return false;
    }
    if let Some(level) = args.weaker_than {
        return onu.olt_optics.rx_power_dbm.is_some_and(|rx| rx < level);
    }
    true
}

fn render(onus: &[Onu], global: &GlobalOpts) -> Result<String, CliError> {
    let color = output::should_color(&global.color);
    output::render_list(
        &global.output,
        onus,
        |o| row(o, color),
        |o| o.key.slot().to_string(),
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(poller: &Poller, args: OnusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let id = util::olt_id(&args.olt);
    let bar = util::spinner(format!("Polling {id}"), global.quiet);
    let result = poller.poll_olt(&id, PollMode::Background).await;
    bar.finish_and_clear();
    result?;

    if args.watch {
        return watch(poller, &id, &args, global).await;
    }

    let mut onus: Vec<Onu> = poller
        .store()
        .terminals_for(&id)
        .into_iter()
        .filter(|o| matches(o, &args))
        .collect();
    onus.sort_by(|a, b| a.key.cmp(&b.key));

    let out = render(&onus, global)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Background cycles keep the store fresh; every change to this OLT's
/// terminals redraws the list.
async fn watch(
    poller: &Poller,
    id: &OltId,
    args: &OnusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let redraw = matches!(global.output, OutputFormat::Table)
        && std::io::IsTerminal::is_terminal(&std::io::stdout());
    let mut updates = std::pin::pin!(poller.store().watch_terminals(id).into_stream());
    if !global.quiet {
        eprintln!(
            "Watching {id} every {}s (Ctrl-C to stop)",
            poller.config().poll_interval.as_secs()
        );
    }
    poller.start().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            view = updates.next() => {
                let Some(view) = view else { break };
                let onus: Vec<Onu> = view
                    .iter()
                    .map(Arc::as_ref)
                    .filter(|o| matches(o, args))
                    .cloned()
                    .collect();
                let frame = render(&onus, global)?;
                if redraw {
                    let mut stdout = std::io::stdout().lock();
                    let _ = write!(stdout, "\x1b[2J\x1b[H");
                    let _ = stdout.flush();
                }
                output::print_output(
                    &format!("{id} at {}\n{frame}", chrono::Local::now().format("%H:%M:%S")),
                    global.quiet,
                );
            }
        }
    }

    poller.stop().await;
    Ok(())
}
