//! OLT listing.

use std::sync::Arc;

use tabled::Tabled;

use ponwatch_core::{Olt, Poller};

use crate::cli::{GlobalOpts, OltsArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct OltRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "PON")]
    pon_ports: u16,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Temp")]
    temperature: String,
    #[tabled(rename = "Last Poll")]
    last_poll: String,
}

fn row(olt: &Arc<Olt>, color: bool) -> OltRow {
    let health = olt.health.as_ref();
    OltRow {
        name: olt.id.to_string(),
        host: olt.host.clone(),
        model: olt.model.clone().unwrap_or_else(|| "-".into()),
        pon_ports: olt.pon_ports,
        status: if olt.last_poll.is_some() || olt.last_error.is_some() {
            output::paint_reachable(olt.online, color)
        } else {
            "-".into()
        },
        cpu: output::fmt_opt(
            health
                .and_then(|h| h.cpu_percent)
                .map(|v| format!("{v:.0}%")),
        ),
        temperature: output::fmt_opt(
            health
                .and_then(|h| h.temperature_c)
                .map(|v| format!("{v:.0}°C")),
        ),
        last_poll: util::ago(olt.last_poll),
    }
}

pub async fn handle(poller: &Poller, args: &OltsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if args.poll {
        let bar = util::spinner("Polling every OLT", global.quiet);
        let report = poller.poll_now().await;
        bar.finish_and_clear();
        for failure in &report.failures {
            tracing::warn!(olt = %failure.olt, error = %failure.error, "poll failed");
        }
    }

    let color = output::should_color(&global.color);
    let mut olts = poller.store().olts_snapshot().as_ref().clone();
    olts.sort_by(|a, b| a.id.cmp(&b.id));
    let out = output::render_list(
        &global.output,
        &olts,
        |o| row(o, color),
        |o| o.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
