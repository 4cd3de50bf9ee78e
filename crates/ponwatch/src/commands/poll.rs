//! One-shot polling.

use tabled::Tabled;

use ponwatch_core::{PollMode, PollOutcome, Poller};

use crate::cli::{GlobalOpts, PollArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "OLT")]
    olt: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Seen")]
    observed: usize,
    #[tabled(rename = "New")]
    registered: usize,
    #[tabled(rename = "Up")]
    came_online: usize,
    #[tabled(rename = "Down")]
    went_offline: usize,
    #[tabled(rename = "Removed")]
    removed: usize,
    #[tabled(rename = "Samples")]
    samples: usize,
}

impl From<&PollOutcome> for OutcomeRow {
    fn from(o: &PollOutcome) -> Self {
        Self {
            olt: o.olt.to_string(),
            source: o.source.to_string(),
            observed: o.observed,
            registered: o.registered,
            came_online: o.came_online,
            went_offline: o.went_offline,
            removed: o.removed,
            samples: o.samples,
        }
    }
}

fn detail(o: &PollOutcome) -> String {
    [
        format!("OLT:        {}", o.olt),
        format!("Mode:       {}", o.mode),
        format!("Source:     {}", o.source),
        format!("Observed:   {}", o.observed),
        format!("Registered: {}", o.registered),
        format!("Online:     +{}", o.came_online),
        format!("Offline:    +{}", o.went_offline),
        format!("Removed:    {}", o.removed),
        format!("Samples:    {}", o.samples),
    ]
    .join("\n")
}

pub async fn handle(poller: &Poller, args: PollArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(name) = args.olt {
        let mode = if args.manual {
            PollMode::Manual
        } else {
            PollMode::Background
        };
        let bar = util::spinner(format!("Polling {name}"), global.quiet);
        let result = poller.poll_olt(&util::olt_id(&name), mode).await;
        bar.finish_and_clear();

        let outcome = result?;
        let out = output::render_single(&global.output, &outcome, detail, |o| o.olt.to_string())?;
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    let bar = util::spinner("Polling every OLT", global.quiet);
    let report = poller.poll_now().await;
    bar.finish_and_clear();

    let out = output::render_list(
        &global.output,
        &report.outcomes,
        |o| OutcomeRow::from(o),
        |o| o.olt.to_string(),
    )?;
    output::print_output(&out, global.quiet);

    for failure in &report.failures {
        eprintln!("{}: {}", failure.olt, failure.error);
    }
    if report.outcomes.is_empty() {
        if let Some(first) = report.failures.into_iter().next() {
            return Err(CliError::Unreachable {
                host: first.olt.to_string(),
                reason: first.error,
            });
        }
    }
    Ok(())
}
