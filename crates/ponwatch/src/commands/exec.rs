//! Free-form read-only commands.

use ponwatch_api::DeviceCommand;
use ponwatch_core::Poller;

use crate::cli::{ExecArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(poller: &Poller, args: ExecArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let text = args.command.join(" ");
    let id = util::olt_id(&args.olt);

    let bar = util::spinner(format!("{id}: {text}"), global.quiet);
    let result = poller.execute(&id, DeviceCommand::FreeForm(text)).await;
    bar.finish_and_clear();

    output::print_output(result?.trim_end(), global.quiet);
    Ok(())
}
