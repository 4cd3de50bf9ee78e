//! Persisting the running configuration.

use ponwatch_api::DeviceCommand;
use ponwatch_core::Poller;

use crate::cli::{GlobalOpts, SaveArgs};
use crate::error::CliError;

use super::util;

pub async fn handle(poller: &Poller, args: SaveArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let id = util::olt_id(&args.olt);
    if !util::confirm(&format!("Write the running configuration of {id}?"), global.yes)? {
        return Ok(());
    }

    let bar = util::spinner(format!("Saving {id}"), global.quiet);
    let result = poller.execute(&id, DeviceCommand::SaveConfig).await;
    bar.finish_and_clear();
    result?;

    if !global.quiet {
        eprintln!("Configuration saved on {id}");
    }
    Ok(())
}
