//! Command dispatch: bridges CLI args -> poller operations -> output formatting.

pub mod config_cmd;
pub mod exec;
pub mod live;
pub mod olts;
pub mod onu;
pub mod onus;
pub mod poll;
pub mod run;
pub mod save;
pub mod util;

use ponwatch_core::Poller;

use crate::cli::{Command, GlobalOpts, OnuCommand};
use crate::error::CliError;

/// The single OLT a command is scoped to, if any. Only that profile's
/// credentials need to resolve.
pub fn target_olt(cmd: &Command) -> Option<&str> {
    match cmd {
        Command::Poll(args) => args.olt.as_deref(),
        Command::Onus(args) => Some(&args.olt),
        Command::Onu(args) => Some(match &args.command {
            OnuCommand::Show { olt, .. }
            | OnuCommand::Describe { olt, .. }
            | OnuCommand::Reboot { olt, .. }
            | OnuCommand::Vlan { olt, .. }
            | OnuCommand::EnablePort { olt, .. }
            | OnuCommand::DisablePort { olt, .. } => olt,
        }),
        Command::Exec(args) => Some(&args.olt),
        Command::Save(args) => Some(&args.olt),
        Command::Live(args) => Some(&args.olt),
        Command::Olts(_) | Command::Run(_) | Command::Config(_) | Command::Completions(_) => None,
    }
}

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, poller: &Poller, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Olts(args) => olts::handle(poller, &args, global).await,
        Command::Poll(args) => poll::handle(poller, args, global).await,
        Command::Onus(args) => onus::handle(poller, args, global).await,
        Command::Onu(args) => onu::handle(poller, args, global).await,
        Command::Exec(args) => exec::handle(poller, args, global).await,
        Command::Save(args) => save::handle(poller, args, global).await,
        Command::Live(args) => live::handle(poller, args, global).await,
        Command::Run(args) => run::handle(poller, &args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
