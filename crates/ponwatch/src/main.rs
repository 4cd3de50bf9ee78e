mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, RunArgs};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity; the guard flushes the log file on exit
    let guard = init_tracing(cli.global.verbose, run_args(&cli.command));

    // Dispatch and handle errors with proper exit codes
    let result = run(cli).await;
    drop(guard);
    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn run_args(cmd: &Command) -> Option<&RunArgs> {
    match cmd {
        Command::Run(args) => Some(args),
        _ => None,
    }
}

fn init_tracing(verbosity: u8, daemon: Option<&RunArgs>) -> Option<WorkerGuard> {
    let level = match verbosity {
        0 if daemon.is_some() => "info",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let Some(log_dir) = daemon.and_then(|args| args.log_dir.as_deref()) else {
        let json = daemon.is_some_and(|args| args.json_logs);
        let stderr = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false);
        let registry = tracing_subscriber::registry().with(filter);
        if json {
            registry.with(stderr.json()).init();
        } else {
            registry.with(stderr).init();
        }
        return None;
    };

    let file_appender = tracing_appender::rolling::daily(log_dir, "ponwatch.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let registry = tracing_subscriber::registry().with(filter);
    if daemon.is_some_and(|args| args.json_logs) {
        registry.with(file.json()).init();
    } else {
        registry.with(file).init();
    }
    Some(guard)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a device connection
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "ponwatch", &mut std::io::stdout());
            Ok(())
        }

        // All other commands poll or talk to an OLT
        cmd => {
            let poller = config::build_poller(&cli.global, commands::target_olt(&cmd))?;

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &poller, &cli.global).await
        }
    }
}
