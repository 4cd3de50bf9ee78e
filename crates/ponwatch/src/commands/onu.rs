//! Single-terminal commands.

use ponwatch_api::DeviceCommand;
use ponwatch_core::{Onu, PollMode, Poller, TerminalKey, TerminalRepository};

use crate::cli::{GlobalOpts, OnuArgs, OnuCommand};
use crate::error::CliError;
use crate::output;

use super::util;

fn detail(onu: &Onu, color: bool) -> String {
    let olt = &onu.olt_optics;
    let own = &onu.self_reported;
    let dbm = |v: Option<f64>| output::fmt_opt(v.map(|v| format!("{v:.2} dBm")));

    let mut lines = vec![
        format!("Slot:         {}", onu.key),
        format!("MAC:          {}", output::fmt_opt(onu.mac.as_ref())),
        format!(
            "Description:  {}",
            onu.description.as_deref().unwrap_or("-")
        ),
        format!("State:        {}", output::paint_state(onu.state, color)),
        format!("Distance:     {}", output::fmt_opt(onu.distance_m.map(|d| format!("{d} m")))),
        format!("Last seen:    {}", util::ago(onu.last_seen)),
    ];
    if onu.missing_polls > 0 {
        lines.push(format!("Missed polls: {}", onu.missing_polls));
    }

    lines.push(String::new());
    lines.push(format!(
        "OLT side      rx {}  tx {}  ({})",
        dbm(olt.rx_power_dbm),
        dbm(olt.tx_power_dbm),
        output::fmt_opt(olt.rx_source),
    ));
    if let Some(t) = olt.temperature_c {
        lines.push(format!("              temp {t:.1}°C"));
    }
    lines.push(format!(
        "Self-reported rx {}  tx {}",
        dbm(own.rx_power_dbm),
        dbm(own.tx_power_dbm),
    ));
    if let Some(ref model) = own.model {
        lines.push(format!("Model:        {model}"));
    }
    lines.join("\n")
}

/// Send `command` and echo what the device printed.
async fn run(
    poller: &Poller,
    olt: &str,
    command: DeviceCommand,
    done: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let bar = util::spinner(command.label(), global.quiet);
    let result = poller.execute(&util::olt_id(olt), command).await;
    bar.finish_and_clear();

    let echo = result?;
    if !global.quiet {
        if global.verbose > 0 && !echo.trim().is_empty() {
            eprintln!("{}", echo.trim_end());
        }
        eprintln!("{done}");
    }
    Ok(())
}

#[allow(clippy::too_many_lines)]
pub async fn handle(poller: &Poller, args: OnuArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        OnuCommand::Show { olt, slot } => {
            let id = util::olt_id(&olt);
            let bar = util::spinner(format!("Polling {id}"), global.quiet);
            let result = poller.poll_olt(&id, PollMode::Background).await;
            bar.finish_and_clear();
            result?;

            let key = TerminalKey::from_slot(&id, util::slot(slot));
            let onu = poller
                .store()
                .terminal(&key)
                .ok_or_else(|| CliError::NotFound {
                    resource_type: "ONU".into(),
                    identifier: key.to_string(),
                    list_command: format!("onus {olt}"),
                })?;

            let color = output::should_color(&global.color);
            let out = output::render_single(
                &global.output,
                &onu,
                |o| detail(o, color),
                |o| o.key.slot().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OnuCommand::Describe {
            olt,
            slot,
            description,
        } => {
            let slot = util::slot(slot);
            let command = DeviceCommand::SetDescription { slot, description };
            run(poller, &olt, command, "Description updated", global).await
        }

        OnuCommand::Reboot { olt, slot } => {
            let slot = util::slot(slot);
            if !util::confirm(&format!("Reboot ONU {slot} on {olt}?"), global.yes)? {
                return Ok(());
            }
            run(
                poller,
                &olt,
                DeviceCommand::Reboot { slot },
                "Reboot issued",
                global,
            )
            .await
        }

        OnuCommand::Vlan {
            olt,
            slot,
            uni_port,
            vlan,
        } => {
            let command = DeviceCommand::SetVlan {
                slot: util::slot(slot),
                uni_port,
                vlan,
            };
            run(poller, &olt, command, &format!("Port {uni_port} tagged with VLAN {vlan}"), global)
                .await
        }

        OnuCommand::EnablePort {
            olt,
            slot,
            uni_port,
        } => {
            let command = DeviceCommand::SetPortEnabled {
                slot: util::slot(slot),
                uni_port,
                enabled: true,
            };
            run(poller, &olt, command, &format!("Port {uni_port} enabled"), global).await
        }

        OnuCommand::DisablePort {
            olt,
            slot,
            uni_port,
        } => {
            let slot = util::slot(slot);
            if !util::confirm(
                &format!("Disable port {uni_port} on ONU {slot}? The subscriber loses service."),
                global.yes,
            )? {
                return Ok(());
            }
            let command = DeviceCommand::SetPortEnabled {
                slot,
                uni_port,
                enabled: false,
            };
            run(poller, &olt, command, &format!("Port {uni_port} disabled"), global).await
        }
    }
}
