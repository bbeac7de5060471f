use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use colored::*;
use tokio_stream::StreamExt;

use primadonna::config::DeviceConfig;
use primadonna::device::{simulate::Simulator, BluetoothTransport, Device, DeviceError, Transport};
use primadonna::display;
use primadonna::logging;
use primadonna::protocol::*;

const STATUS_WIDTH: usize = 60;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Bluetooth address (or platform id) of the machine
    #[arg(long, global = true)]
    address: Option<String>,
    /// Display name of the machine
    #[arg(long, global = true)]
    name: Option<String>,
    /// Model code of the machine
    #[arg(long, global = true)]
    model: Option<String>,
    /// JSON device configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Talk to a simulated machine instead of a real one
    #[arg(long, global = true)]
    simulator: bool,
    /// More output per occurrence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current state of the machine
    Status,
    /// Monitor the status of the machine
    Monitor {
        /// Turn on the machine before monitoring
        #[arg(long)]
        turn_on: bool,
    },
    /// Turn the machine on
    PowerOn,
    /// Brew a beverage
    Brew {
        #[arg(value_enum)]
        beverage: Beverage,
        /// Turn on the machine before brewing
        #[arg(long)]
        turn_on: bool,
    },
    /// Stop a beverage that is being dispensed
    Cancel {
        #[arg(value_enum)]
        beverage: Beverage,
    },
    /// List the profiles stored on the machine
    Profiles,
    /// Select the active profile
    SelectProfile { id: u8 },
    /// Set the auto power off delay (0 = 15 minutes ... 4 = 3 hours)
    AutoPowerOff { level: u8 },
    /// Set the water hardness level
    WaterHardness { level: u8 },
    /// Set the water temperature level
    WaterTemperature { level: u8 },
    /// Turn machine switches on or off. The machine can't report its switches, so any switch that
    /// isn't given is written as off.
    Switches {
        #[arg(long)]
        cup_light: Option<bool>,
        #[arg(long)]
        energy_save: Option<bool>,
        #[arg(long)]
        sounds: Option<bool>,
    },
    /// Set the machine clock
    SetClock { hour: u8, minute: u8 },
    /// Read every statistics counter
    Statistics,
    /// Send a raw hex-encoded command (the length and checksum are fixed up)
    Raw { hex: String },
}

fn load_config(cli: &Cli) -> Result<DeviceConfig, DeviceError> {
    let mut config = match (&cli.config, &cli.address) {
        (Some(path), _) => DeviceConfig::load(path)?,
        // Without a config file the machine is named after its address
        (None, Some(address)) => DeviceConfig::new(address.clone(), address.clone(), "unknown"),
        (None, None) if cli.simulator => DeviceConfig::new("simulator", "Simulator", "ECAM650.85"),
        (None, None) => {
            return Err(DeviceError::InvalidArgument(
                "either --address or --config is required".to_owned(),
            ))
        }
    };
    if let Some(address) = &cli.address {
        config.address = address.clone();
    }
    if let Some(name) = &cli.name {
        config.name = name.clone();
    }
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    Ok(config)
}

fn colourize() -> bool {
    colored::control::SHOULD_COLORIZE.should_colorize()
}

fn print_response(response: Option<ParsedMessage>) {
    match response {
        Some(message) => println!("{:?}", message.response),
        None => println!("{}", "No response".yellow()),
    }
}

async fn print_status(device: &Device) -> Result<(), DeviceError> {
    if device.request_status().await?.is_none() {
        println!("{}", "No response".yellow());
        return Ok(());
    }
    if let Some(status) = device.machine_status() {
        let config = device.config();
        println!("{} ({}): {}", config.name, config.model, display::render(status, 0, colourize()));
    }
    for switch in device.active_switches() {
        println!("  switch: {:?}", switch);
    }
    for alarm in device.active_alarms() {
        println!("  alarm: {:?}", alarm);
    }
    Ok(())
}

/// Turns the machine on if it is in standby and `turn_on` is set. Returns false if it isn't on.
async fn ensure_on(device: &Device, turn_on: bool) -> Result<bool, DeviceError> {
    device.request_status().await?;
    if device.machine_status() != Some(MachineStatus::StandBy) {
        return Ok(true);
    }
    if !turn_on {
        println!("Machine is not on, pass --turn-on to turn it on before operation");
        return Ok(false);
    }
    device.power_on().await?;
    Ok(true)
}

async fn monitor(device: &Device, turn_on: bool) -> Result<(), DeviceError> {
    let tap = device.packet_tap();
    let summary = device.clone();
    let colour = colourize();
    let printer = tokio::spawn(async move {
        futures::pin_mut!(tap);
        let mut last = None;
        while let Some(message) = tap.next().await {
            if let Response::MonitorStatus(status) = &message.response {
                let status = summary.summarize(status);
                if last != Some(status) {
                    println!("{}", display::render(status, STATUS_WIDTH, colour));
                    last = Some(status);
                }
            } else {
                println!("{}", message.frame.stringify());
            }
        }
    });
    ensure_on(device, turn_on).await?;
    loop {
        device.request_status().await?;
        if printer.is_finished() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

async fn brew(device: &Device, beverage: Beverage, turn_on: bool) -> Result<(), DeviceError> {
    if !ensure_on(device, turn_on).await? {
        return Ok(());
    }
    match device.machine_status() {
        Some(MachineStatus::Ready) => {}
        Some(status) => {
            println!(
                "Machine is in state {:?}, so we will cowardly refuse to brew coffee",
                status
            );
            return Ok(());
        }
        None => {
            println!("{}", "Machine did not report its state".yellow());
            return Ok(());
        }
    }
    println!("Brewing {:?}...", beverage);
    device.beverage_start(beverage).await?;
    while let Some(status @ MachineStatus::Busy(..)) = device.machine_status() {
        println!("{}", display::render(status, STATUS_WIDTH, colourize()));
        tokio::time::sleep(Duration::from_millis(500)).await;
        device.request_status().await?;
    }
    print_status(device).await
}

async fn statistics(device: &Device) -> Result<(), DeviceError> {
    device.refresh_statistics().await?;
    for (address, value) in device.snapshot().statistics.values {
        println!("{:5}: {}", address, value);
    }
    for (name, value) in device.derived_statistics() {
        match value {
            Some(value) => println!("{}: {}", name, value),
            None => println!("{}: {}", name, "unavailable".yellow()),
        }
    }
    Ok(())
}

async fn run(device: &Device, command: Commands) -> Result<(), DeviceError> {
    match command {
        Commands::Status => print_status(device).await?,
        Commands::Monitor { turn_on } => monitor(device, turn_on).await?,
        Commands::PowerOn => {
            device.power_on().await?;
            print_status(device).await?;
        }
        Commands::Brew { beverage, turn_on } => brew(device, beverage, turn_on).await?,
        Commands::Cancel { beverage } => print_response(device.beverage_stop(beverage).await?),
        Commands::Profiles => {
            let profiles = device.load_profiles().await?;
            for (index, name) in profiles.names {
                let marker = if profiles.active == Some(index) { "*" } else { " " };
                println!("{} {}: {}", marker, index, name);
            }
        }
        Commands::SelectProfile { id } => print_response(device.select_profile(id).await?),
        Commands::AutoPowerOff { level } => {
            print_response(device.set_auto_power_off(level).await?)
        }
        Commands::WaterHardness { level } => {
            print_response(device.set_water_hardness(level).await?)
        }
        Commands::WaterTemperature { level } => {
            print_response(device.set_water_temperature(level).await?)
        }
        Commands::Switches {
            cup_light,
            energy_save,
            sounds,
        } => {
            let mut switches = device.machine_switches().await;
            let changes = [
                (SwitchSetting::CupLight, cup_light),
                (SwitchSetting::EnergySave, energy_save),
                (SwitchSetting::Sounds, sounds),
            ];
            for (switch, on) in changes {
                if let Some(on) = on {
                    switches.set(switch, on);
                }
            }
            print_response(device.set_machine_switches(switches).await?)
        }
        Commands::SetClock { hour, minute } => {
            print_response(device.set_clock(hour, minute).await?)
        }
        Commands::Statistics => statistics(device).await?,
        Commands::Raw { hex } => print_response(device.send_raw(&hex).await?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::configure(cli.verbose);

    let config = load_config(&cli)?;
    let transport: Arc<dyn Transport> = if cli.simulator {
        Arc::new(Simulator::new())
    } else {
        Arc::new(BluetoothTransport::new())
    };
    let device = Device::new(config, transport);
    let result = run(&device, cli.command).await;
    device.disconnect().await;
    Ok(result?)
}
