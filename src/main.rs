//! Command-line utility for the Newport TLB-6700 tunable laser controller.
//!
//! Maps subcommands onto the driver: identification, status snapshots,
//! periodic monitoring, and the common setpoints (wavelength, diode
//! current, diode power, piezo voltage). Connection settings come from
//! `tlb6700.toml`, `TLB6700_*` environment variables, and command-line
//! flags, in rising precedence.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use newport_tlb6700::config::{Config, DEFAULT_CONFIG_PATH};
use newport_tlb6700::types::{ControlMode, LaserStatus, Setpoint};
use newport_tlb6700::{discovery, Error, Tlb6700};

#[derive(Parser)]
#[command(
    name = "newport-tlb6700",
    version,
    about = "Control a Newport TLB-6700 tunable laser controller"
)]
struct Cli {
    /// Configuration file (TOML); a missing file falls back to defaults
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Serial port of the controller (implies the serial transport)
    #[arg(long, global = true)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Id from the vendor driver's device table (implies the usb transport)
    #[cfg(feature = "usb-dll")]
    #[arg(long, global = true, conflicts_with = "port")]
    usb_device: Option<i32>,

    /// Machine-readable JSON output (status, monitor, list, id, info)
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List serial ports and, when built with the vendor driver, USB devices
    List,
    /// Print the instrument identification string
    Id,
    /// Show laser head identity and total enable time
    Info,
    /// Take one status snapshot
    Status,
    /// Sample status snapshots until Ctrl-C or the sample budget runs out
    Monitor {
        /// Seconds between samples (default: monitor_interval from the config)
        #[arg(long)]
        interval: Option<f64>,

        /// Stop after this many successful samples
        #[arg(long)]
        samples: Option<u64>,
    },
    /// Get the wavelength setpoint and measured value, or set the setpoint
    Wavelength {
        /// New wavelength setpoint in nm
        nm: Option<f64>,
    },
    /// Get or set the diode current setpoint
    Current {
        /// New setpoint in mA, or "max" for the rated maximum
        #[arg(value_parser = parse_setpoint)]
        ma: Option<Setpoint>,
    },
    /// Get or set the diode power setpoint
    Power {
        /// New setpoint in mW, or "max" for the rated maximum
        #[arg(value_parser = parse_setpoint)]
        mw: Option<Setpoint>,
    },
    /// Get or set the piezo voltage setpoint
    Piezo {
        /// New setpoint as a percentage (0-100), or "max" for 100%
        #[arg(value_parser = parse_setpoint)]
        percent: Option<Setpoint>,
    },
    /// Turn laser output on or off
    Output { state: Switch },
    /// Turn wavelength (lambda) tracking on or off
    Track { state: Switch },
    /// Get or set display brightness
    Brightness {
        /// New brightness percentage (1-100)
        percent: Option<u8>,
    },
    /// Soft-reset the controller
    Reset,
    /// Drain and print the controller error buffer
    Errors,
    /// Save current settings to a memory bin (2-5)
    Save { bin: u8 },
    /// Recall settings from a memory bin (0 = factory defaults, 1-5 user)
    Recall { bin: u8 },
    /// Return the controller to front-panel (local) control
    Local,
    /// Put the controller under remote control
    Remote,
}

/// On/off argument for output and tracking.
#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl From<Switch> for bool {
    fn from(state: Switch) -> bool {
        matches!(state, Switch::On)
    }
}

fn parse_setpoint(s: &str) -> std::result::Result<Setpoint, Error> {
    s.parse()
}

fn init_tracing(verbosity: u8) {
    let default_directive = match verbosity {
        0 => "newport_tlb6700=warn",
        1 => "newport_tlb6700=info",
        2 => "newport_tlb6700=debug",
        _ => "trace",
    };
    // RUST_LOG wins over the -v flags when set.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_default();

    // Logs go to stderr so --json output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    apply_overrides(&mut config, &cli);

    dispatch(cli.command, &config, cli.json).await
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(port) = &cli.port {
        config.port = Some(port.clone());
        config.transport = "serial".to_string();
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }
    #[cfg(feature = "usb-dll")]
    if let Some(device_id) = cli.usb_device {
        config.usb_device_id = device_id;
        config.transport = "usb".to_string();
    }
}

async fn connect(config: &Config) -> Result<Tlb6700> {
    match config.transport.as_str() {
        "serial" => connect_serial(config).await,
        "usb" => connect_usb(config).await,
        other => bail!("unsupported transport '{other}' in configuration"),
    }
}

#[cfg(feature = "serial")]
async fn connect_serial(config: &Config) -> Result<Tlb6700> {
    use newport_tlb6700::{SerialTransport, Transport};

    let port = config.require_port()?;
    let mut transport = SerialTransport::new(port, config.baud_rate)
        .with_timeout(config.timeout)
        .with_command_delay(config.command_delay);
    transport
        .connect()
        .await
        .with_context(|| format!("opening serial port {port}"))?;
    Ok(Tlb6700::new(Box::new(transport)))
}

#[cfg(not(feature = "serial"))]
async fn connect_serial(_config: &Config) -> Result<Tlb6700> {
    Err(Error::Unsupported("Serial", "serial").into())
}

#[cfg(feature = "usb-dll")]
async fn connect_usb(config: &Config) -> Result<Tlb6700> {
    use newport_tlb6700::{Transport, UsbSystem};

    let system = UsbSystem::open().await?;
    let mut transport = system
        .transport(config.usb_device_id)
        .with_command_delay(config.command_delay);
    transport
        .connect()
        .await
        .with_context(|| format!("opening Newport USB device {}", config.usb_device_id))?;
    Ok(Tlb6700::new(Box::new(transport)))
}

#[cfg(not(feature = "usb-dll"))]
async fn connect_usb(_config: &Config) -> Result<Tlb6700> {
    Err(Error::Unsupported("Newport USB driver", "usb-dll").into())
}

async fn dispatch(command: Command, config: &Config, json: bool) -> Result<()> {
    // `list` enumerates candidates; everything else talks to one device.
    if matches!(command, Command::List) {
        return cmd_list(json).await;
    }

    let mut laser = connect(config).await?;
    let result = run(command, &mut laser, config, json).await;
    if let Err(e) = laser.close().await {
        warn!("closing the connection failed: {e}");
    }
    result
}

async fn run(command: Command, laser: &mut Tlb6700, config: &Config, json: bool) -> Result<()> {
    match command {
        Command::List => unreachable!("handled before a connection is opened"),
        Command::Id => cmd_id(laser, json).await,
        Command::Info => cmd_info(laser, json).await,
        Command::Status => cmd_status(laser, json).await,
        Command::Monitor { interval, samples } => {
            let interval = monitor_interval(interval, config.monitor_interval)?;
            cmd_monitor(laser, interval, samples, json).await
        }
        Command::Wavelength { nm } => cmd_wavelength(laser, nm, json).await,
        Command::Current { ma } => cmd_current(laser, ma, json).await,
        Command::Power { mw } => cmd_power(laser, mw, json).await,
        Command::Piezo { percent } => cmd_piezo(laser, percent, json).await,
        Command::Output { state } => {
            laser.set_output(state.into()).await?;
            println!("laser output {}", label(state));
            Ok(())
        }
        Command::Track { state } => {
            laser.set_lambda_track(state.into()).await?;
            println!("wavelength tracking {}", label(state));
            Ok(())
        }
        Command::Brightness { percent } => cmd_brightness(laser, percent, json).await,
        Command::Reset => {
            laser.reset().await?;
            println!("controller reset");
            Ok(())
        }
        Command::Errors => cmd_errors(laser, json).await,
        Command::Save { bin } => {
            laser.save_settings(bin).await?;
            println!("settings saved to bin {bin}");
            Ok(())
        }
        Command::Recall { bin } => {
            laser.recall_settings(bin).await?;
            println!("settings recalled from bin {bin}");
            Ok(())
        }
        Command::Local => {
            laser.set_control_mode(ControlMode::Local).await?;
            println!("controller returned to local control");
            Ok(())
        }
        Command::Remote => {
            laser.set_control_mode(ControlMode::Remote).await?;
            println!("controller under remote control");
            Ok(())
        }
    }
}

fn label(state: Switch) -> &'static str {
    match state {
        Switch::On => "on",
        Switch::Off => "off",
    }
}

async fn cmd_list(json: bool) -> Result<()> {
    let serial_ports = match discovery::list_serial_ports() {
        Ok(ports) => Some(ports),
        Err(Error::Unsupported(..)) => None,
        Err(e) => return Err(e).context("listing serial ports"),
    };
    let usb_devices = match discovery::list_usb_devices().await {
        Ok(devices) => Some(devices),
        Err(Error::Unsupported(..)) => None,
        Err(e) => return Err(e).context("querying the Newport USB driver"),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "serial_ports": serial_ports,
                "usb_devices": usb_devices,
            }))?
        );
        return Ok(());
    }

    match serial_ports {
        Some(ports) if ports.is_empty() => println!("no serial ports found"),
        Some(ports) => {
            println!("serial ports:");
            for port in ports {
                println!("  {port}");
            }
        }
        None => println!("serial support not compiled in (rebuild with --features serial)"),
    }
    if let Some(devices) = usb_devices {
        if devices.is_empty() {
            println!("no Newport USB devices found");
        } else {
            println!("Newport USB devices:");
            for device in devices {
                println!("  {}  {}", device.device_id, device.description);
            }
        }
    }
    Ok(())
}

async fn cmd_id(laser: &mut Tlb6700, json: bool) -> Result<()> {
    let identification = laser.identify().await?;
    if json {
        println!("{}", json!({ "identification": identification }));
    } else {
        println!("{identification}");
    }
    Ok(())
}

async fn cmd_info(laser: &mut Tlb6700, json: bool) -> Result<()> {
    let head = laser.laser_head().await?;
    let enable_time_min = laser.enable_time_min().await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "model": head.model,
                "serial": head.serial,
                "revision": head.revision,
                "calibration_date": head.calibration_date,
                "enable_time_min": enable_time_min,
            }))?
        );
    } else {
        println!("model             {}", head.model);
        println!("serial            {}", head.serial);
        println!("revision          {}", head.revision);
        println!("calibration date  {}", head.calibration_date);
        println!("enable time       {enable_time_min} min");
    }
    Ok(())
}

async fn cmd_status(laser: &mut Tlb6700, json: bool) -> Result<()> {
    let status = laser.status().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status_block(&status);
    }
    Ok(())
}

fn print_status_block(s: &LaserStatus) {
    println!("timestamp           {}", s.timestamp.to_rfc3339());
    println!("output              {}", on_off(s.output_on));
    println!("lambda track        {}", on_off(s.lambda_track));
    println!(
        "wavelength          {:.3} nm (setpoint {:.3} nm)",
        s.wavelength_nm, s.wavelength_setpoint_nm
    );
    println!(
        "diode current       {:.2} mA (setpoint {:.2} mA)",
        s.diode_current_ma, s.diode_current_setpoint_ma
    );
    println!(
        "diode power         {:.3} mW (setpoint {:.3} mW)",
        s.diode_power_mw, s.diode_power_setpoint_mw
    );
    println!("piezo setpoint      {:.1} %", s.piezo_setpoint_percent);
    println!("diode temperature   {:.2} C", s.diode_temperature_c);
    println!("cavity temperature  {:.2} C", s.cavity_temperature_c);
}

fn on_off(state: bool) -> &'static str {
    if state {
        "on"
    } else {
        "off"
    }
}

/// Normalize the `--interval` flag against the configured default.
///
/// `Duration::try_from_secs_f64` turns NaN, negatives, and values past
/// `Duration::MAX` into errors in one place.
fn monitor_interval(requested: Option<f64>, default: Duration) -> Result<Duration> {
    match requested {
        Some(secs) => match Duration::try_from_secs_f64(secs) {
            Ok(interval) if !interval.is_zero() => Ok(interval),
            _ => bail!("--interval must be a positive number of seconds, got {secs}"),
        },
        None => Ok(default),
    }
}

async fn cmd_monitor(
    laser: &mut Tlb6700,
    interval: Duration,
    samples: Option<u64>,
    json: bool,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    // A snapshot is ~a dozen queries and can outlast a short interval;
    // don't burst to catch up afterwards.
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut taken: u64 = 0;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = ticker.tick() => {
                // Failed reads are retried on the next tick and do not
                // count against the sample budget.
                match laser.status().await {
                    Ok(status) => {
                        print_sample(&status, json)?;
                        taken += 1;
                        if samples.is_some_and(|budget| taken >= budget) {
                            break;
                        }
                    }
                    Err(e) => warn!("status sample failed: {e}"),
                }
            }
        }
    }
    Ok(())
}

fn print_sample(s: &LaserStatus, json: bool) -> Result<()> {
    if json {
        // One object per line, for piping into line-oriented tools.
        println!("{}", serde_json::to_string(s)?);
    } else {
        println!(
            "{}  {:9.3} nm (set {:9.3})  {:8.3} mW  {:7.2} mA  diode {:5.2} C  cavity {:5.2} C  output {}",
            s.timestamp.format("%H:%M:%S%.3f"),
            s.wavelength_nm,
            s.wavelength_setpoint_nm,
            s.diode_power_mw,
            s.diode_current_ma,
            s.diode_temperature_c,
            s.cavity_temperature_c,
            on_off(s.output_on),
        );
    }
    Ok(())
}

async fn cmd_wavelength(laser: &mut Tlb6700, nm: Option<f64>, json: bool) -> Result<()> {
    if let Some(nm) = nm {
        laser.set_wavelength_nm(nm).await?;
        println!("wavelength setpoint set to {nm} nm");
        return Ok(());
    }

    let setpoint = laser.wavelength_setpoint_nm().await?;
    let measured = laser.wavelength_nm().await?;
    if json {
        println!(
            "{}",
            json!({ "setpoint_nm": setpoint, "wavelength_nm": measured })
        );
    } else {
        println!("setpoint  {setpoint} nm");
        println!("measured  {measured} nm");
    }
    Ok(())
}

async fn cmd_current(laser: &mut Tlb6700, ma: Option<Setpoint>, json: bool) -> Result<()> {
    if let Some(setpoint) = ma {
        laser.set_diode_current(setpoint).await?;
        println!("diode current setpoint set to {setpoint} mA");
        return Ok(());
    }

    let setpoint = laser.diode_current_setpoint_ma().await?;
    let measured = laser.diode_current_ma().await?;
    if json {
        println!(
            "{}",
            json!({ "setpoint_ma": setpoint, "current_ma": measured })
        );
    } else {
        println!("setpoint  {setpoint} mA");
        println!("measured  {measured} mA");
    }
    Ok(())
}

async fn cmd_power(laser: &mut Tlb6700, mw: Option<Setpoint>, json: bool) -> Result<()> {
    if let Some(setpoint) = mw {
        laser.set_diode_power(setpoint).await?;
        println!("diode power setpoint set to {setpoint} mW");
        return Ok(());
    }

    let setpoint = laser.diode_power_setpoint_mw().await?;
    let detected = laser.diode_power_mw().await?;
    if json {
        println!("{}", json!({ "setpoint_mw": setpoint, "power_mw": detected }));
    } else {
        println!("setpoint  {setpoint} mW");
        println!("detected  {detected} mW");
    }
    Ok(())
}

async fn cmd_piezo(laser: &mut Tlb6700, percent: Option<Setpoint>, json: bool) -> Result<()> {
    if let Some(setpoint) = percent {
        laser.set_piezo_percent(setpoint).await?;
        println!("piezo setpoint set to {setpoint} %");
        return Ok(());
    }

    let setpoint = laser.piezo_setpoint_percent().await?;
    if json {
        println!("{}", json!({ "setpoint_percent": setpoint }));
    } else {
        println!("setpoint  {setpoint} %");
    }
    Ok(())
}

async fn cmd_brightness(laser: &mut Tlb6700, percent: Option<u8>, json: bool) -> Result<()> {
    if let Some(percent) = percent {
        laser.set_brightness(percent).await?;
        println!("display brightness set to {percent} %");
        return Ok(());
    }

    let percent = laser.brightness().await?;
    if json {
        println!("{}", json!({ "brightness_percent": percent }));
    } else {
        println!("{percent} %");
    }
    Ok(())
}

async fn cmd_errors(laser: &mut Tlb6700, json: bool) -> Result<()> {
    // The controller queues at most ten errors; the bound keeps a
    // misbehaving device from wedging the drain loop.
    let mut drained = Vec::new();
    for _ in 0..16 {
        match laser.next_error().await? {
            Some(error) => drained.push(error),
            None => break,
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&drained)?);
    } else if drained.is_empty() {
        println!("error buffer empty");
    } else {
        for error in &drained {
            println!("{error}");
        }
    }
    Ok(())
}
