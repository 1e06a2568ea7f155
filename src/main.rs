//! devlink CLI - resolve the configured device and check it is reachable

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

use devlink::config::Settings;
use devlink::device::DeviceError;

/// Exit code when the setup needs a human to fix it
const EXIT_HUMAN_TAKEOVER: u8 = 2;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// User settings file
    #[arg(short, long, default_value = "./config/alas.json")]
    config: PathBuf,
    /// Override the configured serial
    #[arg(short, long)]
    serial: Option<String>,
    /// Run `adb connect` for network serials
    #[arg(long)]
    connect: bool,
    /// List devices known to the adb server
    #[arg(long)]
    devices: bool,
    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("Failed to initialize logger: {e}");
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_human_takeover() => {
            log::error!("{e}");
            log::error!("Request human takeover");
            ExitCode::from(EXIT_HUMAN_TAKEOVER)
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) -> Result<(), log::SetLoggerError> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(
        level,
        ConfigBuilder::new().set_time_format_rfc3339().build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
}

fn run(args: &Args) -> Result<(), DeviceError> {
    let mut settings = Settings::load(&args.config)?;
    if let Some(serial) = &args.serial {
        settings.emulator.serial = serial.clone();
    }

    let conn = devlink::init_connection(settings)?;
    if conn.settings_changed() && args.serial.is_none() {
        log::info!("Saving rewritten settings to {}", args.config.display());
        conn.settings().save(&args.config)?;
    }

    println!("{}", conn.serial());

    if args.connect && conn.classification().network_device {
        conn.adb_client().connect(conn.serial())?;
    }
    if args.devices {
        for device in conn.adb_client().devices()? {
            println!("{}\t{}", device.serial, device.state);
        }
    }

    Ok(())
}
