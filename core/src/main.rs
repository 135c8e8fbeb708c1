//! VIO-STATE: inspect the state layout of the visual-inertial filter.
//!
//! The tool builds a filter state from a configuration file (or the defaults) and can
//!
//! - print the covariance index range of every state field,
//! - level the attitude from a static accelerometer sample and print the result,
//! - write a default configuration file to start from.

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;
use nalgebra::Vector3;
use vio_state::{FilterConfig, FilterState};

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about = "Inspect the state layout of a visual-inertial EKF.")]
struct Cli {
    /// Filter configuration file (TOML/JSON/YAML); defaults are used if omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Clone)]
enum Command {
    /// Print the covariance index range of every state field
    Layout,
    /// Initialize the attitude from a static specific force sample [m/s^2]
    #[command(name = "init-accel", allow_negative_numbers = true)]
    InitAccel { ax: f64, ay: f64, az: f64 },
    /// Write the configuration in use to a file; the format follows the extension
    #[command(name = "write-config")]
    WriteConfig { file: PathBuf },
}

/// Initialize the logger with the specified configuration.
///
/// # Arguments
/// * `log_level` - Log level string (off, error, warn, info, debug, trace)
/// * `log_file` - Optional path to log file (logs to stderr if None)
fn init_logger(log_level: &str, log_file: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    use std::io::Write;

    let level = log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
        log::LevelFilter::Info
    });

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    });

    if let Some(log_path) = log_file {
        if let Some(parent) = log_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let target = Box::new(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?,
        );
        builder.target(env_logger::Target::Pipe(target));
    }

    builder.try_init()?;
    Ok(())
}

fn print_layout(filter_state: &FilterState) {
    let layout = filter_state.state.layout();
    println!(
        "Tangent dimension: {} ({} slots, {} cameras)",
        layout.dimension(),
        layout.n_max(),
        layout.n_cam()
    );
    for field in layout.fields() {
        let range = layout.range(field);
        println!("{:>8}  [{:>4}, {:>4})", field.to_string(), range.start, range.end);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logger(&cli.log_level, cli.log_file.as_ref())?;

    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            FilterConfig::from_file(path)?
        }
        None => FilterConfig::default(),
    };
    let mut filter_state = FilterState::from_config(&config)?;

    match cli.command {
        Command::Layout => print_layout(&filter_state),
        Command::InitAccel { ax, ay, az } => {
            filter_state.init_with_accelerometer(&Vector3::new(ax, ay, az));
            let q = filter_state.state.get_attitude();
            let (roll, pitch, yaw) = q.euler_angles();
            println!(
                "qWM = [{:.6}, {:.6}, {:.6}, {:.6}] (w, x, y, z)",
                q.w, q.i, q.j, q.k
            );
            println!(
                "roll {:.3} deg, pitch {:.3} deg, yaw {:.3} deg",
                roll.to_degrees(),
                pitch.to_degrees(),
                yaw.to_degrees()
            );
        }
        Command::WriteConfig { file } => {
            config.to_file(&file)?;
            info!("Wrote configuration to {}", file.display());
        }
    }
    Ok(())
}
