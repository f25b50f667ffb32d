//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "shifter", version, about = "Gear shifter and motor facade CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/shifter_config.toml")]
    pub config: PathBuf,

    /// Print results and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the config and build every motor and the shifter against simulated devices
    Check,
    /// Run the configured shift sequence on a simulated piston and print shift events
    Simulate {
        /// Scaled velocity in [-1, 1] commanded to every motor while shifting
        #[arg(long, default_value_t = 0.5, allow_negative_numbers = true)]
        throttle: f64,
        /// Main loop period in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 20)]
        loop_ms: u64,
    },
    /// Print a telemetry snapshot of the simulated motors
    Telemetry {
        /// Only report this motor
        #[arg(long, value_name = "NAME")]
        motor: Option<String>,
        /// Scaled velocity in [-1, 1] to command before sampling
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        throttle: f64,
    },
}
