use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::{Result, WrapErr};
use serde_json::json;
use shifter_config::{Config, Logging};
use shifter_core::{MotorTelemetry, SpeedReadiness};
use shifter_traits::{Clock, MonotonicClock};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod error_fmt;
#[cfg(all(feature = "hardware", target_os = "linux"))]
mod hw;
mod sim;

use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(e) = run(cli) {
        let json = JSON_MODE.get().copied().unwrap_or(false);
        if json {
            eprintln!("{}", error_fmt::format_error_json(&e));
        } else {
            eprintln!("{}", error_fmt::humanize(&e));
        }
        std::process::exit(error_fmt::exit_code_for_error(&e));
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = shifter_config::load_file(&cli.config).wrap_err(error_fmt::CONFIG_CONTEXT)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging);
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "could not install Ctrl-C handler");
        }
    }

    match cli.cmd {
        Commands::Check => check(&cfg, cli.json),
        Commands::Simulate { throttle, loop_ms } => {
            let opts = sim::SimOptions {
                throttle,
                loop_period: Duration::from_millis(loop_ms.max(1)),
                json: cli.json,
            };
            let summary = sim::run_simulation(&cfg, opts, &shutdown)?;
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "summary": {
                            "shifts": summary.shifts,
                            "gear": summary.gear.to_string(),
                            "state": sim::state_name(summary.state),
                            "fail_open_count": summary.fail_open_count,
                        }
                    })
                );
            } else {
                println!(
                    "simulation complete: {} shifts, final gear {}, checker {}, {} fail-open",
                    summary.shifts,
                    summary.gear,
                    sim::state_name(summary.state),
                    summary.fail_open_count
                );
            }
            Ok(())
        }
        Commands::Telemetry { motor, throttle } => {
            telemetry(&cfg, motor.as_deref(), throttle, cli.json)
        }
    }
}

fn init_tracing(json: bool, level: &str, logging: &Logging) {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // Console goes to stderr so stdout stays machine readable.
    let console = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };

    let file = logging.file.as_deref().map(|path| {
        let path = std::path::Path::new(path);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "shifter.log".into(), |n| n.to_string_lossy().into_owned());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(file_filter)
            .boxed()
    });

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init();
}

fn sim_clock() -> Arc<dyn Clock + Send + Sync> {
    Arc::new(MonotonicClock::new())
}

/// Build everything the config describes against simulated devices.
fn check(cfg: &Config, json: bool) -> Result<()> {
    let (ctx, shifter) = if cfg.shifter.is_some() {
        let rig = sim::build_rig(cfg, sim_clock())?;
        (rig.ctx, Some(rig.shifter))
    } else {
        (sim::sim_context(cfg, sim_clock())?, None)
    };
    for r in &cfg.readiness {
        SpeedReadiness::try_from(r)?;
        ctx.motor(&r.motor)?;
    }

    probe_hardware(cfg, json)?;

    let gear = shifter.as_ref().map(|s| s.gear().to_string());
    drop(shifter);
    ctx.disable_all()?;

    if json {
        println!(
            "{}",
            json!({
                "ok": true,
                "motors": ctx.len(),
                "shifter": gear,
                "readiness": cfg.readiness.len(),
            })
        );
    } else {
        let shifter = gear.map_or_else(|| "no shifter".to_string(), |g| format!("shifter in {g} gear"));
        println!(
            "config ok: {} motors, {}, {} readiness checks",
            ctx.len(),
            shifter,
            cfg.readiness.len()
        );
    }
    Ok(())
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn probe_hardware(cfg: &Config, json: bool) -> Result<()> {
    let Some(sh) = &cfg.shifter else {
        return Ok(());
    };
    for reading in hw::probe(sh)? {
        if !json {
            println!("gpio pin {} reads {}", reading.pin, reading.value);
        }
    }
    Ok(())
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
#[allow(clippy::unnecessary_wraps)]
fn probe_hardware(_cfg: &Config, _json: bool) -> Result<()> {
    Ok(())
}

fn telemetry(cfg: &Config, only: Option<&str>, throttle: f64, json: bool) -> Result<()> {
    let ctx = sim::sim_context(cfg, sim_clock())?;
    let names: Vec<String> = match only {
        Some(name) => {
            ctx.motor(name)?;
            vec![name.to_owned()]
        }
        None => ctx.names().map(str::to_owned).collect(),
    };
    for name in &names {
        ctx.motor(name)?.with(|m| m.set_velocity(throttle))?;
    }
    ctx.update_all()?;

    let mut rows = Vec::with_capacity(names.len());
    for name in &names {
        rows.push(ctx.motor(name)?.with(|m| MotorTelemetry::capture(m))?);
    }
    ctx.disable_all()?;

    if json {
        for row in &rows {
            println!("{}", serde_json::to_string(row)?);
        }
        return Ok(());
    }
    println!(
        "{:<12} {:<10} {:>4} {:<9} {:>10} {:>10} {:>8}  faults",
        "motor", "kind", "gear", "mode", "position", "velocity", "volts"
    );
    for t in &rows {
        let faults = if t.faults.is_empty() {
            "-".to_string()
        } else {
            t.faults.join(",")
        };
        println!(
            "{:<12} {:<10} {:>4} {:<9} {:>10.3} {:>10.3} {:>8.2}  {}",
            t.name,
            format!("{:?}", t.kind),
            t.gear,
            format!("{:?}", t.mode),
            t.position,
            t.velocity,
            t.output_voltage,
            faults
        );
    }
    Ok(())
}
