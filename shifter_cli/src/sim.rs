//! Simulated rig assembled from config: every motor on a simulated controller,
//! a piston with reed switches for the shifter, and the shift sequence runner.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use eyre::Result;
use serde_json::json;
use shifter_config::{Config, GearName};
use shifter_core::context::BoxedDevice;
use shifter_core::sensor_shift::EventReceiver;
use shifter_core::{
    CheckerState, DeviceContext, Gear, SensorShifter, ShiftError, ShiftEvent, ShifterSettings,
    SharedMotor,
};
use shifter_hardware::{SimulatedMotorDevice, SimulatedPiston};
use shifter_traits::{Clock, MonotonicClock};

/// Motors from `[[motors]]`, each on a simulated controller whose velocity
/// follows its setpoint.
pub fn sim_context(cfg: &Config, clock: Arc<dyn Clock + Send + Sync>) -> Result<DeviceContext> {
    DeviceContext::from_config(cfg, clock, |m| {
        let dev = SimulatedMotorDevice::new(m.port).with_ideal_tracking();
        Ok(Box::new(dev) as BoxedDevice)
    })
}

pub struct SimRig {
    pub ctx: DeviceContext,
    pub shifter: SensorShifter,
}

/// Context plus a shifter wired to a simulated piston. The piston starts
/// settled in the configured starting gear (low when unset).
pub fn build_rig(cfg: &Config, clock: Arc<dyn Clock + Send + Sync>) -> Result<SimRig> {
    let sh = cfg.shifter.as_ref().ok_or_else(|| {
        eyre::Report::new(ShiftError::Config(
            "simulation needs a [shifter] section".into(),
        ))
    })?;
    let ctx = sim_context(cfg, clock.clone())?;
    let settings = ShifterSettings::from(sh);
    let resting = settings.starting_gear.unwrap_or(Gear::Low);
    let piston = SimulatedPiston::new(
        settings.mapping.valve_for(resting),
        Duration::from_millis(cfg.simulation.piston_travel_ms),
        clock.clone(),
    );

    let mut builder = ctx
        .shifter_builder(sh)?
        .with_actuator(piston.valve())
        .with_clock(clock);
    let stuck = cfg.simulation.stuck_sensor;
    for (gear, pins) in [(Gear::Low, &sh.low_sensors), (Gear::High, &sh.high_sensors)] {
        for index in 0..pins.len() {
            let sensor = piston.sensor(settings.mapping.valve_for(gear));
            if let Some(s) = stuck
                && Gear::from(s.gear) == gear
                && s.index == index
            {
                sensor.stick(Some(s.value));
                tracing::info!(%gear, index, value = s.value, "simulated sensor stuck");
            }
            builder = match gear {
                Gear::Low => builder.with_low_sensor(sensor),
                Gear::High => builder.with_high_sensor(sensor),
            };
        }
    }
    let shifter = builder.build()?;
    Ok(SimRig { ctx, shifter })
}

pub const fn state_name(s: CheckerState) -> &'static str {
    match s {
        CheckerState::Resolved => "resolved",
        CheckerState::Unconfirmed => "unconfirmed",
        CheckerState::FailOpen => "fail_open",
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimOptions {
    pub throttle: f64,
    pub loop_period: Duration,
    pub json: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SimSummary {
    pub shifts: usize,
    pub gear: Gear,
    pub state: CheckerState,
    pub fail_open_count: u64,
}

struct Runner<'a> {
    rig: &'a SimRig,
    motors: Vec<SharedMotor>,
    events: EventReceiver,
    opts: SimOptions,
    started: Instant,
    shutdown: &'a AtomicBool,
}

impl Runner<'_> {
    /// Main loop for `span`: command every motor, run periodic work and print
    /// any shift events.
    fn drive_for(&self, span: Duration) -> Result<()> {
        let until = Instant::now() + span;
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return Err(ShiftError::State("interrupted".into()).into());
            }
            for m in &self.motors {
                m.with(|motor| motor.set_velocity(self.opts.throttle))?;
            }
            self.rig.ctx.update_all()?;
            self.print_events()?;
            let now = Instant::now();
            if now >= until {
                return Ok(());
            }
            std::thread::sleep(self.opts.loop_period.min(until - now));
        }
    }

    /// Hold the starting gear, then each gear of `shifts`, for `interval`.
    fn run_sequence(&self, shifts: &[GearName], interval: Duration) -> Result<usize> {
        self.drive_for(interval)?;
        for gear in shifts.iter().copied().map(Gear::from) {
            self.rig.shifter.shift_to_gear(gear)?;
            self.drive_for(interval)?;
        }
        Ok(shifts.len())
    }

    fn print_events(&self) -> Result<()> {
        for ev in self.events.try_iter() {
            let t_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
            if self.opts.json {
                let mut v = serde_json::to_value(ev)?;
                v["t_ms"] = json!(t_ms);
                println!("{v}");
            } else {
                let line = match ev {
                    ShiftEvent::Shifted { gear } => format!("shifted to {gear}"),
                    ShiftEvent::Confirmed { gear } => format!("{gear} gear confirmed by sensors"),
                    ShiftEvent::FailOpen { gear } => {
                        format!("{gear} gear failed open (sensors disagree), motors re-enabled")
                    }
                };
                println!("{t_ms:>6} ms  {line}");
            }
        }
        Ok(())
    }
}

/// Settle in the starting gear, then shift through `[simulation].shifts`,
/// holding each gear for `shift_interval_ms`.
pub fn run_simulation(cfg: &Config, opts: SimOptions, shutdown: &AtomicBool) -> Result<SimSummary> {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let rig = build_rig(cfg, clock)?;
    let motors = rig
        .ctx
        .names()
        .map(|n| rig.ctx.motor(n))
        .collect::<Result<Vec<_>>>()?;
    let runner = Runner {
        rig: &rig,
        motors,
        events: rig.shifter.events(),
        opts,
        started: Instant::now(),
        shutdown,
    };
    let interval = Duration::from_millis(cfg.simulation.shift_interval_ms);
    tracing::info!(shifts = cfg.simulation.shifts.len(), ?interval, "simulation start");

    let result = runner.run_sequence(&cfg.simulation.shifts, interval);
    if let Err(e) = rig.ctx.disable_all() {
        tracing::warn!(error = %e, "failed to disable motors after simulation");
    }
    let shifts = result?;
    runner.print_events()?;
    Ok(SimSummary {
        shifts,
        gear: rig.shifter.gear(),
        state: rig.shifter.state(),
        fail_open_count: rig.shifter.fail_open_count(),
    })
}
