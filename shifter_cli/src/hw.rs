//! Bench-rig probe: open the configured valve and reed switches on GPIO and
//! read each sensor once. The valve is left de-energized.

use eyre::Result;
use shifter_config::ShifterCfg;
use shifter_core::hw_error::map_hw_error;
use shifter_hardware::gpio::{GpioSensor, GpioValve};
use shifter_traits::BinarySensor;

#[derive(Debug, Clone, Copy)]
pub struct SensorReading {
    pub pin: u8,
    pub value: bool,
}

fn hw(e: &shifter_hardware::error::HwError) -> eyre::Report {
    eyre::Report::new(map_hw_error(e))
}

pub fn probe(sh: &ShifterCfg) -> Result<Vec<SensorReading>> {
    let _valve = GpioValve::new(sh.forward_channel, sh.reverse_channel).map_err(|e| hw(&e))?;
    let mut readings = Vec::new();
    for &pin in sh.low_sensors.iter().chain(&sh.high_sensors) {
        let sensor = GpioSensor::new(pin, sh.sensors_active_low).map_err(|e| hw(&e))?;
        let value = sensor
            .get()
            .map_err(|e| eyre::Report::new(map_hw_error(e.as_ref())))?;
        tracing::debug!(pin, value, "gpio sensor probed");
        readings.push(SensorReading { pin, value });
    }
    Ok(readings)
}
