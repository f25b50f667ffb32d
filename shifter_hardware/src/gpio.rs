//! Raspberry Pi GPIO devices for bench rigs: reed switches on inputs and a
//! double solenoid driven through two relay outputs.
use rppal::gpio::{Gpio, InputPin, OutputPin};
use shifter_traits::{Actuator, BinarySensor, PortResult, ValveState};
use tracing::trace;

use crate::error::{HwError, Result};

fn gpio() -> Result<Gpio> {
    Gpio::new().map_err(|e| HwError::Gpio(format!("open gpio: {e}")))
}

pub struct GpioSensor {
    pin: InputPin,
    active_low: bool,
}

impl GpioSensor {
    /// Input with the internal pull-up enabled; `active_low` inverts the reading.
    pub fn new(pin: u8, active_low: bool) -> Result<Self> {
        let pin = gpio()?
            .get(pin)
            .map_err(|e| HwError::Gpio(format!("open input pin {pin}: {e}")))?
            .into_input_pullup();
        Ok(Self { pin, active_low })
    }
}

impl BinarySensor for GpioSensor {
    fn get(&self) -> PortResult<bool> {
        Ok(self.pin.is_high() != self.active_low)
    }
}

pub struct GpioValve {
    forward: OutputPin,
    reverse: OutputPin,
    state: ValveState,
}

impl GpioValve {
    pub fn new(forward_pin: u8, reverse_pin: u8) -> Result<Self> {
        let gpio = gpio()?;
        let mut forward = gpio
            .get(forward_pin)
            .map_err(|e| HwError::Gpio(format!("open valve pin {forward_pin}: {e}")))?
            .into_output();
        let mut reverse = gpio
            .get(reverse_pin)
            .map_err(|e| HwError::Gpio(format!("open valve pin {reverse_pin}: {e}")))?
            .into_output();
        forward.set_low();
        reverse.set_low();
        Ok(Self {
            forward,
            reverse,
            state: ValveState::Off,
        })
    }
}

impl Actuator for GpioValve {
    fn set(&mut self, state: ValveState) -> PortResult<()> {
        // Break before make so both coils are never energized together.
        self.forward.set_low();
        self.reverse.set_low();
        match state {
            ValveState::Forward => self.forward.set_high(),
            ValveState::Reverse => self.reverse.set_high(),
            ValveState::Off => {}
        }
        trace!(?state, "gpio valve set");
        self.state = state;
        Ok(())
    }

    fn get(&self) -> PortResult<ValveState> {
        Ok(self.state)
    }
}
