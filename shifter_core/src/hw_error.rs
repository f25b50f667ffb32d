//! Maps `Box<dyn Error>` from port boundaries to typed `ShiftError`.
//!
//! The ports in `shifter_traits` return `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `shifter_hardware::HwError` downcasting.

use crate::error::ShiftError;

/// Map a port error to a typed `ShiftError`.
///
/// Known hardware error types are downcast first; anything else becomes
/// `ShiftError::Hardware` carrying the error text.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ShiftError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<shifter_hardware::error::HwError>() {
            return match hw {
                shifter_hardware::error::HwError::SensorRead(_) => {
                    ShiftError::Hardware(hw.to_string())
                }
                other => ShiftError::HardwareFault(other.to_string()),
            };
        }
    }

    ShiftError::Hardware(e.to_string())
}

/// Convert a port error into the crate's `eyre` error.
pub(crate) fn port_err(e: &shifter_traits::PortError) -> eyre::Report {
    eyre::Report::new(map_hw_error(e.as_ref()))
}
