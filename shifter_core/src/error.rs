use thiserror::Error;

use crate::profile::GearId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShiftError {
    #[error("motor '{motor}' has no profile for gear {gear}")]
    UnknownGear { motor: String, gear: GearId },
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("missing actuator")]
    MissingActuator,
    #[error("absolute and relative tolerance are mutually exclusive")]
    ConflictingTolerance,
    #[error("a tolerance (absolute or relative) is required")]
    MissingTolerance,
    #[error("duplicate gear id {0}")]
    DuplicateGear(GearId),
    #[error("starting gear {0} has no profile")]
    UnknownStartingGear(GearId),
    #[error("'{motor}' cannot follow gear {gear}")]
    UnsupportedGear { motor: String, gear: GearId },
    #[error("duplicate motor name '{0}'")]
    DuplicateMotor(String),
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
