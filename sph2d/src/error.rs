use std::fmt;

use crate::uniforms::Stage;

/// Rejected simulation setup. Raised before any step runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    NoParticles,
    TooManyParticles { requested: usize, max: usize },
    /// The domain does not fit the 256x256 cell grid; `extent` is in cells.
    GridTooLarge { extent: [f32; 2] },
    CellSmallerThanRadius { cell_size: f32, radius: f32 },
    NonPositive(&'static str),
    Negative(&'static str),
    NonFinite(&'static str),
    InvalidDomain,
    TooManyWalls(usize),
    MalformedWall(usize),
    NonFiniteParticle(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoParticles => write!(f, "simulation needs at least one particle"),
            ConfigError::TooManyParticles { requested, max } => write!(
                f,
                "{requested} particles requested, the packed grid key holds at most {max}"
            ),
            ConfigError::GridTooLarge { extent } => write!(
                f,
                "domain spans cells {:?}, outside the 256x256 grid",
                extent
            ),
            ConfigError::CellSmallerThanRadius { cell_size, radius } => write!(
                f,
                "grid cell size {cell_size} is smaller than the smoothing length {radius}"
            ),
            ConfigError::NonPositive(name) => write!(f, "{name} must be positive"),
            ConfigError::Negative(name) => write!(f, "{name} must not be negative"),
            ConfigError::NonFinite(name) => write!(f, "{name} must be finite"),
            ConfigError::InvalidDomain => write!(f, "domain min must be below domain max"),
            ConfigError::TooManyWalls(count) => {
                write!(f, "{count} walls given, at most {} supported", crate::MAX_WALLS)
            }
            ConfigError::MalformedWall(index) => {
                write!(f, "wall {index} needs a finite unit normal and offset")
            }
            ConfigError::NonFiniteParticle(index) => {
                write!(f, "particle {index} has a non-finite position or velocity")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A step that was abandoned. The committed particle state is unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum StepError {
    NumericalInstability { particle: usize, density: f32 },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::NumericalInstability { particle, density } => write!(
                f,
                "density {density} of particle {particle} is not positive, step aborted"
            ),
        }
    }
}

impl std::error::Error for StepError {}

/// A stage observed out of pipeline order. Never recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOrderingError {
    pub expected: Stage,
    pub found: Stage,
}

impl fmt::Display for PipelineOrderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pipeline stage {} run out of order, expected {}",
            self.found.name(),
            self.expected.name()
        )
    }
}

impl std::error::Error for PipelineOrderingError {}
