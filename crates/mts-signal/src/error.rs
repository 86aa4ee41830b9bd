use mts_core::JunctionId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("traffic light is disabled for junction {0}")]
    Disabled(JunctionId),

    #[error("junction {0} runs the max-pressure algorithm; programs cannot be set")]
    MaxPressure(JunctionId),

    #[error("program phase {phase} has {got} states for {expected} lanes")]
    WrongLaneCount {
        phase: usize,
        got: usize,
        expected: usize,
    },

    #[error("program has no phases")]
    EmptyProgram,

    #[error("invalid remaining time {0}")]
    InvalidRemaining(f64),
}

pub type SignalResult<T> = Result<T, SignalError>;
