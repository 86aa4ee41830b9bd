use mts_map::MapError;
use mts_person::PersonError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("map error: {0}")]
    Map(#[from] MapError),

    #[error("person error: {0}")]
    Person(#[from] PersonError),

    #[error("simulation configuration error: {0}")]
    Config(String),
}

pub type SimResult<T> = Result<T, SimError>;
