use mts_core::PersonId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersonError {
    #[error("{what}")]
    BadAttribute { what: &'static str },

    #[error("no person {0}")]
    Unknown(PersonId),

    #[error("person {0} has no home position")]
    NoHome(PersonId),
}

pub type PersonResult<T> = Result<T, PersonError>;
