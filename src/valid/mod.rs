//! Module validation: interior invariant checks and the bridge to the
//! external conformance validator.

mod check;
mod external;

pub use check::check;
pub use external::{Options, Validator};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("external validator rejected the module: {message}")]
    Validation { message: String },
    #[error("failed to run the external validator")]
    Io(#[from] std::io::Error),
}
