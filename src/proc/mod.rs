//! Processing passes between the flat and structured module forms.

mod build;
mod emit;

pub use build::build;
pub use emit::emit;
pub(crate) use emit::type_declaration;

use crate::{binary, Module, RawModule, Word};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] binary::Error),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl Module {
    /// Structures a flat module in a single pass.
    pub fn from_raw(raw: &RawModule) -> Result<Self, Error> {
        build(raw)
    }

    /// Lowers back to a flat module in the canonical section order.
    pub fn to_raw(&self) -> Result<RawModule, Error> {
        emit(self)
    }

    pub fn from_words(words: &[Word]) -> Result<Self, crate::Error> {
        let raw = binary::parse_words(words).map_err(crate::Error::Binary)?;
        build(&raw).map_err(|e| crate::Error::Proc(e))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, crate::Error> {
        let raw = binary::parse_bytes(bytes).map_err(crate::Error::Binary)?;
        build(&raw).map_err(|e| crate::Error::Proc(e))
    }

    pub fn to_words(&self) -> Result<Vec<Word>, Error> {
        Ok(binary::write_words(&self.to_raw()?))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(binary::write_bytes(&self.to_raw()?))
    }
}
