//! Bridge to the external conformance validator.

use super::Error;
use crate::Word;
use std::io::Write as _;
use std::process::{Command, Stdio};

/// How to reach the external validator.
#[derive(Clone, Debug)]
pub struct Options {
    /// Executable name, resolved through `PATH`.
    pub command: String,
    pub args: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            command: "spirv-val".to_string(),
            args: Vec::new(),
        }
    }
}

/// Runs an assembled binary through the external validator.
///
/// The binary is piped to the child's standard input. Exit code zero means
/// the module passed; anything else surfaces the child's standard error
/// verbatim, uninterpreted.
pub struct Validator {
    options: Options,
}

impl Validator {
    pub fn new(options: Options) -> Self {
        Validator { options }
    }

    pub fn validate_words(&self, words: &[Word]) -> Result<(), Error> {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes().to_vec()).collect();
        self.validate_bytes(&bytes)
    }

    pub fn validate_bytes(&self, bytes: &[u8]) -> Result<(), Error> {
        log::debug!(
            "piping {} bytes to {} {:?}",
            bytes.len(),
            self.options.command,
            self.options.args
        );
        let mut child = Command::new(&self.options.command)
            .args(&self.options.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(bytes)?;
        }
        let output = child.wait_with_output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::Validation {
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}
