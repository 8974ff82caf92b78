use core::fmt::{self, Display, Formatter};

use super::instantiate::FinalizeErrorKind;
use crate::key::TypeKey;

/// All finalizer failures collected while closing a scope or a container.
/// A failing finalizer doesn't stop the rest from being called.
#[derive(thiserror::Error, Debug)]
pub struct DisposalError {
    pub failures: Vec<(TypeKey, FinalizeErrorKind)>,
}

impl Display for DisposalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} finalizer(s) failed:", self.failures.len())?;
        for (key, err) in &self.failures {
            write!(f, " {key}: {err};")?;
        }
        Ok(())
    }
}
