//! Result of a state mutation that may have failed to persist.

use crate::error::PersistenceError;

/// The value produced by an engine operation, plus the save failure if the
/// new state could not be written.
///
/// A failed save never undoes the mutation: the engine keeps running on its
/// in-memory state and retries the write on the next mutation or tick.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub persist_error: Option<PersistenceError>,
}

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            persist_error: None,
        }
    }

    pub fn degraded(value: T, error: PersistenceError) -> Self {
        Self {
            value,
            persist_error: Some(error),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.persist_error.is_none()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            persist_error: self.persist_error,
        }
    }

    pub fn into_parts(self) -> (T, Option<PersistenceError>) {
        (self.value, self.persist_error)
    }

    /// Treat a save failure as an error, dropping the value.
    pub fn into_result(self) -> Result<T, PersistenceError> {
        match self.persist_error {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}
