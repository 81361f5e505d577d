use thiserror::Error;

use crate::nonstandard::Phase;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{field} is not present in {phase} states")]
    FieldNotSupported { field: &'static str, phase: Phase },
    #[error("expected {expected} block, found {actual} block")]
    PhaseMismatch { expected: Phase, actual: Phase },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum IndexError {
    #[error("index {index} does not fit in usize")]
    DoesNotFitInUsize { index: u64 },
    #[error("index {index} is out of bounds for collection of length {length}")]
    OutOfBounds { length: usize, index: usize },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum PushError {
    #[error("list is full ({maximum} elements)")]
    ListFull { maximum: usize },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum ReadError {
    #[error("expected list to have no more than {maximum} elements, found {actual} elements")]
    ListTooLong { maximum: usize, actual: usize },
    #[error("expected vector to have {expected} elements, found {actual} elements")]
    VectorSizeMismatch { expected: usize, actual: usize },
}
