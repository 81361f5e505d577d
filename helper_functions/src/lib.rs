pub mod accessors;
pub mod error;
pub mod fork;
pub mod misc;
pub mod mutators;
pub mod par_utils;
pub mod predicates;
pub mod signing;
pub mod verifier;
