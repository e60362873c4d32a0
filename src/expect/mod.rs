// src/expect/mod.rs

//! Expected results, loaded from JSON rule files, and the classification of
//! outcomes against them.

pub mod expectation;
pub mod store;

pub use expectation::{Expectation, TAG_FLAKY, TAG_LARGE};
pub use store::ExpectationStore;
