// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `RealExecutorBackend`, which tests replace with a fake.
//! - [`task_runner`] drives one task body on a Tokio task and reports its
//!   outcome back to the runtime.
//! - [`process`] spawns external programs with a timeout and collects their
//!   merged output; targets and modes build on it.

pub mod backend;
pub mod process;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend, RunnableTask};
pub use process::{ExitStatus, ProcessCommand, ProcessOutput};
