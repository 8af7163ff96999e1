//! Fan-out / stream-out batch runner.
//!
//! One task per item is spawned immediately. Every task yields exactly one
//! report, panics included, and reports are written to the output as soon as
//! they complete.

pub mod job;
pub mod runner;

pub use job::{
    Job,
    JsonLines,
    LineEncoder,
    Report,
};
pub use runner::{
    run,
    BatchSummary,
};
