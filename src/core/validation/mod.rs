//! Validation runs
//!
//! A validation run rebuilds a full EMAP instance from a time window of
//! source data and waits for the pipeline to process it, leaving the
//! environment files as they were found.

pub mod report;
pub mod runner;

pub use report::{BackgroundOutcome, IngestionFailure, Stage, ValidationReport};
pub use runner::{RunTimings, SourceSelection, ValidationRunner};
