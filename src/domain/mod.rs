//! Domain models and types for the EMAP runner.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Error types** ([`EmapError`]) and the crate-wide [`Result`] alias
//! - **Time windows** ([`TimeWindow`]) parsed from `today`, `<N> days ago` or ISO dates
//! - **Repositories** ([`Repository`]) described by the global configuration
//!
//! # Example
//!
//! ```rust
//! use emap_runner::domain::TimeWindow;
//!
//! # fn example() -> emap_runner::domain::Result<()> {
//! let window = TimeWindow::new("7 days ago", "today")?;
//! println!("{} .. {}", window.start_stamp(), window.end_stamp());
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod repository;
pub mod result;
pub mod time_window;

pub use errors::EmapError;
pub use repository::Repository;
pub use result::Result;
pub use time_window::TimeWindow;
