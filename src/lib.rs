#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod config;
pub mod error;
pub mod knowledge;
pub mod orchestrator;
pub mod persona;
pub mod postprocess;
pub mod providers;
pub mod research;
pub mod sessions;
pub mod triage;

pub use config::Config;
pub use error::{IlirionError, Result};
pub use orchestrator::Orchestrator;
