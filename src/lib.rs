//! Soilscan - soil texture classification from photographs
//!
//! Classifies a soil image as sandy, clay, loam or silt and attaches the
//! agronomic profile for that class. A hosted vision model is asked first;
//! when it is unavailable an offline colour heuristic takes over, and a
//! failure of both still resolves to an error record rather than a panic.

pub mod advice;
pub mod cli;
pub mod config;
pub mod error;
pub mod heuristic;
pub mod input;
pub mod knowledge;
pub mod pipeline;
pub mod remote;
pub mod report;
pub mod sampler;
pub mod types;

pub use error::{Result, SoilError};
