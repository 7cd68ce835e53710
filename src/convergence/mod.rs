//! The Convergence Detector: tracks the top-K ranking over time and reports
//! coverage, confidence, boundary gap, stability, and a composite progress
//! score.

pub mod metrics;

pub use metrics::{compute, rank, Metrics};
