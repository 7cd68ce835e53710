//! Bayesian-flavored Elo rating, pairing, and convergence engine over a
//! content-addressed image catalog.
//!
//! The crate is organized around five components: the [`catalog`] that
//! discovers and digests images, the [`rating`] engine that updates
//! posteriors from committed outcomes, the [`store`] that persists them,
//! the [`pairing`] engine that selects the next comparison, and the
//! [`convergence`] detector that reports how close the ranking is to
//! settled. [`session::SessionCoordinator`] is the single entry point that
//! ties all five together under one write lock.

pub mod catalog;
pub mod config;
pub mod convergence;
pub mod digest;
pub mod error;
pub mod pairing;
pub mod rating;
pub mod session;
pub mod store;

pub use config::CoreConfig;
pub use convergence::Metrics;
pub use digest::Digest;
pub use error::{CoreError, Result};
pub use rating::{Outcome, Posterior};
pub use session::SessionCoordinator;
