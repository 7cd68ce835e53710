//! The Session Coordinator: the single entry point tying the catalog,
//! rating store, pairing engine, and convergence detector together behind
//! one write lock.

pub mod coordinator;
pub mod state;

pub use coordinator::SessionCoordinator;
pub use state::SessionState;
