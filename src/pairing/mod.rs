//! The Pairing Engine: CPU-only selection of the next comparison pair from
//! the current posteriors and recency history.

pub mod pools;
pub mod selector;

pub use pools::{Pool, Pools};
pub use selector::select_pair;
