//! Hybrid generation coordinator
//!
//! Chooses between the local and remote backends for each prompt and
//! applies the fallback policy.

mod hybrid;

pub use hybrid::*;
