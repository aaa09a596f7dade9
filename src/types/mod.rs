//! Shared type definitions
//!
//! Model identifiers, caller-supplied conversation context and the
//! response envelope returned by every assistant.

mod conversation;
mod envelope;
mod model;

pub use conversation::*;
pub use envelope::*;
pub use model::*;
