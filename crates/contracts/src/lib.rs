//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data Flow
//! - `FetchSource` → `FetchReply` → (retry, gate, barrier) → `FetchOutcome`
//! - `FetchOutcome` lanes + historical `Table` → merged `Table`
//! - `Table` → transform chain → `DataSink`s

mod blueprint;
mod error;
mod measurement;
mod sink;
mod source;
mod table;

pub use blueprint::*;
pub use error::*;
pub use measurement::*;
pub use sink::*;
pub use source::*;
pub use table::*;
