//! Value types shared by every participant of a rumor spreading network.
//!
//! Nothing in here is mutable after construction except the process-wide
//! member id allocator, see [`MemberId::next`].

#![deny(missing_docs)]

mod config;
mod error;
mod id;
mod message;

pub use config::*;
pub use error::*;
pub use id::*;
pub use message::*;
