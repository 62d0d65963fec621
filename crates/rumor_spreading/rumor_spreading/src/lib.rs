//! Push-pull randomized rumor spreading.
//!
//! Every member of a fully connected network runs the same protocol: each
//! round it pushes every rumor it tracks to one randomly chosen peer, and it
//! answers the first push it receives in a round with pulls for everything it
//! knows. Each rumor ages through three phases (see [`RumorPhase`]) until it
//! is retired as old, so gossip about it dies down after `O(ln n)` rounds.
//!
//! This crate has no transport. A [`RumorMember`] hands back [`Outgoing`]
//! batches and the caller delivers them. [`MemberActor`] runs a member on a
//! tokio task instead, and the `test_utils` feature adds an in-process
//! network driver.

pub use rumor_spreading_types::*;

pub mod gossip;
pub use gossip::*;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
