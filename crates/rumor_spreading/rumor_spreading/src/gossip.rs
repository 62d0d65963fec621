//! The protocol itself: one state machine per rumor, one driver per member.

mod actor;
mod member;
mod rumor_fsm;
mod stats;

pub use actor::*;
pub use member::*;
pub use rumor_fsm::*;
pub use stats::*;

#[cfg(test)]
mod scenarios;
