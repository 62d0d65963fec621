use std::sync::atomic::{AtomicU64, Ordering};

/// Last id handed out by [`MemberId::next`].
static LAST_MEMBER_ID: AtomicU64 = AtomicU64::new(0);

/// The number of rounds a member has known a rumor for.
pub type Round = u32;

/// Identifies one participant of the network.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
#[cfg_attr(feature = "fuzzing", derive(proptest_derive::Arbitrary))]
pub struct MemberId(pub u64);

impl MemberId {
    /// Allocate a fresh id from the process-wide counter.
    ///
    /// Ids are strictly increasing and never reused, the first one is `1`.
    /// Explicitly constructed ids are not tracked, so mixing the two styles
    /// in one network is the caller's responsibility.
    pub fn next() -> Self {
        Self(LAST_MEMBER_ID.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Identifies a rumor independently of its payload.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
#[cfg_attr(feature = "fuzzing", derive(proptest_derive::Arbitrary))]
pub struct RumorId(pub u64);
