use crate::{Round, RumorId};

/// Direction of a gossip message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display, serde::Serialize, serde::Deserialize,
)]
#[cfg_attr(feature = "fuzzing", derive(proptest_derive::Arbitrary))]
pub enum MessageKind {
    /// Sent proactively to the random target of a round.
    #[display(fmt = "PUSH")]
    Push,
    /// Sent back to a peer whose push was the first contact of the round.
    #[display(fmt = "PULL")]
    Pull,
}

/// A single rumor report exchanged between two members.
///
/// A message without a rumor is the "no content" sentinel: it still counts
/// as contact from the sender, but carries no evidence. Sentinels always
/// report round 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "fuzzing", derive(proptest_derive::Arbitrary))]
pub struct Message {
    kind: MessageKind,
    rumor_id: Option<RumorId>,
    round: Round,
}

impl Message {
    /// Construct a message of any kind.
    pub fn new(kind: MessageKind, rumor_id: Option<RumorId>, round: Round) -> Self {
        Self {
            kind,
            rumor_id,
            round,
        }
    }

    /// Announce `rumor_id` at `round`.
    pub fn push(rumor_id: RumorId, round: Round) -> Self {
        Self::new(MessageKind::Push, Some(rumor_id), round)
    }

    /// Answer a push with our own `round` for `rumor_id`.
    pub fn pull(rumor_id: RumorId, round: Round) -> Self {
        Self::new(MessageKind::Pull, Some(rumor_id), round)
    }

    /// Push sentinel.
    pub fn empty_push() -> Self {
        Self::new(MessageKind::Push, None, 0)
    }

    /// Pull sentinel.
    pub fn empty_pull() -> Self {
        Self::new(MessageKind::Pull, None, 0)
    }

    /// Push or pull.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// The rumor this message reports on, `None` for a sentinel.
    pub fn rumor_id(&self) -> Option<RumorId> {
        self.rumor_id
    }

    /// The sender's round for the rumor.
    pub fn round(&self) -> Round {
        self.round
    }

    /// True for the "no content" sentinel.
    pub fn is_empty(&self) -> bool {
        self.rumor_id.is_none()
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.rumor_id {
            Some(rumor_id) => write!(f, "{}(rumor {}, round {})", self.kind, rumor_id, self.round),
            None => write!(f, "{}(empty)", self.kind),
        }
    }
}
