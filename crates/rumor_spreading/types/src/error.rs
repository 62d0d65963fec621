use crate::MemberId;

/// A [`crate::NetworkConfig`] that would break the "every bound is at least one" rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkConfigError {
    /// A network must contain at least the member itself.
    #[error("network size must be at least 1")]
    EmptyNetwork,

    /// One of the round bounds was zero.
    #[error("{0} must be at least 1")]
    ZeroBound(&'static str),
}

/// Errors surfaced by the gossip engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RumorError {
    /// A round needs a random push target but the member has no peers.
    #[error("member {member} has no peers to push to")]
    NoPeers {
        /// The member asked to advance.
        member: MemberId,
    },

    /// The task serving a member handle has stopped.
    #[error("actor for member {member} is no longer running")]
    ActorClosed {
        /// The member the handle pointed at.
        member: MemberId,
    },

    /// Invalid network configuration.
    #[error(transparent)]
    Config(#[from] NetworkConfigError),
}

/// Result type for the gossip engine.
pub type RumorResult<T> = Result<T, RumorError>;
