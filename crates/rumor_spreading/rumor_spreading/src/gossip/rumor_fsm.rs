//! State of a single rumor at a single member.
//!
//! A rumor moves through three phases, only ever forward:
//!
//! - **New** (phase B): the member pushes the rumor and, once per round, holds
//!   a majority vote over the rounds its peers reported. Peers that are caught
//!   up or ahead age the rumor faster.
//! - **Known** (phase C): a fixed cooling-down period.
//! - **Old**: retired. The machine no longer changes and reports the round
//!   `max_rounds_total + 1`, which makes any member learning the rumor from
//!   it create the rumor as already old.
//!
//! `max_rounds_total` caps the whole life cycle, so every rumor is retired
//! after at most that many rounds regardless of what peers report.

use std::collections::{HashMap, HashSet};

use crate::{MemberId, NetworkConfig, Round};

/// The externally visible phase of a [`RumorStateMachine`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum RumorPhase {
    #[display(fmt = "NEW")]
    New,
    #[display(fmt = "KNOWN")]
    Known,
    #[display(fmt = "OLD")]
    Old,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Stage {
    /// Peer id -> the round that peer reported since the last evaluation.
    New {
        member_rounds: HashMap<MemberId, Round>,
    },
    Known,
    Old,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RumorStateMachine {
    config: NetworkConfig,
    stage: Stage,
    current_round: Round,
    rounds_in_b: Round,
    rounds_in_c: Round,
}

impl RumorStateMachine {
    /// A rumor this member knows first hand, e.g. one it originated.
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            stage: Stage::New {
                member_rounds: HashMap::new(),
            },
            current_round: 0,
            rounds_in_b: 0,
            rounds_in_c: 0,
        }
    }

    /// A rumor first heard of from `from`, who is at `their_round` with it.
    ///
    /// If `from` has already retired the rumor the machine starts out old.
    pub fn from_report(config: NetworkConfig, from: MemberId, their_round: Round) -> Self {
        let mut fsm = Self::new(config);
        if their_round > config.max_rounds_total() {
            fsm.retire();
        } else {
            fsm.rumor_received(from, their_round);
        }
        fsm
    }

    /// Record that `from` reported `their_round` for this rumor.
    ///
    /// Only a NEW rumor collects evidence. A second report from the same peer
    /// before the next evaluation replaces the first one.
    pub fn rumor_received(&mut self, from: MemberId, their_round: Round) {
        if let Stage::New { member_rounds } = &mut self.stage {
            member_rounds.insert(from, their_round);
        }
    }

    /// Close the current round.
    ///
    /// `peers_seen` are the peers that contacted the member this round. Those
    /// that did not report on this rumor count as being at round 0.
    pub fn advance_round(&mut self, peers_seen: &HashSet<MemberId>) {
        match self.stage {
            Stage::New { .. } => {
                self.current_round += 1;
                self.advance_new(peers_seen);
            }
            Stage::Known => {
                self.current_round += 1;
                self.advance_known();
            }
            Stage::Old => {}
        }
    }

    fn advance_new(&mut self, peers_seen: &HashSet<MemberId>) {
        self.rounds_in_b += 1;
        if self.current_round >= self.config.max_rounds_total() {
            self.retire();
            return;
        }

        let Stage::New { member_rounds } = &mut self.stage else {
            return;
        };
        for peer in peers_seen {
            member_rounds.entry(*peer).or_insert(0);
        }

        let mut num_less = 0usize;
        let mut num_greater_or_equal = 0usize;
        let mut decisive = false;
        for their_round in member_rounds.drain().map(|(_, round)| round) {
            if their_round < self.current_round {
                num_less += 1;
            } else if their_round >= self.config.max_rounds_in_b() {
                decisive = true;
            } else {
                num_greater_or_equal += 1;
            }
        }

        if num_greater_or_equal > num_less {
            self.rounds_in_b += 1;
        }
        if decisive || self.rounds_in_b >= self.config.max_rounds_in_b() {
            self.stage = Stage::Known;
        }
    }

    fn advance_known(&mut self) {
        self.rounds_in_c += 1;
        if self.current_round >= self.config.max_rounds_total()
            || self.rounds_in_c >= self.config.max_rounds_in_c()
        {
            self.retire();
        }
    }

    fn retire(&mut self) {
        self.stage = Stage::Old;
    }

    pub fn phase(&self) -> RumorPhase {
        match self.stage {
            Stage::New { .. } => RumorPhase::New,
            Stage::Known => RumorPhase::Known,
            Stage::Old => RumorPhase::Old,
        }
    }

    /// Rounds since the member learned the rumor, or `max_rounds_total + 1`
    /// once it is old.
    pub fn current_round(&self) -> Round {
        match self.stage {
            Stage::Old => self.config.max_rounds_total().saturating_add(1),
            _ => self.current_round,
        }
    }

    pub fn rounds_in_b(&self) -> Round {
        self.rounds_in_b
    }

    pub fn rounds_in_c(&self) -> Round {
        self.rounds_in_c
    }

    pub fn is_old(&self) -> bool {
        self.phase() == RumorPhase::Old
    }

    /// Number of peer reports waiting for the next evaluation.
    pub fn pending_evidence(&self) -> usize {
        match &self.stage {
            Stage::New { member_rounds } => member_rounds.len(),
            _ => 0,
        }
    }
}
