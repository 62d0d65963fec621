//! The per-member protocol driver.
//!
//! [`MemberState`] holds the protocol logic and needs exclusive access.
//! [`RumorMember`] guards one behind a lock so that a round driver and any
//! number of message deliverers can share it, while
//! [`MemberActor`](super::MemberActor) gives it a task of its own instead.

use std::collections::{btree_map::Entry, BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use super::{RumorPhase, RumorStateMachine, StatKey, Statistics};
use crate::{Message, MessageKind, MemberId, NetworkConfig, Round, RumorError, RumorId, RumorResult};

/// Messages a member wants delivered, all to the same peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub target: MemberId,
    pub messages: Vec<Message>,
}

/// What a transport needs from a member.
pub trait RumorSpreading {
    fn id(&self) -> MemberId;

    /// Start tracking `rumor_id` as a rumor known first hand. Returns false if
    /// it was already tracked, old or not.
    fn add_rumor(&self, rumor_id: RumorId) -> bool;

    /// Handle `message` from `from`. The returned pulls go back to `from`.
    fn received_message(&self, message: Message, from: MemberId) -> Outgoing;

    /// Close the round. `Ok(None)` when there is nothing to gossip about,
    /// otherwise the pushes for the randomly chosen peer.
    fn advance_round(&self) -> RumorResult<Option<Outgoing>>;

    /// Untracked rumors are not old.
    fn is_old(&self, rumor_id: RumorId) -> bool;
}

impl<T: RumorSpreading + ?Sized> RumorSpreading for Arc<T> {
    fn id(&self) -> MemberId {
        (**self).id()
    }

    fn add_rumor(&self, rumor_id: RumorId) -> bool {
        (**self).add_rumor(rumor_id)
    }

    fn received_message(&self, message: Message, from: MemberId) -> Outgoing {
        (**self).received_message(message, from)
    }

    fn advance_round(&self) -> RumorResult<Option<Outgoing>> {
        (**self).advance_round()
    }

    fn is_old(&self, rumor_id: RumorId) -> bool {
        (**self).is_old(rumor_id)
    }
}

/// Everything one member knows. Not synchronized.
#[derive(Debug, Clone)]
pub struct MemberState {
    id: MemberId,
    config: NetworkConfig,
    peers: Vec<MemberId>,
    peers_in_current_round: HashSet<MemberId>,
    rumors: BTreeMap<RumorId, RumorStateMachine>,
    statistics: Statistics,
    rng: StdRng,
}

impl MemberState {
    /// # Panics
    ///
    /// If `peers` contains `id`, or if the config's network size is not the
    /// number of distinct peers plus the member itself.
    pub fn new(
        peers: impl IntoIterator<Item = MemberId>,
        config: NetworkConfig,
        id: MemberId,
    ) -> Self {
        let peers: BTreeSet<MemberId> = peers.into_iter().collect();
        assert!(
            !peers.contains(&id),
            "member {id} must not be listed as its own peer"
        );
        assert_eq!(
            config.network_size(),
            peers.len() + 1,
            "network size must count every peer of member {id} plus the member itself"
        );

        let mut statistics = Statistics::default();
        statistics.increase(StatKey::NumPeers, 1.0);

        Self {
            id,
            config,
            peers: peers.into_iter().collect(),
            peers_in_current_round: HashSet::new(),
            rumors: BTreeMap::new(),
            statistics,
            rng: StdRng::from_entropy(),
        }
    }

    /// Derive the [`NetworkConfig`] from the number of peers.
    pub fn with_default_config(peers: impl IntoIterator<Item = MemberId>, id: MemberId) -> Self {
        let peers: BTreeSet<MemberId> = peers.into_iter().collect();
        let config = NetworkConfig::new(peers.len() + 1);
        Self::new(peers, config, id)
    }

    /// Use explicit round bounds for a network of `peers` plus this member.
    /// Fails if any bound is zero.
    ///
    /// # Panics
    ///
    /// If `peers` contains `id`.
    pub fn with_bounds(
        peers: impl IntoIterator<Item = MemberId>,
        id: MemberId,
        max_rounds_in_b: Round,
        max_rounds_in_c: Round,
        max_rounds_total: Round,
    ) -> RumorResult<Self> {
        let peers: BTreeSet<MemberId> = peers.into_iter().collect();
        let config = NetworkConfig::with_bounds(
            peers.len() + 1,
            max_rounds_in_b,
            max_rounds_in_c,
            max_rounds_total,
        )?;
        Ok(Self::new(peers, config, id))
    }

    /// Make peer selection reproducible.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn add_rumor(&mut self, rumor_id: RumorId) -> bool {
        match self.rumors.entry(rumor_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(RumorStateMachine::new(self.config));
                tracing::debug!(member = %self.id, rumor = %rumor_id, "added rumor");
                true
            }
        }
    }

    pub fn received_message(&mut self, message: Message, from: MemberId) -> Outgoing {
        let is_new_peer = self.peers_in_current_round.insert(from);
        self.statistics.increase(StatKey::NumMessagesReceived, 1.0);
        tracing::trace!(member = %self.id, %from, %message, is_new_peer, "received message");

        let mut pulls = Vec::new();
        if is_new_peer && message.kind() == MessageKind::Push {
            pulls.extend(
                self.rumors
                    .iter()
                    .map(|(rumor_id, fsm)| Message::pull(*rumor_id, fsm.current_round())),
            );
            if pulls.is_empty() {
                pulls.push(Message::empty_pull());
                self.statistics.increase(StatKey::NumEmptyPullMessages, 1.0);
            } else {
                self.statistics
                    .increase(StatKey::NumPullMessages, pulls.len() as f64);
            }
        }

        if let Some(rumor_id) = message.rumor_id() {
            match self.rumors.entry(rumor_id) {
                Entry::Occupied(mut entry) => entry.get_mut().rumor_received(from, message.round()),
                Entry::Vacant(entry) => {
                    let fsm = RumorStateMachine::from_report(self.config, from, message.round());
                    tracing::debug!(
                        member = %self.id,
                        rumor = %rumor_id,
                        %from,
                        phase = %fsm.phase(),
                        "learned rumor"
                    );
                    entry.insert(fsm);
                }
            }
        }

        Outgoing {
            target: from,
            messages: pulls,
        }
    }

    pub fn advance_round(&mut self) -> RumorResult<Option<Outgoing>> {
        if self.rumors.is_empty() {
            return Ok(None);
        }
        let Some(&target) = self.peers.choose(&mut self.rng) else {
            tracing::warn!(member = %self.id, "cannot push without peers");
            return Err(RumorError::NoPeers { member: self.id });
        };
        self.statistics.increase(StatKey::Rounds, 1.0);

        let mut pushes = Vec::with_capacity(self.rumors.len());
        for (rumor_id, fsm) in self.rumors.iter_mut() {
            let before = fsm.phase();
            fsm.advance_round(&self.peers_in_current_round);
            if fsm.phase() != before {
                tracing::debug!(
                    member = %self.id,
                    rumor = %rumor_id,
                    from = %before,
                    to = %fsm.phase(),
                    round = fsm.current_round(),
                    "rumor phase transition"
                );
            }
            pushes.push(Message::push(*rumor_id, fsm.current_round()));
        }

        if pushes.is_empty() {
            pushes.push(Message::empty_push());
            self.statistics.increase(StatKey::NumEmptyPushMessages, 1.0);
        } else {
            self.statistics
                .increase(StatKey::NumPushMessages, pushes.len() as f64);
        }

        self.peers_in_current_round.clear();
        tracing::trace!(member = %self.id, %target, pushes = pushes.len(), "round advanced");

        Ok(Some(Outgoing {
            target,
            messages: pushes,
        }))
    }

    pub fn is_old(&self, rumor_id: RumorId) -> bool {
        self.rumors.get(&rumor_id).is_some_and(|fsm| fsm.is_old())
    }

    pub fn knows_rumor(&self, rumor_id: RumorId) -> bool {
        self.rumors.contains_key(&rumor_id)
    }

    pub fn rumor_phase(&self, rumor_id: RumorId) -> Option<RumorPhase> {
        self.rumors.get(&rumor_id).map(RumorStateMachine::phase)
    }

    pub fn rumor_round(&self, rumor_id: RumorId) -> Option<Round> {
        self.rumors
            .get(&rumor_id)
            .map(RumorStateMachine::current_round)
    }

    /// Every tracked rumor, in id order.
    pub fn rumor_ids(&self) -> Vec<RumorId> {
        self.rumors.keys().copied().collect()
    }

    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn network_config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn peers(&self) -> &[MemberId] {
        &self.peers
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }
}

/// A member that can be shared between threads.
///
/// Every operation holds the member's lock for its whole duration, so the
/// round driver and message deliverers never observe each other half way.
/// Members never lock each other.
#[derive(Debug)]
pub struct RumorMember {
    id: MemberId,
    config: NetworkConfig,
    state: Mutex<MemberState>,
}

impl RumorMember {
    /// See [`MemberState::new`] for the panics.
    pub fn new(
        peers: impl IntoIterator<Item = MemberId>,
        config: NetworkConfig,
        id: MemberId,
    ) -> Self {
        MemberState::new(peers, config, id).into()
    }

    /// Like [`RumorMember::new`], drawing the id from [`MemberId::next`].
    pub fn with_next_id(peers: impl IntoIterator<Item = MemberId>, config: NetworkConfig) -> Self {
        Self::new(peers, config, MemberId::next())
    }

    /// Derive the [`NetworkConfig`] from the number of peers.
    pub fn with_default_config(peers: impl IntoIterator<Item = MemberId>, id: MemberId) -> Self {
        MemberState::with_default_config(peers, id).into()
    }

    /// See [`MemberState::with_bounds`].
    pub fn with_bounds(
        peers: impl IntoIterator<Item = MemberId>,
        id: MemberId,
        max_rounds_in_b: Round,
        max_rounds_in_c: Round,
        max_rounds_total: Round,
    ) -> RumorResult<Self> {
        MemberState::with_bounds(peers, id, max_rounds_in_b, max_rounds_in_c, max_rounds_total)
            .map(Self::from)
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        let state = self.state.get_mut();
        *state = state.clone().with_rng_seed(seed);
        self
    }

    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn network_config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn peers(&self) -> Vec<MemberId> {
        self.state.lock().peers().to_vec()
    }

    #[cfg_attr(feature = "instrument", tracing::instrument(skip(self), fields(member = %self.id)))]
    pub fn add_rumor(&self, rumor_id: RumorId) -> bool {
        self.state.lock().add_rumor(rumor_id)
    }

    #[cfg_attr(feature = "instrument", tracing::instrument(skip(self), fields(member = %self.id)))]
    pub fn received_message(&self, message: Message, from: MemberId) -> Outgoing {
        self.state.lock().received_message(message, from)
    }

    #[cfg_attr(feature = "instrument", tracing::instrument(skip(self), fields(member = %self.id)))]
    pub fn advance_round(&self) -> RumorResult<Option<Outgoing>> {
        self.state.lock().advance_round()
    }

    pub fn is_old(&self, rumor_id: RumorId) -> bool {
        self.state.lock().is_old(rumor_id)
    }

    pub fn knows_rumor(&self, rumor_id: RumorId) -> bool {
        self.state.lock().knows_rumor(rumor_id)
    }

    pub fn rumor_phase(&self, rumor_id: RumorId) -> Option<RumorPhase> {
        self.state.lock().rumor_phase(rumor_id)
    }

    pub fn rumor_round(&self, rumor_id: RumorId) -> Option<Round> {
        self.state.lock().rumor_round(rumor_id)
    }

    pub fn rumor_ids(&self) -> Vec<RumorId> {
        self.state.lock().rumor_ids()
    }

    /// Snapshot of the counters.
    pub fn statistics(&self) -> Statistics {
        self.state.lock().statistics().clone()
    }

    /// Give up the lock, e.g. to hand the state to a
    /// [`MemberActor`](super::MemberActor).
    pub fn into_state(self) -> MemberState {
        self.state.into_inner()
    }
}

impl From<MemberState> for RumorMember {
    fn from(state: MemberState) -> Self {
        Self {
            id: state.id(),
            config: *state.network_config(),
            state: Mutex::new(state),
        }
    }
}

/// The copy gets its own lock.
impl Clone for RumorMember {
    fn clone(&self) -> Self {
        self.state.lock().clone().into()
    }
}

impl PartialEq for RumorMember {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RumorMember {}

impl std::hash::Hash for RumorMember {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl RumorSpreading for RumorMember {
    fn id(&self) -> MemberId {
        self.id
    }

    fn add_rumor(&self, rumor_id: RumorId) -> bool {
        RumorMember::add_rumor(self, rumor_id)
    }

    fn received_message(&self, message: Message, from: MemberId) -> Outgoing {
        RumorMember::received_message(self, message, from)
    }

    fn advance_round(&self) -> RumorResult<Option<Outgoing>> {
        RumorMember::advance_round(self)
    }

    fn is_old(&self, rumor_id: RumorId) -> bool {
        RumorMember::is_old(self, rumor_id)
    }
}
