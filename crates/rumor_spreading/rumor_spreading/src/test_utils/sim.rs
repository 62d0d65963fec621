use std::collections::{BTreeMap, BTreeSet, VecDeque};

use anyhow::Context;

use crate::{
    MemberId, MemberState, Message, MessageKind, NetworkConfig, Outgoing, RumorId, StatKey,
    Statistics,
};

/// A message on its way from one member to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: MemberId,
    pub to: MemberId,
    pub message: Message,
}

/// A fully connected network of members `0..n` living in one process.
///
/// Nothing happens on its own: [`SimNetwork::tick`] closes a round on every
/// member and queues the pushes, [`SimNetwork::transmit`] delivers them one
/// at a time in FIFO order.
#[derive(Debug, Clone)]
pub struct SimNetwork {
    members: BTreeMap<MemberId, MemberState>,
    inflight: VecDeque<Envelope>,
    rumors: BTreeSet<RumorId>,
    ticks: u32,
    pushes_delivered: u64,
    pulls_delivered: u64,
}

impl SimNetwork {
    /// Every member gets the bounds derived from `network_size`.
    pub fn new(network_size: usize, seed: u64) -> Self {
        Self::with_config(NetworkConfig::new(network_size), seed)
    }

    /// Member `i` draws its push targets from `seed + i`.
    pub fn with_config(config: NetworkConfig, seed: u64) -> Self {
        let ids: Vec<MemberId> = (0..config.network_size() as u64).map(MemberId).collect();
        let members = ids
            .iter()
            .map(|&id| {
                let peers = ids.iter().copied().filter(|peer| *peer != id);
                let state =
                    MemberState::new(peers, config, id).with_rng_seed(seed.wrapping_add(id.0));
                (id, state)
            })
            .collect();
        Self {
            members,
            inflight: VecDeque::new(),
            rumors: BTreeSet::new(),
            ticks: 0,
            pushes_delivered: 0,
            pulls_delivered: 0,
        }
    }

    /// Start `rumor` at `member`.
    pub fn add_rumor(&mut self, member: MemberId, rumor: RumorId) -> anyhow::Result<bool> {
        let state = self
            .members
            .get_mut(&member)
            .with_context(|| format!("no member {member}"))?;
        self.rumors.insert(rumor);
        Ok(state.add_rumor(rumor))
    }

    /// Advance every member by one round, in id order.
    pub fn tick(&mut self) -> anyhow::Result<()> {
        self.ticks += 1;
        for (id, state) in self.members.iter_mut() {
            let out = state
                .advance_round()
                .with_context(|| format!("tick {} at member {id}", self.ticks))?;
            if let Some(out) = out {
                self.inflight.extend(envelopes(*id, out));
            }
        }
        Ok(())
    }

    /// Deliver the oldest in-flight message. Returns false if there was none.
    pub fn transmit(&mut self) -> anyhow::Result<bool> {
        let Some(envelope) = self.inflight.pop_front() else {
            return Ok(false);
        };
        let state = self
            .members
            .get_mut(&envelope.to)
            .with_context(|| format!("message addressed to unknown member {}", envelope.to))?;
        match envelope.message.kind() {
            MessageKind::Push => self.pushes_delivered += 1,
            MessageKind::Pull => self.pulls_delivered += 1,
        }
        let replies = state.received_message(envelope.message, envelope.from);
        self.inflight.extend(envelopes(envelope.to, replies));
        Ok(true)
    }

    /// Transmit until nothing is in flight.
    pub fn flush(&mut self) -> anyhow::Result<()> {
        while self.transmit()? {}
        Ok(())
    }

    /// Tick and flush until every rumor is old everywhere. Returns how many
    /// ticks that took in total, or `None` if `budget` more ticks were not
    /// enough.
    pub fn run(&mut self, budget: u32) -> anyhow::Result<Option<u32>> {
        for _ in 0..budget {
            if self.all_rumors_old() {
                return Ok(Some(self.ticks));
            }
            self.tick()?;
            self.flush()?;
        }
        Ok(self.all_rumors_old().then_some(self.ticks))
    }

    /// True if no rumor was ever added.
    pub fn all_rumors_old(&self) -> bool {
        self.rumors
            .iter()
            .all(|rumor| self.members.values().all(|m| m.is_old(*rumor)))
    }

    /// One line per member and rumor it tracks.
    pub fn rumor_state_report(&self) -> String {
        let mut lines = Vec::new();
        for (id, state) in &self.members {
            for rumor in state.rumor_ids() {
                let phase = state.rumor_phase(rumor);
                let round = state.rumor_round(rumor);
                if let (Some(phase), Some(round)) = (phase, round) {
                    lines.push(format!("{id}: rumor {rumor} {phase} round {round}"));
                }
            }
        }
        lines.join("\n")
    }

    /// Every member's counters, in id order.
    pub fn statistics_report(&self) -> String {
        self.members
            .iter()
            .map(|(id, state)| state.statistics().report(*id))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Counters summed over all members.
    pub fn total_statistics(&self) -> Statistics {
        let mut total = Statistics::default();
        for state in self.members.values() {
            for (key, value) in state.statistics().iter() {
                total.increase(key, value);
            }
        }
        total
    }

    pub fn member(&self, id: MemberId) -> Option<&MemberState> {
        self.members.get(&id)
    }

    pub fn members(&self) -> impl Iterator<Item = &MemberState> + '_ {
        self.members.values()
    }

    pub fn inflight(&self) -> &VecDeque<Envelope> {
        &self.inflight
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn pushes_delivered(&self) -> u64 {
        self.pushes_delivered
    }

    pub fn pulls_delivered(&self) -> u64 {
        self.pulls_delivered
    }

    /// Convenience for tests reading one counter over the whole network.
    pub fn total(&self, key: StatKey) -> f64 {
        self.total_statistics().get(key)
    }
}

fn envelopes(from: MemberId, out: Outgoing) -> impl Iterator<Item = Envelope> {
    let Outgoing { target, messages } = out;
    messages.into_iter().map(move |message| Envelope {
        from,
        to: target,
        message,
    })
}
