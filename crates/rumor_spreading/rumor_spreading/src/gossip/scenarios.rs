use std::collections::BTreeSet;

use maplit::btreeset;
use pretty_assertions::assert_eq;
use test_case::test_case;

use super::*;
use crate::test_utils::{init_tracing, SimNetwork};
use crate::{MemberId, Message, MessageKind, NetworkConfig, RumorId};

#[test_case(1)]
#[test_case(2)]
#[test_case(3)]
#[test_case(42)]
#[test_case(1234)]
fn single_rumor_reaches_everyone(seed: u64) {
    init_tracing();
    let mut net = SimNetwork::new(8, seed);
    net.add_rumor(MemberId(0), RumorId(0)).unwrap();

    let ticks = net.run(50).unwrap();
    assert!(ticks.is_some(), "no convergence:\n{}", net.rumor_state_report());

    for m in net.members() {
        assert!(m.is_old(RumorId(0)), "{}", net.rumor_state_report());
    }
}

#[test]
fn two_rumors_from_different_members() -> anyhow::Result<()> {
    init_tracing();
    let mut net = SimNetwork::new(8, 99);
    net.add_rumor(MemberId(0), RumorId(0))?;
    net.add_rumor(MemberId(5), RumorId(1))?;

    assert!(net.run(50)?.is_some(), "{}", net.rumor_state_report());
    for m in net.members() {
        let known: BTreeSet<_> = m.rumor_ids().into_iter().collect();
        assert_eq!(known, btreeset! {RumorId(0), RumorId(1)});
    }
    Ok(())
}

#[test]
fn rumor_started_twice_is_tracked_once() -> anyhow::Result<()> {
    let mut net = SimNetwork::new(6, 5);
    assert!(net.add_rumor(MemberId(1), RumorId(7))?);
    assert!(!net.add_rumor(MemberId(1), RumorId(7))?);
    assert!(net.add_rumor(MemberId(4), RumorId(7))?);
    assert!(net.run(50)?.is_some(), "{}", net.rumor_state_report());
    Ok(())
}

#[test]
fn late_member_learns_the_rumor_as_old() {
    init_tracing();
    let config = NetworkConfig::new(3);
    let peers = |id: u64| (0..3).filter(move |p| *p != id).map(MemberId);
    let mut veteran = MemberState::new(peers(0), config, MemberId(0)).with_rng_seed(1);
    let mut late = MemberState::new(peers(2), config, MemberId(2));

    veteran.add_rumor(RumorId(0));
    while !veteran.is_old(RumorId(0)) {
        veteran.advance_round().unwrap();
    }

    let push = veteran.advance_round().unwrap().unwrap();
    assert_eq!(
        push.messages,
        vec![Message::push(RumorId(0), config.max_rounds_total() + 1)]
    );

    let reply = late.received_message(push.messages[0], MemberId(0));
    assert!(late.is_old(RumorId(0)));
    assert_eq!(late.rumor_phase(RumorId(0)), Some(RumorPhase::Old));
    // it had nothing to offer when the push arrived
    assert_eq!(reply.messages, vec![Message::empty_pull()]);
}

#[test]
fn pulls_teach_the_pusher() {
    let config = NetworkConfig::new(2);
    let mut a = MemberState::new([MemberId(1)], config, MemberId(0));
    let mut b = MemberState::new([MemberId(0)], config, MemberId(1));
    b.add_rumor(RumorId(3));
    a.add_rumor(RumorId(4));

    let push = a.advance_round().unwrap().unwrap();
    assert_eq!(push.target, MemberId(1));
    let mut pulls = Message::empty_pull();
    for message in push.messages {
        let reply = b.received_message(message, MemberId(0));
        if let Some(first) = reply.messages.first() {
            pulls = *first;
        }
    }
    a.received_message(pulls, MemberId(1));

    assert!(a.knows_rumor(RumorId(3)));
    assert!(b.knows_rumor(RumorId(4)));
}

#[test]
fn isolated_member_reports_instead_of_panicking() {
    let mut net = SimNetwork::new(1, 0);
    assert!(net.run(5).unwrap().is_some());

    net.add_rumor(MemberId(0), RumorId(0)).unwrap();
    let err = net.tick().unwrap_err();
    assert!(format!("{err:#}").contains("no peers"), "{err:#}");
}

#[test]
fn traffic_is_well_formed() -> anyhow::Result<()> {
    let mut net = SimNetwork::new(8, 17);
    net.add_rumor(MemberId(3), RumorId(0))?;

    for _ in 0..40 {
        net.tick()?;
        for envelope in net.inflight() {
            assert_ne!(envelope.from, envelope.to);
            assert_eq!(envelope.message.kind(), MessageKind::Push);
            assert_eq!(envelope.message.rumor_id(), Some(RumorId(0)));
            assert!(envelope.message.round() >= 1);
        }
        net.flush()?;
    }

    assert!(net.all_rumors_old());
    assert_eq!(
        net.total(StatKey::NumMessagesReceived),
        (net.pushes_delivered() + net.pulls_delivered()) as f64
    );
    assert_eq!(net.total(StatKey::NumPeers), 8.0);
    assert_eq!(net.total(StatKey::NumEmptyPushMessages), 0.0);
    Ok(())
}

#[test]
fn same_seed_same_history() -> anyhow::Result<()> {
    let history = |seed| -> anyhow::Result<_> {
        let mut net = SimNetwork::new(16, seed);
        net.add_rumor(MemberId(0), RumorId(0))?;
        let ticks = net.run(60)?;
        Ok((ticks, net.rumor_state_report(), net.statistics_report()))
    };
    assert_eq!(history(8)?, history(8)?);
    Ok(())
}

#[test]
fn explicit_bounds_stretch_the_gossip() -> anyhow::Result<()> {
    let config = NetworkConfig::with_bounds(8, 4, 4, 12)?;
    let mut net = SimNetwork::with_config(config, 3);
    net.add_rumor(MemberId(0), RumorId(0))?;
    let ticks = net.run(80)?.unwrap_or_default();
    // at least two rounds hot, then four cooling
    assert!(ticks >= 6, "{}", net.rumor_state_report());
    assert!(net.all_rumors_old());
    Ok(())
}
