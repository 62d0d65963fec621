use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use rumor_spreading::test_utils::init_tracing;
use rumor_spreading::*;

type Network<M> = BTreeMap<MemberId, M>;

fn network(n: u64) -> Network<Arc<RumorMember>> {
    let config = NetworkConfig::new(n as usize);
    (0..n)
        .map(|i| {
            let peers = (0..n).filter(move |p| *p != i).map(MemberId);
            let member = RumorMember::new(peers, config, MemberId(i)).with_rng_seed(i);
            (MemberId(i), Arc::new(member))
        })
        .collect()
}

/// Deliver `out` from `from`, and the pulls it provokes straight back.
fn deliver<M: RumorSpreading>(net: &Network<M>, from: MemberId, out: Outgoing) {
    let target = &net[&out.target];
    for message in out.messages {
        let replies = target.received_message(message, from);
        for reply in replies.messages {
            net[&replies.target].received_message(reply, out.target);
        }
    }
}

/// One thread per member per round, all delivering at once.
fn round<M: RumorSpreading + Sync>(net: &Network<M>) {
    thread::scope(|s| {
        for (id, member) in net {
            s.spawn(move || {
                if let Some(out) = member.advance_round().unwrap() {
                    deliver(net, *id, out);
                }
            });
        }
    });
}

fn all_old<M: RumorSpreading>(net: &Network<M>, rumors: &[RumorId]) -> bool {
    rumors
        .iter()
        .all(|r| net.values().all(|member| member.is_old(*r)))
}

#[test]
fn threaded_network_converges() {
    init_tracing();
    let net = network(8);
    let rumors = [RumorId(0), RumorId(1)];
    assert!(net[&MemberId(0)].add_rumor(rumors[0]));
    assert!(net[&MemberId(7)].add_rumor(rumors[1]));

    let mut rounds = 0;
    while !all_old(&net, &rumors) {
        rounds += 1;
        assert!(rounds <= 100, "no convergence after 100 rounds");
        round(&net);
    }

    let mut peers = 0.0;
    for member in net.values() {
        let stats = member.statistics();
        peers += stats.get(StatKey::NumPeers);
        assert_eq!(member.rumor_ids(), rumors.to_vec());
    }
    assert_eq!(peers, 8.0);

    // a member that first heard both rumors as old in the last round never
    // had to close a round, but the starters did
    for starter in [MemberId(0), MemberId(7)] {
        assert!(net[&starter].statistics().get(StatKey::Rounds) >= 1.0);
    }
}

#[test]
fn concurrent_deliveries_to_one_member() {
    let net = network(16);
    let hub = Arc::clone(&net[&MemberId(0)]);
    hub.add_rumor(RumorId(5));

    // every other member pushes at the hub in the same round
    thread::scope(|s| {
        for i in 1..16 {
            let hub = &hub;
            s.spawn(move || hub.received_message(Message::empty_push(), MemberId(i)));
        }
    });

    let stats = hub.statistics();
    assert_eq!(stats.get(StatKey::NumMessagesReceived), 15.0);
    // each pusher was new this round, so each got one pull
    assert_eq!(stats.get(StatKey::NumPullMessages), 15.0);
}

#[test]
fn copies_do_not_share_state() {
    let net = network(4);
    let original = &net[&MemberId(1)];
    original.add_rumor(RumorId(0));
    let copy = RumorMember::clone(original);

    copy.advance_round().unwrap();
    assert_eq!(copy.rumor_round(RumorId(0)), Some(1));
    assert_eq!(original.rumor_round(RumorId(0)), Some(0));
    assert_eq!(copy.peers(), original.peers());
    assert_eq!(&copy, &**original);
}
