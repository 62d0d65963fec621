use std::collections::BTreeMap;

use crate::MemberId;

/// Counters kept by every member.
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
pub enum StatKey {
    /// Increased once on construction, so it sums to the network size.
    #[display(fmt = "NumPeers")]
    NumPeers,
    #[display(fmt = "NumMessagesReceived")]
    NumMessagesReceived,
    #[display(fmt = "Rounds")]
    Rounds,
    #[display(fmt = "NumPushMessages")]
    NumPushMessages,
    #[display(fmt = "NumEmptyPushMessages")]
    NumEmptyPushMessages,
    #[display(fmt = "NumPullMessages")]
    NumPullMessages,
    #[display(fmt = "NumEmptyPullMessages")]
    NumEmptyPullMessages,
}

/// Monotonically accumulating counters. Nothing is ever reset.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct Statistics(BTreeMap<StatKey, f64>);

impl Statistics {
    pub fn increase(&mut self, key: StatKey, by: f64) {
        *self.0.entry(key).or_default() += by;
    }

    /// The accumulated value, 0 if the counter was never touched.
    pub fn get(&self, key: StatKey) -> f64 {
        self.0.get(&key).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatKey, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    /// Human readable block for `member`, one counter per line.
    pub fn report(&self, member: MemberId) -> String {
        let mut out = format!("{member}: {{\n");
        for (key, value) in self.iter() {
            out.push_str(&format!("  {key}: {value}\n"));
        }
        out.push('}');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn counters_accumulate() {
        let mut stats = Statistics::default();
        assert_eq!(stats.get(StatKey::Rounds), 0.0);
        stats.increase(StatKey::Rounds, 1.0);
        stats.increase(StatKey::Rounds, 1.0);
        stats.increase(StatKey::NumPushMessages, 3.0);
        assert_eq!(stats.get(StatKey::Rounds), 2.0);
        assert_eq!(stats.get(StatKey::NumPushMessages), 3.0);
        assert_eq!(stats.iter().count(), 2);
    }

    #[test]
    fn report_lists_touched_counters_in_key_order() {
        let mut stats = Statistics::default();
        stats.increase(StatKey::Rounds, 4.0);
        stats.increase(StatKey::NumPeers, 1.0);
        assert_eq!(
            stats.report(MemberId(3)),
            "3: {\n  NumPeers: 1\n  Rounds: 4\n}"
        );
    }

    #[test]
    fn serializes_keyed_by_name() {
        let mut stats = Statistics::default();
        stats.increase(StatKey::NumEmptyPullMessages, 2.0);
        assert_eq!(
            serde_json::to_string(&stats).unwrap(),
            r#"{"NumEmptyPullMessages":2.0}"#
        );
    }
}
