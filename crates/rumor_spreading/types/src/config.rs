use crate::{NetworkConfigError, Round};

/// Round bounds for one network, shared read-only by all of its members.
///
/// The defaults follow Karp et al., "Randomized Rumor Spreading": a rumor
/// stays hot for `O(ln ln n)` rounds, cools for as long again, and is retired
/// after `O(ln n)` rounds no matter what the peers report.
///
/// When deserialized, only `network_size` is required. Missing bounds fall
/// back to the derived defaults, and a missing `max_rounds_in_c` follows
/// `max_rounds_in_b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "NetworkConfigFile")]
pub struct NetworkConfig {
    network_size: usize,
    max_rounds_in_b: Round,
    max_rounds_in_c: Round,
    max_rounds_total: Round,
}

impl NetworkConfig {
    /// Derive every bound from the size of the network.
    ///
    /// # Panics
    ///
    /// If `network_size` is zero.
    pub fn new(network_size: usize) -> Self {
        assert!(network_size > 0, "a network has at least one member");
        let n = network_size as f64;
        let max_rounds_in_b = at_least_one(n.ln().ln());
        Self {
            network_size,
            max_rounds_in_b,
            max_rounds_in_c: max_rounds_in_b,
            max_rounds_total: at_least_one(n.ln()),
        }
    }

    /// Use caller supplied bounds.
    pub fn with_bounds(
        network_size: usize,
        max_rounds_in_b: Round,
        max_rounds_in_c: Round,
        max_rounds_total: Round,
    ) -> Result<Self, NetworkConfigError> {
        if network_size == 0 {
            return Err(NetworkConfigError::EmptyNetwork);
        }
        for (name, bound) in [
            ("max_rounds_in_b", max_rounds_in_b),
            ("max_rounds_in_c", max_rounds_in_c),
            ("max_rounds_total", max_rounds_total),
        ] {
            if bound == 0 {
                return Err(NetworkConfigError::ZeroBound(name));
            }
        }
        Ok(Self {
            network_size,
            max_rounds_in_b,
            max_rounds_in_c,
            max_rounds_total,
        })
    }

    /// Number of members, including the member holding this config.
    pub fn network_size(&self) -> usize {
        self.network_size
    }

    /// Rounds a rumor may stay in the NEW phase (B).
    pub fn max_rounds_in_b(&self) -> Round {
        self.max_rounds_in_b
    }

    /// Rounds a rumor may stay in the KNOWN phase (C).
    pub fn max_rounds_in_c(&self) -> Round {
        self.max_rounds_in_c
    }

    /// Hard ceiling after which a rumor is retired.
    pub fn max_rounds_total(&self) -> Round {
        self.max_rounds_total
    }
}

/// `ceil(x)`, clamped to 1 for anything smaller, including `-inf` and NaN.
fn at_least_one(x: f64) -> Round {
    let c = x.ceil();
    if c >= 1.0 {
        c as Round
    } else {
        1
    }
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct NetworkConfigFile {
    network_size: usize,
    #[serde(default)]
    max_rounds_in_b: Option<Round>,
    #[serde(default)]
    max_rounds_in_c: Option<Round>,
    #[serde(default)]
    max_rounds_total: Option<Round>,
}

impl TryFrom<NetworkConfigFile> for NetworkConfig {
    type Error = NetworkConfigError;

    fn try_from(file: NetworkConfigFile) -> Result<Self, Self::Error> {
        if file.network_size == 0 {
            return Err(NetworkConfigError::EmptyNetwork);
        }
        let derived = Self::new(file.network_size);
        let max_rounds_in_b = file.max_rounds_in_b.unwrap_or(derived.max_rounds_in_b);
        Self::with_bounds(
            file.network_size,
            max_rounds_in_b,
            file.max_rounds_in_c.unwrap_or(max_rounds_in_b),
            file.max_rounds_total.unwrap_or(derived.max_rounds_total),
        )
    }
}
