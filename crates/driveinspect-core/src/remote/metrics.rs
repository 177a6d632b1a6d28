//! Remote call accounting.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Remote operations that are counted separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RemoteOp {
    Get,
    ListChildren,
    ListAll,
    ListNewer,
}

impl RemoteOp {
    pub const ALL: [RemoteOp; 4] = [
        RemoteOp::Get,
        RemoteOp::ListChildren,
        RemoteOp::ListAll,
        RemoteOp::ListNewer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RemoteOp::Get => "get",
            RemoteOp::ListChildren => "list_children",
            RemoteOp::ListAll => "list_all",
            RemoteOp::ListNewer => "list_newer",
        }
    }
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round-trip counters and fetch latency, owned by the remote access layer.
#[derive(Debug, Default)]
pub struct CallStats {
    calls: BTreeMap<RemoteOp, u64>,
    fetch_latency_total: Duration,
    fetch_latency_max: Duration,
    fetches_timed: u64,
}

impl CallStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one round trip for `op`.
    #[inline]
    pub fn record_call(&mut self, op: RemoteOp) {
        *self.calls.entry(op).or_insert(0) += 1;
    }

    /// Record the wall-clock latency of a single-node fetch.
    pub fn record_fetch_latency(&mut self, elapsed: Duration) {
        self.fetch_latency_total += elapsed;
        self.fetch_latency_max = self.fetch_latency_max.max(elapsed);
        self.fetches_timed += 1;
    }

    pub fn count(&self, op: RemoteOp) -> u64 {
        self.calls.get(&op).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self) -> CallStatsSnapshot {
        CallStatsSnapshot {
            calls: RemoteOp::ALL
                .iter()
                .map(|op| (op.as_str().to_string(), self.count(*op)))
                .collect(),
            fetches_timed: self.fetches_timed,
            fetch_latency_total: self.fetch_latency_total,
            fetch_latency_max: self.fetch_latency_max,
        }
    }
}

/// Read-only, serializable view of [`CallStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStatsSnapshot {
    /// Round trips per operation name.
    pub calls: BTreeMap<String, u64>,
    pub fetches_timed: u64,
    #[serde(with = "humantime_serde")]
    pub fetch_latency_total: Duration,
    #[serde(with = "humantime_serde")]
    pub fetch_latency_max: Duration,
}

impl CallStatsSnapshot {
    /// Calls recorded for `op`.
    pub fn get(&self, op: RemoteOp) -> u64 {
        self.calls.get(op.as_str()).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u64 {
        self.calls.values().sum()
    }

    /// Mean fetch latency; zero when nothing was timed.
    pub fn mean_fetch_latency(&self) -> Duration {
        if self.fetches_timed == 0 {
            Duration::ZERO
        } else {
            let nanos = self.fetch_latency_total.as_nanos() / u128::from(self.fetches_timed);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        }
    }
}
