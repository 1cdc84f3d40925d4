use std::collections::HashMap;
use std::time::Instant;

use dashmap::DashMap;
use pnet::util::MacAddr;

use crate::session::SwitchId;

#[derive(Debug, Clone, Copy)]
struct PortEntry {
    port: u32,
    last_seen: Instant,
}

/// Per-switch MAC-to-port learning table: the last seen location of each
/// host. Entries are overwritten on every sighting (last-writer-wins) and
/// never aged out; `last_seen` is recorded so an eviction policy can be
/// added without changing the data model.
#[derive(Debug, Default)]
pub struct LearningTable {
    hosts: DashMap<SwitchId, HashMap<MacAddr, PortEntry>>,
}

impl LearningTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `mac` was seen entering `switch` on `port`.
    pub fn observe(&self, switch: SwitchId, mac: MacAddr, port: u32) {
        self.hosts.entry(switch).or_default().insert(
            mac,
            PortEntry {
                port,
                last_seen: Instant::now(),
            },
        );
    }

    /// Last known port for `mac` on `switch`. Absence means flood.
    pub fn lookup(&self, switch: SwitchId, mac: MacAddr) -> Option<u32> {
        self.hosts.get(&switch)?.get(&mac).map(|e| e.port)
    }

    pub fn last_seen(&self, switch: SwitchId, mac: MacAddr) -> Option<Instant> {
        self.hosts.get(&switch)?.get(&mac).map(|e| e.last_seen)
    }

    /// Discard all entries for a switch (disconnect path).
    pub fn forget(&self, switch: SwitchId) {
        self.hosts.remove(&switch);
    }

    pub fn host_count(&self, switch: SwitchId) -> usize {
        self.hosts.get(&switch).map(|m| m.len()).unwrap_or(0)
    }

    /// Learned (mac, port) pairs per switch, for external reporting.
    pub fn snapshot(&self) -> HashMap<SwitchId, Vec<(MacAddr, u32)>> {
        self.hosts
            .iter()
            .map(|entry| {
                let mut hosts: Vec<(MacAddr, u32)> =
                    entry.value().iter().map(|(m, e)| (*m, e.port)).collect();
                hosts.sort_by_key(|(m, _)| m.octets());
                (*entry.key(), hosts)
            })
            .collect()
    }
}
