use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::session::SwitchId;

fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Process-wide controller counters.
#[derive(Debug, Default)]
pub struct ControllerStats {
    pub packets_in: AtomicU64,
    pub lldp_ignored: AtomicU64,
    pub floods: AtomicU64,
    pub forwarded: AtomicU64,
    pub rules_installed: AtomicU64,
    pub install_failures: AtomicU64,
    pub table_miss_failures: AtomicU64,
    pub redirects: AtomicU64,
}

impl ControllerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ControllerStatsSnapshot {
        ControllerStatsSnapshot {
            packets_in: self.packets_in.load(Ordering::Relaxed),
            lldp_ignored: self.lldp_ignored.load(Ordering::Relaxed),
            floods: self.floods.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            rules_installed: self.rules_installed.load(Ordering::Relaxed),
            install_failures: self.install_failures.load(Ordering::Relaxed),
            table_miss_failures: self.table_miss_failures.load(Ordering::Relaxed),
            redirects: self.redirects.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ControllerStatsSnapshot {
    pub packets_in: u64,
    pub lldp_ignored: u64,
    pub floods: u64,
    pub forwarded: u64,
    pub rules_installed: u64,
    pub install_failures: u64,
    pub table_miss_failures: u64,
    pub redirects: u64,
}

/// Append-only observation log for classified traffic, keyed by the
/// (source, destination) flow descriptor. Grows for the life of the
/// process, never pruned.
#[derive(Debug, Default)]
pub struct TrafficLog {
    flows: RwLock<HashMap<(Ipv4Addr, Ipv4Addr), Vec<u64>>>,
}

impl TrafficLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observation timestamp for (src, dst).
    pub fn record(&self, src: Ipv4Addr, dst: Ipv4Addr) {
        let now = current_time_ms();
        self.flows.write().entry((src, dst)).or_default().push(now);
    }

    pub fn flow_count(&self) -> usize {
        self.flows.read().len()
    }

    pub fn observation_count(&self, src: Ipv4Addr, dst: Ipv4Addr) -> usize {
        self.flows
            .read()
            .get(&(src, dst))
            .map(|v| v.len())
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> Vec<TrafficFlowSnapshot> {
        let flows = self.flows.read();
        let mut out: Vec<TrafficFlowSnapshot> = flows
            .iter()
            .map(|((src, dst), times)| TrafficFlowSnapshot {
                src: *src,
                dst: *dst,
                observations: times.len() as u64,
                first_seen_ms: times.first().copied().unwrap_or_default(),
                last_seen_ms: times.last().copied().unwrap_or_default(),
            })
            .collect();
        out.sort_by_key(|f| (f.src, f.dst));
        out
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TrafficFlowSnapshot {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub observations: u64,
    pub first_seen_ms: u64,
    pub last_seen_ms: u64,
}

/// One flow counter record from a flow-stats reply.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FlowStatEntry {
    pub table_id: u8,
    pub match_summary: String,
    pub packet_count: u64,
    pub byte_count: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SwitchFlowStats {
    pub updated_ms: u64,
    pub entries: Vec<FlowStatEntry>,
}

/// Aggregates per-flow counters reported by switches. Purely an
/// observability surface; a dropped or late reply only leaves the previous
/// aggregate in place.
#[derive(Debug, Default)]
pub struct FlowStatsCollector {
    switches: RwLock<HashMap<SwitchId, SwitchFlowStats>>,
}

impl FlowStatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the aggregate for a switch with the latest reply.
    pub fn record_reply(&self, switch: SwitchId, entries: Vec<FlowStatEntry>) {
        let count = entries.len();
        self.switches.write().insert(
            switch,
            SwitchFlowStats {
                updated_ms: current_time_ms(),
                entries,
            },
        );
        tracing::debug!(switch = %switch, flows = count, "flow stats updated");
    }

    pub fn forget(&self, switch: SwitchId) {
        self.switches.write().remove(&switch);
    }

    pub fn flow_count(&self, switch: SwitchId) -> usize {
        self.switches
            .read()
            .get(&switch)
            .map(|s| s.entries.len())
            .unwrap_or(0)
    }

    pub fn total_flow_count(&self) -> usize {
        self.switches.read().values().map(|s| s.entries.len()).sum()
    }

    pub fn snapshot(&self) -> HashMap<String, SwitchFlowStats> {
        self.switches
            .read()
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const S1: SwitchId = SwitchId(1);
    const S2: SwitchId = SwitchId(2);

    fn addr(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 1, last)
    }

    #[test]
    fn test_traffic_log_appends() {
        let log = TrafficLog::new();
        log.record(addr(1), addr(10));
        log.record(addr(1), addr(10));
        log.record(addr(2), addr(10));

        assert_eq!(log.flow_count(), 2);
        assert_eq!(log.observation_count(addr(1), addr(10)), 2);
        assert_eq!(log.observation_count(addr(2), addr(10)), 1);
        assert_eq!(log.observation_count(addr(3), addr(10)), 0);
    }

    #[test]
    fn test_traffic_log_snapshot_ordering() {
        let log = TrafficLog::new();
        log.record(addr(2), addr(10));
        log.record(addr(1), addr(10));

        let snap = log.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].src, addr(1));
        assert_eq!(snap[1].src, addr(2));
        assert!(snap[0].first_seen_ms <= snap[0].last_seen_ms);
    }

    #[test]
    fn test_flow_stats_replace_previous_reply() {
        let collector = FlowStatsCollector::new();
        collector.record_reply(
            S1,
            vec![FlowStatEntry {
                table_id: 0,
                match_summary: "any".into(),
                packet_count: 1,
                byte_count: 60,
            }],
        );
        collector.record_reply(S1, Vec::new());

        assert_eq!(collector.flow_count(S1), 0);
        assert_eq!(collector.snapshot().len(), 1);
    }

    #[test]
    fn test_flow_stats_forget() {
        let collector = FlowStatsCollector::new();
        collector.record_reply(S1, Vec::new());
        collector.record_reply(S2, Vec::new());
        collector.forget(S1);

        let snap = collector.snapshot();
        assert_eq!(snap.len(), 1);
        assert!(snap.contains_key(&S2.to_string()));
    }

    #[test]
    fn test_controller_stats_snapshot() {
        let stats = ControllerStats::new();
        stats.packets_in.fetch_add(5, Ordering::Relaxed);
        stats.floods.fetch_add(2, Ordering::Relaxed);
        stats.rules_installed.fetch_add(3, Ordering::Relaxed);

        let snap = stats.snapshot();
        assert_eq!(snap.packets_in, 5);
        assert_eq!(snap.floods, 2);
        assert_eq!(snap.rules_installed, 3);
        assert_eq!(snap.install_failures, 0);
        assert_eq!(snap.table_miss_failures, 0);
    }
}
