use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::flow::{
    decide, Action, Decision, FlowRule, LearningTable, RedirectPolicy, StaticEdgePorts,
    VideoClassifier, PRIO_REDIRECT,
};
use crate::packet;
use crate::session::{PacketOut, SwitchId, SwitchSession};
use crate::stats::{ControllerStats, FlowStatEntry, FlowStatsCollector, TrafficLog};

/// Inbound events from the OpenFlow protocol stack.
pub enum Event {
    Connect {
        session: Arc<dyn SwitchSession>,
    },
    PacketIn {
        switch: SwitchId,
        in_port: u32,
        data: Vec<u8>,
        buffer_id: Option<u32>,
    },
    StatsReply {
        switch: SwitchId,
        entries: Vec<FlowStatEntry>,
    },
    Disconnect {
        switch: SwitchId,
    },
}

enum SwitchEvent {
    PacketIn {
        in_port: u32,
        data: Vec<u8>,
        buffer_id: Option<u32>,
    },
}

struct SwitchHandle {
    tx: mpsc::UnboundedSender<SwitchEvent>,
    session: Arc<dyn SwitchSession>,
    /// Cleared on disconnect; the worker stops before acting on anything
    /// queued behind the invalidation.
    live: Arc<AtomicBool>,
}

/// Process-wide controller state: one learning table, one traffic log, one
/// stats collector, and a registry of live switch sessions. Events for one
/// switch are serialized through that switch's worker task; distinct
/// switches run concurrently.
pub struct Controller {
    learning: Arc<LearningTable>,
    traffic: Arc<TrafficLog>,
    collector: Arc<FlowStatsCollector>,
    stats: Arc<ControllerStats>,
    classifier: Arc<VideoClassifier>,
    switches: Arc<DashMap<SwitchId, SwitchHandle>>,
    poll_interval: Duration,
}

impl Controller {
    pub fn new(config: &Config) -> Result<Self> {
        let traffic = Arc::new(TrafficLog::new());

        let redirect = match &config.redirect {
            Some(cfg) if cfg.enabled => Some(RedirectPolicy {
                central_server: cfg.central_server,
                edge_server: cfg.edge_server,
                resolver: Arc::new(StaticEdgePorts::new(cfg.resolved_edge_ports()?)),
            }),
            _ => None,
        };

        let classifier = Arc::new(VideoClassifier::new(
            config.classifier.video_port,
            redirect,
            traffic.clone(),
        ));

        Ok(Self {
            learning: Arc::new(LearningTable::new()),
            traffic,
            collector: Arc::new(FlowStatsCollector::new()),
            stats: Arc::new(ControllerStats::new()),
            classifier,
            switches: Arc::new(DashMap::new()),
            poll_interval: Duration::from_secs(config.stats.poll_interval_secs),
        })
    }

    pub fn learning(&self) -> Arc<LearningTable> {
        self.learning.clone()
    }

    pub fn traffic(&self) -> Arc<TrafficLog> {
        self.traffic.clone()
    }

    pub fn collector(&self) -> Arc<FlowStatsCollector> {
        self.collector.clone()
    }

    pub fn stats(&self) -> Arc<ControllerStats> {
        self.stats.clone()
    }

    pub fn switch_count(&self) -> usize {
        self.switches.len()
    }

    /// Dispatch one inbound event. Must run inside a tokio runtime; the
    /// per-switch workers are spawned from here.
    pub fn handle_event(&self, event: Event) {
        match event {
            Event::Connect { session } => self.connect(session),
            Event::PacketIn {
                switch,
                in_port,
                data,
                buffer_id,
            } => {
                let Some(handle) = self.switches.get(&switch) else {
                    tracing::debug!(switch = %switch, "packet-in for unknown switch dropped");
                    return;
                };
                // Send failure means the worker already shut down.
                let _ = handle.tx.send(SwitchEvent::PacketIn {
                    in_port,
                    data,
                    buffer_id,
                });
            }
            Event::StatsReply { switch, entries } => {
                if self.switches.contains_key(&switch) {
                    self.collector.record_reply(switch, entries);
                } else {
                    // Benign race with a disconnect.
                    tracing::debug!(switch = %switch, "stats reply for unknown switch dropped");
                }
            }
            Event::Disconnect { switch } => self.disconnect(switch),
        }
    }

    fn connect(&self, session: Arc<dyn SwitchSession>) {
        let switch = session.id();

        // A connect for an id we still track means the old session died
        // without a disconnect event; its state is stale.
        if self.switches.contains_key(&switch) {
            tracing::warn!(switch = %switch, "reconnect without disconnect, dropping old state");
            self.disconnect(switch);
        }

        // The switch cannot receive unmatched traffic without the
        // table-miss rule; failure here makes it unusable.
        if let Err(e) = session.install_flow(&FlowRule::table_miss()) {
            self.stats.table_miss_failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                switch = %switch,
                "table-miss install failed, switch unusable: {}",
                e
            );
            return;
        }

        // A fresh session always starts from a clean slate, even if a
        // decision raced the previous session's teardown and re-learned
        // something after the forget.
        self.learning.forget(switch);
        self.collector.forget(switch);

        let (tx, rx) = mpsc::unbounded_channel();
        let live = Arc::new(AtomicBool::new(true));

        let worker = SwitchWorker {
            switch,
            session: session.clone(),
            learning: self.learning.clone(),
            classifier: self.classifier.clone(),
            stats: self.stats.clone(),
            live: live.clone(),
        };
        tokio::spawn(worker.run(rx));

        self.switches.insert(switch, SwitchHandle { tx, session, live });
        tracing::info!(switch = %switch, "switch connected");
    }

    fn disconnect(&self, switch: SwitchId) {
        let Some((_, handle)) = self.switches.remove(&switch) else {
            tracing::debug!(switch = %switch, "disconnect for unknown switch");
            return;
        };

        // Barrier first, then discard per-switch state. Dropping the handle
        // closes the worker channel.
        handle.live.store(false, Ordering::SeqCst);
        self.learning.forget(switch);
        self.collector.forget(switch);
        tracing::info!(switch = %switch, "switch disconnected");
    }

    /// Periodically request flow statistics from every live switch. Runs on
    /// its own timer and never blocks packet-in processing.
    pub fn spawn_stats_poller(&self) -> tokio::task::JoinHandle<()> {
        let switches = self.switches.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            loop {
                interval.tick().await;
                for entry in switches.iter() {
                    if let Err(e) = entry.value().session.request_flow_stats() {
                        tracing::warn!(
                            switch = %entry.key(),
                            "flow stats request failed: {}",
                            e
                        );
                    }
                }
            }
        })
    }
}

struct SwitchWorker {
    switch: SwitchId,
    session: Arc<dyn SwitchSession>,
    learning: Arc<LearningTable>,
    classifier: Arc<VideoClassifier>,
    stats: Arc<ControllerStats>,
    live: Arc<AtomicBool>,
}

impl SwitchWorker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<SwitchEvent>) {
        while let Some(event) = rx.recv().await {
            if !self.live.load(Ordering::SeqCst) {
                break;
            }
            match event {
                SwitchEvent::PacketIn {
                    in_port,
                    data,
                    buffer_id,
                } => self.handle_packet_in(in_port, data, buffer_id),
            }
        }
        tracing::debug!(switch = %self.switch, "switch worker stopped");
    }

    fn handle_packet_in(&self, in_port: u32, data: Vec<u8>, buffer_id: Option<u32>) {
        self.stats.packets_in.fetch_add(1, Ordering::Relaxed);

        // Undecodable frames are irrelevant, not errors.
        let Some(pkt) = packet::decode(&data) else {
            return;
        };

        let fwd = match decide(&self.learning, self.switch, in_port, &pkt) {
            Decision::Ignore => {
                self.stats.lldp_ignored.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Decision::Forward(fwd) => fwd,
        };

        match fwd.output {
            crate::flow::PortRef::Flood => {
                self.stats.floods.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(rule) = &fwd.rule {
            self.install(rule);
        }

        for rule in self.classifier.classify(self.switch, &pkt, fwd.output) {
            let is_redirect = rule.priority == PRIO_REDIRECT;
            if self.install(&rule) && is_redirect {
                self.stats.redirects.fetch_add(1, Ordering::Relaxed);
            }
        }

        // A disconnect that completed while this decision was executing
        // invalidated the session; the rest of the decision is discarded.
        if !self.live.load(Ordering::SeqCst) {
            tracing::debug!(switch = %self.switch, "decision discarded, session invalidated");
            return;
        }

        // The installed rules only affect future packets; the triggering
        // packet still has to be pushed out explicitly.
        let out = PacketOut {
            buffer_id,
            in_port,
            actions: vec![Action::Output(fwd.output)],
            data: if buffer_id.is_none() { Some(data) } else { None },
        };
        if let Err(e) = self.session.packet_out(&out) {
            tracing::warn!(switch = %self.switch, "packet-out failed: {}", e);
        }
    }

    /// Install a non-miss rule. Failure is recoverable: the packet still
    /// went out, later packets of the flow just come back to the controller.
    fn install(&self, rule: &FlowRule) -> bool {
        if !self.live.load(Ordering::SeqCst) {
            tracing::debug!(switch = %self.switch, "install skipped, session invalidated");
            return false;
        }
        match self.session.install_flow(rule) {
            Ok(()) => {
                self.stats.rules_installed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(switch = %self.switch, "installed {}", rule);
                true
            }
            Err(e) => {
                self.stats.install_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(switch = %self.switch, "flow install failed ({}): {}", rule, e);
                false
            }
        }
    }
}
