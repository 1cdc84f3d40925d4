use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::flow::{Action, FlowMatch, FlowRule, PortRef, PRIO_REDIRECT, PRIO_VIDEO};
use crate::packet::{PacketView, ETHERTYPE_IPV4, IP_PROTO_TCP};
use crate::session::SwitchId;
use crate::stats::TrafficLog;

/// Resolves the edge-server-facing port of a switch. Topology-dependent,
/// so it lives behind a trait; the default implementation is a static map
/// from configuration.
pub trait EdgePortResolver: Send + Sync {
    fn edge_port(&self, switch: SwitchId) -> Option<u32>;
}

#[derive(Debug, Default)]
pub struct StaticEdgePorts {
    ports: HashMap<SwitchId, u32>,
}

impl StaticEdgePorts {
    pub fn new(ports: HashMap<SwitchId, u32>) -> Self {
        Self { ports }
    }
}

impl EdgePortResolver for StaticEdgePorts {
    fn edge_port(&self, switch: SwitchId) -> Option<u32> {
        self.ports.get(&switch).copied()
    }
}

/// Central-to-edge redirection policy.
pub struct RedirectPolicy {
    pub central_server: Ipv4Addr,
    pub edge_server: Ipv4Addr,
    pub resolver: Arc<dyn EdgePortResolver>,
}

/// Classifies video-relevant traffic and applies the redirection policy.
/// Runs after the base decision on the same packet-in and only ever adds
/// rules at strictly higher priority tiers.
pub struct VideoClassifier {
    video_port: u16,
    redirect: Option<RedirectPolicy>,
    traffic: Arc<TrafficLog>,
}

impl VideoClassifier {
    pub fn new(
        video_port: u16,
        redirect: Option<RedirectPolicy>,
        traffic: Arc<TrafficLog>,
    ) -> Self {
        Self {
            video_port,
            redirect,
            traffic,
        }
    }

    /// Additional rules for this packet. `base_output` is the output action
    /// the base decision resolved (possibly flood); the tier-10 rule reuses
    /// it so classification never changes where traffic goes, only how it
    /// ranks in the flow table.
    pub fn classify(
        &self,
        switch: SwitchId,
        pkt: &PacketView,
        base_output: PortRef,
    ) -> Vec<FlowRule> {
        let Some((ip, dst_port)) = pkt.tcp() else {
            return Vec::new();
        };
        if dst_port != self.video_port {
            return Vec::new();
        }

        self.traffic.record(ip.src, ip.dst);
        tracing::info!(switch = %switch, src = %ip.src, dst = %ip.dst, "video traffic");

        let mut rules = vec![FlowRule::new(
            PRIO_VIDEO,
            FlowMatch::any()
                .with_eth_type(ETHERTYPE_IPV4)
                .with_ipv4_dst(ip.dst)
                .with_ip_proto(IP_PROTO_TCP)
                .with_tcp_dst(self.video_port),
            vec![Action::Output(base_output)],
        )];

        if let Some(rule) = self.redirect_rule(switch, ip.src, ip.dst) {
            rules.push(rule);
        }

        rules
    }

    fn redirect_rule(
        &self,
        switch: SwitchId,
        src: Ipv4Addr,
        dst: Ipv4Addr,
    ) -> Option<FlowRule> {
        let policy = self.redirect.as_ref()?;
        if dst != policy.central_server {
            return None;
        }

        let Some(edge_port) = policy.resolver.edge_port(switch) else {
            tracing::warn!(
                switch = %switch,
                "no edge-facing port known, redirection abandoned"
            );
            return None;
        };

        tracing::info!(
            switch = %switch,
            src = %src,
            central = %policy.central_server,
            edge = %policy.edge_server,
            "redirecting to edge server"
        );

        Some(FlowRule::new(
            PRIO_REDIRECT,
            FlowMatch::any()
                .with_eth_type(ETHERTYPE_IPV4)
                .with_ipv4_src(src)
                .with_ipv4_dst(policy.central_server)
                .with_ip_proto(IP_PROTO_TCP)
                .with_tcp_dst(self.video_port),
            vec![
                Action::SetIpv4Dst(policy.edge_server),
                Action::Output(PortRef::Physical(edge_port)),
            ],
        ))
    }
}
