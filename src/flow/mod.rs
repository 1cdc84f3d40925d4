mod classifier;
mod engine;
mod learning;

pub use classifier::{EdgePortResolver, RedirectPolicy, StaticEdgePorts, VideoClassifier};
pub use engine::{decide, Decision, Forwarding};
pub use learning::LearningTable;

use std::fmt;
use std::net::Ipv4Addr;

use pnet::util::MacAddr;

/// Priority tiers. Strict ordering between tiers is what keeps redirection
/// rules ahead of classification rules, and classification rules ahead of
/// learned L2 forwarding, on overlapping matches.
pub const PRIO_TABLE_MISS: u16 = 0;
pub const PRIO_L2: u16 = 1;
pub const PRIO_VIDEO: u16 = 10;
pub const PRIO_REDIRECT: u16 = 20;

/// Output target of a flow action. `Flood` and `Controller` are reserved
/// pseudo-ports, not physical ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRef {
    Physical(u32),
    Flood,
    Controller,
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortRef::Physical(p) => write!(f, "{}", p),
            PortRef::Flood => write!(f, "FLOOD"),
            PortRef::Controller => write!(f, "CONTROLLER"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Output(PortRef),
    SetIpv4Dst(Ipv4Addr),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Output(port) => write!(f, "output:{}", port),
            Action::SetIpv4Dst(addr) => write!(f, "set_ipv4_dst:{}", addr),
        }
    }
}

/// Match criteria for a flow rule. Unset fields are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowMatch {
    pub in_port: Option<u32>,
    pub eth_src: Option<MacAddr>,
    pub eth_dst: Option<MacAddr>,
    pub eth_type: Option<u16>,
    pub ipv4_src: Option<Ipv4Addr>,
    pub ipv4_dst: Option<Ipv4Addr>,
    pub ip_proto: Option<u8>,
    pub tcp_dst: Option<u16>,
}

impl FlowMatch {
    /// Match-all (every field wildcarded).
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_in_port(mut self, port: u32) -> Self {
        self.in_port = Some(port);
        self
    }

    pub fn with_eth_src(mut self, mac: MacAddr) -> Self {
        self.eth_src = Some(mac);
        self
    }

    pub fn with_eth_dst(mut self, mac: MacAddr) -> Self {
        self.eth_dst = Some(mac);
        self
    }

    pub fn with_eth_type(mut self, eth_type: u16) -> Self {
        self.eth_type = Some(eth_type);
        self
    }

    pub fn with_ipv4_src(mut self, addr: Ipv4Addr) -> Self {
        self.ipv4_src = Some(addr);
        self
    }

    pub fn with_ipv4_dst(mut self, addr: Ipv4Addr) -> Self {
        self.ipv4_dst = Some(addr);
        self
    }

    pub fn with_ip_proto(mut self, proto: u8) -> Self {
        self.ip_proto = Some(proto);
        self
    }

    pub fn with_tcp_dst(mut self, port: u16) -> Self {
        self.tcp_dst = Some(port);
        self
    }
}

impl fmt::Display for FlowMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(p) = self.in_port {
            parts.push(format!("in_port={}", p));
        }
        if let Some(m) = self.eth_src {
            parts.push(format!("eth_src={}", m));
        }
        if let Some(m) = self.eth_dst {
            parts.push(format!("eth_dst={}", m));
        }
        if let Some(t) = self.eth_type {
            parts.push(format!("eth_type=0x{:04x}", t));
        }
        if let Some(a) = self.ipv4_src {
            parts.push(format!("ipv4_src={}", a));
        }
        if let Some(a) = self.ipv4_dst {
            parts.push(format!("ipv4_dst={}", a));
        }
        if let Some(p) = self.ip_proto {
            parts.push(format!("ip_proto={}", p));
        }
        if let Some(p) = self.tcp_dst {
            parts.push(format!("tcp_dst={}", p));
        }
        if parts.is_empty() {
            write!(f, "any")
        } else {
            write!(f, "{}", parts.join(","))
        }
    }
}

/// A flow rule ready to be installed on a switch. Higher priority wins on
/// overlapping matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRule {
    pub priority: u16,
    pub matcher: FlowMatch,
    pub actions: Vec<Action>,
    pub buffer_id: Option<u32>,
}

impl FlowRule {
    pub fn new(priority: u16, matcher: FlowMatch, actions: Vec<Action>) -> Self {
        Self {
            priority,
            matcher,
            actions,
            buffer_id: None,
        }
    }

    pub fn with_buffer_id(mut self, buffer_id: u32) -> Self {
        self.buffer_id = Some(buffer_id);
        self
    }

    /// Lowest-priority fallback sending unmatched packets to the controller.
    pub fn table_miss() -> Self {
        Self::new(
            PRIO_TABLE_MISS,
            FlowMatch::any(),
            vec![Action::Output(PortRef::Controller)],
        )
    }
}

impl fmt::Display for FlowRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions: Vec<String> = self.actions.iter().map(|a| a.to_string()).collect();
        write!(
            f,
            "prio={} match[{}] actions[{}]",
            self.priority,
            self.matcher,
            actions.join(",")
        )
    }
}
