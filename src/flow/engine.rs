use crate::flow::{Action, FlowMatch, FlowRule, LearningTable, PortRef, PRIO_L2};
use crate::packet::PacketView;
use crate::session::SwitchId;

/// Outcome of the base packet-in decision.
#[derive(Debug, Clone)]
pub enum Decision {
    /// Discovery-protocol frame; nothing to do.
    Ignore,
    Forward(Forwarding),
}

#[derive(Debug, Clone)]
pub struct Forwarding {
    /// Where the current packet goes (and the action of any installed rule).
    pub output: PortRef,
    /// Learned-forwarding shortcut, present only when the destination is
    /// known. Installing it keeps later packets of the same flow off the
    /// controller; the triggering packet still needs a packet-out.
    pub rule: Option<FlowRule>,
}

/// Base L2 decision procedure: learn the source location, resolve the
/// output port from the learning table, and emit a tier-1 rule when the
/// destination is known. Pure with respect to everything except the
/// learning table, which it updates exactly once per call.
pub fn decide(
    table: &LearningTable,
    switch: SwitchId,
    in_port: u32,
    pkt: &PacketView,
) -> Decision {
    if pkt.is_lldp() {
        return Decision::Ignore;
    }

    table.observe(switch, pkt.src_mac, in_port);

    let output = match table.lookup(switch, pkt.dst_mac) {
        Some(port) => PortRef::Physical(port),
        None => PortRef::Flood,
    };

    let rule = match output {
        PortRef::Physical(_) => Some(FlowRule::new(
            PRIO_L2,
            FlowMatch::any()
                .with_in_port(in_port)
                .with_eth_dst(pkt.dst_mac)
                .with_eth_src(pkt.src_mac),
            vec![Action::Output(output)],
        )),
        _ => None,
    };

    Decision::Forward(Forwarding { output, rule })
}
