use std::fmt;

use thiserror::Error;

use crate::flow::{Action, FlowRule};

/// OpenFlow datapath id of a connected switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SwitchId(pub u64);

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session closed")]
    Closed,
    #[error("send failed: {0}")]
    Send(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Controller-issued instruction to emit one packet on a switch.
///
/// Carries either a switch-side buffer reference or the raw frame; the
/// ingress port lets the switch apply flood semantics correctly.
#[derive(Debug, Clone)]
pub struct PacketOut {
    pub buffer_id: Option<u32>,
    pub in_port: u32,
    pub actions: Vec<Action>,
    pub data: Option<Vec<u8>>,
}

/// Handle for one connected switch, provided by the OpenFlow protocol
/// stack. One session per connection; a reconnecting switch gets a fresh
/// session. All sends are non-blocking enqueues on the connection writer.
pub trait SwitchSession: Send + Sync {
    fn id(&self) -> SwitchId;

    /// Install a flow rule on the switch.
    fn install_flow(&self, rule: &FlowRule) -> Result<()>;

    /// Emit a packet on the switch.
    fn packet_out(&self, out: &PacketOut) -> Result<()>;

    /// Request flow statistics; the reply arrives later as an event.
    fn request_flow_stats(&self) -> Result<()>;
}
