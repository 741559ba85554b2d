//! External collaborators this subsystem is built against rather than owns. The
//! driver is synchronous: every component method takes `&mut self` plus an explicit
//! `now: Instant` and returns immediately, so these traits describe hand-offs rather
//! than awaited futures (see `DESIGN.md` for the rationale against `embassy`'s task
//! executor model).

use crate::DriverError;
use btmesh_common::address::{Address, LabelUuid};
use btmesh_common::opcode::Opcode;
use btmesh_common::Ttl;
use heapless::Vec;

pub use embassy_time::{Duration, Instant};

/// The maximum access-PDU parameter payload this subsystem packs or accepts.
pub const MAX_PARAMS: usize = 380;

/// An egress hand-off to the Upper Transport layer, per §6's `{src, dst, label_uuid?,
/// ttl, ack_required, dev_key_use, net_key_index, app_key_index, friend_lpn_addr,
/// opcode_bytes, param_bytes}`. `src` is implicit: the embedding application's Upper
/// Transport already knows the local element's address from context.
#[derive(Clone)]
pub struct OutboundDescriptor {
    pub dst: Address,
    pub label_uuid: Option<LabelUuid>,
    pub ttl: Ttl,
    pub dev_key_use: bool,
    pub net_key_index: u16,
    pub app_key_index: u16,
    pub friend_credentials: bool,
    pub opcode: Opcode,
    pub parameters: Vec<u8, MAX_PARAMS>,
}

/// The egress hand-off. Implemented by the embedding application's `PduSink`.
pub trait UpperTransport {
    fn send(&mut self, descriptor: &OutboundDescriptor) -> Result<(), DriverError>;
}

/// `(net_key_index) -> address`, returning the Friend anchor address for
/// friendship-credential publications, or `Address::Unassigned` when no friendship
/// is established for that subnet. Backed by the Friend-state FSM (`crate::friend`)
/// when the `friend` feature is enabled.
pub trait FriendAddressSource {
    fn friend_address(&self, net_key_index: u16) -> Address;
}

/// A `FriendAddressSource` for nodes that never establish friendships.
pub struct NoFriendship;

impl FriendAddressSource for NoFriendship {
    fn friend_address(&self, _net_key_index: u16) -> Address {
        Address::Unassigned
    }
}
