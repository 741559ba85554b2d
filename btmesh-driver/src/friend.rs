//! The Friend-state finite-state machine (§4.7): tracks the Friendship role
//! per subnet so the Publication Engine can resolve "the Friend address for
//! this `net_key_index`" (`FriendAddressSource`) without coupling to the
//! Friend-Offer/Poll handshake that drives it. That handshake itself — Friend
//! Request/Offer/Clear PDUs, key-material derivation, message-queueing for
//! the Low Power Node — is the Friend feature's own concern and lives
//! outside this crate; this module only holds the state table and the
//! established-address bookkeeping the rest of the driver reads.

use crate::queue::Slab;
use btmesh_common::address::{Address, UnicastAddress};

/// States of the per-subnet Friendship state machine, named exactly as §4.7
/// lists them.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FriendState {
    Idle,
    WaitReq,
    StartKeyDeriv,
    KeyDerivLate,
    WaitRecvTimeout,
    WaitPoll,
    Estab,
}

/// Events that drive the Friendship state machine, named exactly as §4.7
/// lists them.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FriendEvent {
    StateEnabled,
    StateDisabled,
    FriendReqRecv,
    PollRecv,
    ClearRecv,
    ClearCnfRecv,
    KeyDerivSuccess,
    KeyDerivFailed,
    RecvDelayTmr,
    SubscrCnfTmr,
    ClearSendTmr,
    Timeout,
    SubscrListAdd,
    SubscrListRem,
    NetKeyDel,
}

/// The side effect a transition asks the embedding Friend feature to carry
/// out. This crate does not perform any of them; it only reports which one
/// applies so the caller's own Friend-feature code (outside this subsystem)
/// can act.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FriendAction {
    None,
    Dealloc,
    PrepareKeyMaterial,
    SendOffer,
    SetupFriendship,
    StartRecvDelay,
    SendNextPdu,
    SendSubscrConfirm,
    Terminate,
    NotifyFriend,
    StopNotifyFriend,
    UpdateSubscriptionList,
}

/// One subnet's Friendship link: the state machine plus the Low Power Node
/// address it concerns once established.
pub struct FriendLink {
    net_key_index: u16,
    peer_address: UnicastAddress,
    state: FriendState,
}

impl FriendLink {
    pub fn new(net_key_index: u16, peer_address: UnicastAddress) -> Self {
        Self {
            net_key_index,
            peer_address,
            state: FriendState::Idle,
        }
    }

    pub fn net_key_index(&self) -> u16 {
        self.net_key_index
    }

    pub fn state(&self) -> FriendState {
        self.state
    }

    /// `Address::Unicast(peer)` once `Estab`, `Address::Unassigned`
    /// otherwise — the value `FriendAddressSource::friend_address` reports
    /// for this link's subnet.
    pub fn established_address(&self) -> Address {
        if self.state == FriendState::Estab {
            Address::Unicast(self.peer_address)
        } else {
            Address::Unassigned
        }
    }

    /// Applies one event to this link's state machine, returning the action
    /// the caller should carry out. Two transitions are common to every
    /// state and checked first, per §4.7: `StateDisabled` always terminates
    /// back to `Idle`, and an event this state does not list is ignored
    /// (`Idle`, no action, state unchanged).
    pub fn handle(&mut self, event: FriendEvent) -> FriendAction {
        if event == FriendEvent::StateDisabled {
            self.state = FriendState::Idle;
            return FriendAction::Terminate;
        }

        let (next, action) = match (self.state, event) {
            (FriendState::Idle, FriendEvent::FriendReqRecv) => {
                (FriendState::Idle, FriendAction::Dealloc)
            }
            (FriendState::Idle, FriendEvent::StateEnabled) => {
                (FriendState::WaitReq, FriendAction::None)
            }

            (FriendState::WaitReq, FriendEvent::FriendReqRecv) => {
                (FriendState::StartKeyDeriv, FriendAction::PrepareKeyMaterial)
            }

            (FriendState::StartKeyDeriv, FriendEvent::KeyDerivFailed) => {
                (FriendState::WaitReq, FriendAction::Terminate)
            }
            (FriendState::StartKeyDeriv, FriendEvent::NetKeyDel) => {
                (FriendState::WaitReq, FriendAction::Terminate)
            }
            (FriendState::StartKeyDeriv, FriendEvent::KeyDerivSuccess) => {
                (FriendState::WaitRecvTimeout, FriendAction::None)
            }
            (FriendState::StartKeyDeriv, FriendEvent::RecvDelayTmr) => {
                (FriendState::KeyDerivLate, FriendAction::None)
            }

            (FriendState::KeyDerivLate, FriendEvent::KeyDerivFailed) => {
                (FriendState::WaitReq, FriendAction::Terminate)
            }
            (FriendState::KeyDerivLate, FriendEvent::KeyDerivSuccess) => {
                (FriendState::WaitReq, FriendAction::Terminate)
            }
            (FriendState::KeyDerivLate, FriendEvent::NetKeyDel) => {
                (FriendState::WaitReq, FriendAction::Terminate)
            }

            (FriendState::WaitRecvTimeout, FriendEvent::RecvDelayTmr) => {
                (FriendState::WaitPoll, FriendAction::SendOffer)
            }
            (FriendState::WaitRecvTimeout, FriendEvent::NetKeyDel) => {
                (FriendState::WaitReq, FriendAction::Terminate)
            }

            (FriendState::WaitPoll, FriendEvent::Timeout) => {
                (FriendState::WaitReq, FriendAction::Terminate)
            }
            (FriendState::WaitPoll, FriendEvent::NetKeyDel) => {
                (FriendState::WaitReq, FriendAction::Terminate)
            }
            (FriendState::WaitPoll, FriendEvent::PollRecv) => {
                (FriendState::Estab, FriendAction::SetupFriendship)
            }

            (FriendState::Estab, FriendEvent::RecvDelayTmr) => {
                (FriendState::Estab, FriendAction::SendNextPdu)
            }
            (FriendState::Estab, FriendEvent::PollRecv) => {
                (FriendState::Estab, FriendAction::StartRecvDelay)
            }
            (FriendState::Estab, FriendEvent::Timeout) => {
                (FriendState::WaitReq, FriendAction::Terminate)
            }
            (FriendState::Estab, FriendEvent::FriendReqRecv) => {
                (FriendState::WaitReq, FriendAction::Terminate)
            }
            (FriendState::Estab, FriendEvent::ClearRecv) => {
                (FriendState::WaitReq, FriendAction::Terminate)
            }
            (FriendState::Estab, FriendEvent::NetKeyDel) => {
                (FriendState::WaitReq, FriendAction::Terminate)
            }
            (FriendState::Estab, FriendEvent::SubscrListAdd) => {
                (FriendState::Estab, FriendAction::UpdateSubscriptionList)
            }
            (FriendState::Estab, FriendEvent::SubscrListRem) => {
                (FriendState::Estab, FriendAction::UpdateSubscriptionList)
            }
            (FriendState::Estab, FriendEvent::SubscrCnfTmr) => {
                (FriendState::Estab, FriendAction::SendSubscrConfirm)
            }
            (FriendState::Estab, FriendEvent::ClearSendTmr) => {
                (FriendState::Estab, FriendAction::NotifyFriend)
            }
            (FriendState::Estab, FriendEvent::ClearCnfRecv) => {
                (FriendState::Estab, FriendAction::StopNotifyFriend)
            }

            (state, _unhandled) => (state, FriendAction::None),
        };

        self.state = next;
        action
    }
}

pub const MAX_FRIEND_LINKS: usize = 4;

/// Every subnet's Friendship link, keyed by `net_key_index`. Implements
/// `FriendAddressSource` by reporting the established peer for whichever
/// link (if any) governs the requested subnet.
pub struct FriendLinks<const N: usize = MAX_FRIEND_LINKS> {
    links: Slab<FriendLink, N>,
}

impl<const N: usize> Default for FriendLinks<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FriendLinks<N> {
    pub fn new() -> Self {
        Self {
            links: Slab::new(),
        }
    }

    /// Registers a link for `net_key_index`/`peer_address`, starting `Idle`.
    /// Fails if the link table is full.
    pub fn open(&mut self, net_key_index: u16, peer_address: UnicastAddress) -> Result<(), ()> {
        self.links
            .insert(FriendLink::new(net_key_index, peer_address))
            .map(|_| ())
            .map_err(|_| ())
    }

    /// Applies `event` to every link for `net_key_index`, returning the
    /// actions reported (almost always a single link, but nothing forbids
    /// more than one Friendship per subnet at the protocol level).
    pub fn handle(&mut self, net_key_index: u16, event: FriendEvent) -> FriendAction {
        let mut last = FriendAction::None;
        for (_, link) in self.links.iter_mut() {
            if link.net_key_index() == net_key_index {
                last = link.handle(event);
            }
        }
        last
    }

    /// A link that has returned to `Idle` carries no more information
    /// worth keeping; this drops it from the table to free its slot.
    pub fn reap_idle(&mut self) {
        self.links.remove_if(|link| link.state() == FriendState::Idle);
    }
}

impl<const N: usize> crate::traits::FriendAddressSource for FriendLinks<N> {
    fn friend_address(&self, net_key_index: u16) -> Address {
        self.links
            .iter()
            .find(|(_, link)| link.net_key_index() == net_key_index)
            .map(|(_, link)| link.established_address())
            .unwrap_or(Address::Unassigned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> UnicastAddress {
        UnicastAddress::new(0x0201).unwrap()
    }

    #[test]
    fn establishment_sequence_reaches_estab() {
        let mut link = FriendLink::new(0, peer());
        assert_eq!(link.handle(FriendEvent::StateEnabled), FriendAction::None);
        assert_eq!(link.state(), FriendState::WaitReq);

        assert_eq!(
            link.handle(FriendEvent::FriendReqRecv),
            FriendAction::PrepareKeyMaterial
        );
        assert_eq!(link.state(), FriendState::StartKeyDeriv);

        assert_eq!(link.handle(FriendEvent::KeyDerivSuccess), FriendAction::None);
        assert_eq!(link.state(), FriendState::WaitRecvTimeout);

        assert_eq!(
            link.handle(FriendEvent::RecvDelayTmr),
            FriendAction::SendOffer
        );
        assert_eq!(link.state(), FriendState::WaitPoll);

        assert_eq!(
            link.handle(FriendEvent::PollRecv),
            FriendAction::SetupFriendship
        );
        assert_eq!(link.state(), FriendState::Estab);
        assert_eq!(link.established_address(), Address::Unicast(peer()));
    }

    #[test]
    fn state_disabled_terminates_from_any_state() {
        let mut link = FriendLink::new(0, peer());
        link.handle(FriendEvent::StateEnabled);
        link.handle(FriendEvent::FriendReqRecv);
        assert_eq!(link.state(), FriendState::StartKeyDeriv);

        assert_eq!(
            link.handle(FriendEvent::StateDisabled),
            FriendAction::Terminate
        );
        assert_eq!(link.state(), FriendState::Idle);
    }

    #[test]
    fn unhandled_event_is_ignored() {
        let mut link = FriendLink::new(0, peer());
        assert_eq!(link.state(), FriendState::Idle);
        assert_eq!(link.handle(FriendEvent::PollRecv), FriendAction::None);
        assert_eq!(link.state(), FriendState::Idle);
    }

    #[test]
    fn net_key_del_terminates_from_established() {
        let mut link = FriendLink::new(0, peer());
        link.handle(FriendEvent::StateEnabled);
        link.handle(FriendEvent::FriendReqRecv);
        link.handle(FriendEvent::KeyDerivSuccess);
        link.handle(FriendEvent::RecvDelayTmr);
        link.handle(FriendEvent::PollRecv);
        assert_eq!(link.state(), FriendState::Estab);

        assert_eq!(
            link.handle(FriendEvent::NetKeyDel),
            FriendAction::Terminate
        );
        assert_eq!(link.state(), FriendState::WaitReq);
        assert_eq!(link.established_address(), Address::Unassigned);
    }

    #[test]
    fn friend_links_reports_established_peer_for_its_subnet() {
        let mut links: FriendLinks<2> = FriendLinks::new();
        links.open(7, peer()).unwrap();

        links.handle(7, FriendEvent::StateEnabled);
        links.handle(7, FriendEvent::FriendReqRecv);
        links.handle(7, FriendEvent::KeyDerivSuccess);
        links.handle(7, FriendEvent::RecvDelayTmr);
        links.handle(7, FriendEvent::PollRecv);

        use crate::traits::FriendAddressSource;
        assert_eq!(links.friend_address(7), Address::Unicast(peer()));
        assert_eq!(links.friend_address(9), Address::Unassigned);
    }

    #[test]
    fn reap_idle_drops_terminated_links() {
        let mut links: FriendLinks<2> = FriendLinks::new();
        links.open(1, peer()).unwrap();
        links.reap_idle();
        assert_eq!(links.links.iter().count(), 0);
    }
}
