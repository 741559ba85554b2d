//! The Publication Engine: the egress half of the Access layer. Builds
//! outbound PDUs, optionally defers them behind a random pre-send delay,
//! applies a model's publication state (address/TTL/period/retransmit), and
//! retires superseded retransmits per Errata 10578.
//!
//! Like the dispatcher, this engine never owns a timer: every entry point
//! that "arms a timer" returns a `(timer id, Duration)` pair and leaves
//! scheduling to the embedding runtime, which calls back into
//! `expire_pending_send`/`tick_retransmit` with that same id.

use crate::dispatch::{dispatch, DispatchTarget, MAX_DISPATCH_TARGETS};
use crate::queue::Slab;
use crate::registry::ModelRegistry;
use crate::traits::{Duration, FriendAddressSource, Instant, OutboundDescriptor, UpperTransport};
use crate::DriverError;
use btmesh_common::address::{Address, UnicastAddress};
use btmesh_common::opcode::Opcode;
use btmesh_common::ModelIdentifier;
use btmesh_common::Ttl;
use btmesh_models::foundation::configuration::model_publication::PublishAddress;
use btmesh_pdu::access::{AccessMeta, AccessPdu, KeyIndexKind};
use heapless::Vec;
use rand_core::RngCore;

pub const MAX_PENDING_SEND: usize = 4;
pub const MAX_RETRANSMIT: usize = 4;

/// Per-retransmit-step unit, per the Configuration Model message spec.
const RETRANSMIT_STEP_MS: u32 = 50;

struct PendingSendRecord {
    descriptor: OutboundDescriptor,
    src_element: UnicastAddress,
    timer_id: u32,
}

struct RetransmitRecord {
    descriptor: OutboundDescriptor,
    src_element: UnicastAddress,
    remaining_count: u8,
    interval_steps: u8,
    timer_id: u32,
}

pub enum SendOutcome {
    Sent(Vec<DispatchTarget, MAX_DISPATCH_TARGETS>),
    Scheduled { timer_id: u32, delay: Duration },
}

pub struct PublishOutcome {
    pub loopback: Vec<DispatchTarget, MAX_DISPATCH_TARGETS>,
    pub retransmit_timer: Option<(u32, Duration)>,
}

pub enum RetransmitOutcome {
    Rearm { timer_id: u32, delay: Duration },
    Done,
}

pub struct PublicationEngine<
    const SEND_N: usize = MAX_PENDING_SEND,
    const RETRANSMIT_N: usize = MAX_RETRANSMIT,
> {
    pending_send: Slab<PendingSendRecord, SEND_N>,
    retransmit: Slab<RetransmitRecord, RETRANSMIT_N>,
    next_timer_id: u32,
}

impl<const SEND_N: usize, const RETRANSMIT_N: usize> Default
    for PublicationEngine<SEND_N, RETRANSMIT_N>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const SEND_N: usize, const RETRANSMIT_N: usize> PublicationEngine<SEND_N, RETRANSMIT_N> {
    pub fn new() -> Self {
        Self {
            pending_send: Slab::new(),
            retransmit: Slab::new(),
            next_timer_id: 0,
        }
    }

    fn alloc_timer_id(&mut self) -> u32 {
        let id = self.next_timer_id;
        self.next_timer_id = self.next_timer_id.wrapping_add(1);
        id
    }

    /// Send with an optional random pre-send delay drawn from `rng`. Both
    /// bounds zero hands off immediately; otherwise the descriptor is
    /// copied into a Pending-Send record so the caller's buffers need not
    /// outlive this call.
    pub fn send_with_delay<const E: usize>(
        &mut self,
        descriptor: OutboundDescriptor,
        src_element: UnicastAddress,
        delay_min_ms: u32,
        delay_max_ms: u32,
        rng: &mut impl RngCore,
        registry: &ModelRegistry<E>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
    ) -> Result<SendOutcome, DriverError> {
        if delay_min_ms == 0 && delay_max_ms == 0 {
            let targets = self.send_immediate(descriptor, src_element, registry, transport, friend)?;
            return Ok(SendOutcome::Sent(targets));
        }

        let span = delay_max_ms.saturating_sub(delay_min_ms).saturating_add(1);
        let delay_ms = delay_min_ms + (rng.next_u32() % span);
        let timer_id = self.alloc_timer_id();
        self.pending_send
            .insert(PendingSendRecord {
                descriptor,
                src_element,
                timer_id,
            })
            .map_err(|_| DriverError::InsufficientSpace)?;
        Ok(SendOutcome::Scheduled {
            timer_id,
            delay: Duration::from_millis(delay_ms as u64),
        })
    }

    /// Called by the runtime when a Pending-Send timer with `timer_id`
    /// expires. Dequeues the record and hands it off.
    pub fn expire_pending_send<const E: usize>(
        &mut self,
        timer_id: u32,
        registry: &ModelRegistry<E>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
    ) -> Result<Option<Vec<DispatchTarget, MAX_DISPATCH_TARGETS>>, DriverError> {
        let handle = self
            .pending_send
            .find(|r| r.timer_id == timer_id);
        let Some(handle) = handle else {
            return Ok(None);
        };
        let record = self.pending_send.remove(handle).expect("handle just found");
        let targets = self.send_immediate(
            record.descriptor,
            record.src_element,
            registry,
            transport,
            friend,
        )?;
        Ok(Some(targets))
    }

    /// Sends `descriptor` immediately. A local-unicast destination
    /// loopbacks via the Access Dispatcher with no wire transmission.
    /// Otherwise cancels any retransmit this publication supersedes
    /// (Errata 10578), hands off to the Upper Transport, then — for
    /// Group/Virtual destinations — performs a local loopback pass so
    /// subscribed local models also see it.
    pub fn send_immediate<const E: usize>(
        &mut self,
        mut descriptor: OutboundDescriptor,
        src_element: UnicastAddress,
        registry: &ModelRegistry<E>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
    ) -> Result<Vec<DispatchTarget, MAX_DISPATCH_TARGETS>, DriverError> {
        if let Address::Unicast(dst) = descriptor.dst {
            if registry.element_of(Address::Unicast(dst)).is_some() {
                let meta = loopback_meta(&descriptor, src_element, true);
                let pdu = AccessPdu::new(descriptor.opcode, &descriptor.parameters, meta)?;
                return Ok(dispatch(registry, &pdu));
            }
        }

        if descriptor.friend_credentials
            && friend.friend_address(descriptor.net_key_index) == Address::Unassigned
        {
            descriptor.friend_credentials = false;
        }

        let opcode = descriptor.opcode;
        self.retransmit
            .remove_if(|r| r.src_element == src_element && r.descriptor.opcode == opcode);

        transport.send(&descriptor)?;

        match descriptor.dst {
            Address::Group(_) | Address::Virtual(_) => {
                let meta = loopback_meta(&descriptor, src_element, false);
                let pdu = AccessPdu::new(descriptor.opcode, &descriptor.parameters, meta)?;
                Ok(dispatch(registry, &pdu))
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Applies a model instance's publication state to `opcode`/`parameters`
    /// and sends it. A missing record or an `Unassigned` publish address
    /// means publication is disabled: returns `Ok(None)` without error.
    #[allow(clippy::too_many_arguments)]
    pub fn publish<const E: usize>(
        &mut self,
        element_id: u8,
        model_identifier: ModelIdentifier,
        opcode: Opcode,
        parameters: &[u8],
        net_key_index: u16,
        default_ttl: Ttl,
        registry: &ModelRegistry<E>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
    ) -> Result<Option<PublishOutcome>, DriverError> {
        let Some(details) = registry.publication(element_id, model_identifier) else {
            return Ok(None);
        };
        if matches!(details.publish_address, PublishAddress::Unassigned) {
            return Ok(None);
        }

        let dst = publish_address_to_address(details.publish_address);
        let label_uuid = match details.publish_address {
            PublishAddress::Label(label) => Some(label),
            _ => None,
        };
        let local_unicast = registry.element_of(dst).is_some();
        let retransmit_count = if local_unicast {
            0
        } else {
            details.publish_retransmit.count()
        };

        let descriptor = OutboundDescriptor {
            dst,
            label_uuid,
            ttl: details.publish_ttl.unwrap_or(default_ttl),
            dev_key_use: false,
            net_key_index,
            app_key_index: details.app_key_index.into(),
            friend_credentials: details.credential_flag,
            opcode,
            parameters: Vec::from_slice(parameters).map_err(|_| DriverError::InsufficientSpace)?,
        };

        let src_element = registry.primary_address() + element_id;

        let loopback = self.send_immediate(
            descriptor.clone(),
            src_element,
            registry,
            transport,
            friend,
        )?;

        let retransmit_timer = if retransmit_count > 0 {
            let interval_steps = details.publish_retransmit.interval_steps();
            let timer_id = self.alloc_timer_id();
            self.retransmit
                .insert(RetransmitRecord {
                    descriptor,
                    src_element,
                    remaining_count: retransmit_count,
                    interval_steps,
                    timer_id,
                })
                .map_err(|_| DriverError::InsufficientSpace)?;
            Some((timer_id, retransmit_delay(interval_steps)))
        } else {
            None
        };

        Ok(Some(PublishOutcome {
            loopback,
            retransmit_timer,
        }))
    }

    /// Called by the runtime when a retransmit timer with `timer_id`
    /// fires. Re-hands-off the stored descriptor and either rearms
    /// (remaining count still positive) or frees the record.
    pub fn tick_retransmit<const E: usize>(
        &mut self,
        timer_id: u32,
        _now: Instant,
        registry: &ModelRegistry<E>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
    ) -> Result<Option<RetransmitOutcome>, DriverError> {
        let Some(handle) = self.retransmit.find(|r| r.timer_id == timer_id) else {
            return Ok(None);
        };

        let (descriptor, src_element, remaining_after, interval_steps) = {
            let record = self.retransmit.get_mut(handle).expect("handle just found");
            record.remaining_count = record.remaining_count.saturating_sub(1);
            (
                record.descriptor.clone(),
                record.src_element,
                record.remaining_count,
                record.interval_steps,
            )
        };

        self.send_immediate(descriptor, src_element, registry, transport, friend)?;

        if remaining_after > 0 {
            Ok(Some(RetransmitOutcome::Rearm {
                timer_id,
                delay: retransmit_delay(interval_steps),
            }))
        } else {
            self.retransmit.remove(handle);
            Ok(Some(RetransmitOutcome::Done))
        }
    }
}

fn retransmit_delay(interval_steps: u8) -> Duration {
    Duration::from_millis(((interval_steps as u32 + 1) * RETRANSMIT_STEP_MS) as u64)
}

fn loopback_meta(descriptor: &OutboundDescriptor, src_element: UnicastAddress, recv_on_unicast: bool) -> AccessMeta {
    AccessMeta {
        src: src_element,
        dst: descriptor.dst,
        label_uuid: descriptor.label_uuid,
        ttl: descriptor.ttl,
        net_key_index: descriptor.net_key_index,
        app_key_index: if descriptor.dev_key_use {
            KeyIndexKind::LocalDeviceKey
        } else {
            KeyIndexKind::Application(descriptor.app_key_index)
        },
        recv_on_unicast,
    }
}

fn publish_address_to_address(publish_address: PublishAddress) -> Address {
    match publish_address {
        PublishAddress::Unicast(addr) => Address::Unicast(addr),
        PublishAddress::Group(addr) => Address::Group(addr),
        PublishAddress::Virtual(addr) => Address::Virtual(addr),
        PublishAddress::Label(label) => Address::Virtual(label.virtual_address()),
        PublishAddress::Unassigned => Address::Unassigned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelRegistry;
    use btmesh_common::address::{GroupAddress, UnicastAddress};
    use btmesh_common::location::Location;
    use btmesh_common::{
        CompanyIdentifier, Composition, ElementDescriptor, ProductIdentifier, VersionIdentifier,
    };
    use btmesh_models::foundation::configuration::model_publication::{
        PublicationDetails, PublishPeriod, PublishRetransmit,
    };
    use btmesh_models::foundation::configuration::AppKeyIndex;
    use core::cell::RefCell;

    const ONOFF_SERVER: ModelIdentifier = ModelIdentifier::SIG(0x1000);
    const GET: Opcode = Opcode::OneOctet(0x01);

    struct RecordingTransport {
        sent: RefCell<heapless::Vec<Address, 8>>,
    }

    impl UpperTransport for RecordingTransport {
        fn send(&mut self, descriptor: &OutboundDescriptor) -> Result<(), DriverError> {
            self.sent.borrow_mut().push(descriptor.dst).ok();
            Ok(())
        }
    }

    fn registry_with_publication(details: PublicationDetails) -> ModelRegistry {
        let mut composition = Composition::new(
            CompanyIdentifier(0),
            ProductIdentifier(0),
            VersionIdentifier(0),
        );
        let mut primary = ElementDescriptor::new(Location::numeric(0));
        primary.add_model(ONOFF_SERVER);
        composition.add_element(primary).ok().unwrap();
        let mut registry = ModelRegistry::new(UnicastAddress::new(0x0001).unwrap(), composition);
        registry.register_opcode(0, ONOFF_SERVER, GET).unwrap();
        registry
            .set_publication(0, ONOFF_SERVER, Some(details))
            .unwrap();
        registry
    }

    #[test]
    fn disabled_publication_is_not_an_error() {
        let details = PublicationDetails {
            element_address: UnicastAddress::new(0x0001).unwrap(),
            publish_address: PublishAddress::Unassigned,
            app_key_index: AppKeyIndex::new(0),
            credential_flag: false,
            publish_ttl: None,
            publish_period: PublishPeriod::new(0, btmesh_models::foundation::configuration::model_publication::Resolution::Seconds1),
            publish_retransmit: PublishRetransmit::new(0, 0),
            model_identifier: ONOFF_SERVER,
        };
        let registry = registry_with_publication(details);
        let mut engine: PublicationEngine = PublicationEngine::new();
        let mut transport = RecordingTransport {
            sent: RefCell::new(heapless::Vec::new()),
        };
        let outcome = engine
            .publish(
                0,
                ONOFF_SERVER,
                GET,
                &[],
                0,
                Ttl::new(5),
                &registry,
                &mut transport,
                &crate::traits::NoFriendship,
            )
            .unwrap();
        assert!(outcome.is_none());
        assert!(transport.sent.borrow().is_empty());
    }

    #[test]
    fn group_publication_retransmits_and_arms_timer() {
        let details = PublicationDetails {
            element_address: UnicastAddress::new(0x0001).unwrap(),
            publish_address: PublishAddress::Group(GroupAddress::Normal(0xC000)),
            app_key_index: AppKeyIndex::new(0),
            credential_flag: false,
            publish_ttl: None,
            publish_period: PublishPeriod::new(0, btmesh_models::foundation::configuration::model_publication::Resolution::Seconds1),
            publish_retransmit: PublishRetransmit::new(2, 1),
            model_identifier: ONOFF_SERVER,
        };
        let registry = registry_with_publication(details);
        let mut engine: PublicationEngine = PublicationEngine::new();
        let mut transport = RecordingTransport {
            sent: RefCell::new(heapless::Vec::new()),
        };
        let outcome = engine
            .publish(
                0,
                ONOFF_SERVER,
                GET,
                &[0xAA],
                0,
                Ttl::new(5),
                &registry,
                &mut transport,
                &crate::traits::NoFriendship,
            )
            .unwrap()
            .unwrap();
        assert_eq!(transport.sent.borrow().len(), 1);
        let (timer_id, delay) = outcome.retransmit_timer.unwrap();
        assert_eq!(delay, Duration::from_millis(100));

        let next = engine
            .tick_retransmit(timer_id, Instant::from_millis(0), &registry, &mut transport, &crate::traits::NoFriendship)
            .unwrap()
            .unwrap();
        assert_eq!(transport.sent.borrow().len(), 2);
        assert!(matches!(next, RetransmitOutcome::Rearm { .. }));
    }

    #[test]
    fn a_later_publication_cancels_the_earlier_retransmit() {
        let details = PublicationDetails {
            element_address: UnicastAddress::new(0x0001).unwrap(),
            publish_address: PublishAddress::Group(GroupAddress::Normal(0xC000)),
            app_key_index: AppKeyIndex::new(0),
            credential_flag: false,
            publish_ttl: None,
            publish_period: PublishPeriod::new(0, btmesh_models::foundation::configuration::model_publication::Resolution::Seconds1),
            publish_retransmit: PublishRetransmit::new(3, 0),
            model_identifier: ONOFF_SERVER,
        };
        let registry = registry_with_publication(details);
        let mut engine: PublicationEngine = PublicationEngine::new();
        let mut transport = RecordingTransport {
            sent: RefCell::new(heapless::Vec::new()),
        };

        let first = engine
            .publish(0, ONOFF_SERVER, GET, &[1], 0, Ttl::new(5), &registry, &mut transport, &crate::traits::NoFriendship)
            .unwrap()
            .unwrap();
        assert!(first.retransmit_timer.is_some());

        // Superseding publication from the same (element, opcode) cancels the
        // first retransmit before its own send.
        let second = engine
            .publish(0, ONOFF_SERVER, GET, &[2], 0, Ttl::new(5), &registry, &mut transport, &crate::traits::NoFriendship)
            .unwrap()
            .unwrap();
        assert!(second.retransmit_timer.is_some());

        let (first_timer, _) = first.retransmit_timer.unwrap();
        let stale = engine
            .tick_retransmit(first_timer, Instant::from_millis(0), &registry, &mut transport, &crate::traits::NoFriendship)
            .unwrap();
        assert!(stale.is_none());
    }
}
