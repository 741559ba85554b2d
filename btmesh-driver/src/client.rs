//! The Configuration Client Core: packs a Configuration Client request,
//! hands it to the Publication Engine as an immediate device-key send,
//! and later demultiplexes the matching `*_STATUS`/`*_LIST` response (or a
//! response timeout) back to the caller as a typed [`ClientEvent`].
//!
//! Every entry point is synchronous and allocation-bounded: a `Pending
//! Request` record lives in a small `Slab` between the send and its
//! response (or its timeout), keyed on `(rsp_op, server address, net key
//! index)`. Like the Publication Engine, this core never owns a timer —
//! `post_*` returns `(timer id, Duration)` for the embedding runtime to
//! arm, and that runtime calls back into [`ConfigurationClientCore::expire`]
//! when it fires.
//!
//! Device-key security is the caller's concern to the extent of supplying
//! the raw key: this module acquires it into the [`ServerKeyStore`] for the
//! lifetime of the request and releases it on completion or timeout, but
//! never looks at the key's bytes itself. A request whose destination
//! resolves to a local element is a loopback — no transport send, no
//! key-store traffic, since there is no remote server to secure traffic to.

use crate::fmt::{debug, trace, warn};
use crate::key_store::ServerKeyStore;
use crate::publish::PublicationEngine;
use crate::queue::{Handle, Slab};
use crate::registry::ModelRegistry;
use crate::traits::{Duration, FriendAddressSource, OutboundDescriptor, UpperTransport, MAX_PARAMS};
use crate::DriverError;
use btmesh_common::address::{Address, GroupAddress, UnicastAddress};
use btmesh_common::opcode::Opcode;
use btmesh_common::Ttl;
use btmesh_models::foundation::configuration::app_key::{
    AppKeyAddMessage, AppKeyDeleteMessage, AppKeyGetMessage, AppKeyListMessage, AppKeyMessage,
    AppKeyStatusMessage, AppKeyUpdateMessage,
};
use btmesh_models::foundation::configuration::beacon::BeaconMessage;
use btmesh_models::foundation::configuration::composition_data::{
    CompositionDataMessage, CompositionStatus,
};
use btmesh_models::foundation::configuration::default_ttl::DefaultTTLMessage;
use btmesh_models::foundation::configuration::friend::FriendMessage;
use btmesh_models::foundation::configuration::gatt_proxy::GattProxyMessage;
use btmesh_models::foundation::configuration::heartbeat_publication::{
    HeartbeatPublicationMessage, HeartbeatPublicationSetMessage, HeartbeatPublicationStatusMessage,
};
use btmesh_models::foundation::configuration::heartbeat_subscription::{
    HeartbeatSubscriptionMessage, HeartbeatSubscriptionSetMessage,
    HeartbeatSubscriptionStatusMessage,
};
use btmesh_models::foundation::configuration::key_refresh_phase::{
    KeyRefreshPhase, KeyRefreshPhaseMessage, KeyRefreshTransition,
};
use btmesh_models::foundation::configuration::model_app::{
    ModelAppGetMessage, ModelAppListMessage, ModelAppMessage, ModelAppPayload,
    ModelAppStatusMessage,
};
use btmesh_models::foundation::configuration::model_publication::{
    ModelPublicationGetMessage, ModelPublicationMessage, ModelPublicationSetMessage,
    ModelPublicationStatusMessage, PublicationDetails,
};
use btmesh_models::foundation::configuration::model_subscription::{
    ModelSubscriptionDeleteAllMessage, ModelSubscriptionGetMessage, ModelSubscriptionListMessage,
    ModelSubscriptionMessage, ModelSubscriptionPayload, ModelSubscriptionStatusMessage,
    SubscriptionAddress,
};
use btmesh_models::foundation::configuration::net_key::{
    NetKeyAddMessage, NetKeyDeleteMessage, NetKeyListMessage, NetKeyMessage, NetKeyStatusMessage,
    NetKeyUpdateMessage,
};
use btmesh_models::foundation::configuration::network_transmit::{
    NetworkTransmitConfig, NetworkTransmitMessage,
};
use btmesh_models::foundation::configuration::node_identity::{IdentityState, NodeIdentityMessage};
use btmesh_models::foundation::configuration::node_reset::NodeResetMessage;
use btmesh_models::foundation::configuration::poll_timeout::PollTimeoutMessage;
use btmesh_models::foundation::configuration::relay::{RelayConfig, RelayMessage};
use btmesh_models::foundation::configuration::{
    AppKeyIndex, ConfigurationClient as ConfigurationClientModel, ConfigurationMessage,
    NetKeyAppKeyIndexesPair, NetKeyIndex,
};
use btmesh_models::{Message, Model, Status};
use btmesh_pdu::access::AccessPdu;
use heapless::Vec;
use rand_core::RngCore;

/// Pending-request records tracked concurrently. `MAX_OUTSTANDING_REQUESTS`
/// in the Configuration Client's own terms.
pub const MAX_PENDING_REQUESTS: usize = 4;

/// The per-request response wait, absent an application override.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 10_000;

/// The largest net/app key index the 12-bit packed wire format can carry.
const MAX_KEY_INDEX: u16 = 0x0FFF;

/// Tags which API call a [`PendingRequest`]/[`ClientEvent`] belongs to.
/// Carries no payload of its own — the response payload is reconstructed
/// from the wire response, not echoed from the request.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClientApiEvent {
    BeaconGet,
    BeaconSet,
    CompositionDataGet,
    DefaultTtlGet,
    DefaultTtlSet,
    GattProxyGet,
    GattProxySet,
    RelayGet,
    RelaySet,
    NetworkTransmitGet,
    NetworkTransmitSet,
    ModelPublicationGet,
    ModelPublicationSet,
    ModelSubscriptionAdd,
    ModelSubscriptionDelete,
    ModelSubscriptionOverwrite,
    ModelSubscriptionDeleteAll,
    ModelSubscriptionSigGet,
    ModelSubscriptionVendorGet,
    NetKeyAdd,
    NetKeyUpdate,
    NetKeyDelete,
    NetKeyGet,
    AppKeyAdd,
    AppKeyUpdate,
    AppKeyDelete,
    AppKeyGet,
    NodeIdentityGet,
    NodeIdentitySet,
    ModelAppBind,
    ModelAppUnbind,
    ModelAppGet,
    NodeReset,
    FriendGet,
    FriendSet,
    KeyRefreshPhaseGet,
    KeyRefreshPhaseSet,
    HeartbeatPublicationGet,
    HeartbeatPublicationSet,
    HeartbeatSubscriptionGet,
    HeartbeatSubscriptionSet,
    PollTimeoutGet,
}

/// The typed payload of a completed request, one variant per distinct
/// response shape (several `ClientApiEvent`s share a response shape, e.g.
/// `ModelPublicationGet`/`Set` both complete with `ModelPublication`).
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClientPayload {
    Beacon(bool),
    CompositionData(CompositionStatus),
    DefaultTtl(Ttl),
    GattProxy(bool),
    Relay(RelayConfig),
    NetworkTransmit(NetworkTransmitConfig),
    ModelPublication(ModelPublicationStatusMessage),
    ModelSubscription(ModelSubscriptionStatusMessage),
    ModelSubscriptionList(ModelSubscriptionListMessage),
    NetKey(NetKeyStatusMessage),
    NetKeyList(NetKeyListMessage),
    AppKey(AppKeyStatusMessage),
    AppKeyList(AppKeyListMessage),
    NodeIdentity(NetKeyIndex, IdentityState),
    ModelApp(ModelAppStatusMessage),
    ModelAppList(ModelAppListMessage),
    NodeReset,
    Friend(bool),
    KeyRefreshPhase(NetKeyIndex, KeyRefreshPhase),
    HeartbeatPublication(HeartbeatPublicationStatusMessage),
    HeartbeatSubscription(HeartbeatSubscriptionStatusMessage),
    PollTimeout(UnicastAddress, u32),
}

/// A completed (or timed-out) request, handed back from
/// [`ConfigurationClientCore::handle_response`]/`expire`.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClientEvent {
    pub api_event: ClientApiEvent,
    pub server_addr: UnicastAddress,
    pub result: Result<ClientPayload, DriverError>,
}

struct PendingRequest {
    api_event: ClientApiEvent,
    server_addr: UnicastAddress,
    net_key_index: u16,
    rsp_op: Opcode,
    timer_id: u32,
    /// Whether this request skipped the Server-Key Store (§4.6 step 2).
    /// Recorded at `begin_request` time rather than re-derived from the
    /// registry, since the release side must mirror the exact condition
    /// the acquire side used, not just "is this address local".
    local: bool,
}

/// `N` bounds the number of requests this client can have outstanding at
/// once (`MAX_PENDING_REQUESTS`).
pub struct ConfigurationClientCore<const N: usize = MAX_PENDING_REQUESTS> {
    pending: Slab<PendingRequest, N>,
    next_timer_id: u32,
    element_id: u8,
    response_timeout: Duration,
    default_ttl: Ttl,
}

impl<const N: usize> ConfigurationClientCore<N> {
    /// `element_id` is the local element hosting this Configuration Client
    /// instance — almost always the primary element (`0`).
    pub fn new(element_id: u8) -> Self {
        Self {
            pending: Slab::new(),
            next_timer_id: 0,
            element_id,
            response_timeout: Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
            default_ttl: Ttl::new(7),
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Ttl) -> Self {
        self.default_ttl = ttl;
        self
    }

    fn alloc_timer_id(&mut self) -> u32 {
        let id = self.next_timer_id;
        self.next_timer_id = self.next_timer_id.wrapping_add(1);
        id
    }

    /// Builds, sends (or loopbacks), and tracks a single request. Returns
    /// the `(timer id, timeout)` pair for the caller to arm a response
    /// timer against.
    #[allow(clippy::too_many_arguments)]
    fn begin_request<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        api_event: ClientApiEvent,
        rsp_op: Opcode,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        message: &ConfigurationMessage,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        let Address::Unicast(server_addr) = dst else {
            return Err(DriverError::InvalidAddress);
        };
        validate_key_index(net_key_index, DriverError::InvalidNetKeyIndex)?;

        // §4.6 step 2: "local" means the destination is the primary
        // element's own address *and* no device key was supplied — a
        // device-key-addressed request to a local element still goes
        // through the Server-Key Store like any other remote server.
        let local = server_addr == registry.primary_address() && device_key.is_none();
        if !local {
            let Some(key) = device_key else {
                return Err(DriverError::InvalidParams);
            };
            key_store.acquire(server_addr, key);
        }

        let send_result = self.send_request(
            dst,
            net_key_index,
            message,
            registry,
            engine,
            transport,
            friend,
            rng,
        );

        if let Err(err) = send_result {
            if !local {
                key_store.release(server_addr);
            }
            return Err(err);
        }

        let timer_id = self.alloc_timer_id();
        let record = PendingRequest {
            api_event,
            server_addr,
            net_key_index,
            rsp_op,
            timer_id,
            local,
        };
        if self.pending.insert(record).is_err() {
            if !local {
                key_store.release(server_addr);
            }
            warn!("configuration client: pending-request queue full, dropping request");
            return Err(DriverError::InsufficientSpace);
        }

        trace!("configuration client: request posted, awaiting {:?}", rsp_op);
        Ok((timer_id, self.response_timeout))
    }

    #[allow(clippy::too_many_arguments)]
    fn send_request<const E: usize, const SEND_N: usize, const RETRANSMIT_N: usize>(
        &mut self,
        dst: Address,
        net_key_index: u16,
        message: &ConfigurationMessage,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(), DriverError> {
        let mut parameters: Vec<u8, MAX_PARAMS> = Vec::new();
        message.emit_parameters(&mut parameters)?;

        let descriptor = OutboundDescriptor {
            dst,
            label_uuid: None,
            ttl: self.default_ttl,
            dev_key_use: true,
            net_key_index,
            app_key_index: 0,
            friend_credentials: false,
            opcode: message.opcode(),
            parameters,
        };

        let src_element = registry.primary_address() + self.element_id;
        engine.send_with_delay(descriptor, src_element, 0, 0, rng, registry, transport, friend)?;
        Ok(())
    }

    /// Matches an inbound Configuration Client response against the
    /// pending-request table. Returns `None` for anything that isn't a
    /// match: a foreign opcode, a response to someone else's element, or a
    /// response this client never asked for. When more than one pending
    /// request shares `(rsp_op, server address, net key index)`, a record
    /// whose payload can't be extracted is skipped rather than aborting the
    /// whole scan — a later candidate may still match.
    pub fn handle_response<const E: usize, const KN: usize>(
        &mut self,
        pdu: &AccessPdu,
        registry: &ModelRegistry<E>,
        key_store: &ServerKeyStore<KN>,
    ) -> Option<ClientEvent> {
        if registry.element_of(pdu.meta().dst) != Some(self.element_id) {
            return None;
        }

        let opcode = pdu.opcode();
        let src = pdu.meta().src;
        let net_key_index = pdu.meta().net_key_index;

        let mut candidates: Vec<Handle, N> = Vec::new();
        for (handle, record) in self.pending.iter() {
            if record.rsp_op == opcode
                && record.server_addr == src
                && record.net_key_index == net_key_index
            {
                candidates.push(handle).ok();
            }
        }

        for handle in candidates {
            let api_event = self.pending.get(handle)?.api_event;
            let message = match ConfigurationClientModel::parse(&opcode, pdu.parameters()) {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(err) => {
                    debug!("configuration client: response parse failed: {:?}", err);
                    continue;
                }
            };
            let Some(result) = extract_payload(api_event, message) else {
                continue;
            };

            let record = self.pending.remove(handle)?;
            if !record.local {
                key_store.release(record.server_addr);
            }
            return Some(ClientEvent {
                api_event: record.api_event,
                server_addr: record.server_addr,
                result,
            });
        }

        None
    }

    /// Called by the runtime when a response timer with `timer_id` fires
    /// with no matching response ever having arrived.
    pub fn expire<const E: usize, const KN: usize>(
        &mut self,
        timer_id: u32,
        _registry: &ModelRegistry<E>,
        key_store: &ServerKeyStore<KN>,
    ) -> Option<ClientEvent> {
        let handle = self.pending.find(|r| r.timer_id == timer_id)?;
        let record = self.pending.remove(handle)?;
        if !record.local {
            key_store.release(record.server_addr);
        }
        warn!("configuration client: request to {:?} timed out", record.server_addr);
        Some(ClientEvent {
            api_event: record.api_event,
            server_addr: record.server_addr,
            result: Err(DriverError::Timeout),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn post<const E: usize, const SEND_N: usize, const RETRANSMIT_N: usize, const KN: usize>(
        &mut self,
        api_event: ClientApiEvent,
        rsp_op: Opcode,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        message: ConfigurationMessage,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.begin_request(
            api_event,
            rsp_op,
            dst,
            net_key_index,
            device_key,
            &message,
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    pub fn beacon_get<const E: usize, const SEND_N: usize, const RETRANSMIT_N: usize, const KN: usize>(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::BeaconGet,
            beacon::CONFIG_BEACON_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::Beacon(BeaconMessage::Get),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn beacon_set<const E: usize, const SEND_N: usize, const RETRANSMIT_N: usize, const KN: usize>(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        enabled: bool,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::BeaconSet,
            beacon::CONFIG_BEACON_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::Beacon(BeaconMessage::Set(enabled)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn composition_data_get<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        page: u8,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::CompositionDataGet,
            composition_data::CONFIG_COMPOSITION_DATA_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::CompositionData(CompositionDataMessage::Get(page)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    pub fn default_ttl_get<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::DefaultTtlGet,
            default_ttl::CONFIG_DEFAULT_TTL_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::DefaultTTL(DefaultTTLMessage::Get),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn default_ttl_set<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        ttl: Ttl,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::DefaultTtlSet,
            default_ttl::CONFIG_DEFAULT_TTL_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::DefaultTTL(DefaultTTLMessage::Set(ttl)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    pub fn gatt_proxy_get<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::GattProxyGet,
            gatt_proxy::CONFIG_GATT_PROXY_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::GattProxy(GattProxyMessage::Get),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn gatt_proxy_set<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        enabled: bool,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::GattProxySet,
            gatt_proxy::CONFIG_GATT_PROXY_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::GattProxy(GattProxyMessage::Set(enabled)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    pub fn relay_get<const E: usize, const SEND_N: usize, const RETRANSMIT_N: usize, const KN: usize>(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::RelayGet,
            relay::CONFIG_RELAY_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::Relay(RelayMessage::Get),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn relay_set<const E: usize, const SEND_N: usize, const RETRANSMIT_N: usize, const KN: usize>(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        config: RelayConfig,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::RelaySet,
            relay::CONFIG_RELAY_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::Relay(RelayMessage::Set(config)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    pub fn network_transmit_get<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::NetworkTransmitGet,
            network_transmit::CONFIG_NETWORK_TRANSMIT_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::NetworkTransmit(NetworkTransmitMessage::Get),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn network_transmit_set<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        config: NetworkTransmitConfig,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::NetworkTransmitSet,
            network_transmit::CONFIG_NETWORK_TRANSMIT_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::NetworkTransmit(NetworkTransmitMessage::Set(config)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn model_publication_get<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        target: ModelPublicationGetMessage,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::ModelPublicationGet,
            model_publication::CONFIG_MODEL_PUBLICATION_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::ModelPublication(ModelPublicationMessage::Get(target)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    /// Set or clear a model's publication (`details.publish_address ==
    /// Unassigned` clears it). Picks the virtual-address-set opcode when
    /// the publish address is a label, matching `ConfigurationServer`'s own
    /// opcode split for the two wire encodings of this request.
    #[allow(clippy::too_many_arguments)]
    pub fn model_publication_set<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        details: PublicationDetails,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        let is_label = matches!(
            details.publish_address,
            btmesh_models::foundation::configuration::model_publication::PublishAddress::Label(_)
        );
        let message = if is_label {
            ConfigurationMessage::ModelPublication(ModelPublicationMessage::VirtualAddressSet(
                ModelPublicationSetMessage { details },
            ))
        } else {
            ConfigurationMessage::ModelPublication(ModelPublicationMessage::Set(
                ModelPublicationSetMessage { details },
            ))
        };
        self.post(
            ClientApiEvent::ModelPublicationSet,
            model_publication::CONFIG_MODEL_PUBLICATION_STATUS,
            dst,
            net_key_index,
            device_key,
            message,
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn model_subscription_change<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        api_event: ClientApiEvent,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        payload: ModelSubscriptionPayload,
        build: fn(ModelSubscriptionPayload) -> ModelSubscriptionMessage,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        validate_subscription_address(payload.subscription_address)?;
        self.post(
            api_event,
            model_subscription::CONFIG_MODEL_SUBSCRIPTION_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::ModelSubscription(build(payload)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn model_subscription_add<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        payload: ModelSubscriptionPayload,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        let build: fn(ModelSubscriptionPayload) -> ModelSubscriptionMessage =
            if matches!(payload.subscription_address, SubscriptionAddress::Label(_)) {
                ModelSubscriptionMessage::VirtualAddressAdd
            } else {
                ModelSubscriptionMessage::Add
            };
        self.model_subscription_change(
            ClientApiEvent::ModelSubscriptionAdd,
            dst,
            net_key_index,
            device_key,
            payload,
            build,
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn model_subscription_delete<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        payload: ModelSubscriptionPayload,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        let build: fn(ModelSubscriptionPayload) -> ModelSubscriptionMessage =
            if matches!(payload.subscription_address, SubscriptionAddress::Label(_)) {
                ModelSubscriptionMessage::VirtualAddressDelete
            } else {
                ModelSubscriptionMessage::Delete
            };
        self.model_subscription_change(
            ClientApiEvent::ModelSubscriptionDelete,
            dst,
            net_key_index,
            device_key,
            payload,
            build,
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn model_subscription_overwrite<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        payload: ModelSubscriptionPayload,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        let build: fn(ModelSubscriptionPayload) -> ModelSubscriptionMessage =
            if matches!(payload.subscription_address, SubscriptionAddress::Label(_)) {
                ModelSubscriptionMessage::VirtualAddressOverwrite
            } else {
                ModelSubscriptionMessage::Overwrite
            };
        self.model_subscription_change(
            ClientApiEvent::ModelSubscriptionOverwrite,
            dst,
            net_key_index,
            device_key,
            payload,
            build,
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn model_subscription_delete_all<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        target: ModelSubscriptionDeleteAllMessage,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::ModelSubscriptionDeleteAll,
            model_subscription::CONFIG_MODEL_SUBSCRIPTION_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::ModelSubscription(ModelSubscriptionMessage::DeleteAll(target)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn model_subscription_sig_get<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        target: ModelSubscriptionGetMessage,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::ModelSubscriptionSigGet,
            model_subscription::CONFIG_SIG_MODEL_SUBSCRIPTION_LIST,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::ModelSubscription(ModelSubscriptionMessage::SigGet(target)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn model_subscription_vendor_get<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        target: ModelSubscriptionGetMessage,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::ModelSubscriptionVendorGet,
            model_subscription::CONFIG_VENDOR_MODEL_SUBSCRIPTION_LIST,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::ModelSubscription(ModelSubscriptionMessage::VendorGet(target)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn net_key_add<const E: usize, const SEND_N: usize, const RETRANSMIT_N: usize, const KN: usize>(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        target_net_key_index: u16,
        net_key: [u8; 16],
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        validate_key_index(target_net_key_index, DriverError::InvalidNetKeyIndex)?;
        self.post(
            ClientApiEvent::NetKeyAdd,
            net_key::CONFIG_NETKEY_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::NetKey(NetKeyMessage::Add(NetKeyAddMessage {
                net_key_index: NetKeyIndex::new(target_net_key_index),
                net_key,
            })),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn net_key_update<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        target_net_key_index: u16,
        net_key: [u8; 16],
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        validate_key_index(target_net_key_index, DriverError::InvalidNetKeyIndex)?;
        self.post(
            ClientApiEvent::NetKeyUpdate,
            net_key::CONFIG_NETKEY_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::NetKey(NetKeyMessage::Update(NetKeyUpdateMessage {
                net_key_index: NetKeyIndex::new(target_net_key_index),
                net_key,
            })),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn net_key_delete<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        target_net_key_index: u16,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        validate_key_index(target_net_key_index, DriverError::InvalidNetKeyIndex)?;
        self.post(
            ClientApiEvent::NetKeyDelete,
            net_key::CONFIG_NETKEY_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::NetKey(NetKeyMessage::Delete(NetKeyDeleteMessage {
                net_key_index: NetKeyIndex::new(target_net_key_index),
            })),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    pub fn net_key_get<const E: usize, const SEND_N: usize, const RETRANSMIT_N: usize, const KN: usize>(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::NetKeyGet,
            net_key::CONFIG_NETKEY_LIST,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::NetKey(NetKeyMessage::Get),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    /// Encodes `net` and `app` as a 12-bit packed key-index pair, the wire
    /// format `AppKey{Add,Update}` share with `AppKeyDelete`/`AppKeyStatus`.
    fn pack_key_indexes(net: u16, app: u16) -> Result<NetKeyAppKeyIndexesPair, DriverError> {
        validate_key_index(net, DriverError::InvalidNetKeyIndex)?;
        validate_key_index(app, DriverError::InvalidAppKeyIndex)?;
        let mut packed = [0u8; 3];
        packed[0] = (net & 0x00FF) as u8;
        packed[1] = ((net >> 8) as u8) | (((app & 0x000F) as u8) << 4);
        packed[2] = (app >> 4) as u8;
        NetKeyAppKeyIndexesPair::parse(&packed).map_err(DriverError::from)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn app_key_add<const E: usize, const SEND_N: usize, const RETRANSMIT_N: usize, const KN: usize>(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        target_net_key_index: u16,
        target_app_key_index: u16,
        app_key: [u8; 16],
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        let indexes = Self::pack_key_indexes(target_net_key_index, target_app_key_index)?;
        self.post(
            ClientApiEvent::AppKeyAdd,
            app_key::CONFIG_APPKEY_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::AppKey(AppKeyMessage::Add(AppKeyAddMessage { indexes, app_key })),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn app_key_update<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        target_net_key_index: u16,
        target_app_key_index: u16,
        app_key: [u8; 16],
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        validate_key_index(target_net_key_index, DriverError::InvalidNetKeyIndex)?;
        validate_key_index(target_app_key_index, DriverError::InvalidAppKeyIndex)?;
        self.post(
            ClientApiEvent::AppKeyUpdate,
            app_key::CONFIG_APPKEY_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::AppKey(AppKeyMessage::Update(AppKeyUpdateMessage {
                net_key_index: NetKeyIndex::new(target_net_key_index),
                app_key_index: AppKeyIndex::new(target_app_key_index),
                app_key,
            })),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn app_key_delete<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        target_net_key_index: u16,
        target_app_key_index: u16,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        let indexes = Self::pack_key_indexes(target_net_key_index, target_app_key_index)?;
        self.post(
            ClientApiEvent::AppKeyDelete,
            app_key::CONFIG_APPKEY_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::AppKey(AppKeyMessage::Delete(AppKeyDeleteMessage { indexes })),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn app_key_get<const E: usize, const SEND_N: usize, const RETRANSMIT_N: usize, const KN: usize>(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        target_net_key_index: u16,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        validate_key_index(target_net_key_index, DriverError::InvalidNetKeyIndex)?;
        self.post(
            ClientApiEvent::AppKeyGet,
            app_key::CONFIG_APPKEY_LIST,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::AppKey(AppKeyMessage::Get(AppKeyGetMessage {
                net_key_index: NetKeyIndex::new(target_net_key_index),
            })),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn node_identity_get<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        target_net_key_index: u16,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        validate_key_index(target_net_key_index, DriverError::InvalidNetKeyIndex)?;
        self.post(
            ClientApiEvent::NodeIdentityGet,
            node_identity::CONFIG_NODE_IDENTITY_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::NodeIdentity(NodeIdentityMessage::Get(NetKeyIndex::new(
                target_net_key_index,
            ))),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn node_identity_set<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        target_net_key_index: u16,
        state: IdentityState,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        validate_key_index(target_net_key_index, DriverError::InvalidNetKeyIndex)?;
        self.post(
            ClientApiEvent::NodeIdentitySet,
            node_identity::CONFIG_NODE_IDENTITY_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::NodeIdentity(NodeIdentityMessage::Set(
                NetKeyIndex::new(target_net_key_index),
                state,
            )),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn model_app_bind<const E: usize, const SEND_N: usize, const RETRANSMIT_N: usize, const KN: usize>(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        payload: ModelAppPayload,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::ModelAppBind,
            model_app::CONFIG_MODEL_APP_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::ModelApp(ModelAppMessage::Bind(payload)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn model_app_unbind<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        payload: ModelAppPayload,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::ModelAppUnbind,
            model_app::CONFIG_MODEL_APP_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::ModelApp(ModelAppMessage::Unbind(payload)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn model_app_get<const E: usize, const SEND_N: usize, const RETRANSMIT_N: usize, const KN: usize>(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        target: ModelAppGetMessage,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::ModelAppGet,
            model_app::CONFIG_MODEL_APP_LIST,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::ModelApp(ModelAppMessage::Get(target)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    pub fn node_reset<const E: usize, const SEND_N: usize, const RETRANSMIT_N: usize, const KN: usize>(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::NodeReset,
            node_reset::CONFIG_NODE_RESET_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::NodeReset(NodeResetMessage::Reset),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    pub fn friend_get<const E: usize, const SEND_N: usize, const RETRANSMIT_N: usize, const KN: usize>(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::FriendGet,
            friend::CONFIG_FRIEND_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::Friend(FriendMessage::Get),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn friend_set<const E: usize, const SEND_N: usize, const RETRANSMIT_N: usize, const KN: usize>(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        enabled: bool,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::FriendSet,
            friend::CONFIG_FRIEND_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::Friend(FriendMessage::Set(enabled)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    /// Validates `target_net_key_index` and fails immediately on an
    /// out-of-range value, without allocating a pending-request record or
    /// touching the key store. A prior design that validated only after
    /// already queuing the request could leave a dead pending-request entry
    /// to time out uselessly when the index was bad from the start; this
    /// ordering avoids that.
    #[allow(clippy::too_many_arguments)]
    pub fn key_refresh_phase_get<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        target_net_key_index: u16,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        validate_key_index(target_net_key_index, DriverError::InvalidNetKeyIndex)?;
        self.post(
            ClientApiEvent::KeyRefreshPhaseGet,
            key_refresh_phase::CONFIG_KEY_REFRESH_PHASE_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::KeyRefreshPhase(KeyRefreshPhaseMessage::Get(NetKeyIndex::new(
                target_net_key_index,
            ))),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn key_refresh_phase_set<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        target_net_key_index: u16,
        transition: KeyRefreshTransition,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        validate_key_index(target_net_key_index, DriverError::InvalidNetKeyIndex)?;
        self.post(
            ClientApiEvent::KeyRefreshPhaseSet,
            key_refresh_phase::CONFIG_KEY_REFRESH_PHASE_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::KeyRefreshPhase(KeyRefreshPhaseMessage::Set(
                NetKeyIndex::new(target_net_key_index),
                transition,
            )),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    pub fn heartbeat_publication_get<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::HeartbeatPublicationGet,
            heartbeat_publication::CONFIG_HEARTBEAT_PUBLICATION_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::HeartbeatPublication(HeartbeatPublicationMessage::Get),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn heartbeat_publication_set<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        set: HeartbeatPublicationSetMessage,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::HeartbeatPublicationSet,
            heartbeat_publication::CONFIG_HEARTBEAT_PUBLICATION_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::HeartbeatPublication(HeartbeatPublicationMessage::Set(set)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    pub fn heartbeat_subscription_get<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::HeartbeatSubscriptionGet,
            heartbeat_subscription::CONFIG_HEARTBEAT_SUBSCRIPTION_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::HeartbeatSubscription(HeartbeatSubscriptionMessage::Get),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn heartbeat_subscription_set<
        const E: usize,
        const SEND_N: usize,
        const RETRANSMIT_N: usize,
        const KN: usize,
    >(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        set: HeartbeatSubscriptionSetMessage,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::HeartbeatSubscriptionSet,
            heartbeat_subscription::CONFIG_HEARTBEAT_SUBSCRIPTION_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::HeartbeatSubscription(HeartbeatSubscriptionMessage::Set(set)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn poll_timeout_get<const E: usize, const SEND_N: usize, const RETRANSMIT_N: usize, const KN: usize>(
        &mut self,
        dst: Address,
        net_key_index: u16,
        device_key: Option<[u8; 16]>,
        lpn_address: UnicastAddress,
        registry: &ModelRegistry<E>,
        engine: &mut PublicationEngine<SEND_N, RETRANSMIT_N>,
        key_store: &ServerKeyStore<KN>,
        transport: &mut impl UpperTransport,
        friend: &impl FriendAddressSource,
        rng: &mut impl RngCore,
    ) -> Result<(u32, Duration), DriverError> {
        self.post(
            ClientApiEvent::PollTimeoutGet,
            poll_timeout::CONFIG_LOW_POWER_NODE_POLLTIMEOUT_STATUS,
            dst,
            net_key_index,
            device_key,
            ConfigurationMessage::PollTimeout(PollTimeoutMessage::Get(lpn_address)),
            registry,
            engine,
            key_store,
            transport,
            friend,
            rng,
        )
    }
}

fn validate_key_index(index: u16, err: DriverError) -> Result<(), DriverError> {
    if index > MAX_KEY_INDEX {
        Err(err)
    } else {
        Ok(())
    }
}

/// §4.6 step-1 per-call validation for Model Subscription Add/Delete/
/// Overwrite: the subscription address must not be Unassigned or the
/// fixed All-Nodes group, and a Label (virtual) address always carries its
/// Label UUID by construction so there is no separate "absent UUID" case
/// to reject here.
fn validate_subscription_address(address: SubscriptionAddress) -> Result<(), DriverError> {
    match address {
        SubscriptionAddress::Unassigned => Err(DriverError::InvalidParams),
        SubscriptionAddress::Group(GroupAddress::AllNodes) => Err(DriverError::InvalidParams),
        SubscriptionAddress::Unicast(_)
        | SubscriptionAddress::Group(_)
        | SubscriptionAddress::Label(_) => Ok(()),
    }
}

const REMOTE_ERROR_BASE: u16 = 5;
const RFU_END: u8 = 0xFF;

/// §4.6 "Error remapping": a non-`Success` Configuration Server status is
/// remapped into the client's unified error space by adding the remote
/// error base, clamped to the reserved-for-future-use boundary. Wire-stable
/// per §9 — mirrors the original `CFG_CL_MAP_OTA_TO_ERR_CODE` macro, which
/// adds the same fixed base and clamps at the same ceiling rather than
/// letting the addition wrap.
fn status_to_driver_error(status: Status) -> DriverError {
    let remapped = REMOTE_ERROR_BASE + status as u16;
    let remapped = if remapped > RFU_END as u16 {
        RFU_END
    } else {
        remapped as u8
    };
    DriverError::RemoteError(remapped)
}

fn status_result<T>(status: Status, ok: T) -> Result<T, DriverError> {
    if matches!(status, Status::Success) {
        Ok(ok)
    } else {
        Err(status_to_driver_error(status))
    }
}

/// Builds the typed [`ClientPayload`] for `api_event` out of a parsed
/// [`ConfigurationMessage`], or `None` if the message isn't the shape
/// `api_event` expects — the caller treats `None` as "keep scanning", not
/// as an error.
fn extract_payload(
    api_event: ClientApiEvent,
    message: ConfigurationMessage,
) -> Option<Result<ClientPayload, DriverError>> {
    use ClientApiEvent::*;
    Some(match (api_event, message) {
        (BeaconGet | BeaconSet, ConfigurationMessage::Beacon(BeaconMessage::Status(on))) => {
            Ok(ClientPayload::Beacon(on))
        }
        (
            CompositionDataGet,
            ConfigurationMessage::CompositionData(CompositionDataMessage::Status(status)),
        ) => Ok(ClientPayload::CompositionData(status)),
        (
            DefaultTtlGet | DefaultTtlSet,
            ConfigurationMessage::DefaultTTL(DefaultTTLMessage::Status(ttl)),
        ) => Ok(ClientPayload::DefaultTtl(ttl)),
        (
            GattProxyGet | GattProxySet,
            ConfigurationMessage::GattProxy(GattProxyMessage::Status(on)),
        ) => Ok(ClientPayload::GattProxy(on)),
        (RelayGet | RelaySet, ConfigurationMessage::Relay(RelayMessage::Status(cfg))) => {
            Ok(ClientPayload::Relay(cfg))
        }
        (
            NetworkTransmitGet | NetworkTransmitSet,
            ConfigurationMessage::NetworkTransmit(NetworkTransmitMessage::Status(cfg)),
        ) => Ok(ClientPayload::NetworkTransmit(cfg)),
        (
            ModelPublicationGet | ModelPublicationSet,
            ConfigurationMessage::ModelPublication(ModelPublicationMessage::Status(msg)),
        ) => {
            let status = msg.status;
            status_result(status, ClientPayload::ModelPublication(msg))
        }
        (
            ModelSubscriptionAdd
            | ModelSubscriptionDelete
            | ModelSubscriptionOverwrite
            | ModelSubscriptionDeleteAll,
            ConfigurationMessage::ModelSubscription(ModelSubscriptionMessage::Status(msg)),
        ) => {
            let status = msg.status;
            status_result(status, ClientPayload::ModelSubscription(msg))
        }
        (
            ModelSubscriptionSigGet,
            ConfigurationMessage::ModelSubscription(ModelSubscriptionMessage::SigList(msg)),
        ) => {
            let status = msg.status;
            status_result(status, ClientPayload::ModelSubscriptionList(msg))
        }
        (
            ModelSubscriptionVendorGet,
            ConfigurationMessage::ModelSubscription(ModelSubscriptionMessage::VendorList(msg)),
        ) => {
            let status = msg.status;
            status_result(status, ClientPayload::ModelSubscriptionList(msg))
        }
        (
            NetKeyAdd | NetKeyUpdate | NetKeyDelete,
            ConfigurationMessage::NetKey(NetKeyMessage::Status(msg)),
        ) => {
            let status = msg.status;
            status_result(status, ClientPayload::NetKey(msg))
        }
        (NetKeyGet, ConfigurationMessage::NetKey(NetKeyMessage::List(msg))) => {
            Ok(ClientPayload::NetKeyList(msg))
        }
        (
            AppKeyAdd | AppKeyUpdate | AppKeyDelete,
            ConfigurationMessage::AppKey(AppKeyMessage::Status(msg)),
        ) => {
            let status = msg.status;
            status_result(status, ClientPayload::AppKey(msg))
        }
        (AppKeyGet, ConfigurationMessage::AppKey(AppKeyMessage::List(msg))) => {
            let status = msg.status;
            status_result(status, ClientPayload::AppKeyList(msg))
        }
        (
            NodeIdentityGet | NodeIdentitySet,
            ConfigurationMessage::NodeIdentity(NodeIdentityMessage::Status(status, net, state)),
        ) => status_result(status, ClientPayload::NodeIdentity(net, state)),
        (
            ModelAppBind | ModelAppUnbind,
            ConfigurationMessage::ModelApp(ModelAppMessage::Status(msg)),
        ) => {
            let status = msg.status;
            status_result(status, ClientPayload::ModelApp(msg))
        }
        (ModelAppGet, ConfigurationMessage::ModelApp(ModelAppMessage::List(msg))) => {
            let status = msg.status;
            status_result(status, ClientPayload::ModelAppList(msg))
        }
        (NodeReset, ConfigurationMessage::NodeReset(NodeResetMessage::Status)) => {
            Ok(ClientPayload::NodeReset)
        }
        (FriendGet | FriendSet, ConfigurationMessage::Friend(FriendMessage::Status(on))) => {
            Ok(ClientPayload::Friend(on))
        }
        (
            KeyRefreshPhaseGet | KeyRefreshPhaseSet,
            ConfigurationMessage::KeyRefreshPhase(KeyRefreshPhaseMessage::Status(
                status,
                net,
                phase,
            )),
        ) => status_result(status, ClientPayload::KeyRefreshPhase(net, phase)),
        (
            HeartbeatPublicationGet | HeartbeatPublicationSet,
            ConfigurationMessage::HeartbeatPublication(HeartbeatPublicationMessage::Status(msg)),
        ) => {
            let status = msg.status;
            status_result(status, ClientPayload::HeartbeatPublication(msg))
        }
        (
            HeartbeatSubscriptionGet | HeartbeatSubscriptionSet,
            ConfigurationMessage::HeartbeatSubscription(HeartbeatSubscriptionMessage::Status(
                msg,
            )),
        ) => {
            let status = msg.status;
            status_result(status, ClientPayload::HeartbeatSubscription(msg))
        }
        (
            PollTimeoutGet,
            ConfigurationMessage::PollTimeout(PollTimeoutMessage::Status(addr, timeout)),
        ) => Ok(ClientPayload::PollTimeout(addr, timeout)),
        _ => return None,
    })
}

use btmesh_models::foundation::configuration::app_key;
use btmesh_models::foundation::configuration::beacon;
use btmesh_models::foundation::configuration::composition_data;
use btmesh_models::foundation::configuration::default_ttl;
use btmesh_models::foundation::configuration::friend;
use btmesh_models::foundation::configuration::gatt_proxy;
use btmesh_models::foundation::configuration::heartbeat_publication;
use btmesh_models::foundation::configuration::heartbeat_subscription;
use btmesh_models::foundation::configuration::key_refresh_phase;
use btmesh_models::foundation::configuration::model_app;
use btmesh_models::foundation::configuration::model_publication;
use btmesh_models::foundation::configuration::model_subscription;
use btmesh_models::foundation::configuration::net_key;
use btmesh_models::foundation::configuration::network_transmit;
use btmesh_models::foundation::configuration::node_identity;
use btmesh_models::foundation::configuration::node_reset;
use btmesh_models::foundation::configuration::poll_timeout;
use btmesh_models::foundation::configuration::relay;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_store::ServerKeyStore;
    use crate::registry::ModelRegistry;
    use btmesh_common::location::Location;
    use btmesh_common::{
        CompanyIdentifier, Composition, ElementDescriptor, ModelIdentifier, ProductIdentifier,
        VersionIdentifier,
    };
    use btmesh_models::foundation::configuration::{CONFIGURATION_CLIENT, CONFIGURATION_SERVER};
    use btmesh_pdu::access::{AccessMeta, KeyIndexKind};
    use core::cell::RefCell;

    fn registry() -> ModelRegistry {
        let mut composition = Composition::new(
            CompanyIdentifier(0),
            ProductIdentifier(0),
            VersionIdentifier(0),
        );
        let mut primary = ElementDescriptor::new(Location::numeric(0));
        primary.add_model(CONFIGURATION_CLIENT);
        primary.add_model(CONFIGURATION_SERVER);
        composition.add_element(primary).ok().unwrap();
        ModelRegistry::new(UnicastAddress::new(0x0001).unwrap(), composition)
    }

    struct RecordingTransport {
        sent: RefCell<heapless::Vec<(Address, Opcode), 8>>,
    }

    impl UpperTransport for RecordingTransport {
        fn send(&mut self, descriptor: &OutboundDescriptor) -> Result<(), DriverError> {
            self.sent
                .borrow_mut()
                .push((descriptor.dst, descriptor.opcode))
                .ok();
            Ok(())
        }
    }

    struct NoRng;
    impl RngCore for NoRng {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
            dest.fill(0);
            Ok(())
        }
    }

    #[test]
    fn beacon_get_posts_and_tracks_one_pending_request() {
        let registry = registry();
        let mut engine: PublicationEngine = PublicationEngine::new();
        let key_store: ServerKeyStore = ServerKeyStore::new();
        let mut transport = RecordingTransport {
            sent: RefCell::new(heapless::Vec::new()),
        };
        let mut client: ConfigurationClientCore = ConfigurationClientCore::new(0);

        let server = UnicastAddress::new(0x0100).unwrap();
        let (timer_id, delay) = client
            .beacon_get(
                Address::Unicast(server),
                0,
                Some([0x11; 16]),
                &registry,
                &mut engine,
                &key_store,
                &mut transport,
                &crate::traits::NoFriendship,
                &mut NoRng,
            )
            .unwrap();
        assert_eq!(delay, Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS));
        assert_eq!(transport.sent.borrow().len(), 1);
        assert_eq!(transport.sent.borrow()[0].1, beacon::CONFIG_BEACON_GET);

        let response_meta = AccessMeta {
            src: server,
            dst: Address::Unicast(registry.primary_address()),
            label_uuid: None,
            ttl: Ttl::new(5),
            net_key_index: 0,
            app_key_index: KeyIndexKind::RemoteDeviceKey,
            recv_on_unicast: true,
        };
        let pdu = AccessPdu::new(beacon::CONFIG_BEACON_STATUS, &[1], response_meta).unwrap();
        let event = client
            .handle_response(&pdu, &registry, &key_store)
            .expect("matching response");
        assert_eq!(event.api_event, ClientApiEvent::BeaconGet);
        assert!(matches!(event.result, Ok(ClientPayload::Beacon(true))));
        let _ = timer_id;
    }

    #[test]
    fn unmatched_response_is_ignored() {
        let registry = registry();
        let key_store: ServerKeyStore = ServerKeyStore::new();
        let mut client: ConfigurationClientCore = ConfigurationClientCore::new(0);

        let response_meta = AccessMeta {
            src: UnicastAddress::new(0x0100).unwrap(),
            dst: Address::Unicast(registry.primary_address()),
            label_uuid: None,
            ttl: Ttl::new(5),
            net_key_index: 0,
            app_key_index: KeyIndexKind::RemoteDeviceKey,
            recv_on_unicast: true,
        };
        let pdu = AccessPdu::new(beacon::CONFIG_BEACON_STATUS, &[1], response_meta).unwrap();
        assert!(client.handle_response(&pdu, &registry, &key_store).is_none());
    }

    #[test]
    fn timeout_releases_the_device_key() {
        let registry = registry();
        let mut engine: PublicationEngine = PublicationEngine::new();
        let key_store: ServerKeyStore = ServerKeyStore::new();
        let mut transport = RecordingTransport {
            sent: RefCell::new(heapless::Vec::new()),
        };
        let mut client: ConfigurationClientCore = ConfigurationClientCore::new(0);

        let server = UnicastAddress::new(0x0100).unwrap();
        let (timer_id, _) = client
            .beacon_get(
                Address::Unicast(server),
                0,
                Some([0x22; 16]),
                &registry,
                &mut engine,
                &key_store,
                &mut transport,
                &crate::traits::NoFriendship,
                &mut NoRng,
            )
            .unwrap();
        assert!(key_store.read_device_key(server).is_some());

        let event = client.expire(timer_id, &registry, &key_store).unwrap();
        assert!(matches!(event.result, Err(DriverError::Timeout)));
        assert!(key_store.read_device_key(server).is_none());
    }

    #[test]
    fn key_refresh_phase_get_rejects_an_out_of_range_index_without_queuing() {
        let registry = registry();
        let mut engine: PublicationEngine = PublicationEngine::new();
        let key_store: ServerKeyStore = ServerKeyStore::new();
        let mut transport = RecordingTransport {
            sent: RefCell::new(heapless::Vec::new()),
        };
        let mut client: ConfigurationClientCore = ConfigurationClientCore::new(0);

        let result = client.key_refresh_phase_get(
            Address::Unicast(UnicastAddress::new(0x0100).unwrap()),
            0,
            Some([0u8; 16]),
            0x1000,
            &registry,
            &mut engine,
            &key_store,
            &mut transport,
            &crate::traits::NoFriendship,
            &mut NoRng,
        );
        assert!(matches!(result, Err(DriverError::InvalidNetKeyIndex)));
        assert!(transport.sent.borrow().is_empty());
    }

    #[test]
    fn non_local_request_without_device_key_is_rejected() {
        let registry = registry();
        let mut engine: PublicationEngine = PublicationEngine::new();
        let key_store: ServerKeyStore = ServerKeyStore::new();
        let mut transport = RecordingTransport {
            sent: RefCell::new(heapless::Vec::new()),
        };
        let mut client: ConfigurationClientCore = ConfigurationClientCore::new(0);

        let server = UnicastAddress::new(0x0100).unwrap();
        let result = client.beacon_get(
            Address::Unicast(server),
            0,
            None,
            &registry,
            &mut engine,
            &key_store,
            &mut transport,
            &crate::traits::NoFriendship,
            &mut NoRng,
        );
        assert!(matches!(result, Err(DriverError::InvalidParams)));
        assert!(transport.sent.borrow().is_empty());
        assert!(key_store.read_device_key(server).is_none());
    }

    #[test]
    fn out_of_range_net_key_index_is_rejected_before_allocating() {
        let registry = registry();
        let mut engine: PublicationEngine = PublicationEngine::new();
        let key_store: ServerKeyStore = ServerKeyStore::new();
        let mut transport = RecordingTransport {
            sent: RefCell::new(heapless::Vec::new()),
        };
        let mut client: ConfigurationClientCore = ConfigurationClientCore::new(0);

        let server = UnicastAddress::new(0x0100).unwrap();
        let result = client.beacon_get(
            Address::Unicast(server),
            MAX_KEY_INDEX + 1,
            Some([0x33; 16]),
            &registry,
            &mut engine,
            &key_store,
            &mut transport,
            &crate::traits::NoFriendship,
            &mut NoRng,
        );
        assert!(matches!(result, Err(DriverError::InvalidNetKeyIndex)));
        assert!(transport.sent.borrow().is_empty());
        assert!(key_store.read_device_key(server).is_none());
    }

    #[test]
    fn device_key_addressed_request_to_local_element_uses_key_store() {
        let registry = registry();
        let mut engine: PublicationEngine = PublicationEngine::new();
        let key_store: ServerKeyStore = ServerKeyStore::new();
        let mut transport = RecordingTransport {
            sent: RefCell::new(heapless::Vec::new()),
        };
        let mut client: ConfigurationClientCore = ConfigurationClientCore::new(0);

        let primary = registry.primary_address();
        client
            .beacon_get(
                Address::Unicast(primary),
                0,
                Some([0x44; 16]),
                &registry,
                &mut engine,
                &key_store,
                &mut transport,
                &crate::traits::NoFriendship,
                &mut NoRng,
            )
            .unwrap();

        // A device-key pointer to the primary element's own address is not
        // silently treated as loopback: it still goes through the
        // Server-Key Store like any other server.
        assert!(key_store.read_device_key(primary).is_some());
    }

    #[test]
    fn subscription_add_rejects_unassigned_and_all_nodes() {
        let registry = registry();
        let mut engine: PublicationEngine = PublicationEngine::new();
        let key_store: ServerKeyStore = ServerKeyStore::new();
        let mut transport = RecordingTransport {
            sent: RefCell::new(heapless::Vec::new()),
        };
        let mut client: ConfigurationClientCore = ConfigurationClientCore::new(0);
        let server = UnicastAddress::new(0x0100).unwrap();

        let unassigned = ModelSubscriptionPayload {
            element_address: registry.primary_address(),
            subscription_address: SubscriptionAddress::Unassigned,
            model_identifier: ModelIdentifier::SIG(0x1000),
        };
        let result = client.model_subscription_add(
            Address::Unicast(server),
            0,
            Some([0x55; 16]),
            unassigned,
            &registry,
            &mut engine,
            &key_store,
            &mut transport,
            &crate::traits::NoFriendship,
            &mut NoRng,
        );
        assert!(matches!(result, Err(DriverError::InvalidParams)));

        let all_nodes = ModelSubscriptionPayload {
            element_address: registry.primary_address(),
            subscription_address: SubscriptionAddress::Group(GroupAddress::AllNodes),
            model_identifier: ModelIdentifier::SIG(0x1000),
        };
        let result = client.model_subscription_add(
            Address::Unicast(server),
            0,
            Some([0x55; 16]),
            all_nodes,
            &registry,
            &mut engine,
            &key_store,
            &mut transport,
            &crate::traits::NoFriendship,
            &mut NoRng,
        );
        assert!(matches!(result, Err(DriverError::InvalidParams)));
        assert!(transport.sent.borrow().is_empty());
    }

    #[test]
    fn status_to_driver_error_applies_the_remote_error_base() {
        assert_eq!(
            status_to_driver_error(Status::InvalidAddress),
            DriverError::RemoteError(0x06)
        );
        assert_eq!(
            status_to_driver_error(Status::InvalidBinding),
            DriverError::RemoteError(0x16)
        );
    }
}
