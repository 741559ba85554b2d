//! The Access Dispatcher: resolves a decrypted, already opcode-split
//! `AccessPdu` to the local model instances (or core-model registrations)
//! that should see it. Routing is pure and allocation-bounded: the caller
//! gets back the list of matches and decides how to invoke each one, since
//! the actual model state machines (Configuration Server included) live
//! outside this crate.

use crate::registry::ModelRegistry;
use btmesh_common::address::{Address, GroupAddress};
use btmesh_common::ModelIdentifier;
use btmesh_pdu::access::{AccessMeta, AccessPdu, KeyIndexKind};
use heapless::Vec;

pub const MAX_DISPATCH_TARGETS: usize = 8;

/// A single routing match: "deliver this PDU to `model_identifier` on
/// `element_id`". `core` distinguishes a device-key bypass to the
/// Core Model Registration table from an ordinary application-model match.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DispatchTarget {
    pub element_id: u8,
    pub model_identifier: ModelIdentifier,
    pub core: bool,
}

/// Resolves the local delivery targets for `pdu`. Never fails: unresolved
/// destinations, unbound app keys, and model-less elements simply yield no
/// targets (§4.4's best-effort, silent-drop ingress contract).
pub fn dispatch<const E: usize>(
    registry: &ModelRegistry<E>,
    pdu: &AccessPdu,
) -> Vec<DispatchTarget, MAX_DISPATCH_TARGETS> {
    let mut targets = Vec::new();
    let meta = *pdu.meta();

    match meta.dst {
        Address::Unicast(_) => {
            dispatch_resolved_element(registry, pdu, &meta, meta.recv_on_unicast, &mut targets);
        }
        Address::Group(group) if is_fixed_group(group) => {
            for element_id in registry.elements_from_fixed_group(group) {
                dispatch_application_only(registry, pdu, &meta, element_id, &mut targets);
            }
        }
        Address::Group(_) | Address::Virtual(_) => {
            dispatch_by_subscription(registry, pdu, &meta, &mut targets);
        }
        Address::Unassigned => {}
    }

    targets
}

fn is_fixed_group(group: GroupAddress) -> bool {
    matches!(
        group,
        GroupAddress::AllProxies
            | GroupAddress::AllFriends
            | GroupAddress::AllRelays
            | GroupAddress::AllNodes
    )
}

/// Unicast destination: resolve to a local element, then either bypass to
/// the core-model registry (device-key traffic) or walk SIG-then-vendor
/// application instances.
fn dispatch_resolved_element<const E: usize>(
    registry: &ModelRegistry<E>,
    pdu: &AccessPdu,
    meta: &AccessMeta,
    recv_on_unicast: bool,
    targets: &mut Vec<DispatchTarget, MAX_DISPATCH_TARGETS>,
) {
    let Some(element_id) = registry.element_of(meta.dst) else {
        return;
    };

    if meta.app_key_index.is_device_key() {
        // Device-key traffic never loops back to application models and is
        // only routed when it genuinely arrived as unicast.
        if recv_on_unicast {
            dispatch_core(registry, pdu, element_id, targets);
        }
        return;
    }

    dispatch_application(registry, pdu, meta, element_id, targets);
}

/// Fixed-group collapse: always treated as multicast (never core-model,
/// since device-key traffic cannot arrive via a fixed group), so only
/// application instances are considered.
fn dispatch_application_only<const E: usize>(
    registry: &ModelRegistry<E>,
    pdu: &AccessPdu,
    meta: &AccessMeta,
    element_id: u8,
    targets: &mut Vec<DispatchTarget, MAX_DISPATCH_TARGETS>,
) {
    if meta.app_key_index.is_device_key() {
        return;
    }
    dispatch_application(registry, pdu, meta, element_id, targets);
}

fn dispatch_by_subscription<const E: usize>(
    registry: &ModelRegistry<E>,
    pdu: &AccessPdu,
    meta: &AccessMeta,
    targets: &mut Vec<DispatchTarget, MAX_DISPATCH_TARGETS>,
) {
    if meta.app_key_index.is_device_key() {
        return;
    }
    for element_id in 0..registry.number_of_elements() {
        for model_identifier in registry.model_identifiers_ordered(element_id) {
            if !registry.subscriptions_contain(
                element_id,
                model_identifier,
                meta.dst,
                meta.label_uuid,
            ) {
                continue;
            }
            push_if_matches(registry, pdu, meta, element_id, model_identifier, targets);
        }
    }
}

fn dispatch_application<const E: usize>(
    registry: &ModelRegistry<E>,
    pdu: &AccessPdu,
    meta: &AccessMeta,
    element_id: u8,
    targets: &mut Vec<DispatchTarget, MAX_DISPATCH_TARGETS>,
) {
    for model_identifier in registry.model_identifiers_ordered(element_id) {
        push_if_matches(registry, pdu, meta, element_id, model_identifier, targets);
    }
}

fn push_if_matches<const E: usize>(
    registry: &ModelRegistry<E>,
    pdu: &AccessPdu,
    meta: &AccessMeta,
    element_id: u8,
    model_identifier: ModelIdentifier,
    targets: &mut Vec<DispatchTarget, MAX_DISPATCH_TARGETS>,
) {
    if !registry.accepts_opcode(element_id, model_identifier, &pdu.opcode()) {
        return;
    }
    let KeyIndexKind::Application(app_key_index) = meta.app_key_index else {
        return;
    };
    if !registry.binding_contains(element_id, model_identifier, app_key_index) {
        return;
    }
    targets
        .push(DispatchTarget {
            element_id,
            model_identifier,
            core: false,
        })
        .ok();
}

fn dispatch_core<const E: usize>(
    registry: &ModelRegistry<E>,
    pdu: &AccessPdu,
    element_id: u8,
    targets: &mut Vec<DispatchTarget, MAX_DISPATCH_TARGETS>,
) {
    for registration in registry.core_models() {
        if registration.element_id == element_id && registration.accepts(&pdu.opcode()) {
            targets
                .push(DispatchTarget {
                    element_id,
                    model_identifier: registration.model_identifier,
                    core: true,
                })
                .ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CoreModelRegistration, ModelState};
    use btmesh_common::address::UnicastAddress;
    use btmesh_common::location::Location;
    use btmesh_common::{
        CompanyIdentifier, ElementDescriptor, ModelIdentifier, ProductIdentifier,
        VersionIdentifier,
    };
    use btmesh_common::opcode::Opcode;
    use btmesh_common::Composition;
    use btmesh_common::Ttl;
    use btmesh_models::foundation::configuration::CONFIGURATION_CLIENT;
    use btmesh_pdu::access::AccessMeta;

    const ONOFF_SERVER: ModelIdentifier = ModelIdentifier::SIG(0x1000);
    const GET: Opcode = Opcode::OneOctet(0x01);

    fn base_registry() -> ModelRegistry {
        let mut composition = Composition::new(
            CompanyIdentifier(0),
            ProductIdentifier(0),
            VersionIdentifier(0),
        );
        let mut primary = ElementDescriptor::new(Location::numeric(0));
        primary.add_model(ONOFF_SERVER);
        primary.add_model(CONFIGURATION_CLIENT);
        composition.add_element(primary).ok().unwrap();
        let mut registry = ModelRegistry::new(UnicastAddress::new(0x0001).unwrap(), composition);
        registry.register_opcode(0, ONOFF_SERVER, GET).unwrap();
        registry.bind(0, ONOFF_SERVER, 0).unwrap();
        registry
            .register_core_model(
                CoreModelRegistration::new(0, CONFIGURATION_CLIENT).with_opcode(GET),
            )
            .ok()
            .unwrap();
        registry
    }

    fn meta(dst: Address, device_key: bool, recv_on_unicast: bool) -> AccessMeta {
        AccessMeta {
            src: UnicastAddress::new(0x0100).unwrap(),
            dst,
            label_uuid: None,
            ttl: Ttl::new(5),
            net_key_index: 0,
            app_key_index: if device_key {
                KeyIndexKind::RemoteDeviceKey
            } else {
                KeyIndexKind::Application(0)
            },
            recv_on_unicast,
        }
    }

    #[test]
    fn unicast_application_traffic_routes_to_bound_model() {
        let registry = base_registry();
        let dst = Address::Unicast(UnicastAddress::new(0x0001).unwrap());
        let pdu = AccessPdu::new(GET, &[], meta(dst, false, true)).unwrap();
        let targets = dispatch(&registry, &pdu);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].model_identifier, ONOFF_SERVER);
        assert!(!targets[0].core);
    }

    #[test]
    fn device_key_traffic_bypasses_to_core_model_only_on_unicast() {
        let registry = base_registry();
        let dst = Address::Unicast(UnicastAddress::new(0x0001).unwrap());
        let pdu = AccessPdu::new(GET, &[], meta(dst, true, true)).unwrap();
        let targets = dispatch(&registry, &pdu);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].model_identifier, CONFIGURATION_CLIENT);
        assert!(targets[0].core);

        let collapsed = AccessPdu::new(GET, &[], meta(dst, true, false)).unwrap();
        assert!(dispatch(&registry, &collapsed).is_empty());
    }

    #[test]
    fn unbound_app_key_drops_silently() {
        let registry = base_registry();
        let dst = Address::Unicast(UnicastAddress::new(0x0001).unwrap());
        let mut m = meta(dst, false, true);
        m.app_key_index = KeyIndexKind::Application(7);
        let pdu = AccessPdu::new(GET, &[], m).unwrap();
        assert!(dispatch(&registry, &pdu).is_empty());
    }

    #[test]
    fn virtual_destination_requires_subscription_hit() {
        let mut registry = base_registry();
        let label = btmesh_common::address::LabelUuid::new([0x11; 16]).unwrap();
        let virt_addr = Address::Virtual(label.virtual_address());
        registry.subscribe(0, ONOFF_SERVER, virt_addr).unwrap();

        let mut m = meta(virt_addr, false, false);
        m.label_uuid = Some(label);
        let pdu = AccessPdu::new(GET, &[], m).unwrap();
        let targets = dispatch(&registry, &pdu);
        assert_eq!(targets.len(), 1);

        // Without the matching subscription, a virtual PDU drops silently.
        let registry_empty = base_registry();
        let pdu_empty = AccessPdu::new(GET, &[], m).unwrap();
        assert!(dispatch(&registry_empty, &pdu_empty).is_empty());
    }
}
