//! The Model Registry: this node's element/model composition, each model
//! instance's App-Key bindings, subscription list and (where supported)
//! publication record, plus the Core Model Registration table the Access
//! Dispatcher consults when a device-key PDU isn't addressed through any
//! application model's opcode table.
//!
//! Composition is a tree of `Vec`s (`btmesh_common::Composition`); this
//! module hangs the per-model-instance configuration state off it via the
//! tree's `X` extra-data parameter rather than inventing a parallel shape.

use crate::DriverError;
use btmesh_common::address::{Address, GroupAddress, LabelUuid, UnicastAddress};
use btmesh_common::opcode::Opcode;
use btmesh_common::{Composition, ModelIdentifier};
use btmesh_models::foundation::configuration::model_publication::PublicationDetails;
use heapless::Vec;

pub const MAX_BINDINGS_PER_MODEL: usize = 4;
pub const MAX_SUBSCRIPTIONS_PER_MODEL: usize = 8;
pub const MAX_OPCODES_PER_MODEL: usize = 8;
pub const MAX_CORE_MODELS: usize = 4;
pub const MAX_CORE_MODEL_OPCODES: usize = 8;

/// Per-model-instance configuration state, hung off `Composition`'s extra
/// slot. `Default` gives every freshly composed model an empty binding and
/// subscription list with no active publication.
#[derive(Default, Clone)]
pub struct ModelState {
    received_opcodes: Vec<Opcode, MAX_OPCODES_PER_MODEL>,
    bindings: Vec<u16, MAX_BINDINGS_PER_MODEL>,
    subscriptions: Vec<Address, MAX_SUBSCRIPTIONS_PER_MODEL>,
    publication: Option<PublicationDetails>,
}

/// A core (Foundation) model's opcode table, registered so the dispatcher
/// can route device-key traffic straight to it without an App-Key binding
/// check. `callback` is opaque to this crate: it identifies the model
/// instance for whatever embedding code owns the actual state machine.
pub struct CoreModelRegistration {
    pub element_id: u8,
    pub model_identifier: ModelIdentifier,
    opcodes: Vec<Opcode, MAX_CORE_MODEL_OPCODES>,
}

impl CoreModelRegistration {
    pub fn new(element_id: u8, model_identifier: ModelIdentifier) -> Self {
        Self {
            element_id,
            model_identifier,
            opcodes: Vec::new(),
        }
    }

    pub fn with_opcode(mut self, opcode: Opcode) -> Self {
        self.opcodes.push(opcode).ok();
        self
    }

    pub fn accepts(&self, opcode: &Opcode) -> bool {
        self.opcodes.iter().any(|o| o == opcode)
    }
}

pub struct ModelRegistry<const E: usize = 4> {
    primary_address: UnicastAddress,
    composition: Composition<ModelState>,
    core_models: Vec<CoreModelRegistration, MAX_CORE_MODELS>,
}

impl<const E: usize> ModelRegistry<E> {
    pub fn new(primary_address: UnicastAddress, composition: Composition<ModelState>) -> Self {
        Self {
            primary_address,
            composition,
            core_models: Vec::new(),
        }
    }

    pub fn primary_address(&self) -> UnicastAddress {
        self.primary_address
    }

    pub fn composition(&self) -> &Composition<ModelState> {
        &self.composition
    }

    pub fn register_core_model(
        &mut self,
        registration: CoreModelRegistration,
    ) -> Result<(), CoreModelRegistration> {
        self.core_models.push(registration)
    }

    pub fn core_models(&self) -> impl Iterator<Item = &CoreModelRegistration> + '_ {
        self.core_models.iter()
    }

    /// Resolves a unicast destination to the local element index that owns
    /// it, if any.
    pub fn element_of(&self, address: Address) -> Option<u8> {
        match address {
            Address::Unicast(addr) => {
                let base: u16 = self.primary_address.into();
                let target: u16 = addr.into();
                let offset = target.checked_sub(base)?;
                if offset < self.composition.number_of_elements() as u16 {
                    Some(offset as u8)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Resolves a fixed group address (`AllProxies`/`AllFriends`/
    /// `AllRelays`/`AllNodes`) to the element indices it fans out to.
    ///
    /// `AllNodes` reaches every element on the node; the feature-scoped
    /// groups (`AllProxies`/`AllFriends`/`AllRelays`) are only ever relevant
    /// to the primary element's Configuration Server, since the Proxy/
    /// Friend/Relay feature bits this crate tracks (`Features`) are node-
    /// wide rather than per-element.
    pub fn elements_from_fixed_group(&self, group: GroupAddress) -> Vec<u8, 4> {
        let mut out = Vec::new();
        match group {
            GroupAddress::AllNodes => {
                for i in 0..self.composition.number_of_elements() {
                    out.push(i).ok();
                }
            }
            GroupAddress::AllProxies | GroupAddress::AllFriends | GroupAddress::AllRelays => {
                out.push(0).ok();
            }
            GroupAddress::Normal(_) | GroupAddress::RFU(_) => {}
        }
        out
    }

    /// The element's model identifiers, SIG instances first, then vendor —
    /// the order the Access Dispatcher walks an element's instances in.
    pub fn model_identifiers_ordered(&self, elem_id: u8) -> Vec<ModelIdentifier, 8> {
        let mut out = Vec::new();
        let Some(element) = self.composition.elements_iter().nth(elem_id as usize) else {
            return out;
        };
        for m in element.models_iter() {
            if matches!(m.model_identifier, ModelIdentifier::SIG(_)) {
                out.push(m.model_identifier).ok();
            }
        }
        for m in element.models_iter() {
            if matches!(m.model_identifier, ModelIdentifier::Vendor(_, _)) {
                out.push(m.model_identifier).ok();
            }
        }
        out
    }

    pub fn number_of_elements(&self) -> u8 {
        self.composition.number_of_elements()
    }

    fn find_model(&self, elem_id: u8, model_identifier: ModelIdentifier) -> Option<&ModelState> {
        self.composition
            .elements_iter()
            .nth(elem_id as usize)?
            .models_iter()
            .find(|m| m.model_identifier == model_identifier)
            .map(|m| &m.extra)
    }

    fn find_model_mut(
        &mut self,
        elem_id: u8,
        model_identifier: ModelIdentifier,
    ) -> Option<&mut ModelState> {
        self.composition
            .elements_iter_mut()
            .nth(elem_id as usize)?
            .models_iter_mut()
            .find(|m| m.model_identifier == model_identifier)
            .map(|m| &mut m.extra)
    }

    /// Registers an opcode this model instance accepts, populating the
    /// "received-opcode array" the Access Dispatcher consults.
    pub fn register_opcode(
        &mut self,
        elem_id: u8,
        model_identifier: ModelIdentifier,
        opcode: Opcode,
    ) -> Result<(), DriverError> {
        let state = self
            .find_model_mut(elem_id, model_identifier)
            .ok_or(DriverError::InvalidModel)?;
        if !state.received_opcodes.iter().any(|o| *o == opcode) {
            state
                .received_opcodes
                .push(opcode)
                .map_err(|_| DriverError::InsufficientSpace)?;
        }
        Ok(())
    }

    /// Whether `model_identifier` on `elem_id` has registered `opcode` in
    /// its received-opcode array.
    pub fn accepts_opcode(
        &self,
        elem_id: u8,
        model_identifier: ModelIdentifier,
        opcode: &Opcode,
    ) -> bool {
        self.find_model(elem_id, model_identifier)
            .map(|m| m.received_opcodes.iter().any(|o| o == opcode))
            .unwrap_or(false)
    }

    /// Whether `model_identifier` on `elem_id` holds `app_key_index` as one
    /// of its bindings.
    pub fn binding_contains(
        &self,
        elem_id: u8,
        model_identifier: ModelIdentifier,
        app_key_index: u16,
    ) -> bool {
        self.find_model(elem_id, model_identifier)
            .map(|m| m.bindings.contains(&app_key_index))
            .unwrap_or(false)
    }

    /// Whether `model_identifier` on `elem_id` subscribes to `address`.
    /// A `Virtual` address matches by label when `label_uuid` is supplied;
    /// without one, the raw 16-bit virtual address is compared, matching
    /// what a collapsed ingress lookup (no label available) can check.
    pub fn subscriptions_contain(
        &self,
        elem_id: u8,
        model_identifier: ModelIdentifier,
        address: Address,
        label_uuid: Option<LabelUuid>,
    ) -> bool {
        let Some(state) = self.find_model(elem_id, model_identifier) else {
            return false;
        };
        state.subscriptions.iter().any(|sub| match (sub, address) {
            (Address::Virtual(sub_addr), Address::Virtual(addr)) => {
                if let Some(label) = label_uuid {
                    label.virtual_address() == *sub_addr
                } else {
                    *sub_addr == addr
                }
            }
            _ => *sub == address,
        })
    }

    pub fn bind(
        &mut self,
        elem_id: u8,
        model_identifier: ModelIdentifier,
        app_key_index: u16,
    ) -> Result<(), DriverError> {
        let state = self
            .find_model_mut(elem_id, model_identifier)
            .ok_or(DriverError::InvalidModel)?;
        if !state.bindings.contains(&app_key_index) {
            state
                .bindings
                .push(app_key_index)
                .map_err(|_| DriverError::InsufficientSpace)?;
        }
        Ok(())
    }

    pub fn unbind(
        &mut self,
        elem_id: u8,
        model_identifier: ModelIdentifier,
        app_key_index: u16,
    ) -> Result<(), DriverError> {
        let state = self
            .find_model_mut(elem_id, model_identifier)
            .ok_or(DriverError::InvalidModel)?;
        state.bindings.retain(|idx| *idx != app_key_index);
        Ok(())
    }

    pub fn subscribe(
        &mut self,
        elem_id: u8,
        model_identifier: ModelIdentifier,
        address: Address,
    ) -> Result<(), DriverError> {
        let state = self
            .find_model_mut(elem_id, model_identifier)
            .ok_or(DriverError::InvalidModel)?;
        if !state.subscriptions.contains(&address) {
            state
                .subscriptions
                .push(address)
                .map_err(|_| DriverError::InsufficientSpace)?;
        }
        Ok(())
    }

    pub fn unsubscribe(
        &mut self,
        elem_id: u8,
        model_identifier: ModelIdentifier,
        address: Address,
    ) -> Result<(), DriverError> {
        let state = self
            .find_model_mut(elem_id, model_identifier)
            .ok_or(DriverError::InvalidModel)?;
        state.subscriptions.retain(|a| *a != address);
        Ok(())
    }

    pub fn clear_subscriptions(
        &mut self,
        elem_id: u8,
        model_identifier: ModelIdentifier,
    ) -> Result<(), DriverError> {
        let state = self
            .find_model_mut(elem_id, model_identifier)
            .ok_or(DriverError::InvalidModel)?;
        state.subscriptions.clear();
        Ok(())
    }

    pub fn publication(
        &self,
        elem_id: u8,
        model_identifier: ModelIdentifier,
    ) -> Option<&PublicationDetails> {
        self.find_model(elem_id, model_identifier)?
            .publication
            .as_ref()
    }

    pub fn set_publication(
        &mut self,
        elem_id: u8,
        model_identifier: ModelIdentifier,
        details: Option<PublicationDetails>,
    ) -> Result<(), DriverError> {
        let state = self
            .find_model_mut(elem_id, model_identifier)
            .ok_or(DriverError::InvalidModel)?;
        state.publication = details;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btmesh_common::location::Location;
    use btmesh_common::{CompanyIdentifier, ElementDescriptor, ProductIdentifier, VersionIdentifier};

    const ONOFF_SERVER: ModelIdentifier = ModelIdentifier::SIG(0x1000);

    fn registry() -> ModelRegistry {
        let mut composition =
            Composition::new(CompanyIdentifier(0), ProductIdentifier(0), VersionIdentifier(0));
        let mut primary = ElementDescriptor::new(Location::numeric(0));
        primary.add_model(ONOFF_SERVER);
        composition.add_element(primary).ok().unwrap();
        ModelRegistry::new(UnicastAddress::new(0x0100).unwrap(), composition)
    }

    #[test]
    fn element_of_resolves_primary_and_rejects_out_of_range() {
        let reg = registry();
        assert_eq!(
            reg.element_of(Address::Unicast(UnicastAddress::new(0x0100).unwrap())),
            Some(0)
        );
        assert_eq!(
            reg.element_of(Address::Unicast(UnicastAddress::new(0x0101).unwrap())),
            None
        );
        assert_eq!(
            reg.element_of(Address::Unicast(UnicastAddress::new(0x00FF).unwrap())),
            None
        );
    }

    #[test]
    fn bind_and_binding_contains_round_trip() {
        let mut reg = registry();
        assert!(!reg.binding_contains(0, ONOFF_SERVER, 3));
        reg.bind(0, ONOFF_SERVER, 3).unwrap();
        assert!(reg.binding_contains(0, ONOFF_SERVER, 3));
        reg.unbind(0, ONOFF_SERVER, 3).unwrap();
        assert!(!reg.binding_contains(0, ONOFF_SERVER, 3));
    }

    #[test]
    fn subscribe_and_subscriptions_contain_round_trip() {
        let mut reg = registry();
        let group = Address::Group(GroupAddress::Normal(0xC001));
        assert!(!reg.subscriptions_contain(0, ONOFF_SERVER, group, None));
        reg.subscribe(0, ONOFF_SERVER, group).unwrap();
        assert!(reg.subscriptions_contain(0, ONOFF_SERVER, group, None));
        reg.clear_subscriptions(0, ONOFF_SERVER).unwrap();
        assert!(!reg.subscriptions_contain(0, ONOFF_SERVER, group, None));
    }

    #[test]
    fn all_nodes_fans_out_to_every_element_all_relays_only_primary() {
        let reg = registry();
        assert_eq!(
            reg.elements_from_fixed_group(GroupAddress::AllNodes).len(),
            1
        );
        assert_eq!(
            &reg.elements_from_fixed_group(GroupAddress::AllRelays)[..],
            &[0]
        );
    }
}
