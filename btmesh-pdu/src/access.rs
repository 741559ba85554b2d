use btmesh_common::address::{Address, LabelUuid, UnicastAddress};
use btmesh_common::opcode::Opcode;
use btmesh_common::{InsufficientBuffer, ParseError, Ttl};
use heapless::Vec;

/// Largest parameter payload a single (unsegmented-or-reassembled) Access
/// PDU can carry, per the Bluetooth Mesh Profile's upper-transport MTU.
pub const MAX_ACCESS_PARAMETERS: usize = 380;

/// Distinguishes the three key spaces an inbound/outbound Access message can
/// be secured with. `LocalDeviceKey` and `RemoteDeviceKey` both carry
/// Configuration-model traffic; the Access Dispatcher treats both as a
/// single "device key" class for routing purposes (see `is_device_key`).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyIndexKind {
    Application(u16),
    LocalDeviceKey,
    RemoteDeviceKey,
}

impl KeyIndexKind {
    pub fn is_device_key(&self) -> bool {
        matches!(self, Self::LocalDeviceKey | Self::RemoteDeviceKey)
    }
}

/// Metadata accompanying a decrypted Access PDU, populated by the Upper
/// Transport (an external collaborator) and forwarded verbatim by the
/// Access Dispatcher to the resolved model handler.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccessMeta {
    pub src: UnicastAddress,
    pub dst: Address,
    pub label_uuid: Option<LabelUuid>,
    pub ttl: Ttl,
    pub net_key_index: u16,
    pub app_key_index: KeyIndexKind,
    /// Cleared for PDUs that arrived on a Fixed-Group / subscription
    /// collapse rather than a direct unicast destination.
    pub recv_on_unicast: bool,
}

/// A decrypted Access-layer PDU: opcode plus the parameters that follow it.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccessPdu {
    opcode: Opcode,
    parameters: Vec<u8, MAX_ACCESS_PARAMETERS>,
    meta: AccessMeta,
}

impl AccessPdu {
    pub fn new(opcode: Opcode, parameters: &[u8], meta: AccessMeta) -> Result<Self, ParseError> {
        Ok(Self {
            opcode,
            parameters: Vec::from_slice(parameters).map_err(|_| ParseError::InsufficientBuffer)?,
            meta,
        })
    }

    /// Splits a raw decrypted PDU into opcode + parameters, per the 1/2/3
    /// octet opcode-length prefix.
    pub fn parse(data: &[u8], meta: AccessMeta) -> Result<Self, ParseError> {
        let (opcode, parameters) = Opcode::split(data).ok_or(ParseError::InvalidPDUFormat)?;
        Self::new(opcode, parameters, meta)
    }

    pub fn emit<const N: usize>(&self, xmit: &mut Vec<u8, N>) -> Result<(), InsufficientBuffer> {
        self.opcode.emit(xmit)?;
        xmit.extend_from_slice(&self.parameters)
            .map_err(|_| InsufficientBuffer)?;
        Ok(())
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn parameters(&self) -> &[u8] {
        &self.parameters
    }

    pub fn meta(&self) -> &AccessMeta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut AccessMeta {
        &mut self.meta
    }
}
