use crate::foundation::configuration::{ConfigurationMessage, KeyIndex, NetKeyIndex};
use crate::{Message, Status};
use btmesh_common::opcode::Opcode;
use btmesh_common::{opcode, InsufficientBuffer, ParseError};
use core::convert::TryInto;
use heapless::Vec;

opcode!( CONFIG_NODE_IDENTITY_GET 0x80, 0x46 );
opcode!( CONFIG_NODE_IDENTITY_SET 0x80, 0x47 );
opcode!( CONFIG_NODE_IDENTITY_STATUS 0x80, 0x48 );

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdentityState {
    Stopped = 0x00,
    Running = 0x01,
}

impl IdentityState {
    fn parse(value: u8) -> Result<Self, ParseError> {
        match value {
            0x00 => Ok(Self::Stopped),
            0x01 => Ok(Self::Running),
            _ => Err(ParseError::InvalidValue),
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub enum NodeIdentityMessage {
    Get(NetKeyIndex),
    Set(NetKeyIndex, IdentityState),
    Status(Status, NetKeyIndex, IdentityState),
}

impl From<NodeIdentityMessage> for ConfigurationMessage {
    fn from(inner: NodeIdentityMessage) -> Self {
        ConfigurationMessage::NodeIdentity(inner)
    }
}

impl Message for NodeIdentityMessage {
    fn opcode(&self) -> Opcode {
        match self {
            Self::Get(..) => CONFIG_NODE_IDENTITY_GET,
            Self::Set(..) => CONFIG_NODE_IDENTITY_SET,
            Self::Status(..) => CONFIG_NODE_IDENTITY_STATUS,
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        match self {
            Self::Get(net_key_index) => net_key_index.emit(xmit),
            Self::Set(net_key_index, state) => {
                net_key_index.emit(xmit)?;
                xmit.push(*state as u8).map_err(|_| InsufficientBuffer)
            }
            Self::Status(status, net_key_index, state) => {
                xmit.push(*status as u8).map_err(|_| InsufficientBuffer)?;
                net_key_index.emit(xmit)?;
                xmit.push(*state as u8).map_err(|_| InsufficientBuffer)
            }
        }
    }
}

impl NodeIdentityMessage {
    pub fn parse_get(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() == 2 {
            Ok(Self::Get(NetKeyIndex(KeyIndex::parse_one(parameters)?)))
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    pub fn parse_set(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() == 3 {
            let net_key_index = NetKeyIndex(KeyIndex::parse_one(&parameters[0..=1])?);
            let state = IdentityState::parse(parameters[2])?;
            Ok(Self::Set(net_key_index, state))
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    pub fn parse_status(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() == 4 {
            let status: Status = parameters[0].try_into()?;
            let net_key_index = NetKeyIndex(KeyIndex::parse_one(&parameters[1..=2])?);
            let state = IdentityState::parse(parameters[3])?;
            Ok(Self::Status(status, net_key_index, state))
        } else {
            Err(ParseError::InvalidLength)
        }
    }
}
