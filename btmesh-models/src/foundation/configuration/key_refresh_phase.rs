use crate::foundation::configuration::{ConfigurationMessage, KeyIndex, NetKeyIndex};
use crate::{Message, Status};
use btmesh_common::opcode::Opcode;
use btmesh_common::{opcode, InsufficientBuffer, ParseError};
use core::convert::TryInto;
use heapless::Vec;

opcode!( CONFIG_KEY_REFRESH_PHASE_GET 0x80, 0x15 );
opcode!( CONFIG_KEY_REFRESH_PHASE_SET 0x80, 0x16 );
opcode!( CONFIG_KEY_REFRESH_PHASE_STATUS 0x80, 0x17 );

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyRefreshPhase {
    Normal = 0x00,
    First = 0x01,
    Second = 0x02,
    Third = 0x03,
}

impl KeyRefreshPhase {
    fn parse(value: u8) -> Result<Self, ParseError> {
        match value {
            0x00 => Ok(Self::Normal),
            0x01 => Ok(Self::First),
            0x02 => Ok(Self::Second),
            0x03 => Ok(Self::Third),
            _ => Err(ParseError::InvalidValue),
        }
    }
}

/// The transition requested by a Key Refresh Phase Set message.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyRefreshTransition {
    Second = 0x01,
    Third = 0x02,
}

impl KeyRefreshTransition {
    fn parse(value: u8) -> Result<Self, ParseError> {
        match value {
            0x01 => Ok(Self::Second),
            0x02 => Ok(Self::Third),
            _ => Err(ParseError::InvalidValue),
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub enum KeyRefreshPhaseMessage {
    Get(NetKeyIndex),
    Set(NetKeyIndex, KeyRefreshTransition),
    Status(Status, NetKeyIndex, KeyRefreshPhase),
}

impl From<KeyRefreshPhaseMessage> for ConfigurationMessage {
    fn from(inner: KeyRefreshPhaseMessage) -> Self {
        ConfigurationMessage::KeyRefreshPhase(inner)
    }
}

impl Message for KeyRefreshPhaseMessage {
    fn opcode(&self) -> Opcode {
        match self {
            Self::Get(..) => CONFIG_KEY_REFRESH_PHASE_GET,
            Self::Set(..) => CONFIG_KEY_REFRESH_PHASE_SET,
            Self::Status(..) => CONFIG_KEY_REFRESH_PHASE_STATUS,
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        match self {
            Self::Get(net_key_index) => net_key_index.emit(xmit),
            Self::Set(net_key_index, transition) => {
                net_key_index.emit(xmit)?;
                xmit.push(*transition as u8)
                    .map_err(|_| InsufficientBuffer)
            }
            Self::Status(status, net_key_index, phase) => {
                xmit.push(*status as u8).map_err(|_| InsufficientBuffer)?;
                net_key_index.emit(xmit)?;
                xmit.push(*phase as u8).map_err(|_| InsufficientBuffer)
            }
        }
    }
}

impl KeyRefreshPhaseMessage {
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
            let transition = KeyRefreshTransition::parse(parameters[2])?;
            Ok(Self::Set(net_key_index, transition))
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    pub fn parse_status(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() == 4 {
            let status: Status = parameters[0].try_into()?;
            let net_key_index = NetKeyIndex(KeyIndex::parse_one(&parameters[1..=2])?);
            let phase = KeyRefreshPhase::parse(parameters[3])?;
            Ok(Self::Status(status, net_key_index, phase))
        } else {
            Err(ParseError::InvalidLength)
        }
    }
}
