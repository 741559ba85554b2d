use crate::foundation::configuration::{ConfigurationMessage, KeyIndex, NetKeyIndex};
use crate::{Message, Status};
use btmesh_common::opcode::Opcode;
use btmesh_common::{opcode, InsufficientBuffer, ParseError};
use core::convert::TryInto;
use heapless::Vec;

opcode!( CONFIG_NETKEY_ADD 0x80, 0x06 );
opcode!( CONFIG_NETKEY_DELETE 0x80, 0x07 );
opcode!( CONFIG_NETKEY_GET 0x80, 0x08 );
opcode!( CONFIG_NETKEY_LIST 0x80, 0x09 );
opcode!( CONFIG_NETKEY_STATUS 0x80, 0x0A );
opcode!( CONFIG_NETKEY_UPDATE 0x80, 0x0B );

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub enum NetKeyMessage {
    Add(NetKeyAddMessage),
    Delete(NetKeyDeleteMessage),
    Get,
    List(NetKeyListMessage),
    Status(NetKeyStatusMessage),
    Update(NetKeyUpdateMessage),
}

impl From<NetKeyMessage> for ConfigurationMessage {
    fn from(inner: NetKeyMessage) -> Self {
        Self::NetKey(inner)
    }
}

impl NetKeyMessage {
    pub fn parse_add(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() == 18 {
            let net_key_index = NetKeyIndex(KeyIndex::parse_one(&parameters[0..=1])?);
            let net_key: [u8; 16] = parameters[2..]
                .try_into()
                .map_err(|_| ParseError::InvalidLength)?;
            Ok(Self::Add(NetKeyAddMessage {
                net_key_index,
                net_key,
            }))
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    pub fn parse_delete(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() == 2 {
            let net_key_index = NetKeyIndex(KeyIndex::parse_one(parameters)?);
            Ok(Self::Delete(NetKeyDeleteMessage { net_key_index }))
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    pub fn parse_get(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.is_empty() {
            Ok(Self::Get)
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    pub fn parse_update(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() == 18 {
            let net_key_index = NetKeyIndex(KeyIndex::parse_one(&parameters[0..=1])?);
            let net_key: [u8; 16] = parameters[2..]
                .try_into()
                .map_err(|_| ParseError::InvalidLength)?;
            Ok(Self::Update(NetKeyUpdateMessage {
                net_key_index,
                net_key,
            }))
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    pub fn parse_status(parameters: &[u8]) -> Result<Self, ParseError> {
        Ok(Self::Status(NetKeyStatusMessage::parse(parameters)?))
    }

    pub fn parse_list(parameters: &[u8]) -> Result<Self, ParseError> {
        Ok(Self::List(NetKeyListMessage::parse(parameters)?))
    }
}

impl Message for NetKeyMessage {
    fn opcode(&self) -> Opcode {
        match self {
            Self::Add(_) => CONFIG_NETKEY_ADD,
            Self::Delete(_) => CONFIG_NETKEY_DELETE,
            Self::Get => CONFIG_NETKEY_GET,
            Self::List(_) => CONFIG_NETKEY_LIST,
            Self::Status(_) => CONFIG_NETKEY_STATUS,
            Self::Update(_) => CONFIG_NETKEY_UPDATE,
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        match self {
            Self::Add(inner) => inner.emit_parameters(xmit),
            Self::Delete(inner) => inner.emit_parameters(xmit),
            Self::Get => Ok(()),
            Self::List(inner) => inner.emit_parameters(xmit),
            Self::Status(inner) => inner.emit_parameters(xmit),
            Self::Update(inner) => inner.emit_parameters(xmit),
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub struct NetKeyAddMessage {
    pub net_key_index: NetKeyIndex,
    pub net_key: [u8; 16],
}

impl NetKeyAddMessage {
    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        self.net_key_index.emit(xmit)?;
        xmit.extend_from_slice(&self.net_key)
            .map_err(|_| InsufficientBuffer)?;
        Ok(())
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub struct NetKeyDeleteMessage {
    pub net_key_index: NetKeyIndex,
}

impl NetKeyDeleteMessage {
    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        self.net_key_index.emit(xmit)
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub struct NetKeyUpdateMessage {
    pub net_key_index: NetKeyIndex,
    pub net_key: [u8; 16],
}

impl NetKeyUpdateMessage {
    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        self.net_key_index.emit(xmit)?;
        xmit.extend_from_slice(&self.net_key)
            .map_err(|_| InsufficientBuffer)?;
        Ok(())
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub struct NetKeyListMessage {
    pub net_key_indexes: Vec<NetKeyIndex, 10>,
}

impl NetKeyListMessage {
    fn parse(parameters: &[u8]) -> Result<Self, ParseError> {
        let mut net_key_indexes = Vec::new();
        let mut chunks = parameters.chunks_exact(3);
        for chunk in &mut chunks {
            let (first, second) = KeyIndex::parse_two(chunk)?;
            net_key_indexes
                .push(NetKeyIndex(first))
                .map_err(|_| ParseError::InsufficientBuffer)?;
            net_key_indexes
                .push(NetKeyIndex(second))
                .map_err(|_| ParseError::InsufficientBuffer)?;
        }
        let remainder = chunks.remainder();
        if remainder.len() == 2 {
            net_key_indexes
                .push(NetKeyIndex(KeyIndex::parse_one(remainder)?))
                .map_err(|_| ParseError::InsufficientBuffer)?;
        } else if !remainder.is_empty() {
            return Err(ParseError::InvalidLength);
        }
        Ok(Self { net_key_indexes })
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        for chunk in self.net_key_indexes.chunks(2) {
            if chunk.len() == 2 {
                KeyIndex::emit_two((&chunk[0].0, &chunk[1].0), xmit)?;
            } else {
                KeyIndex::emit_one(&chunk[0].0, xmit)?;
            }
        }
        Ok(())
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub struct NetKeyStatusMessage {
    pub status: Status,
    pub net_key_index: NetKeyIndex,
}

impl NetKeyStatusMessage {
    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        xmit.push(self.status as u8)
            .map_err(|_| InsufficientBuffer)?;
        self.net_key_index.emit(xmit)?;
        Ok(())
    }

    fn parse(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() == 3 {
            let status: Status = parameters[0].try_into()?;
            let net_key_index = NetKeyIndex(KeyIndex::parse_one(&parameters[1..=2])?);
            Ok(Self {
                status,
                net_key_index,
            })
        } else {
            Err(ParseError::InvalidLength)
        }
    }
}
