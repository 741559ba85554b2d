use crate::foundation::configuration::{ConfigurationMessage, KeyIndex, NetKeyIndex};
use crate::Message;
use btmesh_common::address::{Address, UnicastAddress};
use btmesh_common::opcode::Opcode;
use btmesh_common::{opcode, Features, InsufficientBuffer, ParseError, Ttl};
use core::convert::TryInto;
use heapless::Vec;

opcode!( CONFIG_HEARTBEAT_PUBLICATION_GET 0x80, 0x38 );
opcode!( CONFIG_HEARTBEAT_PUBLICATION_SET 0x80, 0x39 );
opcode!( CONFIG_HEARTBEAT_PUBLICATION_STATUS 0x06 );

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub struct HeartbeatPublication {
    pub destination: Address,
    pub count_log: u8,
    pub period_log: u8,
    pub ttl: Ttl,
    pub features: Features,
    pub net_key_index: NetKeyIndex,
}

impl HeartbeatPublication {
    fn parse(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() < 9 {
            return Err(ParseError::InvalidLength);
        }
        let destination = Address::parse([parameters[1], parameters[0]]);
        let count_log = parameters[2];
        let period_log = parameters[3];
        let ttl = Ttl::parse(parameters[4])?;
        let features = Features::parse(&parameters[5..=6])?;
        let net_key_index = NetKeyIndex(KeyIndex::parse_one(&parameters[7..=8])?);
        Ok(Self {
            destination,
            count_log,
            period_log,
            ttl,
            features,
            net_key_index,
        })
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        let dest_bytes = self.destination.as_bytes();
        xmit.push(dest_bytes[1]).map_err(|_| InsufficientBuffer)?;
        xmit.push(dest_bytes[0]).map_err(|_| InsufficientBuffer)?;
        xmit.push(self.count_log).map_err(|_| InsufficientBuffer)?;
        xmit.push(self.period_log).map_err(|_| InsufficientBuffer)?;
        xmit.push(self.ttl.value())
            .map_err(|_| InsufficientBuffer)?;
        self.features.emit(xmit)?;
        self.net_key_index.emit(xmit)?;
        Ok(())
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub struct HeartbeatPublicationSetMessage {
    pub destination: UnicastAddress,
    pub count_log: u8,
    pub period_log: u8,
    pub ttl: Ttl,
    pub features: Features,
    pub net_key_index: NetKeyIndex,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub struct HeartbeatPublicationStatusMessage {
    pub status: crate::Status,
    pub publication: HeartbeatPublication,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub enum HeartbeatPublicationMessage {
    Get,
    Set(HeartbeatPublicationSetMessage),
    Status(HeartbeatPublicationStatusMessage),
}

impl From<HeartbeatPublicationMessage> for ConfigurationMessage {
    fn from(inner: HeartbeatPublicationMessage) -> Self {
        ConfigurationMessage::HeartbeatPublication(inner)
    }
}

impl Message for HeartbeatPublicationMessage {
    fn opcode(&self) -> Opcode {
        match self {
            Self::Get => CONFIG_HEARTBEAT_PUBLICATION_GET,
            Self::Set(_) => CONFIG_HEARTBEAT_PUBLICATION_SET,
            Self::Status(_) => CONFIG_HEARTBEAT_PUBLICATION_STATUS,
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        match self {
            Self::Get => Ok(()),
            Self::Set(inner) => {
                let addr_bytes = inner.destination.as_bytes();
                xmit.push(addr_bytes[1]).map_err(|_| InsufficientBuffer)?;
                xmit.push(addr_bytes[0]).map_err(|_| InsufficientBuffer)?;
                xmit.push(inner.count_log).map_err(|_| InsufficientBuffer)?;
                xmit.push(inner.period_log)
                    .map_err(|_| InsufficientBuffer)?;
                xmit.push(inner.ttl.value())
                    .map_err(|_| InsufficientBuffer)?;
                inner.features.emit(xmit)?;
                inner.net_key_index.emit(xmit)?;
                Ok(())
            }
            Self::Status(inner) => {
                xmit.push(inner.status as u8)
                    .map_err(|_| InsufficientBuffer)?;
                inner.publication.emit_parameters(xmit)
            }
        }
    }
}

impl HeartbeatPublicationMessage {
    pub fn parse_get(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.is_empty() {
            Ok(Self::Get)
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    pub fn parse_set(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() != 9 {
            return Err(ParseError::InvalidLength);
        }
        let destination = UnicastAddress::parse([parameters[1], parameters[0]])?;
        let count_log = parameters[2];
        let period_log = parameters[3];
        let ttl = Ttl::parse(parameters[4])?;
        let features = Features::parse(&parameters[5..=6])?;
        let net_key_index = NetKeyIndex(KeyIndex::parse_one(&parameters[7..=8])?);
        Ok(Self::Set(HeartbeatPublicationSetMessage {
            destination,
            count_log,
            period_log,
            ttl,
            features,
            net_key_index,
        }))
    }

    pub fn parse_status(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.is_empty() {
            return Err(ParseError::InvalidLength);
        }
        let status: crate::Status = parameters[0].try_into()?;
        let publication = HeartbeatPublication::parse(&parameters[1..])?;
        Ok(Self::Status(HeartbeatPublicationStatusMessage {
            status,
            publication,
        }))
    }
}
