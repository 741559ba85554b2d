use crate::foundation::configuration::ConfigurationMessage;
use crate::{Message, Status};
use btmesh_common::address::{Address, UnicastAddress};
use btmesh_common::opcode::Opcode;
use btmesh_common::{opcode, InsufficientBuffer, ParseError};
use core::convert::TryInto;
use heapless::Vec;

opcode!( CONFIG_HEARTBEAT_SUBSCRIPTION_GET 0x80, 0x3A );
opcode!( CONFIG_HEARTBEAT_SUBSCRIPTION_SET 0x80, 0x3B );
opcode!( CONFIG_HEARTBEAT_SUBSCRIPTION_STATUS 0x80, 0x3C );

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub struct HeartbeatSubscriptionSetMessage {
    pub source: UnicastAddress,
    pub destination: Address,
    pub period_log: u8,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub struct HeartbeatSubscriptionStatusMessage {
    pub status: Status,
    pub source: Address,
    pub destination: Address,
    pub period_log: u8,
    pub count_log: u8,
    pub min_hops: u8,
    pub max_hops: u8,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub enum HeartbeatSubscriptionMessage {
    Get,
    Set(HeartbeatSubscriptionSetMessage),
    Status(HeartbeatSubscriptionStatusMessage),
}

impl From<HeartbeatSubscriptionMessage> for ConfigurationMessage {
    fn from(inner: HeartbeatSubscriptionMessage) -> Self {
        ConfigurationMessage::HeartbeatSubscription(inner)
    }
}

impl Message for HeartbeatSubscriptionMessage {
    fn opcode(&self) -> Opcode {
        match self {
            Self::Get => CONFIG_HEARTBEAT_SUBSCRIPTION_GET,
            Self::Set(_) => CONFIG_HEARTBEAT_SUBSCRIPTION_SET,
            Self::Status(_) => CONFIG_HEARTBEAT_SUBSCRIPTION_STATUS,
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        match self {
            Self::Get => Ok(()),
            Self::Set(inner) => {
                let src_bytes = inner.source.as_bytes();
                xmit.push(src_bytes[1]).map_err(|_| InsufficientBuffer)?;
                xmit.push(src_bytes[0]).map_err(|_| InsufficientBuffer)?;
                let dst_bytes = inner.destination.as_bytes();
                xmit.push(dst_bytes[1]).map_err(|_| InsufficientBuffer)?;
                xmit.push(dst_bytes[0]).map_err(|_| InsufficientBuffer)?;
                xmit.push(inner.period_log).map_err(|_| InsufficientBuffer)
            }
            Self::Status(inner) => {
                xmit.push(inner.status as u8)
                    .map_err(|_| InsufficientBuffer)?;
                let src_bytes = inner.source.as_bytes();
                xmit.push(src_bytes[1]).map_err(|_| InsufficientBuffer)?;
                xmit.push(src_bytes[0]).map_err(|_| InsufficientBuffer)?;
                let dst_bytes = inner.destination.as_bytes();
                xmit.push(dst_bytes[1]).map_err(|_| InsufficientBuffer)?;
                xmit.push(dst_bytes[0]).map_err(|_| InsufficientBuffer)?;
                xmit.push(inner.period_log).map_err(|_| InsufficientBuffer)?;
                xmit.push(inner.count_log).map_err(|_| InsufficientBuffer)?;
                xmit.push(inner.min_hops).map_err(|_| InsufficientBuffer)?;
                xmit.push(inner.max_hops).map_err(|_| InsufficientBuffer)
            }
        }
    }
}

impl HeartbeatSubscriptionMessage {
    pub fn parse_get(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.is_empty() {
            Ok(Self::Get)
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    pub fn parse_set(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() != 5 {
            return Err(ParseError::InvalidLength);
        }
        let source = UnicastAddress::parse([parameters[1], parameters[0]])?;
        let destination = Address::parse([parameters[3], parameters[2]]);
        let period_log = parameters[4];
        Ok(Self::Set(HeartbeatSubscriptionSetMessage {
            source,
            destination,
            period_log,
        }))
    }

    pub fn parse_status(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() != 9 {
            return Err(ParseError::InvalidLength);
        }
        let status: Status = parameters[0].try_into()?;
        let source = Address::parse([parameters[2], parameters[1]]);
        let destination = Address::parse([parameters[4], parameters[3]]);
        let period_log = parameters[5];
        let count_log = parameters[6];
        let min_hops = parameters[7];
        let max_hops = parameters[8];
        Ok(Self::Status(HeartbeatSubscriptionStatusMessage {
            status,
            source,
            destination,
            period_log,
            count_log,
            min_hops,
            max_hops,
        }))
    }
}
