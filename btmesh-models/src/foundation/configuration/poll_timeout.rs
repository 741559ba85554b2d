use crate::foundation::configuration::ConfigurationMessage;
use crate::Message;
use btmesh_common::address::UnicastAddress;
use btmesh_common::opcode::Opcode;
use btmesh_common::{opcode, InsufficientBuffer, ParseError};
use heapless::Vec;

opcode!( CONFIG_LOW_POWER_NODE_POLLTIMEOUT_GET 0x80, 0x2D );
opcode!( CONFIG_LOW_POWER_NODE_POLLTIMEOUT_STATUS 0x80, 0x2E );

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub enum PollTimeoutMessage {
    Get(UnicastAddress),
    Status(UnicastAddress, u32),
}

impl From<PollTimeoutMessage> for ConfigurationMessage {
    fn from(inner: PollTimeoutMessage) -> Self {
        ConfigurationMessage::PollTimeout(inner)
    }
}

impl Message for PollTimeoutMessage {
    fn opcode(&self) -> Opcode {
        match self {
            Self::Get(_) => CONFIG_LOW_POWER_NODE_POLLTIMEOUT_GET,
            Self::Status(..) => CONFIG_LOW_POWER_NODE_POLLTIMEOUT_STATUS,
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        match self {
            Self::Get(lpn_address) => {
                let bytes = lpn_address.as_bytes();
                xmit.push(bytes[1]).map_err(|_| InsufficientBuffer)?;
                xmit.push(bytes[0]).map_err(|_| InsufficientBuffer)
            }
            Self::Status(lpn_address, poll_timeout) => {
                let bytes = lpn_address.as_bytes();
                xmit.push(bytes[1]).map_err(|_| InsufficientBuffer)?;
                xmit.push(bytes[0]).map_err(|_| InsufficientBuffer)?;
                let timeout_bytes = poll_timeout.to_le_bytes();
                xmit.extend_from_slice(&timeout_bytes[0..=2])
                    .map_err(|_| InsufficientBuffer)
            }
        }
    }
}

impl PollTimeoutMessage {
    pub fn parse_get(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() == 2 {
            Ok(Self::Get(UnicastAddress::parse([
                parameters[1],
                parameters[0],
            ])?))
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    pub fn parse_status(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() == 5 {
            let lpn_address = UnicastAddress::parse([parameters[1], parameters[0]])?;
            let poll_timeout =
                u32::from_le_bytes([parameters[2], parameters[3], parameters[4], 0]);
            Ok(Self::Status(lpn_address, poll_timeout))
        } else {
            Err(ParseError::InvalidLength)
        }
    }
}
