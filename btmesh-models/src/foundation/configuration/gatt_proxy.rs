use crate::foundation::configuration::ConfigurationMessage;
use crate::Message;
use btmesh_common::opcode::Opcode;
use btmesh_common::{opcode, InsufficientBuffer, ParseError};
use heapless::Vec;

opcode!( CONFIG_GATT_PROXY_GET 0x80, 0x12 );
opcode!( CONFIG_GATT_PROXY_SET 0x80, 0x13 );
opcode!( CONFIG_GATT_PROXY_STATUS 0x80, 0x14 );

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub enum GattProxyMessage {
    Get,
    Set(bool),
    Status(bool),
}

impl From<GattProxyMessage> for ConfigurationMessage {
    fn from(inner: GattProxyMessage) -> Self {
        ConfigurationMessage::GattProxy(inner)
    }
}

impl Message for GattProxyMessage {
    fn opcode(&self) -> Opcode {
        match self {
            Self::Get => CONFIG_GATT_PROXY_GET,
            Self::Set(_) => CONFIG_GATT_PROXY_SET,
            Self::Status(_) => CONFIG_GATT_PROXY_STATUS,
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        match self {
            Self::Get => {}
            Self::Set(val) | Self::Status(val) => xmit
                .push(if *val { 1 } else { 0 })
                .map_err(|_| InsufficientBuffer)?,
        }
        Ok(())
    }
}

impl GattProxyMessage {
    pub fn parse_get(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.is_empty() {
            Ok(Self::Get)
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    pub fn parse_set(parameters: &[u8]) -> Result<Self, ParseError> {
        Ok(Self::Set(parse_bool(parameters)?))
    }

    pub fn parse_status(parameters: &[u8]) -> Result<Self, ParseError> {
        Ok(Self::Status(parse_bool(parameters)?))
    }
}

fn parse_bool(parameters: &[u8]) -> Result<bool, ParseError> {
    if parameters.len() != 1 {
        return Err(ParseError::InvalidLength);
    }
    match parameters[0] {
        0x00 => Ok(false),
        0x01 => Ok(true),
        _ => Err(ParseError::InvalidValue),
    }
}
