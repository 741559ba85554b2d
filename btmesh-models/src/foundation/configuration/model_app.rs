use crate::foundation::configuration::{AppKeyIndex, ConfigurationMessage, KeyIndex};
use crate::{Message, Status};
use btmesh_common::address::UnicastAddress;
use btmesh_common::opcode::Opcode;
use btmesh_common::{opcode, InsufficientBuffer, ModelIdentifier, ParseError};
use core::convert::TryInto;
use heapless::Vec;

opcode!( CONFIG_MODEL_APP_BIND 0x80, 0x3D);
opcode!( CONFIG_MODEL_APP_STATUS 0x80, 0x3E);
opcode!( CONFIG_MODEL_APP_UNBIND 0x80, 0x3F);
opcode!( CONFIG_MODEL_APP_GET 0x80, 0x4B);
opcode!( CONFIG_MODEL_APP_LIST 0x80, 0x4C);

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub enum ModelAppMessage {
    Bind(ModelAppPayload),
    Status(ModelAppStatusMessage),
    Unbind(ModelAppPayload),
    Get(ModelAppGetMessage),
    List(ModelAppListMessage),
}

impl From<ModelAppMessage> for ConfigurationMessage {
    fn from(inner: ModelAppMessage) -> Self {
        ConfigurationMessage::ModelApp(inner)
    }
}

impl ModelAppMessage {
    pub fn parse_bind(parameters: &[u8]) -> Result<Self, ParseError> {
        Ok(Self::Bind(ModelAppPayload::parse(parameters)?))
    }

    pub fn parse_unbind(parameters: &[u8]) -> Result<Self, ParseError> {
        Ok(Self::Unbind(ModelAppPayload::parse(parameters)?))
    }

    pub fn parse_status(parameters: &[u8]) -> Result<Self, ParseError> {
        Ok(Self::Status(ModelAppStatusMessage::parse(parameters)?))
    }

    pub fn parse_get(parameters: &[u8]) -> Result<Self, ParseError> {
        Ok(Self::Get(ModelAppGetMessage::parse(parameters)?))
    }

    pub fn parse_list(parameters: &[u8]) -> Result<Self, ParseError> {
        Ok(Self::List(ModelAppListMessage::parse(parameters)?))
    }
}

impl Message for ModelAppMessage {
    fn opcode(&self) -> Opcode {
        match self {
            Self::Bind(_) => CONFIG_MODEL_APP_BIND,
            Self::Status(_) => CONFIG_MODEL_APP_STATUS,
            Self::Unbind(_) => CONFIG_MODEL_APP_UNBIND,
            Self::Get(_) => CONFIG_MODEL_APP_GET,
            Self::List(_) => CONFIG_MODEL_APP_LIST,
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        match self {
            ModelAppMessage::Bind(inner) => inner.emit_parameters(xmit),
            ModelAppMessage::Status(inner) => inner.emit_parameters(xmit),
            ModelAppMessage::Unbind(inner) => inner.emit_parameters(xmit),
            ModelAppMessage::Get(inner) => inner.emit_parameters(xmit),
            ModelAppMessage::List(inner) => inner.emit_parameters(xmit),
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub struct ModelAppGetMessage {
    pub element_address: UnicastAddress,
    pub model_identifier: ModelIdentifier,
}

impl ModelAppGetMessage {
    fn parse(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() >= 4 {
            let element_address = UnicastAddress::parse([parameters[1], parameters[0]])?;
            let model_identifier = ModelIdentifier::parse(&parameters[2..])?;
            Ok(Self {
                element_address,
                model_identifier,
            })
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        let addr_bytes = self.element_address.as_bytes();
        xmit.push(addr_bytes[1]).map_err(|_| InsufficientBuffer)?;
        xmit.push(addr_bytes[0]).map_err(|_| InsufficientBuffer)?;
        self.model_identifier.emit(xmit)?;
        Ok(())
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub struct ModelAppListMessage {
    pub status: Status,
    pub element_address: UnicastAddress,
    pub model_identifier: ModelIdentifier,
    pub app_key_indexes: Vec<AppKeyIndex, 10>,
}

impl ModelAppListMessage {
    fn parse(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() < 5 {
            return Err(ParseError::InvalidLength);
        }
        let status: Status = parameters[0].try_into()?;
        let element_address = UnicastAddress::parse([parameters[2], parameters[1]])?;
        // The trailing AppKeyIndex list packs two indexes per three bytes, so its
        // length is always 0 or 2 (mod 3). That's enough to disambiguate whether
        // the model identifier in between is a 2-octet SIG id or a 4-octet vendor id.
        let sig_tail_len = parameters.len().checked_sub(5);
        let vendor_tail_len = parameters.len().checked_sub(7);
        let (model_identifier, indexes) = match (sig_tail_len, vendor_tail_len) {
            (Some(sig_len), Some(vendor_len)) if sig_len % 3 != 0 && sig_len % 3 != 2 => {
                let _ = vendor_len;
                (ModelIdentifier::parse(&parameters[3..7])?, &parameters[7..])
            }
            (Some(_), _) => (ModelIdentifier::parse(&parameters[3..5])?, &parameters[5..]),
            (None, Some(_)) => (ModelIdentifier::parse(&parameters[3..7])?, &parameters[7..]),
            (None, None) => return Err(ParseError::InvalidLength),
        };

        let mut app_key_indexes = Vec::new();
        let mut chunks = indexes.chunks_exact(3);
        for chunk in &mut chunks {
            let (first, second) = KeyIndex::parse_two(chunk)?;
            app_key_indexes
                .push(AppKeyIndex(first))
                .map_err(|_| ParseError::InsufficientBuffer)?;
            app_key_indexes
                .push(AppKeyIndex(second))
                .map_err(|_| ParseError::InsufficientBuffer)?;
        }
        let remainder = chunks.remainder();
        if remainder.len() == 2 {
            app_key_indexes
                .push(AppKeyIndex(KeyIndex::parse_one(remainder)?))
                .map_err(|_| ParseError::InsufficientBuffer)?;
        } else if !remainder.is_empty() {
            return Err(ParseError::InvalidLength);
        }

        Ok(Self {
            status,
            element_address,
            model_identifier,
            app_key_indexes,
        })
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        xmit.push(self.status as u8)
            .map_err(|_| InsufficientBuffer)?;
        let addr_bytes = self.element_address.as_bytes();
        xmit.push(addr_bytes[1]).map_err(|_| InsufficientBuffer)?;
        xmit.push(addr_bytes[0]).map_err(|_| InsufficientBuffer)?;
        self.model_identifier.emit(xmit)?;
        for chunk in self.app_key_indexes.chunks(2) {
            if chunk.len() == 2 {
                KeyIndex::emit_two((&chunk[0].0, &chunk[1].0), xmit)?;
            } else {
                KeyIndex::emit_one(&chunk[0].0, xmit)?;
            }
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModelAppPayload {
    pub element_address: UnicastAddress,
    pub app_key_index: AppKeyIndex,
    pub model_identifier: ModelIdentifier,
}

impl ModelAppPayload {
    fn parse(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() >= 6 {
            // yes, swapped, because in *this* case it's little-endian
            let element_address = UnicastAddress::parse([parameters[1], parameters[0]])
                .map_err(|_| ParseError::InvalidValue)?;
            let app_key_index = AppKeyIndex(KeyIndex::parse_one(&parameters[2..=3])?);
            let model_identifier = ModelIdentifier::parse(&parameters[4..])?;
            Ok(Self {
                element_address,
                app_key_index,
                model_identifier,
            })
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        let addr_bytes = self.element_address.as_bytes();
        xmit.push(addr_bytes[1]).map_err(|_| InsufficientBuffer)?;
        xmit.push(addr_bytes[0]).map_err(|_| InsufficientBuffer)?;
        self.app_key_index.emit(xmit)?;
        self.model_identifier.emit(xmit)?;
        Ok(())
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub struct ModelAppStatusMessage {
    pub status: Status,
    pub payload: ModelAppPayload,
}

impl ModelAppStatusMessage {
    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        xmit.push(self.status as u8)
            .map_err(|_| InsufficientBuffer)?;
        self.payload.emit_parameters(xmit)?;
        Ok(())
    }

    fn parse(parameters: &[u8]) -> Result<Self, ParseError> {
        let status: Status = parameters[0].try_into()?;
        let payload: ModelAppPayload = ModelAppPayload::parse(&parameters[1..])?;
        Ok(Self { status, payload })
    }
}
