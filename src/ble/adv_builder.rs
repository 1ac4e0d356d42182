//! Legacy advertising payload builder.
//!
//! Produces the AD structures `[len][type][data...]` for flags, the list
//! of locally hosted 16-bit services, and the device name. The payload is
//! rebuilt from scratch whenever advertising is (re)configured.

use heapless::Vec;

use crate::ble::{ad_flags, ad_type, adv_parser};
use crate::config::LEGACY_ADV_MAX_SIZE;
use crate::error::Error;

/// Maximum number of 16-bit service UUIDs the builder accepts.
pub const MAX_SERVICE_UUIDS: usize = 8;

/// Encoded legacy advertising data (at most 31 bytes).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingPayload {
    bytes: Vec<u8, LEGACY_ADV_MAX_SIZE>,
}

impl AdvertisingPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Flags octet, if present.
    pub fn flags(&self) -> Option<u8> {
        adv_parser::extract_flags(&self.bytes)
    }

    /// All 16-bit service UUIDs listed in the payload.
    pub fn service_uuids(&self) -> Vec<u16, MAX_SERVICE_UUIDS> {
        adv_parser::service_uuids_16(&self.bytes)
    }

    /// Complete or shortened local name, if present.
    pub fn local_name(&self) -> Option<&str> {
        adv_parser::local_name(&self.bytes)
    }
}

/// Builder for [`AdvertisingPayload`].
///
/// Fields are emitted in a fixed order (flags, services, name) no matter
/// in which order they were set; setting a field twice replaces it.
#[derive(Clone, Debug, Default)]
pub struct AdvertisingDataBuilder<'a> {
    flags: Option<u8>,
    services: Vec<u16, MAX_SERVICE_UUIDS>,
    complete_service_list: bool,
    name: Option<&'a str>,
}

impl<'a> AdvertisingDataBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// LE General Discoverable, BR/EDR not supported.
    pub fn set_flags(mut self) -> Self {
        self.flags = Some(ad_flags::LE_GENERAL_DISCOVERABLE | ad_flags::BR_EDR_NOT_SUPPORTED);
        self
    }

    /// Complete list of locally hosted 16-bit services. UUIDs beyond
    /// [`MAX_SERVICE_UUIDS`] are dropped and the list marked incomplete.
    pub fn set_local_service_list(mut self, uuids: &[u16]) -> Self {
        self.services.clear();
        self.complete_service_list = true;
        for &uuid in uuids {
            if self.services.push(uuid).is_err() {
                self.complete_service_list = false;
                break;
            }
        }
        self
    }

    /// Complete local name (no terminator on the wire).
    pub fn set_name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    /// Number of bytes [`build`](Self::build) would produce.
    pub fn encoded_len(&self) -> usize {
        let flags = if self.flags.is_some() { 3 } else { 0 };
        let services = if self.services.is_empty() {
            0
        } else {
            2 + 2 * self.services.len()
        };
        let name = self.name.map_or(0, |n| 2 + n.len());
        flags + services + name
    }

    pub fn build(&self) -> Result<AdvertisingPayload, Error> {
        let required = self.encoded_len();
        if required > LEGACY_ADV_MAX_SIZE {
            return Err(Error::PayloadOversize {
                required,
                max: LEGACY_ADV_MAX_SIZE,
            });
        }

        let mut bytes: Vec<u8, LEGACY_ADV_MAX_SIZE> = Vec::new();

        if let Some(flags) = self.flags {
            push_structure(&mut bytes, ad_type::FLAGS, &[flags])?;
        }

        if !self.services.is_empty() {
            let mut uuid_bytes: Vec<u8, { 2 * MAX_SERVICE_UUIDS }> = Vec::new();
            for uuid in &self.services {
                uuid_bytes
                    .extend_from_slice(&uuid.to_le_bytes())
                    .map_err(|_| oversize(required))?;
            }
            let kind = if self.complete_service_list {
                ad_type::COMPLETE_16BIT_UUIDS
            } else {
                ad_type::INCOMPLETE_16BIT_UUIDS
            };
            push_structure(&mut bytes, kind, &uuid_bytes)?;
        }

        if let Some(name) = self.name {
            push_structure(&mut bytes, ad_type::COMPLETE_LOCAL_NAME, name.as_bytes())?;
        }

        Ok(AdvertisingPayload { bytes })
    }
}

fn push_structure(
    buf: &mut Vec<u8, LEGACY_ADV_MAX_SIZE>,
    kind: u8,
    data: &[u8],
) -> Result<(), Error> {
    let required = buf.len() + 2 + data.len();
    buf.push((data.len() + 1) as u8).map_err(|_| oversize(required))?;
    buf.push(kind).map_err(|_| oversize(required))?;
    buf.extend_from_slice(data).map_err(|_| oversize(required))
}

fn oversize(required: usize) -> Error {
    Error::PayloadOversize {
        required,
        max: LEGACY_ADV_MAX_SIZE,
    }
}
