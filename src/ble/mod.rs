//! Bluetooth Low Energy peripheral-role abstractions.
//!
//! The controller talks to the radio stack only through the traits in
//! this module, so the lifecycle logic runs unchanged on the host (with
//! recording doubles) and on the nRF52840 (on top of the SoftDevice):
//!
//! 1. **PeripheralRoleAdapter** - init request, device address,
//!    advertising parameters/payload, advertising start.
//! 2. **GapEventHandler** - connection and disconnection completion, and
//!    advertising failures the stack detects after accepting a request,
//!    delivered through the dispatcher.
//! 3. **Advertising data** - payload builder and parser for the legacy
//!    (31-byte) advertising PDU.

pub mod adv_builder;
pub mod adv_parser;

use crate::config::{ADV_INTERVAL_MAX_UNITS, ADV_INTERVAL_MIN_UNITS};
use crate::error::{AdvertisingStage, BleError, Error};
pub use adv_builder::{AdvertisingDataBuilder, AdvertisingPayload};

/// Battery Service (0x180F).
pub const BATTERY_SERVICE_UUID: u16 = 0x180F;

/// Device Information Service (0x180A).
pub const DEVICE_INFORMATION_SERVICE_UUID: u16 = 0x180A;

/// AD structure types used in the advertising payload.
pub mod ad_type {
    pub const FLAGS: u8 = 0x01;
    pub const INCOMPLETE_16BIT_UUIDS: u8 = 0x02;
    pub const COMPLETE_16BIT_UUIDS: u8 = 0x03;
    pub const SHORTENED_LOCAL_NAME: u8 = 0x08;
    pub const COMPLETE_LOCAL_NAME: u8 = 0x09;
}

/// Bits of the Flags AD structure.
pub mod ad_flags {
    pub const LE_GENERAL_DISCOVERABLE: u8 = 0x02;
    pub const BR_EDR_NOT_SUPPORTED: u8 = 0x04;
}

/// Advertising set identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingHandle(pub u8);

/// The single fixed set used when extended advertising is not available.
pub const LEGACY_ADVERTISING_HANDLE: AdvertisingHandle = AdvertisingHandle(0);

/// Legacy advertising PDU type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingType {
    /// ADV_IND - any central may connect.
    ConnectableUndirected,
}

/// Advertising interval in 0.625 ms units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingInterval(u32);

impl AdvertisingInterval {
    /// Convert from milliseconds, rejecting values outside 20 ms..10.24 s.
    pub fn from_millis(ms: u32) -> Result<Self, Error> {
        let units = ms.checked_mul(8).map(|v| v / 5).ok_or(Error::InvalidInterval(ms))?;
        if !(ADV_INTERVAL_MIN_UNITS..=ADV_INTERVAL_MAX_UNITS).contains(&units) {
            return Err(Error::InvalidInterval(ms));
        }
        Ok(Self(units))
    }

    pub fn units(self) -> u32 {
        self.0
    }

    pub fn millis(self) -> u32 {
        self.0 * 5 / 8
    }
}

/// Advertising parameters for one advertising set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingParameters {
    pub kind: AdvertisingType,
    pub interval: AdvertisingInterval,
}

impl AdvertisingParameters {
    pub fn connectable_undirected(interval_ms: u32) -> Result<Self, Error> {
        Ok(Self {
            kind: AdvertisingType::ConnectableUndirected,
            interval: AdvertisingInterval::from_millis(interval_ms)?,
        })
    }
}

/// Kind of a Bluetooth device address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressKind {
    Public,
    RandomStatic,
    RandomPrivate,
}

/// Bluetooth device address. `bytes` is in over-the-air (little-endian) order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BdAddr {
    pub kind: AddressKind,
    pub bytes: [u8; 6],
}

impl BdAddr {
    /// Bytes in display order, most significant first.
    pub fn msb_first(&self) -> [u8; 6] {
        let mut b = self.bytes;
        b.reverse();
        b
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BdAddr {
    /// `C0:FF:EE:00:11:22 (RandomStatic)`
    fn format(&self, f: defmt::Formatter) {
        let b = self.msb_first();
        defmt::write!(
            f,
            "{=u8:02X}:{=u8:02X}:{=u8:02X}:{=u8:02X}:{=u8:02X}:{=u8:02X} ({})",
            b[0],
            b[1],
            b[2],
            b[3],
            b[4],
            b[5],
            self.kind
        )
    }
}

/// Completion of the stack initialisation requested by `request_init`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InitCompleteEvent {
    pub status: Result<(), BleError>,
}

/// A central finished connecting (or failed to).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionCompleteEvent {
    pub status: Result<(), BleError>,
    pub connection_handle: u16,
    pub peer: Option<BdAddr>,
}

/// An existing link was closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisconnectionCompleteEvent {
    pub connection_handle: u16,
    /// HCI disconnect reason code, when the stack reports one.
    pub reason: Option<u8>,
}

/// The stack could not carry out an accepted advertising request.
///
/// Reported when a step that the platform performs after the call
/// returned (e.g. the radio actually starting) fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingFailedEvent {
    pub stage: AdvertisingStage,
    pub cause: BleError,
}

/// Commands the controller issues to the platform BLE stack.
///
/// All calls are non-blocking; a returned error means the stack rejected
/// the request.
pub trait PeripheralRoleAdapter {
    /// Start stack initialisation. Returns immediately; completion arrives
    /// later as an [`InitCompleteEvent`] through the dispatcher.
    fn request_init(&mut self) -> Result<(), BleError>;

    /// Local identity address (valid after init completed).
    fn device_address(&self) -> Result<BdAddr, BleError>;

    fn set_advertising_parameters(
        &mut self,
        handle: AdvertisingHandle,
        params: &AdvertisingParameters,
    ) -> Result<(), BleError>;

    fn set_advertising_payload(
        &mut self,
        handle: AdvertisingHandle,
        payload: &AdvertisingPayload,
    ) -> Result<(), BleError>;

    fn start_advertising(&mut self, handle: AdvertisingHandle) -> Result<(), BleError>;
}

/// Receiver of GAP connection lifecycle events.
pub trait GapEventHandler {
    fn on_connection_complete(&mut self, event: &ConnectionCompleteEvent);
    fn on_disconnection_complete(&mut self, event: &DisconnectionCompleteEvent);
    fn on_advertising_failed(&mut self, event: &AdvertisingFailedEvent);
}
