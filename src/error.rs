//! Unified error type for plantmon.
//!
//! No `alloc`: every variant holds plain fixed-size data, so errors can be
//! copied into events and log frames freely.
//! Implements `defmt::Format` (with the `defmt` feature) for efficient
//! on-target logging.

/// Everything that can fail in the controller and the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // BLE
    /// The BLE stack returned an error outside of a more specific stage.
    Ble(BleError),

    /// BLE stack initialisation completed with an error.
    InitFailed(BleError),

    /// One step of the advertising setup sequence failed.
    Advertising {
        stage: AdvertisingStage,
        cause: BleError,
    },

    /// The advertising payload does not fit the legacy advertising PDU.
    PayloadOversize { required: usize, max: usize },

    /// Advertising interval (ms) outside the legacy range.
    InvalidInterval(u32),

    // Lifecycle
    /// `request_init` called after initialisation was already requested.
    AlreadyInitialized,

    // Dispatcher
    /// The event queue has no room for another event.
    QueueFull,

    /// No free slot for another periodic task.
    TooManyTimers,
}

/// Failure reported by the radio stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleError {
    /// Raw error code from the SoftDevice.
    Raw(u32),
    /// The stack was not ready for the request.
    InvalidState,
    /// The stack ran out of resources (advertising sets, queue entries).
    NoResources,
    /// Connection attempt from the central did not complete.
    ConnectFailed,
    /// A parameter was rejected by the stack.
    InvalidParam,
}

/// Step of the advertising setup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingStage {
    /// `set_advertising_parameters`.
    SetParameters,
    /// `set_advertising_payload`.
    SetPayload,
    /// `start_advertising`.
    Start,
}

impl AdvertisingStage {
    /// Name of the adapter call that failed, for log lines.
    pub fn call_name(self) -> &'static str {
        match self {
            AdvertisingStage::SetParameters => "set_advertising_parameters()",
            AdvertisingStage::SetPayload => "set_advertising_payload()",
            AdvertisingStage::Start => "start_advertising()",
        }
    }
}

// Convenience conversions

impl From<BleError> for Error {
    fn from(e: BleError) -> Self {
        Error::Ble(e)
    }
}
