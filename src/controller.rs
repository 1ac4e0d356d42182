//! Peripheral controller - lifecycle state machine of the sensor node.
//!
//! ```text
//! Uninitialized --request_init--> Initializing --init ok--> Advertising
//!                                      |                     |      ^
//!                                  init failed          connected  disconnected
//!                                      v                     v      |
//!                                  InitFailed               Connected
//! ```
//!
//! A failed advertising setup step leaves the node in `Idle` (initialised
//! but not discoverable); there is no retry. All callbacks run on the
//! dispatcher, so the state needs no locking.

use crate::battery::{BatteryExposer, BatteryLevel};
use crate::ble::{
    AdvertisingDataBuilder, AdvertisingFailedEvent, AdvertisingParameters, ConnectionCompleteEvent,
    DisconnectionCompleteEvent, GapEventHandler, InitCompleteEvent, PeripheralRoleAdapter,
    BATTERY_SERVICE_UUID, DEVICE_INFORMATION_SERVICE_UUID, LEGACY_ADVERTISING_HANDLE,
};
use crate::config::PeripheralConfig;
use crate::dispatcher::{EventHandler, EventQueue, TimerId};
use crate::error::{AdvertisingStage, BleError, Error};
use crate::identity::PeripheralIdentity;

/// Services hosted locally and listed in the advertising payload.
pub const ADVERTISED_SERVICES: [u16; 2] = [BATTERY_SERVICE_UUID, DEVICE_INFORMATION_SERVICE_UUID];

/// Connection/advertising state of the peripheral.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    /// Nothing requested from the stack yet.
    Uninitialized,
    /// Init requested, waiting for the init-complete event.
    Initializing,
    /// Stack init failed; terminal.
    InitFailed,
    /// Initialised but not advertising (an advertising step failed).
    Idle,
    Advertising,
    Connected,
}

impl LinkState {
    pub fn is_connected(self) -> bool {
        self == LinkState::Connected
    }
}

/// Owns the lifecycle state and the battery reading, drives the
/// [`PeripheralRoleAdapter`] and the battery exposer.
pub struct PeripheralController<A, B> {
    adapter: A,
    battery_exposer: B,
    identity: &'static PeripheralIdentity,
    config: PeripheralConfig,
    state: LinkState,
    battery: BatteryLevel,
    sensor_timer: Option<TimerId>,
    connection_handle: Option<u16>,
    connection_count: u32,
}

impl<A: PeripheralRoleAdapter, B: BatteryExposer> PeripheralController<A, B> {
    pub fn new(
        adapter: A,
        battery_exposer: B,
        identity: &'static PeripheralIdentity,
        config: PeripheralConfig,
    ) -> Self {
        Self {
            adapter,
            battery_exposer,
            identity,
            config,
            state: LinkState::Uninitialized,
            battery: BatteryLevel::new(config.battery_initial),
            sensor_timer: None,
            connection_handle: None,
            connection_count: 0,
        }
    }

    /// Request BLE init and register the periodic sensor update.
    ///
    /// The controller only ever receives events through `queue`, so no
    /// connection event can arrive before it is in place. The periodic task
    /// is registered even if the init request itself is rejected.
    pub fn start<const N: usize>(&mut self, queue: &mut EventQueue<N>) -> Result<(), Error> {
        if self.sensor_timer.is_some() {
            warn!("Controller already started");
            return Err(Error::AlreadyInitialized);
        }

        let init = self.request_init();
        self.sensor_timer = Some(queue.call_every(self.config.sensor_tick_ms)?);
        init
    }

    /// First phase of initialisation: returns as soon as the stack has
    /// accepted the request. Calling it again is a programming error.
    pub fn request_init(&mut self) -> Result<(), Error> {
        if self.state != LinkState::Uninitialized {
            warn!("request_init() in state {}", self.state);
            return Err(Error::AlreadyInitialized);
        }

        if let Err(cause) = self.adapter.request_init() {
            error!("Ble initialization failed: {}", cause);
            self.state = LinkState::InitFailed;
            return Err(Error::InitFailed(cause));
        }

        info!("BLE init requested");
        self.state = LinkState::Initializing;
        Ok(())
    }

    /// Configure and start connectable undirected advertising on the
    /// legacy handle. Any failing step aborts the sequence and leaves the
    /// node in `Idle`.
    pub fn start_advertising(&mut self) -> Result<(), Error> {
        match self.state {
            LinkState::Idle | LinkState::Advertising => {}
            other => {
                warn!("start_advertising() in state {}", other);
                return Err(Error::Ble(BleError::InvalidState));
            }
        }

        let result = self.configure_and_advertise();
        self.state = if result.is_ok() {
            LinkState::Advertising
        } else {
            LinkState::Idle
        };
        result
    }

    fn configure_and_advertise(&mut self) -> Result<(), Error> {
        let params = AdvertisingParameters::connectable_undirected(self.config.adv_interval_ms)?;
        let payload = AdvertisingDataBuilder::new()
            .set_flags()
            .set_local_service_list(&ADVERTISED_SERVICES)
            .set_name(self.identity.device_name)
            .build()?;
        debug!(
            "Advertising payload: {} bytes, {} services",
            payload.len(),
            payload.service_uuids().len()
        );

        self.adapter
            .set_advertising_parameters(LEGACY_ADVERTISING_HANDLE, &params)
            .map_err(|cause| advertising_error(AdvertisingStage::SetParameters, cause))?;
        self.adapter
            .set_advertising_payload(LEGACY_ADVERTISING_HANDLE, &payload)
            .map_err(|cause| advertising_error(AdvertisingStage::SetPayload, cause))?;
        self.adapter
            .start_advertising(LEGACY_ADVERTISING_HANDLE)
            .map_err(|cause| advertising_error(AdvertisingStage::Start, cause))?;

        info!(
            "Advertising as {} every {} ms",
            self.identity.device_name,
            params.interval.millis()
        );
        Ok(())
    }

    /// Periodic tick: advance and publish the battery level while a
    /// central is connected, otherwise do nothing.
    pub fn update_sensor_value(&mut self) {
        if !self.state.is_connected() {
            return;
        }

        self.battery = self.battery.next();
        trace!("Battery level: {}%", self.battery.percent());
        self.battery_exposer.update_battery_level(self.battery);
    }

    fn log_device_address(&self) {
        match self.adapter.device_address() {
            Ok(addr) => info!("Device address: {}", addr),
            Err(e) => warn!("Could not read device address: {}", e),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn battery_level(&self) -> BatteryLevel {
        self.battery
    }

    /// Number of accepted connections since boot.
    pub fn connection_count(&self) -> u32 {
        self.connection_count
    }

    pub fn connection_handle(&self) -> Option<u16> {
        self.connection_handle
    }

    pub fn identity(&self) -> &'static PeripheralIdentity {
        self.identity
    }

    pub fn config(&self) -> &PeripheralConfig {
        &self.config
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn battery_exposer(&self) -> &B {
        &self.battery_exposer
    }
}

fn advertising_error(stage: AdvertisingStage, cause: BleError) -> Error {
    error!("{} failed: {}", stage.call_name(), cause);
    Error::Advertising { stage, cause }
}

impl<A: PeripheralRoleAdapter, B: BatteryExposer> GapEventHandler for PeripheralController<A, B> {
    fn on_connection_complete(&mut self, event: &ConnectionCompleteEvent) {
        match self.state {
            LinkState::Advertising => {}
            LinkState::Connected => {
                warn!(
                    "Connection {} completed while already connected on {}, ignoring",
                    event.connection_handle,
                    self.connection_handle
                );
                return;
            }
            other => {
                warn!("Connection-complete in state {}, ignoring", other);
                return;
            }
        }

        if let Err(e) = event.status {
            warn!("Connection attempt failed: {}", e);
            return;
        }

        self.state = LinkState::Connected;
        self.connection_handle = Some(event.connection_handle);
        self.connection_count += 1;
        info!(
            "Connected (handle {}, battery {}%)",
            event.connection_handle,
            self.battery.percent()
        );
    }

    fn on_disconnection_complete(&mut self, event: &DisconnectionCompleteEvent) {
        if !self.state.is_connected() {
            warn!("Disconnection-complete in state {}, ignoring", self.state);
            return;
        }
        if self.connection_handle != Some(event.connection_handle) {
            warn!(
                "Disconnection of unknown handle {}, ignoring",
                event.connection_handle
            );
            return;
        }

        info!(
            "Disconnected (handle {}, reason {})",
            event.connection_handle,
            event.reason
        );
        self.connection_handle = None;
        self.state = LinkState::Idle;

        // Parameters and payload from the initial setup are still in place.
        match self.adapter.start_advertising(LEGACY_ADVERTISING_HANDLE) {
            Ok(()) => {
                self.state = LinkState::Advertising;
                info!("Advertising restarted");
            }
            Err(cause) => error!(
                "{} failed: {}",
                AdvertisingStage::Start.call_name(),
                cause
            ),
        }
    }

    /// The stack accepted the request but the radio never started. Like a
    /// synchronous failure this leaves the node `Idle`, without retry.
    fn on_advertising_failed(&mut self, event: &AdvertisingFailedEvent) {
        if self.state != LinkState::Advertising {
            warn!("Advertising failure in state {}, ignoring", self.state);
            return;
        }
        error!("{} failed: {}", event.stage.call_name(), event.cause);
        self.state = LinkState::Idle;
    }
}

impl<A: PeripheralRoleAdapter, B: BatteryExposer> EventHandler for PeripheralController<A, B> {
    fn on_init_complete(&mut self, event: &InitCompleteEvent) {
        if self.state != LinkState::Initializing {
            warn!("Init-complete in state {}, ignoring", self.state);
            return;
        }

        if let Err(e) = event.status {
            error!("Ble initialization failed: {}", e);
            self.state = LinkState::InitFailed;
            return;
        }

        self.state = LinkState::Idle;
        self.log_device_address();

        if let Err(e) = self.start_advertising() {
            if !matches!(e, Error::Advertising { .. }) {
                error!("Advertising setup failed: {}", e);
            }
        }
    }

    fn on_timer(&mut self, timer: TimerId) {
        if self.sensor_timer == Some(timer) {
            self.update_sensor_value();
        }
    }
}
