//! GAP peripheral role on the SoftDevice.
//!
//! `SoftdeviceGap` is the controller's view of the radio: advertising
//! parameters and payload are staged locally and handed to `gap_task`
//! when advertising is started. `gap_task` owns the advertise/connect
//! loop and reports every connection and disconnection on `EVENTS`,
//! which the main loop forwards to the dispatcher.

use core::cell::RefCell;

use defmt::{debug, info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use nrf_softdevice::ble::peripheral::{self, AdvertiseError, ConnectableAdvertisement};
use nrf_softdevice::ble::{gatt_server, get_address, Address, AddressType, Connection};
use nrf_softdevice::{raw, Softdevice};
use plantmon::ble::{
    AddressKind, AdvertisingFailedEvent, AdvertisingHandle, AdvertisingParameters,
    AdvertisingPayload, BdAddr,
    ConnectionCompleteEvent, DisconnectionCompleteEvent, InitCompleteEvent,
    PeripheralRoleAdapter, LEGACY_ADVERTISING_HANDLE,
};
use plantmon::config::{self, EVENT_QUEUE_DEPTH};
use plantmon::{AdvertisingStage, BleError, Event};

use crate::softdevice::server::Server;

/// Stack events waiting for the dispatcher.
pub static EVENTS: Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_DEPTH> = Channel::new();

/// The current central link, if any. Used for notifications.
pub static LINK: Mutex<CriticalSectionRawMutex, RefCell<Option<Connection>>> =
    Mutex::new(RefCell::new(None));

/// Advertising request handed from the controller to `gap_task`.
static ADVERTISE: Signal<CriticalSectionRawMutex, AdvertisingRequest> = Signal::new();

#[derive(Clone)]
struct AdvertisingRequest {
    params: AdvertisingParameters,
    payload: AdvertisingPayload,
}

/// `PeripheralRoleAdapter` over the SoftDevice.
pub struct SoftdeviceGap {
    sd: &'static Softdevice,
    init_status: Result<(), BleError>,
    params: Option<AdvertisingParameters>,
    payload: Option<AdvertisingPayload>,
}

impl SoftdeviceGap {
    /// `init_status` is the outcome of enabling the SoftDevice and
    /// registering the GATT server, reported on `request_init`.
    pub fn new(sd: &'static Softdevice, init_status: Result<(), BleError>) -> Self {
        Self {
            sd,
            init_status,
            params: None,
            payload: None,
        }
    }

    fn check_handle(handle: AdvertisingHandle) -> Result<(), BleError> {
        if handle == LEGACY_ADVERTISING_HANDLE {
            Ok(())
        } else {
            warn!("Unknown advertising handle {}", handle);
            Err(BleError::InvalidParam)
        }
    }
}

impl PeripheralRoleAdapter for SoftdeviceGap {
    fn request_init(&mut self) -> Result<(), BleError> {
        // The SoftDevice is enabled synchronously in main; completion is
        // still delivered as an event so the controller sees one path.
        EVENTS
            .try_send(Event::InitComplete(InitCompleteEvent {
                status: self.init_status,
            }))
            .map_err(|_| BleError::NoResources)
    }

    fn device_address(&self) -> Result<BdAddr, BleError> {
        Ok(bd_addr(get_address(self.sd)))
    }

    fn set_advertising_parameters(
        &mut self,
        handle: AdvertisingHandle,
        params: &AdvertisingParameters,
    ) -> Result<(), BleError> {
        Self::check_handle(handle)?;
        self.params = Some(*params);
        Ok(())
    }

    fn set_advertising_payload(
        &mut self,
        handle: AdvertisingHandle,
        payload: &AdvertisingPayload,
    ) -> Result<(), BleError> {
        Self::check_handle(handle)?;
        self.payload = Some(payload.clone());
        Ok(())
    }

    fn start_advertising(&mut self, handle: AdvertisingHandle) -> Result<(), BleError> {
        Self::check_handle(handle)?;
        let (Some(params), Some(payload)) = (self.params, self.payload.as_ref()) else {
            return Err(BleError::InvalidState);
        };
        ADVERTISE.signal(AdvertisingRequest {
            params,
            payload: payload.clone(),
        });
        Ok(())
    }
}

fn bd_addr(addr: Address) -> BdAddr {
    let kind = match addr.address_type() {
        AddressType::Public => AddressKind::Public,
        AddressType::RandomStatic => AddressKind::RandomStatic,
        _ => AddressKind::RandomPrivate,
    };
    BdAddr {
        kind,
        bytes: addr.bytes(),
    }
}

fn advertise_error(e: AdvertiseError) -> BleError {
    match e {
        AdvertiseError::Raw(raw) => BleError::Raw(raw as u32),
        AdvertiseError::NoFreeConn => BleError::NoResources,
        _ => BleError::InvalidState,
    }
}

/// Ask the central for the preferred connection parameters.
fn request_conn_params(conn: &Connection) {
    let params = raw::ble_gap_conn_params_t {
        min_conn_interval: config::BLE_CONN_INTERVAL_MIN,
        max_conn_interval: config::BLE_CONN_INTERVAL_MAX,
        slave_latency: config::BLE_SLAVE_LATENCY,
        conn_sup_timeout: config::BLE_SUP_TIMEOUT,
    };
    if let Err(e) = conn.set_conn_params(params) {
        warn!("Connection parameter update rejected: {}", e);
    }
}

async fn report(event: Event) {
    if EVENTS.try_send(event).is_err() {
        warn!("Event channel full - waiting for dispatcher");
        EVENTS.send(event).await;
    }
}

/// Advertise when asked, serve one central at a time.
///
/// If the radio cannot start advertising the failure is reported as
/// `AdvertisingFailed` and the task waits for the next request. A central
/// that drops before the link is set up is reported as a failed connection
/// and the same request is advertised again.
#[embassy_executor::task]
pub async fn gap_task(sd: &'static Softdevice, server: &'static Server) -> ! {
    loop {
        let request = ADVERTISE.wait().await;
        let config = peripheral::Config {
            interval: request.params.interval.units(),
            ..Default::default()
        };
        debug!("Advertising every {} units", config.interval);

        let accepted = loop {
            let adv = ConnectableAdvertisement::ScannableUndirected {
                adv_data: request.payload.as_bytes(),
                scan_data: &[],
            };
            match peripheral::advertise_connectable(sd, adv, &config).await {
                Ok(conn) => match conn.handle() {
                    Some(handle) => break Some((conn, handle)),
                    None => {
                        warn!("Central dropped before the link was set up");
                        report(Event::ConnectionComplete(ConnectionCompleteEvent {
                            status: Err(BleError::ConnectFailed),
                            connection_handle: 0,
                            peer: None,
                        }))
                        .await;
                    }
                },
                Err(e) => {
                    warn!("advertise_connectable failed: {}", e);
                    report(Event::AdvertisingFailed(AdvertisingFailedEvent {
                        stage: AdvertisingStage::Start,
                        cause: advertise_error(e),
                    }))
                    .await;
                    break None;
                }
            }
        };
        let Some((conn, handle)) = accepted else {
            continue;
        };
        info!("Central connected on handle {}", handle);
        request_conn_params(&conn);

        LINK.lock(|link| *link.borrow_mut() = Some(conn.clone()));
        report(Event::ConnectionComplete(ConnectionCompleteEvent {
            status: Ok(()),
            connection_handle: handle,
            peer: Some(bd_addr(conn.peer_address())),
        }))
        .await;

        let e = gatt_server::run(&conn, server, |_| {}).await;
        debug!("GATT server stopped: {}", e);

        LINK.lock(|link| *link.borrow_mut() = None);
        report(Event::DisconnectionComplete(DisconnectionCompleteEvent {
            connection_handle: handle,
            reason: None,
        }))
        .await;
    }
}
