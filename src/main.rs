//! plantmon - BLE peripheral firmware for the plant-monitoring sensor node.
//!
//! Target: nRF52840 with SoftDevice S140.
//!
//! Advertises as "PlantMonitorSensors" with the Battery and Device
//! Information services, accepts one central at a time, and while
//! connected raises the simulated battery level once per sensor tick.
//!
//! Tasks:
//! - `softdevice_task` - runs the SoftDevice event loop
//! - `gap_task` - advertising and connection handling
//! - main loop - the event dispatcher driving `PeripheralController`

#![no_std]
#![no_main]

mod softdevice;

use defmt::{error, info, unwrap};
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_nrf::interrupt::Priority;
use embassy_time::{Instant, Timer};
use nrf_softdevice::Softdevice;
use plantmon::battery::BatteryLevel;
use plantmon::config::PeripheralConfig;
use plantmon::{BleError, EventQueue, PeripheralController, PLANT_MONITOR};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::softdevice::gap::{self, SoftdeviceGap, EVENTS};
use crate::softdevice::server::{GattBattery, Server};

/// Longest the dispatcher sleeps when no periodic task is registered.
const IDLE_WAKEUP_MS: u64 = 60_000;

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("plantmon v{} starting", env!("CARGO_PKG_VERSION"));

    // SoftDevice reserves the highest interrupt priorities.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let _p = embassy_nrf::init(nrf_config);

    let sd = Softdevice::enable(&softdevice::softdevice_config());

    let config = PeripheralConfig::default();
    static SERVER: StaticCell<Server> = StaticCell::new();
    let server: Option<&'static Server> = match Server::new(sd) {
        Ok(server) => Some(SERVER.init(server)),
        Err(e) => {
            error!("GATT server registration failed: {}", e);
            None
        }
    };

    let mut init_status = if server.is_some() {
        Ok(())
    } else {
        Err(BleError::NoResources)
    };
    if let Some(server) = server {
        if let Err(e) = server.populate(&PLANT_MONITOR, BatteryLevel::new(config.battery_initial)) {
            error!("GATT attribute setup failed: {}", e);
            init_status = Err(BleError::InvalidState);
        }
    }

    unwrap!(spawner.spawn(softdevice_task(sd)));
    if let (Ok(()), Some(server)) = (init_status, server) {
        unwrap!(spawner.spawn(gap::gap_task(sd, server)));
    }

    let mut controller = PeripheralController::new(
        SoftdeviceGap::new(sd, init_status),
        GattBattery::new(server),
        &PLANT_MONITOR,
        config,
    );

    let mut queue: EventQueue = EventQueue::with_start_time(Instant::now().as_millis());
    if let Err(e) = controller.start(&mut queue) {
        error!("Controller start failed: {}", e);
    }

    // The dispatcher keeps running even when BLE init failed.
    loop {
        let sleep_ms = queue.time_to_next_timer().unwrap_or(IDLE_WAKEUP_MS);
        match select(EVENTS.receive(), Timer::after_millis(sleep_ms)).await {
            Either::First(event) => {
                if let Err(e) = queue.post(event) {
                    error!("Dropping {}: {}", event, e);
                }
            }
            Either::Second(()) => {}
        }
        while let Ok(event) = EVENTS.try_receive() {
            if let Err(e) = queue.post(event) {
                error!("Dropping {}: {}", event, e);
            }
        }
        queue.advance_to(Instant::now().as_millis());
        queue.dispatch_pending(&mut controller);
    }
}
