//! Integration tests for the plantmon host-testable logic.
//!
//! Each scenario drives a `PeripheralController` through the event queue
//! the way the firmware main loop does, with a recording BLE adapter in
//! place of the SoftDevice.

use plantmon::ble::{
    AddressKind, AdvertisingFailedEvent, AdvertisingHandle, AdvertisingParameters, AdvertisingPayload, AdvertisingType,
    BdAddr, ConnectionCompleteEvent, DisconnectionCompleteEvent, InitCompleteEvent,
    PeripheralRoleAdapter, BATTERY_SERVICE_UUID, DEVICE_INFORMATION_SERVICE_UUID,
    LEGACY_ADVERTISING_HANDLE,
};
use plantmon::config::{PeripheralConfig, DEVICE_NAME, EVENT_QUEUE_DEPTH, LEGACY_ADV_MAX_SIZE};
use plantmon::{
    AdvertisingStage, BatteryExposer, BatteryLevel, BleError, Error, Event, EventQueue, LinkState,
    PeripheralController, PLANT_MONITOR,
};

const TICK_MS: u32 = 1000;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Init,
    SetParameters(AdvertisingHandle, AdvertisingParameters),
    SetPayload(AdvertisingHandle, AdvertisingPayload),
    Start(AdvertisingHandle),
}

/// Records every adapter call; individual steps can be made to fail.
#[derive(Default)]
struct RecordingGap {
    calls: Vec<Call>,
    reject_init: Option<BleError>,
    fail_parameters: Option<BleError>,
    fail_payload: Option<BleError>,
    /// Fail every start after this many successful ones.
    fail_start: Option<(usize, BleError)>,
}

impl RecordingGap {
    fn starts(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Start(_)))
            .count()
    }

    fn payload(&self) -> Option<&AdvertisingPayload> {
        self.calls.iter().rev().find_map(|c| match c {
            Call::SetPayload(_, p) => Some(p),
            _ => None,
        })
    }
}

fn outcome(fail: Option<BleError>) -> Result<(), BleError> {
    match fail {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

impl PeripheralRoleAdapter for RecordingGap {
    fn request_init(&mut self) -> Result<(), BleError> {
        self.calls.push(Call::Init);
        outcome(self.reject_init)
    }

    fn device_address(&self) -> Result<BdAddr, BleError> {
        Ok(BdAddr {
            kind: AddressKind::RandomStatic,
            bytes: [0x22, 0x11, 0x00, 0xEE, 0xFF, 0xC0],
        })
    }

    fn set_advertising_parameters(
        &mut self,
        handle: AdvertisingHandle,
        params: &AdvertisingParameters,
    ) -> Result<(), BleError> {
        self.calls.push(Call::SetParameters(handle, *params));
        outcome(self.fail_parameters)
    }

    fn set_advertising_payload(
        &mut self,
        handle: AdvertisingHandle,
        payload: &AdvertisingPayload,
    ) -> Result<(), BleError> {
        self.calls.push(Call::SetPayload(handle, payload.clone()));
        outcome(self.fail_payload)
    }

    fn start_advertising(&mut self, handle: AdvertisingHandle) -> Result<(), BleError> {
        let earlier = self.starts();
        self.calls.push(Call::Start(handle));
        match self.fail_start {
            Some((allowed, e)) if earlier >= allowed => Err(e),
            _ => Ok(()),
        }
    }
}

#[derive(Default)]
struct BatteryLog(Vec<u8>);

impl BatteryExposer for BatteryLog {
    fn update_battery_level(&mut self, level: BatteryLevel) {
        self.0.push(level.percent());
    }
}

struct Node {
    controller: PeripheralController<RecordingGap, BatteryLog>,
    queue: EventQueue,
}

impl Node {
    fn new(gap: RecordingGap) -> Self {
        let config = PeripheralConfig {
            adv_interval_ms: 1000,
            sensor_tick_ms: TICK_MS,
            battery_initial: 50,
        };
        Self {
            controller: PeripheralController::new(gap, BatteryLog::default(), &PLANT_MONITOR, config),
            queue: EventQueue::new(),
        }
    }

    /// Start the controller and deliver the stack's init completion.
    fn boot(gap: RecordingGap, init: Result<(), BleError>) -> Self {
        let mut node = Self::new(gap);
        node.controller
            .start(&mut node.queue)
            .expect("init request accepted");
        node.deliver(Event::InitComplete(InitCompleteEvent { status: init }));
        node
    }

    fn deliver(&mut self, event: Event) {
        self.queue.post(event).expect("queue has room");
        self.queue.dispatch_pending(&mut self.controller);
    }

    fn connect(&mut self, handle: u16) {
        self.deliver(Event::ConnectionComplete(ConnectionCompleteEvent {
            status: Ok(()),
            connection_handle: handle,
            peer: None,
        }));
    }

    fn disconnect(&mut self, handle: u16) {
        self.deliver(Event::DisconnectionComplete(DisconnectionCompleteEvent {
            connection_handle: handle,
            reason: Some(0x13),
        }));
    }

    /// Let `n` sensor periods elapse, dispatching after each one like the
    /// firmware loop does when it wakes for the next deadline.
    fn ticks(&mut self, n: u64) {
        for _ in 0..n {
            self.queue.advance(u64::from(TICK_MS));
            self.queue.dispatch_pending(&mut self.controller);
        }
    }

    fn state(&self) -> LinkState {
        self.controller.state()
    }

    fn gap(&self) -> &RecordingGap {
        self.controller.adapter()
    }

    fn published(&self) -> &[u8] {
        &self.controller.battery_exposer().0
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Startup and advertising
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn successful_init_starts_advertising() {
    let node = Node::boot(RecordingGap::default(), Ok(()));
    assert_eq!(node.state(), LinkState::Advertising);

    let calls = &node.gap().calls;
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0], Call::Init);
    match &calls[1] {
        Call::SetParameters(handle, params) => {
            assert_eq!(*handle, LEGACY_ADVERTISING_HANDLE);
            assert_eq!(params.kind, AdvertisingType::ConnectableUndirected);
            assert_eq!(params.interval.millis(), 1000);
        }
        other => panic!("expected parameters, got {:?}", other),
    }
    assert!(matches!(calls[2], Call::SetPayload(LEGACY_ADVERTISING_HANDLE, _)));
    assert_eq!(calls[3], Call::Start(LEGACY_ADVERTISING_HANDLE));
}

#[test]
fn advertising_payload_names_node_and_services() {
    let node = Node::boot(RecordingGap::default(), Ok(()));
    let payload = node.gap().payload().expect("payload set");

    assert!(payload.len() <= LEGACY_ADV_MAX_SIZE);
    assert_eq!(payload.flags(), Some(0x06));
    assert_eq!(payload.local_name(), Some(DEVICE_NAME));
    assert_eq!(
        payload.service_uuids().as_slice(),
        &[BATTERY_SERVICE_UUID, DEVICE_INFORMATION_SERVICE_UUID]
    );
}

#[test]
fn failed_init_never_advertises() {
    let mut node = Node::boot(RecordingGap::default(), Err(BleError::Raw(0x08)));
    assert_eq!(node.state(), LinkState::InitFailed);
    assert_eq!(node.gap().calls, [Call::Init]);

    // The dispatcher keeps running; ticks are harmless.
    node.ticks(3);
    assert_eq!(node.state(), LinkState::InitFailed);
    assert!(node.published().is_empty());
    assert_eq!(node.controller.battery_level().percent(), 50);
}

#[test]
fn rejected_init_request_still_registers_tick() {
    let mut node = Node::new(RecordingGap {
        reject_init: Some(BleError::InvalidState),
        ..Default::default()
    });
    assert_eq!(
        node.controller.start(&mut node.queue),
        Err(Error::InitFailed(BleError::InvalidState))
    );
    assert_eq!(node.state(), LinkState::InitFailed);
    assert_eq!(node.queue.time_to_next_timer(), Some(u64::from(TICK_MS)));
}

#[test]
fn each_failing_advertising_step_leaves_node_idle() {
    let cases = [
        (
            RecordingGap {
                fail_parameters: Some(BleError::InvalidParam),
                ..Default::default()
            },
            AdvertisingStage::SetParameters,
            2,
        ),
        (
            RecordingGap {
                fail_payload: Some(BleError::Raw(0x0C)),
                ..Default::default()
            },
            AdvertisingStage::SetPayload,
            3,
        ),
        (
            RecordingGap {
                fail_start: Some((0, BleError::NoResources)),
                ..Default::default()
            },
            AdvertisingStage::Start,
            4,
        ),
    ];

    for (gap, stage, calls) in cases {
        let mut node = Node::boot(gap, Ok(()));
        assert_eq!(node.state(), LinkState::Idle, "{:?}", stage);
        // Sequence stops at the failing step.
        assert_eq!(node.gap().calls.len(), calls, "{:?}", stage);

        // Not advertising, so a retry is allowed and reports the same stage.
        let err = node.controller.start_advertising().unwrap_err();
        assert!(
            matches!(err, Error::Advertising { stage: s, .. } if s == stage),
            "{:?}",
            err
        );
        assert_eq!(node.state(), LinkState::Idle);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Connection lifecycle
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn connect_and_disconnect_alternate() {
    let mut node = Node::boot(RecordingGap::default(), Ok(()));

    for round in 1..=3u16 {
        node.connect(round);
        assert_eq!(node.state(), LinkState::Connected);
        assert_eq!(node.controller.connection_handle(), Some(round));

        node.disconnect(round);
        assert_eq!(node.state(), LinkState::Advertising);
        assert_eq!(node.controller.connection_handle(), None);
    }

    assert_eq!(node.controller.connection_count(), 3);
    // Initial start plus one restart per disconnection; setup is not redone.
    assert_eq!(node.gap().starts(), 4);
    assert_eq!(node.gap().calls.len(), 4 + 3);
}

#[test]
fn stacked_connection_is_ignored() {
    let mut node = Node::boot(RecordingGap::default(), Ok(()));
    node.connect(1);
    node.connect(2);
    assert_eq!(node.controller.connection_handle(), Some(1));
    assert_eq!(node.controller.connection_count(), 1);

    // Only the tracked handle closes the link.
    node.disconnect(2);
    assert_eq!(node.state(), LinkState::Connected);
    node.disconnect(1);
    assert_eq!(node.state(), LinkState::Advertising);
}

#[test]
fn failed_connection_keeps_advertising() {
    let mut node = Node::boot(RecordingGap::default(), Ok(()));
    node.deliver(Event::ConnectionComplete(ConnectionCompleteEvent {
        status: Err(BleError::ConnectFailed),
        connection_handle: 0,
        peer: None,
    }));
    assert_eq!(node.state(), LinkState::Advertising);
    assert_eq!(node.controller.connection_count(), 0);
}

#[test]
fn radio_failing_to_start_leaves_node_idle() {
    let mut node = Node::boot(RecordingGap::default(), Ok(()));
    assert_eq!(node.state(), LinkState::Advertising);

    // The adapter accepted the start; the radio reports failure later.
    node.deliver(Event::AdvertisingFailed(AdvertisingFailedEvent {
        stage: AdvertisingStage::Start,
        cause: BleError::Raw(0x07),
    }));
    assert_eq!(node.state(), LinkState::Idle);
    // No retry.
    assert_eq!(node.gap().starts(), 1);

    node.ticks(3);
    assert_eq!(node.state(), LinkState::Idle);
    assert!(node.published().is_empty());
}

#[test]
fn radio_failing_to_restart_after_disconnect_leaves_node_idle() {
    let mut node = Node::boot(RecordingGap::default(), Ok(()));
    node.connect(1);
    node.disconnect(1);
    assert_eq!(node.state(), LinkState::Advertising);

    node.deliver(Event::AdvertisingFailed(AdvertisingFailedEvent {
        stage: AdvertisingStage::Start,
        cause: BleError::NoResources,
    }));
    assert_eq!(node.state(), LinkState::Idle);
    assert_eq!(node.gap().starts(), 2);

    // Nothing can connect to a node that is not advertising.
    node.connect(2);
    assert_eq!(node.state(), LinkState::Idle);
    assert_eq!(node.controller.connection_count(), 1);
}

#[test]
fn disconnect_without_connection_is_ignored() {
    let mut node = Node::boot(RecordingGap::default(), Ok(()));
    node.disconnect(1);
    assert_eq!(node.state(), LinkState::Advertising);
    assert_eq!(node.gap().starts(), 1);
}

#[test]
fn failed_restart_after_disconnect_leaves_node_idle() {
    let mut node = Node::boot(
        RecordingGap {
            fail_start: Some((1, BleError::NoResources)),
            ..Default::default()
        },
        Ok(()),
    );
    assert_eq!(node.state(), LinkState::Advertising);
    node.connect(1);
    node.disconnect(1);
    assert_eq!(node.state(), LinkState::Idle);
    assert_eq!(node.gap().starts(), 2);

    // A late connection event is not accepted while idle.
    node.connect(2);
    assert_eq!(node.state(), LinkState::Idle);
    assert_eq!(node.controller.connection_count(), 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Periodic battery update
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn ticks_while_disconnected_change_nothing() {
    let mut node = Node::boot(RecordingGap::default(), Ok(()));
    node.ticks(10);
    assert_eq!(node.controller.battery_level().percent(), 50);
    assert!(node.published().is_empty());
}

#[test]
fn battery_rises_only_while_connected() {
    let mut node = Node::boot(RecordingGap::default(), Ok(()));
    node.connect(1);
    node.ticks(5);
    assert_eq!(node.published(), &[51, 52, 53, 54, 55]);

    node.disconnect(1);
    node.ticks(5);
    assert_eq!(node.controller.battery_level().percent(), 55);
    assert_eq!(node.published().len(), 5);

    // The level carries over to the next connection.
    node.connect(2);
    node.ticks(1);
    assert_eq!(node.published().last(), Some(&56));
}

#[test]
fn battery_wraps_to_twenty_after_full() {
    let mut node = Node::boot(RecordingGap::default(), Ok(()));
    node.connect(1);
    node.ticks(51);

    let published = node.published();
    assert_eq!(published.len(), 51);
    assert_eq!(published[49], 100);
    assert_eq!(published[50], 20);
    assert_eq!(node.controller.battery_level().percent(), 20);
}

#[test]
fn long_stall_drops_ticks_beyond_queue_depth() {
    let mut node = Node::boot(RecordingGap::default(), Ok(()));
    node.connect(1);

    // Dispatcher blocked for 51 periods: only a queue's worth is kept.
    node.queue.advance(51 * u64::from(TICK_MS));
    node.queue.dispatch_pending(&mut node.controller);
    assert_eq!(node.published().len(), EVENT_QUEUE_DEPTH);
    assert_eq!(node.queue.time_to_next_timer(), Some(u64::from(TICK_MS)));

    // Regular ticking resumes afterwards.
    node.ticks(1);
    assert_eq!(node.published().len(), EVENT_QUEUE_DEPTH + 1);
}

#[test]
fn tick_and_connection_events_keep_arrival_order() {
    let mut node = Node::boot(RecordingGap::default(), Ok(()));
    // Tick becomes due before the connection event is queued.
    node.queue.advance(u64::from(TICK_MS));
    node.queue
        .post(Event::ConnectionComplete(ConnectionCompleteEvent {
            status: Ok(()),
            connection_handle: 1,
            peer: None,
        }))
        .unwrap();
    assert_eq!(node.queue.dispatch_pending(&mut node.controller), 2);

    assert_eq!(node.state(), LinkState::Connected);
    assert!(node.published().is_empty());
}
