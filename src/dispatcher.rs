//! Cooperative single-threaded event dispatcher.
//!
//! Events from the BLE stack and ticks of periodic timers are queued in
//! arrival order and handed one at a time to a single [`EventHandler`].
//! Nothing here blocks or preempts; time only moves when the owner calls
//! [`EventQueue::advance_to`], which makes the queue fully deterministic
//! on the host. On target the firmware feeds it from an embassy channel
//! and the RTC.

use heapless::{Deque, Vec};

use crate::ble::{
    AdvertisingFailedEvent, ConnectionCompleteEvent, DisconnectionCompleteEvent, GapEventHandler,
    InitCompleteEvent,
};
use crate::config::{EVENT_QUEUE_DEPTH, MAX_PERIODIC_TASKS};
use crate::error::Error;

/// Identifies a periodic task registered with [`EventQueue::call_every`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerId(u8);

/// Everything the dispatcher can deliver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    InitComplete(InitCompleteEvent),
    ConnectionComplete(ConnectionCompleteEvent),
    DisconnectionComplete(DisconnectionCompleteEvent),
    AdvertisingFailed(AdvertisingFailedEvent),
    Timer(TimerId),
}

/// The single consumer of dispatched events.
pub trait EventHandler: GapEventHandler {
    fn on_init_complete(&mut self, event: &InitCompleteEvent);
    fn on_timer(&mut self, timer: TimerId);
}

#[derive(Clone, Copy, Debug)]
struct PeriodicTask {
    id: TimerId,
    period_ms: u64,
    next_due_ms: u64,
}

/// Bounded event queue with periodic timers.
pub struct EventQueue<const N: usize = EVENT_QUEUE_DEPTH> {
    events: Deque<Event, N>,
    timers: Vec<PeriodicTask, MAX_PERIODIC_TASKS>,
    now_ms: u64,
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> EventQueue<N> {
    pub const fn new() -> Self {
        Self::with_start_time(0)
    }

    /// Queue whose clock starts at `now_ms` (e.g. the RTC uptime).
    pub const fn with_start_time(now_ms: u64) -> Self {
        Self {
            events: Deque::new(),
            timers: Vec::new(),
            now_ms,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Number of events waiting for dispatch.
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    /// Append an event. Fails without blocking when the queue is full.
    pub fn post(&mut self, event: Event) -> Result<(), Error> {
        self.events.push_back(event).map_err(|_| Error::QueueFull)
    }

    /// Register a task that fires every `period_ms`, first at
    /// `now + period_ms`. A zero period is treated as 1 ms.
    pub fn call_every(&mut self, period_ms: u32) -> Result<TimerId, Error> {
        let id = TimerId(self.timers.len() as u8);
        let period_ms = u64::from(period_ms.max(1));
        self.timers
            .push(PeriodicTask {
                id,
                period_ms,
                next_due_ms: self.now_ms.saturating_add(period_ms),
            })
            .map_err(|_| Error::TooManyTimers)?;
        debug!("Periodic task {} registered every {} ms", id.0, period_ms);
        Ok(id)
    }

    /// Milliseconds until the earliest timer is due (0 if one is overdue).
    pub fn time_to_next_timer(&self) -> Option<u64> {
        self.timers
            .iter()
            .map(|t| t.next_due_ms.saturating_sub(self.now_ms))
            .min()
    }

    /// Move the clock forward by `elapsed_ms`. See [`advance_to`](Self::advance_to).
    pub fn advance(&mut self, elapsed_ms: u64) -> usize {
        self.advance_to(self.now_ms.saturating_add(elapsed_ms))
    }

    /// Move the clock to `now_ms` and queue one `Timer` event per elapsed
    /// period, oldest deadline first. Once the queue is full the remaining
    /// missed periods are skipped, not queued. Returns the number of ticks
    /// queued. The clock never goes backwards.
    pub fn advance_to(&mut self, now_ms: u64) -> usize {
        if now_ms > self.now_ms {
            self.now_ms = now_ms;
        }

        let mut queued = 0;
        loop {
            if self.events.is_full() {
                self.skip_missed_ticks();
                break;
            }

            let Some(task) = self
                .timers
                .iter_mut()
                .filter(|t| t.next_due_ms <= self.now_ms)
                .min_by_key(|t| t.next_due_ms)
            else {
                break;
            };
            task.next_due_ms = task.next_due_ms.saturating_add(task.period_ms);
            let id = task.id;

            if self.events.push_back(Event::Timer(id)).is_ok() {
                queued += 1;
            }
        }
        queued
    }

    /// Move every overdue timer past `now` in one step.
    fn skip_missed_ticks(&mut self) {
        let now = self.now_ms;
        let mut dropped: u64 = 0;
        for task in self.timers.iter_mut().filter(|t| t.next_due_ms <= now) {
            let missed = (now - task.next_due_ms) / task.period_ms + 1;
            task.next_due_ms = task
                .next_due_ms
                .saturating_add(missed.saturating_mul(task.period_ms));
            dropped = dropped.saturating_add(missed);
        }
        if dropped > 0 {
            warn!("Event queue full - dropped {} timer ticks", dropped);
        }
    }

    /// Deliver every queued event to `handler` in arrival order.
    /// Returns the number of events delivered.
    pub fn dispatch_pending<H: EventHandler>(&mut self, handler: &mut H) -> usize {
        let mut delivered = 0;
        while let Some(event) = self.events.pop_front() {
            trace!("Dispatching {}", event);
            match event {
                Event::InitComplete(e) => handler.on_init_complete(&e),
                Event::ConnectionComplete(e) => handler.on_connection_complete(&e),
                Event::DisconnectionComplete(e) => handler.on_disconnection_complete(&e),
                Event::AdvertisingFailed(e) => handler.on_advertising_failed(&e),
                Event::Timer(id) => handler.on_timer(id),
            }
            delivered += 1;
        }
        delivered
    }
}
