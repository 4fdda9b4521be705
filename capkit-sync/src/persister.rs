//! Debounced persistence timers.
//!
//! Each module has at most one pending timer. Scheduling again aborts the
//! pending timer and starts a fresh one, so a burst of edits results in a
//! single flush carrying the last value. Timers report back to the
//! coordinator as [`Event::Flush`] tagged with a generation; a flush whose
//! generation is no longer current is ignored.
//!
//! Per-module phases:
//!
//! ```text
//! Idle ──change──▶ PendingWrite ──fire (remote)──▶ Idle
//!                       │
//!                       └──fire (local)──▶ Writing ──settled──▶ Idle
//! ```
//!
//! A change during `Writing` re-enters `PendingWrite` without waiting for
//! the in-flight write.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use capkit_core::ModuleName;

use crate::runtime::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePhase {
    Idle,
    PendingWrite,
    Writing,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    timer: Option<AbortHandle>,
    in_flight: usize,
}

pub(crate) struct DebouncedPersister {
    delay: Duration,
    slots: HashMap<ModuleName, Slot>,
    events: mpsc::UnboundedSender<Event>,
}

impl DebouncedPersister {
    pub(crate) fn new(delay: Duration, events: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            delay,
            slots: HashMap::new(),
            events,
        }
    }

    /// (Re)start the module's timer.
    pub(crate) fn schedule(&mut self, module: ModuleName, epoch: u64) {
        let slot = self.slots.entry(module).or_default();
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        slot.generation += 1;

        let generation = slot.generation;
        let deadline = tokio::time::Instant::now() + self.delay;
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = events.send(Event::Flush {
                epoch,
                module,
                generation,
            });
        });
        slot.timer = Some(handle.abort_handle());
    }

    /// Claim a timer fire. `false` if the fire was superseded or cancelled.
    pub(crate) fn take_due(&mut self, module: ModuleName, generation: u64) -> bool {
        match self.slots.get_mut(&module) {
            Some(slot) if slot.generation == generation && slot.timer.is_some() => {
                slot.timer = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn begin_write(&mut self, module: ModuleName) {
        self.slots.entry(module).or_default().in_flight += 1;
    }

    pub(crate) fn write_settled(&mut self, module: ModuleName) {
        if let Some(slot) = self.slots.get_mut(&module) {
            slot.in_flight = slot.in_flight.saturating_sub(1);
        }
    }

    pub(crate) fn phase(&self, module: ModuleName) -> WritePhase {
        match self.slots.get(&module) {
            Some(slot) if slot.timer.is_some() => WritePhase::PendingWrite,
            Some(slot) if slot.in_flight > 0 => WritePhase::Writing,
            _ => WritePhase::Idle,
        }
    }

    /// Abort every pending timer and forget in-flight writes.
    pub(crate) fn cancel_all(&mut self) {
        for slot in self.slots.values_mut() {
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
        }
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<(ModuleName, u64)> {
        let mut fired = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Event::Flush {
                module, generation, ..
            } = event
            {
                fired.push((module, generation));
            }
        }
        fired
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn rescheduling_restarts_the_quiet_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut persister = DebouncedPersister::new(Duration::from_millis(100), tx);

        persister.schedule(ModuleName::Canvas, 1);
        advance(Duration::from_millis(60)).await;
        persister.schedule(ModuleName::Canvas, 1);
        advance(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        assert!(drain(&mut rx).is_empty(), "first timer must not fire");
        assert_eq!(persister.phase(ModuleName::Canvas), WritePhase::PendingWrite);

        advance(Duration::from_millis(50)).await;
        match rx.recv().await {
            Some(Event::Flush {
                module, generation, ..
            }) => assert_eq!((module, generation), (ModuleName::Canvas, 2)),
            _ => panic!("expected a flush"),
        }
        assert!(drain(&mut rx).is_empty(), "exactly one flush");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn stale_generation_is_not_due() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut persister = DebouncedPersister::new(Duration::from_millis(100), tx);
        persister.schedule(ModuleName::Grow, 1);
        persister.schedule(ModuleName::Grow, 1);

        assert!(!persister.take_due(ModuleName::Grow, 1));
        assert!(persister.take_due(ModuleName::Grow, 2));
        assert!(!persister.take_due(ModuleName::Grow, 2), "a fire is claimed once");
        assert_eq!(persister.phase(ModuleName::Grow), WritePhase::Idle);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn phases_follow_the_write_cycle() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut persister = DebouncedPersister::new(Duration::from_millis(100), tx);
        assert_eq!(persister.phase(ModuleName::Sales), WritePhase::Idle);

        persister.schedule(ModuleName::Sales, 1);
        assert!(persister.take_due(ModuleName::Sales, 1));
        persister.begin_write(ModuleName::Sales);
        assert_eq!(persister.phase(ModuleName::Sales), WritePhase::Writing);

        persister.schedule(ModuleName::Sales, 1);
        assert_eq!(persister.phase(ModuleName::Sales), WritePhase::PendingWrite);

        assert!(persister.take_due(ModuleName::Sales, 2));
        persister.write_settled(ModuleName::Sales);
        assert_eq!(persister.phase(ModuleName::Sales), WritePhase::Idle);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn cancel_all_silences_pending_timers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut persister = DebouncedPersister::new(Duration::from_millis(100), tx);
        persister.schedule(ModuleName::Canvas, 1);
        persister.schedule(ModuleName::Personas, 1);
        persister.cancel_all();

        advance(Duration::from_millis(500)).await;
        tokio::task::yield_now().await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(persister.phase(ModuleName::Canvas), WritePhase::Idle);
    }
}
