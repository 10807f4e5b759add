//! The engine's inbound event channel.
//!
//! Watcher callbacks (scroll, visibility, mutation) and user triggers are
//! delivered as messages on one bounded channel consumed by the engine
//! loop. Re-entrancy is impossible by construction: there is exactly one
//! consumer and appends run to completion before the next event is read.

use std::time::Duration;

use tokio::sync::mpsc;

/// Capacity of the engine event channel. Scroll events are throttled at
/// the detector, so a small buffer is enough; senders back off when the
/// engine is mid-append.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// User or keyboard trigger commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Move down; substitutes the session's real action when already at
    /// the last known page.
    Down,
    /// Move up one page.
    Up,
    /// Toggle the session on or off.
    Power,
    /// Toggle auto mode.
    Auto,
    /// Disable and blacklist the current address.
    Blacklist,
    /// Return to list mode.
    ReturnToList,
}

impl Command {
    /// Control commands perform only their control effect; no append.
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, Self::Power | Self::Auto | Self::Blacklist | Self::ReturnToList)
    }
}

/// Inbound engine events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    /// The host viewport scrolled to an absolute offset.
    Scroll { y: f64 },
    /// Visibility of tracked anchors may have changed (geometry moved
    /// without a scroll, e.g. media loaded).
    Visibility,
    /// A user/keyboard trigger.
    Trigger(Command),
    /// Auto-mode timer tick.
    AutoTick,
    /// The host document mutated (single-page-app watcher).
    Mutated,
    /// Stop the engine loop.
    Shutdown,
}

/// Sending half handed to watchers and UI triggers.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineEvent>,
}

impl EngineHandle {
    pub async fn send(&self, event: EngineEvent) {
        if self.tx.send(event).await.is_err() {
            tracing::debug!(?event, "engine loop gone, event dropped");
        }
    }

    /// Non-blocking send for high-frequency signals; drops on a full
    /// channel, which is safe because scroll positions are absolute.
    pub fn send_now(&self, event: EngineEvent) {
        if self.tx.try_send(event).is_err() {
            tracing::trace!(?event, "event channel full, signal dropped");
        }
    }
}

/// Build the engine event channel.
#[must_use]
pub fn channel() -> (EngineHandle, mpsc::Receiver<EngineEvent>) {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    (EngineHandle { tx }, rx)
}

/// Spawn a task that delivers [`EngineEvent::AutoTick`] every `period`
/// (typically the session's auto-seconds setting). The engine ignores
/// ticks while auto mode is off, so the ticker may run for the whole
/// session; it ends itself when the engine loop goes away.
pub fn spawn_auto_ticker(
    handle: EngineHandle,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // the first interval tick fires immediately
        timer.tick().await;
        loop {
            timer.tick().await;
            if handle.tx.is_closed() {
                break;
            }
            handle.send(EngineEvent::AutoTick).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_commands_never_append() {
        assert!(Command::Power.is_control());
        assert!(Command::Auto.is_control());
        assert!(!Command::Down.is_control());
        assert!(!Command::Up.is_control());
    }

    #[tokio::test(start_paused = true)]
    async fn auto_ticker_delivers_ticks() {
        let (handle, mut rx) = channel();
        let task = spawn_auto_ticker(handle, Duration::from_secs(30));
        assert_eq!(rx.recv().await, Some(EngineEvent::AutoTick));
        task.abort();
    }

    #[tokio::test]
    async fn dropped_scrolls_are_safe() {
        let (handle, mut rx) = channel();
        for i in 0..(EVENT_CHANNEL_CAPACITY + 10) {
            handle.send_now(EngineEvent::Scroll { y: i as f64 });
        }
        // Channel holds at most its capacity; the rest were dropped.
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, EVENT_CHANNEL_CAPACITY);
    }
}
