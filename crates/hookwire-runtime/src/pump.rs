//! Inbound event pump.
//!
//! Events arrive on a single channel and are fanned out to one worker task
//! per room. A room's events are routed strictly in arrival order; different
//! rooms proceed concurrently.
//!
//! The dispatcher never waits on a room: when a room's queue is full the
//! event is dropped and logged, so a stalled room cannot hold up the others.
//! A worker that sees no events for the idle timeout is stopped and its
//! queue released; the next event for that room starts a fresh worker.
//!
//! The pump stops when the inbound channel closes or its
//! [`CancellationToken`] is cancelled. On close, queued events are drained;
//! on cancel, each worker finishes the event it is routing and stops.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hookwire_core::InboundEvent;
use hookwire_framework::MessageRouter;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// How long a room worker waits for events before stopping.
pub const DEFAULT_ROOM_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Counters reported when the pump stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Events taken off the inbound channel.
    pub received: u64,
    /// Events the router finished with.
    pub routed: u64,
    /// Events dropped because their room's queue was full.
    pub dropped: u64,
    /// Room workers started, counting restarts after idling.
    pub rooms: usize,
    /// Room workers stopped for being idle.
    pub reaped: u64,
}

/// Fans inbound events out to per-room workers.
pub struct EventPump {
    router: MessageRouter,
    room_capacity: usize,
    idle_timeout: Duration,
    cancel: CancellationToken,
}

/// The pump's handle on a running room worker.
struct RoomWorker {
    generation: u64,
    queue: mpsc::Sender<InboundEvent>,
    /// Events accepted into `queue`.
    sent: u64,
}

/// Sent once by a worker after it has been idle for the timeout.
struct IdleNotice {
    room_id: String,
    generation: u64,
    /// Events the worker had routed when it went idle.
    done: u64,
}

impl EventPump {
    /// Creates a pump; `room_capacity` bounds each room's backlog.
    pub fn new(router: MessageRouter, room_capacity: usize, cancel: CancellationToken) -> Self {
        Self {
            router,
            room_capacity: room_capacity.max(1),
            idle_timeout: DEFAULT_ROOM_IDLE_TIMEOUT,
            cancel,
        }
    }

    /// Sets how long a room worker may sit without events.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Routes events until the channel closes or the pump is cancelled, then
    /// waits for every worker to stop.
    pub async fn run(self, mut events: mpsc::Receiver<InboundEvent>) -> PumpStats {
        let tracker = TaskTracker::new();
        let routed = Arc::new(AtomicU64::new(0));
        let (idle_tx, mut idle_rx) = mpsc::unbounded_channel();
        let mut rooms: HashMap<String, RoomWorker> = HashMap::new();
        let mut stats = PumpStats::default();
        let mut generation = 0;

        loop {
            let event = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    debug!("Event pump cancelled");
                    break;
                }
                // Never closes: `idle_tx` lives as long as this loop.
                Some(notice) = idle_rx.recv() => {
                    if reap(&mut rooms, &notice) {
                        debug!(room_id = %notice.room_id, "Stopped idle room worker");
                        stats.reaped += 1;
                    }
                    continue;
                }
                event = events.recv() => match event {
                    Some(event) => event,
                    None => {
                        debug!("Inbound channel closed");
                        break;
                    }
                },
            };
            stats.received += 1;

            let worker = rooms.entry(event.room_id.clone()).or_insert_with(|| {
                generation += 1;
                stats.rooms += 1;
                let (tx, rx) = mpsc::channel(self.room_capacity);
                debug!(room_id = %event.room_id, generation, "Starting room worker");
                tracker.spawn(room_worker(
                    RoomContext {
                        room_id: event.room_id.clone(),
                        generation,
                        router: self.router.clone(),
                        cancel: self.cancel.clone(),
                        idle_timeout: self.idle_timeout,
                        routed: Arc::clone(&routed),
                        idle: idle_tx.clone(),
                    },
                    rx,
                ));
                RoomWorker {
                    generation,
                    queue: tx,
                    sent: 0,
                }
            });

            match worker.queue.try_send(event) {
                Ok(()) => worker.sent += 1,
                Err(TrySendError::Full(event)) => {
                    warn!(
                        room_id = %event.room_id,
                        event_id = %event.event_id,
                        capacity = self.room_capacity,
                        "Room queue full, dropping event"
                    );
                    stats.dropped += 1;
                }
                // A worker only exits while still mapped once cancelled.
                Err(TrySendError::Closed(_)) => break,
            }
        }

        drop(rooms);
        tracker.close();
        tracker.wait().await;

        stats.routed = routed.load(Ordering::Relaxed);
        info!(
            received = stats.received,
            routed = stats.routed,
            dropped = stats.dropped,
            rooms = stats.rooms,
            reaped = stats.reaped,
            "Event pump stopped"
        );
        stats
    }
}

/// Removes the worker named by `notice` if it is still current and has
/// nothing queued. Dropping its sender lets the worker exit.
fn reap(rooms: &mut HashMap<String, RoomWorker>, notice: &IdleNotice) -> bool {
    let idle = rooms
        .get(&notice.room_id)
        .is_some_and(|w| w.generation == notice.generation && w.sent == notice.done);
    if idle {
        rooms.remove(&notice.room_id);
    }
    idle
}

struct RoomContext {
    room_id: String,
    generation: u64,
    router: MessageRouter,
    cancel: CancellationToken,
    idle_timeout: Duration,
    routed: Arc<AtomicU64>,
    idle: mpsc::UnboundedSender<IdleNotice>,
}

async fn room_worker(ctx: RoomContext, mut queue: mpsc::Receiver<InboundEvent>) {
    let mut done = 0;
    let mut reported_idle = false;
    loop {
        let event = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => break,
            event = queue.recv() => match event {
                Some(event) => event,
                None => break,
            },
            () = tokio::time::sleep(ctx.idle_timeout), if !reported_idle => {
                reported_idle = true;
                let notice = IdleNotice {
                    room_id: ctx.room_id.clone(),
                    generation: ctx.generation,
                    done,
                };
                if ctx.idle.send(notice).is_err() {
                    break;
                }
                continue;
            }
        };
        reported_idle = false;
        ctx.router.route(event).await;
        done += 1;
        ctx.routed.fetch_add(1, Ordering::Relaxed);
    }
}
