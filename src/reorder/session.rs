use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::debounce::Debouncer;
use super::gesture::KeyboardMove;
use super::persist::OrderPersistence;
use super::{Orderable, move_and_reindex};
use crate::models::OrderUpdate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderState {
    /// Visible list equals the last confirmed order.
    Idle,
    DraggingLocally { active_id: String, origin: usize },
    /// Optimistic order shown, debounce timer armed.
    PendingPersist,
    Persisting,
    /// The list was restored after a failed batch; gestures queued on top of
    /// it are being discarded.
    RollingBack,
}

/// Notifications for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderEvent {
    Persisted { items: usize },
    RolledBack { message: String },
}

// The latest desired arrangement waiting for the debounce timer
#[derive(Debug, Clone)]
pub struct PendingReorder<T> {
    pub generation: u64,
    pub items: Vec<OrderUpdate>,
    pub arrangement: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    PendingPersist,
    Persisting,
    RollingBack,
}

struct SessionState<T> {
    phase: Phase,
    drag: Option<(String, usize)>,
    items: Vec<T>,
    confirmed: Vec<T>,
    // bumped by every completed gesture
    generation: u64,
    // gestures up to this generation were rolled back and must not be sent
    discarded_through: u64,
}

/// One sortable list on screen (the page sidebar or a page's links).
///
/// Dropping the session cancels a batch still waiting on its debounce timer.
/// A batch already in flight finishes, but its result only updates the
/// session's own state.
pub struct ReorderSession<T: Orderable> {
    shared: Arc<Mutex<SessionState<T>>>,
    debouncer: Debouncer<PendingReorder<T>>,
    persistence: Arc<dyn OrderPersistence>,
    events: mpsc::UnboundedSender<ReorderEvent>,
}

impl<T: Orderable> ReorderSession<T> {
    /// `items` must already be in display order.
    pub fn new(
        items: Vec<T>,
        persistence: Arc<dyn OrderPersistence>,
        debounce: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ReorderEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let session = Self {
            shared: Arc::new(Mutex::new(SessionState {
                phase: Phase::Idle,
                drag: None,
                confirmed: items.clone(),
                items,
                generation: 0,
                discarded_through: 0,
            })),
            debouncer: Debouncer::new(debounce),
            persistence,
            events,
        };
        (session, rx)
    }

    pub fn items(&self) -> Vec<T> {
        self.shared.lock().items.clone()
    }

    pub fn confirmed(&self) -> Vec<T> {
        self.shared.lock().confirmed.clone()
    }

    pub fn state(&self) -> ReorderState {
        let shared = self.shared.lock();
        if let Some((active_id, origin)) = &shared.drag {
            return ReorderState::DraggingLocally {
                active_id: active_id.clone(),
                origin: *origin,
            };
        }
        match shared.phase {
            Phase::Idle => ReorderState::Idle,
            Phase::PendingPersist => ReorderState::PendingPersist,
            Phase::Persisting => ReorderState::Persisting,
            Phase::RollingBack => ReorderState::RollingBack,
        }
    }

    /// An activated pointer drag picked up `id`.
    pub fn begin_drag(&self, id: &str) -> bool {
        if self.debouncer.is_closed() {
            return false;
        }
        let mut shared = self.shared.lock();
        match position(&shared.items, id) {
            Some(origin) => {
                shared.drag = Some((id.to_string(), origin));
                true
            }
            None => false,
        }
    }

    pub fn cancel_drag(&self) {
        self.shared.lock().drag = None;
    }

    /// The active drag ended over `over_id`. Returns whether the order changed.
    pub fn drop_on(&self, over_id: &str) -> bool {
        let drag = self.shared.lock().drag.take();
        let Some((active_id, _)) = drag else {
            return false;
        };
        let target = position(&self.shared.lock().items, over_id);
        match target {
            Some(to) => self.move_item(&active_id, to),
            None => false,
        }
    }

    /// Keyboard path; same debounce, persist and rollback as pointer drags.
    pub fn move_by_key(&self, id: &str, step: KeyboardMove) -> bool {
        let target = {
            let shared = self.shared.lock();
            position(&shared.items, id).and_then(|from| step.target(from, shared.items.len()))
        };
        match target {
            Some(to) => self.move_item(id, to),
            None => false,
        }
    }

    /// Move `id` to index `to`, show the result and schedule persistence.
    /// Moving an item onto its own position is a no-op, and a closed session
    /// refuses every move.
    pub fn move_item(&self, id: &str, to: usize) -> bool {
        if self.debouncer.is_closed() {
            return false;
        }
        let pending = {
            let mut shared = self.shared.lock();
            let Some(from) = position(&shared.items, id) else {
                return false;
            };
            let to = to.min(shared.items.len().saturating_sub(1));
            if from == to {
                return false;
            }

            let updates = move_and_reindex(&mut shared.items, from, to);
            shared.generation += 1;
            shared.phase = Phase::PendingPersist;
            debug!(id, from, to, generation = shared.generation, "optimistic reorder");
            PendingReorder {
                generation: shared.generation,
                items: updates,
                arrangement: shared.items.clone(),
            }
        };

        let shared = self.shared.clone();
        let persistence = self.persistence.clone();
        let events = self.events.clone();
        self.debouncer.schedule(pending, move |pending| {
            persist_pending(shared, persistence, events, pending)
        });
        true
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Stop scheduling: a batch not yet sent never will be, and the visible
    /// list returns to the last confirmed order.
    pub fn close(&self) {
        self.debouncer.close();
        let mut shared = self.shared.lock();
        shared.drag = None;
        if matches!(shared.phase, Phase::PendingPersist | Phase::RollingBack) {
            shared.items = shared.confirmed.clone();
            shared.phase = Phase::Idle;
        }
    }
}

fn position<T: Orderable>(items: &[T], id: &str) -> Option<usize> {
    items.iter().position(|item| item.id() == id)
}

async fn persist_pending<T: Orderable>(
    shared: Arc<Mutex<SessionState<T>>>,
    persistence: Arc<dyn OrderPersistence>,
    events: mpsc::UnboundedSender<ReorderEvent>,
    pending: PendingReorder<T>,
) {
    {
        let mut state = shared.lock();
        if pending.generation <= state.discarded_through {
            // the last gesture built on a failed order is gone
            if state.phase == Phase::RollingBack && state.generation == pending.generation {
                state.phase = Phase::Idle;
            }
            return;
        }
        state.phase = Phase::Persisting;
    }

    let count = pending.items.len();
    let result = persistence.persist(pending.items).await;

    let mut state = shared.lock();
    match result {
        Ok(()) => {
            state.confirmed = pending.arrangement;
            if state.phase == Phase::Idle {
                // closed while in flight, show what was stored
                state.items = state.confirmed.clone();
            } else if state.generation == pending.generation {
                state.phase = Phase::Idle;
            }
            let _ = events.send(ReorderEvent::Persisted { items: count });
        }
        Err(err) => {
            warn!(error = %err, "order batch failed, rolling back");
            state.items = state.confirmed.clone();
            // later gestures were built on the failed order; stay in
            // RollingBack until their timer has been dropped
            state.discarded_through = state.generation;
            state.phase = if state.generation == pending.generation {
                Phase::Idle
            } else {
                Phase::RollingBack
            };
            let _ = events.send(ReorderEvent::RolledBack {
                message: format!("Failed to save the new order: {}", err),
            });
        }
    }
}
