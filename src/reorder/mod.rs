//! Client-side drag reordering with optimistic updates.
//!
//! A completed gesture reindexes the visible list at once, the batch is
//! persisted after a debounce, and a failed batch restores the last order the
//! server confirmed.

mod debounce;
mod gesture;
mod persist;
mod session;

pub use debounce::Debouncer;
pub use gesture::{Activation, ActivationConstraint, KeyboardMove, PendingActivation, PointerKind};
pub use persist::{HttpOrderClient, OrderPersistence, PersistError, StoreOrderPersistence};
pub use session::{PendingReorder, ReorderEvent, ReorderSession, ReorderState};

use std::time::Duration;

use crate::models::{Link, OrderUpdate, Page};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Anything shown in a user-sortable list.
pub trait Orderable: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    fn set_order(&mut self, order: u32);
}

impl Orderable for Link {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

impl Orderable for Page {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

/// Move `from` to `to` and give every item its new zero-based position.
/// Returns the full batch for persistence.
pub fn move_and_reindex<T: Orderable>(items: &mut Vec<T>, from: usize, to: usize) -> Vec<OrderUpdate> {
    let item = items.remove(from);
    items.insert(to.min(items.len()), item);
    reindex(items)
}

pub fn reindex<T: Orderable>(items: &mut [T]) -> Vec<OrderUpdate> {
    items
        .iter_mut()
        .enumerate()
        .map(|(position, item)| {
            item.set_order(position as u32);
            OrderUpdate {
                id: item.id().to_string(),
                order: position as u32,
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Orderable;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Item {
        pub id: String,
        pub order: u32,
    }

    impl Orderable for Item {
        fn id(&self) -> &str {
            &self.id
        }

        fn set_order(&mut self, order: u32) {
            self.order = order;
        }
    }

    pub fn items(ids: &[&str]) -> Vec<Item> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Item {
                id: id.to_string(),
                order: i as u32,
            })
            .collect()
    }

    pub fn ids(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }
}
