//! Ordered, capacity-capped set of items.
//!
//! Insertion order is display order and batch export numbering. Each item
//! is independently owned; removing one never affects another.
//!
//! ## Admission
//!
//! [`Collection::admit`] mirrors how a file picker hands over a batch:
//!
//! 1. Inputs whose declared type is not JPEG/PNG are skipped.
//! 2. If the collection is full, nothing is admitted
//!    ([`AdmissionNotice::CapacityReached`]).
//! 3. Otherwise the first `free slots` supported inputs are decoded; the rest
//!    are dropped ([`AdmissionNotice::PartiallyAdmitted`]).
//! 4. Decode failures are reported and never become items.

use crate::acquire::{DecodeError, SourceFile, decode};
use crate::imaging::ImageBackend;
use crate::item::{ImageItem, ItemId, ItemParams};

/// Default maximum number of items.
pub const MAX_ITEMS: usize = 30;

/// User-facing notice attached to an admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionNotice {
    /// The collection was already full; nothing was added.
    CapacityReached { capacity: usize },
    /// Only the first inputs fitting the remaining capacity were added.
    PartiallyAdmitted { capacity: usize },
}

/// Outcome of [`Collection::admit`].
#[derive(Debug, Default)]
pub struct Admission {
    pub accepted: Vec<ItemId>,
    /// Names of inputs with an unsupported declared type.
    pub unsupported: Vec<String>,
    /// Names of supported inputs dropped for lack of capacity.
    pub dropped: Vec<String>,
    pub failed: Vec<DecodeError>,
    pub notice: Option<AdmissionNotice>,
}

#[derive(Debug)]
pub struct Collection {
    items: Vec<ImageItem>,
    capacity: usize,
    next_id: u64,
}

impl Default for Collection {
    fn default() -> Self {
        Self::with_capacity(MAX_ITEMS)
    }
}

impl Collection {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity,
            next_id: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn available_slots(&self) -> usize {
        self.capacity.saturating_sub(self.items.len())
    }

    /// Decode and add a batch of inputs. See the [module docs](self).
    pub fn admit(
        &mut self,
        backend: &impl ImageBackend,
        files: Vec<SourceFile>,
        defaults: &ItemParams,
    ) -> Admission {
        let mut admission = Admission::default();
        let (supported, unsupported): (Vec<_>, Vec<_>) =
            files.into_iter().partition(SourceFile::is_accepted);
        admission.unsupported = unsupported.into_iter().map(|f| f.name).collect();

        if supported.is_empty() {
            return admission;
        }
        let slots = self.available_slots();
        if slots == 0 {
            tracing::warn!(capacity = self.capacity, "collection full, inputs rejected");
            admission.dropped = supported.into_iter().map(|f| f.name).collect();
            admission.notice = Some(AdmissionNotice::CapacityReached {
                capacity: self.capacity,
            });
            return admission;
        }

        let mut supported = supported.into_iter();
        for file in supported.by_ref().take(slots) {
            match decode(backend, &file) {
                Ok(source) => {
                    let id = ItemId(self.next_id);
                    self.next_id += 1;
                    self.items.push(ImageItem::new(id, source, defaults.clone()));
                    admission.accepted.push(id);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "input rejected");
                    admission.failed.push(e);
                }
            }
        }

        admission.dropped = supported.map(|f| f.name).collect();
        if !admission.dropped.is_empty() {
            admission.notice = Some(AdmissionNotice::PartiallyAdmitted {
                capacity: self.capacity,
            });
        }
        admission
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.position(id).is_some()
    }

    /// 0-based position in insertion order.
    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    pub fn get(&self, id: ItemId) -> Option<&ImageItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut ImageItem> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageItem> {
        self.items.iter()
    }

    /// Item ids in insertion order.
    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(ImageItem::id).collect()
    }

    pub fn remove(&mut self, id: ItemId) -> Option<ImageItem> {
        let pos = self.position(id)?;
        Some(self.items.remove(pos))
    }

    /// Remove every item. Ids are not reused afterwards.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
