use std::sync::Arc;

use holdall_externalize::{ExternalForm, Externalizable, Member, StandardAttributes};
use holdall_merge::ModTracked;
use holdall_types::{ModTime, Timestamp};

use crate::contained::Contained;

/// A list that remembers the newest modification time of everything
/// added to it.
#[derive(Clone, Debug)]
pub struct ModTrackedList<T> {
    items: Vec<T>,
    modified: ModTime,
}

impl<T> ModTrackedList<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            modified: ModTime::zero(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last_modified(&self) -> Timestamp {
        self.modified.value()
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Append `items` modified at `t`.
    pub fn extend_at(&mut self, items: impl IntoIterator<Item = T>, t: Timestamp) {
        self.items.extend(items);
        self.modified.update_if_greater(Some(t));
    }

    /// Append another tracked list, keeping the newer timestamp.
    pub fn extend_tracked(&mut self, other: ModTrackedList<T>) {
        let t = other.last_modified();
        self.extend_at(other.items, t);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> Default for ModTrackedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for ModTrackedList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
            modified: ModTime::zero(),
        }
    }
}

impl<T> ModTracked for ModTrackedList<T> {
    fn mod_time(&self) -> ModTime {
        self.modified
    }

    fn set_mod_time(&mut self, t: ModTime) {
        self.modified = t;
    }
}

impl Externalizable for ModTrackedList<Arc<dyn Contained>> {
    fn standard(&self) -> StandardAttributes {
        StandardAttributes {
            last_modified: Some(self.last_modified()),
            ..Default::default()
        }
    }

    fn external_form(&self) -> ExternalForm<'_> {
        ExternalForm::Sequence(
            self.items
                .iter()
                .map(|obj| {
                    let shared: Arc<dyn Externalizable> = obj.clone();
                    Member::Shared(shared)
                })
                .collect(),
        )
    }
}
