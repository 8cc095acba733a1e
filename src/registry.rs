//! The group registry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::group::{self, Group, GroupId, GroupInfo, INVALID_GROUP};
use crate::vec::FixedVec;

/// The table of groups.
///
/// All slots exist from the start, so the table itself never changes and can be read without the
/// global lock. The lock only orders the creation of groups and lookups by name.
pub struct Registry {
    /// The slots.
    groups: FixedVec<Group>,
    /// The number of live groups. Slots below this are live.
    count: AtomicUsize,
    /// The global lock.
    lock: Mutex<()>,
}

impl Registry {
    /// Create a registry with room for `max_groups` groups.
    pub fn new(max_groups: usize) -> Result<Registry> {
        if max_groups == 0 || max_groups > INVALID_GROUP as usize {
            return Err(Error::GroupsExhausted(max_groups));
        }

        let mut groups = FixedVec::with_capacity(max_groups).ok_or(Error::OutOfMemory)?;
        for id in 0..max_groups {
            let slot = Group::slot(id as GroupId).ok_or(Error::OutOfMemory)?;
            if groups.push(slot).is_err() {
                return Err(Error::OutOfMemory);
            }
        }

        Ok(Registry {
            groups,
            count: AtomicUsize::new(0),
            lock: Mutex::new(()),
        })
    }

    /// The maximal number of groups.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.groups.capacity()
    }

    /// The number of live groups.
    #[inline]
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Add a group.
    ///
    /// The slot is reserved under the global lock. The first page is obtained after the lock is
    /// released; if that fails, the group stays valid and grows on its first allocation.
    pub fn add(&self, info: GroupInfo) -> Result<GroupId> {
        let info = info.validated()?;

        let group = {
            let _guard = group::lock(&self.lock);

            let id = self.count.load(Ordering::Relaxed);
            let group = self.groups.get(id).ok_or(Error::GroupsExhausted(self.capacity()))?;
            raw_assert!(group.activate(info), "Group slot {} is already live.", id);
            self.count.store(id + 1, Ordering::Release);

            group
        };

        if let Err(err) = group.reserve_first_page() {
            log!(Warning, "Group {} (`{}`) has no initial page: {}.", group.id(), info.name, err);
        }
        log!(Info, "Group {} (`{}`) added with pages of {} bytes.", group.id(), info.name,
             info.page_size);

        Ok(group.id())
    }

    /// Get a live group.
    pub fn get(&self, id: GroupId) -> Result<&Group> {
        if (id as usize) < self.len() {
            Ok(&self.groups[id as usize])
        } else {
            Err(Error::InvalidGroup(id))
        }
    }

    /// Find a group by name.
    pub fn lookup(&self, name: &str) -> Result<GroupId> {
        let _guard = group::lock(&self.lock);

        self.live()
            .find(|group| group.info().map_or(false, |info| info.name == name))
            .map(Group::id)
            .ok_or(Error::UnknownGroup)
    }

    /// Iterate over the live groups.
    pub fn live(&self) -> impl Iterator<Item = &Group> {
        self.groups[..self.len()].iter()
    }
}
