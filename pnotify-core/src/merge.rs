//! Coalescing of adjacent duplicate events.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::event::{Event, EventData, EventHandle, EventMask};

/// Check if two events carry the same information.
///
/// Private data is not compared. For inode events only the name is
/// inspected: once `old` is queued its inode may be gone, so nothing
/// beyond the fields captured at construction is looked at.
pub fn equivalent(old: &Event, new: &Event) -> bool {
    if old.mask() != new.mask()
        || old.to_tell() != new.to_tell()
        || old.data_type() != new.data_type()
        || old.name_len() != new.name_len()
    {
        return false;
    }

    match (old.data(), new.data()) {
        (EventData::Inode, _) => old.name_len() == 0 || old.name() == new.name(),
        (
            EventData::Path {
                mount: old_mount,
                dentry: old_dentry,
            },
            EventData::Path {
                mount: new_mount,
                dentry: new_dentry,
            },
        ) => old_mount == new_mount && old_dentry == new_dentry,
        (EventData::None, _) => {
            if old.mask().contains(EventMask::Q_OVERFLOW) {
                true
            } else {
                !old.mask().contains(EventMask::IGNORED)
            }
        }
        _ => false,
    }
}

/// Merge `event` into the tail of `list` if they are equivalent.
///
/// Returns a new reference to the tail on a match; the caller must then
/// treat `event` as a duplicate. The caller holds the group queue lock.
pub fn try_merge(list: &VecDeque<EventHandle>, event: &Event) -> Option<EventHandle> {
    let _event_lock = event.lock();

    let last = list.back()?;
    if equivalent(last, event) {
        Some(Arc::clone(last))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DentryId, InodeId, MountId};
    use pretty_assertions::assert_eq;

    fn modify(inode: u64, name: Option<&str>) -> Event {
        Event::inode(EventMask::MODIFY, InodeId(inode), name)
    }

    #[test]
    fn test_identical_inode_events_merge() {
        assert!(equivalent(&modify(5, Some("a.txt")), &modify(5, Some("a.txt"))));
        assert!(equivalent(&modify(5, None), &modify(5, None)));
    }

    #[test]
    fn test_single_field_changes_prevent_merge() {
        let base = modify(5, Some("a.txt"));

        assert!(!equivalent(
            &base,
            &Event::inode(EventMask::ATTRIB, InodeId(5), Some("a.txt"))
        ));
        assert!(!equivalent(&base, &modify(6, Some("a.txt"))));
        assert!(!equivalent(&base, &modify(5, Some("b.txt"))));
        assert!(!equivalent(&base, &modify(5, Some("a.txt2"))));
        assert!(!equivalent(&base, &modify(5, None)));
        assert!(!equivalent(
            &base,
            &Event::path(EventMask::MODIFY, InodeId(5), MountId(1), DentryId(1))
        ));
    }

    #[test]
    fn test_cookie_is_not_compared() {
        let old = modify(5, Some("a.txt")).with_cookie(1);
        let new = modify(5, Some("a.txt")).with_cookie(2);
        assert!(equivalent(&old, &new));
    }

    #[test]
    fn test_path_events_compare_mount_and_dentry() {
        let old = Event::path(EventMask::OPEN, InodeId(3), MountId(1), DentryId(10));

        assert!(equivalent(
            &old,
            &Event::path(EventMask::OPEN, InodeId(3), MountId(1), DentryId(10))
        ));
        assert!(!equivalent(
            &old,
            &Event::path(EventMask::OPEN, InodeId(3), MountId(2), DentryId(10))
        ));
        assert!(!equivalent(
            &old,
            &Event::path(EventMask::OPEN, InodeId(3), MountId(1), DentryId(11))
        ));
    }

    #[test]
    fn test_overflow_events_always_merge() {
        let old = Event::control(EventMask::Q_OVERFLOW);
        let new = Event::control(EventMask::Q_OVERFLOW).with_cookie(9);
        assert!(equivalent(&old, &new));
    }

    #[test]
    fn test_ignored_events_never_merge() {
        let old = Event::control(EventMask::IGNORED);
        let new = Event::control(EventMask::IGNORED);
        assert!(!equivalent(&old, &new));
    }

    #[test]
    fn test_plain_control_events_merge() {
        let old = Event::control(EventMask::UNMOUNT);
        let new = Event::control(EventMask::UNMOUNT);
        assert!(equivalent(&old, &new));
    }

    #[test]
    fn test_try_merge_empty_list() {
        let list = VecDeque::new();
        assert!(try_merge(&list, &modify(1, None)).is_none());
    }

    #[test]
    fn test_try_merge_takes_reference_on_tail() {
        let tail = modify(5, Some("a.txt")).into_handle();
        let list = VecDeque::from([Arc::clone(&tail)]);

        let merged = try_merge(&list, &modify(5, Some("a.txt"))).unwrap();
        assert!(Arc::ptr_eq(&merged, &tail));
        // test handle + list + merge
        assert_eq!(Arc::strong_count(&tail), 3);

        assert!(try_merge(&list, &modify(5, Some("b.txt"))).is_none());
        assert_eq!(Arc::strong_count(&tail), 3);
    }

    #[test]
    fn test_try_merge_only_looks_at_tail() {
        let list = VecDeque::from([
            modify(5, Some("a.txt")).into_handle(),
            modify(5, Some("b.txt")).into_handle(),
        ]);
        assert!(try_merge(&list, &modify(5, Some("a.txt"))).is_none());
    }

    #[test]
    fn test_try_merge_releases_event_lock() {
        let list = VecDeque::from([modify(5, None).into_handle()]);
        let event = modify(5, None);

        assert!(try_merge(&list, &event).is_some());
        assert_eq!(event.attachment_count(), 0);
        assert!(try_merge(&list, &event).is_some());
    }
}
