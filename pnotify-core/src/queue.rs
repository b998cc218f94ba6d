//! Per-group notification queue.
//!
//! This is the append-or-merge primitive the backend hands events to. The
//! queue lock serializes every enqueue and merge decision for one group; the
//! merge callback runs while it is held.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{NotifyError, Result};
use crate::event::{Event, EventHandle, EventMask};
use crate::group::GroupId;
use crate::private::EventPrivate;

/// Merge callback consulted against the queue tail.
pub type MergeFn = fn(&VecDeque<EventHandle>, &Event) -> Option<EventHandle>;

/// Outcome of [`NotificationQueue::enqueue`].
#[derive(Debug)]
pub enum Enqueued {
    /// The event is the new tail and owns the attachment.
    Added,

    /// Another event took its place: the tail it merged into, or the
    /// overflow event. The attachment was not bound and is handed back.
    Replaced {
        event: EventHandle,
        attachment: Option<EventPrivate>,
    },
}

struct QueueState {
    events: VecDeque<EventHandle>,
    shut_down: bool,
}

/// Pending events of one group, in delivery order.
pub struct NotificationQueue {
    group: GroupId,
    state: Mutex<QueueState>,
    max_events: usize,
    overflow: EventHandle,
}

impl NotificationQueue {
    /// Create an empty queue holding at most `max_events` regular events.
    pub fn new(group: GroupId, max_events: usize) -> Self {
        Self {
            group,
            state: Mutex::new(QueueState {
                events: VecDeque::new(),
                shut_down: false,
            }),
            max_events,
            overflow: Event::control(EventMask::Q_OVERFLOW).into_handle(),
        }
    }

    /// Append `event`, or merge it into the tail.
    ///
    /// When the queue is full the overflow event is queued instead and
    /// `attachment` is not bound.
    pub fn enqueue(
        &self,
        event: &EventHandle,
        mut attachment: Option<EventPrivate>,
        merge: Option<MergeFn>,
    ) -> Result<Enqueued> {
        let mut state = self.state.lock();

        if state.shut_down {
            return Err(NotifyError::Queue(format!(
                "{} is no longer accepting events",
                self.group
            )));
        }

        let overflowed = state.events.len() >= self.max_events;
        let event = if overflowed {
            debug!(group = %self.group, len = state.events.len(), "queue overflow");
            Arc::clone(&self.overflow)
        } else {
            Arc::clone(event)
        };

        if let Some(merge) = merge {
            if let Some(existing) = merge(&state.events, &event) {
                return Ok(Enqueued::Replaced {
                    event: existing,
                    attachment,
                });
            }
        }

        state.events.push_back(Arc::clone(&event));
        if overflowed {
            return Ok(Enqueued::Replaced { event, attachment });
        }

        if let Some(attachment) = attachment.take() {
            event.lock().push(attachment);
        }
        Ok(Enqueued::Added)
    }

    /// Pop the oldest event and detach this group's attachment from it.
    pub fn dequeue(&self) -> Option<(EventHandle, Option<EventPrivate>)> {
        let event = self.state.lock().events.pop_front()?;
        let attachment = event.detach(self.group);
        Some((event, attachment))
    }

    /// Stop accepting events and hand back everything still pending.
    pub fn shutdown(&self) -> Vec<(EventHandle, Option<EventPrivate>)> {
        let pending = {
            let mut state = self.state.lock();
            state.shut_down = true;
            std::mem::take(&mut state.events)
        };

        pending
            .into_iter()
            .map(|event| {
                let attachment = event.detach(self.group);
                (event, attachment)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().events.is_empty()
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }

    /// The most recently queued event.
    pub fn tail(&self) -> Option<EventHandle> {
        self.state.lock().events.back().cloned()
    }

    /// References to every pending event, oldest first.
    pub fn snapshot(&self) -> Vec<EventHandle> {
        self.state.lock().events.iter().cloned().collect()
    }

    /// The shared overflow event of this queue.
    pub fn overflow_event(&self) -> &EventHandle {
        &self.overflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::InodeId;
    use crate::merge::try_merge;
    use crate::private::AttachmentCache;
    use pretty_assertions::assert_eq;

    fn modify(name: &str) -> EventHandle {
        Event::inode(EventMask::MODIFY, InodeId(5), Some(name)).into_handle()
    }

    #[test]
    fn test_added_event_binds_attachment() {
        let group = GroupId::next();
        let cache = AttachmentCache::default();
        let queue = NotificationQueue::new(group, 8);
        let event = modify("a.txt");

        let outcome = queue
            .enqueue(&event, Some(cache.alloc(group, 3).unwrap()), Some(try_merge))
            .unwrap();

        assert!(matches!(outcome, Enqueued::Added));
        assert_eq!(queue.len(), 1);
        assert_eq!(event.wd_for(group), Some(3));
        assert_eq!(cache.live(), 1);
    }

    #[test]
    fn test_merge_hands_attachment_back() {
        let group = GroupId::next();
        let cache = AttachmentCache::default();
        let queue = NotificationQueue::new(group, 8);
        let first = modify("a.txt");
        queue
            .enqueue(&first, Some(cache.alloc(group, 1).unwrap()), Some(try_merge))
            .unwrap();

        let outcome = queue
            .enqueue(
                &modify("a.txt"),
                Some(cache.alloc(group, 1).unwrap()),
                Some(try_merge),
            )
            .unwrap();

        match outcome {
            Enqueued::Replaced { event, attachment } => {
                assert!(Arc::ptr_eq(&event, &first));
                assert!(attachment.is_some());
            }
            Enqueued::Added => panic!("expected a merge"),
        }
        assert_eq!(queue.len(), 1);
        assert_eq!(cache.live(), 1);
    }

    #[test]
    fn test_no_merge_without_callback() {
        let group = GroupId::next();
        let queue = NotificationQueue::new(group, 8);

        queue.enqueue(&modify("a.txt"), None, None).unwrap();
        queue.enqueue(&modify("a.txt"), None, None).unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_full_queue_substitutes_overflow() {
        let group = GroupId::next();
        let cache = AttachmentCache::default();
        let queue = NotificationQueue::new(group, 2);
        queue.enqueue(&modify("a"), None, Some(try_merge)).unwrap();
        queue.enqueue(&modify("b"), None, Some(try_merge)).unwrap();

        let outcome = queue
            .enqueue(&modify("c"), Some(cache.alloc(group, 1).unwrap()), Some(try_merge))
            .unwrap();
        match outcome {
            Enqueued::Replaced { event, attachment } => {
                assert!(Arc::ptr_eq(&event, queue.overflow_event()));
                assert!(attachment.is_some());
            }
            Enqueued::Added => panic!("expected the overflow event"),
        }
        assert_eq!(queue.len(), 3);

        // further events coalesce into the queued overflow event
        queue.enqueue(&modify("d"), None, Some(try_merge)).unwrap();
        queue.enqueue(&modify("e"), None, Some(try_merge)).unwrap();
        assert_eq!(queue.len(), 3);
        let tail = queue.tail().unwrap();
        assert!(Arc::ptr_eq(&tail, queue.overflow_event()));
        assert_eq!(tail.attachment_count(), 0);
    }

    #[test]
    fn test_dequeue_detaches_attachment() {
        let group = GroupId::next();
        let cache = AttachmentCache::default();
        let queue = NotificationQueue::new(group, 8);
        queue
            .enqueue(&modify("a"), Some(cache.alloc(group, 4).unwrap()), None)
            .unwrap();

        let (event, attachment) = queue.dequeue().unwrap();
        assert_eq!(event.name(), Some("a"));
        assert_eq!(attachment.as_ref().map(EventPrivate::wd), Some(4));
        assert_eq!(event.attachment_count(), 0);

        drop(attachment);
        assert_eq!(cache.live(), 0);
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_shutdown_rejects_new_events() {
        let group = GroupId::next();
        let cache = AttachmentCache::default();
        let queue = NotificationQueue::new(group, 8);
        queue
            .enqueue(&modify("a"), Some(cache.alloc(group, 1).unwrap()), None)
            .unwrap();

        let pending = queue.shutdown();
        assert_eq!(pending.len(), 1);
        assert!(queue.is_shut_down());
        assert!(queue.is_empty());

        let result = queue.enqueue(&modify("b"), Some(cache.alloc(group, 1).unwrap()), None);
        assert!(matches!(result, Err(NotifyError::Queue(_))));

        drop(pending);
        assert_eq!(cache.live(), 0);
    }
}
