//! In-memory notification list shown to the user.

use std::collections::VecDeque;

use crate::models::{Notification, Severity};

/// Oldest notifications are dropped beyond this many.
pub const MAX_NOTIFICATIONS: usize = 50;

/// Newest-first notification list. Server notifications keep their ids;
/// locally raised ones get negative ids so the two never collide.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    items: VecDeque<Notification>,
    next_local_id: i64,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a local notification.
    pub fn push(&mut self, message: impl Into<String>, severity: Severity) -> &Notification {
        self.next_local_id -= 1;
        let mut notification = Notification::new(message, severity);
        notification.id = self.next_local_id;
        self.insert(notification);
        &self.items[0]
    }

    /// Add server notifications not seen before. Returns how many were new.
    pub fn merge(&mut self, incoming: Vec<Notification>) -> usize {
        let mut fresh: Vec<Notification> = incoming
            .into_iter()
            .filter(|n| n.id <= 0 || !self.items.iter().any(|seen| seen.id == n.id))
            .collect();
        fresh.sort_by_key(|n| n.timestamp);
        let added = fresh.len();
        for notification in fresh {
            self.insert(notification);
        }
        added
    }

    fn insert(&mut self, notification: Notification) {
        self.items.push_front(notification);
        self.items.truncate(MAX_NOTIFICATIONS);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn unread(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter().filter(|n| !n.read)
    }

    pub fn unread_count(&self) -> usize {
        self.unread().count()
    }

    pub fn mark_read(&mut self, id: i64) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for n in self.items.iter_mut() {
            n.read = true;
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(id: i64, message: &str) -> Notification {
        let mut n = Notification::new(message, Severity::Info);
        n.id = id;
        n
    }

    #[test]
    fn test_capped_newest_first() {
        let mut center = NotificationCenter::new();
        for i in 0..(MAX_NOTIFICATIONS + 5) {
            center.push(format!("n{}", i), Severity::Info);
        }
        assert_eq!(center.len(), MAX_NOTIFICATIONS);
        assert_eq!(center.iter().next().unwrap().message, format!("n{}", MAX_NOTIFICATIONS + 4));
    }

    #[test]
    fn test_merge_skips_known_ids() {
        let mut center = NotificationCenter::new();
        assert_eq!(center.merge(vec![remote(1, "a"), remote(2, "b")]), 2);
        assert_eq!(center.merge(vec![remote(2, "b"), remote(3, "c")]), 1);
        assert_eq!(center.len(), 3);
    }

    #[test]
    fn test_local_ids_do_not_collide() {
        let mut center = NotificationCenter::new();
        let local = center.push("local", Severity::Warning).id;
        assert!(local < 0);
        assert_eq!(center.merge(vec![remote(1, "server")]), 1);
        assert_eq!(center.len(), 2);
    }

    #[test]
    fn test_read_tracking() {
        let mut center = NotificationCenter::new();
        center.merge(vec![remote(1, "a"), remote(2, "b")]);
        assert_eq!(center.unread_count(), 2);
        assert!(center.mark_read(1));
        assert!(!center.mark_read(99));
        assert_eq!(center.unread_count(), 1);
        center.mark_all_read();
        assert_eq!(center.unread_count(), 0);
    }
}
