//! Conversation list cache.

use std::collections::HashSet;

use crate::cache::{Generation, QueryCache};
use crate::models::Conversation;

/// The signed-in user's conversations, in server order, unique by id.
#[derive(Debug, Clone, Default)]
pub struct ConversationCache {
    inner: QueryCache<Vec<Conversation>>,
}

impl ConversationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached list. When nothing is cached (and no fetch is in flight)
    /// the returned generation is the fetch the caller must issue.
    pub fn list(&mut self) -> (Option<Generation>, &[Conversation]) {
        let fetch = self.inner.ensure();
        (fetch, self.entries())
    }

    /// The cached list without triggering a fetch.
    pub fn entries(&self) -> &[Conversation] {
        self.inner.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Zero the unread count locally. Unknown ids are ignored.
    pub fn mark_read(&mut self, id: &str) {
        self.inner.update(|list| {
            if let Some(conv) = list.iter_mut().find(|c| c.id == id) {
                conv.unread_messages = 0;
            }
        });
    }

    /// Mark the list stale and issue a refetch. The stale list stays readable.
    pub fn invalidate(&mut self) -> Generation {
        self.inner.invalidate()
    }

    /// Install a server response. Superseded generations are dropped.
    pub fn apply(&mut self, generation: Generation, list: Vec<Conversation>) -> bool {
        let mut seen = HashSet::new();
        let unique: Vec<Conversation> = list
            .into_iter()
            .filter(|c| seen.insert(c.id.clone()))
            .collect();
        self.inner.apply(generation, unique)
    }

    pub fn fail(&mut self, generation: Generation) -> bool {
        self.inner.fail(generation)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.entries().iter().find(|c| c.id == id)
    }

    /// Whether any server response has been installed yet.
    pub fn is_loaded(&self) -> bool {
        self.inner.get().is_some()
    }

    pub fn is_fetching(&self) -> bool {
        self.inner.is_fetching()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv(id: &str, unread: u32) -> Conversation {
        Conversation {
            id: id.to_string(),
            name: format!("Person {}", id),
            profile_picture: None,
            email: None,
            last_message: None,
            unread_messages: unread,
        }
    }

    #[test]
    fn test_list_requests_fetch_once() {
        let mut cache = ConversationCache::new();
        let (fetch, entries) = cache.list();
        assert!(fetch.is_some());
        assert!(entries.is_empty());
        let (again, _) = cache.list();
        assert!(again.is_none());
    }

    #[test]
    fn test_apply_dedupes_keeping_first() {
        let mut cache = ConversationCache::new();
        let g = cache.invalidate();
        let mut dup = conv("1", 9);
        dup.name = "Duplicate".to_string();
        assert!(cache.apply(g, vec![conv("1", 2), conv("2", 0), dup]));
        assert_eq!(cache.entries().len(), 2);
        assert_eq!(cache.get("1").map(|c| c.unread_messages), Some(2));
        assert_eq!(cache.get("1").map(|c| c.name.as_str()), Some("Person 1"));
    }

    #[test]
    fn test_mark_read() {
        let mut cache = ConversationCache::new();
        let g = cache.invalidate();
        cache.apply(g, vec![conv("1", 3), conv("2", 4)]);
        cache.mark_read("1");
        cache.mark_read("missing");
        assert_eq!(cache.get("1").map(|c| c.unread_messages), Some(0));
        assert_eq!(cache.get("2").map(|c| c.unread_messages), Some(4));
    }

    #[test]
    fn test_stale_list_visible_while_refetching() {
        let mut cache = ConversationCache::new();
        let g = cache.invalidate();
        cache.apply(g, vec![conv("1", 0)]);
        let newer = cache.invalidate();
        assert!(cache.contains("1"));
        assert!(cache.is_fetching());
        assert!(!cache.apply(g, vec![]));
        assert!(cache.apply(newer, vec![conv("1", 5)]));
        assert_eq!(cache.get("1").map(|c| c.unread_messages), Some(5));
    }
}
