// wabot Engine — Pending-Selection Store
//
// Remembers, per sender, the numbered options of the last list menu sent to
// them so that a later bare "2" can be resolved to the second option.
//
// Key properties:
//   - At most one entry per sender; a new registration overwrites.
//   - Passive TTL: age is checked at resolve time, expired entries are
//     deleted then. `sweep_expired()` exists to bound memory, nothing
//     depends on it running.
//   - Every operation takes the single map lock once, so register/resolve
//     for one sender can never interleave into a lost update.

use crate::atoms::constants::DEFAULT_SELECTION_TTL;
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One numbered option offered to a sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOption {
    /// 1-based, sequential across all sections of the list.
    pub number: u32,
    pub title: String,
    pub description: Option<String>,
    pub section_id: u64,
    pub item_id: String,
    /// Reply configured for the item; may be empty.
    pub response: String,
}

/// The options of one list menu, awaiting a numeric reply.
#[derive(Debug, Clone)]
pub struct PendingSelection {
    pub command_id: u64,
    pub options: Vec<SelectionOption>,
    /// Stamped by the store on registration.
    pub created_at: Instant,
}

impl PendingSelection {
    pub fn new(command_id: u64, options: Vec<SelectionOption>) -> Self {
        PendingSelection { command_id, options, created_at: Instant::now() }
    }

    pub fn option(&self, number: u32) -> Option<&SelectionOption> {
        self.options.iter().find(|o| o.number == number)
    }
}

/// Result of [`PendingSelectionStore::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionLookup {
    /// Valid pick. The entry has been consumed.
    Selected(SelectionOption),
    /// A live entry exists but has no option with this number. It is kept.
    OutOfRange { number: u32, offered: usize },
    /// The entry was older than the TTL and has been discarded.
    Expired,
    /// Nothing pending for this sender.
    Missing,
}

pub struct PendingSelectionStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, PendingSelection>>,
}

impl Default for PendingSelectionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SELECTION_TTL)
    }
}

impl PendingSelectionStore {
    pub fn new(ttl: Duration) -> Self {
        PendingSelectionStore { ttl, entries: Mutex::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store `selection` for `sender`, replacing whatever was pending.
    pub fn register(&self, sender: &str, selection: PendingSelection) {
        self.register_at(sender, selection, Instant::now());
    }

    pub fn register_at(&self, sender: &str, mut selection: PendingSelection, now: Instant) {
        selection.created_at = now;
        let replaced = self.entries.lock().insert(sender.to_string(), selection);
        if let Some(old) = replaced {
            debug!("[selections] {} had a pending list (command {}), overwritten", sender, old.command_id);
        }
    }

    pub fn resolve(&self, sender: &str, number: u32) -> SelectionLookup {
        self.resolve_at(sender, number, Instant::now())
    }

    pub fn resolve_at(&self, sender: &str, number: u32, now: Instant) -> SelectionLookup {
        let mut entries = self.entries.lock();
        let Some(pending) = entries.get(sender) else {
            return SelectionLookup::Missing;
        };

        if now.saturating_duration_since(pending.created_at) > self.ttl {
            entries.remove(sender);
            debug!("[selections] Options for {} expired", sender);
            return SelectionLookup::Expired;
        }

        let offered = pending.options.len();
        match pending.option(number).cloned() {
            Some(option) => {
                entries.remove(sender);
                SelectionLookup::Selected(option)
            }
            None => SelectionLookup::OutOfRange { number, offered },
        }
    }

    /// Whether a live (unexpired) entry exists for `sender`.
    pub fn has_pending(&self, sender: &str) -> bool {
        self.entries
            .lock()
            .get(sender)
            .is_some_and(|p| p.created_at.elapsed() <= self.ttl)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, p| now.saturating_duration_since(p.created_at) <= self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(number: u32, title: &str) -> SelectionOption {
        SelectionOption {
            number,
            title: title.into(),
            description: None,
            section_id: 1,
            item_id: format!("item_1_{}", number - 1),
            response: format!("resp {}", title),
        }
    }

    fn two_options(command_id: u64) -> PendingSelection {
        PendingSelection::new(command_id, vec![option(1, "Café"), option(2, "Té")])
    }

    #[test]
    fn resolve_without_entry_is_missing() {
        let store = PendingSelectionStore::default();
        assert_eq!(store.resolve("a", 1), SelectionLookup::Missing);
    }

    #[test]
    fn resolve_consumes_entry() {
        let store = PendingSelectionStore::default();
        store.register("a", two_options(7));
        match store.resolve("a", 2) {
            SelectionLookup::Selected(opt) => assert_eq!(opt.title, "Té"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(store.resolve("a", 2), SelectionLookup::Missing);
        assert!(store.is_empty());
    }

    #[test]
    fn out_of_range_keeps_entry() {
        let store = PendingSelectionStore::default();
        store.register("a", two_options(7));
        assert_eq!(store.resolve("a", 5), SelectionLookup::OutOfRange { number: 5, offered: 2 });
        assert!(matches!(store.resolve("a", 1), SelectionLookup::Selected(_)));
    }

    #[test]
    fn expired_entry_is_deleted() {
        let store = PendingSelectionStore::new(Duration::from_secs(600));
        let t0 = Instant::now();
        store.register_at("a", two_options(7), t0);
        let late = t0 + Duration::from_secs(600) + Duration::from_millis(1);
        assert_eq!(store.resolve_at("a", 1, late), SelectionLookup::Expired);
        assert_eq!(store.resolve_at("a", 1, late), SelectionLookup::Missing);
    }

    #[test]
    fn entry_alive_at_exact_ttl() {
        let store = PendingSelectionStore::new(Duration::from_secs(600));
        let t0 = Instant::now();
        store.register_at("a", two_options(7), t0);
        assert!(matches!(
            store.resolve_at("a", 1, t0 + Duration::from_secs(600)),
            SelectionLookup::Selected(_)
        ));
    }

    #[test]
    fn register_overwrites_previous() {
        let store = PendingSelectionStore::default();
        store.register("a", two_options(1));
        store.register("a", PendingSelection::new(2, vec![option(1, "Solo")]));
        assert_eq!(store.resolve("a", 2), SelectionLookup::OutOfRange { number: 2, offered: 1 });
        match store.resolve("a", 1) {
            SelectionLookup::Selected(opt) => assert_eq!(opt.title, "Solo"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn senders_are_isolated() {
        let store = PendingSelectionStore::default();
        store.register("a", two_options(1));
        store.register("b", two_options(2));
        assert!(matches!(store.resolve("a", 1), SelectionLookup::Selected(_)));
        assert!(store.has_pending("b"));
        assert!(!store.has_pending("a"));
    }

    #[test]
    fn sweep_removes_only_expired() {
        let store = PendingSelectionStore::new(Duration::from_secs(60));
        let t0 = Instant::now();
        store.register_at("old", two_options(1), t0);
        store.register_at("new", two_options(2), t0 + Duration::from_secs(50));
        assert_eq!(store.sweep_expired_at(t0 + Duration::from_secs(70)), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_resolves_consume_once() {
        let store = std::sync::Arc::new(PendingSelectionStore::default());
        store.register("a", two_options(1));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || matches!(store.resolve("a", 1), SelectionLookup::Selected(_)))
            })
            .collect();
        let wins = handles.into_iter().filter_map(|h| h.join().ok()).filter(|won| *won).count();
        assert_eq!(wins, 1);
    }
}
