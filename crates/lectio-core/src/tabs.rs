use std::fmt;

use crate::reference::Reference;
use crate::store::VerseStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TabId(String);

impl TabId {
    fn numbered(n: u32) -> Self {
        TabId(format!("tab-{}", n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One reading tab. Owns its verses exclusively.
#[derive(Debug, Clone)]
pub struct Tab {
    pub id: TabId,
    pub title: String,
    pub current_book: String,
    pub current_chapter: u32,
    pub store: VerseStore,
    pub search_input: String,
    pub loading: bool,
    pub error: Option<String>,
    /// Verse or range the last search asked for.
    pub highlight: Option<Reference>,
    generation: u64,
}

impl Tab {
    fn new(id: TabId, book: &str, chapter: u32) -> Self {
        let title = format!("{} {}", book, chapter);
        Self {
            id,
            search_input: title.clone(),
            title,
            current_book: book.to_string(),
            current_chapter: chapter,
            store: VerseStore::new(),
            loading: false,
            error: None,
            highlight: None,
            generation: 0,
        }
    }

    /// Bumped on every fresh search; in-flight work tagged with an older
    /// value is stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn advance_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

pub const DEFAULT_START_BOOK: &str = "Romans";
pub const NEW_TAB_BOOK: &str = "Genesis";

/// The open tabs. There is always at least one.
#[derive(Debug, Clone)]
pub struct TabManager {
    tabs: Vec<Tab>,
    active: TabId,
    next_id: u32,
}

impl Default for TabManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TabManager {
    pub fn new() -> Self {
        Self::starting_at(DEFAULT_START_BOOK, 1)
    }

    pub fn starting_at(book: &str, chapter: u32) -> Self {
        let first = Tab::new(TabId::numbered(1), book, chapter);
        Self {
            active: first.id.clone(),
            tabs: vec![first],
            next_id: 2,
        }
    }

    /// Open a tab at Genesis 1 and make it active.
    pub fn create(&mut self) -> TabId {
        let id = TabId::numbered(self.next_id);
        self.next_id += 1;
        self.tabs.push(Tab::new(id.clone(), NEW_TAB_BOOK, 1));
        self.active = id.clone();
        id
    }

    pub fn switch(&mut self, id: &TabId) -> bool {
        if self.tabs.iter().any(|t| &t.id == id) {
            self.active = id.clone();
            true
        } else {
            false
        }
    }

    /// Close a tab. The last remaining tab cannot be closed. Closing the
    /// active tab activates the one before it.
    pub fn close(&mut self, id: &TabId) -> bool {
        if self.tabs.len() == 1 {
            return false;
        }
        let Some(index) = self.tabs.iter().position(|t| &t.id == id) else {
            return false;
        };
        self.tabs.remove(index);
        if &self.active == id {
            self.active = self.tabs[index.saturating_sub(1)].id.clone();
        }
        true
    }

    pub fn active_id(&self) -> &TabId {
        &self.active
    }

    pub fn active(&self) -> &Tab {
        self.tabs
            .iter()
            .find(|t| t.id == self.active)
            .unwrap_or(&self.tabs[0])
    }

    pub fn active_mut(&mut self) -> &mut Tab {
        let idx = self
            .tabs
            .iter()
            .position(|t| t.id == self.active)
            .unwrap_or(0);
        &mut self.tabs[idx]
    }

    pub fn get(&self, id: &TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| &t.id == id)
    }

    pub fn get_mut(&mut self, id: &TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| &t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tab> {
        self.tabs.iter()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.tabs
            .iter()
            .position(|t| t.id == self.active)
            .unwrap_or(0)
    }

    /// Activate the tab `offset` places away, wrapping around.
    pub fn cycle(&mut self, offset: isize) {
        let len = self.tabs.len() as isize;
        let idx = (self.active_index() as isize + offset).rem_euclid(len) as usize;
        self.active = self.tabs[idx].id.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with_romans_tab() {
        let tabs = TabManager::new();
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs.active().id.as_str(), "tab-1");
        assert_eq!(tabs.active().title, "Romans 1");
        assert_eq!(tabs.active().search_input, "Romans 1");
    }

    #[test]
    fn test_create_activates_genesis_tab() {
        let mut tabs = TabManager::new();
        let id = tabs.create();
        assert_eq!(id.as_str(), "tab-2");
        assert_eq!(tabs.active_id(), &id);
        assert_eq!(tabs.active().current_book, "Genesis");
    }

    #[test]
    fn test_last_tab_cannot_close() {
        let mut tabs = TabManager::new();
        let only = tabs.active_id().clone();
        assert!(!tabs.close(&only));
        assert_eq!(tabs.len(), 1);
    }

    #[test]
    fn test_closing_active_tab_activates_previous() {
        let mut tabs = TabManager::new();
        let second = tabs.create();
        let third = tabs.create();
        assert!(tabs.close(&third));
        assert_eq!(tabs.active_id(), &second);

        let first = TabId::numbered(1);
        assert!(tabs.switch(&first));
        assert!(tabs.close(&first));
        assert_eq!(tabs.active_id(), &second);
    }

    #[test]
    fn test_closing_inactive_tab_keeps_active() {
        let mut tabs = TabManager::new();
        let first = tabs.active_id().clone();
        let second = tabs.create();
        tabs.switch(&first);
        assert!(tabs.close(&second));
        assert_eq!(tabs.active_id(), &first);
        assert!(tabs.get(&second).is_none());
    }

    #[test]
    fn test_cycle_wraps() {
        let mut tabs = TabManager::new();
        tabs.create();
        tabs.cycle(1);
        assert_eq!(tabs.active_id().as_str(), "tab-1");
        tabs.cycle(-1);
        assert_eq!(tabs.active_id().as_str(), "tab-2");
    }

    #[test]
    fn test_generation_advances() {
        let mut tabs = TabManager::new();
        let tab = tabs.active_mut();
        assert_eq!(tab.generation(), 0);
        assert_eq!(tab.advance_generation(), 1);
        assert_eq!(tab.generation(), 1);
    }
}
