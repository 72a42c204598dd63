//! The reading controller.
//!
//! `Reader` owns all state: the canon, the tabs and the position tracker.
//! Every flow is split into a synchronous `begin_*` that validates and tags the
//! work with the tab's generation, and a `complete_*` that applies a result.
//! Front ends that run fetches on their own tasks call the halves directly;
//! `search` and `prefetch` do both against a `VerseSource`.

use tracing::{debug, info, warn};

use crate::canon::Canon;
use crate::error::{Error, Result};
use crate::reference::{parse, Reference};
use crate::scroll::{self, RenderedMarkers, ScrollTarget};
use crate::source::{fetch_window, VerseSource};
use crate::store::Verse;
use crate::tabs::{Tab, TabId, TabManager};
use crate::tracker::{Position, PositionTracker, PrefetchRequest, ViewportEvent};
use crate::window::{build_adjacent, build_window, ChapterQuery, Direction};

/// A validated search waiting for its window to be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub tab: TabId,
    pub generation: u64,
    pub reference: Reference,
    /// The text as submitted. The view scrolls to it once the window lands.
    pub search_text: String,
    pub queries: Vec<ChapterQuery>,
}

pub struct Reader {
    canon: Canon,
    tabs: TabManager,
    tracker: PositionTracker,
    pending_scroll: Option<(TabId, String)>,
}

impl Reader {
    pub fn new(canon: Canon) -> Self {
        Self::with_tabs(canon, TabManager::new())
    }

    pub fn with_tabs(canon: Canon, tabs: TabManager) -> Self {
        Self {
            canon,
            tabs,
            tracker: PositionTracker::new(),
            pending_scroll: None,
        }
    }

    /// Load the canon and abbreviation table from `source`. Nothing can be
    /// resolved until both have arrived.
    pub async fn load_canon<S: VerseSource>(source: &S) -> Result<Canon> {
        let (books, abbreviations) =
            tokio::try_join!(source.load_canon(), source.load_abbreviations())?;
        Ok(Canon::new(books, abbreviations))
    }

    pub async fn connect<S: VerseSource>(source: &S) -> Result<Self> {
        Ok(Self::new(Self::load_canon(source).await?))
    }

    pub fn canon(&self) -> &Canon {
        &self.canon
    }

    pub fn tabs(&self) -> &TabManager {
        &self.tabs
    }

    pub fn active_tab(&self) -> &Tab {
        self.tabs.active()
    }

    pub fn active_tab_mut(&mut self) -> &mut Tab {
        self.tabs.active_mut()
    }

    pub fn position(&self) -> Option<&Position> {
        self.tracker.position()
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn set_search_input(&mut self, text: impl Into<String>) {
        self.tabs.active_mut().search_input = text.into();
    }

    /// Parse the active tab's search text and plan its window. On failure the
    /// tab only gains an error message; its verses stay as they were.
    pub fn begin_search(&mut self) -> Result<SearchRequest> {
        let tab = self.tabs.active_mut();
        tab.error = None;

        let planned = parse(&self.canon, &tab.search_input).and_then(|reference| {
            let queries = build_window(&self.canon, &reference.book, reference.chapter)?;
            Ok((reference, queries))
        });

        let (reference, queries) = match planned {
            Ok(planned) => planned,
            Err(e) => {
                debug!(tab = %tab.id, input = %tab.search_input, error = %e, "search rejected");
                tab.error = Some(e.to_string());
                return Err(e);
            }
        };

        tab.current_book = reference.book.clone();
        tab.current_chapter = reference.chapter;
        tab.title = format!("{} {}", reference.book, reference.chapter);
        tab.loading = true;
        let generation = tab.advance_generation();

        info!(tab = %tab.id, %reference, queries = queries.len(), "search");

        Ok(SearchRequest {
            tab: tab.id.clone(),
            generation,
            reference,
            search_text: tab.search_input.clone(),
            queries,
        })
    }

    /// Apply the fetched window for `request`. Completions for a closed tab
    /// or a superseded search are dropped.
    pub fn complete_search(&mut self, request: SearchRequest, result: Result<Vec<Verse>>) -> Result<()> {
        let is_active = self.tabs.active_id() == &request.tab;
        let Some(tab) = self.tabs.get_mut(&request.tab) else {
            debug!(tab = %request.tab, "search finished for a closed tab");
            return Ok(());
        };
        if tab.generation() != request.generation {
            debug!(tab = %request.tab, "dropping stale search result");
            return Ok(());
        }

        tab.loading = false;
        let reference = request.reference;

        let verses = match result {
            Ok(verses) if verses.is_empty() => Err(Error::NoVersesFound {
                book: reference.book.clone(),
                chapter: reference.chapter,
            }),
            other => other,
        };

        match verses {
            Ok(verses) => {
                info!(tab = %tab.id, verses = verses.len(), "window loaded");
                tab.store.replace(verses);
                tab.error = None;
                tab.title = format!("{} {}", reference.book, reference.chapter);
                tab.highlight = reference.verse.is_some().then_some(reference);
                self.pending_scroll = Some((tab.id.clone(), request.search_text));
                if is_active {
                    self.tracker.reset();
                }
                Ok(())
            }
            Err(e) => {
                warn!(tab = %tab.id, error = %e, "search failed");
                tab.store.clear();
                tab.highlight = None;
                tab.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Run a full search for the active tab against `source`.
    pub async fn search<S: VerseSource>(&mut self, source: &S) -> Result<()> {
        let request = self.begin_search()?;
        let result = fetch_window(source, &request.queries).await;
        self.complete_search(request, result)
    }

    /// Where the view should jump after the last completed search, if that
    /// search belongs to the active tab and has not been consumed yet.
    pub fn resolve_scroll<M: RenderedMarkers + ?Sized>(&mut self, markers: &M) -> Option<ScrollTarget> {
        let text = self.take_scroll_request()?;
        scroll::resolve(&self.canon, &text, markers)
    }

    /// The search text of the last completed search in the active tab, once.
    pub fn take_scroll_request(&mut self) -> Option<String> {
        if !self.has_pending_scroll() {
            return None;
        }
        self.pending_scroll.take().map(|(_, text)| text)
    }

    pub fn has_pending_scroll(&self) -> bool {
        matches!(&self.pending_scroll, Some((tab, _)) if tab == self.tabs.active_id())
    }

    /// Feed a viewport event for the active tab. When the topmost verse
    /// changes, the tab's search text and title follow it, and adjacent
    /// chapter prefetches may be requested. Nothing follows while a search
    /// is loading, since the verses on screen belong to the old window.
    pub fn observe_viewport(&mut self, event: ViewportEvent) -> Vec<PrefetchRequest> {
        let Some(position) = self.tracker.observe(event) else {
            return Vec::new();
        };

        let tab = self.tabs.active_mut();
        if tab.loading {
            debug!(tab = %tab.id, "search loading, ignoring position change");
            return Vec::new();
        }
        if let Some(verse) = position.verse {
            tab.search_input = format!("{} {}:{}", position.book, position.chapter, verse);
        }
        tab.title = format!("{} {}", position.book, position.chapter);

        self.tracker.check_adjacent(&self.canon, tab, &position)
    }

    /// Merge a finished prefetch into the tab it was issued for. Always frees
    /// the prefetch slot. Returns the number of verses added.
    pub fn complete_prefetch(&mut self, request: PrefetchRequest, verses: Vec<Verse>) -> usize {
        if !self.tracker.finish(&request) {
            debug!(target = %request.target, "prefetch was not in flight");
        }

        let Some(tab) = self.tabs.get_mut(&request.tab) else {
            debug!(tab = %request.tab, "prefetch finished for a closed tab");
            return 0;
        };
        if tab.generation() != request.generation {
            debug!(tab = %request.tab, target = %request.target, "dropping stale prefetch");
            return 0;
        }

        let added = match request.direction {
            Direction::Forward => tab.store.merge(verses),
            Direction::Backward => tab.store.merge_front(verses),
        };
        tab.store.mark_loaded(request.target.clone());
        debug!(
            tab = %tab.id,
            target = %request.target,
            direction = request.direction.as_str(),
            added,
            "prefetch merged"
        );
        added
    }

    pub async fn prefetch<S: VerseSource>(&mut self, source: &S, request: PrefetchRequest) -> usize {
        let verses = source
            .fetch_single_chapter(&request.target.book, request.target.chapter)
            .await;
        self.complete_prefetch(request, verses)
    }

    /// Search the chapter before or after the current reading position,
    /// crossing book boundaries. `Ok(None)` at either end of the canon.
    pub fn step_chapter(&mut self, direction: Direction) -> Result<Option<SearchRequest>> {
        let (book, chapter) = match self.tracker.position() {
            Some(position) => (position.book.clone(), position.chapter),
            None => {
                let tab = self.tabs.active();
                (tab.current_book.clone(), tab.current_chapter)
            }
        };

        let Some(target) = build_adjacent(&self.canon, direction, &book, chapter) else {
            return Ok(None);
        };
        self.set_search_input(target.to_string());
        self.begin_search().map(Some)
    }

    /// Open a Genesis 1 tab and plan its first load.
    pub fn new_tab(&mut self) -> Result<SearchRequest> {
        self.tabs.create();
        self.tracker.reset();
        self.begin_search()
    }

    pub fn switch_tab(&mut self, id: &TabId) -> bool {
        if self.tabs.active_id() == id {
            return true;
        }
        let switched = self.tabs.switch(id);
        if switched {
            self.tracker.reset();
        }
        switched
    }

    pub fn cycle_tab(&mut self, offset: isize) {
        let before = self.tabs.active_id().clone();
        self.tabs.cycle(offset);
        if self.tabs.active_id() != &before {
            self.tracker.reset();
        }
    }

    pub fn close_tab(&mut self, id: &TabId) -> bool {
        let before = self.tabs.active_id().clone();
        let closed = self.tabs.close(id);
        if closed && self.tabs.active_id() != &before {
            self.tracker.reset();
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::{AbbreviationEntry, CanonEntry};
    use crate::store::{ChapterKey, VerseKey};
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    /// Serves three verses per chapter for every canonical chapter.
    struct MemorySource {
        canon: Canon,
        failing: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl MemorySource {
        fn new() -> Self {
            Self {
                canon: Canon::standard(),
                failing: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(book: &str) -> Self {
            Self {
                failing: vec![book.to_string()],
                ..Self::new()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl VerseSource for MemorySource {
        async fn load_canon(&self) -> Result<Vec<CanonEntry>> {
            Ok(self.canon.books().to_vec())
        }

        async fn load_abbreviations(&self) -> Result<Vec<AbbreviationEntry>> {
            Ok(self
                .canon
                .abbreviations()
                .map(|(a, b)| AbbreviationEntry {
                    abbreviation: a.to_string(),
                    book_name: b.to_string(),
                })
                .collect())
        }

        async fn fetch_chapter_set(&self, book: &str, chapters: &BTreeSet<u32>) -> Result<Vec<Verse>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{} {:?}", book, chapters));
            if self.failing.iter().any(|b| b == book) {
                return Err(Error::fetch(Some(503), "unavailable"));
            }
            let last = self.canon.last_chapter(book).unwrap_or(0);
            Ok(chapters
                .iter()
                .filter(|c| **c <= last)
                .flat_map(|&chapter| {
                    (1..=3).map(move |verse| Verse {
                        book: book.to_string(),
                        chapter,
                        verse,
                        text: format!("{} {}:{}", book, chapter, verse),
                        translation: "ASV".to_string(),
                    })
                })
                .collect())
        }
    }

    fn chapters_in_order(reader: &Reader) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for verse in reader.active_tab().store.verses() {
            let key = verse.chapter_key().to_string();
            if seen.last() != Some(&key) {
                seen.push(key);
            }
        }
        seen
    }

    async fn reader_at(source: &MemorySource, text: &str) -> Reader {
        let mut reader = Reader::connect(source).await.unwrap();
        reader.set_search_input(text);
        reader.search(source).await.unwrap();
        reader
    }

    #[tokio::test]
    async fn test_search_loads_cross_book_window_in_order() {
        let source = MemorySource::new();
        let reader = reader_at(&source, "Romans 1").await;

        assert_eq!(chapters_in_order(&reader), vec!["Acts 28", "Romans 1", "Romans 2"]);
        assert_eq!(source.calls(), vec!["Acts {28}", "Romans {1, 2}"]);
        let tab = reader.active_tab();
        assert_eq!(tab.title, "Romans 1");
        assert!(!tab.loading);
        assert!(tab.error.is_none());
        assert!(tab.store.is_loaded(&ChapterKey::new("Acts", 28)));
    }

    #[tokio::test]
    async fn test_invalid_search_keeps_previous_verses() {
        let source = MemorySource::new();
        let mut reader = reader_at(&source, "Romans 8").await;
        let before = reader.active_tab().store.len();

        reader.set_search_input("Frobnitz 3");
        let err = reader.search(&source).await.unwrap_err();
        assert!(matches!(err, Error::InvalidReference(_)));

        let tab = reader.active_tab();
        assert_eq!(tab.store.len(), before);
        assert_eq!(tab.title, "Romans 8");
        assert!(tab.error.is_some());
    }

    #[tokio::test]
    async fn test_empty_search_reports_message() {
        let source = MemorySource::new();
        let mut reader = Reader::connect(&source).await.unwrap();
        reader.set_search_input("  ");
        assert!(matches!(reader.search(&source).await, Err(Error::EmptyInput)));
        assert!(reader.active_tab().error.as_deref().unwrap().contains("Romans"));
    }

    #[tokio::test]
    async fn test_fetch_failure_clears_verses() {
        let source = MemorySource::new();
        let mut reader = reader_at(&source, "Romans 8").await;

        let failing = MemorySource::failing("John");
        reader.set_search_input("John 3");
        let err = reader.search(&failing).await.unwrap_err();
        assert!(matches!(err, Error::FetchFailure { status: Some(503), .. }));

        let tab = reader.active_tab();
        assert!(tab.store.is_empty());
        assert!(!tab.loading);
        assert!(tab.error.as_deref().unwrap().starts_with("Failed to load verses"));
    }

    #[tokio::test]
    async fn test_no_verses_found() {
        let source = MemorySource::new();
        let mut reader = Reader::connect(&source).await.unwrap();
        let request = reader.begin_search().unwrap();
        let err = reader.complete_search(request, Ok(Vec::new())).unwrap_err();
        assert!(matches!(err, Error::NoVersesFound { chapter: 1, .. }));
        assert_eq!(reader.active_tab().error.as_deref(), Some("No verses found for Romans 1"));
    }

    #[tokio::test]
    async fn test_stale_search_result_is_dropped() {
        let source = MemorySource::new();
        let mut reader = Reader::connect(&source).await.unwrap();

        reader.set_search_input("John 3");
        let first = reader.begin_search().unwrap();
        reader.set_search_input("Luke 2");
        let second = reader.begin_search().unwrap();

        let second_verses = fetch_window(&source, &second.queries).await;
        reader.complete_search(second, second_verses).unwrap();
        let first_verses = fetch_window(&source, &first.queries).await;
        reader.complete_search(first, first_verses).unwrap();

        assert_eq!(chapters_in_order(&reader), vec!["Luke 1", "Luke 2", "Luke 3"]);
    }

    #[tokio::test]
    async fn test_scroll_position_rewrites_search_text() {
        let source = MemorySource::new();
        let mut reader = reader_at(&source, "Romans 5").await;

        let requests = reader.observe_viewport(ViewportEvent::shown(VerseKey::new("Romans", 5, 2), 0));
        assert!(requests.is_empty());
        assert_eq!(reader.active_tab().search_input, "Romans 5:2");
        assert_eq!(reader.active_tab().title, "Romans 5");
        assert_eq!(reader.position().map(|p| p.chapter), Some(5));
    }

    #[tokio::test]
    async fn test_backward_prefetch_crosses_into_previous_book() {
        let source = MemorySource::new();
        let mut reader = reader_at(&source, "Romans 2").await;
        assert_eq!(chapters_in_order(&reader), vec!["Romans 1", "Romans 2", "Romans 3"]);

        let requests = reader.observe_viewport(ViewportEvent::shown(VerseKey::new("Romans", 1, 1), 0));
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].direction, Direction::Backward);
        assert_eq!(requests[0].target, ChapterKey::new("Acts", 28));

        let added = reader.prefetch(&source, requests[0].clone()).await;
        assert_eq!(added, 3);
        assert!(!reader.tracker().is_prefetching());
        assert_eq!(
            chapters_in_order(&reader),
            vec!["Acts 28", "Romans 1", "Romans 2", "Romans 3"]
        );
    }

    #[tokio::test]
    async fn test_prefetch_guard_blocks_second_trigger() {
        let source = MemorySource::new();
        let mut reader = reader_at(&source, "Romans 5").await;

        let forward = reader.observe_viewport(ViewportEvent::shown(VerseKey::new("Romans", 6, 1), 0));
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].target, ChapterKey::new("Romans", 7));

        let blocked = reader.observe_viewport(ViewportEvent::shown(VerseKey::new("Romans", 4, 1), -5));
        assert!(blocked.is_empty());

        reader.prefetch(&source, forward[0].clone()).await;
        assert!(reader.active_tab().store.is_loaded(&ChapterKey::new("Romans", 7)));
    }

    #[tokio::test]
    async fn test_failed_prefetch_leaves_verses_untouched() {
        let source = MemorySource::new();
        let mut reader = reader_at(&source, "Romans 5").await;
        let before = reader.active_tab().store.len();

        let requests = reader.observe_viewport(ViewportEvent::shown(VerseKey::new("Romans", 6, 1), 0));
        let failing = MemorySource::failing("Romans");
        assert_eq!(reader.prefetch(&failing, requests[0].clone()).await, 0);

        assert_eq!(reader.active_tab().store.len(), before);
        assert!(reader.active_tab().error.is_none());
        assert!(!reader.tracker().is_prefetching());
    }

    #[tokio::test]
    async fn test_prefetch_after_new_search_is_discarded() {
        let source = MemorySource::new();
        let mut reader = reader_at(&source, "Romans 5").await;
        let requests = reader.observe_viewport(ViewportEvent::shown(VerseKey::new("Romans", 6, 1), 0));

        reader.set_search_input("John 3");
        reader.search(&source).await.unwrap();

        assert_eq!(reader.prefetch(&source, requests[0].clone()).await, 0);
        assert_eq!(chapters_in_order(&reader), vec!["John 2", "John 3", "John 4"]);
        assert!(!reader.tracker().is_prefetching());
    }

    #[tokio::test]
    async fn test_scrolling_while_search_loads_plans_nothing() {
        let source = MemorySource::new();
        let mut reader = reader_at(&source, "Romans 5").await;

        reader.set_search_input("John 3");
        let request = reader.begin_search().unwrap();
        let requests = reader.observe_viewport(ViewportEvent::shown(VerseKey::new("Romans", 6, 1), 0));
        assert!(requests.is_empty());
        assert!(!reader.tracker().is_prefetching());
        assert_eq!(reader.active_tab().search_input, "John 3");
        assert_eq!(reader.active_tab().title, "John 3");

        let verses = fetch_window(&source, &request.queries).await;
        reader.complete_search(request, verses).unwrap();
        assert_eq!(chapters_in_order(&reader), vec!["John 2", "John 3", "John 4"]);
        assert!(!reader.active_tab().store.is_loaded(&ChapterKey::new("Romans", 7)));
    }

    #[tokio::test]
    async fn test_scroll_request_uses_submitted_text() {
        let source = MemorySource::new();
        let mut reader = reader_at(&source, "Romans 5").await;
        reader.take_scroll_request();

        reader.set_search_input("John 3:16");
        let request = reader.begin_search().unwrap();
        assert_eq!(request.search_text, "John 3:16");
        reader.set_search_input("Romans 5:2");

        let verses = fetch_window(&source, &request.queries).await;
        reader.complete_search(request, verses).unwrap();
        assert_eq!(reader.take_scroll_request().as_deref(), Some("John 3:16"));
    }

    #[tokio::test]
    async fn test_prefetch_lands_in_its_own_tab() {
        let source = MemorySource::new();
        let mut reader = reader_at(&source, "Romans 5").await;
        let first = reader.tabs().active_id().clone();
        let requests = reader.observe_viewport(ViewportEvent::shown(VerseKey::new("Romans", 6, 1), 0));

        let request = reader.new_tab().unwrap();
        let verses = fetch_window(&source, &request.queries).await;
        reader.complete_search(request, verses).unwrap();

        reader.prefetch(&source, requests[0].clone()).await;
        let first_tab = reader.tabs().get(&first).unwrap();
        assert!(first_tab.store.is_loaded(&ChapterKey::new("Romans", 7)));
        assert!(!reader.active_tab().store.is_loaded(&ChapterKey::new("Romans", 7)));
        assert_eq!(reader.active_tab().current_book, "Genesis");
    }

    #[tokio::test]
    async fn test_step_chapter_crosses_books() {
        let source = MemorySource::new();
        let mut reader = reader_at(&source, "Acts 28").await;

        let request = reader.step_chapter(Direction::Forward).unwrap().unwrap();
        assert_eq!(request.reference.to_string(), "Romans 1");
        assert_eq!(reader.active_tab().search_input, "Romans 1");

        let mut reader = reader_at(&source, "Genesis 1").await;
        assert!(reader.step_chapter(Direction::Backward).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_scroll_consumes_pending_target() {
        struct Everything;
        impl RenderedMarkers for Everything {
            fn contains(&self, _target: &ScrollTarget) -> bool {
                true
            }
        }

        let source = MemorySource::new();
        let mut reader = reader_at(&source, "rom 8:28-30").await;
        assert!(reader.has_pending_scroll());
        assert_eq!(
            reader.active_tab().highlight.as_ref().map(|r| r.to_string()),
            Some("Romans 8:28-30".to_string())
        );
        assert_eq!(
            reader.resolve_scroll(&Everything),
            Some(ScrollTarget::Verse { book: "Romans".into(), chapter: 8, verse: 28 })
        );
        assert_eq!(reader.resolve_scroll(&Everything), None);
    }

    #[tokio::test]
    async fn test_closing_tab_resets_tracking() {
        let source = MemorySource::new();
        let mut reader = reader_at(&source, "Romans 5").await;
        reader.observe_viewport(ViewportEvent::shown(VerseKey::new("Romans", 5, 1), 0));
        let request = reader.new_tab().unwrap();
        let second = request.tab.clone();

        assert!(reader.close_tab(&second));
        assert!(reader.position().is_none());
        let last = reader.tabs().active_id().clone();
        assert!(!reader.close_tab(&last));
    }
}
