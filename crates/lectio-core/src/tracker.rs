//! Reading-position tracking and adjacent-chapter prefetch.
//!
//! The renderer pushes a visibility event whenever a verse element enters or
//! leaves the viewport. The tracker reduces that stream to the topmost
//! visible verse, and decides when the reader has scrolled onto the first or
//! last loaded chapter of a book so the neighbouring chapter can be fetched in
//! the background. Only one prefetch is in flight at a time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::canon::Canon;
use crate::store::{ChapterKey, VerseKey};
use crate::tabs::{Tab, TabId};
use crate::window::{build_adjacent, Direction};

/// Last known top-of-viewport location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub book: String,
    pub chapter: u32,
    pub verse: Option<u32>,
}

impl From<&VerseKey> for Position {
    fn from(key: &VerseKey) -> Self {
        Self {
            book: key.book.clone(),
            chapter: key.chapter,
            verse: Some(key.verse),
        }
    }
}

/// A verse element entering or leaving view. `offset` is its top edge
/// relative to the top of the viewport; negative when partly scrolled past.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewportEvent {
    pub key: VerseKey,
    pub visible: bool,
    pub offset: i32,
}

impl ViewportEvent {
    pub fn shown(key: VerseKey, offset: i32) -> Self {
        Self { key, visible: true, offset }
    }

    pub fn hidden(key: VerseKey) -> Self {
        Self { key, visible: false, offset: 0 }
    }
}

/// The set of verses currently in view.
#[derive(Debug, Clone, Default)]
pub struct Viewport {
    visible: HashMap<VerseKey, i32>,
}

impl Viewport {
    pub fn apply(&mut self, event: ViewportEvent) {
        if event.visible {
            self.visible.insert(event.key, event.offset);
        } else {
            self.visible.remove(&event.key);
        }
    }

    pub fn topmost(&self) -> Option<&VerseKey> {
        self.visible
            .iter()
            .min_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)))
            .map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    pub fn clear(&mut self) {
        self.visible.clear();
    }
}

/// A background fetch of one chapter, tagged with the tab and search
/// generation it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchRequest {
    pub tab: TabId,
    pub generation: u64,
    pub direction: Direction,
    pub target: ChapterKey,
}

#[derive(Debug, Clone, Default)]
enum TrackerState {
    #[default]
    Idle,
    Prefetching(PrefetchRequest),
}

#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    viewport: Viewport,
    topmost: Option<VerseKey>,
    position: Option<Position>,
    state: TrackerState,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one viewport event. Returns the new position when the topmost
    /// verse changed.
    pub fn observe(&mut self, event: ViewportEvent) -> Option<Position> {
        self.viewport.apply(event);
        let top = self.viewport.topmost().cloned();
        if top == self.topmost {
            return None;
        }
        self.topmost = top;
        let position = self.topmost.as_ref().map(Position::from)?;
        self.position = Some(position.clone());
        Some(position)
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn is_prefetching(&self) -> bool {
        matches!(self.state, TrackerState::Prefetching(_))
    }

    pub fn in_flight(&self) -> Option<&PrefetchRequest> {
        match &self.state {
            TrackerState::Prefetching(request) => Some(request),
            TrackerState::Idle => None,
        }
    }

    /// Forget what is on screen. An in-flight prefetch keeps the slot until
    /// it is finished.
    pub fn reset(&mut self) {
        self.viewport.clear();
        self.topmost = None;
        self.position = None;
    }

    /// The chapter a prefetch in `direction` would fetch for `book`, stepping
    /// from the lowest or highest chapter of that book loaded in `tab`.
    pub fn adjacent_target(
        canon: &Canon,
        tab: &Tab,
        direction: Direction,
        book: &str,
    ) -> Option<ChapterKey> {
        let (lo, hi) = tab.store.loaded_range(book)?;
        let edge = match direction {
            Direction::Forward => hi,
            Direction::Backward => lo,
        };
        build_adjacent(canon, direction, book, edge)
    }

    /// Try to claim the prefetch slot. `None` when a prefetch is already in
    /// flight, when there is nothing beyond the canon edge, or when the target
    /// chapter is already loaded.
    pub fn begin(
        &mut self,
        canon: &Canon,
        tab: &Tab,
        direction: Direction,
        book: &str,
    ) -> Option<PrefetchRequest> {
        if let TrackerState::Prefetching(current) = &self.state {
            debug!(in_flight = %current.target, direction = direction.as_str(), "prefetch already running");
            return None;
        }

        let target = Self::adjacent_target(canon, tab, direction, book)?;
        if tab.store.is_loaded(&target) {
            debug!(%target, "chapter already loaded, skipping prefetch");
            return None;
        }

        let request = PrefetchRequest {
            tab: tab.id.clone(),
            generation: tab.generation(),
            direction,
            target,
        };
        self.state = TrackerState::Prefetching(request.clone());
        Some(request)
    }

    /// Release the slot held by `request`. Returns false when `request` is
    /// not the one in flight.
    pub fn finish(&mut self, request: &PrefetchRequest) -> bool {
        match &self.state {
            TrackerState::Prefetching(current) if current == request => {
                self.state = TrackerState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Prefetch requests for a reader sitting at `position`: forward when it
    /// is on the last loaded chapter of its book, backward when on the first.
    pub fn check_adjacent(
        &mut self,
        canon: &Canon,
        tab: &Tab,
        position: &Position,
    ) -> Vec<PrefetchRequest> {
        let Some((lo, hi)) = tab.store.loaded_range(&position.book) else {
            return Vec::new();
        };

        let mut requests = Vec::new();
        if position.chapter == hi {
            requests.extend(self.begin(canon, tab, Direction::Forward, &position.book));
        }
        if position.chapter == lo {
            requests.extend(self.begin(canon, tab, Direction::Backward, &position.book));
        }
        requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Verse;
    use crate::tabs::TabManager;

    fn verses(book: &str, chapter: u32, count: u32) -> Vec<Verse> {
        (1..=count)
            .map(|verse| Verse {
                book: book.to_string(),
                chapter,
                verse,
                text: String::new(),
                translation: "ASV".to_string(),
            })
            .collect()
    }

    fn tab_with(chapters: &[(&str, u32)]) -> TabManager {
        let mut tabs = TabManager::new();
        let fetched = chapters
            .iter()
            .flat_map(|(book, chapter)| verses(book, *chapter, 3))
            .collect();
        tabs.active_mut().store.replace(fetched);
        tabs
    }

    #[test]
    fn test_viewport_topmost_is_smallest_offset() {
        let mut viewport = Viewport::default();
        viewport.apply(ViewportEvent::shown(VerseKey::new("Romans", 1, 3), 12));
        viewport.apply(ViewportEvent::shown(VerseKey::new("Romans", 1, 2), -2));
        viewport.apply(ViewportEvent::shown(VerseKey::new("Romans", 1, 4), 20));
        assert_eq!(viewport.topmost(), Some(&VerseKey::new("Romans", 1, 2)));

        viewport.apply(ViewportEvent::hidden(VerseKey::new("Romans", 1, 2)));
        assert_eq!(viewport.topmost(), Some(&VerseKey::new("Romans", 1, 3)));
        assert_eq!(viewport.len(), 2);
    }

    #[test]
    fn test_observe_reports_only_changes() {
        let mut tracker = PositionTracker::new();
        let first = tracker.observe(ViewportEvent::shown(VerseKey::new("Romans", 2, 1), 0));
        assert_eq!(
            first,
            Some(Position { book: "Romans".into(), chapter: 2, verse: Some(1) })
        );
        assert_eq!(tracker.observe(ViewportEvent::shown(VerseKey::new("Romans", 2, 2), 5)), None);

        let next = tracker.observe(ViewportEvent::hidden(VerseKey::new("Romans", 2, 1)));
        assert_eq!(next.map(|p| p.verse), Some(Some(2)));
    }

    #[test]
    fn test_backward_prefetch_from_first_chapter_targets_previous_book() {
        let canon = Canon::standard();
        let tabs = tab_with(&[("Romans", 1), ("Romans", 2)]);
        let mut tracker = PositionTracker::new();

        let position = Position { book: "Romans".into(), chapter: 1, verse: Some(1) };
        let requests = tracker.check_adjacent(&canon, tabs.active(), &position);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].direction, Direction::Backward);
        assert_eq!(requests[0].target, ChapterKey::new("Acts", 28));
        assert!(tracker.is_prefetching());
    }

    #[test]
    fn test_already_loaded_target_is_skipped() {
        let canon = Canon::standard();
        let tabs = tab_with(&[("Acts", 28), ("Romans", 1), ("Romans", 2)]);
        let mut tracker = PositionTracker::new();

        assert_eq!(
            PositionTracker::adjacent_target(&canon, tabs.active(), Direction::Backward, "Romans"),
            Some(ChapterKey::new("Acts", 28))
        );
        let position = Position { book: "Romans".into(), chapter: 1, verse: Some(1) };
        assert!(tracker.check_adjacent(&canon, tabs.active(), &position).is_empty());
        assert!(!tracker.is_prefetching());
    }

    #[test]
    fn test_single_slot_guard() {
        let canon = Canon::standard();
        let tabs = tab_with(&[("Romans", 5)]);
        let mut tracker = PositionTracker::new();
        let position = Position { book: "Romans".into(), chapter: 5, verse: Some(1) };

        // Both edges match, but only the forward request gets the slot
        let requests = tracker.check_adjacent(&canon, tabs.active(), &position);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target, ChapterKey::new("Romans", 6));

        assert!(tracker
            .begin(&canon, tabs.active(), Direction::Backward, "Romans")
            .is_none());
        assert!(tracker
            .begin(&canon, tabs.active(), Direction::Forward, "Romans")
            .is_none());

        assert!(tracker.finish(&requests[0]));
        let backward = tracker.begin(&canon, tabs.active(), Direction::Backward, "Romans");
        assert_eq!(backward.map(|r| r.target), Some(ChapterKey::new("Romans", 4)));
    }

    #[test]
    fn test_finish_ignores_foreign_request() {
        let canon = Canon::standard();
        let tabs = tab_with(&[("Romans", 5)]);
        let mut tracker = PositionTracker::new();
        let request = tracker
            .begin(&canon, tabs.active(), Direction::Forward, "Romans")
            .unwrap();

        let mut other = request.clone();
        other.target = ChapterKey::new("Romans", 9);
        assert!(!tracker.finish(&other));
        assert!(tracker.is_prefetching());
        assert!(tracker.finish(&request));
        assert!(!tracker.is_prefetching());
    }

    #[test]
    fn test_reset_keeps_prefetch_slot() {
        let canon = Canon::standard();
        let tabs = tab_with(&[("Romans", 5)]);
        let mut tracker = PositionTracker::new();
        tracker.observe(ViewportEvent::shown(VerseKey::new("Romans", 5, 1), 0));
        tracker.begin(&canon, tabs.active(), Direction::Forward, "Romans");

        tracker.reset();
        assert!(tracker.position().is_none());
        assert!(tracker.viewport().is_empty());
        assert!(tracker.is_prefetching());
    }

    #[test]
    fn test_no_prefetch_past_revelation() {
        let canon = Canon::standard();
        let tabs = tab_with(&[("Revelation", 22)]);
        let mut tracker = PositionTracker::new();
        let position = Position { book: "Revelation".into(), chapter: 22, verse: Some(1) };
        let requests = tracker.check_adjacent(&canon, tabs.active(), &position);
        // Forward has nowhere to go, backward takes the slot
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target, ChapterKey::new("Revelation", 21));
    }
}
