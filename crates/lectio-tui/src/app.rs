use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use lectio_core::{
    fetch_window, Direction, PrefetchRequest, Reader, SearchRequest, SupabaseClient, TabId, Verse,
    VerseKey, VerseSource, ViewportEvent,
};

use crate::layout::ReadingLayout;
use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub reader: Reader,

    // Reading pane, rebuilt on every draw
    pub layout: ReadingLayout,
    pub scroll: usize,
    pub content_height: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    client: SupabaseClient,
    tx: UnboundedSender<AppEvent>,
    saved_scroll: HashMap<TabId, usize>,
    // Verses reported visible to the reader, with their last offsets
    shown: HashMap<VerseKey, i32>,
    // Verse to keep in place while chapters are inserted above it
    anchor: Option<(VerseKey, i32)>,
}

impl App {
    pub fn new(reader: Reader, client: SupabaseClient, tx: UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            reader,
            layout: ReadingLayout::default(),
            scroll: 0,
            content_height: 0,
            animation_frame: 0,
            client,
            tx,
            saved_scroll: HashMap::new(),
            shown: HashMap::new(),
            anchor: None,
        }
    }

    // Fetching
    pub fn search(&mut self) {
        match self.reader.begin_search() {
            Ok(request) => self.spawn_search(request),
            Err(e) => debug!(error = %e, "search not started"),
        }
    }

    fn spawn_search(&self, request: SearchRequest) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = fetch_window(&client, &request.queries).await;
            let _ = tx.send(AppEvent::SearchLoaded(request, result));
        });
    }

    fn spawn_prefetch(&self, request: PrefetchRequest) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let verses = client
                .fetch_single_chapter(&request.target.book, request.target.chapter)
                .await;
            let _ = tx.send(AppEvent::PrefetchLoaded(request, verses));
        });
    }

    pub fn finish_search(&mut self, request: SearchRequest, result: lectio_core::Result<Vec<Verse>>) {
        let tab = request.tab.clone();
        let active = &tab == self.reader.tabs().active_id();

        if let Err(e) = self.reader.complete_search(request, result) {
            debug!(tab = %tab, error = %e, "search finished with error");
        }

        if !active {
            self.saved_scroll.remove(&tab);
        } else if self.reader.has_pending_scroll() {
            self.scroll = 0;
            self.shown.clear();
            self.anchor = None;
        }
    }

    pub fn finish_prefetch(&mut self, request: PrefetchRequest, verses: Vec<Verse>) {
        let keeps_place =
            request.direction == Direction::Backward && &request.tab == self.reader.tabs().active_id();
        if keeps_place {
            self.anchor = self.topmost_shown();
        }

        if self.reader.complete_prefetch(request, verses) == 0 {
            self.anchor = None;
        }
    }

    fn topmost_shown(&self) -> Option<(VerseKey, i32)> {
        self.shown
            .iter()
            .min_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)))
            .map(|(key, offset)| (key.clone(), *offset))
    }

    // Layout and viewport
    pub fn relayout(&mut self, width: u16, height: u16) {
        self.content_height = height;
        self.layout = ReadingLayout::build(&self.reader.active_tab().store, width as usize);

        if let Some((key, offset)) = self.anchor.take() {
            if let Some(start) = self.layout.verse_start(&key) {
                self.scroll = (start as i32 - offset).max(0) as usize;
            }
        }
        self.scroll = self.scroll.min(self.max_scroll());
    }

    fn max_scroll(&self) -> usize {
        self.layout
            .total_lines()
            .saturating_sub(self.content_height as usize)
    }

    /// Apply a pending scroll target, then report visibility changes to the
    /// reader. Returns true when the view jumped and has to be drawn again
    /// before visibility means anything.
    pub fn after_draw(&mut self) -> bool {
        if let Some(target) = self.reader.resolve_scroll(&self.layout) {
            if let Some(line) = self.layout.line_of(&target) {
                let line = line.min(self.max_scroll());
                if line != self.scroll {
                    debug!(%target, line, "scrolling to target");
                    self.scroll = line;
                    return true;
                }
            }
        }

        self.sync_viewport();
        false
    }

    fn sync_viewport(&mut self) {
        let visible: HashMap<VerseKey, i32> = self
            .layout
            .visible_verses(self.scroll, self.content_height as usize)
            .into_iter()
            .collect();

        // Hidden first, then shown from the top down
        let mut events: Vec<ViewportEvent> = self
            .shown
            .keys()
            .filter(|key| !visible.contains_key(*key))
            .map(|key| ViewportEvent::hidden(key.clone()))
            .collect();
        let mut shown: Vec<_> = visible
            .iter()
            .filter(|(key, offset)| self.shown.get(*key) != Some(*offset))
            .map(|(key, offset)| ViewportEvent::shown(key.clone(), *offset))
            .collect();
        shown.sort_by(|a, b| a.offset.cmp(&b.offset).then_with(|| a.key.cmp(&b.key)));
        events.extend(shown);

        self.shown = visible;
        for event in events {
            for request in self.reader.observe_viewport(event) {
                self.spawn_prefetch(request);
            }
        }
    }

    // Scrolling
    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll = (self.scroll + lines).min(self.max_scroll());
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.content_height as usize / 2).max(1));
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.content_height as usize / 2).max(1));
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
    }

    // Chapter navigation
    pub fn step_chapter(&mut self, direction: Direction) {
        match self.reader.step_chapter(direction) {
            Ok(Some(request)) => self.spawn_search(request),
            Ok(None) => debug!(direction = direction.as_str(), "no chapter beyond the canon"),
            Err(e) => debug!(error = %e, "chapter step rejected"),
        }
    }

    // Tabs
    pub fn new_tab(&mut self) {
        self.save_tab_view();
        match self.reader.new_tab() {
            Ok(request) => self.spawn_search(request),
            Err(e) => debug!(error = %e, "new tab could not load"),
        }
        self.restore_tab_view();
    }

    pub fn close_tab(&mut self) {
        let id = self.reader.tabs().active_id().clone();
        if self.reader.close_tab(&id) {
            self.saved_scroll.remove(&id);
            self.restore_tab_view();
        }
    }

    pub fn cycle_tab(&mut self, offset: isize) {
        self.save_tab_view();
        self.reader.cycle_tab(offset);
        self.restore_tab_view();
    }

    fn save_tab_view(&mut self) {
        let id = self.reader.tabs().active_id().clone();
        self.saved_scroll.insert(id, self.scroll);
    }

    fn restore_tab_view(&mut self) {
        let id = self.reader.tabs().active_id();
        self.scroll = self.saved_scroll.get(id).copied().unwrap_or(0);
        self.shown.clear();
        self.anchor = None;
    }

    // Search input
    pub fn input_char(&mut self, c: char) {
        self.reader.active_tab_mut().search_input.push(c);
    }

    pub fn input_backspace(&mut self) {
        self.reader.active_tab_mut().search_input.pop();
    }

    pub fn clear_input(&mut self) {
        self.reader.active_tab_mut().search_input.clear();
    }

    pub fn is_loading(&self) -> bool {
        self.reader.tabs().iter().any(|tab| tab.loading)
    }

    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}
