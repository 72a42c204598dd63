use std::fmt;
use tracing::debug;

use crate::canon::Canon;
use crate::reference::parse_parts;

/// Something the renderer can scroll to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScrollTarget {
    Verse { book: String, chapter: u32, verse: u32 },
    ChapterHeading { book: String, chapter: u32 },
    BookHeading { book: String },
}

impl fmt::Display for ScrollTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrollTarget::Verse { book, chapter, verse } => write!(f, "{} {}:{}", book, chapter, verse),
            ScrollTarget::ChapterHeading { book, chapter } => write!(f, "{} {} heading", book, chapter),
            ScrollTarget::BookHeading { book } => write!(f, "{} heading", book),
        }
    }
}

/// Lookup side of the rendering surface: which addressable markers exist in
/// the current output.
pub trait RenderedMarkers {
    fn contains(&self, target: &ScrollTarget) -> bool;
}

/// Targets for `search_text` in fallback order: exact verse, chapter heading,
/// first verse of the chapter, book heading.
pub fn candidates(canon: &Canon, search_text: &str) -> Vec<ScrollTarget> {
    let Ok(parts) = parse_parts(canon, search_text) else {
        return Vec::new();
    };
    let book = parts.book;

    let mut targets = Vec::with_capacity(4);
    if let Some(chapter) = parts.chapter {
        if let Some(verse) = parts.verse {
            targets.push(ScrollTarget::Verse { book: book.clone(), chapter, verse });
        }
        targets.push(ScrollTarget::ChapterHeading { book: book.clone(), chapter });
        if parts.verse != Some(1) {
            targets.push(ScrollTarget::Verse { book: book.clone(), chapter, verse: 1 });
        }
    }
    targets.push(ScrollTarget::BookHeading { book });
    targets
}

/// First candidate for `search_text` that exists in the rendered output.
pub fn resolve<M: RenderedMarkers + ?Sized>(
    canon: &Canon,
    search_text: &str,
    markers: &M,
) -> Option<ScrollTarget> {
    let target = candidates(canon, search_text)
        .into_iter()
        .find(|target| markers.contains(target));
    if target.is_none() {
        debug!(search_text, "no scroll target found");
    }
    target
}
