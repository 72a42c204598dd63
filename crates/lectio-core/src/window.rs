//! Chapter-window queries for continuous reading.
//!
//! A window is the current chapter plus its neighbours. At a book's first or
//! last chapter the window reaches into the adjacent book so scrolling can
//! cross the boundary without a fresh search.

use std::collections::BTreeSet;

use crate::canon::Canon;
use crate::error::{Error, Result};
use crate::store::ChapterKey;

/// One request against the verse service: a book and the chapters wanted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterQuery {
    pub book: String,
    pub chapters: BTreeSet<u32>,
}

impl ChapterQuery {
    pub fn new(book: impl Into<String>, chapters: impl IntoIterator<Item = u32>) -> Self {
        Self {
            book: book.into(),
            chapters: chapters.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

/// Queries for the three-chapter window centred on `book` `chapter`, in
/// canon order.
pub fn build_window(canon: &Canon, book: &str, chapter: u32) -> Result<Vec<ChapterQuery>> {
    let entry = canon
        .book(book)
        .ok_or_else(|| Error::UnknownBook(book.to_string()))?;
    let last = entry.chapters;

    if chapter == 0 || chapter > last {
        return Err(Error::ChapterOutOfRange {
            book: book.to_string(),
            chapter,
            last,
        });
    }

    let mut queries = Vec::with_capacity(3);

    if chapter == 1 {
        if let Some(prev) = canon.previous_book(book) {
            queries.push(ChapterQuery::new(&prev.name, [prev.chapters]));
        }
    }

    queries.push(ChapterQuery::new(
        book,
        [chapter.saturating_sub(1).max(1), chapter, (chapter + 1).min(last)],
    ));

    if chapter == last {
        if let Some(next) = canon.next_book(book) {
            queries.push(ChapterQuery::new(&next.name, [1]));
        }
    }

    Ok(queries)
}

/// The single chapter one step away from `book` `chapter`, crossing into the
/// neighbouring book at a chapter boundary. `None` past either end of the canon.
pub fn build_adjacent(
    canon: &Canon,
    direction: Direction,
    book: &str,
    chapter: u32,
) -> Option<ChapterKey> {
    let entry = canon.book(book)?;

    match direction {
        Direction::Forward if chapter < entry.chapters => {
            Some(ChapterKey::new(book, chapter + 1))
        }
        Direction::Forward => canon
            .next_book(book)
            .map(|next| ChapterKey::new(&next.name, 1)),
        Direction::Backward if chapter > 1 => Some(ChapterKey::new(book, chapter - 1)),
        Direction::Backward => canon
            .previous_book(book)
            .map(|prev| ChapterKey::new(&prev.name, prev.chapters)),
    }
}
