use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// A verse row as the verse service returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    pub text: String,
    #[serde(default)]
    pub translation: String,
}

impl Verse {
    pub fn key(&self) -> VerseKey {
        VerseKey::new(&self.book, self.chapter, self.verse)
    }

    pub fn chapter_key(&self) -> ChapterKey {
        ChapterKey::new(&self.book, self.chapter)
    }

    fn identity(&self) -> VerseIdentity {
        (
            self.book.clone(),
            self.chapter,
            self.verse,
            self.translation.clone(),
        )
    }
}

type VerseIdentity = (String, u32, u32, String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChapterKey {
    pub book: String,
    pub chapter: u32,
}

impl ChapterKey {
    pub fn new(book: impl Into<String>, chapter: u32) -> Self {
        Self {
            book: book.into(),
            chapter,
        }
    }
}

impl fmt::Display for ChapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.book, self.chapter)
    }
}

/// Address of one rendered verse element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VerseKey {
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
}

impl VerseKey {
    pub fn new(book: impl Into<String>, chapter: u32, verse: u32) -> Self {
        Self {
            book: book.into(),
            chapter,
            verse,
        }
    }
}

impl fmt::Display for VerseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.book, self.chapter, self.verse)
    }
}

/// Chapters already merged into a tab.
pub type LoadedChapterSet = BTreeSet<ChapterKey>;

pub struct ChapterGroup<'a> {
    pub chapter: u32,
    pub verses: Vec<&'a Verse>,
}

pub struct BookGroup<'a> {
    pub book: &'a str,
    pub chapters: Vec<ChapterGroup<'a>>,
}

/// The verses materialized for one tab.
///
/// Storage is never re-sorted across books: verse numbers restart every
/// chapter, so a window spanning Acts 28 and Romans 1 keeps the order the
/// chapters were fetched in. A single-book store is kept sorted by
/// (chapter, verse).
#[derive(Debug, Clone, Default)]
pub struct VerseStore {
    verses: Vec<Verse>,
    seen: HashSet<VerseIdentity>,
    loaded: LoadedChapterSet,
}

impl VerseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard everything and start over from a fresh search result.
    pub fn replace(&mut self, verses: Vec<Verse>) {
        self.verses.clear();
        self.seen.clear();
        self.loaded.clear();
        self.push_unseen(verses);
        self.loaded = self.verses.iter().map(Verse::chapter_key).collect();
        self.reorder();
    }

    /// Append verses not already present. Returns how many were added.
    pub fn merge(&mut self, verses: Vec<Verse>) -> usize {
        let added = self.push_unseen(verses);
        self.reorder();
        added
    }

    /// Like `merge`, but places the new verses before the existing ones.
    pub fn merge_front(&mut self, verses: Vec<Verse>) -> usize {
        let mut fresh = Vec::with_capacity(verses.len());
        for verse in verses {
            if self.seen.insert(verse.identity()) {
                fresh.push(verse);
            }
        }
        let added = fresh.len();
        fresh.append(&mut self.verses);
        self.verses = fresh;
        self.reorder();
        added
    }

    fn push_unseen(&mut self, verses: Vec<Verse>) -> usize {
        let before = self.verses.len();
        for verse in verses {
            if self.seen.insert(verse.identity()) {
                self.verses.push(verse);
            }
        }
        self.verses.len() - before
    }

    fn reorder(&mut self) {
        if !self.spans_multiple_books() {
            self.verses.sort_by_key(|v| (v.chapter, v.verse));
        }
    }

    pub fn clear(&mut self) {
        self.verses.clear();
        self.seen.clear();
        self.loaded.clear();
    }

    /// Verses in display order.
    pub fn verses(&self) -> &[Verse] {
        &self.verses
    }

    pub fn len(&self) -> usize {
        self.verses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verses.is_empty()
    }

    pub fn loaded(&self) -> &LoadedChapterSet {
        &self.loaded
    }

    pub fn is_loaded(&self, key: &ChapterKey) -> bool {
        self.loaded.contains(key)
    }

    pub fn mark_loaded(&mut self, key: ChapterKey) {
        self.loaded.insert(key);
    }

    /// Distinct books in display order.
    pub fn books(&self) -> Vec<&str> {
        let mut books: Vec<&str> = Vec::new();
        for verse in &self.verses {
            if !books.contains(&verse.book.as_str()) {
                books.push(&verse.book);
            }
        }
        books
    }

    pub fn spans_multiple_books(&self) -> bool {
        match self.verses.first() {
            Some(first) => self.verses.iter().any(|v| v.book != first.book),
            None => false,
        }
    }

    /// Lowest and highest chapter of `book` that has verses in this store.
    pub fn loaded_range(&self, book: &str) -> Option<(u32, u32)> {
        self.verses
            .iter()
            .filter(|v| v.book == book)
            .fold(None, |range, v| match range {
                None => Some((v.chapter, v.chapter)),
                Some((lo, hi)) => Some((lo.min(v.chapter), hi.max(v.chapter))),
            })
    }

    pub fn find(&self, key: &VerseKey) -> Option<&Verse> {
        self.verses
            .iter()
            .find(|v| v.book == key.book && v.chapter == key.chapter && v.verse == key.verse)
    }

    /// Books in order of first appearance, each with its chapters ascending.
    pub fn grouped(&self) -> Vec<BookGroup<'_>> {
        let mut groups: Vec<BookGroup<'_>> = Vec::new();

        for verse in &self.verses {
            let existing = groups.iter().position(|g| g.book == verse.book);
            let group = match existing {
                Some(idx) => &mut groups[idx],
                None => {
                    groups.push(BookGroup {
                        book: &verse.book,
                        chapters: Vec::new(),
                    });
                    let last = groups.len() - 1;
                    &mut groups[last]
                }
            };

            match group.chapters.iter().position(|c| c.chapter == verse.chapter) {
                Some(idx) => group.chapters[idx].verses.push(verse),
                None => group.chapters.push(ChapterGroup {
                    chapter: verse.chapter,
                    verses: vec![verse],
                }),
            }
        }

        for group in &mut groups {
            group.chapters.sort_by_key(|c| c.chapter);
        }
        groups
    }
}
