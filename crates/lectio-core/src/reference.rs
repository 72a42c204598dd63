use regex::{Captures, Regex};
use std::fmt;
use std::sync::LazyLock;

use crate::canon::Canon;
use crate::error::{Error, Result};

/// A resolved scripture reference. Only `parse` builds these, so `book` is
/// always a canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub book: String,
    pub chapter: u32,
    pub verse: Option<u32>,
    pub verse_end: Option<u32>,
}

impl Reference {
    /// Whether `verse` of `book` `chapter` falls inside the typed verse or range.
    /// A chapter-only reference covers no verse.
    pub fn covers(&self, book: &str, chapter: u32, verse: u32) -> bool {
        if self.book != book || self.chapter != chapter {
            return false;
        }
        match (self.verse, self.verse_end) {
            (Some(start), Some(end)) => (start..=end).contains(&verse),
            (Some(start), None) => start == verse,
            (None, _) => false,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.book, self.chapter)?;
        if let Some(verse) = self.verse {
            write!(f, ":{}", verse)?;
            if let Some(end) = self.verse_end {
                write!(f, "-{}", end)?;
            }
        }
        Ok(())
    }
}

/// What the user actually typed, already resolved to a book. `chapter` is
/// `None` for a bare book name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedParts {
    pub book: String,
    pub chapter: Option<u32>,
    pub verse: Option<u32>,
    pub verse_end: Option<u32>,
}

struct Rule {
    pattern: Regex,
    numbered: bool,
    chapter: bool,
    verse: bool,
}

impl Rule {
    fn new(pattern: &str, numbered: bool, chapter: bool, verse: bool) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("rule patterns are fixed literals"),
            numbered,
            chapter,
            verse,
        }
    }

    fn apply(&self, canon: &Canon, caps: &Captures<'_>) -> Option<ParsedParts> {
        let (book_text, mut idx) = if self.numbered {
            (format!("{} {}", caps.get(1)?.as_str(), caps.get(2)?.as_str()), 3)
        } else {
            (caps.get(1)?.as_str().to_string(), 2)
        };

        let mut parts = ParsedParts {
            book: String::new(),
            chapter: None,
            verse: None,
            verse_end: None,
        };

        if self.chapter {
            parts.chapter = Some(number(caps, idx)?);
            idx += 1;
        }
        if self.verse {
            let start = number(caps, idx)?;
            parts.verse = Some(start);
            if caps.get(idx + 1).is_some() {
                let end = number(caps, idx + 1)?;
                if end < start {
                    return None;
                }
                parts.verse_end = Some(end);
            }
        }

        parts.book = canon.normalize(&book_text)?.to_string();
        Some(parts)
    }
}

/// Positive base-10 integer, anything else makes the rule inapplicable.
fn number(caps: &Captures<'_>, idx: usize) -> Option<u32> {
    caps.get(idx)?.as_str().parse::<u32>().ok().filter(|n| *n > 0)
}

// Most specific first: numbered-book forms before generic ones, and within a
// tier verse-bearing before chapter-only before book-only.
static RULES: LazyLock<[Rule; 5]> = LazyLock::new(|| {
    [
        Rule::new(r"^(\d+)\s+(.+?)\s+(\d+):(\d+)(?:-(\d+))?$", true, true, true),
        Rule::new(r"^(.+?)\s+(\d+):(\d+)(?:-(\d+))?$", false, true, true),
        Rule::new(r"^(\d+)\s+(.+?)\s+(\d+)$", true, true, false),
        Rule::new(r"^(.+?)\s+(\d+)$", false, true, false),
        Rule::new(r"^(.+)$", false, false, false),
    ]
});

/// Run the rule tiers and report which parts were present.
pub fn parse_parts(canon: &Canon, text: &str) -> Result<ParsedParts> {
    let input = text.trim();
    if input.is_empty() {
        return Err(Error::EmptyInput);
    }

    RULES
        .iter()
        .filter_map(|rule| rule.pattern.captures(input).map(|caps| (rule, caps)))
        .find_map(|(rule, caps)| rule.apply(canon, &caps))
        .ok_or_else(|| Error::InvalidReference(input.to_string()))
}

/// Parse free text such as `"1 Cor 13:4-7"`, `"Romans 8"` or `"gen"` into a
/// reference. A bare book name means chapter 1.
pub fn parse(canon: &Canon, text: &str) -> Result<Reference> {
    let parts = parse_parts(canon, text)?;
    Ok(Reference {
        book: parts.book,
        chapter: parts.chapter.unwrap_or(1),
        verse: parts.verse,
        verse_end: parts.verse_end,
    })
}
