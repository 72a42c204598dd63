use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Testament {
    #[serde(rename = "OLD", alias = "OT", alias = "Old", alias = "old", alias = "Old Testament")]
    Old,
    #[serde(rename = "NEW", alias = "NT", alias = "New", alias = "new", alias = "New Testament")]
    New,
}

/// One book of the canon. `order` defines adjacency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonEntry {
    pub name: String,
    pub order: u32,
    pub chapters: u32,
    pub testament: Testament,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbbreviationEntry {
    pub abbreviation: String,
    pub book_name: String,
}

/// The ordered book list plus the alias table used to resolve typed names.
#[derive(Debug, Clone)]
pub struct Canon {
    books: Vec<CanonEntry>,
    by_name: HashMap<String, usize>,
    abbreviations: HashMap<String, String>,
}

impl Canon {
    pub fn new(mut books: Vec<CanonEntry>, abbreviations: Vec<AbbreviationEntry>) -> Self {
        books.sort_by_key(|b| b.order);

        let by_name = books
            .iter()
            .enumerate()
            .map(|(idx, book)| (book.name.clone(), idx))
            .collect();

        // Later rows overwrite earlier ones for the same alias
        let mut aliases = HashMap::new();
        for entry in abbreviations {
            aliases.insert(entry.abbreviation.trim().to_lowercase(), entry.book_name);
        }

        debug!(books = books.len(), abbreviations = aliases.len(), "canon built");

        Self {
            books,
            by_name,
            abbreviations: aliases,
        }
    }

    /// The 66-book Protestant canon with a default abbreviation table.
    pub fn standard() -> Self {
        let books = STANDARD_BOOKS
            .iter()
            .enumerate()
            .map(|(idx, (name, chapters))| CanonEntry {
                name: (*name).to_string(),
                order: idx as u32 + 1,
                chapters: *chapters,
                testament: if idx < OLD_TESTAMENT_BOOKS {
                    Testament::Old
                } else {
                    Testament::New
                },
            })
            .collect();

        let abbreviations = STANDARD_ABBREVIATIONS
            .iter()
            .map(|(abbreviation, book)| AbbreviationEntry {
                abbreviation: (*abbreviation).to_string(),
                book_name: (*book).to_string(),
            })
            .collect();

        Self::new(books, abbreviations)
    }

    pub fn books(&self) -> &[CanonEntry] {
        &self.books
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn book(&self, name: &str) -> Option<&CanonEntry> {
        self.by_name.get(name).map(|&idx| &self.books[idx])
    }

    pub fn last_chapter(&self, name: &str) -> Option<u32> {
        self.book(name).map(|b| b.chapters)
    }

    pub fn previous_book(&self, name: &str) -> Option<&CanonEntry> {
        let idx = *self.by_name.get(name)?;
        idx.checked_sub(1).map(|prev| &self.books[prev])
    }

    pub fn next_book(&self, name: &str) -> Option<&CanonEntry> {
        let idx = *self.by_name.get(name)?;
        self.books.get(idx + 1)
    }

    pub fn abbreviations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.abbreviations
            .iter()
            .map(|(alias, book)| (alias.as_str(), book.as_str()))
    }

    /// Resolve free text to a canonical book name.
    ///
    /// Tries, in order: the alias table, a case-insensitive match on the
    /// canonical name, then substring containment in either direction (first
    /// book in canon order wins).
    pub fn normalize(&self, input: &str) -> Option<&str> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        if let Some(book) = self.abbreviations.get(&needle) {
            if let Some(entry) = self.book(book) {
                return Some(entry.name.as_str());
            }
        }

        if let Some(entry) = self.books.iter().find(|b| b.name.to_lowercase() == needle) {
            return Some(entry.name.as_str());
        }

        self.books
            .iter()
            .find(|b| {
                let name = b.name.to_lowercase();
                name.contains(&needle) || needle.contains(&name)
            })
            .map(|b| b.name.as_str())
    }
}

const OLD_TESTAMENT_BOOKS: usize = 39;

const STANDARD_BOOKS: [(&str, u32); 66] = [
    ("Genesis", 50),
    ("Exodus", 40),
    ("Leviticus", 27),
    ("Numbers", 36),
    ("Deuteronomy", 34),
    ("Joshua", 24),
    ("Judges", 21),
    ("Ruth", 4),
    ("1 Samuel", 31),
    ("2 Samuel", 24),
    ("1 Kings", 22),
    ("2 Kings", 25),
    ("1 Chronicles", 29),
    ("2 Chronicles", 36),
    ("Ezra", 10),
    ("Nehemiah", 13),
    ("Esther", 10),
    ("Job", 42),
    ("Psalms", 150),
    ("Proverbs", 31),
    ("Ecclesiastes", 12),
    ("Song of Solomon", 8),
    ("Isaiah", 66),
    ("Jeremiah", 52),
    ("Lamentations", 5),
    ("Ezekiel", 48),
    ("Daniel", 12),
    ("Hosea", 14),
    ("Joel", 3),
    ("Amos", 9),
    ("Obadiah", 1),
    ("Jonah", 4),
    ("Micah", 7),
    ("Nahum", 3),
    ("Habakkuk", 3),
    ("Zephaniah", 3),
    ("Haggai", 2),
    ("Zechariah", 14),
    ("Malachi", 4),
    ("Matthew", 28),
    ("Mark", 16),
    ("Luke", 24),
    ("John", 21),
    ("Acts", 28),
    ("Romans", 16),
    ("1 Corinthians", 16),
    ("2 Corinthians", 13),
    ("Galatians", 6),
    ("Ephesians", 6),
    ("Philippians", 4),
    ("Colossians", 4),
    ("1 Thessalonians", 5),
    ("2 Thessalonians", 3),
    ("1 Timothy", 6),
    ("2 Timothy", 4),
    ("Titus", 3),
    ("Philemon", 1),
    ("Hebrews", 13),
    ("James", 5),
    ("1 Peter", 5),
    ("2 Peter", 3),
    ("1 John", 5),
    ("2 John", 1),
    ("3 John", 1),
    ("Jude", 1),
    ("Revelation", 22),
];

const STANDARD_ABBREVIATIONS: &[(&str, &str)] = &[
    ("gen", "Genesis"),
    ("ex", "Exodus"),
    ("exod", "Exodus"),
    ("lev", "Leviticus"),
    ("num", "Numbers"),
    ("deut", "Deuteronomy"),
    ("josh", "Joshua"),
    ("judg", "Judges"),
    ("ruth", "Ruth"),
    ("1sam", "1 Samuel"),
    ("2sam", "2 Samuel"),
    ("1kgs", "1 Kings"),
    ("2kgs", "2 Kings"),
    ("1chr", "1 Chronicles"),
    ("2chr", "2 Chronicles"),
    ("neh", "Nehemiah"),
    ("esth", "Esther"),
    ("ps", "Psalms"),
    ("psa", "Psalms"),
    ("psalm", "Psalms"),
    ("prov", "Proverbs"),
    ("eccl", "Ecclesiastes"),
    ("song", "Song of Solomon"),
    ("sos", "Song of Solomon"),
    ("isa", "Isaiah"),
    ("jer", "Jeremiah"),
    ("lam", "Lamentations"),
    ("ezek", "Ezekiel"),
    ("dan", "Daniel"),
    ("hos", "Hosea"),
    ("obad", "Obadiah"),
    ("mic", "Micah"),
    ("nah", "Nahum"),
    ("hab", "Habakkuk"),
    ("zeph", "Zephaniah"),
    ("hag", "Haggai"),
    ("zech", "Zechariah"),
    ("mal", "Malachi"),
    ("matt", "Matthew"),
    ("mk", "Mark"),
    ("luke", "Luke"),
    ("john", "John"),
    ("acts", "Acts"),
    ("rom", "Romans"),
    ("1cor", "1 Corinthians"),
    ("2cor", "2 Corinthians"),
    ("gal", "Galatians"),
    ("eph", "Ephesians"),
    ("phil", "Philippians"),
    ("col", "Colossians"),
    ("1thess", "1 Thessalonians"),
    ("2thess", "2 Thessalonians"),
    ("1tim", "1 Timothy"),
    ("2tim", "2 Timothy"),
    ("titus", "Titus"),
    ("phlm", "Philemon"),
    ("heb", "Hebrews"),
    ("jas", "James"),
    ("1pet", "1 Peter"),
    ("2pet", "2 Peter"),
    ("1john", "1 John"),
    ("2john", "2 John"),
    ("3john", "3 John"),
    ("jude", "Jude"),
    ("rev", "Revelation"),
];
