use std::collections::HashMap;

use lectio_core::{RenderedMarkers, ScrollTarget, VerseKey, VerseStore};

/// Wrap text to fit within a given width, breaking on word boundaries only.
pub fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current_len == 0 {
            current_line = word.to_string();
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            current_line.push(' ');
            current_line.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current_line));
            current_line = word.to_string();
            current_len = word_len;
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    BookHeading,
    ChapterHeading,
    /// One wrapped row of a verse. `number` is set on the first row only.
    Verse { key: VerseKey, number: Option<u32> },
    Blank,
}

#[derive(Debug, Clone)]
pub struct LayoutLine {
    pub kind: LineKind,
    pub text: String,
}

impl LayoutLine {
    fn blank() -> Self {
        Self {
            kind: LineKind::Blank,
            text: String::new(),
        }
    }
}

/// Rows a single verse occupies, trailing blank excluded.
#[derive(Debug, Clone)]
struct VerseSpan {
    key: VerseKey,
    start: usize,
    end: usize,
}

/// The reading pane laid out as terminal rows, with the row index of every
/// addressable heading and verse.
#[derive(Debug, Clone, Default)]
pub struct ReadingLayout {
    lines: Vec<LayoutLine>,
    markers: HashMap<ScrollTarget, usize>,
    spans: Vec<VerseSpan>,
}

impl ReadingLayout {
    pub fn build(store: &VerseStore, width: usize) -> Self {
        let mut layout = Self::default();

        for group in store.grouped() {
            layout.mark(ScrollTarget::BookHeading { book: group.book.to_string() });
            layout.lines.push(LayoutLine {
                kind: LineKind::BookHeading,
                text: group.book.to_string(),
            });
            layout.lines.push(LayoutLine::blank());

            for chapter in &group.chapters {
                layout.mark(ScrollTarget::ChapterHeading {
                    book: group.book.to_string(),
                    chapter: chapter.chapter,
                });
                layout.lines.push(LayoutLine {
                    kind: LineKind::ChapterHeading,
                    text: format!("Chapter {}", chapter.chapter),
                });
                layout.lines.push(LayoutLine::blank());

                for verse in &chapter.verses {
                    layout.push_verse(verse.key(), &verse.text, width);
                }
            }
        }

        layout
    }

    fn mark(&mut self, target: ScrollTarget) {
        self.markers.insert(target, self.lines.len());
    }

    fn push_verse(&mut self, key: VerseKey, text: &str, width: usize) {
        // Continuation rows hang under the text, not the number
        let prefix_len = format!("{}  ", key.verse).chars().count();
        let wrapped = wrap_text_to_width(text, width.saturating_sub(prefix_len).max(1));

        let start = self.lines.len();
        self.mark(ScrollTarget::Verse {
            book: key.book.clone(),
            chapter: key.chapter,
            verse: key.verse,
        });

        for (idx, row) in wrapped.into_iter().enumerate() {
            let (number, text) = if idx == 0 {
                (Some(key.verse), row)
            } else {
                (None, format!("{}{}", " ".repeat(prefix_len), row))
            };
            self.lines.push(LayoutLine {
                kind: LineKind::Verse { key: key.clone(), number },
                text,
            });
        }

        self.spans.push(VerseSpan {
            key,
            start,
            end: self.lines.len(),
        });
        self.lines.push(LayoutLine::blank());
    }

    pub fn lines(&self) -> &[LayoutLine] {
        &self.lines
    }

    pub fn total_lines(&self) -> usize {
        self.lines.len()
    }

    pub fn line_of(&self, target: &ScrollTarget) -> Option<usize> {
        self.markers.get(target).copied()
    }

    pub fn verse_start(&self, key: &VerseKey) -> Option<usize> {
        self.spans.iter().find(|s| &s.key == key).map(|s| s.start)
    }

    /// Verses with at least one row inside `[scroll, scroll + height)`, each
    /// with the offset of its first row from the top of the view.
    pub fn visible_verses(&self, scroll: usize, height: usize) -> Vec<(VerseKey, i32)> {
        let bottom = scroll + height;
        self.spans
            .iter()
            .filter(|span| span.end > scroll && span.start < bottom)
            .map(|span| (span.key.clone(), span.start as i32 - scroll as i32))
            .collect()
    }
}

impl RenderedMarkers for ReadingLayout {
    fn contains(&self, target: &ScrollTarget) -> bool {
        self.markers.contains_key(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectio_core::Verse;

    fn verse(book: &str, chapter: u32, verse: u32, text: &str) -> Verse {
        Verse {
            book: book.to_string(),
            chapter,
            verse,
            text: text.to_string(),
            translation: "ASV".to_string(),
        }
    }

    fn store(verses: Vec<Verse>) -> VerseStore {
        let mut store = VerseStore::new();
        store.replace(verses);
        store
    }

    #[test]
    fn test_wrap_text_to_width() {
        assert_eq!(
            wrap_text_to_width("For God so loved the world", 10),
            vec!["For God so", "loved the", "world"]
        );
        assert_eq!(wrap_text_to_width("", 10), vec![String::new()]);
    }

    #[test]
    fn test_layout_marks_headings_and_verses() {
        let layout = ReadingLayout::build(
            &store(vec![
                verse("3 John", 1, 14, "Peace be to thee."),
                verse("Jude", 1, 1, "Jude, a servant of Jesus Christ."),
            ]),
            80,
        );

        assert_eq!(layout.line_of(&ScrollTarget::BookHeading { book: "3 John".into() }), Some(0));
        assert_eq!(
            layout.line_of(&ScrollTarget::ChapterHeading { book: "3 John".into(), chapter: 1 }),
            Some(2)
        );
        assert_eq!(
            layout.line_of(&ScrollTarget::Verse { book: "3 John".into(), chapter: 1, verse: 14 }),
            Some(4)
        );
        // verse row, blank, then the next book heading
        assert_eq!(layout.line_of(&ScrollTarget::BookHeading { book: "Jude".into() }), Some(6));
        assert!(layout.contains(&ScrollTarget::Verse { book: "Jude".into(), chapter: 1, verse: 1 }));
        assert!(!layout.contains(&ScrollTarget::Verse { book: "Jude".into(), chapter: 1, verse: 2 }));
    }

    #[test]
    fn test_long_verse_wraps_with_hanging_indent() {
        let layout = ReadingLayout::build(
            &store(vec![verse("John", 3, 16, "For God so loved the world")]),
            13,
        );
        let rows: Vec<_> = layout
            .lines()
            .iter()
            .filter(|l| matches!(l.kind, LineKind::Verse { .. }))
            .collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].text, "For God");
        assert!(rows[1].text.starts_with("    "));
        assert!(matches!(rows[1].kind, LineKind::Verse { number: None, .. }));
    }

    #[test]
    fn test_visible_verses_offsets() {
        let layout = ReadingLayout::build(
            &store(vec![
                verse("Romans", 1, 1, "Paul."),
                verse("Romans", 1, 2, "Which he promised."),
                verse("Romans", 1, 3, "Concerning his Son."),
            ]),
            80,
        );
        // rows: 0 book, 1 blank, 2 chapter, 3 blank, 4 v1, 5 blank, 6 v2, 7 blank, 8 v3
        let visible = layout.visible_verses(5, 3);
        assert_eq!(visible, vec![(VerseKey::new("Romans", 1, 2), 1)]);

        let visible = layout.visible_verses(4, 10);
        assert_eq!(visible.len(), 3);
        assert_eq!(visible[0], (VerseKey::new("Romans", 1, 1), 0));
        assert_eq!(layout.verse_start(&VerseKey::new("Romans", 1, 3)), Some(8));
    }
}
