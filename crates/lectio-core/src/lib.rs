pub mod canon;
pub mod config;
pub mod error;
pub mod reader;
pub mod reference;
pub mod scroll;
pub mod source;
pub mod store;
pub mod tabs;
pub mod tracker;
pub mod window;

pub use canon::{AbbreviationEntry, Canon, CanonEntry, Testament};
pub use config::Config;
pub use error::{Error, Result};
pub use reader::{Reader, SearchRequest};
pub use reference::{parse, parse_parts, ParsedParts, Reference};
pub use scroll::{RenderedMarkers, ScrollTarget};
pub use source::{fetch_window, SupabaseClient, VerseSource, DEFAULT_TRANSLATION};
pub use store::{BookGroup, ChapterGroup, ChapterKey, LoadedChapterSet, Verse, VerseKey, VerseStore};
pub use tabs::{Tab, TabId, TabManager};
pub use tracker::{Position, PositionTracker, PrefetchRequest, ViewportEvent, Viewport};
pub use window::{build_adjacent, build_window, ChapterQuery, Direction};
