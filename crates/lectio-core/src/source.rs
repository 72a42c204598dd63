//! The remote verse service.
//!
//! `VerseSource` is the query contract the reader depends on;
//! `SupabaseClient` implements it over the PostgREST endpoints of the hosted
//! Bible database.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::canon::{AbbreviationEntry, CanonEntry, Testament};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::Verse;
use crate::window::ChapterQuery;

pub trait VerseSource: Sync {
    fn load_canon(&self) -> impl Future<Output = Result<Vec<CanonEntry>>> + Send;

    fn load_abbreviations(&self) -> impl Future<Output = Result<Vec<AbbreviationEntry>>> + Send;

    /// Verses for `chapters` of `book`, ordered by chapter then verse. Fails
    /// on transport errors and non-2xx responses.
    fn fetch_chapter_set(
        &self,
        book: &str,
        chapters: &BTreeSet<u32>,
    ) -> impl Future<Output = Result<Vec<Verse>>> + Send;

    /// Best-effort single chapter fetch: failures are logged and yield no verses.
    fn fetch_single_chapter(&self, book: &str, chapter: u32) -> impl Future<Output = Vec<Verse>> + Send {
        async move {
            let chapters = BTreeSet::from([chapter]);
            match self.fetch_chapter_set(book, &chapters).await {
                Ok(verses) => {
                    info!(book, chapter, verses = verses.len(), "loaded chapter");
                    verses
                }
                Err(e) => {
                    warn!(book, chapter, error = %e, "failed to load chapter");
                    Vec::new()
                }
            }
        }
    }
}

/// Issue `queries` strictly one after another and concatenate the results in
/// issue order.
pub async fn fetch_window<S: VerseSource>(source: &S, queries: &[ChapterQuery]) -> Result<Vec<Verse>> {
    let mut verses = Vec::new();
    for query in queries {
        let mut batch = source.fetch_chapter_set(&query.book, &query.chapters).await?;
        debug!(book = %query.book, chapters = ?query.chapters, verses = batch.len(), "window query");
        verses.append(&mut batch);
    }
    Ok(verses)
}

#[derive(Deserialize)]
struct BookRow {
    book_name: String,
    book_order: u32,
    total_chapters: u32,
    testament: Testament,
}

#[derive(Deserialize)]
struct AbbreviationRow {
    book_name: String,
    abbreviation: String,
}

pub const DEFAULT_TRANSLATION: &str = "ASV";

#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    translation: String,
}

impl SupabaseClient {
    pub fn new(base_url: &str, api_key: Option<&str>, translation: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
            translation: translation.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| Error::Config("no verse service URL configured (set LECTIO_API_URL)".to_string()))?;
        Ok(Self::new(base_url, config.api_key.as_deref(), config.translation()))
    }

    pub fn translation(&self) -> &str {
        &self.translation
    }

    fn get(&self, table: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, table);
        let request = self.client.get(url);
        match &self.api_key {
            Some(key) => request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.get(table).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::fetch(
                Some(status.as_u16()),
                format!("API error: {}", status),
            ));
        }

        Ok(response.json().await?)
    }
}

impl VerseSource for SupabaseClient {
    async fn load_canon(&self) -> Result<Vec<CanonEntry>> {
        let rows: Vec<BookRow> = self
            .get_json("bible_books", &[("order", "book_order".to_string())])
            .await?;
        info!(books = rows.len(), "loaded canon");

        Ok(rows
            .into_iter()
            .map(|row| CanonEntry {
                name: row.book_name,
                order: row.book_order,
                chapters: row.total_chapters,
                testament: row.testament,
            })
            .collect())
    }

    async fn load_abbreviations(&self) -> Result<Vec<AbbreviationEntry>> {
        let rows: Vec<AbbreviationRow> = self
            .get_json(
                "book_abbreviations",
                &[("select", "book_name,abbreviation".to_string())],
            )
            .await?;
        info!(abbreviations = rows.len(), "loaded book abbreviations");

        Ok(rows
            .into_iter()
            .map(|row| AbbreviationEntry {
                abbreviation: row.abbreviation,
                book_name: row.book_name,
            })
            .collect())
    }

    async fn fetch_chapter_set(&self, book: &str, chapters: &BTreeSet<u32>) -> Result<Vec<Verse>> {
        let chapter_filter = chapters
            .iter()
            .map(|c| format!("chapter.eq.{}", c))
            .collect::<Vec<_>>()
            .join(",");

        self.get_json(
            "bible_verses",
            &[
                ("book", format!("eq.{}", book)),
                ("or", format!("({})", chapter_filter)),
                ("translation", format!("eq.{}", self.translation)),
                ("order", "chapter,verse".to_string()),
            ],
        )
        .await
    }
}
