//! Internet Archive client.
//!
//! Uses the `advancedsearch.php` endpoint for search, browse and counts, and
//! `/metadata/{id}` for full item lookups. No API key is required.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::rate_limiter::RateLimiter;
use super::retry::with_retry;
use super::types::{CollectionPage, ItemDescriptor, SubtitleTrack};
use super::{SourceClient, SourceError};
use crate::config::{RetryConfig, SourceConfig};
use crate::metrics;

/// Fields requested from the search API.
const SEARCH_FIELDS: &[&str] = &[
    "identifier",
    "title",
    "year",
    "runtime",
    "language",
    "downloads",
    "description",
    "subject",
    "collection",
];

/// Playable formats in order of preference.
const FALLBACK_VIDEO_EXTENSIONS: &[&str] = &[".ogv", ".webm", ".mkv", ".avi"];

const SUBTITLE_EXTENSIONS: &[&str] = &[".srt", ".vtt"];

/// Internet Archive API client.
pub struct ArchiveClient {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
    retry: RetryConfig,
}

impl ArchiveClient {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SourceError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::new(config.requests_per_minute),
            retry: config.retry.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One rate-limited GET with status mapping. 404 maps to `NotFound(what)`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T, SourceError> {
        with_retry(&self.retry, operation, move || async move {
            self.limiter.acquire().await;

            let start = Instant::now();
            let result = self.send(url, query, what).await;
            metrics::SOURCE_REQUEST_DURATION
                .with_label_values(&[operation])
                .observe(start.elapsed().as_secs_f64());

            let status = match &result {
                Ok(_) => "success",
                Err(e) => e.label(),
            };
            metrics::SOURCE_REQUESTS
                .with_label_values(&[operation, status])
                .inc();

            result
        })
        .await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T, SourceError> {
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(what.to_string()));
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(SourceError::Unavailable(format!(
                "archive returned {} for {}",
                status.as_u16(),
                what
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Parse(format!(
                "unexpected status {}: {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("{}: {}", what, e)))
    }

    async fn advanced_search(
        &self,
        operation: &str,
        q: String,
        rows: u32,
        page: u32,
    ) -> Result<SearchBody, SourceError> {
        let url = format!("{}/advancedsearch.php", self.base_url);

        let mut query: Vec<(&str, String)> = vec![("q", q.clone())];
        for field in SEARCH_FIELDS {
            query.push(("fl[]", field.to_string()));
        }
        query.push(("sort[]", "downloads desc".to_string()));
        query.push(("rows", rows.to_string()));
        query.push(("page", page.max(1).to_string()));
        query.push(("output", "json".to_string()));

        debug!("Archive search: q='{}', rows={}, page={}", q, rows, page);

        let response: SearchResponse = self.get_json(operation, &url, &query, &q).await?;
        Ok(response.response)
    }

    async fn metadata(&self, operation: &str, source_id: &str) -> Result<MetadataResponse, SourceError> {
        let url = format!(
            "{}/metadata/{}",
            self.base_url,
            urlencoding::encode(source_id)
        );

        debug!("Archive metadata: id='{}'", source_id);

        let response: MetadataResponse = self.get_json(operation, &url, &[], source_id).await?;
        if response.is_empty() {
            return Err(SourceError::NotFound(source_id.to_string()));
        }
        Ok(response)
    }
}

fn collection_query(key: &str) -> String {
    format!("collection:({}) AND mediatype:(movies)", key)
}

#[async_trait]
impl SourceClient for ArchiveClient {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<ItemDescriptor>, SourceError> {
        let q = format!("({}) AND mediatype:(movies)", query.trim());
        let body = self.advanced_search("search", q, limit, 1).await?;
        Ok(body
            .docs
            .into_iter()
            .map(|doc| doc.into_descriptor(&self.base_url))
            .collect())
    }

    async fn list_collection(
        &self,
        key: &str,
        page: u32,
        page_size: u32,
    ) -> Result<CollectionPage, SourceError> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let body = self
            .advanced_search("list_collection", collection_query(key), page_size, page)
            .await?;

        if body.num_found == 0 && page == 1 {
            return Err(SourceError::CollectionNotFound(key.to_string()));
        }

        Ok(build_page(&self.base_url, body, page, page_size))
    }

    async fn fetch_item(&self, source_id: &str) -> Result<ItemDescriptor, SourceError> {
        let response = self.metadata("fetch_item", source_id).await?;
        response.into_descriptor(&self.base_url, source_id)
    }

    async fn collection_count(&self, key: &str) -> Result<u64, SourceError> {
        let body = self
            .advanced_search("collection_count", collection_query(key), 0, 1)
            .await?;
        Ok(body.num_found)
    }

    async fn fetch_subtitles(&self, source_id: &str) -> Result<Vec<SubtitleTrack>, SourceError> {
        let response = self.metadata("fetch_subtitles", source_id).await?;
        Ok(response.subtitle_tracks(&self.base_url, source_id))
    }
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    response: SearchBody,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(rename = "numFound", default)]
    num_found: u64,
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

/// Search documents are loosely typed: most fields may be a string, a number
/// or an array depending on how the uploader filled them in.
#[derive(Debug, Deserialize)]
struct SearchDoc {
    identifier: String,
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    year: Option<Value>,
    #[serde(default)]
    runtime: Option<Value>,
    #[serde(default)]
    language: Option<Value>,
    #[serde(default)]
    downloads: Option<Value>,
    #[serde(default)]
    description: Option<Value>,
    #[serde(default)]
    subject: Option<Value>,
    #[serde(default)]
    collection: Option<Value>,
}

impl SearchDoc {
    fn into_descriptor(self, base_url: &str) -> ItemDescriptor {
        let title = self
            .title
            .as_ref()
            .and_then(first_string)
            .unwrap_or_else(|| self.identifier.clone());

        ItemDescriptor {
            thumbnail_url: Some(thumbnail_url(base_url, &self.identifier)),
            title,
            year: self.year.as_ref().and_then(parse_year),
            duration_seconds: self
                .runtime
                .as_ref()
                .and_then(first_string)
                .and_then(|r| parse_runtime(&r)),
            language: self.language.as_ref().and_then(first_string),
            downloads: self.downloads.as_ref().and_then(as_u64).unwrap_or(0),
            video_url: None,
            has_subtitles: false,
            description: self.description.as_ref().and_then(first_string),
            subjects: self.subject.as_ref().map(string_list).unwrap_or_default(),
            collections: self.collection.as_ref().map(string_list).unwrap_or_default(),
            source_id: self.identifier,
        }
    }
}

fn build_page(base_url: &str, body: SearchBody, page: u32, page_size: u32) -> CollectionPage {
    let total = body.num_found;
    let pages = total.div_ceil(page_size as u64) as u32;
    CollectionPage {
        items: body
            .docs
            .into_iter()
            .map(|doc| doc.into_descriptor(base_url))
            .collect(),
        page,
        pages,
        total,
    }
}

#[derive(Debug, Default, Deserialize)]
struct MetadataResponse {
    #[serde(default)]
    metadata: Option<ItemMetadata>,
    #[serde(default)]
    files: Vec<ArchiveFile>,
}

#[derive(Debug, Default, Deserialize)]
struct ItemMetadata {
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    year: Option<Value>,
    #[serde(default)]
    date: Option<Value>,
    #[serde(default)]
    runtime: Option<Value>,
    #[serde(default)]
    language: Option<Value>,
    #[serde(default)]
    downloads: Option<Value>,
    #[serde(default)]
    description: Option<Value>,
    #[serde(default)]
    subject: Option<Value>,
    #[serde(default)]
    collection: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ArchiveFile {
    name: String,
    #[serde(default)]
    format: Option<String>,
}

impl ArchiveFile {
    fn has_extension(&self, ext: &str) -> bool {
        self.name.to_ascii_lowercase().ends_with(ext)
    }

    fn is_h264(&self) -> bool {
        if self.has_extension(".mp4") {
            return true;
        }
        self.format.as_deref().is_some_and(|f| {
            let f = f.to_ascii_lowercase();
            f.contains("mpeg4") || f.contains("h.264")
        })
    }
}

impl MetadataResponse {
    /// The metadata endpoint answers `{}` for unknown identifiers.
    fn is_empty(&self) -> bool {
        self.metadata.is_none() && self.files.is_empty()
    }

    fn video_file(&self) -> Option<&ArchiveFile> {
        self.files.iter().find(|f| f.is_h264()).or_else(|| {
            FALLBACK_VIDEO_EXTENSIONS
                .iter()
                .find_map(|ext| self.files.iter().find(|f| f.has_extension(ext)))
        })
    }

    fn subtitle_files(&self) -> impl Iterator<Item = &ArchiveFile> {
        self.files
            .iter()
            .filter(|f| SUBTITLE_EXTENSIONS.iter().any(|ext| f.has_extension(ext)))
    }

    fn subtitle_tracks(&self, base_url: &str, source_id: &str) -> Vec<SubtitleTrack> {
        self.subtitle_files()
            .map(|f| {
                let lower = f.name.to_ascii_lowercase();
                let format = if lower.ends_with(".vtt") { "vtt" } else { "srt" };
                SubtitleTrack {
                    file_name: f.name.clone(),
                    url: download_url(base_url, source_id, &f.name),
                    format: format.to_string(),
                    language: subtitle_language(&f.name),
                }
            })
            .collect()
    }

    fn into_descriptor(
        self,
        base_url: &str,
        source_id: &str,
    ) -> Result<ItemDescriptor, SourceError> {
        let video_url = self
            .video_file()
            .map(|f| download_url(base_url, source_id, &f.name));
        let has_subtitles = self.subtitle_files().next().is_some();

        let meta = self.metadata.ok_or_else(|| {
            SourceError::Parse(format!("metadata block missing for {}", source_id))
        })?;

        let year = meta
            .year
            .as_ref()
            .and_then(parse_year)
            .or_else(|| meta.date.as_ref().and_then(parse_year));

        Ok(ItemDescriptor {
            source_id: source_id.to_string(),
            title: meta
                .title
                .as_ref()
                .and_then(first_string)
                .unwrap_or_default(),
            year,
            duration_seconds: meta
                .runtime
                .as_ref()
                .and_then(first_string)
                .and_then(|r| parse_runtime(&r)),
            language: meta.language.as_ref().and_then(first_string),
            downloads: meta.downloads.as_ref().and_then(as_u64).unwrap_or(0),
            thumbnail_url: Some(thumbnail_url(base_url, source_id)),
            video_url,
            has_subtitles,
            description: meta.description.as_ref().and_then(first_string),
            subjects: meta.subject.as_ref().map(string_list).unwrap_or_default(),
            collections: meta.collection.as_ref().map(string_list).unwrap_or_default(),
        })
    }
}

// =============================================================================
// Field helpers
// =============================================================================

fn thumbnail_url(base_url: &str, source_id: &str) -> String {
    format!("{}/services/img/{}", base_url, source_id)
}

fn download_url(base_url: &str, source_id: &str, file_name: &str) -> String {
    format!(
        "{}/download/{}/{}",
        base_url,
        source_id,
        urlencoding::encode(file_name)
    )
}

/// `movie.en.srt` -> `en`
fn subtitle_language(file_name: &str) -> Option<String> {
    let mut parts = file_name.rsplit('.');
    parts.next()?;
    let candidate = parts.next()?;
    let is_code = (2..=3).contains(&candidate.len())
        && candidate.chars().all(|c| c.is_ascii_alphabetic());
    // A bare "movie.srt" has no language segment.
    if is_code && parts.next().is_some() {
        Some(candidate.to_ascii_lowercase())
    } else {
        None
    }
}

fn first_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(first_string),
        _ => None,
    }
}

/// Subjects and collections come either as arrays or as `;`-separated strings.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items.iter().flat_map(string_list).collect(),
        Value::Number(n) => vec![n.to_string()],
        _ => Vec::new(),
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(items) => items.iter().find_map(as_u64),
        _ => None,
    }
}

/// Accepts `1968`, `"1968"` and dates such as `"1968-10-01"`.
fn parse_year(value: &Value) -> Option<i32> {
    let raw = first_string(value)?;
    let digits: String = raw.chars().take(4).collect();
    if digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

/// Parse an archive runtime string into seconds.
///
/// Accepted forms: `H:MM:SS`, `MM:SS`, `N min` (also `mins`/`minutes`), and
/// bare seconds.
pub fn parse_runtime(raw: &str) -> Option<u32> {
    let s = raw.trim().to_ascii_lowercase();
    if s.is_empty() {
        return None;
    }

    if s.contains(':') {
        let parts: Vec<u32> = s
            .split(':')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .ok()?;
        return match parts.as_slice() {
            [h, m, sec] => h
                .checked_mul(3600)?
                .checked_add(m.checked_mul(60)?)?
                .checked_add(*sec),
            [m, sec] => m.checked_mul(60)?.checked_add(*sec),
            _ => None,
        };
    }

    if let Some(idx) = s.find("min") {
        let minutes: f64 = s[..idx].trim().parse().ok()?;
        return (minutes >= 0.0).then(|| (minutes * 60.0).round() as u32);
    }

    s.trim_end_matches('s').trim().parse::<f64>().ok().and_then(|secs| {
        (secs >= 0.0).then(|| secs.round() as u32)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "https://archive.org";

    #[test]
    fn test_parse_runtime_forms() {
        assert_eq!(parse_runtime("1:36:00"), Some(5760));
        assert_eq!(parse_runtime("96:00"), Some(5760));
        assert_eq!(parse_runtime("96 min"), Some(5760));
        assert_eq!(parse_runtime("96 minutes"), Some(5760));
        assert_eq!(parse_runtime("5760"), Some(5760));
        assert_eq!(parse_runtime(""), None);
        assert_eq!(parse_runtime("about an hour"), None);
        assert_eq!(parse_runtime("1:2:3:4"), None);
    }

    #[test]
    fn test_parse_runtime_rejects_overflow() {
        assert_eq!(parse_runtime("9999999:00:00"), None);
        assert_eq!(parse_runtime("99999999:00"), None);
        assert_eq!(parse_runtime("1193046:28:15"), Some(u32::MAX));
    }

    #[test]
    fn test_search_doc_conversion() {
        let doc: SearchDoc = serde_json::from_value(json!({
            "identifier": "night_of_the_living_dead",
            "title": "Night of the Living Dead",
            "year": "1968",
            "runtime": "1:35:52",
            "language": ["English"],
            "downloads": 2100000,
            "subject": "horror; zombies",
            "collection": ["feature_films", "SciFi_Horror"]
        }))
        .unwrap();

        let item = doc.into_descriptor(BASE);
        assert_eq!(item.source_id, "night_of_the_living_dead");
        assert_eq!(item.year, Some(1968));
        assert_eq!(item.duration_seconds, Some(5752));
        assert_eq!(item.language.as_deref(), Some("English"));
        assert_eq!(item.downloads, 2_100_000);
        assert_eq!(item.subjects, vec!["horror", "zombies"]);
        assert_eq!(item.collections, vec!["feature_films", "SciFi_Horror"]);
        assert_eq!(
            item.thumbnail_url.as_deref(),
            Some("https://archive.org/services/img/night_of_the_living_dead")
        );
        assert!(item.video_url.is_none());
    }

    #[test]
    fn test_search_doc_without_title_uses_identifier() {
        let doc: SearchDoc = serde_json::from_value(json!({ "identifier": "untitled_reel" })).unwrap();
        let item = doc.into_descriptor(BASE);
        assert_eq!(item.title, "untitled_reel");
        assert_eq!(item.downloads, 0);
    }

    #[test]
    fn test_build_page_counts_pages() {
        let body: SearchBody = serde_json::from_value(json!({
            "numFound": 101,
            "docs": [{ "identifier": "a" }, { "identifier": "b" }]
        }))
        .unwrap();

        let page = build_page(BASE, body, 3, 50);
        assert_eq!(page.total, 101);
        assert_eq!(page.pages, 3);
        assert_eq!(page.page, 3);
        assert_eq!(page.items.len(), 2);
        assert!(page.is_last());
    }

    #[test]
    fn test_metadata_prefers_h264_file() {
        let response: MetadataResponse = serde_json::from_value(json!({
            "metadata": {
                "identifier": "his_girl_friday",
                "title": "His Girl Friday",
                "date": "1940-01-18",
                "runtime": "92 min",
                "collection": ["feature_films", "comedy_films"]
            },
            "files": [
                { "name": "his_girl_friday.ogv", "format": "Ogg Video" },
                { "name": "His Girl Friday.mp4", "format": "h.264" },
                { "name": "his_girl_friday.en.srt", "format": "SubRip" }
            ]
        }))
        .unwrap();

        let item = response.into_descriptor(BASE, "his_girl_friday").unwrap();
        assert_eq!(item.title, "His Girl Friday");
        assert_eq!(item.year, Some(1940));
        assert_eq!(item.duration_seconds, Some(5520));
        assert_eq!(
            item.video_url.as_deref(),
            Some("https://archive.org/download/his_girl_friday/His%20Girl%20Friday.mp4")
        );
        assert!(item.has_subtitles);
    }

    #[test]
    fn test_metadata_falls_back_to_other_formats() {
        let response: MetadataResponse = serde_json::from_value(json!({
            "metadata": { "title": "Metropolis" },
            "files": [
                { "name": "metropolis.avi" },
                { "name": "metropolis.webm" },
                { "name": "metropolis_thumb.jpg", "format": "JPEG" }
            ]
        }))
        .unwrap();

        let item = response.into_descriptor(BASE, "metropolis").unwrap();
        assert_eq!(
            item.video_url.as_deref(),
            Some("https://archive.org/download/metropolis/metropolis.webm")
        );
        assert!(!item.has_subtitles);
    }

    #[test]
    fn test_metadata_with_absurd_runtime_has_no_duration() {
        let response: MetadataResponse = serde_json::from_value(json!({
            "metadata": { "title": "Endless", "runtime": "9999999:00:00" },
            "files": [{ "name": "long.mp4", "format": "h.264" }]
        }))
        .unwrap();

        let item = response.into_descriptor(BASE, "endless").unwrap();
        assert_eq!(item.duration_seconds, None);
        assert!(item.video_url.is_some());
    }

    #[test]
    fn test_empty_metadata_is_detected() {
        let response: MetadataResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.is_empty());
    }

    #[test]
    fn test_subtitle_tracks() {
        let response: MetadataResponse = serde_json::from_value(json!({
            "metadata": { "title": "Nosferatu" },
            "files": [
                { "name": "nosferatu.mp4" },
                { "name": "nosferatu.de.vtt" },
                { "name": "nosferatu.srt" }
            ]
        }))
        .unwrap();

        let tracks = response.subtitle_tracks(BASE, "nosferatu");
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].format, "vtt");
        assert_eq!(tracks[0].language.as_deref(), Some("de"));
        assert_eq!(tracks[1].format, "srt");
        assert!(tracks[1].language.is_none());
        assert_eq!(
            tracks[1].url,
            "https://archive.org/download/nosferatu/nosferatu.srt"
        );
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let config = SourceConfig {
            base_url: "http://localhost:9000/".to_string(),
            ..SourceConfig::default()
        };
        let client = ArchiveClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000");
    }
}
