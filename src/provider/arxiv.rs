//! arXiv provider implementation.
//!
//! Queries the public arXiv export API and parses its Atom feed.

use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::{PaperProvider, ProviderError, ProviderResult};
use crate::models::PaperRecord;

/// Default arXiv export API endpoint.
pub const DEFAULT_ARXIV_ENDPOINT: &str = "https://export.arxiv.org/api/query";

/// arXiv search provider.
#[derive(Debug, Clone)]
pub struct ArxivProvider {
    http: Client,
    endpoint: String,
}

impl ArxivProvider {
    /// Create a provider against the public arXiv API.
    ///
    /// # Errors
    /// Returns `ProviderError::ConfigError` if the HTTP client cannot be built
    pub fn new() -> ProviderResult<Self> {
        Self::with_endpoint(DEFAULT_ARXIV_ENDPOINT)
    }

    /// Create a provider against a custom endpoint (mirrors, test servers).
    pub fn with_endpoint(endpoint: &str) -> ProviderResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("mcp-paper-chat/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::ConfigError(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
        })
    }

    /// Build the `search_query` parameter: every term must match.
    fn build_query(topic: &str) -> String {
        let terms: Vec<String> = topic
            .split_whitespace()
            .map(|t| format!("all:{}", t))
            .collect();
        if terms.is_empty() {
            "all:*".to_string()
        } else {
            terms.join(" AND ")
        }
    }
}

#[async_trait]
impl PaperProvider for ArxivProvider {
    async fn search(&self, topic: &str, max_results: usize) -> ProviderResult<Vec<PaperRecord>> {
        let search_query = Self::build_query(topic);
        debug!("arXiv query: {} (max_results={})", search_query, max_results);

        let resp = self
            .http
            .get(&self.endpoint)
            .query(&[("search_query", search_query.as_str())])
            .query(&[("start", 0), ("max_results", max_results)])
            .query(&[("sortBy", "relevance"), ("sortOrder", "descending")])
            .header(ACCEPT, "application/atom+xml, application/xml;q=0.9")
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(ProviderError::RateLimitExceeded(format!("arXiv answered {}", status)));
        }
        if !status.is_success() {
            return Err(ProviderError::HttpError(format!("arXiv answered {}", status)));
        }

        let ctype = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !(ctype.contains("xml") || ctype.contains("atom")) {
            return Err(ProviderError::ParseError(format!(
                "unexpected content-type: {}",
                ctype
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;
        let mut papers = parse_atom_feed(&body)?;
        papers.truncate(max_results);
        Ok(papers)
    }

    fn name(&self) -> &str {
        "arxiv"
    }
}

/// Fields of an Atom entry whose text content we collect.
#[derive(Clone, Copy)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    AuthorName,
}

#[derive(Default)]
struct EntryBuilder {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
    pdf_url: Option<String>,
}

impl EntryBuilder {
    fn push_text(&mut self, field: Field, text: &str) {
        match field {
            Field::Id => self.id.push_str(text),
            Field::Title => self.title.push_str(text),
            Field::Summary => self.summary.push_str(text),
            Field::Published => self.published.push_str(text),
            Field::AuthorName => {
                if let Some(last) = self.authors.last_mut() {
                    last.push_str(text);
                }
            }
        }
    }

    fn take_link(&mut self, e: &BytesStart<'_>) {
        let mut href = None;
        let mut is_pdf = false;
        for attr in e.attributes().flatten() {
            let value = String::from_utf8_lossy(&attr.value).to_string();
            match attr.key.as_ref() {
                b"href" => href = Some(value),
                b"title" => is_pdf |= value.eq_ignore_ascii_case("pdf"),
                b"type" => is_pdf |= value.contains("pdf"),
                _ => {}
            }
        }
        if is_pdf && self.pdf_url.is_none() {
            self.pdf_url = href;
        }
    }

    fn build(self) -> PaperRecord {
        let id = short_id(&self.id);
        let pdf_url = self
            .pdf_url
            .unwrap_or_else(|| format!("https://arxiv.org/pdf/{}", id));
        PaperRecord {
            id,
            title: collapse_whitespace(&self.title),
            authors: self.authors.iter().map(|a| a.trim().to_string()).collect(),
            summary: self.summary.trim().to_string(),
            pdf_url,
            published: self.published.trim().chars().take(10).collect(),
        }
    }
}

/// Short arXiv id from an entry id URL, e.g.
/// `http://arxiv.org/abs/2501.01234v1` -> `2501.01234v1`.
fn short_id(entry_id: &str) -> String {
    let entry_id = entry_id.trim();
    match entry_id.split_once("/abs/") {
        Some((_, short)) => short.to_string(),
        None => entry_id.to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn local_name(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|b| *b == b':') {
        Some(ix) => &raw[ix + 1..],
        None => raw,
    }
}

/// Parse an arXiv Atom feed into paper records, in feed order.
pub fn parse_atom_feed(xml: &str) -> ProviderResult<Vec<PaperRecord>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut papers = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut field: Option<Field> = None;
    let mut in_author = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                match (local_name(name.as_ref()), entry.as_mut()) {
                    (b"entry", _) => entry = Some(EntryBuilder::default()),
                    (b"id", Some(_)) => field = Some(Field::Id),
                    (b"title", Some(_)) => field = Some(Field::Title),
                    (b"summary", Some(_)) => field = Some(Field::Summary),
                    (b"published", Some(_)) => field = Some(Field::Published),
                    (b"author", Some(_)) => in_author = true,
                    (b"name", Some(current)) if in_author => {
                        current.authors.push(String::new());
                        field = Some(Field::AuthorName);
                    }
                    (b"link", Some(current)) => current.take_link(&e),
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(current) = entry.as_mut() {
                    if local_name(e.name().as_ref()) == b"link" {
                        current.take_link(&e);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(current), Some(f)) = (entry.as_mut(), field) {
                    let text = t
                        .unescape()
                        .map_err(|e| ProviderError::ParseError(e.to_string()))?;
                    current.push_text(f, &text);
                }
            }
            Ok(Event::CData(t)) => {
                if let (Some(current), Some(f)) = (entry.as_mut(), field) {
                    current.push_text(f, &String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"entry" => {
                    if let Some(done) = entry.take() {
                        papers.push(done.build());
                    }
                    field = None;
                    in_author = false;
                }
                b"author" => in_author = false,
                _ => field = None,
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ProviderError::ParseError(format!("XML parse error: {}", e))),
            _ => {}
        }
    }

    Ok(papers)
}
