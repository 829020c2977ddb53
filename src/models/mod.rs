//! Core data models for the paper chat system.
//!
//! This module contains the paper metadata record shared by the search
//! provider, the metadata store and the research tools, plus the topic
//! normalization that turns a free-text search topic into a partition key.

use serde::{Deserialize, Serialize};

/// Metadata for a single research paper, as discovered by a topic search.
///
/// Records are keyed by `id` inside a topic partition and serialized verbatim
/// into the partition file, so field order here is the order readers see.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaperRecord {
    /// Canonical short identifier (e.g. arXiv `2501.01234`)
    #[serde(default)]
    pub id: String,

    /// Paper title
    pub title: String,

    /// Author names, in the order the index lists them
    pub authors: Vec<String>,

    /// Abstract text
    pub summary: String,

    /// Link to the PDF
    pub pdf_url: String,

    /// Publication date as `YYYY-MM-DD`
    pub published: String,
}

/// Summary of one topic partition, used for listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicSummary {
    /// Normalized topic name (also the partition directory name)
    pub topic: String,

    /// Number of records in the partition
    pub paper_count: usize,
}

/// Partition key used when a topic normalizes to nothing usable.
pub const FALLBACK_TOPIC: &str = "untitled";

/// Normalize a free-text topic into a partition key.
///
/// Lower-cases the topic and replaces spaces with underscores. Leading and
/// trailing whitespace is trimmed first so `" Quantum "` and `"quantum"`
/// share a partition. Path separators and control characters also become
/// underscores, and keys that would be empty, `.` or `..` fall back to
/// [`FALLBACK_TOPIC`], so the key is always a single directory name.
///
/// # Example
/// ```
/// use mcp_paper_chat::models::normalize_topic;
/// assert_eq!(normalize_topic("Large Language Models"), "large_language_models");
/// assert_eq!(normalize_topic("TCP/IP"), "tcp_ip");
/// ```
pub fn normalize_topic(topic: &str) -> String {
    let key: String = topic
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match key.as_str() {
        "" | "." | ".." => FALLBACK_TOPIC.to_string(),
        _ => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_topic() {
        assert_eq!(normalize_topic("Quantum Computing"), "quantum_computing");
        assert_eq!(normalize_topic("  physics  "), "physics");
        assert_eq!(normalize_topic("a  b"), "a__b");
        assert_eq!(normalize_topic("already_normal"), "already_normal");
    }

    #[test]
    fn test_normalize_topic_is_path_safe() {
        assert_eq!(normalize_topic("TCP/IP congestion control"), "tcp_ip_congestion_control");
        assert_eq!(normalize_topic("I/O Scheduling"), "i_o_scheduling");
        assert_eq!(normalize_topic(r"C:\temp"), "c:_temp");
        assert_eq!(normalize_topic("../etc"), ".._etc");
        assert_eq!(normalize_topic("tab\there"), "tab_here");
        assert_eq!(normalize_topic("   "), FALLBACK_TOPIC);
        assert_eq!(normalize_topic(".."), FALLBACK_TOPIC);
        assert_eq!(normalize_topic(" . "), FALLBACK_TOPIC);
    }

    #[test]
    fn test_record_field_order_in_json() {
        let record = PaperRecord {
            id: "1".to_string(),
            title: "T".to_string(),
            authors: vec!["A".to_string()],
            summary: "S".to_string(),
            pdf_url: "http://x/1.pdf".to_string(),
            published: "2024-01-02".to_string(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"id":"1","title":"T","authors":["A"],"summary":"S","pdf_url":"http://x/1.pdf","published":"2024-01-02"}"#
        );
    }
}
