use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;
use tracing::warn;

/// One raw feed entry, reduced to the fields ingestion cares about.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetches and parses the feed at `url` into entries, in feed order.
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<FeedEntry>>;
}

pub struct HttpFeedFetcher {
    client: Client,
}

impl HttpFeedFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("ContrastNews/1.0 (RSS Aggregator)")
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }
}

impl Default for HttpFeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<FeedEntry>> {
        let response = self.client.get(url).send().await?;
        let bytes = response.bytes().await?;
        parse_entries(&bytes)
    }
}

/// Parses raw feed XML into entries. Entries missing a title or link are
/// skipped; a publish date that fails to parse simply comes back absent
/// (feed-rs drops malformed dates rather than erroring).
pub fn parse_entries(bytes: &[u8]) -> anyhow::Result<Vec<FeedEntry>> {
    let parsed = parser::parse(bytes)?;

    let mut entries = Vec::with_capacity(parsed.entries.len());
    for entry in parsed.entries {
        let Some(title) = entry.title.as_ref().map(|t| t.content.clone()) else {
            warn!("Skipping entry with no title: {}", entry.id);
            continue;
        };

        let link = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default();
        if link.is_empty() {
            warn!("Skipping entry with no link: {}", title);
            continue;
        }

        let description = entry.summary.map(|s| s.content);
        let published: Option<DateTime<Utc>> = entry.published.or(entry.updated).map(|dt| dt.into());

        entries.push(FeedEntry {
            title,
            link,
            description,
            published,
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rss(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <rss version="2.0">
                <channel>
                    <title>Test Channel</title>
                    <link>https://news.example.com</link>
                    {items}
                </channel>
            </rss>"#
        )
    }

    mod parse_entries_tests {
        use super::*;

        #[test]
        fn test_parse_full_entry() {
            let xml = rss(r#"
                <item>
                    <title>Breaking: Budget Approved</title>
                    <link>https://news.example.com/budget</link>
                    <description>The chamber approved the budget.</description>
                    <pubDate>Mon, 09 Dec 2024 12:00:00 GMT</pubDate>
                </item>
            "#);

            let entries = parse_entries(xml.as_bytes()).unwrap();

            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].title, "Breaking: Budget Approved");
            assert_eq!(entries[0].link, "https://news.example.com/budget");
            assert_eq!(
                entries[0].description.as_deref(),
                Some("The chamber approved the budget.")
            );
            let published = entries[0].published.unwrap();
            assert_eq!(published.to_rfc3339(), "2024-12-09T12:00:00+00:00");
        }

        #[test]
        fn test_malformed_pub_date_becomes_absent() {
            let xml = rss(r#"
                <item>
                    <title>Undated story</title>
                    <link>https://news.example.com/undated</link>
                    <pubDate>not a date at all</pubDate>
                </item>
            "#);

            let entries = parse_entries(xml.as_bytes()).unwrap();

            assert_eq!(entries.len(), 1);
            assert!(entries[0].published.is_none());
        }

        #[test]
        fn test_missing_description_is_absent() {
            let xml = rss(r#"
                <item>
                    <title>Bare story</title>
                    <link>https://news.example.com/bare</link>
                </item>
            "#);

            let entries = parse_entries(xml.as_bytes()).unwrap();
            assert!(entries[0].description.is_none());
        }

        #[test]
        fn test_entry_without_link_skipped() {
            let xml = rss(r#"
                <item>
                    <title>Linkless story</title>
                </item>
                <item>
                    <title>Proper story</title>
                    <link>https://news.example.com/proper</link>
                </item>
            "#);

            let entries = parse_entries(xml.as_bytes()).unwrap();

            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].title, "Proper story");
        }

        #[test]
        fn test_entries_keep_feed_order() {
            let xml = rss(r#"
                <item>
                    <title>First</title>
                    <link>https://news.example.com/1</link>
                </item>
                <item>
                    <title>Second</title>
                    <link>https://news.example.com/2</link>
                </item>
                <item>
                    <title>Third</title>
                    <link>https://news.example.com/3</link>
                </item>
            "#);

            let entries = parse_entries(xml.as_bytes()).unwrap();

            let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
            assert_eq!(titles, vec!["First", "Second", "Third"]);
        }

        #[test]
        fn test_invalid_xml_is_error() {
            assert!(parse_entries(b"this is not a feed").is_err());
        }
    }

    mod http_fetcher_tests {
        use super::*;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        #[tokio::test]
        async fn test_fetch_parses_served_feed() {
            let server = MockServer::start().await;
            let body = rss(r#"
                <item>
                    <title>Served story</title>
                    <link>https://news.example.com/served</link>
                </item>
            "#);
            Mock::given(method("GET"))
                .and(path("/rss"))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(&server)
                .await;

            let fetcher = HttpFeedFetcher::new();
            let entries = fetcher.fetch(&format!("{}/rss", server.uri())).await.unwrap();

            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].title, "Served story");
        }

        #[tokio::test]
        async fn test_fetch_unreachable_host_is_error() {
            let fetcher = HttpFeedFetcher::new();
            // nothing listens on the discard port
            let result = fetcher.fetch("http://127.0.0.1:9/rss").await;
            assert!(result.is_err());
        }
    }
}
