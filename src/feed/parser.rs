use chrono::{DateTime, Utc};
use feed_rs::parser;

/// One entry of a fetched feed, before any rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published_at: Option<DateTime<Utc>>,
}

pub fn parse_feed(bytes: &[u8]) -> Result<Vec<RawItem>, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            let published_at = entry.published.or(entry.updated);
            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());

            RawItem {
                title,
                link,
                description,
                published_at,
            }
        })
        .collect();

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_rss_items() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>T</title>
  <item>
    <title>First</title>
    <link>https://example.com/1</link>
    <description>One</description>
    <pubDate>Fri, 01 Mar 2024 12:00:00 GMT</pubDate>
  </item>
  <item><title>Second</title><link>https://example.com/2</link></item>
</channel></rss>"#;

        let items = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "First");
        assert_eq!(items[0].link, "https://example.com/1");
        assert_eq!(items[0].description, "One");
        assert_eq!(
            items[0].published_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(items[1].description, "");
        assert!(items[1].published_at.is_none());
    }

    #[test]
    fn test_parse_atom_uses_updated_when_unpublished() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom</title>
  <id>urn:feed</id>
  <updated>2024-03-02T08:30:00Z</updated>
  <entry>
    <title>Entry</title>
    <id>urn:entry:1</id>
    <link href="https://example.com/entry"/>
    <updated>2024-03-02T08:30:00Z</updated>
    <summary>Short</summary>
  </entry>
</feed>"#;

        let items = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://example.com/entry");
        assert_eq!(items[0].description, "Short");
        assert_eq!(
            items[0].published_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 2, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_untitled_entry() {
        let rss = r#"<rss version="2.0"><channel><item><link>https://example.com/x</link></item></channel></rss>"#;
        let items = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(items[0].title, "Untitled");
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(parse_feed(b"<not valid xml").is_err());
    }
}
