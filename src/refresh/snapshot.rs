use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;

use crate::feed::RawItem;
use crate::storage::StoredSnapshot;
use crate::util::{escape_html, RewriteRules};

/// A feed item as it appears on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Name of the feed the item came from
    pub category: String,
}

impl Article {
    pub fn from_raw(item: RawItem, category: &str) -> Self {
        Self {
            title: item.title,
            description: item.description,
            link: item.link,
            published_at: item.published_at,
            category: category.to_string(),
        }
    }
}

/// Items of one feed, in the order the feed listed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub articles: Vec<Article>,
}

/// One complete rendered page. Never modified after construction.
#[derive(Debug, Clone)]
pub struct Snapshot {
    sections: Vec<Section>,
    headlines: Vec<Article>,
    html: Vec<u8>,
    published_at: DateTime<Utc>,
    digest: String,
}

impl Snapshot {
    /// A page loaded from storage. Only its bytes survive a restart, so the
    /// structured views are empty.
    pub fn restored(stored: StoredSnapshot) -> Self {
        Self {
            sections: Vec::new(),
            headlines: Vec::new(),
            html: stored.html,
            published_at: stored.published_at,
            digest: stored.digest,
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn headlines(&self) -> &[Article] {
        &self.headlines
    }

    pub fn html(&self) -> &[u8] {
        &self.html
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn to_stored(&self) -> StoredSnapshot {
        StoredSnapshot {
            html: self.html.clone(),
            published_at: self.published_at,
            digest: self.digest.clone(),
        }
    }
}

/// Most recent first, then feed name ascending.
pub fn headline_order(a: &Article, b: &Article) -> Ordering {
    b.published_at
        .cmp(&a.published_at)
        .then_with(|| a.category.cmp(&b.category))
}

/// Merges one cycle's per-feed results into a [`Snapshot`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    rewrites: RewriteRules,
}

impl SnapshotBuilder {
    pub fn new(rewrites: RewriteRules) -> Self {
        Self { rewrites }
    }

    /// Returns `None` when no feed contributed an item, so the caller keeps
    /// serving the previous page.
    pub fn build(
        &self,
        sections: Vec<Section>,
        headlines: Vec<Article>,
        now: DateTime<Utc>,
    ) -> Option<Snapshot> {
        let mut sections: Vec<Section> = sections
            .into_iter()
            .filter(|s| !s.articles.is_empty())
            .map(|mut s| {
                for article in &mut s.articles {
                    self.sanitize(article);
                }
                s
            })
            .collect();

        if sections.is_empty() {
            return None;
        }
        sections.sort_by(|a, b| a.name.cmp(&b.name));

        let mut headlines = headlines;
        for article in &mut headlines {
            self.sanitize(article);
        }
        headlines.sort_by(headline_order);

        let html = render_page(&sections, &headlines).into_bytes();
        let digest = format!("{:x}", Sha256::digest(&html));

        Some(Snapshot {
            sections,
            headlines,
            html,
            published_at: now,
            digest,
        })
    }

    fn sanitize(&self, article: &mut Article) {
        if !self.rewrites.is_empty() {
            article.description = self.rewrites.apply(&article.description);
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn render_page(sections: &[Section], headlines: &[Article]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <meta name=\"description\" content=\"Read the news\">\n<title>News</title>\n</head>\n<body>\n",
    );

    html.push_str("<nav id=\"head\">");
    html.push_str("<a href=\"#headlines\" class=\"head\">Headlines</a>");
    for section in sections {
        let name = escape_html(&section.name);
        html.push_str(&format!("<a href=\"#{name}\" class=\"head\">{name}</a>"));
    }
    html.push_str("</nav>\n<main>\n");

    html.push_str("<div class=\"section\"><hr id=\"headlines\" class=\"anchor\"><h1>Headlines</h1>\n");
    for article in headlines {
        let category = escape_html(&article.category);
        html.push_str(&format!(
            "<div class=\"headline\"><a href=\"#{category}\" class=\"category\">{category}</a>{}</div>\n",
            render_item(article)
        ));
    }
    html.push_str("</div>\n");

    for section in sections {
        let name = escape_html(&section.name);
        html.push_str(&format!(
            "<div class=\"section\"><hr id=\"{name}\" class=\"anchor\"><h1>{name}</h1>\n"
        ));
        for article in &section.articles {
            html.push_str(&render_item(article));
            html.push('\n');
        }
        html.push_str("</div>\n");
    }

    html.push_str("</main>\n</body>\n</html>\n");
    html
}

// Descriptions are feed-supplied HTML and are emitted as-is after rewriting.
fn render_item(article: &Article) -> String {
    format!(
        "<h3><a href=\"{}\" rel=\"noopener noreferrer\" target=\"_blank\">{}</a></h3><span class=\"description\">{}</span>",
        escape_html(&article.link),
        escape_html(&article.title),
        article.description
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Rewrite;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
    }

    fn article(feed: &str, title: &str, minute: u32) -> Article {
        Article {
            title: title.to_string(),
            description: format!("About {title}"),
            link: format!("https://example.com/{feed}/{title}"),
            published_at: Some(at(minute)),
            category: feed.to_string(),
        }
    }

    fn section(feed: &str, titles: &[&str]) -> Section {
        Section {
            name: feed.to_string(),
            articles: titles.iter().map(|t| article(feed, t, 0)).collect(),
        }
    }

    fn titles(articles: &[Article]) -> Vec<&str> {
        articles.iter().map(|a| a.title.as_str()).collect()
    }

    #[test]
    fn test_headlines_most_recent_first() {
        let builder = SnapshotBuilder::default();
        let snapshot = builder
            .build(
                vec![section("a", &["x"])],
                vec![
                    article("b", "middle", 20),
                    article("c", "oldest", 10),
                    article("a", "newest", 30),
                ],
                at(59),
            )
            .unwrap();

        assert_eq!(titles(snapshot.headlines()), vec!["newest", "middle", "oldest"]);
    }

    #[test]
    fn test_headline_ties_break_by_feed_name() {
        let builder = SnapshotBuilder::default();
        let snapshot = builder
            .build(
                vec![section("a", &["x"])],
                vec![
                    article("zeta", "z", 15),
                    article("alpha", "a", 15),
                    article("mid", "m", 15),
                ],
                at(59),
            )
            .unwrap();

        let feeds: Vec<&str> = snapshot
            .headlines()
            .iter()
            .map(|a| a.category.as_str())
            .collect();
        assert_eq!(feeds, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_undated_headlines_sort_last() {
        let mut undated = article("a", "undated", 0);
        undated.published_at = None;
        let snapshot = SnapshotBuilder::default()
            .build(
                vec![section("a", &["x"])],
                vec![undated, article("b", "dated", 1)],
                at(59),
            )
            .unwrap();
        assert_eq!(titles(snapshot.headlines()), vec!["dated", "undated"]);
    }

    #[test]
    fn test_sections_sorted_by_name() {
        let snapshot = SnapshotBuilder::default()
            .build(
                vec![section("World", &["w"]), section("Arts", &["a"]), section("Money", &["m"])],
                Vec::new(),
                at(0),
            )
            .unwrap();

        let names: Vec<&str> = snapshot.sections().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Arts", "Money", "World"]);

        let html = String::from_utf8(snapshot.html().to_vec()).unwrap();
        let arts = html.find("<h1>Arts</h1>").unwrap();
        let money = html.find("<h1>Money</h1>").unwrap();
        let world = html.find("<h1>World</h1>").unwrap();
        assert!(arts < money && money < world);
        assert!(html.find("<h1>Headlines</h1>").unwrap() < arts);
    }

    #[test]
    fn test_no_items_builds_nothing() {
        let builder = SnapshotBuilder::default();
        assert!(builder.build(Vec::new(), Vec::new(), at(0)).is_none());
        assert!(builder
            .build(vec![section("empty", &[])], Vec::new(), at(0))
            .is_none());
    }

    #[test]
    fn test_empty_section_is_omitted() {
        let snapshot = SnapshotBuilder::default()
            .build(vec![section("empty", &[]), section("full", &["x"])], Vec::new(), at(0))
            .unwrap();
        assert_eq!(snapshot.sections().len(), 1);
        let html = String::from_utf8(snapshot.html().to_vec()).unwrap();
        assert!(!html.contains("<h1>empty</h1>"));
    }

    #[test]
    fn test_rewrites_applied_to_sections_and_headlines() {
        let builder = SnapshotBuilder::new(RewriteRules::new(vec![Rewrite::Phrase(
            " All rights reserved.".to_string(),
        )]));
        let mut item = article("a", "t", 5);
        item.description = "Body. All rights reserved.".to_string();

        let snapshot = builder
            .build(
                vec![Section {
                    name: "a".into(),
                    articles: vec![item.clone()],
                }],
                vec![item],
                at(6),
            )
            .unwrap();

        assert_eq!(snapshot.sections()[0].articles[0].description, "Body.");
        assert_eq!(snapshot.headlines()[0].description, "Body.");
        let html = String::from_utf8(snapshot.html().to_vec()).unwrap();
        assert!(!html.contains("All rights reserved"));
    }

    #[test]
    fn test_titles_escaped_descriptions_kept() {
        let mut item = article("a&b", "<script>", 1);
        item.description = "<em>kept</em>".to_string();
        let snapshot = SnapshotBuilder::default()
            .build(
                vec![Section {
                    name: "a&b".into(),
                    articles: vec![item],
                }],
                Vec::new(),
                at(2),
            )
            .unwrap();

        let html = String::from_utf8(snapshot.html().to_vec()).unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("<em>kept</em>"));
        assert!(html.contains("<h1>a&amp;b</h1>"));
    }

    #[test]
    fn test_identical_input_identical_digest() {
        let builder = SnapshotBuilder::default();
        let first = builder
            .build(vec![section("a", &["x", "y"])], vec![article("a", "x", 0)], at(1))
            .unwrap();
        let second = builder
            .build(vec![section("a", &["x", "y"])], vec![article("a", "x", 0)], at(9))
            .unwrap();
        assert_eq!(first.html(), second.html());
        assert_eq!(first.digest(), second.digest());
        assert_eq!(first.digest().len(), 64);
    }

    #[test]
    fn test_restored_round_trip() {
        let built = SnapshotBuilder::default()
            .build(vec![section("a", &["x"])], Vec::new(), at(3))
            .unwrap();
        let restored = Snapshot::restored(built.to_stored());
        assert_eq!(restored.html(), built.html());
        assert_eq!(restored.published_at(), at(3));
        assert_eq!(restored.digest(), built.digest());
        assert!(restored.sections().is_empty());
    }
}
