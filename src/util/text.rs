use regex::Regex;
use std::borrow::Cow;

/// A pure string transform applied to item descriptions.
#[derive(Debug, Clone)]
pub enum Rewrite {
    /// Remove every occurrence of a literal phrase.
    Phrase(String),
    /// Remove every match of a pattern.
    Pattern(Regex),
}

impl Rewrite {
    pub fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        match self {
            Rewrite::Phrase(phrase) if !phrase.is_empty() && input.contains(phrase.as_str()) => {
                Cow::Owned(input.replace(phrase.as_str(), ""))
            }
            Rewrite::Phrase(_) => Cow::Borrowed(input),
            Rewrite::Pattern(re) => re.replace_all(input, ""),
        }
    }
}

/// Ordered list of [`Rewrite`]s; each rule sees the output of the previous one.
#[derive(Debug, Clone, Default)]
pub struct RewriteRules {
    rules: Vec<Rewrite>,
}

impl RewriteRules {
    pub fn new(rules: Vec<Rewrite>) -> Self {
        Self { rules }
    }

    /// Phrases are removed first, then patterns, each in the given order.
    pub fn from_config(phrases: &[String], patterns: &[String]) -> Result<Self, regex::Error> {
        let mut rules: Vec<Rewrite> = phrases.iter().cloned().map(Rewrite::Phrase).collect();
        for pattern in patterns {
            rules.push(Rewrite::Pattern(Regex::new(pattern)?));
        }
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn apply(&self, input: &str) -> String {
        let mut out = input.to_string();
        for rule in &self.rules {
            if let Cow::Owned(rewritten) = rule.apply(&out) {
                out = rewritten;
            }
        }
        out
    }
}

/// Escapes text for use in HTML element content and quoted attributes.
pub fn escape_html(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}
