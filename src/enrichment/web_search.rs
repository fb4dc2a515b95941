//! Web Search CPU Lookup
//!
//! Guesses the category of an unknown CPU by fetching a search results page
//! and counting category keywords in its text. There are no retries; a
//! failed or timed-out request is reported to the caller, which treats it as
//! "no opinion".

use crate::config::EnrichmentConfig;
use crate::domain::ports::{CategoryGuess, CategoryLabel, CpuLookup};
use crate::error::{Error, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::debug;

static MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<script.*?</script>|<style.*?</style>|<[^>]+>").expect("markup regex"));

/// Appended to the CPU in every query; results pages echo it back
const QUERY_SUFFIX: &str = "processor type server or desktop or mobile";

/// Keyword groups, in tie-break order
const KEYWORD_GROUPS: [(CategoryLabel, &[&str]); 4] = [
    (
        CategoryLabel::ServerPhysical,
        &["server", "datacenter", "enterprise", "rack", "xeon"],
    ),
    (
        CategoryLabel::Desktop,
        &["desktop", "consumer", "gaming", "workstation"],
    ),
    (
        CategoryLabel::CellPhoneOther,
        &["mobile", "phone", "smartphone", "tablet", "low power"],
    ),
    (
        CategoryLabel::ServerVM,
        &["virtual", "hypervisor", "vm", "cloud"],
    ),
];

/// One whole-word matcher per keyword group, plural forms included
static KEYWORD_MATCHERS: Lazy<Vec<(CategoryLabel, Regex)>> = Lazy::new(|| {
    KEYWORD_GROUPS
        .iter()
        .map(|(label, keywords)| {
            let alternatives: Vec<String> = keywords.iter().map(|k| regex::escape(k)).collect();
            let pattern = format!(r"\b(?:{})s?\b", alternatives.join("|"));
            (*label, Regex::new(&pattern).expect("keyword regex"))
        })
        .collect()
});

/// Score a page of text against the keyword groups.
///
/// Keywords count as whole words, and echoes of the query text are ignored.
/// The group with the most occurrences wins, with
/// `confidence = winner / total`. A page without any keyword yields
/// no opinion.
pub fn score_search_text(text: &str) -> CategoryGuess {
    let plain = MARKUP.replace_all(text, " ").to_lowercase();
    let plain = plain.replace(QUERY_SUFFIX, " ");

    let counts: Vec<(CategoryLabel, usize)> = KEYWORD_MATCHERS
        .iter()
        .map(|(label, matcher)| (*label, matcher.find_iter(&plain).count()))
        .collect();

    let total: usize = counts.iter().map(|(_, c)| c).sum();
    if total == 0 {
        return CategoryGuess::none();
    }

    let (label, best) = counts
        .iter()
        .fold(counts[0], |acc, &(label, count)| if count > acc.1 { (label, count) } else { acc });

    CategoryGuess::new(label, best as f64 / total as f64)
}

/// CPU lookup backed by an HTML search endpoint
pub struct WebSearchLookup {
    client: reqwest::Client,
    search_url: String,
}

impl WebSearchLookup {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            search_url: config.search_url.clone(),
        })
    }

    /// Full request URL for a CPU
    pub fn query_url(&self, cpu: &str) -> String {
        let query = format!("{} {}", cpu.trim(), QUERY_SUFFIX);
        format!("{}?q={}", self.search_url, urlencoding::encode(&query))
    }
}

#[async_trait]
impl CpuLookup for WebSearchLookup {
    async fn lookup_unknown_cpu(&self, cpu: &str) -> Result<CategoryGuess> {
        let url = self.query_url(cpu);
        debug!("CPU lookup: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::EnrichmentFailed {
                cpu: cpu.to_string(),
                reason: format!("search returned HTTP {}", status),
            });
        }

        let body = response.text().await?;
        Ok(score_search_text(&body))
    }

    fn lookup_name(&self) -> &str {
        "web-search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_server_page() {
        let page = "<html><body><h1>Xeon Gold</h1><p>Enterprise server processor for the datacenter. \
                    Also runs a desktop.</p></body></html>";
        let guess = score_search_text(page);
        assert_eq!(guess.category, CategoryLabel::ServerPhysical);
        assert!((guess.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_markup_is_ignored() {
        let page = r#"<div class="server rack xeon"><script>var server = 1;</script>gaming desktop</div>"#;
        let guess = score_search_text(page);
        assert_eq!(guess.category, CategoryLabel::Desktop);
        assert_eq!(guess.confidence, 1.0);
    }

    #[test]
    fn test_keywords_count_as_whole_words() {
        // "smartphone" is one mobile hit, not also a "phone" hit
        let guess = score_search_text("A smartphone and tablet chip. Not for servers.");
        assert_eq!(guess.category, CategoryLabel::CellPhoneOther);
        assert!((guess.confidence - 2.0 / 3.0).abs() < 1e-9);

        // No keyword inside "vmware" or "serverless"
        assert_eq!(score_search_text("vmware serverless"), CategoryGuess::none());
    }

    #[test]
    fn test_query_echo_is_ignored() {
        let page = "<title>VIA Nano processor type server or desktop or mobile - Search</title>\
                    <p>VIA Nano: low power mobile x86 processor</p>";
        let guess = score_search_text(page);
        assert_eq!(guess.category, CategoryLabel::CellPhoneOther);
        assert_eq!(guess.confidence, 1.0);
    }

    #[test]
    fn test_empty_page_has_no_opinion() {
        let guess = score_search_text("<p>nothing relevant</p>");
        assert_eq!(guess, CategoryGuess::none());
    }

    #[test]
    fn test_tie_prefers_earlier_group() {
        let guess = score_search_text("server desktop");
        assert_eq!(guess.category, CategoryLabel::ServerPhysical);
        assert_eq!(guess.confidence, 0.5);
    }

    #[test]
    fn test_query_url_is_encoded() {
        let lookup = WebSearchLookup::new(&EnrichmentConfig {
            search_url: "https://search.example/search".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            lookup.query_url(" VIA Nano U2250 "),
            "https://search.example/search?q=VIA%20Nano%20U2250%20processor%20type%20server%20or%20desktop%20or%20mobile"
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_error() {
        let lookup = WebSearchLookup::new(&EnrichmentConfig {
            search_url: "http://127.0.0.1:9/search".into(),
            timeout_secs: 1,
            ..Default::default()
        })
        .unwrap();
        let err = lookup.lookup_unknown_cpu("VIA Nano").await.unwrap_err();
        assert!(err.is_collaborator_failure());
    }
}
