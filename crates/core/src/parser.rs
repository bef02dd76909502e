//! Heuristic fallback query parser.
//!
//! When the parser collaborator fails, the engine falls back to simple
//! keyword matching and a pair-pattern scan rather than aborting the run.
//! Only an empty query defeats the fallback, which is the one path into a
//! fatal parse failure.

use async_trait::async_trait;
use fx_protocol::QueryContext;
use regex::Regex;
use std::sync::OnceLock;

use crate::collaborators::base::{QueryParser, TaskError};

/// Keyword-to-pair mappings for common assets.
const KEYWORD_PAIRS: &[(&str, &str)] = &[
    ("gold", "XAU/USD"),
    ("silver", "XAG/USD"),
    ("oil", "CL/USD"),
    ("bitcoin", "BTC/USD"),
    ("btc", "BTC/USD"),
    ("ethereum", "ETH/USD"),
    ("eth", "ETH/USD"),
    ("euro", "EUR/USD"),
    ("pound", "GBP/USD"),
    ("yen", "USD/JPY"),
];

fn pair_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Matches "EUR/USD", "EUR USD", and "EURUSD".
        #[allow(clippy::unwrap_used)]
        Regex::new(r"([A-Z]{3})[/\s]?([A-Z]{3})").unwrap()
    })
}

/// Build a minimal context from the raw query without any collaborator.
///
/// Resolution order: keyword mapping, then explicit pair pattern, then the
/// EUR/USD default. Returns `None` only for an effectively empty query.
pub fn fallback_parse(query: &str) -> Option<QueryContext> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lowered = trimmed.to_lowercase();
    for (keyword, pair) in KEYWORD_PAIRS {
        if lowered.contains(keyword) {
            return Some(QueryContext::for_pair(*pair));
        }
    }

    let upper = trimmed.to_uppercase();
    if let Some(captures) = pair_pattern().captures(&upper) {
        let pair = format!("{}/{}", &captures[1], &captures[2]);
        return Some(QueryContext::for_pair(pair));
    }

    Some(QueryContext::for_pair("EUR/USD"))
}

/// Parser collaborator backed solely by the heuristic, for offline use.
pub struct HeuristicParser;

#[async_trait]
impl QueryParser for HeuristicParser {
    async fn parse(&self, query: &str) -> Result<QueryContext, TaskError> {
        fallback_parse(query)
            .ok_or_else(|| TaskError::InvalidInput("query is empty".to_string()))
    }
}
