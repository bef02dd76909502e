//! Trading-domain payload models.
//!
//! These structures carry the parsed query context and the downstream-stage
//! results (risk verdict, final decision, report). The engine treats most of
//! their content as opaque; only `pair` and `approved` drive control flow.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Normalized context produced by the query parser.
///
/// Mirrors the structured output of the parser collaborator, e.g.
/// "Analyze gold trading" becomes pair `XAU/USD`, asset type `commodity`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct QueryContext {
    /// Normalized instrument pair, e.g. "EUR/USD" or "XAU/USD".
    pub pair: String,

    /// Asset classification: "forex", "commodity", "crypto", "index",
    /// or "unknown" when only the fallback parser ran.
    pub asset_type: String,

    pub base_currency: String,
    pub quote_currency: String,

    /// Inferred horizon: "short_term", "medium_term", "long_term".
    pub timeframe: String,

    /// What the user asked for: "trading_signal", "buy_signal", etc.
    pub user_intent: String,

    /// "conservative", "moderate", or "aggressive".
    pub risk_tolerance: String,

    /// Parser confidence in the normalization, 0.0 to 1.0.
    pub confidence: f64,

    /// Anything else the parser extracted (keywords, price levels, ...).
    #[serde(default)]
    #[ts(type = "Record<string, any>")]
    pub extra: serde_json::Map<String, Value>,
}

impl QueryContext {
    /// Build a minimal context for a pair, used by the fallback parser.
    pub fn for_pair(pair: impl Into<String>) -> Self {
        let pair = pair.into();
        let (base, quote) = match pair.split_once('/') {
            Some((b, q)) => (b.to_string(), q.to_string()),
            None => (pair.clone(), String::new()),
        };
        Self {
            pair,
            asset_type: "unknown".to_string(),
            base_currency: base,
            quote_currency: quote,
            timeframe: "short_term".to_string(),
            user_intent: "trading_signal".to_string(),
            risk_tolerance: "moderate".to_string(),
            confidence: 0.0,
            extra: serde_json::Map::new(),
        }
    }
}

/// Verdict from the risk gate collaborator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct RiskAssessment {
    /// Whether the gate approved continuing to synthesis.
    pub approved: bool,

    /// Gate-specific payload (position sizing, rejection reason, ...).
    #[ts(type = "any")]
    pub data: Value,
}

/// Recommended trade direction.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

/// A titled source reference returned by a web lookup.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct Reference {
    pub title: String,
    pub url: String,
}

/// Final decision produced by the synthesis collaborator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct TradeDecision {
    pub action: TradeAction,

    /// Confidence in the decision, 0.0 to 1.0.
    pub confidence: f64,

    /// Structured reasoning (summary, key factors, risks, ...).
    #[ts(type = "any")]
    pub reasoning: Value,

    /// Entry/stop/take-profit/position-size when a trade is recommended.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "any | null")]
    pub trade_parameters: Option<Value>,

    /// Sources the synthesizer cited, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Reference>,
}

impl TradeDecision {
    /// The fixed neutral verdict emitted when the risk gate rejects a run.
    ///
    /// The short-circuit path never invokes synthesis, so this sentinel is
    /// the only decision payload a rejected run will ever carry.
    pub fn hold_sentinel() -> Self {
        Self {
            action: TradeAction::Hold,
            confidence: 0.0,
            reasoning: serde_json::json!({
                "summary": "Trade rejected by risk gate; holding with no position.",
            }),
            trade_parameters: None,
            citations: Vec::new(),
        }
    }
}

/// Outcome of report generation.
///
/// A failed report does not fail the run; the failure is recorded here and
/// surfaced to the client in the `report_update` event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct ReportResult {
    pub success: bool,

    /// Rendered report body when generation succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
}

impl ReportResult {
    pub fn ok(content: impl Into<String>) -> Self {
        let content = content.into();
        let word_count = content.split_whitespace().count();
        Self {
            success: true,
            content: Some(content),
            error: None,
            word_count: Some(word_count),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(error.into()),
            word_count: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_context_for_pair() {
        let ctx = QueryContext::for_pair("XAU/USD");
        assert_eq!(ctx.pair, "XAU/USD");
        assert_eq!(ctx.base_currency, "XAU");
        assert_eq!(ctx.quote_currency, "USD");
        assert_eq!(ctx.asset_type, "unknown");
        assert_eq!(ctx.confidence, 0.0);
    }

    #[test]
    fn test_trade_action_serialization() {
        let json = serde_json::to_value(TradeAction::Buy).expect("serialize");
        assert_eq!(json, "BUY");

        let back: TradeAction = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, TradeAction::Buy);
    }

    #[test]
    fn test_hold_sentinel_is_neutral() {
        let sentinel = TradeDecision::hold_sentinel();
        assert_eq!(sentinel.action, TradeAction::Hold);
        assert_eq!(sentinel.confidence, 0.0);
        assert!(sentinel.trade_parameters.is_none());
    }

    #[test]
    fn test_report_result_word_count() {
        let report = ReportResult::ok("one two three");
        assert!(report.success);
        assert_eq!(report.word_count, Some(3));

        let failed = ReportResult::failed("template missing");
        assert!(!failed.success);
        assert!(failed.content.is_none());
    }
}
