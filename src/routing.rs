//! Keyword-based routing policy as an ordered rule table.

use serde::{Deserialize, Serialize};

/// Well-known agent kinds.
pub mod kind {
    pub const RESEARCH: &str = "research";
    pub const CODING: &str = "coding";
    pub const FINANCIAL: &str = "financial";
    pub const TECHNICAL_ANALYSIS: &str = "technical_analysis";
    pub const FUNDAMENTAL_ANALYSIS: &str = "fundamental_analysis";
    pub const STOCK_SCREENER: &str = "stock_screener";
}

/// Caller-supplied routing preference for `assign`.
///
/// Resolution order: explicit agent id (when known), then explicit kind,
/// then keyword inference, then the first registered agent.
#[derive(Debug, Clone, Default)]
pub struct RoutingHint {
    pub agent_id: Option<String>,
    pub kind: Option<String>,
}

impl RoutingHint {
    pub fn to_agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            kind: None,
        }
    }

    pub fn for_kind(kind: impl Into<String>) -> Self {
        Self {
            agent_id: None,
            kind: Some(kind.into()),
        }
    }
}

/// One inference rule: if any token appears in the task text, route to the
/// target kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub tokens: Vec<String>,
    pub target_kind: String,
}

impl RoutingRule {
    pub fn new(tokens: &[&str], target_kind: &str) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_lowercase()).collect(),
            target_kind: target_kind.to_string(),
        }
    }

    /// The haystack is already lowercased; tokens are lowercased here as
    /// well so rules built by hand or deserialized match case-insensitively.
    fn matches(&self, haystack: &str) -> bool {
        self.tokens
            .iter()
            .any(|token| haystack.contains(token.to_lowercase().as_str()))
    }
}

/// Ordered keyword-to-kind inference table.
///
/// Rules are tried top to bottom; more specific tokens come before the
/// general kinds they would otherwise shadow. Matching is case-insensitive
/// substring search over the task's kind and description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingTable {
    rules: Vec<RoutingRule>,
}

impl RoutingTable {
    pub fn new(rules: Vec<RoutingRule>) -> Self {
        Self { rules }
    }

    /// Candidate kinds for a task, in rule order.
    ///
    /// The caller picks the first candidate that has a registered agent, so
    /// inference degrades gracefully when a specialized kind is absent.
    pub fn candidates<'a>(&'a self, task_kind: &str, description: &str) -> Vec<&'a str> {
        let haystack = format!("{} {}", task_kind, description).to_lowercase();
        self.rules
            .iter()
            .filter(|rule| rule.matches(&haystack))
            .map(|rule| rule.target_kind.as_str())
            .collect()
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new(vec![
            RoutingRule::new(&["technical"], kind::TECHNICAL_ANALYSIS),
            RoutingRule::new(&["fundamental"], kind::FUNDAMENTAL_ANALYSIS),
            RoutingRule::new(&["screen"], kind::STOCK_SCREENER),
            RoutingRule::new(
                &["financial", "finance", "stock", "investment"],
                kind::FINANCIAL,
            ),
            RoutingRule::new(&["code", "programming"], kind::CODING),
            RoutingRule::new(&["research", "information"], kind::RESEARCH),
        ])
    }
}
