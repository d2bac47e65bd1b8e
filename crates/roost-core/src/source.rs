use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How hard a source is to crawl. Drives the inter-request delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Moderate => "moderate",
            Difficulty::Hard => "hard",
        }
    }
}

/// Crawl policy for a source: refresh cadence and politeness knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapePolicy {
    pub refresh_interval_minutes: u32,
    /// Source renders listings client-side. Such sources should be
    /// configured as run-based-service sources; direct fetching will
    /// see empty markup.
    #[serde(default)]
    pub requires_js: bool,
    pub difficulty: Difficulty,
}

impl Default for ScrapePolicy {
    fn default() -> Self {
        Self {
            refresh_interval_minutes: 360,
            requires_js: false,
            difficulty: Difficulty::Moderate,
        }
    }
}

impl ScrapePolicy {
    /// Minimum delay between consecutive page fetches within one run.
    pub fn request_delay(&self) -> Duration {
        match self.difficulty {
            Difficulty::Easy => Duration::from_millis(500),
            Difficulty::Moderate => Duration::from_secs(1),
            Difficulty::Hard => Duration::from_secs(2),
        }
    }
}

/// Adapter kind plus the connection parameters that kind needs.
///
/// Tagged union: each variant carries only its own fields, so adapters
/// never probe for optional keys at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SourceKind {
    /// Paginated listing index fetched and parsed directly.
    DirectHtml {
        list_url: String,
        /// CSS selector for one listing card. Defaults to `.listing-card`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_selector: Option<String>,
    },
    /// Third-party scraping service driven by actor runs.
    RunBasedService {
        endpoint: String,
        actor_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        results_limit: Option<u32>,
    },
    /// First-party listings API with cursor pagination.
    Api {
        endpoint: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
    },
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::DirectHtml { .. } => "direct-html",
            SourceKind::RunBasedService { .. } => "run-based-service",
            SourceKind::Api { .. } => "api",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One external origin of listing data.
///
/// Created and edited through the admin surface; read-only to the
/// orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub kind: SourceKind,
    pub enabled: bool,
    /// Lower = crawled first and treated as more authoritative.
    pub priority: i32,
    #[serde(default)]
    pub policy: ScrapePolicy,
}

impl SourceConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            enabled: true,
            priority: 100,
            policy: ScrapePolicy::default(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_policy(mut self, policy: ScrapePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tag_roundtrip() {
        let kind = SourceKind::RunBasedService {
            endpoint: "https://api.scrapeworks.example/v2".into(),
            actor_id: "actor-123".into(),
            token: Some("tok".into()),
            results_limit: Some(200),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["kind"], "run-based-service");
        let back: SourceKind = serde_json::from_value(json).unwrap();
        assert_eq!(back.as_str(), "run-based-service");
    }

    #[test]
    fn test_kind_variants_carry_only_their_fields() {
        let kind = SourceKind::DirectHtml {
            list_url: "https://rentals.example/listings".into(),
            item_selector: None,
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["kind"], "direct-html");
        assert!(json.get("endpoint").is_none());
        assert!(json.get("item_selector").is_none());
    }

    #[test]
    fn test_config_flattens_kind() {
        let config = SourceConfig::new(
            "src-api",
            "Example API",
            SourceKind::Api {
                endpoint: "https://api.example.com/listings".into(),
                api_key: None,
            },
        )
        .with_priority(5);

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["kind"], "api");
        assert_eq!(json["priority"], 5);

        let back: SourceConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, "src-api");
        assert_eq!(back.kind.as_str(), "api");
    }

    #[test]
    fn test_request_delay_scales_with_difficulty() {
        let mut policy = ScrapePolicy::default();
        policy.difficulty = Difficulty::Easy;
        let easy = policy.request_delay();
        policy.difficulty = Difficulty::Hard;
        let hard = policy.request_delay();
        assert!(hard > easy);
    }
}
