use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use robotstxt::DefaultMatcher;
use roost_core::error::AppError;
use url::Url;

/// User-agent token matched against robots.txt rules.
const AGENT: &str = "Roost";

/// Per-host robots.txt cache consulted by the direct-HTML adapter.
///
/// An unreachable or missing robots.txt defaults to allow — the file is
/// advisory, and most small listing sites simply do not serve one.
#[derive(Clone, Debug)]
pub struct RobotsCache {
    http: crate::http::HttpFetcher,
    /// origin → robots.txt body ("" when the fetch failed).
    cache: Arc<Mutex<HashMap<String, String>>>,
}

impl RobotsCache {
    pub fn new(http: crate::http::HttpFetcher) -> Self {
        Self {
            http,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether robots.txt permits fetching `url`.
    pub async fn is_allowed(&self, url: &str) -> Result<bool, AppError> {
        let parsed =
            Url::parse(url).map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| AppError::HttpError("URL has no host".to_string()))?;
        let origin = match parsed.port() {
            Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
            None => format!("{}://{}", parsed.scheme(), host),
        };

        let cached = self.cache.lock().unwrap().get(&origin).cloned();
        let body = match cached {
            Some(body) => body,
            None => {
                let body = match self.http.get_text(&format!("{origin}/robots.txt")).await {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::debug!(%origin, error = %e, "robots.txt unavailable, allowing");
                        String::new()
                    }
                };
                self.cache
                    .lock()
                    .unwrap()
                    .insert(origin.clone(), body.clone());
                body
            }
        };

        if body.is_empty() {
            return Ok(true);
        }

        let mut matcher = DefaultMatcher::default();
        Ok(matcher.one_agent_allowed_by_robots(&body, AGENT, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matcher_honors_disallow_rules() {
        let robots = "User-agent: *\nDisallow: /private/\n";
        let mut matcher = DefaultMatcher::default();
        assert!(matcher.one_agent_allowed_by_robots(
            robots,
            AGENT,
            "https://rentals.example/listings"
        ));
        assert!(!matcher.one_agent_allowed_by_robots(
            robots,
            AGENT,
            "https://rentals.example/private/admin"
        ));
    }
}
