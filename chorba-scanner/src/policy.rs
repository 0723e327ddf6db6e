use crate::error::{Result, ScanError};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Built-in recipe path patterns, matched against the URL path only.
///
/// Adding a site is a one-line change here.
pub const BUILTIN_HOST_PATTERNS: &[(&str, &str)] = &[
    // /food/recipes/chocolate_cake_12345
    ("bbc.co.uk", r"^/?(?:[^/]+/)*recipes/(?:[^/]+/)*[^/]*_\d+/?$"),
    // /recipe/garlic-bread
    ("tasty.co", r"^(?:/[^/]+)*/recipe(?:/[^/]+)+/?$"),
    // /recipe/12345/banana-bread/ or /banana-bread-recipe-12345
    (
        "allrecipes.com",
        r"^(?:(?:/[^/]+)*/recipe(?:/[^/]+)+|(?:/[^/]+)*/[^/]*-recipe-\d+)/?$",
    ),
    // /recipe/spicy-chicken
    ("bonappetit.com", r"^(?:/[^/]+)*/recipe(?:/[^/]+)+/?$"),
    // /recipes/burnt-honey-teriyaki-udon
    ("mob.co.uk", r"^/recipes/[^/]+/?$"),
];

#[derive(Debug, Clone)]
enum PathMatcher {
    MatchAll,
    Pattern(Regex),
}

/// Decides which URL paths on a host are recipe detail pages.
#[derive(Debug, Clone)]
pub struct HostPolicy {
    host: String,
    matcher: PathMatcher,
}

impl HostPolicy {
    /// Permissive policy used for hosts without a registered pattern.
    pub fn match_all() -> Self {
        Self {
            host: "*".to_string(),
            matcher: PathMatcher::MatchAll,
        }
    }

    pub fn with_pattern(host: &str, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| ScanError::InvalidPattern {
            host: host.to_string(),
            source,
        })?;
        Ok(Self {
            host: normalize_host(host),
            matcher: PathMatcher::Pattern(regex),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self.matcher, PathMatcher::MatchAll)
    }

    pub fn is_recipe_path(&self, path: &str) -> bool {
        match &self.matcher {
            PathMatcher::MatchAll => !path.is_empty(),
            PathMatcher::Pattern(regex) => regex.is_match(path),
        }
    }
}

/// Maps hosts to their recipe path policy.
#[derive(Debug, Clone)]
pub struct HostPolicyRegistry {
    policies: HashMap<String, Arc<HostPolicy>>,
    fallback: Arc<HostPolicy>,
}

impl HostPolicyRegistry {
    /// An empty registry: every host resolves to the match-all policy.
    pub fn empty() -> Self {
        Self {
            policies: HashMap::new(),
            fallback: Arc::new(HostPolicy::match_all()),
        }
    }

    pub fn with_hosts(table: &[(&str, &str)]) -> Result<Self> {
        let mut registry = Self::empty();
        for (host, pattern) in table {
            registry.register(host, pattern)?;
        }
        Ok(registry)
    }

    pub fn builtin() -> Result<Self> {
        Self::with_hosts(BUILTIN_HOST_PATTERNS)
    }

    /// Adds a host, replacing any existing policy for it.
    pub fn register(&mut self, host: &str, pattern: &str) -> Result<()> {
        let policy = HostPolicy::with_pattern(host, pattern)?;
        debug!("Registered recipe path policy for {}", policy.host());
        self.policies
            .insert(policy.host().to_string(), Arc::new(policy));
        Ok(())
    }

    pub fn hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        hosts.sort_unstable();
        hosts
    }

    /// Resolve the policy for the host of `url`. Never fails: unparseable
    /// URLs and unknown hosts get the match-all policy.
    pub fn resolve(&self, url: &str) -> Arc<HostPolicy> {
        let host = match Url::parse(url).ok().and_then(|u| u.host_str().map(normalize_host)) {
            Some(host) => host,
            None => return self.fallback.clone(),
        };

        self.policies
            .get(&host)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.to_lowercase();
    match host.strip_prefix("www.") {
        Some(stripped) => stripped.to_string(),
        None => host,
    }
}
