use crate::config::RouteTableConfig;
use std::fmt;

/// How a request path relates to authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClassification {
    /// Exactly one of the public paths
    Public,
    /// Under one of the protected prefixes
    Protected,
    /// Neither; reachable by everyone
    Unclassified,
}

impl RouteClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClassification::Public => "public",
            RouteClassification::Protected => "protected",
            RouteClassification::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for RouteClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable path lists the guard decides with
#[derive(Debug, Clone)]
pub struct RouteTable {
    protected_prefixes: Vec<String>,
    public_paths: Vec<String>,
    auth_entry_paths: Vec<String>,
    login_path: String,
    dashboard_path: String,
}

impl RouteTable {
    /// Create a route table from configuration
    pub fn new(config: &RouteTableConfig) -> Self {
        Self {
            protected_prefixes: config.protected_prefixes.clone(),
            public_paths: config.public_paths.clone(),
            auth_entry_paths: config.auth_entry_paths.clone(),
            login_path: config.login_path.clone(),
            dashboard_path: config.dashboard_path.clone(),
        }
    }

    /// Classify a request path. Public is checked first so an exact public entry wins
    /// over an overlapping protected prefix.
    pub fn classify(&self, path: &str) -> RouteClassification {
        if self.public_paths.iter().any(|p| p == path) {
            RouteClassification::Public
        } else if self
            .protected_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            RouteClassification::Protected
        } else {
            RouteClassification::Unclassified
        }
    }

    /// Whether signed-in callers are bounced away from this path
    pub fn is_auth_entry(&self, path: &str) -> bool {
        self.auth_entry_paths.iter().any(|p| p == path)
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn dashboard_path(&self) -> &str {
        &self.dashboard_path
    }
}

/// Static asset and image paths that never reach the guard
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    prefixes: Vec<String>,
    exact: Vec<String>,
}

impl ExclusionFilter {
    pub fn new(config: &RouteTableConfig) -> Self {
        Self {
            prefixes: config.excluded_prefixes.clone(),
            exact: config.excluded_paths.clone(),
        }
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.exact.iter().any(|p| p == path)
            || self
                .prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }
}
