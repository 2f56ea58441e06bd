use url::Url;

/// An operator-configured target host pattern: either an exact hostname
/// or a `*.`-prefixed wildcard domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPattern {
    Exact(String),
    /// The stored string is the suffix after `*.`. A wildcard matches the
    /// suffix itself and any subdomain of it, never a mere substring:
    /// `*.example.com` matches `example.com` and `api.example.com`, not
    /// `evilexample.com`.
    Wildcard(String),
}

impl HostPattern {
    /// Patterns are normalized to lowercase so matching never produces a
    /// case-mismatch false negative.
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.trim().to_ascii_lowercase();
        match lowered.strip_prefix("*.") {
            Some(suffix) => HostPattern::Wildcard(suffix.to_string()),
            None => HostPattern::Exact(lowered),
        }
    }

    /// `hostname` must already be lowercase.
    pub fn matches(&self, hostname: &str) -> bool {
        match self {
            HostPattern::Exact(host) => hostname == host,
            HostPattern::Wildcard(suffix) => {
                // A bare `*.` compiles to an empty suffix; that pattern
                // names nothing and must not match anything.
                !suffix.is_empty()
                    && (hostname == suffix
                        || hostname
                            .strip_suffix(suffix.as_str())
                            .is_some_and(|rest| rest.ends_with('.')))
            }
        }
    }
}

/// Compile configured pattern strings once, preserving order.
pub fn compile_patterns(raw: &[String]) -> Vec<HostPattern> {
    raw.iter().map(|p| HostPattern::parse(p)).collect()
}

/// Decide whether a parsed target may be proxied. An empty pattern list
/// denies everything; a URL without a host component is denied.
pub fn host_allowed(url: &Url, patterns: &[HostPattern]) -> bool {
    if patterns.is_empty() {
        return false;
    }

    let Some(host) = url.host_str() else {
        return false;
    };

    let hostname = host.to_ascii_lowercase();
    patterns.iter().any(|p| p.matches(&hostname))
}

/// String-level variant: a target that fails URL parsing is denied
/// (fail closed), same as an unlisted host.
pub fn is_allowed(target_url: &str, patterns: &[HostPattern]) -> bool {
    match Url::parse(target_url) {
        Ok(url) => host_allowed(&url, patterns),
        Err(_) => false,
    }
}
