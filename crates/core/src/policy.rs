//! Origin policy: local vs third-party, denied vs allowed.

use url::{Origin, Url};

use crate::resolve::{UrlError, resolve};

/// Classifies request URLs against the base origin and the deny list.
///
/// Pure function of configuration and input; no side effects.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    base: Url,
    origin: Origin,
    deny_prefixes: Vec<String>,
}

impl OriginPolicy {
    /// Prefixes that parse as URLs are brought into the serialized form
    /// request URLs are compared in (lowercase scheme and host, default port
    /// dropped). Anything else is kept verbatim.
    pub fn new(base: Url, deny_prefixes: Vec<String>) -> Self {
        let origin = base.origin();
        let deny_prefixes = deny_prefixes.into_iter().map(normalize_prefix).collect();
        Self { base, origin, deny_prefixes }
    }

    /// True iff the URL starts with any denied prefix.
    ///
    /// Plain string prefix match on the serialized URL, no pattern syntax.
    pub fn is_denied(&self, url: &Url) -> bool {
        let url = url.as_str();
        self.deny_prefixes.iter().any(|prefix| url.starts_with(prefix.as_str()))
    }

    /// True iff the URL's origin equals the base origin.
    pub fn is_local(&self, url: &Url) -> bool {
        url.origin() == self.origin
    }

    /// Resolve a path or absolute URL against the base origin.
    pub fn resolve(&self, input: &str) -> Result<Url, UrlError> {
        resolve(&self.base, input)
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn deny_prefixes(&self) -> &[String] {
        &self.deny_prefixes
    }
}

fn normalize_prefix(prefix: String) -> String {
    let Some((_, rest)) = prefix.split_once("://") else {
        return prefix;
    };
    let Ok(url) = Url::parse(&prefix) else {
        return prefix;
    };
    if !url.has_host() {
        return prefix;
    }

    // Authority-only prefixes are kept without a trailing "/".
    if rest.contains(['/', '?', '#']) {
        url.to_string()
    } else {
        url.origin().ascii_serialization()
    }
}
