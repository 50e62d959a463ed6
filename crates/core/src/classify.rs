//! Request classification into fetch/serve strategy categories.

use std::fmt;

use http::Method;

use crate::policy::OriginPolicy;
use crate::request::Request;

/// Strategy category of one request. Computed per request, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestCategory {
    /// Non-GET or denied: straight to the network, no bucket access.
    Passthrough,
    /// Document intent: network-first with html bucket and offline fallback.
    HtmlDocument,
    /// Same-origin asset: stale-while-revalidate from the runtime bucket.
    LocalAsset,
    /// Third-party asset: network-first, stored in the runtime bucket.
    GenericRemote,
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestCategory::Passthrough => "passthrough",
            RequestCategory::HtmlDocument => "html-document",
            RequestCategory::LocalAsset => "local-asset",
            RequestCategory::GenericRemote => "generic-remote",
        };
        f.write_str(name)
    }
}

/// Assign a request to exactly one category. First match wins:
///
/// 1. non-GET or denied URL → `Passthrough`
/// 2. navigation or `Accept: text/html` → `HtmlDocument`
/// 3. same origin as the base → `LocalAsset`
/// 4. anything else → `GenericRemote`
///
/// The deny check runs first so a denied HTML-looking request is never cached.
pub fn classify(request: &Request, policy: &OriginPolicy) -> RequestCategory {
    if request.method != Method::GET || policy.is_denied(&request.url) {
        RequestCategory::Passthrough
    } else if request.is_document() {
        RequestCategory::HtmlDocument
    } else if policy.is_local(&request.url) {
        RequestCategory::LocalAsset
    } else {
        RequestCategory::GenericRemote
    }
}
