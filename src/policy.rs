//! Maps a request path to the access policy that governs it.

const PUBLIC_PREFIX: &str = "/assets/";
const GENERATE_PREFIX: &str = "/generate/";
const PROTECTED_PREFIXES: [&str; 2] = ["/uploads/", "/invoices/"];

/// How a request path may be accessed
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Policy {
    /// Served without a token
    Public,
    /// Mints a signed URL for the path after `/generate`
    Generate,
    /// Served only with a valid `verify` token
    Protected,
    /// Rejected outright
    Denied,
}

impl Policy {
    /// `Cache-Control` for objects served under this policy
    pub fn cache_control(self) -> Option<&'static str> {
        match self {
            Policy::Public => Some("public, max-age=86400"),
            Policy::Protected => Some("private, no-store"),
            Policy::Generate | Policy::Denied => None,
        }
    }
}

/// Classify a request path (query string excluded).
///
/// Paths with `.` or `..` segments are denied so that a public prefix can't be
/// used to reach a protected key.
pub fn classify(path: &str) -> Policy {
    if path.split('/').any(|segment| segment == "." || segment == "..") {
        return Policy::Denied;
    }

    if path.starts_with(PUBLIC_PREFIX) {
        Policy::Public
    } else if path.starts_with(GENERATE_PREFIX) {
        Policy::Generate
    } else if PROTECTED_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        Policy::Protected
    } else {
        Policy::Denied
    }
}

/// Path a `/generate/...` request signs: the request path minus `/generate`.
///
/// Empty when nothing follows the prefix.
pub fn generate_target(path: &str) -> &str {
    path.strip_prefix(GENERATE_PREFIX.trim_end_matches('/'))
        .filter(|target| target.len() > 1)
        .unwrap_or_default()
}

/// Storage key for a request path
pub fn object_key(path: &str) -> &str {
    path.trim_start_matches('/')
}
