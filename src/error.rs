/// Crate-level error types for specmonkey.
use crate::fetch::FetchFailure;

/// Every error carries enough context to produce a useful diagnostic
/// without a debugger. Each variant names the fragment, URL, or reason for failure.
#[allow(clippy::error_impl_error, reason = "crate-level error type shared by library and binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A fragment from the index has no element with a matching id or name on the page.
    #[error("anchor not found: `#{fragment}`")]
    AnchorNotFound {
        /// Fragment identifier that failed to resolve.
        fragment: String,
    },

    /// Configuration could not be fetched, parsed, or failed validation.
    #[error("config load failed ({location}): {reason}")]
    ConfigLoad {
        /// Path or URL the configuration was read from.
        location: String,
        /// Description of the failure.
        reason: String,
    },

    /// The search service timed out but still returned partial results.
    #[error("degraded result: search for `{domain}` timed out, results are partial")]
    DegradedResult {
        /// Domain whose search timed out upstream.
        domain: String,
    },

    /// The fragment index could not be fetched.
    #[error("index fetch failed ({url}): {reason}")]
    IndexFetch {
        /// Transport-level reason for the failure.
        reason: FetchFailure,
        /// URL the index was requested from.
        url: String,
    },

    /// The page URL cannot be parsed or has no host.
    #[error("invalid page url `{href}`: {reason}")]
    InvalidPageUrl {
        /// The rejected URL.
        href: String,
        /// Description of the parse failure.
        reason: String,
    },

    /// The index payload is not a JSON object.
    #[error("invalid response format: expected a JSON object, found {found}")]
    InvalidResponseFormat {
        /// JSON type that was found instead.
        found: &'static str,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON (de)serialization failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// The fragment-extraction pattern failed to compile.
    #[error("pattern: {0}")]
    Pattern(
        /// The wrapped regex error.
        #[from]
        regex::Error,
    ),

    /// A pre-built index entry is not a sequence of references.
    #[error("unexpected shape for fragment `#{fragment}`: expected an array, found {found}")]
    UnexpectedFragmentShape {
        /// JSON type that was found instead.
        found: &'static str,
        /// Fragment key of the malformed entry.
        fragment: String,
    },
}

/// Name the JSON type of a value, for error messages.
pub const fn json_type_name(value: &serde_json::Value) -> &'static str {
    return match value {
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Null => "null",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::Object(_) => "object",
        serde_json::Value::String(_) => "string",
    };
}
