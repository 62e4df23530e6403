use std::fmt::Write as _;

use crate::error::Error;
use crate::fetch::FetchFailure;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Render an error as markdown with bold headings and print it to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
    return;
}

/// Render an error as a structured markdown diagnostic: what happened, then how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::ConfigLoad { location, reason } => render_config_load(location, reason),
        Error::IndexFetch { reason, url } => render_index_fetch(url, reason),
        Error::InvalidPageUrl { href, reason } => format!(
            "\
# Error: Invalid Page URL

`{href}` cannot be used as a page location: {reason}

## Fix

Pass the page's full `http(s)://host/path` address with `--url`.
"
        ),
        Error::InvalidResponseFormat { found } => format!(
            "\
# Error: Invalid Response Format

The index payload is a JSON {found}, but an object keyed by fragment or
result section was expected.
"
        ),
        _ => render_generic(e),
    };
}

/// Variants without a dedicated fix section.
fn render_generic(e: &Error) -> String {
    return match e {
        Error::AnchorNotFound { fragment } => format!(
            "\
# Error: Anchor Not Found

No element on the page has id or name `{fragment}`.
"
        ),
        Error::DegradedResult { domain } => format!(
            "\
# Warning: Degraded Result

The search for `{domain}` timed out upstream; the index is partial.
"
        ),
        Error::Io(err) => format!(
            "\
# Error: I/O

{err}
"
        ),
        Error::Json(err) => format!(
            "\
# Error: Invalid JSON

{err}
"
        ),
        Error::Pattern(err) => format!(
            "\
# Error: Extraction Pattern

{err}
"
        ),
        Error::UnexpectedFragmentShape { found, fragment } => format!(
            "\
# Error: Unexpected Fragment Shape

`#{fragment}` maps to a JSON {found}; expected an array of references.
"
        ),
        _ => format!(
            "\
# Error

{e}
"
        ),
    };
}

fn render_config_load(location: &str, reason: &str) -> String {
    let mut out = format!(
        "\
# Error: Config Load Failed

Could not load `{location}`: {reason}
"
    );
    out.push_str(
        "\
\n## Fix

The config needs at least a non-empty `domains` list:

    {\"domains\": [\"example.com\"], \"extensions\": [\"h\", \"cpp\"]}

Or write a default one:

    specmonkey create-config specmonkey.json
",
    );
    return out;
}

fn render_index_fetch(url: &str, reason: &FetchFailure) -> String {
    let mut out = format!(
        "\
# Error: Index Fetch Failed

`{url}`: {reason}
"
    );
    match reason {
        FetchFailure::Status(404) => {
            out.push_str(
                "\
\n## Fix

No index exists at that location. Check `index_url` or export one:

    specmonkey export-index --config <CONFIG> --url <PAGE_URL> --out <DIR>
",
            );
        },
        FetchFailure::BadUrl(_) => {
            let _ = writeln!(out, "\n## Fix\n\nCheck `{url}` against `search.base_url` and `index_url` in the config.");
        },
        FetchFailure::Status(_) | FetchFailure::Transport(_) => {},
    }
    return out;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_suggest_create_config() {
        let md = render_error(&Error::ConfigLoad {
            location: "c.json".to_string(),
            reason: "missing field `domains`".to_string(),
        });
        assert!(md.starts_with("# Error: Config Load Failed"));
        assert!(md.contains("specmonkey create-config"));
    }

    #[test]
    fn missing_index_suggests_export() {
        let md = render_error(&Error::IndexFetch {
            reason: FetchFailure::Status(404),
            url: "https://idx.local/a.org.json".to_string(),
        });
        assert!(md.contains("http status 404"));
        assert!(md.contains("export-index"));

        let md = render_error(&Error::IndexFetch {
            reason: FetchFailure::Status(500),
            url: "u".to_string(),
        });
        assert!(!md.contains("## Fix"));
    }

    #[test]
    fn every_block_starts_with_a_heading() {
        let errors = [
            Error::AnchorNotFound { fragment: "x".to_string() },
            Error::DegradedResult { domain: "a.org".to_string() },
            Error::InvalidResponseFormat { found: "array" },
            Error::UnexpectedFragmentShape {
                found: "object",
                fragment: "x".to_string(),
            },
        ];
        for e in &errors {
            assert!(render_error(e).starts_with("# "), "{e}");
        }
    }
}
