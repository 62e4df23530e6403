//! The search query and the fragment-extraction pattern, built together.
//!
//! The query asks the search service for lines containing a URL under the
//! domain followed by `#`; the pattern pulls the fragment token back out of
//! those lines. Both come from one `FragmentContract` so they change in lockstep.

use regex::Regex;

use crate::error::Error;

/// Query template and matching extraction pattern for one domain.
#[derive(Debug, Clone)]
pub struct FragmentContract {
    /// Configured domain the query is scoped to.
    domain: String,
    /// Compiled extraction pattern; capture group 1 is the fragment.
    pattern: Regex,
}

/// One link into the domain found on a line of source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link<'l> {
    /// Fragment after `#`, trailing `.` and `:` trimmed.
    pub fragment: &'l str,
    /// The link as written, ending with the trimmed fragment.
    pub url: &'l str,
}

impl FragmentContract {
    /// Build the contract for a matched configuration domain.
    ///
    /// # Errors
    ///
    /// Returns `Error::Pattern` if the extraction pattern fails to compile.
    pub fn new(domain: &str) -> Result<Self, Error> {
        let pattern = Regex::new(&format!(
            r#"https?://(?:[\w-]+\.)*{}/[^\s#"'<>]*#(\w[\w\-.:]*)"#,
            regex::escape(domain)
        ))?;
        return Ok(Self {
            domain: domain.to_string(),
            pattern,
        });
    }

    /// The domain this contract is scoped to.
    pub fn domain(&self) -> &str {
        return &self.domain;
    }

    /// Search query for files whose name does not start with `_` and ends in
    /// one of `extensions`, restricted to lines linking into the domain.
    pub fn query(&self, extensions: &[String]) -> String {
        let path_filter = if extensions.is_empty() {
            r"(^|/)[^_/][^/]*$".to_string()
        } else {
            let alternatives: Vec<String> = extensions.iter().map(|e| return regex::escape(e)).collect();
            format!(r"(^|/)[^_/][^/]*\.({})$", alternatives.join("|"))
        };
        return format!(
            r"pathre:{path_filter} re:https?://([\w-]+\.)*{}/\S*#\w",
            regex::escape(&self.domain)
        );
    }

    /// Source text of the extraction pattern.
    pub fn pattern(&self) -> &str {
        return self.pattern.as_str();
    }

    /// Fragments linked from one line of source, in order of appearance.
    /// A fragment repeated on the same line is reported once.
    pub fn extract<'l>(&self, line: &'l str) -> Vec<&'l str> {
        return self.links(line).into_iter().map(|l| return l.fragment).collect();
    }

    /// Links into the domain on one line of source, one per distinct fragment.
    pub fn links<'l>(&self, line: &'l str) -> Vec<Link<'l>> {
        let mut links: Vec<Link<'l>> = Vec::new();
        for cap in self.pattern.captures_iter(line) {
            let (Some(whole), Some(token)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let fragment = token.as_str().trim_end_matches(['.', ':']);
            if fragment.is_empty() || links.iter().any(|l| return l.fragment == fragment) {
                continue;
            }
            links.push(Link {
                fragment,
                url: whole.as_str().trim_end_matches(['.', ':']),
            });
        }
        return links;
    }
}
