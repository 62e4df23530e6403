/// Core domain types: references, the fragment index, and the page location.
use std::collections::BTreeMap;

use serde::Serialize;
use url::Url;

use crate::error::Error;

/// One source-code occurrence of a link to a page fragment.
/// Immutable once constructed; the line number is always positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Repository-relative path of the file containing the link.
    filepath: String,
    /// One-based line number of the link in the file.
    line_number: u32,
    /// Canonical page URL including the `#fragment`.
    url: String,
}

impl Reference {
    /// Build a reference. Returns `None` for line number zero.
    pub fn new(url: impl Into<String>, filepath: impl Into<String>, line_number: u32) -> Option<Self> {
        if line_number == 0 {
            return None;
        }
        return Some(Self {
            filepath: filepath.into(),
            line_number,
            url: url.into(),
        });
    }

    /// Repository-relative path of the file containing the link.
    pub fn filepath(&self) -> &str {
        return &self.filepath;
    }

    /// One-based line number of the link.
    pub const fn line_number(&self) -> u32 {
        return self.line_number;
    }

    /// Canonical page URL including the fragment.
    #[cfg(test)]
    pub fn url(&self) -> &str {
        return &self.url;
    }
}

/// Fragment identifier to the references pointing at it.
///
/// Keys are never empty and every sequence holds at least one reference:
/// entries only come into existence through [`FragmentIndex::push`].
/// Within a fragment, references keep discovery order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FragmentIndex {
    /// Sorted by fragment so output is deterministic.
    entries: BTreeMap<String, Vec<Reference>>,
}

impl FragmentIndex {
    /// Append a reference to a fragment's sequence, creating it on first insertion.
    /// Returns `false` and does nothing for an empty fragment.
    pub fn push(&mut self, fragment: &str, reference: Reference) -> bool {
        if fragment.is_empty() {
            return false;
        }
        self.entries.entry(fragment.to_string()).or_default().push(reference);
        return true;
    }

    /// References recorded for one fragment.
    #[cfg(test)]
    pub fn get(&self, fragment: &str) -> Option<&[Reference]> {
        return self.entries.get(fragment).map(Vec::as_slice);
    }

    /// Iterate fragments with their references.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Reference])> {
        return self.entries.iter().map(|(k, v)| return (k.as_str(), v.as_slice()));
    }

    /// Number of fragments.
    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    /// Whether no fragment has been indexed.
    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    /// Total number of references across all fragments.
    pub fn reference_count(&self) -> usize {
        return self.entries.values().map(Vec::len).sum();
    }
}

/// The URL of the page being augmented.
#[derive(Debug, Clone)]
pub struct PageLocation {
    /// Parsed page URL; guaranteed to have a host.
    url: Url,
}

impl PageLocation {
    /// Parse a page URL (`location.href`).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPageUrl` if the URL does not parse or has no host.
    pub fn parse(href: &str) -> Result<Self, Error> {
        let url = Url::parse(href).map_err(|e| {
            return Error::InvalidPageUrl {
                href: href.to_string(),
                reason: e.to_string(),
            };
        })?;
        if url.host_str().is_none() {
            return Err(Error::InvalidPageUrl {
                href: href.to_string(),
                reason: "no host".to_string(),
            });
        }
        return Ok(Self { url });
    }

    /// Lower-cased host name of the page.
    pub fn hostname(&self) -> &str {
        return self.url.host_str().unwrap_or_default();
    }

    /// Compose the canonical URL of a fragment on this page:
    /// protocol, host name and path, then `#fragment`. Query and port are dropped.
    pub fn reference_url(&self, fragment: &str) -> String {
        return format!(
            "{}://{}{}#{fragment}",
            self.url.scheme(),
            self.hostname(),
            self.url.path()
        );
    }
}
