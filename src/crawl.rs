//! Local source crawl: build a fragment index per configured domain from a
//! checkout on disk, the offline counterpart of the search service.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use url::Url;
use walkdir::WalkDir;

use crate::domain::match_domain;
use crate::error::Error;
use crate::query::FragmentContract;
use crate::types::{FragmentIndex, Reference};

/// Extraction contracts for every configured domain, in config order.
#[derive(Debug)]
pub struct Crawler {
    /// One contract per configured domain.
    contracts: Vec<FragmentContract>,
    /// Configured domains, used to assign each link to exactly one of them.
    domains: Vec<String>,
}

impl Crawler {
    /// Compile a contract for each configured domain.
    ///
    /// # Errors
    ///
    /// Returns `Error::Pattern` if an extraction pattern fails to compile.
    pub fn new(domains: &[String]) -> Result<Self, Error> {
        let contracts = domains
            .iter()
            .map(|d| return FragmentContract::new(d))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Self {
            contracts,
            domains: domains.to_vec(),
        });
    }

    /// Index every matching file under `root`, keyed by domain.
    /// Domains without any link are absent. Unreadable files are skipped.
    pub fn crawl(&self, root: &Path, extensions: &[String]) -> BTreeMap<String, FragmentIndex> {
        let mut indexes: BTreeMap<String, FragmentIndex> = BTreeMap::new();
        for path in gather_files(root, extensions) {
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::debug!("skipping {}: {e}", path.display());
                    continue;
                },
            };
            let relative = path.strip_prefix(root).unwrap_or(&path);
            let filepath = relative.to_string_lossy().replace('\\', "/");
            let content = String::from_utf8_lossy(&bytes);
            for (line_number, line) in (1_u32..).zip(content.lines()) {
                self.scan_line(line, &filepath, line_number, &mut indexes);
            }
        }
        log::info!("indexed {} domains under {}", indexes.len(), root.display());
        return indexes;
    }

    /// Record the links on one line. A link whose host belongs to an earlier
    /// configured domain is left to that domain's contract.
    fn scan_line(&self, line: &str, filepath: &str, line_number: u32, indexes: &mut BTreeMap<String, FragmentIndex>) {
        for contract in &self.contracts {
            for link in contract.links(line) {
                let owner = Url::parse(link.url)
                    .ok()
                    .and_then(|u| return u.host_str().map(str::to_lowercase))
                    .and_then(|host| return match_domain(&host, &self.domains).map(str::to_string));
                if owner.as_deref() != Some(contract.domain()) {
                    continue;
                }
                let Some(reference) = Reference::new(link.url, filepath, line_number) else {
                    continue;
                };
                indexes
                    .entry(contract.domain().to_string())
                    .or_default()
                    .push(link.fragment, reference);
            }
        }
        return;
    }
}

/// Files under `root` with one of `extensions`, compared case-insensitively.
/// An empty list keeps every file. Sorted by path.
pub fn gather_files(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    return WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| return e.file_type().is_file())
        .filter(|e| {
            return extensions.is_empty()
                || e.path().extension().is_some_and(|ext| {
                    return extensions
                        .iter()
                        .any(|wanted| return ext.to_string_lossy().eq_ignore_ascii_case(wanted));
                });
        })
        .map(walkdir::DirEntry::into_path)
        .collect();
}
