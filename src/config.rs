use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::fetch::Transport;

/// Site configuration: which domains are augmented and which source files are searched.
/// Read once during initialization and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Domains whose pages (and subdomains) are augmented. Never empty.
    pub domains: Vec<String>,
    /// File suffixes searched for links, without the leading dot.
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Base URL of a pre-built index; `<index_url>/<domain>.json` replaces the search query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_url: Option<String>,
    /// How line numbers are appended to code-browser links.
    #[serde(default)]
    pub line_anchor: LineAnchor,
    /// Code-search service used for both queries and outbound links.
    #[serde(default)]
    pub search: SearchService,
}

/// Line-number anchor style of the code browser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineAnchor {
    /// `#42`
    #[default]
    Number,
    /// `#L42`
    Prefixed,
}

/// Location of the code-search service. Either field may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchService {
    /// Service root, e.g. `https://searchfox.org`.
    pub base_url: String,
    /// Repository (tree) name under the service root.
    pub repository: String,
}

impl Default for SearchService {
    fn default() -> Self {
        return Self {
            base_url: String::from("https://searchfox.org"),
            repository: String::from("mozilla-central"),
        };
    }
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            domains: vec![String::from("example.com")],
            extensions: vec![String::from("h"), String::from("cpp")],
            index_url: None,
            line_anchor: LineAnchor::default(),
            search: SearchService::default(),
        };
    }
}

impl Config {
    /// Load the configuration from a local path or a URL.
    /// Locations containing `://` go through the transport; anything else is read from disk.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigLoad` if the document cannot be fetched, parsed,
    /// or fails validation. A missing or non-sequence `domains` is a load error.
    pub fn load(location: &str, transport: &impl Transport) -> Result<Self, Error> {
        let content = if location.contains("://") {
            transport.fetch(location).map_err(|e| {
                return Error::ConfigLoad {
                    location: location.to_string(),
                    reason: e.to_string(),
                };
            })?
        } else {
            std::fs::read_to_string(location).map_err(|e| {
                return Error::ConfigLoad {
                    location: location.to_string(),
                    reason: e.to_string(),
                };
            })?
        };
        let config = Self::parse(&content, location)?;
        log::info!("loaded config from {location}: {} domains", config.domains.len());
        return Ok(config);
    }

    /// Parse configuration text. TOML when `location` ends in `.toml`, JSON otherwise.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigLoad` on syntax or schema errors and on validation failure.
    pub fn parse(content: &str, location: &str) -> Result<Self, Error> {
        let parsed: Result<Self, String> = if location.ends_with(".toml") {
            toml::from_str(content).map_err(|e| return e.to_string())
        } else {
            serde_json::from_str(content).map_err(|e| return e.to_string())
        };
        let config = parsed.map_err(|reason| {
            return Error::ConfigLoad {
                location: location.to_string(),
                reason,
            };
        })?;
        return config.validated(location);
    }

    /// Enforce the domain invariant, lower-case domains to match page hosts,
    /// and normalize extensions.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigLoad` if `domains` is empty or holds an empty entry.
    fn validated(mut self, location: &str) -> Result<Self, Error> {
        self.domains = self.domains.iter().map(|d| return d.trim().to_lowercase()).collect();
        if self.domains.is_empty() {
            return Err(Error::ConfigLoad {
                location: location.to_string(),
                reason: "`domains` must list at least one domain".to_string(),
            });
        }
        if self.domains.iter().any(String::is_empty) {
            return Err(Error::ConfigLoad {
                location: location.to_string(),
                reason: "`domains` contains an empty entry".to_string(),
            });
        }
        self.extensions = self
            .extensions
            .iter()
            .map(|e| return e.trim().trim_start_matches('.').to_string())
            .filter(|e| return !e.is_empty())
            .collect();
        return Ok(self);
    }

    /// URL of the pre-built index for a domain, if one is configured.
    pub fn index_location(&self, domain: &str) -> Option<String> {
        return self
            .index_url
            .as_ref()
            .map(|base| return format!("{}/{domain}.json", base.trim_end_matches('/')));
    }

    /// Write a default configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be created,
    /// or `Error::Json` if serialization fails.
    pub fn write_default(path: &Path) -> Result<(), Error> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &Self::default())?;
        log::info!("wrote default config to {}", path.display());
        return Ok(());
    }
}
