//! CLI commands: annotate, query, export-index, index, create-config.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde::Serialize;

use crate::Format;
use crate::augment::{self, Augmentation, Launch};
use crate::categorize::CategorizedReferences;
use crate::config::Config;
use crate::crawl::Crawler;
use crate::dom::{Document, NodeId, PageDocument};
use crate::domain::match_domain;
use crate::error::Error;
use crate::fetch::{HttpTransport, search_url};
use crate::index_file;
use crate::overlay::{AnchorState, UiEvent};
use crate::query::FragmentContract;
use crate::render::inlay_summary;
use crate::types::PageLocation;

/// Arguments of `specmonkey annotate`.
#[derive(Debug)]
pub struct AnnotateArgs {
    /// Config path or URL.
    pub config: String,
    /// Report format.
    pub format: Format,
    /// Fragment whose button to hover and whose inlay to print.
    pub hover: Option<String>,
    /// Pre-built index base URL overriding the config.
    pub index_url: Option<String>,
    /// Saved page HTML.
    pub page: PathBuf,
    /// Fragment whose box to pin and print.
    pub pin: Option<String>,
    /// Swallow initialization errors after logging them.
    pub silent: bool,
    /// Page address.
    pub url: String,
}

/// JSON report of one annotation run.
#[derive(Serialize)]
struct AnnotateReport<'a> {
    /// Fragments that received an affordance.
    attached: Vec<AttachedEntry<'a>>,
    /// Matched configuration domain.
    domain: &'a str,
    /// Text of the hover inlay, when `--hover` was given.
    hovered: Option<String>,
    /// Text of the pinned box, when `--pin` was given.
    pinned: Option<String>,
    /// Fragments left alone.
    skipped: Vec<SkippedEntry<'a>>,
}

/// One attached fragment in the JSON report.
#[derive(Serialize)]
struct AttachedEntry<'a> {
    /// Fragment identifier.
    fragment: &'a str,
    /// Inlay text.
    inlay: String,
    /// References by category.
    references: &'a CategorizedReferences,
    /// Lifecycle state of the anchor after any hover or pin.
    state: AnchorState,
}

/// Overlay text captured by `--hover` and `--pin`.
struct Interactions {
    /// Inlay text shown while hovering.
    hovered: Option<String>,
    /// Pinned box text.
    pinned: Option<String>,
}

/// One skipped fragment in the JSON report.
#[derive(Serialize)]
struct SkippedEntry<'a> {
    /// Fragment identifier.
    fragment: &'a str,
    /// Why it was skipped.
    reason: &'a str,
}

/// Annotate a saved page and report each fragment.
///
/// # Errors
///
/// Returns `Error::Io` if the page cannot be read, any initialization error
/// unless `--silent` is set, and `Error::AnchorNotFound` if `--hover` or
/// `--pin` names a fragment that was not attached.
pub fn annotate(args: &AnnotateArgs) -> Result<ExitCode, Error> {
    let html = std::fs::read_to_string(&args.page)?;
    let mut doc = PageDocument::from_html(&html)?;
    let launch = Launch {
        config_location: &args.config,
        index_url: args.index_url.as_deref(),
        page_href: &args.url,
    };

    let outcome = if args.silent {
        augment::run(&HttpTransport, launch, &mut doc)
    } else {
        augment::start(&HttpTransport, launch, &mut doc)?
    };
    let Some(mut augmentation) = outcome else {
        println!("{}: nothing to annotate", args.url);
        return Ok(ExitCode::SUCCESS);
    };

    let hovered = match &args.hover {
        Some(fragment) => Some(hover_inlay(&mut augmentation, &mut doc, fragment)?),
        None => None,
    };
    let pinned = match &args.pin {
        Some(fragment) => Some(pin_box(&mut augmentation, &mut doc, fragment)?),
        None => None,
    };

    let interactions = Interactions { hovered, pinned };
    match args.format {
        Format::Json => print_json(&augmentation, interactions)?,
        Format::Text => print_text(&augmentation, &interactions),
    }
    return Ok(ExitCode::SUCCESS);
}

/// Affordance button and anchor of an attached fragment.
///
/// # Errors
///
/// Returns `Error::AnchorNotFound` if the fragment has no affordance.
fn attached_button(augmentation: &Augmentation, fragment: &str) -> Result<(NodeId, NodeId), Error> {
    return augmentation
        .attached
        .iter()
        .find(|a| return a.fragment == fragment)
        .map(|a| return (a.anchor, a.button))
        .ok_or_else(|| {
            return Error::AnchorNotFound {
                fragment: fragment.to_string(),
            };
        });
}

/// Move the pointer onto a fragment's button, read the inlay, then move it away.
///
/// # Errors
///
/// Returns `Error::AnchorNotFound` if the fragment has no affordance or the inlay did not show.
fn hover_inlay(augmentation: &mut Augmentation, doc: &mut PageDocument, fragment: &str) -> Result<String, Error> {
    let (anchor, button) = attached_button(augmentation, fragment)?;
    augmentation.controller.handle(doc, UiEvent::MouseEnter { target: button });
    let shown = augmentation
        .controller
        .widgets(anchor)
        .filter(|w| return doc.is_visible(w.inlay))
        .map(|w| return doc.text_content(w.inlay));
    augmentation.controller.handle(doc, UiEvent::MouseLeave {
        related: None,
        target: button,
    });
    return shown.ok_or_else(|| {
        return Error::AnchorNotFound {
            fragment: fragment.to_string(),
        };
    });
}

/// Click a fragment's button and return the text of its pinned box.
///
/// # Errors
///
/// Returns `Error::AnchorNotFound` if the fragment has no affordance.
fn pin_box(augmentation: &mut Augmentation, doc: &mut PageDocument, fragment: &str) -> Result<String, Error> {
    let not_found = || {
        return Error::AnchorNotFound {
            fragment: fragment.to_string(),
        };
    };
    let (anchor, button) = attached_button(augmentation, fragment)?;

    augmentation.controller.handle(doc, UiEvent::Click { target: button });
    let widgets = augmentation.controller.widgets(anchor).ok_or_else(not_found)?;
    if !doc.is_visible(widgets.pinned) {
        return Err(not_found());
    }
    log::debug!("pinned {} for #{fragment}", doc.describe(widgets.pinned));
    return Ok(doc.text_content(widgets.pinned));
}

/// One line per attached and skipped fragment, a summary, then any captured overlay text.
fn print_text(augmentation: &Augmentation, interactions: &Interactions) {
    for attached in &augmentation.attached {
        println!("ATTACHED #{}  {}", attached.fragment, inlay_summary(&attached.references));
    }
    for skipped in &augmentation.skipped {
        println!("SKIPPED  #{} ({})", skipped.fragment, skipped.reason);
    }
    println!();
    println!(
        "{} annotated, {} skipped on {}",
        augmentation.attached.len(),
        augmentation.skipped.len(),
        augmentation.domain
    );
    for text in [&interactions.hovered, &interactions.pinned].into_iter().flatten() {
        println!();
        println!("{text}");
    }
    return;
}

/// Print the whole run as one JSON document.
///
/// # Errors
///
/// Returns `Error::Json` if the report cannot be serialized.
fn print_json(augmentation: &Augmentation, interactions: Interactions) -> Result<(), Error> {
    let report = AnnotateReport {
        attached: augmentation
            .attached
            .iter()
            .map(|a| {
                return AttachedEntry {
                    fragment: &a.fragment,
                    inlay: inlay_summary(&a.references),
                    references: &a.references,
                    state: augmentation.controller.state(a.anchor),
                };
            })
            .collect(),
        domain: &augmentation.domain,
        hovered: interactions.hovered,
        pinned: interactions.pinned,
        skipped: augmentation
            .skipped
            .iter()
            .map(|s| {
                return SkippedEntry {
                    fragment: &s.fragment,
                    reason: &s.reason,
                };
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
}

/// Print the domain match, search query, search URL and extraction pattern for a host.
///
/// # Errors
///
/// Returns `Error::ConfigLoad` if the config cannot be loaded, or
/// `Error::Pattern` if the extraction pattern does not compile.
pub fn query(config_location: &str, host: &str) -> Result<ExitCode, Error> {
    let config = Config::load(config_location, &HttpTransport)?;
    let Some(domain) = match_domain(&host.to_lowercase(), &config.domains) else {
        println!("{host} is not on a configured domain");
        return Ok(ExitCode::FAILURE);
    };

    let contract = FragmentContract::new(domain)?;
    let query = contract.query(&config.extensions);
    println!("domain:  {domain}");
    println!("query:   {query}");
    match search_url(&config.search.base_url, &config.search.repository, &query) {
        Ok(url) => println!("url:     {url}"),
        Err(e) => println!("url:     ({e})"),
    }
    if let Some(index) = config.index_location(domain) {
        println!("index:   {index}");
    }
    println!("pattern: {}", contract.pattern());
    return Ok(ExitCode::SUCCESS);
}

/// Fetch the fragment index for a page's domain and write it as a pre-built index.
///
/// # Errors
///
/// Returns config, page-URL and fetch errors, or `Error::Io` if the file cannot be written.
pub fn export_index(config_location: &str, page_href: &str, out: &Path) -> Result<ExitCode, Error> {
    let config = Config::load(config_location, &HttpTransport)?;
    let page = PageLocation::parse(page_href)?;
    let Some(domain) = match_domain(page.hostname(), &config.domains) else {
        println!("{} is not on a configured domain", page.hostname());
        return Ok(ExitCode::FAILURE);
    };

    let index = augment::fetch_index(&HttpTransport, &config, domain, &page)?;
    if index.is_empty() {
        log::warn!("no references to {domain} found");
    }
    let path = index_file::write(out, domain, &index)?;
    println!(
        "Wrote {} fragments ({} references) to {}",
        index.len(),
        index.reference_count(),
        path.display()
    );
    return Ok(ExitCode::SUCCESS);
}

/// Crawl a source checkout and write one pre-built index per configured domain it links to.
///
/// # Errors
///
/// Returns config errors, `Error::Io` if `source` is not a directory or an
/// index cannot be written, and `Error::Pattern` if a domain's pattern does not compile.
pub fn index(config_location: &str, source: &Path, out: &Path) -> Result<ExitCode, Error> {
    let config = Config::load(config_location, &HttpTransport)?;
    if !source.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", source.display()),
        )));
    }

    let crawler = Crawler::new(&config.domains)?;
    let indexes = crawler.crawl(source, &config.extensions);
    if indexes.is_empty() {
        log::warn!("no links to {} found under {}", config.domains.join(", "), source.display());
    }
    for (domain, index) in &indexes {
        let path = index_file::write(out, domain, index)?;
        println!(
            "Wrote {} fragments ({} references) to {}",
            index.len(),
            index.reference_count(),
            path.display()
        );
    }
    return Ok(ExitCode::SUCCESS);
}

/// Write a default config, refusing to overwrite an existing file.
///
/// # Errors
///
/// Returns `Error::Io` if the file exists or cannot be written.
pub fn create_config(path: &Path) -> Result<ExitCode, Error> {
    if path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        )));
    }
    Config::write_default(path)?;
    println!("Wrote {}", path.display());
    return Ok(ExitCode::SUCCESS);
}
