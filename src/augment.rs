//! The initialization chain: config, domain gate, index fetch, then one
//! affordance per resolvable fragment.
//!
//! Config load, domain matching and index fetching happen strictly before the
//! page is touched, so any error up to that point leaves the document as it was.

use crate::anchor;
use crate::categorize::{CategorizedReferences, categorize};
use crate::config::Config;
use crate::dom::{Document, NodeId};
use crate::domain::match_domain;
use crate::error::Error;
use crate::fetch::{Transport, fetch_index_json, search_url};
use crate::overlay::OverlayController;
use crate::parser::{parse_prebuilt, parse_search_results};
use crate::query::FragmentContract;
use crate::render::Renderer;
use crate::types::{FragmentIndex, PageLocation, Reference};

/// Where to start the chain from.
#[derive(Debug, Clone, Copy)]
pub struct Launch<'a> {
    /// Path or URL of the configuration.
    pub config_location: &'a str,
    /// Overrides the configured pre-built index base URL.
    pub index_url: Option<&'a str>,
    /// `location.href` of the page.
    pub page_href: &'a str,
}

/// A fragment that received an affordance.
#[derive(Debug, Clone)]
pub struct AttachedAnchor {
    /// Element the fragment resolved to.
    pub anchor: NodeId,
    /// Inserted affordance button.
    pub button: NodeId,
    /// Fragment identifier.
    pub fragment: String,
    /// References shown for the anchor.
    pub references: CategorizedReferences,
}

/// A fragment that was left alone, and why.
#[derive(Debug, Clone)]
pub struct SkippedFragment {
    /// Fragment identifier.
    pub fragment: String,
    /// Human-readable reason.
    pub reason: String,
}

/// Outcome of a completed initialization on an in-scope page.
#[derive(Debug)]
pub struct Augmentation {
    /// Fragments with an affordance, in index order.
    pub attached: Vec<AttachedAnchor>,
    /// Owns the widgets and the open-box state for the rest of the page's life.
    pub controller: OverlayController,
    /// Configured domain the page matched.
    pub domain: String,
    /// Fragments without an affordance.
    pub skipped: Vec<SkippedFragment>,
}

/// Run the chain and swallow any error after logging it.
/// `None` means the page was left untouched.
pub fn run(transport: &impl Transport, launch: Launch<'_>, doc: &mut impl Document) -> Option<Augmentation> {
    return match start(transport, launch, doc) {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("initialization aborted: {e}");
            None
        },
    };
}

/// Load the configuration, then run [`initialize`].
///
/// # Errors
///
/// Returns `Error::ConfigLoad` for a missing or invalid configuration,
/// `Error::InvalidPageUrl` for an unusable page URL, and any error from
/// [`initialize`].
pub fn start(
    transport: &impl Transport,
    launch: Launch<'_>,
    doc: &mut impl Document,
) -> Result<Option<Augmentation>, Error> {
    let mut config = Config::load(launch.config_location, transport)?;
    if let Some(index_url) = launch.index_url {
        config.index_url = Some(index_url.to_string());
    }
    let page = PageLocation::parse(launch.page_href)?;
    return initialize(transport, &config, &page, doc);
}

/// Gate on the page's domain, fetch its index, and attach affordances.
///
/// Returns `Ok(None)` when the page is not on a configured domain.
///
/// # Errors
///
/// Returns fetch and parse errors from [`fetch_index`]. The document is not
/// modified when an error is returned.
pub fn initialize(
    transport: &impl Transport,
    config: &Config,
    page: &PageLocation,
    doc: &mut impl Document,
) -> Result<Option<Augmentation>, Error> {
    let Some(domain) = match_domain(page.hostname(), &config.domains) else {
        log::info!("{} is not on a configured domain", page.hostname());
        return Ok(None);
    };
    log::info!("{} matched {domain}", page.hostname());

    let index = fetch_index(transport, config, domain, page)?;
    return Ok(Some(augment_page(config, domain, &index, doc)));
}

/// Fetch the fragment index for a domain: the pre-built one when
/// `index_url` is configured, otherwise a live search.
///
/// # Errors
///
/// Returns `Error::IndexFetch` on transport failure, `Error::Json` for a body
/// that is not JSON, `Error::InvalidResponseFormat` for a non-object payload,
/// and `Error::Pattern` if the extraction pattern does not compile.
pub fn fetch_index(
    transport: &impl Transport,
    config: &Config,
    domain: &str,
    page: &PageLocation,
) -> Result<FragmentIndex, Error> {
    if let Some(url) = config.index_location(domain) {
        log::info!("fetching pre-built index {url}");
        let payload = fetch_index_json(transport, &url)?;
        return parse_prebuilt(&payload);
    }

    let contract = FragmentContract::new(domain)?;
    let query = contract.query(&config.extensions);
    let url = search_url(&config.search.base_url, &config.search.repository, &query).map_err(|reason| {
        return Error::IndexFetch {
            reason,
            url: config.search.base_url.clone(),
        };
    })?;
    log::info!("searching {url}");
    let payload = fetch_index_json(transport, &url)?;
    return parse_search_results(&contract, page, &payload);
}

/// Attach an affordance for every fragment of the index that resolves to an
/// anchor. Fragments that do not resolve are logged and skipped.
pub fn augment_page(
    config: &Config,
    domain: &str,
    index: &FragmentIndex,
    doc: &mut impl Document,
) -> Augmentation {
    let mut augmentation = Augmentation {
        attached: Vec::new(),
        controller: OverlayController::new(Renderer::from_config(config)),
        domain: domain.to_string(),
        skipped: Vec::new(),
    };

    for (fragment, references) in index.iter() {
        match attach_fragment(&mut augmentation.controller, doc, fragment, references) {
            Ok(Some(attached)) => augmentation.attached.push(attached),
            Ok(None) => augmentation.skipped.push(SkippedFragment {
                fragment: fragment.to_string(),
                reason: "anchor already has an affordance".to_string(),
            }),
            Err(e) => {
                log::warn!("{e}");
                augmentation.skipped.push(SkippedFragment {
                    fragment: fragment.to_string(),
                    reason: e.to_string(),
                });
            },
        }
    }

    log::info!(
        "{}: {} anchors annotated, {} fragments skipped",
        augmentation.domain,
        augmentation.attached.len(),
        augmentation.skipped.len()
    );
    return augmentation;
}

/// Resolve, categorize and attach one fragment.
///
/// # Errors
///
/// Returns `Error::AnchorNotFound` if no element carries the fragment as id or name.
fn attach_fragment(
    controller: &mut OverlayController,
    doc: &mut impl Document,
    fragment: &str,
    references: &[Reference],
) -> Result<Option<AttachedAnchor>, Error> {
    let anchor = anchor::resolve(doc, fragment).ok_or_else(|| {
        return Error::AnchorNotFound {
            fragment: fragment.to_string(),
        };
    })?;
    let categorized = categorize(references);
    let Some(button) = controller.attach(doc, anchor, fragment, categorized.clone()) else {
        return Ok(None);
    };
    return Ok(Some(AttachedAnchor {
        anchor,
        button,
        fragment: fragment.to_string(),
        references: categorized,
    }));
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dom::PageDocument;
    use crate::fetch::StubTransport;
    use crate::overlay::{AnchorState, UiEvent};

    const CONFIG_URL: &str = "https://conf.local/specmonkey.json";
    const PAGE: &str = r#"<h2 id="sec-foo">Foo</h2><a name="legacy">L</a><h2 id="sec-bar">Bar</h2>"#;
    const PAGE_URL: &str = "https://docs.spec.example/draft/index.html?x=1";

    fn launch(index_url: Option<&str>) -> Launch<'_> {
        Launch {
            config_location: CONFIG_URL,
            index_url,
            page_href: PAGE_URL,
        }
    }

    fn prebuilt() -> String {
        json!({
            "sec-foo": [
                {"url": "https://docs.spec.example/draft/#sec-foo", "filepath": "dom/Foo.cpp", "line_number": 3},
                {"url": "https://docs.spec.example/draft/#sec-foo", "filepath": "testing/web-platform/a.html", "line_number": 9}
            ],
            "legacy": [
                {"url": "https://docs.spec.example/draft/#legacy", "filepath": "dom/test_legacy.js", "line_number": 1}
            ],
            "gone": [
                {"url": "https://docs.spec.example/draft/#gone", "filepath": "dom/Gone.cpp", "line_number": 5}
            ]
        })
        .to_string()
    }

    fn page() -> PageDocument {
        PageDocument::from_html(PAGE).unwrap()
    }

    #[test]
    fn prebuilt_index_attaches_resolvable_fragments() {
        let transport = StubTransport::default()
            .with_body(CONFIG_URL, r#"{"domains": ["spec.example"], "index_url": "https://idx.local"}"#)
            .with_body("https://idx.local/spec.example.json", &prebuilt());
        let mut doc = page();

        let outcome = run(&transport, launch(None), &mut doc).unwrap();
        assert_eq!(outcome.domain, "spec.example");
        let attached: Vec<&str> = outcome.attached.iter().map(|a| a.fragment.as_str()).collect();
        assert_eq!(attached, ["legacy", "sec-foo"]);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].fragment, "gone");

        let foo = doc.element_by_id("sec-foo").unwrap();
        assert_eq!(outcome.controller.state(foo), AnchorState::AffordanceAttached);
        assert!(doc.has_class(doc.next_sibling(foo).unwrap(), crate::render::BUTTON_CLASS));
    }

    #[test]
    fn search_results_are_parsed_against_the_page() {
        let config = r#"{"domains": ["spec.example"], "extensions": ["cpp"]}"#;
        let contract = FragmentContract::new("spec.example").unwrap();
        let search = search_url("https://searchfox.org", "mozilla-central", &contract.query(&["cpp".to_string()])).unwrap();
        let payload = json!({
            "*timedout*": false,
            "normal": {
                "Textual Occurrences": [
                    {"path": "dom/Bar.cpp", "lines": [
                        {"lno": 12, "line": "// https://spec.example/draft/#sec-bar"},
                        {"lno": 13, "line": "// nothing here"}
                    ]}
                ]
            }
        });
        let transport = StubTransport::default()
            .with_body(CONFIG_URL, config)
            .with_body(&search, &payload.to_string());
        let mut doc = page();

        let outcome = run(&transport, launch(None), &mut doc).unwrap();
        assert_eq!(outcome.attached.len(), 1);
        let bar = &outcome.attached[0];
        assert_eq!(bar.fragment, "sec-bar");
        assert_eq!(bar.references.total(), 1);
        let reference = &bar.references.get(crate::categorize::Category::Code)[0];
        assert_eq!(reference.url(), "https://docs.spec.example/draft/index.html#sec-bar");
        assert_eq!(reference.line_number(), 12);
    }

    #[test]
    fn index_url_override_wins() {
        let transport = StubTransport::default()
            .with_body(CONFIG_URL, r#"{"domains": ["spec.example"]}"#)
            .with_body("file:///srv/idx/spec.example.json", &prebuilt());
        let mut doc = page();
        let outcome = run(&transport, launch(Some("file:///srv/idx")), &mut doc).unwrap();
        assert_eq!(outcome.attached.len(), 2);
        assert_eq!(transport.requests.borrow().len(), 2);
    }

    #[test]
    fn out_of_scope_page_fetches_nothing_else() {
        let transport = StubTransport::default().with_body(CONFIG_URL, r#"{"domains": ["other.org"]}"#);
        let mut doc = page();
        let before = doc.node_count();
        assert!(run(&transport, launch(None), &mut doc).is_none());
        assert_eq!(transport.requests.borrow().as_slice(), [CONFIG_URL]);
        assert_eq!(doc.node_count(), before);
    }

    #[test]
    fn malformed_config_aborts_without_touching_the_page() {
        let transport = StubTransport::default().with_body(CONFIG_URL, r#"{"extensions": ["cpp"]}"#);
        let mut doc = page();
        let before = doc.node_count();

        let err = start(&transport, launch(None), &mut doc).unwrap_err();
        assert!(matches!(err, Error::ConfigLoad { .. }), "{err}");
        assert!(run(&transport, launch(None), &mut doc).is_none());
        assert_eq!(doc.node_count(), before);
        assert_eq!(doc.document_listener_count(), 0);
    }

    #[test]
    fn index_fetch_failure_aborts_without_touching_the_page() {
        let transport = StubTransport::default()
            .with_body(CONFIG_URL, r#"{"domains": ["spec.example"], "index_url": "https://idx.local"}"#)
            .with_status("https://idx.local/spec.example.json", 503);
        let mut doc = page();
        let before = doc.node_count();

        let err = start(&transport, launch(None), &mut doc).unwrap_err();
        assert!(matches!(err, Error::IndexFetch { .. }), "{err}");
        assert_eq!(doc.node_count(), before);
    }

    #[test]
    fn non_object_index_is_rejected() {
        let transport = StubTransport::default()
            .with_body(CONFIG_URL, r#"{"domains": ["spec.example"], "index_url": "https://idx.local"}"#)
            .with_body("https://idx.local/spec.example.json", "[1, 2]");
        let mut doc = page();
        let err = start(&transport, launch(None), &mut doc).unwrap_err();
        assert!(matches!(err, Error::InvalidResponseFormat { found: "array" }), "{err}");
    }

    #[test]
    fn second_run_on_same_page_attaches_nothing() {
        let transport = StubTransport::default()
            .with_body(CONFIG_URL, r#"{"domains": ["spec.example"], "index_url": "https://idx.local"}"#)
            .with_body("https://idx.local/spec.example.json", &prebuilt());
        let mut doc = page();
        run(&transport, launch(None), &mut doc).unwrap();
        let nodes = doc.node_count();

        let again = run(&transport, launch(None), &mut doc).unwrap();
        assert!(again.attached.is_empty());
        assert_eq!(again.skipped.len(), 3);
        assert_eq!(doc.node_count(), nodes);
    }

    #[test]
    fn controller_drives_attached_buttons() {
        let transport = StubTransport::default()
            .with_body(CONFIG_URL, r#"{"domains": ["spec.example"], "index_url": "https://idx.local"}"#)
            .with_body("https://idx.local/spec.example.json", &prebuilt());
        let mut doc = page();
        let mut outcome = run(&transport, launch(None), &mut doc).unwrap();
        let foo = outcome.attached.iter().find(|a| a.fragment == "sec-foo").unwrap().clone();

        assert!(outcome.controller.handle(&mut doc, UiEvent::Click { target: foo.button }));
        assert_eq!(outcome.controller.open_anchor(), Some(foo.anchor));
        let pinned = outcome.controller.widgets(foo.anchor).unwrap().pinned;
        assert!(doc.text_content(pinned).contains("Web-Platform Test (1)"));
    }
}
