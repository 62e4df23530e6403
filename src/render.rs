//! Overlay contents: the affordance button, hover inlay, and pinned box.

use crate::categorize::CategorizedReferences;
use crate::config::{Config, LineAnchor};
use crate::dom::{Document, ElementSpec, NodeId};
use crate::types::Reference;

/// Class of the affordance button inserted after an anchor.
pub const BUTTON_CLASS: &str = "specmonkey-button";

/// Class of the hover inlay.
pub const INLAY_CLASS: &str = "specmonkey-inlay";

/// Class of the pinned detail box.
pub const BOX_CLASS: &str = "specmonkey-box";

/// Class of the close control inside a pinned box.
pub const CLOSE_CLASS: &str = "specmonkey-close";

/// Elements making up a pinned box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinnedBox {
    /// Close control inside the box.
    pub close: NodeId,
    /// The box itself.
    pub root: NodeId,
}

/// Builds overlay elements and code-browser links.
#[derive(Debug, Clone)]
pub struct Renderer {
    /// Code browser root, without trailing slash.
    base_url: String,
    /// `#42` or `#L42`.
    line_anchor: LineAnchor,
    /// Repository (tree) name.
    repository: String,
}

impl Renderer {
    /// Renderer for the configured code browser.
    pub fn from_config(config: &Config) -> Self {
        return Self {
            base_url: config.search.base_url.trim_end_matches('/').to_string(),
            line_anchor: config.line_anchor,
            repository: config.search.repository.clone(),
        };
    }

    /// `<base>/<repository>/source/<filepath>#<line>`, or `#L<line>` when prefixed.
    pub fn code_url(&self, reference: &Reference) -> String {
        let marker = match self.line_anchor {
            LineAnchor::Number => "",
            LineAnchor::Prefixed => "L",
        };
        return format!(
            "{}/{}/source/{}#{marker}{}",
            self.base_url,
            self.repository,
            reference.filepath(),
            reference.line_number()
        );
    }

    /// Affordance button; its text is the reference count.
    pub fn button_spec(references: &CategorizedReferences) -> ElementSpec {
        return ElementSpec {
            class: BUTTON_CLASS,
            href: None,
            tag: "button",
            text: references.total().to_string(),
        };
    }

    /// Build the hidden inlay: one count per non-empty category.
    pub fn build_inlay(doc: &mut impl Document, references: &CategorizedReferences) -> NodeId {
        let inlay = doc.create_element(ElementSpec {
            class: INLAY_CLASS,
            href: None,
            tag: "div",
            text: inlay_summary(references),
        });
        doc.set_visible(inlay, false);
        doc.append_to_body(inlay);
        return inlay;
    }

    /// Build the hidden pinned box: a heading, a close control, then a link
    /// per reference grouped under each non-empty category.
    pub fn build_box(&self, doc: &mut impl Document, fragment: &str, references: &CategorizedReferences) -> PinnedBox {
        let root = doc.create_element(ElementSpec {
            class: BOX_CLASS,
            href: None,
            tag: "div",
            text: format!("#{fragment}"),
        });
        let close = doc.create_element(ElementSpec {
            class: CLOSE_CLASS,
            href: None,
            tag: "button",
            text: "close".to_string(),
        });
        doc.append_child(root, close);

        for (category, refs) in references.non_empty() {
            let section = doc.create_element(ElementSpec {
                class: "specmonkey-section",
                href: None,
                tag: "section",
                text: format!("{} ({})", category.label(), refs.len()),
            });
            for reference in refs {
                let link = doc.create_element(ElementSpec {
                    class: "specmonkey-link",
                    href: Some(self.code_url(reference)),
                    tag: "a",
                    text: format!("{}:{}", reference.filepath(), reference.line_number()),
                });
                doc.append_child(section, link);
            }
            doc.append_child(root, section);
        }

        doc.set_visible(root, false);
        doc.append_to_body(root);
        return PinnedBox { close, root };
    }
}

/// `"Web-Platform Test: 1 | Code: 2"`, skipping empty categories.
pub fn inlay_summary(references: &CategorizedReferences) -> String {
    return references
        .non_empty()
        .map(|(category, refs)| return format!("{}: {}", category.label(), refs.len()))
        .collect::<Vec<_>>()
        .join(" | ");
}
