//! The DOM capability the overlay engine runs against, and an in-memory page.
//!
//! `Document` is the only way the engine touches a page: lookups by id and
//! name, element creation and insertion, visibility, positioning, and
//! listener registration. `PageDocument` implements it over a snapshot of the
//! page's anchor elements, which is enough to drive and inspect the engine
//! without a browser.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use regex::Regex;
use serde::Serialize;

use crate::error::Error;

/// Vertical distance between consecutive anchors in the synthetic layout.
const ANCHOR_SPACING: f64 = 24.0;

/// Width of an anchor box in the synthetic layout.
const ANCHOR_WIDTH: f64 = 240.0;

/// Height of any element box in the synthetic layout.
const LINE_HEIGHT: f64 = 20.0;

/// Horizontal gap between an anchor and an element inserted after it.
const INLINE_GAP: f64 = 4.0;

/// Opaque handle to an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

/// Handle to a registered event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// DOM events the overlay reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `click`
    Click,
    /// `mouseenter`
    MouseEnter,
    /// `mouseleave`
    MouseLeave,
}

/// Where a listener is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerScope {
    /// The whole document.
    Document,
    /// A single element.
    Element(NodeId),
}

/// Element box in page coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    /// Box height.
    pub height: f64,
    /// Box width.
    pub width: f64,
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
}

impl Rect {
    /// Bottom edge.
    pub fn bottom(&self) -> f64 {
        return self.y + self.height;
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        return self.x + self.width;
    }
}

/// Description of an element to create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSpec {
    /// CSS class; overlays are recognised by it.
    pub class: &'static str,
    /// Link target for anchors.
    pub href: Option<String>,
    /// Tag name.
    pub tag: &'static str,
    /// Text content.
    pub text: String,
}

/// The page as seen by the overlay engine.
pub trait Document {
    /// Attach a listener and return its handle.
    fn add_listener(&mut self, scope: ListenerScope, kind: EventKind) -> ListenerId;
    /// Append `child` as the last child of `parent`.
    fn append_child(&mut self, parent: NodeId, child: NodeId);
    /// Append a node to the document body.
    fn append_to_body(&mut self, node: NodeId);
    /// Current box of an element in page coordinates.
    fn bounding_box(&self, node: NodeId) -> Rect;
    /// Whether `node` is `ancestor` or one of its descendants.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool;
    /// Create a detached element.
    fn create_element(&mut self, spec: ElementSpec) -> NodeId;
    /// Element whose id equals `id`.
    fn element_by_id(&self, id: &str) -> Option<NodeId>;
    /// First element, in document order, whose `name` attribute equals `name`.
    fn first_element_by_name(&self, name: &str) -> Option<NodeId>;
    /// Whether the element carries `class`.
    fn has_class(&self, node: NodeId, class: &str) -> bool;
    /// Insert `node` immediately after `reference`, as its next sibling.
    fn insert_after(&mut self, reference: NodeId, node: NodeId);
    /// Whether the element is displayed.
    fn is_visible(&self, node: NodeId) -> bool;
    /// Move an absolutely positioned element to page coordinates.
    fn move_to(&mut self, node: NodeId, x: f64, y: f64);
    /// Sibling immediately following `node`.
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;
    /// Detach a listener. Unknown handles are ignored.
    fn remove_listener(&mut self, id: ListenerId);
    /// Show or hide an element.
    fn set_visible(&mut self, node: NodeId, visible: bool);
}

/// One element of a `PageDocument`.
#[derive(Debug, Clone, Default)]
struct Node {
    /// Child elements in order.
    children: Vec<NodeId>,
    /// `class` attribute.
    class: Option<String>,
    /// `href` attribute.
    href: Option<String>,
    /// `id` attribute.
    id: Option<String>,
    /// `name` attribute.
    name: Option<String>,
    /// Parent element; `None` for the body and detached elements.
    parent: Option<NodeId>,
    /// Box in page coordinates.
    rect: Rect,
    /// Tag name.
    tag: String,
    /// Text content of this element alone.
    text: String,
    /// Display state.
    visible: bool,
}

/// In-memory page holding the anchor elements of an HTML snapshot.
///
/// Every element with an `id` or `name` attribute becomes a child of the body,
/// in document order, laid out one per line. Nesting and text are not kept.
#[derive(Debug, Clone)]
pub struct PageDocument {
    /// Active listeners.
    listeners: BTreeMap<ListenerId, (ListenerScope, EventKind)>,
    /// Counter for listener handles.
    next_listener: u64,
    /// Arena of elements; index 0 is the body.
    nodes: Vec<Node>,
}

/// The body element.
const BODY: NodeId = NodeId(0);

impl Default for PageDocument {
    fn default() -> Self {
        return Self {
            listeners: BTreeMap::new(),
            next_listener: 0,
            nodes: vec![Node {
                tag: "body".to_string(),
                visible: true,
                ..Node::default()
            }],
        };
    }
}

impl PageDocument {
    /// Build a page from HTML, keeping every element with an `id` or `name`.
    ///
    /// Comments, CDATA sections and the bodies of `script` and `style`
    /// elements are not markup and are dropped before tags are read. A `>`
    /// inside a quoted attribute value does not end the tag.
    ///
    /// # Errors
    ///
    /// Returns `Error::Pattern` if the tag or attribute pattern fails to compile.
    pub fn from_html(html: &str) -> Result<Self, Error> {
        let raw_text = Regex::new(
            r"(?is)<!--.*?(?:-->|$)|<!\[CDATA\[.*?(?:\]\]>|$)|<script\b.*?(?:</script\s*>|$)|<style\b.*?(?:</style\s*>|$)",
        )?;
        let tag_pattern = Regex::new(r#"<([A-Za-z][\w-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#)?;
        let attr_pattern = Regex::new(r#"([\w:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)?;
        let markup = raw_text.replace_all(html, "");
        let mut page = Self::default();

        for tag in tag_pattern.captures_iter(&markup) {
            let name = tag.get(1).map_or("", |m| return m.as_str()).to_lowercase();
            let attrs = tag.get(2).map_or("", |m| return m.as_str());
            let mut node = Node {
                tag: name,
                visible: true,
                ..Node::default()
            };
            for attr in attr_pattern.captures_iter(attrs) {
                let key = attr.get(1).map_or("", |m| return m.as_str()).to_lowercase();
                let value = attr
                    .get(2)
                    .or_else(|| return attr.get(3))
                    .or_else(|| return attr.get(4))
                    .map_or("", |m| return m.as_str())
                    .to_string();
                match key.as_str() {
                    "id" => node.id = Some(value),
                    "name" => node.name = Some(value),
                    "class" => node.class = Some(value),
                    "href" => node.href = Some(value),
                    _ => {},
                }
            }
            if node.id.is_some() || node.name.is_some() {
                page.push_anchor(node);
            }
        }

        return Ok(page);
    }

    /// Append a parsed anchor to the body on the next layout line.
    fn push_anchor(&mut self, mut node: Node) {
        let ordinal = self.node(BODY).map_or(0, |body| return body.children.len());
        let line = f64::from(u32::try_from(ordinal).unwrap_or(u32::MAX));
        node.rect = Rect {
            height: LINE_HEIGHT,
            width: ANCHOR_WIDTH,
            x: 0.0,
            y: line * ANCHOR_SPACING,
        };
        node.parent = Some(BODY);
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        if let Some(body) = self.node_mut(BODY) {
            body.children.push(id);
        }
        return;
    }

    /// Element by handle.
    fn node(&self, id: NodeId) -> Option<&Node> {
        return self.nodes.get(id.0);
    }

    /// Mutable element by handle.
    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        return self.nodes.get_mut(id.0);
    }

    /// Remove `node` from its parent's children, if attached.
    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.node(node).and_then(|n| return n.parent) else {
            return;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|c| return *c != node);
        }
        if let Some(n) = self.node_mut(node) {
            n.parent = None;
        }
        return;
    }

    /// Number of elements, body included. Grows only when the page is mutated.
    #[cfg(test)]
    pub fn node_count(&self) -> usize {
        return self.nodes.len();
    }

    /// Number of active listeners attached at document scope.
    #[cfg(test)]
    pub fn document_listener_count(&self) -> usize {
        return self
            .listeners
            .values()
            .filter(|(scope, _)| return *scope == ListenerScope::Document)
            .count();
    }

    /// Number of active listeners attached to one element.
    #[cfg(test)]
    pub fn element_listener_count(&self, node: NodeId) -> usize {
        return self
            .listeners
            .values()
            .filter(|(scope, _)| return *scope == ListenerScope::Element(node))
            .count();
    }

    /// Link target of an element.
    #[cfg(test)]
    pub fn href(&self, node: NodeId) -> Option<&str> {
        return self.node(node).and_then(|n| return n.href.as_deref());
    }

    /// Child elements in order.
    #[cfg(test)]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        return self.node(node).map_or(&[], |n| return n.children.as_slice());
    }

    /// Opening tag of an element with its identifying attributes, for logs.
    pub fn describe(&self, node: NodeId) -> String {
        let Some(n) = self.node(node) else {
            return String::from("<detached>");
        };
        let mut out = format!("<{}", n.tag);
        for (key, value) in [("id", &n.id), ("name", &n.name), ("class", &n.class), ("href", &n.href)] {
            if let Some(v) = value {
                let _ = write!(out, " {key}=\"{v}\"");
            }
        }
        out.push('>');
        return out;
    }

    /// Text of an element and its descendants, one element per line.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut lines = Vec::new();
        self.collect_text(node, &mut lines);
        return lines.join("\n");
    }

    /// Depth-first text collection for `text_content`.
    fn collect_text(&self, node: NodeId, lines: &mut Vec<String>) {
        let Some(n) = self.node(node) else {
            return;
        };
        if !n.text.is_empty() {
            lines.push(n.text.clone());
        }
        for child in &n.children {
            self.collect_text(*child, lines);
        }
        return;
    }
}

impl Document for PageDocument {
    fn add_listener(&mut self, scope: ListenerScope, kind: EventKind) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener = self.next_listener.saturating_add(1);
        self.listeners.insert(id, (scope, kind));
        return id;
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || self.node(parent).is_none() || self.node(child).is_none() {
            return;
        }
        self.detach(child);
        if let Some(p) = self.node_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
        return;
    }

    fn append_to_body(&mut self, node: NodeId) {
        self.append_child(BODY, node);
        return;
    }

    fn bounding_box(&self, node: NodeId) -> Rect {
        return self.node(node).map(|n| return n.rect).unwrap_or_default();
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).and_then(|n| return n.parent);
        }
        return false;
    }

    fn create_element(&mut self, spec: ElementSpec) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            class: Some(spec.class.to_string()),
            href: spec.href,
            rect: Rect {
                height: LINE_HEIGHT,
                width: LINE_HEIGHT,
                x: 0.0,
                y: 0.0,
            },
            tag: spec.tag.to_string(),
            text: spec.text,
            visible: true,
            ..Node::default()
        });
        return id;
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        return self
            .nodes
            .iter()
            .position(|n| return n.parent.is_some() && n.id.as_deref() == Some(id))
            .map(NodeId);
    }

    fn first_element_by_name(&self, name: &str) -> Option<NodeId> {
        return self
            .nodes
            .iter()
            .position(|n| return n.parent.is_some() && n.name.as_deref() == Some(name))
            .map(NodeId);
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        return self
            .node(node)
            .and_then(|n| return n.class.as_deref())
            .is_some_and(|classes| return classes.split_whitespace().any(|c| return c == class));
    }

    fn insert_after(&mut self, reference: NodeId, node: NodeId) {
        if reference == node || self.node(node).is_none() {
            return;
        }
        let Some(parent) = self.node(reference).and_then(|n| return n.parent) else {
            return;
        };
        let anchor_rect = self.bounding_box(reference);
        self.detach(node);
        if let Some(p) = self.node_mut(parent) {
            let at = p.children.iter().position(|c| return *c == reference).map_or(p.children.len(), |i| {
                return i.saturating_add(1);
            });
            p.children.insert(at, node);
        }
        if let Some(n) = self.node_mut(node) {
            n.parent = Some(parent);
            n.rect.x = anchor_rect.right() + INLINE_GAP;
            n.rect.y = anchor_rect.y;
        }
        return;
    }

    fn is_visible(&self, node: NodeId) -> bool {
        return self.node(node).is_some_and(|n| return n.visible);
    }

    fn move_to(&mut self, node: NodeId, x: f64, y: f64) {
        if let Some(n) = self.node_mut(node) {
            n.rect.x = x;
            n.rect.y = y;
        }
        return;
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.node(node)?.parent?;
        let siblings = &self.node(parent)?.children;
        let at = siblings.iter().position(|c| return *c == node)?;
        return siblings.get(at.saturating_add(1)).copied();
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
        return;
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) {
        if let Some(n) = self.node_mut(node) {
            n.visible = visible;
        }
        return;
    }
}
