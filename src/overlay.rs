//! Interactive overlay state: one affordance button per anchor, a hover inlay,
//! and a click-to-pin box of which at most one is open on the page.
//!
//! Per anchor the lifecycle is `Uninitialized -> AffordanceAttached -> WidgetsBuilt`.
//! The inlay and box are built on first hover or click and reused afterwards.
//! The controller is the single owner of the currently open box; opening one
//! force-closes the previous one, and exactly one document click listener
//! exists while a box is open.

use std::collections::HashMap;

use serde::Serialize;

use crate::categorize::CategorizedReferences;
use crate::dom::{Document, EventKind, ListenerId, ListenerScope, NodeId};
use crate::render::{BUTTON_CLASS, Renderer};

/// Gap between the button and an overlay placed next to or under it.
const POPUP_GAP: f64 = 4.0;

/// Lifecycle state of one anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorState {
    /// The affordance button exists; inlay and box are not built yet.
    AffordanceAttached,
    /// Nothing attached to this anchor.
    Uninitialized,
    /// Inlay and box are built and memoized.
    WidgetsBuilt,
}

/// A UI event delivered to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    /// `click` on `target`, after which the event reaches the document.
    Click {
        /// Element that was clicked.
        target: NodeId,
    },
    /// `mouseenter` on `target`.
    MouseEnter {
        /// Element the pointer entered.
        target: NodeId,
    },
    /// `mouseleave` on `target`; `related` is where the pointer went.
    MouseLeave {
        /// Element where the pointer went, if any.
        related: Option<NodeId>,
        /// Element the pointer left.
        target: NodeId,
    },
}

/// Lazily built overlay elements of one anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Widgets {
    /// Close control inside the pinned box.
    pub close: NodeId,
    /// Hover inlay.
    pub inlay: NodeId,
    /// Pinned box.
    pub pinned: NodeId,
}

/// What an overlay element is, for event routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Affordance button.
    Button,
    /// Close control of a box.
    Close,
    /// Hover inlay.
    Inlay,
}

/// Per-anchor UI state.
#[derive(Debug)]
struct AnchorWidgetState {
    /// Affordance inserted after the anchor.
    button: NodeId,
    /// Fragment the anchor was resolved from.
    fragment: String,
    /// References shown by the widgets.
    references: CategorizedReferences,
    /// Built on first interaction.
    widgets: Option<Widgets>,
}

/// The pinned box currently shown and its outside-click listener.
#[derive(Debug, Clone, Copy)]
struct OpenBox {
    /// Anchor whose box is open.
    anchor: NodeId,
    /// Document click listener registered when the box opened.
    listener: ListenerId,
}

/// Owner of every overlay on the page.
#[derive(Debug)]
pub struct OverlayController {
    /// Widget state keyed by anchor. Entries are never evicted.
    anchors: HashMap<NodeId, AnchorWidgetState>,
    /// At most one open box on the page.
    open: Option<OpenBox>,
    /// Builds inlay and box contents.
    renderer: Renderer,
    /// Overlay element to owning anchor and role.
    roles: HashMap<NodeId, (NodeId, Role)>,
}

impl OverlayController {
    /// Controller with no anchors and no open box.
    pub fn new(renderer: Renderer) -> Self {
        return Self {
            anchors: HashMap::new(),
            open: None,
            renderer,
            roles: HashMap::new(),
        };
    }

    /// Insert an affordance button right after `anchor`.
    ///
    /// Returns the button, or `None` when the anchor already has one, either
    /// from this controller or because the next sibling is an affordance.
    pub fn attach(
        &mut self,
        doc: &mut impl Document,
        anchor: NodeId,
        fragment: &str,
        references: CategorizedReferences,
    ) -> Option<NodeId> {
        if self.anchors.contains_key(&anchor) {
            return None;
        }
        if let Some(next) = doc.next_sibling(anchor)
            && doc.has_class(next, BUTTON_CLASS)
        {
            log::debug!("#{fragment} already has an affordance");
            return None;
        }

        let button = doc.create_element(Renderer::button_spec(&references));
        doc.insert_after(anchor, button);
        for kind in [EventKind::MouseEnter, EventKind::MouseLeave, EventKind::Click] {
            doc.add_listener(ListenerScope::Element(button), kind);
        }

        self.roles.insert(button, (anchor, Role::Button));
        self.anchors.insert(anchor, AnchorWidgetState {
            button,
            fragment: fragment.to_string(),
            references,
            widgets: None,
        });
        return Some(button);
    }

    /// Lifecycle state of an anchor.
    pub fn state(&self, anchor: NodeId) -> AnchorState {
        return match self.anchors.get(&anchor) {
            None => AnchorState::Uninitialized,
            Some(state) if state.widgets.is_some() => AnchorState::WidgetsBuilt,
            Some(_) => AnchorState::AffordanceAttached,
        };
    }

    /// Affordance button of an anchor.
    pub fn button(&self, anchor: NodeId) -> Option<NodeId> {
        return self.anchors.get(&anchor).map(|s| return s.button);
    }

    /// Built widgets of an anchor, if any interaction has happened yet.
    pub fn widgets(&self, anchor: NodeId) -> Option<Widgets> {
        return self.anchors.get(&anchor).and_then(|s| return s.widgets);
    }

    /// Anchor whose box is currently pinned open.
    pub fn open_anchor(&self) -> Option<NodeId> {
        return self.open.map(|o| return o.anchor);
    }

    /// Route one event. Returns whether it changed or was consumed by an overlay.
    pub fn handle(&mut self, doc: &mut impl Document, event: UiEvent) -> bool {
        return match event {
            UiEvent::Click { target } => self.on_click(doc, target),
            UiEvent::MouseEnter { target } => self.on_mouse_enter(doc, target),
            UiEvent::MouseLeave { target, related } => self.on_mouse_leave(doc, target, related),
        };
    }

    /// Build inlay and box for an anchor once; later calls return the same elements.
    fn ensure_widgets(&mut self, doc: &mut impl Document, anchor: NodeId) -> Option<Widgets> {
        let state = self.anchors.get_mut(&anchor)?;
        if let Some(built) = state.widgets {
            return Some(built);
        }

        let inlay = Renderer::build_inlay(doc, &state.references);
        let pinned = self.renderer.build_box(doc, &state.fragment, &state.references);
        let built = Widgets {
            close: pinned.close,
            inlay,
            pinned: pinned.root,
        };
        state.widgets = Some(built);

        doc.add_listener(ListenerScope::Element(inlay), EventKind::MouseLeave);
        doc.add_listener(ListenerScope::Element(pinned.close), EventKind::Click);
        self.roles.insert(inlay, (anchor, Role::Inlay));
        self.roles.insert(pinned.close, (anchor, Role::Close));
        log::debug!("built widgets for #{}", state.fragment);
        return Some(built);
    }

    /// Clicks on a button toggle its box, clicks on a close control close it,
    /// anything else is an outside-click candidate.
    fn on_click(&mut self, doc: &mut impl Document, target: NodeId) -> bool {
        match self.roles.get(&target).copied() {
            Some((anchor, Role::Button)) => {
                self.toggle(doc, anchor);
                return true;
            },
            Some((anchor, Role::Close)) => {
                self.close(doc, anchor);
                return true;
            },
            Some((_, Role::Inlay)) | None => {},
        }
        return self.on_document_click(doc, target);
    }

    /// Document-level click: dismiss the open box unless the click landed inside it.
    fn on_document_click(&mut self, doc: &mut impl Document, target: NodeId) -> bool {
        let Some(open) = self.open else {
            return false;
        };
        let Some(widgets) = self.widgets(open.anchor) else {
            return false;
        };
        if doc.contains(widgets.pinned, target) {
            return false;
        }
        self.close(doc, open.anchor);
        return true;
    }

    /// Show the inlay next to the button; the open box is left alone.
    fn on_mouse_enter(&mut self, doc: &mut impl Document, target: NodeId) -> bool {
        let Some((anchor, Role::Button)) = self.roles.get(&target).copied() else {
            return false;
        };
        let Some(widgets) = self.ensure_widgets(doc, anchor) else {
            return false;
        };
        let rect = doc.bounding_box(target);
        doc.move_to(widgets.inlay, rect.right() + POPUP_GAP, rect.y);
        doc.set_visible(widgets.inlay, true);
        return true;
    }

    /// Hide the inlay when the pointer leaves the button for anything but the
    /// inlay, or leaves the inlay for anything but its button.
    fn on_mouse_leave(&self, doc: &mut impl Document, target: NodeId, related: Option<NodeId>) -> bool {
        let Some((anchor, role)) = self.roles.get(&target).copied() else {
            return false;
        };
        let (Some(widgets), Some(button)) = (self.widgets(anchor), self.button(anchor)) else {
            return false;
        };
        let keep = match role {
            Role::Button => related.is_some_and(|r| return doc.contains(widgets.inlay, r)),
            Role::Inlay => related == Some(button),
            Role::Close => return false,
        };
        if !keep {
            doc.set_visible(widgets.inlay, false);
        }
        return true;
    }

    /// Hide the inlay, then open the box if it is closed or close it if it is open.
    fn toggle(&mut self, doc: &mut impl Document, anchor: NodeId) {
        let Some(widgets) = self.ensure_widgets(doc, anchor) else {
            return;
        };
        doc.set_visible(widgets.inlay, false);
        if self.open_anchor() == Some(anchor) {
            self.close(doc, anchor);
        } else {
            self.open_box(doc, anchor, widgets);
        }
        return;
    }

    /// Force-close any other open box, then pin this one under its button.
    fn open_box(&mut self, doc: &mut impl Document, anchor: NodeId, widgets: Widgets) {
        if let Some(previous) = self.open.take() {
            self.hide_box(doc, previous);
        }
        let Some(button) = self.button(anchor) else {
            return;
        };
        let rect = doc.bounding_box(button);
        doc.move_to(widgets.pinned, rect.x, rect.bottom() + POPUP_GAP);
        doc.set_visible(widgets.pinned, true);
        let listener = doc.add_listener(ListenerScope::Document, EventKind::Click);
        self.open = Some(OpenBox { anchor, listener });
        return;
    }

    /// Hide an anchor's box and drop the outside-click listener if it was the open one.
    fn close(&mut self, doc: &mut impl Document, anchor: NodeId) {
        if self.open_anchor() == Some(anchor)
            && let Some(open) = self.open.take()
        {
            self.hide_box(doc, open);
        } else if let Some(widgets) = self.widgets(anchor) {
            doc.set_visible(widgets.pinned, false);
        }
        return;
    }

    /// Hide the box of a formerly open entry and unregister its listener.
    fn hide_box(&self, doc: &mut impl Document, open: OpenBox) {
        if let Some(widgets) = self.widgets(open.anchor) {
            doc.set_visible(widgets.pinned, false);
        }
        doc.remove_listener(open.listener);
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::categorize;
    use crate::config::Config;
    use crate::dom::PageDocument;
    use crate::types::Reference;

    const PAGE: &str = r#"<h2 id="a">A</h2><h2 id="b">B</h2><h2 id="c">C</h2><p id="other">x</p>"#;

    struct Fixture {
        controller: OverlayController,
        page: PageDocument,
    }

    impl Fixture {
        fn new() -> Self {
            let mut page = PageDocument::from_html(PAGE).unwrap();
            let mut controller = OverlayController::new(Renderer::from_config(&Config::default()));
            for fragment in ["a", "b", "c"] {
                let anchor = page.element_by_id(fragment).unwrap();
                let refs = vec![
                    Reference::new(format!("https://x.org/#{fragment}"), "dom/Foo.cpp", 1).unwrap(),
                    Reference::new(format!("https://x.org/#{fragment}"), "dom/test_foo.html", 2).unwrap(),
                ];
                controller.attach(&mut page, anchor, fragment, categorize(&refs)).unwrap();
            }
            Self { controller, page }
        }

        fn anchor(&self, fragment: &str) -> NodeId {
            self.page.element_by_id(fragment).unwrap()
        }

        fn button(&self, fragment: &str) -> NodeId {
            self.controller.button(self.anchor(fragment)).unwrap()
        }

        fn click(&mut self, target: NodeId) -> bool {
            self.controller.handle(&mut self.page, UiEvent::Click { target })
        }

        fn visible_boxes(&self) -> usize {
            ["a", "b", "c"]
                .iter()
                .filter_map(|f| self.controller.widgets(self.anchor(f)))
                .filter(|w| self.page.is_visible(w.pinned))
                .count()
        }
    }

    #[test]
    fn attach_inserts_button_after_anchor() {
        let fx = Fixture::new();
        let anchor = fx.anchor("a");
        assert_eq!(fx.page.next_sibling(anchor), Some(fx.button("a")));
        assert_eq!(fx.controller.state(anchor), AnchorState::AffordanceAttached);
        assert_eq!(fx.page.element_listener_count(fx.button("a")), 3);
        assert_eq!(fx.controller.state(fx.anchor("other")), AnchorState::Uninitialized);
    }

    #[test]
    fn attach_is_idempotent() {
        let mut fx = Fixture::new();
        let anchor = fx.anchor("a");
        let nodes = fx.page.node_count();
        assert!(fx.controller.attach(&mut fx.page, anchor, "a", CategorizedReferences::default()).is_none());

        // A second controller sees the existing affordance on the page.
        let mut fresh = OverlayController::new(Renderer::from_config(&Config::default()));
        assert!(fresh.attach(&mut fx.page, anchor, "a", CategorizedReferences::default()).is_none());
        assert_eq!(fx.page.node_count(), nodes);
    }

    #[test]
    fn widgets_are_built_lazily_and_memoized() {
        let mut fx = Fixture::new();
        let button = fx.button("a");
        assert!(fx.controller.widgets(fx.anchor("a")).is_none());

        fx.controller.handle(&mut fx.page, UiEvent::MouseEnter { target: button });
        let first = fx.controller.widgets(fx.anchor("a")).unwrap();
        assert_eq!(fx.controller.state(fx.anchor("a")), AnchorState::WidgetsBuilt);

        let nodes = fx.page.node_count();
        fx.controller.handle(&mut fx.page, UiEvent::MouseLeave { target: button, related: None });
        fx.controller.handle(&mut fx.page, UiEvent::MouseEnter { target: button });
        fx.click(button);
        assert_eq!(fx.controller.widgets(fx.anchor("a")), Some(first));
        assert_eq!(fx.page.node_count(), nodes);
    }

    #[test]
    fn hover_shows_inlay_without_touching_open_box() {
        let mut fx = Fixture::new();
        fx.click(fx.button("a"));
        let b = fx.button("b");
        fx.controller.handle(&mut fx.page, UiEvent::MouseEnter { target: b });

        let inlay = fx.controller.widgets(fx.anchor("b")).unwrap().inlay;
        assert!(fx.page.is_visible(inlay));
        assert_eq!(fx.page.text_content(inlay), "Test: 1 | Code: 1");
        assert!(fx.page.bounding_box(inlay).x > fx.page.bounding_box(b).x);
        assert_eq!(fx.controller.open_anchor(), Some(fx.anchor("a")));
    }

    #[test]
    fn leaving_into_inlay_keeps_it() {
        let mut fx = Fixture::new();
        let button = fx.button("a");
        fx.controller.handle(&mut fx.page, UiEvent::MouseEnter { target: button });
        let inlay = fx.controller.widgets(fx.anchor("a")).unwrap().inlay;

        fx.controller.handle(&mut fx.page, UiEvent::MouseLeave { target: button, related: Some(inlay) });
        assert!(fx.page.is_visible(inlay));

        fx.controller.handle(&mut fx.page, UiEvent::MouseLeave { target: inlay, related: Some(button) });
        assert!(fx.page.is_visible(inlay));

        fx.controller.handle(&mut fx.page, UiEvent::MouseLeave { target: inlay, related: None });
        assert!(!fx.page.is_visible(inlay));
    }

    #[test]
    fn click_hides_inlay_and_pins_box_under_button() {
        let mut fx = Fixture::new();
        let button = fx.button("a");
        fx.controller.handle(&mut fx.page, UiEvent::MouseEnter { target: button });
        fx.click(button);

        let widgets = fx.controller.widgets(fx.anchor("a")).unwrap();
        assert!(!fx.page.is_visible(widgets.inlay));
        assert!(fx.page.is_visible(widgets.pinned));
        assert!(fx.page.bounding_box(widgets.pinned).y >= fx.page.bounding_box(button).bottom());
        assert_eq!(fx.page.document_listener_count(), 1);
    }

    #[test]
    fn double_click_returns_to_hidden_without_listener() {
        let mut fx = Fixture::new();
        let button = fx.button("a");
        fx.click(button);
        fx.click(button);

        let widgets = fx.controller.widgets(fx.anchor("a")).unwrap();
        assert!(!fx.page.is_visible(widgets.pinned));
        assert_eq!(fx.controller.open_anchor(), None);
        assert_eq!(fx.page.document_listener_count(), 0);
    }

    #[test]
    fn opening_another_box_closes_the_first() {
        let mut fx = Fixture::new();
        fx.click(fx.button("a"));
        fx.click(fx.button("b"));

        let a = fx.controller.widgets(fx.anchor("a")).unwrap();
        let b = fx.controller.widgets(fx.anchor("b")).unwrap();
        assert!(!fx.page.is_visible(a.pinned));
        assert!(fx.page.is_visible(b.pinned));
        assert_eq!(fx.controller.open_anchor(), Some(fx.anchor("b")));
        assert_eq!(fx.page.document_listener_count(), 1);
    }

    #[test]
    fn at_most_one_box_after_any_click_sequence() {
        let mut fx = Fixture::new();
        let sequence = ["a", "b", "b", "c", "a", "a", "c", "b", "c", "c", "a"];
        for fragment in sequence {
            fx.click(fx.button(fragment));
            assert!(fx.visible_boxes() <= 1);
            assert_eq!(fx.page.document_listener_count(), fx.visible_boxes());
        }
    }

    #[test]
    fn close_control_closes_box() {
        let mut fx = Fixture::new();
        fx.click(fx.button("c"));
        let widgets = fx.controller.widgets(fx.anchor("c")).unwrap();
        assert!(fx.click(widgets.close));
        assert!(!fx.page.is_visible(widgets.pinned));
        assert_eq!(fx.page.document_listener_count(), 0);
    }

    #[test]
    fn outside_click_dismisses_but_inside_click_keeps() {
        let mut fx = Fixture::new();
        fx.click(fx.button("a"));
        let widgets = fx.controller.widgets(fx.anchor("a")).unwrap();

        let link_section = fx.page.children(widgets.pinned)[1];
        assert!(!fx.click(link_section));
        assert!(fx.page.is_visible(widgets.pinned));

        let elsewhere = fx.anchor("other");
        assert!(fx.click(elsewhere));
        assert!(!fx.page.is_visible(widgets.pinned));
        assert_eq!(fx.page.document_listener_count(), 0);

        // Without an open box, document clicks do nothing.
        assert!(!fx.click(elsewhere));
    }
}
