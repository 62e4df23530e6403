use crate::dom::{Document, NodeId};

/// Find the element a URL fragment points at: an exact id match first, then
/// the first element whose `name` attribute equals the fragment.
/// An empty fragment resolves to nothing without touching the document.
pub fn resolve(doc: &impl Document, fragment: &str) -> Option<NodeId> {
    if fragment.is_empty() {
        return None;
    }
    return doc
        .element_by_id(fragment)
        .or_else(|| return doc.first_element_by_name(fragment));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::PageDocument;

    #[test]
    fn id_wins_over_earlier_name() {
        let page = PageDocument::from_html(r#"<a name="x">1</a><h2 id="x">2</h2>"#).unwrap();
        let by_id = page.element_by_id("x").unwrap();
        assert_eq!(resolve(&page, "x"), Some(by_id));
    }

    #[test]
    fn falls_back_to_first_name() {
        let page = PageDocument::from_html(r#"<a name="y">1</a><a name="y">2</a>"#).unwrap();
        assert_eq!(resolve(&page, "y"), page.first_element_by_name("y"));
        assert!(resolve(&page, "y").is_some());
    }

    #[test]
    fn empty_and_unknown_fragments_resolve_to_nothing() {
        let page = PageDocument::from_html(r#"<a id="">1</a><a name="">2</a>"#).unwrap();
        assert_eq!(resolve(&page, ""), None);
        assert_eq!(resolve(&page, "missing"), None);
    }
}
