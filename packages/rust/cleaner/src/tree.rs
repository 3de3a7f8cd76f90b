//! Minimal fragment tree built from `scraper`'s DOM.
//!
//! Only four node kinds matter for bulletin cleanup; every other element is
//! transparent and its children are lifted into the parent.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};

/// Kind tag of a [`FragmentNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Paragraph,
    Link,
    Emphasis,
    Text,
}

/// One node of a parsed bulletin fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentNode {
    pub kind: NodeKind,
    /// Raw text for [`NodeKind::Text`]; empty for the other kinds.
    pub text: String,
    pub children: Vec<FragmentNode>,
}

impl FragmentNode {
    pub fn text(s: &str) -> Self {
        Self {
            kind: NodeKind::Text,
            text: s.to_string(),
            children: Vec::new(),
        }
    }

    pub fn element(kind: NodeKind, children: Vec<FragmentNode>) -> Self {
        Self {
            kind,
            text: String::new(),
            children,
        }
    }

    /// Whether this node or any descendant has the given kind.
    pub fn contains(&self, kind: NodeKind) -> bool {
        self.kind == kind || self.children.iter().any(|c| c.contains(kind))
    }

    /// First descendant (pre-order, self included) of the given kind.
    pub fn find(&self, kind: NodeKind) -> Option<&FragmentNode> {
        if self.kind == kind {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(kind))
    }

    /// Concatenated raw text of the subtree.
    pub fn raw_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(None, &mut out);
        out
    }

    /// Whitespace-collapsed text of the subtree.
    pub fn plain_text(&self) -> String {
        collapse_whitespace(&self.raw_text())
    }

    /// Whitespace-collapsed text of the subtree with `skip` (by identity) left out.
    pub fn plain_text_without(&self, skip: &FragmentNode) -> String {
        let mut out = String::new();
        self.collect_text(Some(skip), &mut out);
        collapse_whitespace(&out)
    }

    fn collect_text(&self, skip: Option<&FragmentNode>, out: &mut String) {
        if skip.is_some_and(|s| std::ptr::eq(s, self)) {
            return;
        }
        if self.kind == NodeKind::Text {
            out.push_str(&self.text);
        }
        for child in &self.children {
            child.collect_text(skip, out);
        }
    }
}

/// Parse a markup fragment into its paragraphs, in document order.
///
/// Returns `None` when the fragment has no paragraph elements at all.
pub fn parse_paragraphs(markup: &str) -> Option<Vec<FragmentNode>> {
    static P_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("p").expect("valid selector"));

    let doc = Html::parse_fragment(markup);
    let paragraphs: Vec<FragmentNode> = doc
        .select(&P_SEL)
        .map(|p| FragmentNode::element(NodeKind::Paragraph, lift_children(p)))
        .collect();

    if paragraphs.is_empty() {
        None
    } else {
        Some(paragraphs)
    }
}

/// Text content of a fragment that has no paragraph structure.
pub fn fragment_text(markup: &str) -> String {
    let doc = Html::parse_fragment(markup);
    doc.root_element().text().collect()
}

fn lift_children(el: ElementRef<'_>) -> Vec<FragmentNode> {
    let mut out = Vec::new();
    lift_into(el, &mut out);
    out
}

fn lift_into(el: ElementRef<'_>, out: &mut Vec<FragmentNode>) {
    for child in el.children() {
        match child.value() {
            Node::Text(t) => {
                let s: &str = &t.text;
                out.push(FragmentNode::text(s));
            }
            Node::Element(e) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                match e.name() {
                    "a" => out.push(FragmentNode::element(
                        NodeKind::Link,
                        lift_children(child_el),
                    )),
                    "strong" | "b" => out.push(FragmentNode::element(
                        NodeKind::Emphasis,
                        lift_children(child_el),
                    )),
                    "br" => out.push(FragmentNode::text(" ")),
                    "script" | "style" => {}
                    _ => lift_into(child_el, out),
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_in_document_order() {
        let paras = parse_paragraphs("<p>prvi</p><div><p>drugi</p></div>").expect("paragraphs");
        assert_eq!(paras.len(), 2);
        assert_eq!(paras[0].plain_text(), "prvi");
        assert_eq!(paras[1].plain_text(), "drugi");
    }

    #[test]
    fn link_and_emphasis_tagged() {
        let paras =
            parse_paragraphs(r##"<p><strong>Naslov</strong> besedilo <a href="#">vir</a></p>"##)
                .expect("paragraphs");
        let p = &paras[0];
        assert!(p.contains(NodeKind::Link));
        let em = p.find(NodeKind::Emphasis).expect("emphasis");
        assert_eq!(em.plain_text(), "Naslov");
        assert_eq!(p.plain_text_without(em), "besedilo vir");
    }

    #[test]
    fn transparent_elements_are_lifted() {
        let paras = parse_paragraphs("<p><span>Zastoj <em>na</em></span> AC</p>").expect("p");
        assert_eq!(paras[0].children.iter().filter(|c| c.kind == NodeKind::Text).count(), 3);
        assert_eq!(paras[0].plain_text(), "Zastoj na AC");
    }

    #[test]
    fn no_paragraphs_is_none() {
        assert!(parse_paragraphs("Samo besedilo").is_none());
        assert_eq!(fragment_text("Samo besedilo"), "Samo besedilo");
    }
}
