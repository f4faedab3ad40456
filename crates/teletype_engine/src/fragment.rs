//! Owned, detached markup subtrees.
//!
//! A [`Fragment`] never points back into the document it was copied from, so
//! attaching it to the live page cannot move or double-attach source nodes.

use ego_tree::NodeRef;
use scraper::node::Node;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Element(ElementFragment),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementFragment {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Fragment>,
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Fragment::Text(text.into())
    }

    pub fn element(name: &str, attrs: &[(&str, &str)], children: Vec<Fragment>) -> Self {
        Fragment::Element(ElementFragment {
            name: name.to_ascii_lowercase(),
            attrs: attrs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            children,
        })
    }

    /// Deep copy of a parsed node. Comments, doctypes and processing
    /// instructions carry no visible content and are left out.
    pub fn copy_of(node: NodeRef<'_, Node>) -> Option<Self> {
        match node.value() {
            Node::Text(text) => Some(Fragment::Text(text.to_string())),
            Node::Element(element) => Some(Fragment::Element(ElementFragment {
                name: element.name().to_ascii_lowercase(),
                attrs: element
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                children: node.children().filter_map(Fragment::copy_of).collect(),
            })),
            _ => None,
        }
    }

    /// Copy of this node without its children.
    pub fn shell(&self) -> Self {
        match self {
            Fragment::Element(el) => Fragment::Element(ElementFragment {
                name: el.name.clone(),
                attrs: el.attrs.clone(),
                children: Vec::new(),
            }),
            Fragment::Text(_) => self.clone(),
        }
    }

    /// Text node with nothing but whitespace.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Fragment::Text(t) if t.trim().is_empty())
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Fragment::Element(el) => Some(&el.name),
            Fragment::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[Fragment] {
        match self {
            Fragment::Element(el) => &el.children,
            Fragment::Text(_) => &[],
        }
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Fragment::Text(t) => out.push_str(t),
            Fragment::Element(el) => el.children.iter().for_each(|c| c.collect_text(out)),
        }
    }

    /// Number of nodes in this subtree, itself included.
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(Fragment::node_count).sum::<usize>()
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Fragment::Text(t) => escape_into(t, false, out),
            Fragment::Element(el) => {
                out.push('<');
                out.push_str(&el.name);
                for (k, v) in &el.attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    escape_into(v, true, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&el.name.as_str()) {
                    return;
                }
                for child in &el.children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(&el.name);
                out.push('>');
            }
        }
    }
}

impl ElementFragment {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_ascii_whitespace().any(|c| c == class))
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}
