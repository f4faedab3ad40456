//! The live page: the tree chunks are attached to.

use ego_tree::{NodeId, NodeRef, Tree};
use scraper::Html;
use teletype_core::{LinkClick, SoundToggleView, SOUND_TOGGLE_ID};

use crate::document::{CONTENT_CONTAINER, WRAPPER_CLASS};
use crate::fragment::{ElementFragment, Fragment};

/// Marks every attached reveal unit.
pub const CHUNK_CLASS: &str = "pjax-chunk";
/// Set on a unit once it has been flashed; stays on.
pub const SHOWN_CLASS: &str = "pjax-on";
/// Highlight that lasts exactly one frame.
pub const FLASH_CLASS: &str = "pjax-flash";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("node {0:?} is not part of the live document")]
    UnknownNode(NodeId),
    #[error("live page has no <{0}> content container")]
    MissingContainer(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveNode {
    Document,
    Element(LiveElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl LiveElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_ascii_whitespace().any(|c| c == class))
    }

    fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let joined = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attr("class", &joined);
    }

    fn remove_class(&mut self, class: &str) {
        let Some(existing) = self.attr("class") else {
            return;
        };
        let kept = existing
            .split_ascii_whitespace()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        if kept.is_empty() {
            self.attrs.retain(|(k, _)| k != "class");
        } else {
            self.set_attr("class", &kept);
        }
    }
}

impl From<&Fragment> for LiveNode {
    fn from(fragment: &Fragment) -> Self {
        match fragment {
            Fragment::Text(t) => LiveNode::Text(t.clone()),
            Fragment::Element(el) => LiveNode::Element(LiveElement {
                name: el.name.clone(),
                attrs: el.attrs.clone(),
            }),
        }
    }
}

/// Success notices captured from one version of the live tree.
///
/// Node ids only mean something within the tree they came from; once the
/// page is replaced or compacted, the set no longer applies.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingNotices {
    generation: u64,
    nodes: Vec<NodeId>,
}

impl PendingNotices {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

#[derive(Debug, Clone)]
pub struct LiveDocument {
    tree: Tree<LiveNode>,
    title: String,
    scroll_top: u32,
    /// Bumped whenever existing node ids stop being valid.
    generation: u64,
}

impl Default for LiveDocument {
    fn default() -> Self {
        Self::from_html("<html><head></head><body><header></header><main></main></body></html>")
    }
}

impl LiveDocument {
    /// Builds the live tree from a complete page, as a full load would.
    pub fn from_html(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut doc = Self {
            tree: Tree::new(LiveNode::Document),
            title: String::new(),
            scroll_top: 0,
            generation: 0,
        };
        if let Some(root) = Fragment::copy_of(*parsed.root_element()) {
            let root_id = doc.tree.root().id();
            // The root id always exists.
            let _ = doc.append_fragment(root_id, &root);
        }
        doc.title = doc
            .find_first(|el| el.name == "title")
            .map(|id| doc.text_content(id).trim().to_string())
            .unwrap_or_default();
        doc
    }

    /// Replaces the whole page, as a full load does. Ids handed out for the
    /// previous page are invalidated.
    pub fn replace_with(&mut self, next: LiveDocument) {
        let generation = self.generation + 1;
        *self = next;
        self.generation = generation;
    }

    /// Rebuilds the arena from the attached nodes only. Detached subtrees
    /// stay in an `ego_tree` arena until the tree is rebuilt.
    pub fn compact(&mut self) {
        let fragments: Vec<Fragment> = self
            .tree
            .root()
            .children()
            .filter_map(fragment_of)
            .collect();
        self.tree = Tree::new(LiveNode::Document);
        let root = self.tree.root().id();
        for fragment in &fragments {
            // The fresh root always exists.
            let _ = self.append_fragment(root, fragment);
        }
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Nodes held by the arena, attached or not.
    pub fn arena_len(&self) -> usize {
        self.tree.nodes().count()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn scroll_top(&self) -> u32 {
        self.scroll_top
    }

    pub fn set_scroll_top(&mut self, offset: u32) {
        self.scroll_top = offset;
    }

    pub fn root(&self) -> NodeId {
        self.tree.root().id()
    }

    pub fn node(&self, id: NodeId) -> Option<&LiveNode> {
        self.tree.get(id).map(|n| n.value())
    }

    pub fn element(&self, id: NodeId) -> Option<&LiveElement> {
        match self.node(id)? {
            LiveNode::Element(el) => Some(el),
            _ => None,
        }
    }

    /// True when `id` is reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let root = self.root();
        match self.tree.get(id) {
            Some(node) => node.id() == root || node.ancestors().any(|a| a.id() == root),
            None => false,
        }
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.tree
            .get(id)
            .map(|n| n.children().map(|c| c.id()).collect())
            .unwrap_or_default()
    }

    /// First attached element, in document order, accepted by `pred`.
    pub fn find_first(&self, pred: impl Fn(&LiveElement) -> bool) -> Option<NodeId> {
        self.find_all(pred).into_iter().next()
    }

    pub fn find_all(&self, pred: impl Fn(&LiveElement) -> bool) -> Vec<NodeId> {
        self.tree
            .root()
            .descendants()
            .filter(|n| matches!(n.value(), LiveNode::Element(el) if pred(el)))
            .map(|n| n.id())
            .collect()
    }

    pub fn find_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.find_first(|el| el.attr("id") == Some(element_id))
    }

    pub fn select_class(&self, class: &str) -> Vec<NodeId> {
        self.find_all(|el| el.has_class(class))
    }

    pub fn content_container(&self) -> Option<NodeId> {
        self.find_first(|el| el.name == CONTENT_CONTAINER)
    }

    pub fn header(&self) -> Option<NodeId> {
        self.find_first(|el| el.name == "header")
    }

    /// Appends an owned copy of `fragment` under `parent` and returns the new node.
    pub fn append_fragment(&mut self, parent: NodeId, fragment: &Fragment) -> Result<NodeId, DomError> {
        let mut node = self.tree.get_mut(parent).ok_or(DomError::UnknownNode(parent))?;
        let id = node.append(LiveNode::from(fragment)).id();
        for child in fragment.children() {
            self.append_fragment(id, child)?;
        }
        Ok(id)
    }

    /// Detaches every child of `id`.
    pub fn clear_children(&mut self, id: NodeId) -> Result<(), DomError> {
        for child in self.children(id) {
            self.detach(child)?;
        }
        Ok(())
    }

    pub fn detach(&mut self, id: NodeId) -> Result<(), DomError> {
        self.tree
            .get_mut(id)
            .ok_or(DomError::UnknownNode(id))?
            .detach();
        Ok(())
    }

    /// Swaps the live header for `replacement`. Returns the new header node,
    /// or `None` when the live page has no header to replace.
    pub fn replace_header(&mut self, replacement: &Fragment) -> Result<Option<NodeId>, DomError> {
        let Some(current) = self.header() else {
            return Ok(None);
        };
        let parent = self
            .tree
            .get(current)
            .and_then(|n| n.parent())
            .map(|p| p.id())
            .ok_or(DomError::UnknownNode(current))?;

        let placeholder = self
            .tree
            .get_mut(current)
            .ok_or(DomError::UnknownNode(current))?
            .insert_before(LiveNode::from(replacement))
            .id();
        for child in replacement.children() {
            self.append_fragment(placeholder, child)?;
        }
        self.detach(current)?;
        debug_assert!(self.children(parent).contains(&placeholder));
        Ok(Some(placeholder))
    }

    /// Adds `class` to an element. Text nodes cannot carry classes; returns false for them.
    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<bool, DomError> {
        self.with_element(id, |el| el.add_class(class))
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<bool, DomError> {
        self.with_element(id, |el| el.remove_class(class))
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|el| el.has_class(class))
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> Result<bool, DomError> {
        self.with_element(id, |el| el.set_attr(name, value))
    }

    /// Replaces all children of `id` with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> Result<(), DomError> {
        self.clear_children(id)?;
        self.append_fragment(id, &Fragment::text(text))?;
        Ok(())
    }

    pub fn text_content(&self, id: NodeId) -> String {
        self.tree
            .get(id)
            .map(|n| {
                n.descendants()
                    .filter_map(|d| match d.value() {
                        LiveNode::Text(t) => Some(t.as_str()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The subtree at `id` as an owned fragment.
    pub fn to_fragment(&self, id: NodeId) -> Option<Fragment> {
        self.tree.get(id).and_then(fragment_of)
    }

    /// Re-binds the sound toggle control, wherever the current header put it.
    pub fn bind_sound_toggle(&mut self, view: &SoundToggleView) -> Result<bool, DomError> {
        let Some(toggle) = self.find_by_id(SOUND_TOGGLE_ID) else {
            return Ok(false);
        };
        self.set_text_content(toggle, &view.label)?;
        self.set_attr(toggle, "aria-pressed", view.aria_pressed())?;
        Ok(true)
    }

    /// The current success notices, tied to this version of the tree.
    pub fn pending_notices(&self) -> PendingNotices {
        PendingNotices {
            generation: self.generation,
            nodes: self.success_notices(),
        }
    }

    /// Dismisses every notice in `pending` that is still on the page.
    /// A set taken from an earlier version of the tree dismisses nothing.
    pub fn dismiss_pending(&mut self, pending: &PendingNotices) -> usize {
        if pending.generation != self.generation {
            return 0;
        }
        let mut dismissed = 0;
        for &notice in &pending.nodes {
            if self.is_attached(notice) && matches!(self.dismiss_notice(notice), Ok(true)) {
                dismissed += 1;
            }
        }
        dismissed
    }

    /// Success notices that dismiss themselves after a reveal.
    pub fn success_notices(&self) -> Vec<NodeId> {
        self.find_all(|el| el.name == "li" && el.has_class("success"))
            .into_iter()
            .filter(|id| {
                self.tree.get(*id).is_some_and(|n| {
                    n.ancestors().any(|a| {
                        matches!(a.value(), LiveNode::Element(el) if el.has_class("messages"))
                    })
                })
            })
            .collect()
    }

    /// Removes the notice list item that contains `id` (the close-button action).
    pub fn dismiss_notice(&mut self, id: NodeId) -> Result<bool, DomError> {
        let node = self.tree.get(id).ok_or(DomError::UnknownNode(id))?;
        let item = std::iter::once(node)
            .chain(node.ancestors())
            .find(|n| matches!(n.value(), LiveNode::Element(el) if el.name == "li"))
            .map(|n| n.id());
        match item {
            Some(item) => {
                self.detach(item)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Anchors with an `href`, as clicks the controller can classify.
    pub fn links(&self) -> Vec<LinkClick> {
        self.find_all(|el| el.name == "a" && el.attr("href").is_some())
            .into_iter()
            .filter_map(|id| self.element(id))
            .map(|el| LinkClick {
                href: el.attr("href").unwrap_or_default().to_string(),
                download: el.attr("download").is_some(),
                target: el.attr("target").map(str::to_string),
                opt_out: el.attr("data-no-pjax").is_some(),
                ..LinkClick::default()
            })
            .collect()
    }

    /// Creates the `.wrapper` sub-container under `container`.
    pub(crate) fn create_wrapper(&mut self, container: NodeId) -> Result<NodeId, DomError> {
        self.append_fragment(
            container,
            &Fragment::element("div", &[("class", WRAPPER_CLASS)], Vec::new()),
        )
    }

    fn with_element(&mut self, id: NodeId, f: impl FnOnce(&mut LiveElement)) -> Result<bool, DomError> {
        let mut node = self.tree.get_mut(id).ok_or(DomError::UnknownNode(id))?;
        match node.value() {
            LiveNode::Element(el) => {
                f(el);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn fragment_of(node: NodeRef<'_, LiveNode>) -> Option<Fragment> {
    match node.value() {
        LiveNode::Document => None,
        LiveNode::Text(t) => Some(Fragment::Text(t.clone())),
        LiveNode::Element(el) => Some(Fragment::Element(ElementFragment {
            name: el.name.clone(),
            attrs: el.attrs.clone(),
            children: node.children().filter_map(fragment_of).collect(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>Home</title></head><body>
        <header><span id="sound-toggle">?</span></header>
        <main><ul class="messages"><li class="success">Saved<button class="close">x</button></li>
        <li class="error">Oops</li></ul><a href="/a/">A</a><a href="/b/" target="_blank">B</a></main>
        </body></html>"#;

    #[test]
    fn from_html_builds_tree_and_title() {
        let doc = LiveDocument::from_html(PAGE);
        assert_eq!(doc.title(), "Home");
        assert!(doc.content_container().is_some());
        assert!(doc.header().is_some());
    }

    #[test]
    fn classes_toggle_without_duplicates() {
        let mut doc = LiveDocument::from_html(PAGE);
        let main = doc.content_container().unwrap();
        assert!(doc.add_class(main, FLASH_CLASS).unwrap());
        doc.add_class(main, FLASH_CLASS).unwrap();
        assert_eq!(doc.element(main).unwrap().attr("class"), Some(FLASH_CLASS));
        doc.remove_class(main, FLASH_CLASS).unwrap();
        assert!(!doc.has_class(main, FLASH_CLASS));
        assert_eq!(doc.element(main).unwrap().attr("class"), None);
    }

    #[test]
    fn clearing_detaches_children() {
        let mut doc = LiveDocument::from_html(PAGE);
        let main = doc.content_container().unwrap();
        let first = doc.children(main)[0];
        doc.clear_children(main).unwrap();
        assert!(doc.children(main).is_empty());
        assert!(!doc.is_attached(first));
        assert!(doc.success_notices().is_empty());
    }

    #[test]
    fn header_replacement_and_toggle_binding() {
        let mut doc = LiveDocument::from_html(PAGE);
        let old = doc.header().unwrap();
        let header = Fragment::element(
            "header",
            &[],
            vec![Fragment::element("a", &[("id", "sound-toggle")], vec![Fragment::text("SFX")])],
        );
        let new = doc.replace_header(&header).unwrap().unwrap();
        assert!(!doc.is_attached(old));
        assert_eq!(doc.header(), Some(new));

        assert!(doc.bind_sound_toggle(&SoundToggleView::from_enabled(false)).unwrap());
        let toggle = doc.find_by_id("sound-toggle").unwrap();
        assert_eq!(doc.text_content(toggle), "SFX: Off");
        assert_eq!(doc.element(toggle).unwrap().attr("aria-pressed"), Some("false"));
    }

    #[test]
    fn notices_and_links() {
        let mut doc = LiveDocument::from_html(PAGE);
        let notices = doc.success_notices();
        assert_eq!(notices.len(), 1);
        let close = doc.select_class("close")[0];
        assert!(doc.dismiss_notice(close).unwrap());
        assert!(doc.success_notices().is_empty());

        let links = doc.links();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].href, "/a/");
        assert_eq!(links[1].target.as_deref(), Some("_blank"));
    }

    #[test]
    fn compaction_frees_detached_nodes() {
        let mut doc = LiveDocument::from_html(PAGE);
        let baseline = doc.arena_len();
        let items: Vec<Fragment> = (0..25)
            .map(|i| Fragment::element("li", &[], vec![Fragment::text(i.to_string())]))
            .collect();
        let list = Fragment::element("ul", &[], items);

        for _ in 0..100 {
            let main = doc.content_container().unwrap();
            doc.clear_children(main).unwrap();
            doc.compact();
            let main = doc.content_container().unwrap();
            doc.append_fragment(main, &list).unwrap();
        }
        let total = doc.arena_len();
        assert!(total <= baseline + 51, "arena grew to {total}");
        assert_eq!(doc.title(), "Home");
        assert!(doc.header().is_some());
    }

    #[test]
    fn notices_from_a_replaced_page_dismiss_nothing() {
        let mut doc = LiveDocument::from_html(PAGE);
        let pending = doc.pending_notices();
        assert_eq!(pending.len(), 1);

        doc.replace_with(LiveDocument::from_html(
            "<html><body><main><ul><li>b1</li><li>b2</li></ul></main></body></html>",
        ));
        assert_eq!(doc.dismiss_pending(&pending), 0);
        let main = doc.content_container().unwrap();
        assert_eq!(doc.text_content(main), "b1b2");
    }

    #[test]
    fn pending_notices_are_dismissed_on_the_same_page() {
        let mut doc = LiveDocument::from_html(PAGE);
        let pending = doc.pending_notices();
        assert_eq!(doc.dismiss_pending(&pending), 1);
        assert!(doc.success_notices().is_empty());
        assert_eq!(doc.dismiss_pending(&pending), 0);
    }

    #[test]
    fn fragments_round_trip_through_the_live_tree() {
        let mut doc = LiveDocument::default();
        let main = doc.content_container().unwrap();
        let list = Fragment::element(
            "ul",
            &[],
            vec![Fragment::element("li", &[], vec![Fragment::text("x")])],
        );
        let id = doc.append_fragment(main, &list).unwrap();
        assert_eq!(doc.to_fragment(id), Some(list));
    }
}
