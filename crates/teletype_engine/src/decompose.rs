//! Splits a replacement document into ordered reveal units.

use ego_tree::NodeId;

use crate::document::{ReplacementDocument, CONTENT_CONTAINER};
use crate::fragment::Fragment;
use crate::live::{DomError, LiveDocument};

/// One unit of content revealed atomically.
///
/// `follow` items are attached as children of `element` once it is live,
/// one at a time, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub parent: NodeId,
    pub element: Fragment,
    pub follow: Vec<Fragment>,
}

impl Chunk {
    pub fn has_follow(&self) -> bool {
        !self.follow.is_empty()
    }

    /// Number of attach events this chunk produces.
    pub fn unit_count(&self) -> usize {
        1 + self.follow.len()
    }
}

/// Where chunks go in the live page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    /// The live content container.
    pub container: NodeId,
    /// The node chunks attach to: the container or its fresh wrapper.
    pub target: NodeId,
}

/// Clears the live content container, resets scroll, and creates the
/// wrapper sub-container when the replacement is wrapped. Nothing is
/// attached to the returned target yet.
///
/// The live tree is compacted after clearing, so ids taken before this
/// call are stale.
pub fn prepare_destination(live: &mut LiveDocument, wrapped: bool) -> Result<Destination, DomError> {
    let missing = || DomError::MissingContainer(CONTENT_CONTAINER);
    let cleared = live.content_container().ok_or_else(missing)?;
    live.clear_children(cleared)?;
    live.compact();
    let container = live.content_container().ok_or_else(missing)?;
    live.set_scroll_top(0);
    let target = if wrapped {
        live.create_wrapper(container)?
    } else {
        container
    };
    Ok(Destination { container, target })
}

/// How an element is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// The whole subtree is a single unit.
    Whole,
    /// The empty shell first, then each non-blank child as a follow item.
    Streamed,
}

#[derive(Debug, Clone)]
pub struct Decomposer {
    rules: Vec<(String, Granularity)>,
    fallback: Granularity,
}

impl Default for Decomposer {
    fn default() -> Self {
        Self::new(Granularity::Whole)
            .with_rule("section", Granularity::Whole)
            .with_rule("article", Granularity::Streamed)
            .with_rule("form", Granularity::Streamed)
            .with_rule("ul", Granularity::Streamed)
            .with_rule("ol", Granularity::Streamed)
    }
}

impl Decomposer {
    pub fn new(fallback: Granularity) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    pub fn with_rule(mut self, tag: &str, granularity: Granularity) -> Self {
        let tag = tag.to_ascii_lowercase();
        self.rules.retain(|(t, _)| *t != tag);
        self.rules.push((tag, granularity));
        self
    }

    pub fn granularity(&self, tag: &str) -> Granularity {
        self.rules
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(tag))
            .map_or(self.fallback, |(_, g)| *g)
    }

    /// Chunks for every non-blank child of the document's content, in
    /// source order. Pure: the live page is not touched.
    pub fn decompose(&self, doc: &ReplacementDocument, destination: &Destination) -> Vec<Chunk> {
        doc.content()
            .children()
            .iter()
            .filter(|node| !node.is_blank_text())
            .map(|node| self.chunk_for(node, destination.target))
            .collect()
    }

    fn chunk_for(&self, node: &Fragment, parent: NodeId) -> Chunk {
        let streamed = node
            .tag()
            .is_some_and(|tag| self.granularity(tag) == Granularity::Streamed);
        if !streamed {
            return Chunk {
                parent,
                element: node.clone(),
                follow: Vec::new(),
            };
        }
        Chunk {
            parent,
            element: node.shell(),
            follow: node
                .children()
                .iter()
                .filter(|child| !child.is_blank_text())
                .cloned()
                .collect(),
        }
    }
}

/// Rebuilds the revealed content from a chunk list: each chunk's element
/// with its follow items appended as children.
pub fn reassemble(chunks: &[Chunk]) -> Vec<Fragment> {
    chunks
        .iter()
        .map(|chunk| match &chunk.element {
            Fragment::Element(shell) if chunk.has_follow() => {
                let mut element = shell.clone();
                element.children.extend(chunk.follow.iter().cloned());
                Fragment::Element(element)
            }
            other => other.clone(),
        })
        .collect()
}
