//! Recursive-descent view of an ISOBMFF box hierarchy.
//!
//! [`BoxTree::parse`] materialises every box of the input as a [`BoxNode`],
//! descending only into [`CONTAINER_BOXES`](crate::box_utils::CONTAINER_BOXES).
//! Leaf payloads are zero-copy slices of the input buffer.

use std::fmt;
use std::ops::Range;

use bytes::Bytes;

use crate::box_utils::{FourCc, MAX_BOX_DEPTH, boxes, fourcc_to_string, is_container};
use crate::{Mp4Error, Result};

/// A parsed box: either a container with children or an opaque leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoxNode {
    Container {
        fourcc: FourCc,
        /// Absolute byte range of the whole box, header included.
        range: Range<usize>,
        children: Vec<BoxNode>,
    },
    Leaf {
        fourcc: FourCc,
        range: Range<usize>,
        payload: Bytes,
    },
}

impl BoxNode {
    pub fn fourcc(&self) -> &FourCc {
        match self {
            BoxNode::Container { fourcc, .. } | BoxNode::Leaf { fourcc, .. } => fourcc,
        }
    }

    pub fn range(&self) -> &Range<usize> {
        match self {
            BoxNode::Container { range, .. } | BoxNode::Leaf { range, .. } => range,
        }
    }

    /// Declared box size, header included.
    pub fn size(&self) -> usize {
        self.range().len()
    }

    /// Child boxes; empty for leaves.
    pub fn children(&self) -> &[BoxNode] {
        match self {
            BoxNode::Container { children, .. } => children,
            BoxNode::Leaf { .. } => &[],
        }
    }

    /// Leaf payload; `None` for containers.
    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            BoxNode::Leaf { payload, .. } => Some(payload),
            BoxNode::Container { .. } => None,
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}[{}] size={} offset={}",
            "",
            fourcc_to_string(self.fourcc()),
            self.size(),
            self.range().start,
            indent = depth * 2
        )?;
        for child in self.children() {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

/// Top-level boxes of a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoxTree {
    pub roots: Vec<BoxNode>,
}

impl BoxTree {
    /// Parse the whole buffer. Any malformed box fails the parse.
    pub fn parse(data: &Bytes) -> Result<Self> {
        let roots = parse_level(data, 0, data.len(), 0)?;
        Ok(Self { roots })
    }

    /// First node (in document order) matching the whole path.
    pub fn find(&self, path: &[FourCc]) -> Option<&BoxNode> {
        find_in(&self.roots, path)
    }

    /// All top-level nodes of the given type.
    pub fn top_level<'a>(&'a self, fourcc: &'a FourCc) -> impl Iterator<Item = &'a BoxNode> {
        self.roots.iter().filter(move |node| node.fourcc() == fourcc)
    }
}

impl fmt::Display for BoxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.roots {
            node.fmt_indented(f, 0)?;
        }
        Ok(())
    }
}

fn parse_level(data: &Bytes, start: usize, end: usize, depth: usize) -> Result<Vec<BoxNode>> {
    let mut nodes = Vec::new();
    for parsed in boxes(data, start, end) {
        let parsed = parsed?;
        let range = parsed.start..parsed.end;

        if is_container(&parsed.fourcc) {
            if depth + 1 >= MAX_BOX_DEPTH {
                return Err(Mp4Error::MalformedBox {
                    fourcc: parsed.fourcc,
                    offset: parsed.start,
                    reason: "box nesting exceeds maximum depth",
                });
            }
            let children = parse_level(data, parsed.body_start, parsed.body_end, depth + 1)?;
            nodes.push(BoxNode::Container {
                fourcc: parsed.fourcc,
                range,
                children,
            });
        } else {
            nodes.push(BoxNode::Leaf {
                fourcc: parsed.fourcc,
                range,
                payload: parsed.body(data),
            });
        }
    }
    Ok(nodes)
}

fn find_in<'a>(nodes: &'a [BoxNode], path: &[FourCc]) -> Option<&'a BoxNode> {
    let (head, rest) = path.split_first()?;
    nodes
        .iter()
        .filter(|node| node.fourcc() == head)
        .find_map(|node| {
            if rest.is_empty() {
                Some(node)
            } else {
                find_in(node.children(), rest)
            }
        })
}
