//! Producer-side test node carrying both payload and children.

use node::{Children, Node, NodeError, NodeRef};
use std::borrow::Cow;
use std::io::{self, Write};

/// Tree node for tests. Children are yielded in the order given, which is
/// not necessarily sorted — storing them sorted is the serializer's job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct TNode {
    pub data: Vec<u8>,
    pub children: Vec<(Vec<u8>, TNode)>,
    pub fail_children: bool,
}

impl TNode {
    pub fn empty() -> TNode {
        TNode::default()
    }

    pub fn leaf(data: &[u8]) -> TNode {
        TNode {
            data: data.to_vec(),
            ..TNode::default()
        }
    }

    pub fn branch(children: Vec<(&str, TNode)>) -> TNode {
        TNode::new(b"", children)
    }

    pub fn new(data: &[u8], children: Vec<(&str, TNode)>) -> TNode {
        TNode {
            data: data.to_vec(),
            children: children
                .into_iter()
                .map(|(name, node)| (name.as_bytes().to_vec(), node))
                .collect(),
            fail_children: false,
        }
    }

    /// Node whose children enumeration ends in an I/O error.
    pub fn failing_children() -> TNode {
        TNode {
            fail_children: true,
            ..TNode::default()
        }
    }

    /// Copy with children sorted recursively, for comparing against what a
    /// reader observes.
    pub fn normalized(&self) -> TNode {
        let mut children: Vec<(Vec<u8>, TNode)> = self
            .children
            .iter()
            .map(|(name, node)| (name.clone(), node.normalized()))
            .collect();
        children.sort_by(|(a, _), (b, _)| a.cmp(b));
        TNode {
            data: self.data.clone(),
            children,
            fail_children: false,
        }
    }
}

impl Node for TNode {
    fn children(&self) -> Children<'_> {
        let entries = self.children.iter().map(|(name, node)| {
            Ok((
                Cow::Borrowed(name.as_slice()),
                Box::new(node) as NodeRef<'_>,
            ))
        });
        if self.fail_children {
            Children::new(entries.chain(std::iter::once(Err(NodeError::Io(io::Error::new(
                io::ErrorKind::Other,
                "children enumeration failed",
            ))))))
        } else {
            Children::new(entries)
        }
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64, NodeError> {
        w.write_all(&self.data)?;
        Ok(self.data.len() as u64)
    }

    fn data_len(&self) -> Result<u64, NodeError> {
        Ok(self.data.len() as u64)
    }

    fn num_children(&self) -> Result<usize, NodeError> {
        Ok(self.children.len())
    }

    fn child(&self, name: &[u8]) -> Result<NodeRef<'_>, NodeError> {
        self.children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| Box::new(node) as NodeRef<'_>)
            .ok_or_else(|| NodeError::NotFound(name.to_vec()))
    }
}

/// Reads a whole tree back through the [`Node`] capability, for comparing
/// against the producer tree (children come back in sorted order, so compare
/// against [`TNode::normalized`]).
pub(crate) fn collect(node: &dyn Node) -> TNode {
    let mut children = Vec::new();
    for entry in node.children() {
        let (name, child) = entry.expect("children iteration failed");
        children.push((name.into_owned(), collect(&*child)));
    }
    TNode {
        data: node.data().expect("reading node data failed"),
        children,
        fail_children: false,
    }
}
