//! # Node
//!
//! The abstract tree-node capability shared by every part of the system.
//!
//! A node is a pair of an opaque byte payload and an ordered set of uniquely
//! named children. The [`Node`] trait is used in both directions: producers
//! (the in-memory [`Branch`]/[`Leaf`] builders, or anything else) feed the
//! serializer through it, and both container readers expose it back to
//! callers, so a read tree can be merged or re-serialized without copying it
//! into an intermediate structure first.
//!
//! Child names are raw byte strings compared lexicographically byte by byte;
//! UTF-8 only matters for display.

use std::borrow::Cow;
use std::io::{self, Write};
use thiserror::Error;

mod merge;

pub use merge::{merge, Roots};

/// Errors produced while building, serializing or reading a tree.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Child lookup miss. Recoverable at the caller.
    #[error("child not found: {}", String::from_utf8_lossy(.0))]
    NotFound(Vec<u8>),
    /// Two siblings share a raw-byte name. The path lists the names from the
    /// root down to the conflicting name.
    #[error("duplicate child name: {}", path_display(.0))]
    Duplicate(Vec<Vec<u8>>),
    /// A decode step would read past a boundary or met a bad length.
    #[error("corrupt record: {0}")]
    Corrupt(&'static str),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl NodeError {
    /// Prepends `name` to the path of a [`Duplicate`](NodeError::Duplicate)
    /// error; every other kind passes through unchanged. Each tree level
    /// calls this while a duplicate propagates outward, so the final error
    /// carries the full path from the root.
    pub fn prefix_path(self, name: &[u8]) -> Self {
        match self {
            NodeError::Duplicate(mut path) => {
                path.insert(0, name.to_vec());
                NodeError::Duplicate(path)
            }
            other => other,
        }
    }
}

fn path_display(path: &[Vec<u8>]) -> String {
    path.iter()
        .map(|name| String::from_utf8_lossy(name))
        .collect::<Vec<_>>()
        .join("/")
}

/// A borrowed or owned child handle.
pub type NodeRef<'a> = Box<dyn Node + 'a>;

/// One step of a child enumeration: a `(name, node)` pair, or the error that
/// ended the walk.
pub type ChildEntry<'a> = Result<(Cow<'a, [u8]>, NodeRef<'a>), NodeError>;

/// Lazy, finite, single-pass sequence of named children.
///
/// An `Err` entry is terminal: implementations yield the error that stopped
/// them and then nothing further.
pub struct Children<'a> {
    inner: Box<dyn Iterator<Item = ChildEntry<'a>> + 'a>,
}

impl<'a> Children<'a> {
    pub fn new<I>(iter: I) -> Self
    where
        I: Iterator<Item = ChildEntry<'a>> + 'a,
    {
        Self {
            inner: Box::new(iter),
        }
    }

    pub fn empty() -> Self {
        Self {
            inner: Box::new(std::iter::empty()),
        }
    }
}

impl<'a> Iterator for Children<'a> {
    type Item = ChildEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// A single node in a tree.
pub trait Node {
    /// Enumerates the child nodes in stored order.
    fn children(&self) -> Children<'_>;

    /// Streams the node's payload into `w`, returning the byte count.
    fn write_to(&self, w: &mut dyn Write) -> Result<u64, NodeError>;

    /// Length of the payload in bytes.
    fn data_len(&self) -> Result<u64, NodeError>;

    /// Number of direct children.
    fn num_children(&self) -> Result<usize, NodeError>;

    /// Looks up a direct child by raw-byte name.
    fn child(&self, name: &[u8]) -> Result<NodeRef<'_>, NodeError>;

    /// The payload as an owned buffer.
    fn data(&self) -> Result<Vec<u8>, NodeError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }
}

impl<N: Node + ?Sized> Node for &N {
    fn children(&self) -> Children<'_> {
        (**self).children()
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64, NodeError> {
        (**self).write_to(w)
    }

    fn data_len(&self) -> Result<u64, NodeError> {
        (**self).data_len()
    }

    fn num_children(&self) -> Result<usize, NodeError> {
        (**self).num_children()
    }

    fn child(&self, name: &[u8]) -> Result<NodeRef<'_>, NodeError> {
        (**self).child(name)
    }

    fn data(&self) -> Result<Vec<u8>, NodeError> {
        (**self).data()
    }
}

impl<N: Node + ?Sized> Node for Box<N> {
    fn children(&self) -> Children<'_> {
        (**self).children()
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64, NodeError> {
        (**self).write_to(w)
    }

    fn data_len(&self) -> Result<u64, NodeError> {
        (**self).data_len()
    }

    fn num_children(&self) -> Result<usize, NodeError> {
        (**self).num_children()
    }

    fn child(&self, name: &[u8]) -> Result<NodeRef<'_>, NodeError> {
        (**self).child(name)
    }

    fn data(&self) -> Result<Vec<u8>, NodeError> {
        (**self).data()
    }
}

/// A childless node carrying only payload bytes.
pub struct Leaf(pub Vec<u8>);

impl From<Vec<u8>> for Leaf {
    fn from(data: Vec<u8>) -> Self {
        Leaf(data)
    }
}

impl From<&[u8]> for Leaf {
    fn from(data: &[u8]) -> Self {
        Leaf(data.to_vec())
    }
}

impl From<&str> for Leaf {
    fn from(data: &str) -> Self {
        Leaf(data.as_bytes().to_vec())
    }
}

impl Node for Leaf {
    fn children(&self) -> Children<'_> {
        Children::empty()
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64, NodeError> {
        w.write_all(&self.0)?;
        Ok(self.0.len() as u64)
    }

    fn data_len(&self) -> Result<u64, NodeError> {
        Ok(self.0.len() as u64)
    }

    fn num_children(&self) -> Result<usize, NodeError> {
        Ok(0)
    }

    fn child(&self, name: &[u8]) -> Result<NodeRef<'_>, NodeError> {
        Err(NodeError::NotFound(name.to_vec()))
    }

    fn data(&self) -> Result<Vec<u8>, NodeError> {
        Ok(self.0.clone())
    }
}

/// An ordered collection of uniquely named child nodes.
///
/// Children are kept sorted by raw-byte name regardless of insertion order.
/// A branch carries no payload of its own.
#[derive(Default)]
pub struct Branch<'a> {
    children: Vec<(Vec<u8>, NodeRef<'a>)>,
}

impl<'a> Branch<'a> {
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
        }
    }

    /// Adds a named child node.
    ///
    /// Fails with [`NodeError::Duplicate`] if a child of the same name is
    /// already present.
    pub fn add(
        &mut self,
        name: impl Into<Vec<u8>>,
        node: impl Node + 'a,
    ) -> Result<(), NodeError> {
        self.add_boxed(name.into(), Box::new(node))
    }

    /// [`add`](Branch::add) for an already-boxed node.
    pub fn add_boxed(&mut self, name: Vec<u8>, node: NodeRef<'a>) -> Result<(), NodeError> {
        match self
            .children
            .binary_search_by(|(n, _)| n.as_slice().cmp(&name))
        {
            Ok(_) => Err(NodeError::Duplicate(vec![name])),
            Err(pos) => {
                self.children.insert(pos, (name, node));
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Node for Branch<'_> {
    fn children(&self) -> Children<'_> {
        Children::new(self.children.iter().map(|(name, node)| {
            Ok((
                Cow::Borrowed(name.as_slice()),
                Box::new(&**node) as NodeRef<'_>,
            ))
        }))
    }

    fn write_to(&self, _w: &mut dyn Write) -> Result<u64, NodeError> {
        Ok(0)
    }

    fn data_len(&self) -> Result<u64, NodeError> {
        Ok(0)
    }

    fn num_children(&self) -> Result<usize, NodeError> {
        Ok(self.children.len())
    }

    fn child(&self, name: &[u8]) -> Result<NodeRef<'_>, NodeError> {
        match self
            .children
            .binary_search_by(|(n, _)| n.as_slice().cmp(name))
        {
            Ok(pos) => Ok(Box::new(&*self.children[pos].1)),
            Err(_) => Err(NodeError::NotFound(name.to_vec())),
        }
    }
}
