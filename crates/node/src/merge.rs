//! Multi-root merge: presenting several trees as one.
//!
//! Containers can be stacked (several roots serialized into one or more
//! files); [`merge`] lets a client browse the union without materializing
//! it. Grouping happens once per level, on access, so only the paths that
//! are actually visited pay for the recursive merge.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::Write;

use crate::{Children, Node, NodeError, NodeRef};

/// A virtual union of the children of several nodes.
///
/// Names contributed by a single input resolve to that input's child
/// unmodified; names contributed by several inputs resolve to a further
/// union over those children. A union node carries no payload.
pub struct Roots<'a> {
    entries: Vec<(Vec<u8>, Vec<NodeRef<'a>>)>,
}

impl<'a> std::fmt::Debug for Roots<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Roots")
            .field("names", &self.entries.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}

/// Combines the children of `nodes` into a single virtual root.
///
/// Fails with the underlying error if any input reports one while its
/// children are enumerated.
pub fn merge<'a, I>(nodes: I) -> Result<Roots<'a>, NodeError>
where
    I: IntoIterator<Item = &'a dyn Node>,
{
    let mut by_name: BTreeMap<Vec<u8>, Vec<NodeRef<'a>>> = BTreeMap::new();

    for node in nodes {
        for entry in node.children() {
            let (name, child) = entry?;
            by_name.entry(name.into_owned()).or_default().push(child);
        }
    }

    Ok(Roots {
        entries: by_name.into_iter().collect(),
    })
}

fn resolve<'s>(nodes: &'s [NodeRef<'_>]) -> Result<NodeRef<'s>, NodeError> {
    if let [node] = nodes {
        return Ok(Box::new(&**node));
    }

    let union = merge(nodes.iter().map(|n| n.as_ref() as &dyn Node))?;

    Ok(Box::new(union))
}

impl Node for Roots<'_> {
    fn children(&self) -> Children<'_> {
        let mut entries = self.entries.iter();
        let mut failed = false;

        Children::new(std::iter::from_fn(move || {
            if failed {
                return None;
            }

            let (name, nodes) = entries.next()?;

            match resolve(nodes) {
                Ok(node) => Some(Ok((Cow::Borrowed(name.as_slice()), node))),
                Err(e) => {
                    failed = true;
                    Some(Err(e))
                }
            }
        }))
    }

    fn write_to(&self, _w: &mut dyn Write) -> Result<u64, NodeError> {
        Ok(0)
    }

    fn data_len(&self) -> Result<u64, NodeError> {
        Ok(0)
    }

    fn num_children(&self) -> Result<usize, NodeError> {
        Ok(self.entries.len())
    }

    fn child(&self, name: &[u8]) -> Result<NodeRef<'_>, NodeError> {
        match self
            .entries
            .binary_search_by(|(n, _)| n.as_slice().cmp(name))
        {
            Ok(pos) => resolve(&self.entries[pos].1),
            Err(_) => Err(NodeError::NotFound(name.to_vec())),
        }
    }
}
