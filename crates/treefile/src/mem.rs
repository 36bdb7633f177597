use byteorder::{LittleEndian, ReadBytesExt};
use node::{Children, Node, NodeError, NodeRef};
use std::borrow::Cow;
use std::io::Write;

use crate::format::{self, to_usize};

/// Reader over a container held in one contiguous byte buffer.
///
/// Decoding happens once at open: the child names are materialized as
/// borrowed views into the buffer, and names, pointers and payload are all
/// aliased without copying. After a successful open, `data`, `data_len`,
/// `num_children` and `names` cannot fail.
///
/// Child handles borrow the same buffer, so they outlive the handle they
/// were obtained from.
pub struct MemTree<'a> {
    buf: &'a [u8],
    data: &'a [u8],
    names: Vec<&'a [u8]>,
    ptrs: Vec<&'a [u8]>,
}

impl<'a> MemTree<'a> {
    /// Opens the tree whose root record ends at the end of `buf`.
    pub fn open(buf: &'a [u8]) -> Result<Self, NodeError> {
        Self::open_at(buf, buf.len() as u64)
    }

    /// Opens the record ending at byte offset `end` within `buf`.
    ///
    /// `end == 0` denotes the empty node.
    pub fn open_at(buf: &'a [u8], end: u64) -> Result<Self, NodeError> {
        if end == 0 {
            return Ok(MemTree {
                buf,
                data: &[],
                names: Vec::new(),
                ptrs: Vec::new(),
            });
        }

        let frame = format::read_frame(buf, end)?;
        let index_start = to_usize(frame.index_start, "record too large for memory")?;
        let data_start = to_usize(frame.data_start, "record too large for memory")?;
        let data_end = to_usize(frame.data_end, "record too large for memory")?;

        let mut tree = MemTree {
            buf,
            data: &buf[data_start..data_end],
            names: Vec::new(),
            ptrs: Vec::new(),
        };

        if index_start < data_start {
            tree.load_children(&buf[index_start..data_start], index_start)?;
        }

        Ok(tree)
    }

    fn load_children(&mut self, table: &'a [u8], index_start: usize) -> Result<(), NodeError> {
        let sizes = format::parse_name_sizes(table)?;

        let mut widths_total = 0usize;
        let mut names_total = 0usize;
        for ns in &sizes {
            widths_total += ns.ptr_width as usize;
            names_total = names_total
                .checked_add(to_usize(ns.name_len, "child name too large")?)
                .ok_or(NodeError::Corrupt("name lengths overflow"))?;
        }

        let ptrs_start = index_start
            .checked_sub(widths_total)
            .ok_or(NodeError::Corrupt("pointer block extends past start"))?;
        let names_start = ptrs_start
            .checked_sub(names_total)
            .ok_or(NodeError::Corrupt("name block extends past start"))?;

        self.names.reserve(sizes.len());
        self.ptrs.reserve(sizes.len());
        let mut name_pos = names_start;
        let mut ptr_pos = ptrs_start;
        for ns in &sizes {
            let name_len = ns.name_len as usize;
            self.names.push(&self.buf[name_pos..name_pos + name_len]);
            self.ptrs
                .push(&self.buf[ptr_pos..ptr_pos + ns.ptr_width as usize]);
            name_pos += name_len;
            ptr_pos += ns.ptr_width as usize;
        }

        Ok(())
    }

    /// The payload bytes, aliased from the backing buffer.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn data_len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn num_children(&self) -> usize {
        self.names.len()
    }

    /// Child names in stored (lexicographic) order, aliased from the buffer.
    pub fn names(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        self.names.iter().copied()
    }

    /// Looks up a direct child by raw-byte name.
    ///
    /// Binary search over the materialized name table; the matching pointer
    /// is decoded from its stored width without allocating.
    pub fn child(&self, name: &[u8]) -> Result<MemTree<'a>, NodeError> {
        match self.names.binary_search_by(|probe| probe.cmp(&name)) {
            Ok(pos) => Self::open_at(self.buf, ptr_value(self.ptrs[pos])?),
            Err(_) => Err(NodeError::NotFound(name.to_vec())),
        }
    }

    /// Iterates the children in stored (lexicographic) order.
    ///
    /// Opening a child can fail on a corrupt pointer; such a failure is
    /// yielded as one final `Err` entry.
    pub fn children(&self) -> MemChildren<'a> {
        MemChildren {
            buf: self.buf,
            names: self.names.clone(),
            ptrs: self.ptrs.clone(),
            pos: 0,
            done: false,
        }
    }

    /// Streams the payload into `w`, returning the byte count.
    pub fn write_to(&self, w: &mut dyn Write) -> std::io::Result<u64> {
        w.write_all(self.data)?;
        Ok(self.data.len() as u64)
    }
}

/// Decodes a little-endian pointer from its stored width.
fn ptr_value(bytes: &[u8]) -> Result<u64, NodeError> {
    let mut r = bytes;
    Ok(r.read_uint::<LittleEndian>(bytes.len())?)
}

/// Lazy iterator over a [`MemTree`]'s children.
///
/// Borrows only the backing buffer, so it stays usable after the handle it
/// came from is gone.
pub struct MemChildren<'a> {
    buf: &'a [u8],
    names: Vec<&'a [u8]>,
    ptrs: Vec<&'a [u8]>,
    pos: usize,
    done: bool,
}

impl<'a> Iterator for MemChildren<'a> {
    type Item = Result<(&'a [u8], MemTree<'a>), NodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.names.len() {
            return None;
        }

        let name = self.names[self.pos];
        let ptr_bytes = self.ptrs[self.pos];
        self.pos += 1;

        let item = ptr_value(ptr_bytes).and_then(|ptr| {
            let child = MemTree::open_at(self.buf, ptr)?;
            Ok((name, child))
        });

        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

impl Node for MemTree<'_> {
    fn children(&self) -> Children<'_> {
        Children::new(MemTree::children(self).map(|item| {
            item.map(|(name, tree)| (Cow::Borrowed(name), Box::new(tree) as NodeRef<'_>))
        }))
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64, NodeError> {
        Ok(MemTree::write_to(self, w)?)
    }

    fn data_len(&self) -> Result<u64, NodeError> {
        Ok(MemTree::data_len(self))
    }

    fn num_children(&self) -> Result<usize, NodeError> {
        Ok(MemTree::num_children(self))
    }

    fn child(&self, name: &[u8]) -> Result<NodeRef<'_>, NodeError> {
        Ok(Box::new(MemTree::child(self, name)?))
    }

    fn data(&self) -> Result<Vec<u8>, NodeError> {
        Ok(self.data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{collect, TNode};
    use crate::writer::serialize;

    fn sample_tree() -> TNode {
        TNode::new(
            b"MNOP",
            vec![
                (
                    "A1",
                    TNode::new(
                        b"123",
                        vec![
                            ("B1", TNode::leaf(b"456")),
                            ("B2", TNode::leaf(b"789")),
                            ("B3", TNode::leaf(b"ABC")),
                            ("B4", TNode::empty()),
                        ],
                    ),
                ),
                (
                    "A2",
                    TNode::new(
                        b"DEF",
                        vec![("B1", TNode::leaf(b"GHI")), ("B2", TNode::leaf(b"JKL"))],
                    ),
                ),
            ],
        )
    }

    fn encode(tree: &TNode) -> Vec<u8> {
        let mut out = Vec::new();
        serialize(&mut out, tree).unwrap();
        out
    }

    // -------------------- roundtrip --------------------

    #[test]
    fn roundtrip_various_shapes() {
        let cases = vec![
            TNode::empty(),
            TNode::leaf(b"ABC"),
            TNode::branch(vec![("", TNode::empty())]),
            TNode::branch(vec![("Child1", TNode::leaf(b"123"))]),
            TNode::new(b"ABC", vec![("Child2", TNode::leaf(b"456"))]),
            sample_tree(),
        ];

        for (n, tree) in cases.iter().enumerate() {
            let bytes = encode(tree);
            let root = MemTree::open(&bytes).unwrap();
            assert_eq!(
                collect(&root),
                tree.normalized(),
                "case {} did not roundtrip",
                n + 1
            );
        }
    }

    // -------------------- infallible accessors --------------------

    #[test]
    fn accessors_after_open() {
        let bytes = encode(&sample_tree());
        let root = MemTree::open(&bytes).unwrap();
        assert_eq!(root.data(), b"MNOP");
        assert_eq!(root.data_len(), 4);
        assert_eq!(root.num_children(), 2);
        let names: Vec<&[u8]> = root.names().collect();
        assert_eq!(names, vec![b"A1".as_slice(), b"A2".as_slice()]);
    }

    #[test]
    fn zero_copy_aliases_into_the_buffer() {
        let bytes = encode(&sample_tree());
        let range = bytes.as_ptr_range();

        let root = MemTree::open(&bytes).unwrap();
        let in_buffer = |s: &[u8]| s.is_empty() || range.contains(&s.as_ptr());

        assert!(in_buffer(root.data()));
        for name in root.names() {
            assert!(in_buffer(name));
        }
        let child = root.child(b"A1").unwrap();
        assert!(in_buffer(child.data()));
    }

    #[test]
    fn names_outlive_the_handle() {
        let bytes = encode(&sample_tree());
        let names: Vec<&[u8]> = {
            let root = MemTree::open(&bytes).unwrap();
            root.names().collect()
            // root drops; the name slices borrow only the buffer
        };
        assert_eq!(names, vec![b"A1".as_slice(), b"A2".as_slice()]);
    }

    // -------------------- navigation --------------------

    #[test]
    fn child_descends_and_misses() {
        let bytes = encode(&sample_tree());
        let root = MemTree::open(&bytes).unwrap();

        assert_eq!(root.child(b"A1").unwrap().child(b"B2").unwrap().data(), b"789");
        assert_eq!(root.child(b"A2").unwrap().data(), b"DEF");

        match root.child(b"A2").unwrap().child(b"B3") {
            Err(NodeError::NotFound(name)) => assert_eq!(name, b"B3"),
            Err(other) => panic!("expected NotFound, got {other}"),
            Ok(_) => panic!("expected NotFound, got a child"),
        }

        // An empty child is a pointer-zero record.
        let b4 = root.child(b"A1").unwrap().child(b"B4").unwrap();
        assert_eq!(b4.data_len(), 0);
        assert_eq!(b4.num_children(), 0);
    }

    #[test]
    fn children_iterate_in_stored_order() {
        let tree = TNode::branch(vec![
            ("child-2", TNode::leaf(b"qwerty")),
            ("Child1", TNode::leaf(b"123")),
        ]);
        let bytes = encode(&tree);
        let root = MemTree::open(&bytes).unwrap();

        let entries: Vec<(&[u8], Vec<u8>)> = root
            .children()
            .map(|item| {
                let (name, child) = item.unwrap();
                (name, child.data().to_vec())
            })
            .collect();
        assert_eq!(
            entries,
            vec![
                (b"Child1".as_slice(), b"123".to_vec()),
                (b"child-2".as_slice(), b"qwerty".to_vec()),
            ]
        );
    }

    #[test]
    fn empty_buffer_is_the_empty_node() {
        let root = MemTree::open(&[]).unwrap();
        assert_eq!(root.data_len(), 0);
        assert_eq!(root.num_children(), 0);
        assert!(matches!(root.child(b"x"), Err(NodeError::NotFound(_))));
        assert_eq!(root.children().count(), 0);
    }

    // -------------------- corrupt input --------------------

    #[test]
    fn open_fails_eagerly_on_truncated_record() {
        // has_data with size 3 but only the trailer is present.
        let bytes: &[u8] = &[0x03, 0x21];
        assert!(MemTree::open(bytes).is_err());
    }

    #[test]
    fn open_fails_on_bad_name_size_entry() {
        let tree = TNode::branch(vec![("a", TNode::leaf(b"x"))]);
        let mut bytes = encode(&tree);
        let len = bytes.len();
        bytes[len - 3] = 0x80; // dangling continuation byte
        assert!(matches!(
            MemTree::open(&bytes),
            Err(NodeError::Corrupt(_))
        ));
    }

    // -------------------- interop with the positional reader --------------------

    #[test]
    fn both_readers_agree() {
        let bytes = encode(&sample_tree());
        let mem = MemTree::open(&bytes).unwrap();
        let pos = crate::Tree::open_at(&bytes[..], bytes.len() as u64);
        assert_eq!(collect(&mem), collect(&pos));
    }
}
