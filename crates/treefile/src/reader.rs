use byteorder::{LittleEndian, ReadBytesExt};
use node::{Children, Node, NodeError, NodeRef};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;

use crate::format::{self, to_usize, Frame};
use crate::read_at::ReadAt;

/// Random-access handle on one node record inside a positional source.
///
/// Opening is free: the flag byte and sizes trailer are read on the first
/// metadata call, the child name table on the first child-indexed call.
/// Each stage is stored through a [`OnceLock`], so a handle may be shared
/// across threads — at most one thread stores the decoded state, and after
/// that it is immutable. A failed stage stores nothing; the operation can
/// be retried if the source recovers.
///
/// Child handles returned by [`child`](Tree::child) and
/// [`children`](Tree::children) borrow the same source as the parent and
/// stay usable after the parent handle is dropped.
pub struct Tree<'r, R: ?Sized> {
    src: &'r R,
    end: u64,
    frame: OnceLock<Frame>,
    index: OnceLock<ChildIndex>,
}

struct ChildIndex {
    entries: Vec<Entry>,
}

/// Resolved location of one child: where its name and pointer sit in the
/// source.
struct Entry {
    name_off: u64,
    name_len: u64,
    ptr_off: u64,
    ptr_width: u8,
}

impl<'r, R: ReadAt + ?Sized> Tree<'r, R> {
    /// Opens the record ending at byte offset `end` of `src`.
    ///
    /// `end == 0` denotes the empty node: every operation succeeds with a
    /// zero or not-found result and the source is never touched.
    pub fn open_at(src: &'r R, end: u64) -> Self {
        Tree {
            src,
            end,
            frame: OnceLock::new(),
            index: OnceLock::new(),
        }
    }

    /// Absolute end offset of this record; `0` for the empty node.
    pub fn end(&self) -> u64 {
        self.end
    }

    fn frame(&self) -> Result<&Frame, NodeError> {
        if let Some(frame) = self.frame.get() {
            return Ok(frame);
        }
        let frame = format::read_frame(self.src, self.end)?;
        Ok(self.frame.get_or_init(|| frame))
    }

    fn index(&self) -> Result<&ChildIndex, NodeError> {
        if let Some(index) = self.index.get() {
            return Ok(index);
        }
        let frame = *self.frame()?;
        let index = ChildIndex::read(self.src, frame)?;
        Ok(self.index.get_or_init(|| index))
    }

    /// Length of the payload in bytes.
    pub fn data_len(&self) -> Result<u64, NodeError> {
        if self.end == 0 {
            return Ok(0);
        }
        Ok(self.frame()?.data_len())
    }

    /// Number of direct children.
    pub fn num_children(&self) -> Result<usize, NodeError> {
        if self.end == 0 {
            return Ok(0);
        }
        Ok(self.index()?.entries.len())
    }

    /// Streams the payload into `w`, returning the byte count.
    pub fn write_to(&self, w: &mut dyn Write) -> Result<u64, NodeError> {
        if self.end == 0 {
            return Ok(0);
        }
        let frame = *self.frame()?;
        let mut buf = [0u8; 8192];
        let mut pos = frame.data_start;
        while pos < frame.data_end {
            let n = (frame.data_end - pos).min(buf.len() as u64) as usize;
            self.src.read_at(pos, &mut buf[..n])?;
            w.write_all(&buf[..n])?;
            pos += n as u64;
        }
        Ok(frame.data_len())
    }

    /// The payload as an owned buffer.
    pub fn data(&self) -> Result<Vec<u8>, NodeError> {
        if self.end == 0 {
            return Ok(Vec::new());
        }
        let frame = self.frame()?;
        let mut buf = vec![0u8; to_usize(frame.data_len(), "data section too large")?];
        self.src.read_at(frame.data_start, &mut buf)?;
        Ok(buf)
    }

    /// Looks up a direct child by raw-byte name.
    ///
    /// Binary search over the stored name table; each probed name is read
    /// from the source on demand. A stored pointer of `0` yields an empty
    /// handle.
    pub fn child(&self, name: &[u8]) -> Result<Tree<'r, R>, NodeError> {
        if self.end == 0 {
            return Err(NodeError::NotFound(name.to_vec()));
        }

        let index = self.index()?;
        let mut lo = 0;
        let mut hi = index.entries.len();
        let mut probe = Vec::new();

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = &index.entries[mid];
            probe.resize(to_usize(entry.name_len, "child name too large")?, 0);
            self.src.read_at(entry.name_off, &mut probe)?;
            match name.cmp(&probe[..]) {
                Ordering::Less => hi = mid,
                Ordering::Greater => lo = mid + 1,
                Ordering::Equal => {
                    let ptr = self.read_ptr(entry)?;
                    return Ok(Tree::open_at(self.src, ptr));
                }
            }
        }

        Err(NodeError::NotFound(name.to_vec()))
    }

    /// Iterates the children in stored (lexicographic) order.
    ///
    /// The sequence is single-consumer; call `children()` again to restart.
    /// A decode failure yields one final `Err` entry, after which the
    /// iterator is exhausted.
    pub fn children(&self) -> ChildIter<'_, 'r, R> {
        ChildIter {
            tree: self,
            pos: 0,
            done: false,
        }
    }

    fn read_ptr(&self, entry: &Entry) -> Result<u64, NodeError> {
        let width = entry.ptr_width as usize;
        let mut buf = [0u8; 8];
        self.src.read_at(entry.ptr_off, &mut buf[..width])?;
        Ok((&buf[..width]).read_uint::<LittleEndian>(width)?)
    }
}

impl ChildIndex {
    fn read<R: ReadAt + ?Sized>(src: &R, frame: Frame) -> Result<ChildIndex, NodeError> {
        if frame.index_len() == 0 {
            return Ok(ChildIndex {
                entries: Vec::new(),
            });
        }

        let mut buf = vec![0u8; to_usize(frame.index_len(), "children section too large")?];
        src.read_at(frame.index_start, &mut buf)?;
        let sizes = format::parse_name_sizes(&buf)?;

        let mut widths_total: u64 = 0;
        let mut names_total: u64 = 0;
        for ns in &sizes {
            widths_total += u64::from(ns.ptr_width);
            names_total = names_total
                .checked_add(ns.name_len)
                .ok_or(NodeError::Corrupt("name lengths overflow"))?;
        }

        let ptrs_start = frame
            .index_start
            .checked_sub(widths_total)
            .ok_or(NodeError::Corrupt("pointer block extends past start"))?;
        let names_start = ptrs_start
            .checked_sub(names_total)
            .ok_or(NodeError::Corrupt("name block extends past start"))?;

        let mut entries = Vec::with_capacity(sizes.len());
        let mut name_off = names_start;
        let mut ptr_off = ptrs_start;
        for ns in &sizes {
            entries.push(Entry {
                name_off,
                name_len: ns.name_len,
                ptr_off,
                ptr_width: ns.ptr_width,
            });
            name_off += ns.name_len;
            ptr_off += u64::from(ns.ptr_width);
        }

        Ok(ChildIndex { entries })
    }
}

/// Lazy iterator over one node's `(name, child)` pairs.
pub struct ChildIter<'t, 'r, R: ?Sized> {
    tree: &'t Tree<'r, R>,
    pos: usize,
    done: bool,
}

impl<'t, 'r, R: ReadAt + ?Sized> Iterator for ChildIter<'t, 'r, R> {
    type Item = Result<(Vec<u8>, Tree<'r, R>), NodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.tree.end == 0 {
            return None;
        }

        let index = match self.tree.index() {
            Ok(index) => index,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let entry = index.entries.get(self.pos)?;
        self.pos += 1;

        let item = (|| {
            let mut name = vec![0u8; to_usize(entry.name_len, "child name too large")?];
            self.tree.src.read_at(entry.name_off, &mut name)?;
            let ptr = self.tree.read_ptr(entry)?;
            Ok((name, Tree::open_at(self.tree.src, ptr)))
        })();

        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

impl<R: ReadAt + ?Sized> Node for Tree<'_, R> {
    fn children(&self) -> Children<'_> {
        Children::new(Tree::children(self).map(|item| {
            item.map(|(name, tree)| (Cow::Owned(name), Box::new(tree) as NodeRef<'_>))
        }))
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64, NodeError> {
        Tree::write_to(self, w)
    }

    fn data_len(&self) -> Result<u64, NodeError> {
        Tree::data_len(self)
    }

    fn num_children(&self) -> Result<usize, NodeError> {
        Tree::num_children(self)
    }

    fn child(&self, name: &[u8]) -> Result<NodeRef<'_>, NodeError> {
        Ok(Box::new(Tree::child(self, name)?))
    }

    fn data(&self) -> Result<Vec<u8>, NodeError> {
        Tree::data(self)
    }
}

/// A container file paired with its reader.
///
/// Owns the open file, so the close capability lives exactly as long as the
/// reader; handles from [`root`](FileTree::root) borrow the file.
pub struct FileTree {
    file: File,
    end: u64,
}

impl FileTree {
    /// Opens `path` and takes the file length as the root's end offset.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, NodeError> {
        let file = File::open(path)?;
        let end = file.metadata()?.len();
        Ok(FileTree { file, end })
    }

    /// Handle on the root record.
    pub fn root(&self) -> Tree<'_, File> {
        Tree::open_at(&self.file, self.end)
    }

    /// Container length in bytes; `0` means the tree is empty.
    pub fn len(&self) -> u64 {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end == 0
    }
}
