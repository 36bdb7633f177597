//! # treefile — a compact binary container for immutable named trees
//!
//! A tree of nodes, each carrying an opaque byte payload and an ordered set
//! of uniquely named children, serialized once and then read randomly. The
//! container is **write-once, read-many**: a consumer descends by child name
//! and reads the bytes at any node without loading the whole file.
//!
//! ## Record layout
//!
//! Every node serializes to one *record*. Sizes sit at the **end** of the
//! record, so a reader needs nothing but the record's end offset: it reads
//! the flag byte one position before the end, walks back over the sizes
//! trailer, and from there resolves every section boundary. The root record
//! ends at the last byte of the container, so "the file length" is the only
//! thing a reader has to be told.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ child records (each child serialized first, depth-first)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │ NAMES      raw name bytes, lexicographic order, no gaps     │
//! │ POINTERS   end offset of each child record, little-endian,  │
//! │            minimum width 1..=8 bytes; 0 = empty child       │
//! │ NAMESIZES  per child: uintx((name_len << 3) | (width - 1))  │
//! ├─────────────────────────────────────────────────────────────┤
//! │ DATA       opaque payload bytes                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │ SIZES      uintx(len(NAMESIZES)) if children present,       │
//! │            then uintx(len(DATA)) if data present            │
//! │ FLAG       bit6 = children, bit5 = data,                    │
//! │            low 5 bits = byte length of SIZES                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A node with no data and no children occupies **zero bytes** and is
//! referenced by a pointer value of `0`. There is no magic number, version
//! byte or checksum.
//!
//! Two readers share the decoding logic: [`Tree`] navigates lazily through
//! any [`ReadAt`] source, [`MemTree`] aliases a contiguous in-memory buffer
//! without copying. Both implement [`node::Node`], so a read container can
//! be merged with others or fed straight back into [`serialize`].

mod format;
mod mem;
mod read_at;
mod reader;
mod writer;

#[cfg(test)]
pub(crate) mod testutil;

pub use format::{ptr_width, FLAG_CHILDREN, FLAG_DATA, SIZES_WIDTH_MASK};
pub use mem::{MemChildren, MemTree};
pub use read_at::{OffsetReader, ReadAt};
pub use reader::{ChildIter, FileTree, Tree};
pub use writer::{serialize, serialize_append, serialize_at, write_file};
