//! Wire constants and the frame decoding shared by both readers.
//!
//! A record is located from its end offset alone: the flag byte sits one
//! position before the end, the sizes trailer directly before the flag, and
//! every section boundary follows from backward arithmetic over the decoded
//! sizes.

use codec::{uintx, StickyReader};
use node::NodeError;

use crate::read_at::ReadAt;

/// Flag bit: the record carries a children section.
pub const FLAG_CHILDREN: u8 = 0x40;
/// Flag bit: the record carries payload bytes.
pub const FLAG_DATA: u8 = 0x20;
/// Low flag bits: byte length of the sizes trailer.
pub const SIZES_WIDTH_MASK: u8 = 0x1f;

/// Minimum little-endian byte width that holds `v`, in `1..=8`.
pub fn ptr_width(v: u64) -> u8 {
    let bits = 64 - v.leading_zeros();
    (((bits + 7) / 8) as u8).max(1)
}

pub(crate) fn to_usize(v: u64, what: &'static str) -> Result<usize, NodeError> {
    usize::try_from(v).map_err(|_| NodeError::Corrupt(what))
}

/// Section boundaries of one record.
///
/// `index_start..data_start` is the NameSizes block. The pointer block ends
/// at `index_start` and the name block ends at the pointer block; both are
/// located from the parsed [`NameSize`] entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    pub index_start: u64,
    pub data_start: u64,
    pub data_end: u64,
}

impl Frame {
    pub fn data_len(&self) -> u64 {
        self.data_end - self.data_start
    }

    pub fn index_len(&self) -> u64 {
        self.data_start - self.index_start
    }
}

/// Decodes the flag byte and sizes trailer of the record ending at `end`.
///
/// `end` must be non-zero; the zero-offset empty node is handled by the
/// callers without touching the source.
pub(crate) fn read_frame<R: ReadAt + ?Sized>(src: &R, end: u64) -> Result<Frame, NodeError> {
    let mut flag = [0u8];
    src.read_at(end - 1, &mut flag)?;
    let flag = flag[0];

    let sizes_width = u64::from(flag & SIZES_WIDTH_MASK);
    let sizes_start = (end - 1)
        .checked_sub(sizes_width)
        .ok_or(NodeError::Corrupt("sizes trailer extends past start"))?;

    let mut sizes = vec![0u8; sizes_width as usize];
    src.read_at(sizes_start, &mut sizes)?;

    let mut r = StickyReader::new(&sizes[..]);
    let children_len = if flag & FLAG_CHILDREN != 0 {
        r.read_uintx()
    } else {
        0
    };
    let data_len = if flag & FLAG_DATA != 0 { r.read_uintx() } else { 0 };
    if r.finish().is_err() {
        return Err(NodeError::Corrupt("bad sizes trailer"));
    }

    let data_end = sizes_start;
    let data_start = data_end
        .checked_sub(data_len)
        .ok_or(NodeError::Corrupt("data section extends past start"))?;
    let index_start = data_start
        .checked_sub(children_len)
        .ok_or(NodeError::Corrupt("children section extends past start"))?;

    Ok(Frame {
        index_start,
        data_start,
        data_end,
    })
}

/// One entry of the NameSizes block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NameSize {
    pub name_len: u64,
    pub ptr_width: u8,
}

/// Forward-scans a NameSizes block, consuming exactly the whole buffer.
pub(crate) fn parse_name_sizes(buf: &[u8]) -> Result<Vec<NameSize>, NodeError> {
    let mut entries = Vec::new();
    let mut pos = 0;

    while pos < buf.len() {
        let (v, n) =
            uintx::decode(&buf[pos..]).ok_or(NodeError::Corrupt("bad name-size entry"))?;
        pos += n;
        entries.push(NameSize {
            name_len: v >> 3,
            ptr_width: (v & 7) as u8 + 1,
        });
    }

    Ok(entries)
}
