use codec::StickyWriter;
use node::{Node, NodeError};
use std::fs::{rename, OpenOptions};
use std::io::{Seek, Write};
use std::path::Path;

use crate::format::{ptr_width, FLAG_CHILDREN, FLAG_DATA};

/// Serializes `root` to `sink`, returning the end offset of the root record
/// (the total byte count — the value a reader opens the tree at).
///
/// Children are written depth-first before their parent, so every child's
/// end offset is known when the parent emits its pointer table and no
/// back-patching is needed. A tree with no data and no children anywhere
/// writes nothing at all.
///
/// # Errors
///
/// [`NodeError::Duplicate`] if two siblings share a raw-byte name (the path
/// names every level from the root down to the conflict), any error a node
/// reports while its children are enumerated, and I/O failures from `sink`.
pub fn serialize<W, N>(sink: W, root: &N) -> Result<u64, NodeError>
where
    W: Write,
    N: Node + ?Sized,
{
    serialize_at(sink, 0, root)
}

/// [`serialize`] with the byte counter seeded at `base`.
///
/// Child pointers are absolute offsets; seeding makes them correct inside
/// storage that already holds `base` bytes, so a container can be embedded
/// in a larger file and later read through an
/// [`OffsetReader`](crate::OffsetReader) at the same base.
pub fn serialize_at<W, N>(sink: W, base: u64, root: &N) -> Result<u64, NodeError>
where
    W: Write,
    N: Node + ?Sized,
{
    let mut w = StickyWriter::with_count(sink, base);
    write_node(&mut w, &root as &dyn Node)?;
    Ok(w.finish()?)
}

/// [`serialize_at`] seeded from the sink's current stream position.
pub fn serialize_append<W, N>(mut sink: W, root: &N) -> Result<u64, NodeError>
where
    W: Write + Seek,
    N: Node + ?Sized,
{
    let base = sink.stream_position()?;
    serialize_at(sink, base, root)
}

/// Serializes `root` to a fresh file at `path`.
///
/// Writes to a temporary sibling first, syncs it, then atomically renames
/// into place. A crash mid-write leaves only the temp file behind.
pub fn write_file<P, N>(path: P, root: &N) -> Result<u64, NodeError>
where
    P: AsRef<Path>,
    N: Node + ?Sized,
{
    let path = path.as_ref();
    let tmp_path = path.with_extension("tree.tmp");
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp_path)?;

    let end = serialize(&mut file, root)?;

    file.sync_all()?;
    rename(&tmp_path, path)?;

    Ok(end)
}

fn write_node<W: Write>(w: &mut StickyWriter<W>, node: &dyn Node) -> Result<(), NodeError> {
    let mut table: Vec<(Vec<u8>, u64)> = Vec::new();

    for entry in node.children() {
        let (name, child) = entry?;
        let name = name.into_owned();

        // Duplicates are caught before the child is serialized.
        let slot = match table.binary_search_by(|(n, _)| n.as_slice().cmp(&name)) {
            Ok(_) => return Err(NodeError::Duplicate(vec![name])),
            Err(slot) => slot,
        };

        let start = w.count();
        write_node(w, &*child).map_err(|e| e.prefix_path(&name))?;

        let end = w.count();
        let ptr = if end == start { 0 } else { end };
        table.insert(slot, (name, ptr));
    }

    if w.failed() {
        // The latched I/O error is reported once, by finish().
        return Ok(());
    }

    let record_start = w.count();
    let index_len = write_children(w, &table);

    let data_start = w.count();
    node.write_to(w)?;
    let data_len = w.count() - data_start;

    if w.count() == record_start {
        return Ok(()); // empty node: zero bytes
    }

    let sizes_start = w.count();
    let mut flag = 0u8;
    if index_len > 0 {
        w.write_uintx(index_len);
        flag |= FLAG_CHILDREN;
    }
    if data_len > 0 {
        w.write_uintx(data_len);
        flag |= FLAG_DATA;
    }
    w.write_u8(flag | (w.count() - sizes_start) as u8);

    Ok(())
}

/// Emits the names, pointer and NameSizes blocks for a sorted child table,
/// returning the byte length of the NameSizes block (the children-section
/// size recorded in the trailer).
fn write_children<W: Write>(w: &mut StickyWriter<W>, table: &[(Vec<u8>, u64)]) -> u64 {
    if table.is_empty() {
        return 0;
    }

    for (name, _) in table {
        w.write_all(name);
    }
    for &(_, ptr) in table {
        w.write_uint_n(ptr, ptr_width(ptr));
    }

    let sizes_start = w.count();
    for &(ref name, ptr) in table {
        w.write_uintx(((name.len() as u64) << 3) | u64::from(ptr_width(ptr) - 1));
    }

    w.count() - sizes_start
}
