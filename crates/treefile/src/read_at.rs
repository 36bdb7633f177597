use std::fs::File;
use std::io;

/// Positional byte source: the only I/O capability the readers require.
pub trait ReadAt {
    /// Fills `buf` with the bytes at `off`; fails if the range is not fully
    /// available.
    fn read_at(&self, off: u64, buf: &mut [u8]) -> io::Result<()>;
}

impl ReadAt for [u8] {
    fn read_at(&self, off: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = usize::try_from(off).ok();
        let end = start.and_then(|s| s.checked_add(buf.len()));
        match (start, end) {
            (Some(start), Some(end)) if end <= self.len() => {
                buf.copy_from_slice(&self[start..end]);
                Ok(())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of buffer",
            )),
        }
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, off: u64, buf: &mut [u8]) -> io::Result<()> {
        self.as_slice().read_at(off, buf)
    }
}

#[cfg(unix)]
impl ReadAt for File {
    fn read_at(&self, off: u64, buf: &mut [u8]) -> io::Result<()> {
        std::os::unix::fs::FileExt::read_exact_at(self, buf, off)
    }
}

#[cfg(windows)]
impl ReadAt for File {
    fn read_at(&self, mut off: u64, mut buf: &mut [u8]) -> io::Result<()> {
        use std::os::windows::fs::FileExt;

        while !buf.is_empty() {
            match self.seek_read(buf, off) {
                Ok(0) => break,
                Ok(n) => {
                    let rest = buf;
                    buf = &mut rest[n..];
                    off += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        if buf.is_empty() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of file",
            ))
        }
    }
}

impl<R: ReadAt + ?Sized> ReadAt for &R {
    fn read_at(&self, off: u64, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_at(off, buf)
    }
}

/// Shifts every read by a constant base.
///
/// A container embedded at byte `base` of a larger region carries pointers
/// that are absolute within that region (the serializer was seeded with the
/// same base); wrapping the region in an `OffsetReader` lets the readers use
/// those pointers unchanged.
pub struct OffsetReader<R> {
    inner: R,
    base: u64,
}

impl<R: ReadAt> OffsetReader<R> {
    pub fn new(inner: R, base: u64) -> Self {
        Self { inner, base }
    }
}

impl<R: ReadAt> ReadAt for OffsetReader<R> {
    fn read_at(&self, off: u64, buf: &mut [u8]) -> io::Result<()> {
        let off = off.checked_sub(self.base).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "read below the container base")
        })?;
        self.inner.read_at(off, buf)
    }
}
