//! Sequential byte sources of known length.
//!
//! A [`ByteSource`] backs exactly one responder. Its length is fixed when it
//! is opened and is what the responder publishes as the content length; the
//! cursor only moves forward.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;

/// A readable, seekable stream that can move to the host's I/O thread.
pub trait SeekRead: Read + Seek + Send {}

impl<T: Read + Seek + Send> SeekRead for T {}

enum Storage {
    /// Fully buffered content (generated page, loaded asset).
    Memory(Bytes),
    /// An open external stream, read on demand.
    Stream(Box<dyn SeekRead>),
}

/// Result of one [`ByteSource::read_chunk`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Bytes copied into the caller's buffer.
    pub bytes: usize,
    /// Whether the cursor has reached the end of the source.
    pub exhausted: bool,
}

pub struct ByteSource {
    storage: Storage,
    len: u64,
    cursor: u64,
}

impl ByteSource {
    /// Wrap an in-memory buffer.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            len: data.len() as u64,
            storage: Storage::Memory(data),
            cursor: 0,
        }
    }

    /// Wrap a seekable stream. The length is taken by seeking to the end and
    /// back to the start.
    pub fn from_stream(mut stream: impl SeekRead + 'static) -> io::Result<Self> {
        let len = stream.seek(SeekFrom::End(0))?;
        stream.seek(SeekFrom::Start(0))?;
        Ok(Self {
            storage: Storage::Stream(Box::new(stream)),
            len,
            cursor: 0,
        })
    }

    /// Open a file as a stream source. A missing file surfaces as
    /// [`io::ErrorKind::NotFound`].
    pub fn open(path: &Path) -> io::Result<Self> {
        Self::from_stream(File::open(path)?)
    }

    /// Total size in bytes, fixed at open.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current read offset.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.len
    }

    /// Copy up to `buf.len()` bytes from the cursor into `buf`.
    ///
    /// Returns zero bytes only when the source was already exhausted;
    /// otherwise at least one byte. A stream that ends before its measured
    /// length fails with [`io::ErrorKind::UnexpectedEof`].
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<Chunk> {
        let remaining = self.len - self.cursor;
        let want = (buf.len() as u64).min(remaining) as usize;

        match &mut self.storage {
            Storage::Memory(data) => {
                let start = self.cursor as usize;
                buf[..want].copy_from_slice(&data[start..start + want]);
            }
            Storage::Stream(stream) => {
                let mut filled = 0;
                while filled < want {
                    match stream.read(&mut buf[filled..want]) {
                        Ok(0) => {
                            return Err(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                format!(
                                    "stream ended at offset {} of {}",
                                    self.cursor + filled as u64,
                                    self.len
                                ),
                            ));
                        }
                        Ok(n) => filled += n,
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        self.cursor += want as u64;
        Ok(Chunk {
            bytes: want,
            exhausted: self.is_exhausted(),
        })
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.storage {
            Storage::Memory(_) => "memory",
            Storage::Stream(_) => "stream",
        };
        f.debug_struct("ByteSource")
            .field("kind", &kind)
            .field("len", &self.len)
            .field("cursor", &self.cursor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn drain(source: &mut ByteSource, chunk_size: usize) -> (Vec<u8>, Vec<usize>) {
        let mut out = Vec::new();
        let mut sizes = Vec::new();
        let mut buf = vec![0u8; chunk_size];
        loop {
            let chunk = source.read_chunk(&mut buf).unwrap();
            if chunk.bytes == 0 {
                assert!(chunk.exhausted);
                break;
            }
            out.extend_from_slice(&buf[..chunk.bytes]);
            sizes.push(chunk.bytes);
        }
        (out, sizes)
    }

    // ── Memory ──────────────────────────────────────────────────────

    #[test]
    fn memory_reports_length_up_front() {
        let source = ByteSource::from_bytes("hello world");
        assert_eq!(source.len(), 11);
        assert_eq!(source.position(), 0);
        assert!(!source.is_exhausted());
    }

    #[test]
    fn memory_chunks_with_remainder() {
        let data: Vec<u8> = (0u8..10).collect();
        let mut source = ByteSource::from_bytes(data.clone());
        let (out, sizes) = drain(&mut source, 4);
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(out, data);
    }

    #[test]
    fn last_chunk_reports_exhaustion() {
        let mut source = ByteSource::from_bytes(vec![7u8; 6]);
        let mut buf = [0u8; 4];
        assert_eq!(
            source.read_chunk(&mut buf).unwrap(),
            Chunk { bytes: 4, exhausted: false }
        );
        assert_eq!(
            source.read_chunk(&mut buf).unwrap(),
            Chunk { bytes: 2, exhausted: true }
        );
        assert_eq!(
            source.read_chunk(&mut buf).unwrap(),
            Chunk { bytes: 0, exhausted: true }
        );
        assert_eq!(source.position(), 6);
    }

    #[test]
    fn empty_source_is_exhausted_immediately() {
        let mut source = ByteSource::from_bytes(Vec::<u8>::new());
        assert!(source.is_empty());
        let mut buf = [0u8; 8];
        assert_eq!(
            source.read_chunk(&mut buf).unwrap(),
            Chunk { bytes: 0, exhausted: true }
        );
    }

    #[test]
    fn every_chunk_size_preserves_order() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        for chunk_size in [1, 3, 7, 64, 999, 1000, 4096] {
            let mut source = ByteSource::from_bytes(data.clone());
            let (out, sizes) = drain(&mut source, chunk_size);
            assert_eq!(out, data, "chunk size {chunk_size}");
            assert!(sizes.iter().all(|&n| n > 0 && n <= chunk_size));
        }
    }

    // ── Stream ──────────────────────────────────────────────────────

    #[test]
    fn stream_length_comes_from_seeking() {
        let mut cursor = Cursor::new(vec![1u8; 25]);
        cursor.set_position(9);
        let source = ByteSource::from_stream(cursor).unwrap();
        assert_eq!(source.len(), 25);
        assert_eq!(source.position(), 0);
    }

    #[test]
    fn stream_delivers_in_order() {
        let data: Vec<u8> = (0u8..10).collect();
        let mut source = ByteSource::from_stream(Cursor::new(data.clone())).unwrap();
        let (out, sizes) = drain(&mut source, 4);
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(out, data);
    }

    /// Yields at most one byte per `read`, like a slow pipe.
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = buf.len().min(1);
            self.0.read(&mut buf[..end])
        }
    }

    impl Seek for Trickle {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.0.seek(pos)
        }
    }

    #[test]
    fn short_reads_are_filled() {
        let mut source = ByteSource::from_stream(Trickle(Cursor::new(vec![5u8; 9]))).unwrap();
        let (out, sizes) = drain(&mut source, 4);
        assert_eq!(sizes, vec![4, 4, 1]);
        assert_eq!(out, vec![5u8; 9]);
    }

    /// Claims a length on seek but runs dry early.
    struct Truncated {
        inner: Cursor<Vec<u8>>,
        claimed: u64,
    }

    impl Read for Truncated {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl Seek for Truncated {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            match pos {
                SeekFrom::End(0) => Ok(self.claimed),
                other => self.inner.seek(other),
            }
        }
    }

    #[test]
    fn truncated_stream_is_unexpected_eof() {
        let stream = Truncated {
            inner: Cursor::new(vec![0u8; 3]),
            claimed: 8,
        };
        let mut source = ByteSource::from_stream(stream).unwrap();
        let mut buf = [0u8; 8];
        let err = source.read_chunk(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn open_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.webm");
        std::fs::write(&path, b"0123456789").unwrap();

        let mut source = ByteSource::open(&path).unwrap();
        assert_eq!(source.len(), 10);
        let (out, _) = drain(&mut source, 3);
        assert_eq!(out, b"0123456789");
    }

    #[test]
    fn open_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ByteSource::open(&dir.path().join("absent.webm")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn debug_shows_kind_and_cursor() {
        let source = ByteSource::from_bytes("abc");
        let rendered = format!("{source:?}");
        assert!(rendered.contains("memory"));
        assert!(rendered.contains("len: 3"));
    }
}
