//! Byte I/O contracts consumed by the tokenizer and the stream-decode
//! phase (spec §4.1). The core never assumes a threading model; callers
//! may back a `SequentialReader` with an in-memory buffer or a
//! chunk-buffered file reader, as long as lookahead within the current
//! window never fails.

use super::error::{PDFError, PDFResult};

/// Cursor-based byte source consumed by the `Tokenizer`.
pub trait SequentialReader {
    fn length(&self) -> usize;
    fn offset(&self) -> usize;

    fn eof(&self) -> bool {
        self.offset() >= self.length()
    }

    /// Reads the next byte. `consume = false` peeks without advancing.
    fn read_byte(&mut self, consume: bool) -> PDFResult<Option<u8>>;

    /// Reads up to `len` bytes. Shorter than `len` only at EOF.
    fn read_array(&mut self, len: usize, consume: bool) -> PDFResult<Vec<u8>>;

    fn read_char(&mut self, consume: bool) -> PDFResult<Option<char>> {
        Ok(self.read_byte(consume)?.map(|b| b as char))
    }

    fn read_string(&mut self, len: usize, consume: bool) -> PDFResult<String> {
        let bytes = self.read_array(len, consume)?;
        Ok(bytes.iter().map(|&b| b as char).collect())
    }

    /// Consumes and returns the run of bytes satisfying `class`, stopping
    /// at the first byte that doesn't (or at EOF).
    fn read_array_while(&mut self, class: impl Fn(u8) -> bool) -> PDFResult<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            match self.read_byte(false)? {
                Some(b) if class(b) => {
                    out.push(b);
                    self.read_byte(true)?;
                }
                _ => break,
            }
        }
        Ok(out)
    }

    fn read_string_while(&mut self, class: impl Fn(u8) -> bool) -> PDFResult<String> {
        let bytes = self.read_array_while(class)?;
        Ok(bytes.iter().map(|&b| b as char).collect())
    }

    /// Consumes bytes up to (and optionally including) the first byte in
    /// `class`. Returns everything read before the terminator; `None`
    /// terminator byte means EOF was hit first.
    fn read_array_until(
        &mut self,
        class: impl Fn(u8) -> bool,
        consume_terminator: bool,
    ) -> PDFResult<(Vec<u8>, Option<u8>)> {
        let mut out = Vec::new();
        loop {
            match self.read_byte(false)? {
                None => return Ok((out, None)),
                Some(b) if class(b) => {
                    if consume_terminator {
                        self.read_byte(true)?;
                    }
                    return Ok((out, Some(b)));
                }
                Some(b) => {
                    out.push(b);
                    self.read_byte(true)?;
                }
            }
        }
    }

    fn read_string_until(
        &mut self,
        class: impl Fn(u8) -> bool,
        consume_terminator: bool,
    ) -> PDFResult<(String, Option<u8>)> {
        let (bytes, term) = self.read_array_until(class, consume_terminator)?;
        Ok((bytes.iter().map(|&b| b as char).collect(), term))
    }

    fn consume(&mut self, len: usize) -> PDFResult<()> {
        self.read_array(len, true)?;
        Ok(())
    }
}

/// Random-access, cursor-free byte source consumed by the stream-decode
/// phase. Calls are idempotent: the same `(start, end)` always yields the
/// same bytes.
pub trait OffsetReader {
    fn read_array(&self, start: usize, end: usize) -> PDFResult<Vec<u8>>;
}

/// In-memory backing for both reader traits. Trivial: no windowing is
/// needed because the whole buffer is resident.
#[derive(Debug, Clone)]
pub struct MemoryReader {
    bytes: Vec<u8>,
    pos: usize,
}

impl MemoryReader {
    pub fn new(bytes: Vec<u8>) -> Self {
        MemoryReader { bytes, pos: 0 }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl SequentialReader for MemoryReader {
    fn length(&self) -> usize {
        self.bytes.len()
    }

    fn offset(&self) -> usize {
        self.pos
    }

    fn read_byte(&mut self, consume: bool) -> PDFResult<Option<u8>> {
        if self.pos >= self.bytes.len() {
            return Ok(None);
        }
        let b = self.bytes[self.pos];
        if consume {
            self.pos += 1;
        }
        Ok(Some(b))
    }

    fn read_array(&mut self, len: usize, consume: bool) -> PDFResult<Vec<u8>> {
        let end = (self.pos + len).min(self.bytes.len());
        let out = self.bytes[self.pos..end].to_vec();
        if consume {
            self.pos = end;
        }
        Ok(out)
    }
}

impl OffsetReader for MemoryReader {
    fn read_array(&self, start: usize, end: usize) -> PDFResult<Vec<u8>> {
        if start > end || end > self.bytes.len() {
            return Err(PDFError::InvalidByteRange { begin: start, end });
        }
        Ok(self.bytes[start..end].to_vec())
    }
}

/// File-backed reader. The spec allows a chunk-buffered implementation
/// with a rolling window (default 128 MiB) and a 1 KiB rollback margin;
/// since this engine has no progressive-loading non-goal to serve, the
/// whole file is read up front and both reader contracts are served from
/// that buffer, which trivially satisfies the rollback requirement.
pub struct FileReader {
    inner: MemoryReader,
}

impl FileReader {
    pub fn open(path: impl AsRef<std::path::Path>) -> PDFResult<Self> {
        let bytes = std::fs::read(path)?;
        Ok(FileReader {
            inner: MemoryReader::new(bytes),
        })
    }
}

impl SequentialReader for FileReader {
    fn length(&self) -> usize {
        self.inner.length()
    }
    fn offset(&self) -> usize {
        self.inner.offset()
    }
    fn read_byte(&mut self, consume: bool) -> PDFResult<Option<u8>> {
        self.inner.read_byte(consume)
    }
    fn read_array(&mut self, len: usize, consume: bool) -> PDFResult<Vec<u8>> {
        self.inner.read_array(len, consume)
    }
}

impl OffsetReader for FileReader {
    fn read_array(&self, start: usize, end: usize) -> PDFResult<Vec<u8>> {
        OffsetReader::read_array(&self.inner, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_array_while_stops_at_class_boundary() {
        let mut r = MemoryReader::new(b"123abc".to_vec());
        let digits = r.read_array_while(|b| b.is_ascii_digit()).unwrap();
        assert_eq!(digits, b"123");
        assert_eq!(r.offset(), 3);
    }

    #[test]
    fn read_array_until_reports_missing_terminator_at_eof() {
        let mut r = MemoryReader::new(b"abcdef".to_vec());
        let (bytes, term) = r.read_array_until(|b| b == b'z', false).unwrap();
        assert_eq!(bytes, b"abcdef");
        assert_eq!(term, None);
    }

    #[test]
    fn offset_reader_is_idempotent() {
        let r = MemoryReader::new(b"0123456789".to_vec());
        assert_eq!(
            OffsetReader::read_array(&r, 2, 5).unwrap(),
            OffsetReader::read_array(&r, 2, 5).unwrap()
        );
    }

    #[test]
    fn peek_does_not_advance() {
        let mut r = MemoryReader::new(b"xy".to_vec());
        assert_eq!(r.read_byte(false).unwrap(), Some(b'x'));
        assert_eq!(r.offset(), 0);
        assert_eq!(r.read_byte(true).unwrap(), Some(b'x'));
        assert_eq!(r.offset(), 1);
    }
}
