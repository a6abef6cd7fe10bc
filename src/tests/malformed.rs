use crate::dex::dex_file::DEX_FILE_MAGIC_035;
use crate::dex::{DexErrorKind, DexFile};
use crate::tests::DexImage;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// Counts the bytes handed out by the wrapped reader.
struct CountingReader<R> {
    inner: R,
    bytes_read: usize,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n;
        Ok(n)
    }
}

impl<R: Seek> Seek for CountingReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

#[test]
fn bad_magic_stops_after_eight_bytes() {
    let mut bytes = DexImage::sample().build();
    bytes[0] = b'x';
    let mut reader = CountingReader { inner: Cursor::new(bytes), bytes_read: 0 };
    let e = DexFile::read(&mut reader).unwrap_err();
    assert_eq!(e.kind(), DexErrorKind::MalformedHeader);
    assert_eq!(reader.bytes_read, 8);
}

#[test]
fn unsupported_revision_is_malformed() {
    let mut image = DexImage::sample();
    image.magic = [0x64, 0x65, 0x78, 0x0a, 0x30, 0x33, 0x39, 0x00];
    let e = DexFile::from_bytes(&image.build()).unwrap_err();
    assert_eq!(e.kind(), DexErrorKind::MalformedHeader);
}

#[test]
fn empty_source_is_truncated() {
    let e = DexFile::from_bytes(&[]).unwrap_err();
    assert_eq!(e.kind(), DexErrorKind::TruncatedRead);
}

#[test]
fn truncated_header_is_rejected() {
    let mut bytes = DexImage::sample().build();
    bytes.truncate(0x50);
    let e = DexFile::from_bytes(&bytes).unwrap_err();
    assert_eq!(e.kind(), DexErrorKind::TruncatedRead);

    let bytes = DEX_FILE_MAGIC_035.to_vec();
    let e = DexFile::from_bytes(&bytes).unwrap_err();
    assert_eq!(e.kind(), DexErrorKind::TruncatedRead);
}

#[test]
fn truncation_anywhere_in_the_tables_is_rejected() {
    let bytes = DexImage::sample().build();
    // every cut inside the header, id tables or string data must fail the parse
    for len in (0..bytes.len()).step_by(7) {
        let e = DexFile::from_bytes(&bytes[..len]).unwrap_err();
        assert_eq!(e.kind(), DexErrorKind::TruncatedRead, "cut at {}", len);
    }
}

#[test]
fn seek_failure_is_io_failure() {
    struct NoSeek(Cursor<Vec<u8>>);
    impl Read for NoSeek {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }
    impl Seek for NoSeek {
        fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "not seekable"))
        }
    }

    let e = DexFile::read(&mut NoSeek(Cursor::new(DexImage::sample().build()))).unwrap_err();
    assert_eq!(e.kind(), DexErrorKind::IoFailure);
}
