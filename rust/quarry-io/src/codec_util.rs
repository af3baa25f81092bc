//! Codec headers and footers shared by every index file.
//!
//! A file starts with `CODEC_MAGIC`, the codec name and a format version, and
//! ends with a 16-byte footer: `FOOTER_MAGIC`, the checksum algorithm id and the
//! xxh3-64 checksum of all bytes preceding the checksum itself.

use quarry_common::{Result, error::Error, error::ErrorKind};
use xxhash_rust::xxh3::Xxh3;

use crate::{IndexInput, IndexOutput, output::DataOutput, varint};

pub const CODEC_MAGIC: u32 = 0x3fd7_6c17;

pub const FOOTER_MAGIC: u32 = !CODEC_MAGIC;

/// Checksum algorithm id stored in the footer (xxh3-64).
pub const CHECKSUM_XXH3: u32 = 0;

pub const FOOTER_LENGTH: u64 = 16;

/// Writes a codec header: magic, codec name, version.
pub fn write_header(out: &mut impl DataOutput, codec: &str, version: u32) -> Result<()> {
    if codec.is_empty() || codec.len() >= 128 || !codec.is_ascii() {
        return Err(Error::invalid_arg(
            "codec",
            format!("codec name must be 1..127 ASCII characters: {codec:?}"),
        ));
    }
    out.write_u32(CODEC_MAGIC)?;
    out.write_string(codec)?;
    out.write_u32(version)
}

/// Returns the encoded length of a header written by [`write_header`].
pub fn header_length(codec: &str) -> u64 {
    (4 + varint::vint_len(codec.len() as u32) + codec.len() + 4) as u64
}

/// Reads and validates a codec header at the current position of `input`,
/// returning the stored version.
pub fn check_header(
    input: &mut IndexInput,
    codec: &str,
    min_version: u32,
    max_version: u32,
) -> Result<u32> {
    let magic = input.read_u32()?;
    if magic != CODEC_MAGIC {
        return Err(Error::corrupt_index(
            input.name(),
            format!("codec header mismatch: actual header={magic:#010x} vs expected header={CODEC_MAGIC:#010x}"),
        ));
    }
    check_header_no_magic(input, codec, min_version, max_version)
}

/// Like [`check_header`], for callers that already consumed the magic.
pub fn check_header_no_magic(
    input: &mut IndexInput,
    codec: &str,
    min_version: u32,
    max_version: u32,
) -> Result<u32> {
    let actual = input.read_string()?;
    if actual != codec {
        return Err(Error::corrupt_index(
            input.name(),
            format!("codec mismatch: actual codec={actual} vs expected codec={codec}"),
        ));
    }
    let version = input.read_u32()?;
    if version < min_version {
        return Err(ErrorKind::IndexFormatTooOld {
            resource: input.name().to_string(),
            version,
            min: min_version,
            max: max_version,
        }
        .into());
    }
    if version > max_version {
        return Err(ErrorKind::IndexFormatTooNew {
            resource: input.name().to_string(),
            version,
            min: min_version,
            max: max_version,
        }
        .into());
    }
    Ok(version)
}

/// Writes the footer. Must be the last thing written before `close()`.
pub fn write_footer(out: &mut IndexOutput) -> Result<()> {
    out.write_u32(FOOTER_MAGIC)?;
    out.write_u32(CHECKSUM_XXH3)?;
    let checksum = out.checksum();
    out.write_u64(checksum)
}

/// Validates the footer structure and returns the stored checksum, without
/// reading the file body. Leaves `input` positioned at the end of the file.
pub fn check_footer(input: &mut IndexInput) -> Result<u64> {
    if input.length() < FOOTER_LENGTH {
        return Err(Error::corrupt_index(
            input.name(),
            format!(
                "file is too short ({} bytes) to contain a footer",
                input.length()
            ),
        ));
    }
    input.seek(input.length() - FOOTER_LENGTH)?;
    let magic = input.read_u32()?;
    if magic != FOOTER_MAGIC {
        return Err(Error::corrupt_index(
            input.name(),
            format!("codec footer mismatch: actual footer={magic:#010x} vs expected footer={FOOTER_MAGIC:#010x}"),
        ));
    }
    let algorithm = input.read_u32()?;
    if algorithm != CHECKSUM_XXH3 {
        return Err(Error::corrupt_index(
            input.name(),
            format!("unknown checksum algorithm {algorithm}"),
        ));
    }
    input.read_u64()
}

/// Recomputes the checksum of the whole file and compares it with the footer.
/// Returns the checksum on success.
pub fn verify_checksum(input: &mut IndexInput) -> Result<u64> {
    let expected = check_footer(input)?;
    let body_len = input.length() - 8;
    input.seek(0)?;
    let mut hasher = Xxh3::new();
    let mut remaining = body_len;
    while remaining > 0 {
        let len = remaining.min(64 * 1024) as usize;
        let chunk = input.read_slice(len)?;
        hasher.update(&chunk);
        remaining -= len as u64;
    }
    let actual = hasher.digest();
    if actual != expected {
        return Err(ErrorKind::ChecksumMismatch {
            resource: input.name().to_string(),
            expected,
            actual,
        }
        .into());
    }
    Ok(actual)
}

/// Returns the position where the footer starts, i.e. the end of the file body.
pub fn footer_start(input: &IndexInput) -> Result<u64> {
    input.length().checked_sub(FOOTER_LENGTH).ok_or_else(|| {
        Error::corrupt_index(input.name(), "file is too short to contain a footer")
    })
}

#[cfg(test)]
mod tests {
    use quarry_common::error::ErrorKind;

    use super::*;
    use crate::MemoryFile;

    fn write_file(codec: &str, version: u32, body: &[u8]) -> MemoryFile {
        let file = MemoryFile::new();
        let mut out = IndexOutput::new("test", Box::new(file.clone()));
        write_header(&mut out, codec, version).unwrap();
        assert_eq!(out.file_pointer(), header_length(codec));
        out.write_bytes(body).unwrap();
        write_footer(&mut out).unwrap();
        out.close().unwrap();
        file
    }

    #[test]
    fn test_header_and_footer() {
        let file = write_file("Lucene40PostingsWriterFrq", 1, b"postings");
        let mut input = IndexInput::open("test", file.to_read_at()).unwrap();
        assert_eq!(
            check_header(&mut input, "Lucene40PostingsWriterFrq", 0, 1).unwrap(),
            1
        );
        let mut body = [0u8; 8];
        input.read_bytes(&mut body).unwrap();
        assert_eq!(&body, b"postings");
        assert_eq!(footer_start(&input).unwrap(), input.file_pointer());
        let stored = check_footer(&mut input).unwrap();
        assert_eq!(verify_checksum(&mut input).unwrap(), stored);
    }

    #[test]
    fn test_header_rejects_wrong_codec_and_versions() {
        let file = write_file("Lucene40PostingsWriterPrx", 3, b"");
        let mut input = IndexInput::open("test", file.to_read_at()).unwrap();
        let err = check_header(&mut input, "Lucene40PostingsWriterFrq", 0, 3).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CorruptIndex { .. }));

        input.seek(0).unwrap();
        let err = check_header(&mut input, "Lucene40PostingsWriterPrx", 0, 1).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IndexFormatTooNew { version: 3, .. }));

        input.seek(0).unwrap();
        let err = check_header(&mut input, "Lucene40PostingsWriterPrx", 4, 5).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IndexFormatTooOld { version: 3, .. }));
        assert!(err.is_corruption());
    }

    #[test]
    fn test_bad_magic() {
        let mut input = IndexInput::from_bytes("junk", vec![0u8; 32]).unwrap();
        assert!(check_header(&mut input, "x", 0, 0).unwrap_err().is_corruption());
        assert!(check_footer(&mut input).unwrap_err().is_corruption());
        let mut tiny = IndexInput::from_bytes("tiny", vec![0u8; 3]).unwrap();
        assert!(check_footer(&mut tiny).unwrap_err().is_corruption());
    }

    #[test]
    fn test_checksum_detects_flipped_byte() {
        let file = write_file("codec", 0, &[7u8; 1000]);
        let mut bytes = file.to_bytes().to_vec();
        bytes[500] ^= 0x01;
        let mut input = IndexInput::from_bytes("flipped", bytes).unwrap();
        check_footer(&mut input).unwrap();
        let err = verify_checksum(&mut input).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ChecksumMismatch { .. }));
    }
}
