// src/compression/mod.rs
//! Compression of extracted archives
//!
//! Tree and file archives are tar streams wrapped in one of the formats
//! below. Gzip is the default and produces the `.tgz` archives a
//! description store is expected to contain.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Compression applied to archives in a description store
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CompressionFormat {
    /// Plain tar
    None,
    #[default]
    Gzip,
    Zstd,
}

impl CompressionFormat {
    /// Archive file extension, without the leading dot
    ///
    /// ```
    /// use sysdescribe::compression::CompressionFormat;
    ///
    /// assert_eq!(CompressionFormat::Gzip.archive_extension(), "tgz");
    /// assert_eq!(CompressionFormat::Zstd.archive_extension(), "tar.zst");
    /// assert_eq!(CompressionFormat::None.archive_extension(), "tar");
    /// ```
    pub fn archive_extension(&self) -> &'static str {
        match self {
            Self::None => "tar",
            Self::Gzip => "tgz",
            Self::Zstd => "tar.zst",
        }
    }

    /// Detect the format from the first bytes of an archive
    ///
    /// Gzip starts with `1f 8b`, zstd with `28 b5 2f fd`.
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        match data {
            [0x1f, 0x8b, ..] => Self::Gzip,
            [0x28, 0xb5, 0x2f, 0xfd, ..] => Self::Zstd,
            _ => Self::None,
        }
    }
}

/// Compressing writer for one archive
pub enum Encoder<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
    Zstd(zstd::Encoder<'static, W>),
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W, format: CompressionFormat) -> io::Result<Self> {
        Ok(match format {
            CompressionFormat::None => Self::Plain(writer),
            CompressionFormat::Gzip => Self::Gzip(GzEncoder::new(writer, Compression::default())),
            CompressionFormat::Zstd => Self::Zstd(zstd::Encoder::new(writer, 0)?),
        })
    }

    /// Write any trailer and return the underlying writer
    pub fn finish(self) -> io::Result<W> {
        match self {
            Self::Plain(writer) => Ok(writer),
            Self::Gzip(encoder) => encoder.finish(),
            Self::Zstd(encoder) => encoder.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(writer) => writer.write(buf),
            Self::Gzip(encoder) => encoder.write(buf),
            Self::Zstd(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(writer) => writer.flush(),
            Self::Gzip(encoder) => encoder.flush(),
            Self::Zstd(encoder) => encoder.flush(),
        }
    }
}

/// Create a decompressing reader for the given format
pub fn create_decoder<'a, R: Read + 'a>(
    reader: R,
    format: CompressionFormat,
) -> io::Result<Box<dyn Read + 'a>> {
    Ok(match format {
        CompressionFormat::None => Box::new(reader),
        CompressionFormat::Gzip => Box::new(GzDecoder::new(reader)),
        CompressionFormat::Zstd => Box::new(zstd::Decoder::new(reader)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            CompressionFormat::from_magic_bytes(&[0x1f, 0x8b, 0x08, 0x00]),
            CompressionFormat::Gzip
        );
        assert_eq!(
            CompressionFormat::from_magic_bytes(&[0x28, 0xb5, 0x2f, 0xfd]),
            CompressionFormat::Zstd
        );
        assert_eq!(CompressionFormat::from_magic_bytes(&[0x1f]), CompressionFormat::None);
    }

    #[test]
    fn test_format_names() {
        assert_eq!(CompressionFormat::Gzip.to_string(), "gzip");
        assert_eq!(CompressionFormat::from_str("zstd").unwrap(), CompressionFormat::Zstd);
        assert_eq!(CompressionFormat::from_str("none").unwrap(), CompressionFormat::None);
        assert!(CompressionFormat::from_str("xz").is_err());
    }

    #[test]
    fn test_encode_decode() {
        for format in [CompressionFormat::None, CompressionFormat::Gzip, CompressionFormat::Zstd] {
            let mut encoder = Encoder::new(Vec::new(), format).unwrap();
            encoder.write_all(b"hello").unwrap();
            let data = encoder.finish().unwrap();
            assert_eq!(CompressionFormat::from_magic_bytes(&data), format);

            let mut output = Vec::new();
            create_decoder(data.as_slice(), format)
                .unwrap()
                .read_to_end(&mut output)
                .unwrap();
            assert_eq!(output, b"hello");
        }
    }
}
