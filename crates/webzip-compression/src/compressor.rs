//! Core compression functionality

use crate::encoding::ContentEncoding;
use bytes::Bytes;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::io::Write;

/// Maximum flate2 compression level
const MAX_LEVEL: u32 = 9;

/// One-pass compressor for complete response bodies
#[derive(Debug, Clone, Copy)]
pub struct Compressor;

impl Compressor {
    /// Compress data using the specified encoding and level
    pub fn compress(
        data: &[u8],
        encoding: ContentEncoding,
        level: u32,
    ) -> Result<Bytes, std::io::Error> {
        let level = Compression::new(level.min(MAX_LEVEL));
        match encoding {
            ContentEncoding::Deflate => Self::compress_deflate(data, level),
            ContentEncoding::Gzip => Self::compress_gzip(data, level),
        }
    }

    fn compress_deflate(data: &[u8], level: Compression) -> Result<Bytes, std::io::Error> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), level);
        encoder.write_all(data)?;
        Ok(Bytes::from(encoder.finish()?))
    }

    fn compress_gzip(data: &[u8], level: Compression) -> Result<Bytes, std::io::Error> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), level);
        encoder.write_all(data)?;
        Ok(Bytes::from(encoder.finish()?))
    }
}
