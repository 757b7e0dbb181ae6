//! Pluggable byte-stream transforms applied to whole column chunks

use crate::{NestcolError, Result};
use serde::{Deserialize, Serialize};

/// Compression applied to every chunk of a file; recorded in the footer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "codec", content = "level", rename_all = "snake_case")]
pub enum Compression {
    Uncompressed,
    #[default]
    Snappy,
    Zstd(i32),
    Lz4,
}

/// A reversible transform over a chunk body
pub trait Codec {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Invert [`Codec::compress`]; `uncompressed_len` comes from the footer
    fn decompress(&self, input: &[u8], uncompressed_len: usize) -> Result<Vec<u8>>;
}

impl Compression {
    /// Zstd at the library's default level
    pub fn zstd_default() -> Self {
        Compression::Zstd(zstd::DEFAULT_COMPRESSION_LEVEL)
    }

    pub fn codec(&self) -> Box<dyn Codec> {
        match self {
            Compression::Uncompressed => Box::new(Identity),
            Compression::Snappy => Box::new(SnappyCodec),
            Compression::Zstd(level) => Box::new(ZstdCodec { level: *level }),
            Compression::Lz4 => Box::new(Lz4Codec),
        }
    }
}

/// Largest output one LZ4 block byte can expand to
const LZ4_MAX_EXPANSION: usize = 255;
/// Largest output one zstd frame byte may expand to when the frame omits its size
const ZSTD_MAX_EXPANSION: usize = 1 << 16;

fn implausible_length(name: &str, declared: usize, detail: String) -> NestcolError {
    NestcolError::corrupt_chunk(format!(
        "{} chunk cannot hold the {} bytes the footer declares: {}",
        name, declared, detail
    ))
}

fn check_expansion(name: &str, input: &[u8], declared: usize, ratio: usize) -> Result<()> {
    let limit = input.len().saturating_mul(ratio).saturating_add(64);
    if declared > limit {
        return Err(implausible_length(
            name,
            declared,
            format!("{} compressed bytes expand to at most {}", input.len(), limit),
        ));
    }
    Ok(())
}

fn decompressed_size_check(name: &str, out: Vec<u8>, expected: usize) -> Result<Vec<u8>> {
    if out.len() != expected {
        return Err(NestcolError::corrupt_chunk(format!(
            "{} produced {} bytes, footer declares {}",
            name,
            out.len(),
            expected
        )));
    }
    Ok(out)
}

struct Identity;

impl Codec for Identity {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }

    fn decompress(&self, input: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
        if input.len() != uncompressed_len {
            return Err(implausible_length(
                "uncompressed",
                uncompressed_len,
                format!("chunk is {} bytes", input.len()),
            ));
        }
        Ok(input.to_vec())
    }
}

struct SnappyCodec;

impl Codec for SnappyCodec {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        snap::raw::Encoder::new()
            .compress_vec(input)
            .map_err(|e| NestcolError::Io(std::io::Error::other(e)))
    }

    fn decompress(&self, input: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
        let header_len = snap::raw::decompress_len(input)
            .map_err(|e| NestcolError::corrupt_chunk(format!("snappy: {}", e)))?;
        if header_len != uncompressed_len {
            return Err(implausible_length(
                "snappy",
                uncompressed_len,
                format!("stream header says {}", header_len),
            ));
        }
        let out = snap::raw::Decoder::new()
            .decompress_vec(input)
            .map_err(|e| NestcolError::corrupt_chunk(format!("snappy: {}", e)))?;
        decompressed_size_check("snappy", out, uncompressed_len)
    }
}

struct ZstdCodec {
    level: i32,
}

impl Codec for ZstdCodec {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(zstd::bulk::compress(input, self.level)?)
    }

    fn decompress(&self, input: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
        match zstd::zstd_safe::get_frame_content_size(input) {
            Ok(Some(size)) if size != uncompressed_len as u64 => {
                return Err(implausible_length(
                    "zstd",
                    uncompressed_len,
                    format!("frame header says {}", size),
                ))
            }
            Ok(Some(_)) => {}
            Ok(None) => check_expansion("zstd", input, uncompressed_len, ZSTD_MAX_EXPANSION)?,
            Err(e) => return Err(NestcolError::corrupt_chunk(format!("zstd: {}", e))),
        }
        let out = zstd::bulk::decompress(input, uncompressed_len)
            .map_err(|e| NestcolError::corrupt_chunk(format!("zstd: {}", e)))?;
        decompressed_size_check("zstd", out, uncompressed_len)
    }
}

struct Lz4Codec;

impl Codec for Lz4Codec {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_flex::block::compress(input))
    }

    fn decompress(&self, input: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
        check_expansion("lz4", input, uncompressed_len, LZ4_MAX_EXPANSION)?;
        let out = lz4_flex::block::decompress(input, uncompressed_len)
            .map_err(|e| NestcolError::corrupt_chunk(format!("lz4: {}", e)))?;
        decompressed_size_check("lz4", out, uncompressed_len)
    }
}
