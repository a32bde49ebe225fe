//! Deflate compression with a self-checking zlib-style frame.
//!
//! ```text
//! [ 0x78 0x9C ][ raw deflate stream ][ adler32(uncompressed) : u32 BE ]
//! ```
//!
//! Decompression never trusts the deflate end-of-block marker alone: the
//! header check bits, the stream length and the Adler-32 trailer must all agree.

use std::io::Write;

use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};

use crate::codec::error::{CodecError, CodecResult};

const HEADER: [u8; 2] = [0x78, 0x9C];
const HEADER_LEN: usize = 2;
const TRAILER_LEN: usize = 4;
const ADLER_MOD: u32 = 65_521;
/// Upper bound on an inflated payload.
pub const MAX_INFLATED_LEN: usize = 64 * 1024 * 1024;

/// A stateless compressor over byte buffers.
pub trait CompressionAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>>;

    fn decompress(&self, frame: &[u8]) -> CodecResult<Vec<u8>>;

    /// Cheap header check. Never fails.
    fn can_decompress(&self, data: &[u8]) -> bool;
}

/// True if `data` begins with one of the zlib headers this codec accepts.
pub fn has_zlib_header(data: &[u8]) -> bool {
    matches!(data, [0x78, 0x01 | 0x9C | 0xDA, ..])
}

/// Adler-32 over `data`.
pub fn adler32(data: &[u8]) -> u32 {
    // 5552 is the largest block for which `b` cannot overflow before the modulo.
    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for chunk in data.chunks(5552) {
        for &byte in chunk {
            a += u32::from(byte);
            b += a;
        }
        a %= ADLER_MOD;
        b %= ADLER_MOD;
    }
    (b << 16) | a
}

#[derive(Debug, Clone)]
pub struct DeflateAdapter {
    level: Compression,
}

impl DeflateAdapter {
    pub const NAME: &'static str = "deflate";

    pub fn new(level: Compression) -> Self {
        Self { level }
    }
}

impl Default for DeflateAdapter {
    fn default() -> Self {
        Self::new(Compression::default())
    }
}

impl CompressionAdapter for DeflateAdapter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        let mut frame = Vec::with_capacity(HEADER_LEN + data.len() / 2 + TRAILER_LEN + 16);
        frame.extend_from_slice(&HEADER);

        let mut encoder = DeflateEncoder::new(frame, self.level);
        encoder.write_all(data)?;
        let mut frame = encoder.finish()?;

        frame.extend_from_slice(&adler32(data).to_be_bytes());
        Ok(frame)
    }

    fn decompress(&self, frame: &[u8]) -> CodecResult<Vec<u8>> {
        if frame.len() < HEADER_LEN + TRAILER_LEN {
            return Err(CodecError::Checksum(format!(
                "frame of {} bytes is too short",
                frame.len()
            )));
        }

        let (cmf, flg) = (frame[0], frame[1]);
        if cmf != 0x78 || ((u16::from(cmf) << 8) | u16::from(flg)) % 31 != 0 {
            return Err(CodecError::Checksum(format!(
                "invalid zlib header {:02x}{:02x}",
                cmf, flg
            )));
        }
        if flg & 0x20 != 0 {
            return Err(CodecError::Checksum("preset dictionary not supported".into()));
        }

        let body = &frame[HEADER_LEN..frame.len() - TRAILER_LEN];
        let mut trailer = [0u8; TRAILER_LEN];
        trailer.copy_from_slice(&frame[frame.len() - TRAILER_LEN..]);
        let expected = u32::from_be_bytes(trailer);

        let inflated = inflate_exact(body)?;
        let actual = adler32(&inflated);
        if actual != expected {
            return Err(CodecError::Checksum(format!(
                "adler-32 mismatch: expected {:08x}, computed {:08x}",
                expected, actual
            )));
        }
        Ok(inflated)
    }

    fn can_decompress(&self, data: &[u8]) -> bool {
        has_zlib_header(data)
    }
}

/// Inflate a raw deflate stream that must end exactly at the end of `body`.
fn inflate_exact(body: &[u8]) -> CodecResult<Vec<u8>> {
    let mut inflater = Decompress::new(false);
    let mut out = Vec::with_capacity(body.len().saturating_mul(4).max(64));

    loop {
        if out.len() == out.capacity() {
            if out.len() >= MAX_INFLATED_LEN {
                return Err(CodecError::InvalidPayload(format!(
                    "inflated payload exceeds {} bytes",
                    MAX_INFLATED_LEN
                )));
            }
            out.reserve(out.len().max(64));
        }

        let consumed = inflater.total_in() as usize;
        let produced = inflater.total_out();
        let status = inflater
            .decompress_vec(&body[consumed..], &mut out, FlushDecompress::None)
            .map_err(|e| CodecError::Checksum(format!("corrupt deflate stream: {}", e)))?;

        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError => {
                let stalled =
                    inflater.total_in() as usize == consumed && inflater.total_out() == produced;
                if stalled && out.len() < out.capacity() {
                    return Err(CodecError::Checksum("truncated deflate stream".into()));
                }
            }
        }
    }

    if inflater.total_in() as usize != body.len() {
        return Err(CodecError::Checksum(format!(
            "{} trailing bytes after deflate stream",
            body.len() - inflater.total_in() as usize
        )));
    }
    Ok(out)
}
