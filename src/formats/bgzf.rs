//! BGZF block framing.
//!
//! BGZF is a series of concatenated gzip members ("blocks"), each holding at
//! most 64 KiB of uncompressed data. Every block carries its own compressed
//! size in a `BC` extra subfield and its uncompressed size in the gzip
//! footer, so block boundaries can be walked without inflating anything.
//!
//! Positions inside a BGZF stream are expressed as [`VirtualOffset`]s.

use crate::{Error, Result};
use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::fmt;
use std::io::Read;

/// Upper bound on the compressed (and uncompressed) size of one block.
pub const MAX_BLOCK_SIZE: u64 = 65536;

/// gzip ID1, ID2, CM (deflate).
const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];
const FLG_FEXTRA: u8 = 0x04;

/// Fixed gzip header including XLEN.
const HEADER_LEN: usize = 12;
/// CRC32 + ISIZE.
const FOOTER_LEN: usize = 8;

/// A BGZF virtual file offset.
///
/// Packed on disk as a little-endian `u64`: the high 48 bits hold the
/// compressed offset of a block, the low 16 bits the offset inside that
/// block's decompressed bytes. Ordering is by compressed offset, then
/// uncompressed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VirtualOffset {
    compressed: u64,
    uncompressed: u16,
}

impl VirtualOffset {
    pub fn new(compressed: u64, uncompressed: u16) -> Self {
        Self {
            compressed,
            uncompressed,
        }
    }

    /// Decode from 8 little-endian bytes.
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self::from(u64::from_le_bytes(bytes))
    }

    /// Compressed byte offset of the block.
    pub fn compressed(&self) -> u64 {
        self.compressed
    }

    /// Offset within the decompressed block.
    pub fn uncompressed(&self) -> u16 {
        self.uncompressed
    }

    pub fn as_raw(&self) -> u64 {
        (self.compressed << 16) | u64::from(self.uncompressed)
    }
}

impl From<u64> for VirtualOffset {
    fn from(raw: u64) -> Self {
        Self::new(raw >> 16, (raw & 0xffff) as u16)
    }
}

impl fmt::Display for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.compressed, self.uncompressed)
    }
}

/// Sizes of one block, read from its framing alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockFrame {
    /// Total size of the block on disk, header and footer included.
    pub compressed_size: usize,
    /// Size of the block's payload once inflated.
    pub uncompressed_size: usize,
    /// Length of the gzip extra field.
    xlen: usize,
}

/// One inflated block and where it came from.
#[derive(Debug, Clone)]
pub struct InflatedBlock {
    /// Offset of the block within the buffer it was read from.
    pub offset: usize,
    pub compressed_size: usize,
    pub data: Vec<u8>,
}

fn truncated(position: usize) -> Error {
    Error::Format(format!("truncated BGZF block at offset {}", position))
}

fn read_u16(buffer: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buffer[at], buffer[at + 1]])
}

fn read_u32(buffer: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buffer[at], buffer[at + 1], buffer[at + 2], buffer[at + 3]])
}

/// Read the framing of the block starting at `position` without inflating it.
///
/// The whole block must be present in `buffer`, since the uncompressed size
/// lives in the footer.
pub fn block_frame(buffer: &[u8], position: usize) -> Result<BlockFrame> {
    let header = buffer
        .get(position..position + HEADER_LEN)
        .ok_or_else(|| truncated(position))?;

    if header[..3] != GZIP_MAGIC || header[3] & FLG_FEXTRA == 0 {
        return Err(Error::Format(format!(
            "not a BGZF block at offset {}",
            position
        )));
    }

    let xlen = read_u16(header, 10) as usize;
    let extra = buffer
        .get(position + HEADER_LEN..position + HEADER_LEN + xlen)
        .ok_or_else(|| truncated(position))?;

    // Walk the extra subfields looking for SI1='B', SI2='C', SLEN=2
    let mut bsize = None;
    let mut cursor = 0;
    while cursor + 4 <= extra.len() {
        let slen = read_u16(extra, cursor + 2) as usize;
        if extra[cursor] == b'B' && extra[cursor + 1] == b'C' && slen == 2 {
            if cursor + 6 > extra.len() {
                break;
            }
            bsize = Some(read_u16(extra, cursor + 4));
            break;
        }
        cursor += 4 + slen;
    }

    let bsize = bsize.ok_or_else(|| {
        Error::Format(format!(
            "unable to determine block size at offset {}",
            position
        ))
    })?;

    let compressed_size = bsize as usize + 1;
    if compressed_size < HEADER_LEN + xlen + FOOTER_LEN {
        return Err(Error::Format(format!(
            "BGZF block at offset {} is smaller than its own framing",
            position
        )));
    }
    if buffer.len() < position + compressed_size {
        return Err(truncated(position));
    }

    let uncompressed_size = read_u32(buffer, position + compressed_size - 4) as usize;

    Ok(BlockFrame {
        compressed_size,
        uncompressed_size,
        xlen,
    })
}

/// Inflate exactly one block starting at `position`.
pub fn inflate_one(buffer: &[u8], position: usize) -> Result<Vec<u8>> {
    let frame = block_frame(buffer, position)?;
    inflate_framed(buffer, position, &frame)
}

/// Inflate the block at `position` whose framing has already been read.
fn inflate_framed(buffer: &[u8], position: usize, frame: &BlockFrame) -> Result<Vec<u8>> {
    let block = &buffer[position..position + frame.compressed_size];
    let cdata = &block[HEADER_LEN + frame.xlen..frame.compressed_size - FOOTER_LEN];

    let mut data = Vec::with_capacity(frame.uncompressed_size);
    DeflateDecoder::new(cdata)
        .read_to_end(&mut data)
        .map_err(|e| {
            Error::Format(format!(
                "BGZF decompression failed at offset {}: {}",
                position, e
            ))
        })?;

    if data.len() != frame.uncompressed_size {
        return Err(Error::Format(format!(
            "BGZF block at offset {} inflated to {} bytes, expected {}",
            position,
            data.len(),
            frame.uncompressed_size
        )));
    }

    let expected_crc = read_u32(block, frame.compressed_size - FOOTER_LEN);
    let mut crc = Crc::new();
    crc.update(&data);
    if crc.sum() != expected_crc {
        return Err(Error::Format(format!(
            "BGZF block at offset {} failed CRC check",
            position
        )));
    }

    Ok(data)
}

/// Inflate back-to-back blocks from the start of `buffer`.
///
/// Stops at the end of the buffer, or before the first block that would
/// start at or after `stop_before`.
pub fn inflate_run(buffer: &[u8], stop_before: Option<usize>) -> Result<Vec<InflatedBlock>> {
    let stop = stop_before.unwrap_or(buffer.len()).min(buffer.len());

    let mut blocks = Vec::new();
    let mut position = 0;
    while position < stop {
        let frame = block_frame(buffer, position)?;
        let data = inflate_framed(buffer, position, &frame)?;
        blocks.push(InflatedBlock {
            offset: position,
            compressed_size: frame.compressed_size,
            data,
        });
        position += frame.compressed_size;
    }

    Ok(blocks)
}

/// Concatenate the payloads of `blocks` in order.
pub fn concat_uncompressed(blocks: &[InflatedBlock]) -> Vec<u8> {
    let total = blocks.iter().map(|b| b.data.len()).sum();
    let mut output = Vec::with_capacity(total);
    for block in blocks {
        output.extend_from_slice(&block.data);
    }
    output
}

/// Inflate an entire BGZF buffer, the way `gzip -d` would.
pub fn inflate_all(buffer: &[u8]) -> Result<Vec<u8>> {
    Ok(concat_uncompressed(&inflate_run(buffer, None)?))
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------
