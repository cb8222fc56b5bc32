//! Tabix (`.tbi`) index parsing.
//!
//! The index is itself BGZF-compressed. Opening it inflates the whole file
//! once, parses the fixed header and records, per contig, the byte span of
//! that contig's binning and linear index. Bins and linear offsets are only
//! decoded when a query first touches the contig.
//!
//! # Format
//!
//! ## Header (little-endian)
//! - Magic: `TBI\1` (4 bytes)
//! - n_ref, format, col_seq, col_beg, col_end, meta, skip, l_nm (int32 each)
//! - names: `l_nm` bytes of NUL-terminated contig names
//!
//! ## Per contig
//! - n_bin (int32), then per bin: bin (uint32), n_chunk (int32),
//!   `n_chunk * 16` bytes of chunk begin/end virtual offsets
//! - n_intv (int32), then `n_intv * 8` bytes of linear index offsets

use super::bgzf::{self, VirtualOffset};
use super::binning;
use super::indexed::OverlapFilter;
use crate::{Error, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Tabix magic string
const TBI_MAGIC: &[u8; 4] = b"TBI\x01";

/// Size of one encoded chunk: two virtual offsets.
const CHUNK_LEN: usize = 16;
/// Size of one encoded linear index entry.
const INTERVAL_LEN: usize = 8;

/// A contiguous span of virtual offsets holding records for one bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub begin: VirtualOffset,
    pub end: VirtualOffset,
}

impl Chunk {
    fn from_le_bytes(bytes: &[u8]) -> Self {
        let mut begin = [0u8; 8];
        let mut end = [0u8; 8];
        begin.copy_from_slice(&bytes[..8]);
        end.copy_from_slice(&bytes[8..16]);
        Self {
            begin: VirtualOffset::from_le_bytes(begin),
            end: VirtualOffset::from_le_bytes(end),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }
}

/// A bin of the binning index, with its chunks still encoded.
#[derive(Debug, Clone)]
pub struct Bin {
    id: u32,
    chunk_data: Bytes,
}

impl Bin {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_data.len() / CHUNK_LEN
    }

    /// Decode this bin's chunks.
    pub fn chunks(&self) -> Vec<Chunk> {
        self.chunk_data
            .chunks_exact(CHUNK_LEN)
            .map(Chunk::from_le_bytes)
            .collect()
    }
}

/// Binning and linear index of one contig.
#[derive(Debug, Clone)]
pub struct ContigIndex {
    bins: HashMap<u32, Bin>,
    intervals: Bytes,
}

impl ContigIndex {
    pub fn bin(&self, id: u32) -> Option<&Bin> {
        self.bins.get(&id)
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    pub fn interval_count(&self) -> usize {
        self.intervals.len() / INTERVAL_LEN
    }

    /// Linear index entry for tile `i`.
    pub fn interval(&self, i: usize) -> Option<VirtualOffset> {
        let bytes = self
            .intervals
            .get(i * INTERVAL_LEN..(i + 1) * INTERVAL_LEN)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Some(VirtualOffset::from_le_bytes(raw))
    }

    /// Smallest virtual offset a record at or after 0-based `begin` can have.
    ///
    /// Positions past the last tile use the last entry; an empty linear
    /// index prunes nothing.
    pub fn min_offset(&self, begin: u32) -> VirtualOffset {
        let count = self.interval_count();
        if count == 0 {
            return VirtualOffset::default();
        }
        let tile = binning::linear_tile(begin).min(count - 1);
        self.interval(tile).unwrap_or_default()
    }

    /// Minimal, sorted chunk list covering the 0-based half-open `[begin, end)`.
    pub fn chunks_for_interval(&self, begin: u32, end: u32) -> Vec<Chunk> {
        let chunks = binning::bins_for_region(begin, end)
            .into_iter()
            .filter_map(|id| self.bins.get(&id))
            .flat_map(Bin::chunks)
            .collect();
        binning::optimize_chunks(chunks, self.min_offset(begin))
    }
}

/// Record layout declared by the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Generic,
    Sam,
    Vcf,
}

impl IndexFormat {
    fn from_code(code: i32) -> Self {
        match code & 0xffff {
            1 => IndexFormat::Sam,
            2 => IndexFormat::Vcf,
            _ => IndexFormat::Generic,
        }
    }
}

/// Fixed header fields of a tabix index.
#[derive(Debug, Clone)]
pub struct IndexHeader {
    pub format: IndexFormat,
    pub format_code: i32,
    pub col_seq: i32,
    pub col_begin: i32,
    pub col_end: i32,
    pub comment_char: char,
    pub skip_lines: i32,
    pub names: Vec<String>,
}

/// Per-contig slot, parsed on first use.
#[derive(Debug)]
struct LazyContig {
    span: Range<usize>,
    parsed: OnceCell<Arc<ContigIndex>>,
}

/// An opened tabix index.
#[derive(Debug)]
pub struct TabixIndex {
    header: IndexHeader,
    filter: OverlapFilter,
    buffer: Bytes,
    contigs: HashMap<String, LazyContig>,
}

/// Bounds-checked little-endian reader over the inflated index.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn take(&mut self, len: usize) -> Result<Range<usize>> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                Error::Format(format!(
                    "index truncated: needed {} bytes at offset {}",
                    len, self.pos
                ))
            })?;
        let range = self.pos..end;
        self.pos = end;
        Ok(range)
    }

    fn i32(&mut self) -> Result<i32> {
        let range = self.take(4)?;
        let b = &self.data[range];
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(self.i32()? as u32)
    }

    /// A non-negative count.
    fn count(&mut self, what: &str) -> Result<usize> {
        let value = self.i32()?;
        usize::try_from(value)
            .map_err(|_| Error::Format(format!("negative {} in index: {}", what, value)))
    }

    fn array(&mut self, what: &str, item_len: usize) -> Result<Range<usize>> {
        let n = self.count(what)?;
        let len = n
            .checked_mul(item_len)
            .ok_or_else(|| Error::Format(format!("{} overflows index", what)))?;
        self.take(len)
    }

    /// Skip one contig's bins and linear index without decoding them.
    fn skip_contig(&mut self) -> Result<()> {
        let n_bin = self.count("bin count")?;
        for _ in 0..n_bin {
            self.u32()?;
            self.array("chunk count", CHUNK_LEN)?;
        }
        self.array("interval count", INTERVAL_LEN)?;
        Ok(())
    }
}

fn parse_names(block: &[u8]) -> Result<Vec<String>> {
    let trimmed = match block.iter().rposition(|&b| b != 0) {
        Some(last) => &block[..=last],
        None => return Ok(Vec::new()),
    };
    trimmed
        .split(|&b| b == 0)
        .map(|name| {
            String::from_utf8(name.to_vec())
                .map_err(|_| Error::Format("contig name is not valid UTF-8".to_string()))
        })
        .collect()
}

/// Decode the bins and linear index stored in `buffer[span]`.
fn parse_contig(buffer: &Bytes, span: Range<usize>) -> Result<ContigIndex> {
    let data = buffer.slice(span);
    let mut reader = Reader::new(&data, 0);

    let n_bin = reader.count("bin count")?;
    let mut bins = HashMap::with_capacity(n_bin);
    for _ in 0..n_bin {
        let id = reader.u32()?;
        let chunk_range = reader.array("chunk count", CHUNK_LEN)?;
        bins.insert(
            id,
            Bin {
                id,
                chunk_data: data.slice(chunk_range),
            },
        );
    }
    let intervals = data.slice(reader.array("interval count", INTERVAL_LEN)?);

    if reader.pos != data.len() {
        return Err(Error::Format(format!(
            "contig index has {} trailing bytes",
            data.len() - reader.pos
        )));
    }

    Ok(ContigIndex { bins, intervals })
}

impl TabixIndex {
    /// Open an index from its compressed file contents.
    pub fn from_compressed(bytes: &[u8]) -> Result<Self> {
        let inflated = bgzf::inflate_all(bytes)?;
        Self::from_uncompressed(Bytes::from(inflated))
    }

    /// Open an index from already-inflated bytes.
    pub fn from_uncompressed(buffer: Bytes) -> Result<Self> {
        let mut reader = Reader::new(&buffer, 0);

        let magic = reader.take(4)?;
        if &buffer[magic] != TBI_MAGIC {
            return Err(Error::Format("not a tabix index (bad magic)".to_string()));
        }

        let n_ref = reader.count("reference count")?;
        let format_code = reader.i32()?;
        let col_seq = reader.i32()?;
        let col_begin = reader.i32()?;
        let col_end = reader.i32()?;
        let meta = reader.u32()?;
        let skip_lines = reader.i32()?;
        let names_range = reader.array("name block length", 1)?;
        let names = parse_names(&buffer[names_range])?;

        if names.len() != n_ref {
            return Err(Error::Format(format!(
                "index declares {} contigs but names {}",
                n_ref,
                names.len()
            )));
        }

        let comment_char = char::from_u32(meta)
            .ok_or_else(|| Error::Format(format!("invalid comment character code {}", meta)))?;

        let mut contigs = HashMap::with_capacity(n_ref);
        for name in &names {
            let start = reader.pos;
            reader.skip_contig()?;
            let lazy = LazyContig {
                span: start..reader.pos,
                parsed: OnceCell::new(),
            };
            if contigs.insert(name.clone(), lazy).is_some() {
                return Err(Error::Format(format!("duplicate contig in index: {}", name)));
            }
        }

        let format = IndexFormat::from_code(format_code);
        let filter = match format {
            IndexFormat::Vcf => OverlapFilter::Vcf,
            _ => OverlapFilter::Any,
        };

        tracing::debug!(
            "opened tabix index: {} contigs, format {:?}, comment {:?}",
            names.len(),
            format,
            comment_char
        );

        Ok(Self {
            header: IndexHeader {
                format,
                format_code,
                col_seq,
                col_begin,
                col_end,
                comment_char,
                skip_lines,
                names,
            },
            filter,
            buffer,
            contigs,
        })
    }

    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    /// Contig names in index order.
    pub fn contigs(&self) -> &[String] {
        &self.header.names
    }

    pub fn has_contig(&self, name: &str) -> bool {
        self.contigs.contains_key(name)
    }

    pub fn overlap_filter(&self) -> OverlapFilter {
        self.filter
    }

    /// Whether `name`'s bins have been decoded yet.
    pub fn is_parsed(&self, name: &str) -> bool {
        self.contigs
            .get(name)
            .is_some_and(|lazy| lazy.parsed.initialized())
    }

    /// The decoded index for `name`, parsing it on first access.
    ///
    /// Concurrent callers for the same contig share a single parse.
    pub async fn contig_index(&self, name: &str) -> Result<Arc<ContigIndex>> {
        let lazy = self
            .contigs
            .get(name)
            .ok_or_else(|| Error::ContigNotInIndex(name.to_string()))?;

        let parsed = lazy
            .parsed
            .get_or_try_init(|| async {
                tracing::debug!("parsing index for contig {}", name);
                parse_contig(&self.buffer, lazy.span.clone()).map(Arc::new)
            })
            .await?;

        Ok(Arc::clone(parsed))
    }

    /// Chunks that may hold records overlapping 1-based inclusive `[pos, end]`.
    pub async fn chunks_for_interval(&self, contig: &str, pos: u32, end: u32) -> Result<Vec<Chunk>> {
        let index = self.contig_index(contig).await?;
        let begin = pos.saturating_sub(1);
        let chunks = index.chunks_for_interval(begin, end.max(pos));
        tracing::debug!(
            "{}:{}-{} resolved to {} chunks",
            contig,
            pos,
            end,
            chunks.len()
        );
        Ok(chunks)
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use crate::formats::bgzf::VirtualOffset;

    /// One contig's worth of index content.
    pub struct ContigSpec {
        pub name: &'static str,
        pub bins: Vec<(u32, Vec<(VirtualOffset, VirtualOffset)>)>,
        pub intervals: Vec<VirtualOffset>,
    }

    /// Encode an uncompressed tabix index with VCF layout.
    pub fn encode_index(contigs: &[ContigSpec]) -> Vec<u8> {
        let mut names = Vec::new();
        for contig in contigs {
            names.extend_from_slice(contig.name.as_bytes());
            names.push(0);
        }

        let mut out = Vec::new();
        out.extend_from_slice(b"TBI\x01");
        for value in [contigs.len() as i32, 2, 1, 2, 0, '#' as i32, 0] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(&(names.len() as i32).to_le_bytes());
        out.extend_from_slice(&names);

        for contig in contigs {
            out.extend_from_slice(&(contig.bins.len() as i32).to_le_bytes());
            for (id, chunks) in &contig.bins {
                out.extend_from_slice(&id.to_le_bytes());
                out.extend_from_slice(&(chunks.len() as i32).to_le_bytes());
                for (begin, end) in chunks {
                    out.extend_from_slice(&begin.as_raw().to_le_bytes());
                    out.extend_from_slice(&end.as_raw().to_le_bytes());
                }
            }
            out.extend_from_slice(&(contig.intervals.len() as i32).to_le_bytes());
            for offset in &contig.intervals {
                out.extend_from_slice(&offset.as_raw().to_le_bytes());
            }
        }
        out
    }
}
