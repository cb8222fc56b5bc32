//! Region reads over a BGZF data file through its tabix index.
//!
//! A region query resolves to a list of chunks; each chunk becomes one
//! byte-range read, the run of blocks it covers is inflated, and the
//! decompressed slice between the chunk's virtual offsets is split into
//! lines and filtered by the index's [`OverlapFilter`].

use super::bgzf::{self, MAX_BLOCK_SIZE};
use super::tabix::{Chunk, IndexFormat, TabixIndex};
use crate::storage::{ByteRange, Storage};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Per-line check that a record really overlaps the query.
///
/// Selected once from the index format code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapFilter {
    /// Accept every line the index returns.
    Any,
    /// VCF-aware: CHROM must match and `[POS, END]` must intersect the query.
    Vcf,
}

impl OverlapFilter {
    /// Whether `line` overlaps 1-based inclusive `[pos, end]` on `contig`.
    pub fn matches(&self, line: &str, contig: &str, pos: u32, end: u32) -> bool {
        match self {
            OverlapFilter::Any => true,
            OverlapFilter::Vcf => vcf_line_in_region(line, contig, pos, end),
        }
    }
}

fn info_end(info: &str) -> Option<u64> {
    info.split(';')
        .find_map(|entry| entry.strip_prefix("END="))
        .and_then(|value| value.parse().ok())
}

fn vcf_line_in_region(line: &str, contig: &str, pos: u32, end: u32) -> bool {
    let fields: Vec<&str> = line.splitn(9, '\t').take(8).collect();
    if fields.len() < 8 {
        // Malformed VCF line
        return false;
    }

    if fields[0] != contig {
        return false;
    }

    let Ok(start) = fields[1].parse::<u64>() else {
        return false;
    };
    if start > u64::from(end) {
        return false;
    }

    let record_end = info_end(fields[7])
        .unwrap_or_else(|| (start + fields[3].len() as u64).saturating_sub(1));
    record_end >= u64::from(pos)
}

/// Split decoded text on `\n` or `\r\n`, dropping empty lines.
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
}

fn decode_text(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| Error::Format(format!("data is not valid UTF-8: {}", e)))
}

/// Compressed bytes to request for `chunk`, starting at its first block.
fn chunk_read_length(chunk: &Chunk) -> u64 {
    let span = chunk.end.compressed() - chunk.begin.compressed();
    // The last block is only partially consumed, but must be read whole
    if chunk.end.uncompressed() > 0 {
        span + MAX_BLOCK_SIZE
    } else {
        span
    }
}

/// Decompressed bytes of `chunk`, given compressed data read from its first block.
fn decode_chunk(buffer: &[u8], chunk: &Chunk) -> Result<Vec<u8>> {
    let last_block = (chunk.end.compressed() - chunk.begin.compressed()) as usize;

    // Tally the uncompressed size of every block before the last one
    let mut position = 0;
    let mut preceding = 0;
    while position < last_block {
        let frame = bgzf::block_frame(buffer, position)?;
        preceding += frame.uncompressed_size;
        position += frame.compressed_size;
    }
    if position != last_block {
        return Err(Error::Format(format!(
            "chunk end {} does not fall on a block boundary",
            chunk.end
        )));
    }

    let stop_before = last_block + usize::from(chunk.end.uncompressed() > 0);
    let data = bgzf::concat_uncompressed(&bgzf::inflate_run(buffer, Some(stop_before))?);

    let start = chunk.begin.uncompressed() as usize;
    let end = preceding + chunk.end.uncompressed() as usize;
    if start > end || end > data.len() {
        return Err(Error::Format(format!(
            "chunk {}-{} lies outside its decompressed blocks",
            chunk.begin, chunk.end
        )));
    }

    let mut data = data;
    data.truncate(end);
    data.drain(..start);
    Ok(data)
}

/// Read one chunk and return its lines that pass `filter`.
pub async fn fetch_lines(
    storage: &dyn Storage,
    chunk: Chunk,
    filter: OverlapFilter,
    contig: &str,
    pos: u32,
    end: u32,
) -> Result<Vec<String>> {
    if chunk.is_empty() {
        return Ok(Vec::new());
    }

    let range = ByteRange::new(chunk.begin.compressed(), Some(chunk_read_length(&chunk)));
    tracing::debug!(
        "reading {} bytes at {} from {}",
        range.length.unwrap_or_default(),
        range.start,
        storage.describe()
    );
    let buffer = storage.read_bytes(range).await?;

    let text = decode_text(decode_chunk(&buffer, &chunk)?)?;
    Ok(split_lines(&text)
        .filter(|line| filter.matches(line, contig, pos, end))
        .map(str::to_string)
        .collect())
}

/// Read the header lines at the start of the data file.
///
/// Returns every line up to and including the last one starting with
/// `comment`. The header must fit in the first block.
pub async fn fetch_header(storage: &dyn Storage, comment: char) -> Result<Vec<String>> {
    let buffer = storage
        .read_bytes(ByteRange::new(0, Some(MAX_BLOCK_SIZE)))
        .await?;
    let text = decode_text(bgzf::inflate_one(&buffer, 0)?)?;

    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    match lines.iter().rposition(|line| line.starts_with(comment)) {
        None => Ok(Vec::new()),
        Some(last) if last == lines.len() - 1 => Err(Error::Unsupported(
            "headers larger than a single BGZF block".to_string(),
        )),
        Some(last) => Ok(lines[..=last].iter().map(|line| line.to_string()).collect()),
    }
}

/// A BGZF-compressed, tabix-indexed data file.
pub struct TabixIndexedFile {
    data: Arc<dyn Storage>,
    index: Arc<TabixIndex>,
}

impl TabixIndexedFile {
    /// Load and parse the index, keeping `data` for record reads.
    pub async fn open(data: Arc<dyn Storage>, index: Arc<dyn Storage>) -> Result<Self> {
        let bytes = index.read_bytes(ByteRange::all()).await?;
        let parsed = TabixIndex::from_compressed(&bytes)?;
        tracing::debug!("loaded index {} for {}", index.describe(), data.describe());
        Ok(Self::from_index(data, parsed))
    }

    pub fn from_index(data: Arc<dyn Storage>, index: TabixIndex) -> Self {
        Self {
            data,
            index: Arc::new(index),
        }
    }

    pub fn index(&self) -> &TabixIndex {
        &self.index
    }

    /// Contig names in index order.
    pub fn contigs(&self) -> &[String] {
        self.index.contigs()
    }

    pub fn format(&self) -> IndexFormat {
        self.index.header().format
    }

    pub fn comment_char(&self) -> char {
        self.index.header().comment_char
    }

    pub fn skip_lines(&self) -> i32 {
        self.index.header().skip_lines
    }

    /// Header lines of the data file.
    pub async fn header(&self) -> Result<Vec<String>> {
        fetch_header(self.data.as_ref(), self.comment_char()).await
    }

    /// Raw lines overlapping 1-based inclusive `[pos, end]` on `contig`.
    ///
    /// Lines come back in chunk (virtual offset) order. Fails with
    /// [`Error::ContigNotInIndex`] if the index has no entry for `contig`.
    pub async fn records(&self, contig: &str, pos: u32, end: u32) -> Result<Vec<String>> {
        let chunks = self.index.chunks_for_interval(contig, pos, end).await?;
        let filter = self.index.overlap_filter();

        let mut tasks = JoinSet::new();
        for (i, chunk) in chunks.iter().copied().enumerate() {
            let storage = Arc::clone(&self.data);
            let contig = contig.to_string();
            tasks.spawn(async move {
                let lines = fetch_lines(storage.as_ref(), chunk, filter, &contig, pos, end).await;
                (i, lines)
            });
        }

        let mut per_chunk: Vec<Vec<String>> = vec![Vec::new(); chunks.len()];
        while let Some(joined) = tasks.join_next().await {
            let (i, lines) =
                joined.map_err(|e| Error::Internal(format!("chunk read task failed: {}", e)))?;
            per_chunk[i] = lines?;
        }

        Ok(per_chunk.into_iter().flatten().collect())
    }
}
