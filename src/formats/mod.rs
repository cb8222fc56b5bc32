//! Block-compressed, tabix-indexed file readers.
//!
//! This module turns genomic regions into decoded records:
//!
//! - [`bgzf`] - BGZF block framing, inflation and virtual offsets
//! - [`tabix`] - `.tbi` index parsing with lazy per-contig decoding
//! - [`binning`] - bin enumeration and chunk optimization for a region
//! - [`indexed`] - byte-range reads of chunks and header lines
//! - [`vcf`] - VCF data lines as [`VariantRecord`]s

pub mod bgzf;
pub mod binning;
pub mod indexed;
pub mod tabix;
pub mod vcf;

pub use bgzf::VirtualOffset;
pub use indexed::{OverlapFilter, TabixIndexedFile};
pub use tabix::{Chunk, IndexFormat, TabixIndex};
pub use vcf::VariantRecord;
