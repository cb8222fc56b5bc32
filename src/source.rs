//! VCF variant queries over an indexed file.
//!
//! [`VariantSource`] validates the VCF header, resolves the reference genome
//! the file is aligned to, and answers region and single-variant queries
//! with decoded [`VariantRecord`]s.

use crate::formats::{TabixIndexedFile, VariantRecord};
use crate::genome::ReferenceGenome;
use crate::storage::Storage;
use crate::types::Region;
use crate::{Error, Result};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

const FILEFORMAT_PREFIX: &str = "##fileformat=VCF";
const REFERENCE_PREFIX: &str = "##reference=";
const CONTIG_PREFIX: &str = "##contig=<";
const COLUMN_HEADER: &str = "#CHROM";
const FIRST_SAMPLE_COLUMN: usize = 9;

/// `ID` value of a `##contig=<...>` header line.
fn contig_id(line: &str) -> Option<&str> {
    let fields = line.strip_prefix(CONTIG_PREFIX)?;
    let fields = fields.strip_suffix('>').unwrap_or(fields);
    fields
        .split(',')
        .find_map(|field| field.strip_prefix("ID="))
        .filter(|id| !id.is_empty())
}

/// Genome implied by the header, falling back to the default.
fn infer_genome(header: &[String]) -> &'static ReferenceGenome {
    let from_reference = header
        .iter()
        .find_map(|line| line.strip_prefix(REFERENCE_PREFIX))
        .and_then(ReferenceGenome::from_file);
    if let Some(genome) = from_reference {
        tracing::debug!("genome {} from ##reference line", genome);
        return genome;
    }

    let contigs: Vec<&str> = header.iter().filter_map(|line| contig_id(line)).collect();
    if !contigs.is_empty() {
        if let Some(genome) = ReferenceGenome::from_contigs(&contigs) {
            tracing::debug!("genome {} from {} ##contig lines", genome, contigs.len());
            return genome;
        }
    }

    ReferenceGenome::default_genome()
}

/// Sample names from the `#CHROM` column header line.
fn parse_samples(header: &[String]) -> Result<Vec<String>> {
    let columns: Vec<&str> = header
        .last()
        .map(|line| line.split('\t').collect())
        .unwrap_or_default();
    if columns.first() != Some(&COLUMN_HEADER) || columns.len() < 8 {
        return Err(Error::Format("invalid column header".to_string()));
    }
    Ok(columns
        .iter()
        .skip(FIRST_SAMPLE_COLUMN)
        .map(|s| s.to_string())
        .collect())
}

/// A VCF file opened for region queries.
pub struct VariantSource {
    file: TabixIndexedFile,
    genome: &'static ReferenceGenome,
    header: Vec<String>,
    samples: Vec<String>,
}

impl VariantSource {
    /// Open a VCF from its data and index storage.
    pub async fn open(
        data: Arc<dyn Storage>,
        index: Arc<dyn Storage>,
        genome: Option<&'static ReferenceGenome>,
    ) -> Result<Self> {
        let file = TabixIndexedFile::open(data, index).await?;
        Self::from_file(file, genome).await
    }

    /// Read and validate the header of an already-indexed file.
    ///
    /// An explicit `genome` takes precedence over the `##reference` and
    /// `##contig` header lines.
    pub async fn from_file(
        file: TabixIndexedFile,
        genome: Option<&'static ReferenceGenome>,
    ) -> Result<Self> {
        let header = file.header().await?;

        if !header
            .first()
            .is_some_and(|line| line.starts_with(FILEFORMAT_PREFIX))
        {
            return Err(Error::Format("not a valid VCF file".to_string()));
        }

        let genome = genome.unwrap_or_else(|| infer_genome(&header));
        let samples = parse_samples(&header)?;
        tracing::debug!(
            "opened VCF with {} header lines, {} samples, genome {}",
            header.len(),
            samples.len(),
            genome
        );

        Ok(Self {
            file,
            genome,
            header,
            samples,
        })
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn reference_genome(&self) -> &'static ReferenceGenome {
        self.genome
    }

    /// Header lines, ending with the `#CHROM` line.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn file(&self) -> &TabixIndexedFile {
        &self.file
    }

    pub fn normalize_contig(&self, contig: &str) -> Result<String> {
        self.genome.normalize_contig(contig)
    }

    /// Parse and normalize a single `contig[:pos[-end]]` region.
    pub fn normalize_region(&self, region: &str) -> Result<Region> {
        region.parse::<Region>()?.normalize(self.genome)
    }

    /// Normalize regions, sort them in reference order and merge overlaps.
    pub fn normalize_regions<S: AsRef<str>>(&self, regions: &[S]) -> Result<Vec<Region>> {
        let mut normalized = regions
            .iter()
            .map(|region| self.normalize_region(region.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        // Normalized contigs all belong to the genome
        normalized.sort_by(|l, r| {
            self.genome
                .compare_contig(&l.contig, &r.contig)
                .unwrap_or(Ordering::Equal)
                .then(l.pos.cmp(&r.pos))
                .then(l.end.cmp(&r.end))
        });

        let mut merged: Vec<Region> = Vec::with_capacity(normalized.len());
        for region in normalized {
            match merged.last_mut() {
                Some(last) if last.contig == region.contig && region.pos <= last.end.unwrap_or(0) => {
                    last.end = last.end.max(region.end);
                }
                _ => merged.push(region),
            }
        }
        Ok(merged)
    }

    /// Records overlapping 1-based inclusive `[pos, end]` on `contig`.
    ///
    /// A genome contig with no entry in the index yields no records.
    pub async fn variants(&self, contig: &str, pos: u32, end: u32) -> Result<Vec<VariantRecord>> {
        let contig = self.normalize_contig(contig)?;
        let lines = match self.file.records(&contig, pos, end).await {
            Ok(lines) => lines,
            Err(Error::ContigNotInIndex(name)) => {
                tracing::debug!("contig {} has no records in this file", name);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        lines
            .iter()
            .map(|line| VariantRecord::parse(line, &self.samples))
            .collect()
    }

    /// Records overlapping any of `regions`, each returned once.
    pub async fn variants_in_regions<S: AsRef<str>>(
        &self,
        regions: &[S],
    ) -> Result<Vec<VariantRecord>> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for region in self.normalize_regions(regions)? {
            let end = region.end.unwrap_or(region.pos);
            for record in self.variants(&region.contig, region.pos, end).await? {
                if seen.insert(record.line().to_string()) {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    /// The record at `pos` with reference `ref_allele` and `alt` among its alternates.
    ///
    /// With `assume_hom_ref`, a missing variant is returned as a synthetic
    /// record where every sample is homozygous reference.
    pub async fn variant(
        &self,
        contig: &str,
        pos: u32,
        ref_allele: &str,
        alt: &str,
        assume_hom_ref: bool,
    ) -> Result<Option<VariantRecord>> {
        let found = self
            .variants(contig, pos, pos)
            .await?
            .into_iter()
            .find(|record| record.ref_allele == ref_allele && record.alt.iter().any(|a| a == alt));

        match found {
            Some(record) => Ok(Some(record)),
            None if assume_hom_ref => {
                let contig = self.normalize_contig(contig)?;
                VariantRecord::synthesize(&contig, pos, ref_allele, alt, &self.samples).map(Some)
            }
            None => Ok(None),
        }
    }
}
