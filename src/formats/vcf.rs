//! VCF data lines decoded into [`VariantRecord`]s.

use crate::{Error, Result};
use serde::{Serialize, Serializer};
use std::fmt;

/// Number of fixed columns before FORMAT.
const FIXED_COLUMNS: usize = 8;
/// Index of the first sample column.
const FIRST_SAMPLE_COLUMN: usize = 9;

/// A decoded VCF record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantRecord {
    #[serde(skip)]
    line: String,
    pub contig: String,
    pub position: u32,
    pub ids: Option<Vec<String>>,
    #[serde(rename = "ref")]
    pub ref_allele: String,
    pub alt: Vec<String>,
    pub filter: Option<Vec<String>>,
    pub is_synthetic: bool,
    /// Canonical genotype per sample, in header column order.
    #[serde(serialize_with = "serialize_genotypes")]
    genotypes: Vec<(String, String)>,
}

/// Write genotypes as a `{sample: genotype}` map, keeping header order.
fn serialize_genotypes<S: Serializer>(
    genotypes: &[(String, String)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(genotypes.iter().map(|(sample, gt)| (sample, gt)))
}

fn is_nucleotides(allele: &str) -> bool {
    !allele.is_empty()
        && allele
            .bytes()
            .all(|b| matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'N'))
}

fn split_list(field: &str) -> Option<Vec<String>> {
    match field {
        "." | "" => None,
        _ => Some(field.split(';').map(str::to_string).collect()),
    }
}

impl VariantRecord {
    /// Decode `line`, reading one genotype column per entry in `samples`.
    pub fn parse(line: &str, samples: &[String]) -> Result<Self> {
        Self::parse_with(line, samples, false)
    }

    /// Build a placeholder record whose every sample is homozygous reference.
    pub fn synthesize(
        contig: &str,
        position: u32,
        ref_allele: &str,
        alt: &str,
        samples: &[String],
    ) -> Result<Self> {
        let mut line = format!("{}\t{}\t.\t{}\t{}\t.\t.\t.", contig, position, ref_allele, alt);
        if !samples.is_empty() {
            line.push_str("\tGT");
            for _ in samples {
                line.push_str("\t0/0");
            }
        }
        Self::parse_with(&line, samples, true)
    }

    fn parse_with(line: &str, samples: &[String], is_synthetic: bool) -> Result<Self> {
        let limit = if samples.is_empty() {
            FIXED_COLUMNS
        } else {
            FIRST_SAMPLE_COLUMN + samples.len()
        };
        let fields: Vec<&str> = line.splitn(limit + 1, '\t').take(limit).collect();
        if fields.len() < limit {
            return Err(Error::Format(format!(
                "VCF record has {} columns, expected {}",
                fields.len(),
                limit
            )));
        }

        let position = fields[1]
            .parse()
            .map_err(|_| Error::Format(format!("invalid position: {}", fields[1])))?;

        let ref_allele = fields[3].to_ascii_uppercase();
        let alt: Vec<String> = fields[4]
            .split(',')
            .map(|allele| {
                if is_nucleotides(allele) {
                    allele.to_ascii_uppercase()
                } else {
                    allele.to_string()
                }
            })
            .collect();

        let mut record = Self {
            line: line.to_string(),
            contig: fields[0].to_string(),
            position,
            ids: split_list(fields[2]),
            ref_allele,
            alt,
            filter: split_list(fields[6]),
            is_synthetic,
            genotypes: Vec::with_capacity(samples.len()),
        };

        let columns = fields.get(FIRST_SAMPLE_COLUMN..).unwrap_or_default();
        for (sample, column) in samples.iter().zip(columns) {
            let genotype = record.decode_genotype(column)?;
            record.genotypes.push((sample.clone(), genotype));
        }

        Ok(record)
    }

    /// Translate the GT subfield of a sample column into allele strings.
    ///
    /// Phasing is discarded and alleles are ordered missing, reference,
    /// then alternates by index.
    fn decode_genotype(&self, column: &str) -> Result<String> {
        // GT must be the first FORMAT field
        let gt = column.split(':').next().unwrap_or_default();

        let mut indices = gt
            .split(['/', '|'])
            .map(|allele| match allele {
                "." => Ok(None),
                _ => allele
                    .parse::<usize>()
                    .map(Some)
                    .map_err(|_| Error::Format(format!("invalid genotype allele: {}", allele))),
            })
            .collect::<Result<Vec<_>>>()?;
        indices.sort();

        let alleles = indices
            .into_iter()
            .map(|index| match index {
                None => Ok("."),
                Some(0) => Ok(self.ref_allele.as_str()),
                Some(i) => self.alt.get(i - 1).map(String::as_str).ok_or_else(|| {
                    Error::Format(format!(
                        "genotype allele {} out of range at {}:{}",
                        i, self.contig, self.position
                    ))
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(alleles.join("/"))
    }

    /// The line this record was decoded from.
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn is_biallelic(&self) -> bool {
        self.alt.len() == 1
    }

    pub fn is_pass_filter(&self) -> bool {
        matches!(self.filter.as_deref(), Some([only]) if only == "PASS")
    }

    pub fn is_filtered(&self) -> bool {
        match self.filter.as_deref() {
            None | Some([]) => false,
            Some(filters) => !(filters.len() == 1 && filters[0] == "PASS"),
        }
    }

    /// HGVS-style genomic description, `contig:g.<pos><ref>><alt>`.
    pub fn hgvs(&self) -> Result<String> {
        if !self.is_biallelic() {
            return Err(Error::Constraint(format!(
                "HGVS description of multi-allelic variant {}",
                self
            )));
        }
        Ok(format!(
            "{}:g.{}{}>{}",
            self.contig, self.position, self.ref_allele, self.alt[0]
        ))
    }

    /// Genotype of `sample`, or of the first sample if `None`.
    pub fn genotype(&self, sample: Option<&str>) -> Option<&str> {
        match sample {
            None => self.genotypes.first(),
            Some(name) => self.genotypes.iter().find(|(s, _)| s == name),
        }
        .map(|(_, gt)| gt.as_str())
    }

    /// Sample names in header order.
    pub fn samples(&self) -> impl Iterator<Item = &str> {
        self.genotypes.iter().map(|(sample, _)| sample.as_str())
    }

    /// (sample, genotype) pairs in header order.
    pub fn genotypes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.genotypes
            .iter()
            .map(|(sample, gt)| (sample.as_str(), gt.as_str()))
    }
}

impl fmt::Display for VariantRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}{}>{}",
            self.contig,
            self.position,
            self.ref_allele,
            self.alt.join(",")
        )
    }
}
