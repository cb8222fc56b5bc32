use crate::genome::ReferenceGenome;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A genomic interval, 1-based with both ends inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub contig: String,
    pub pos: u32,
    /// `None` runs to the end of the contig.
    pub end: Option<u32>,
}

impl Region {
    pub fn new(contig: impl Into<String>, pos: u32, end: u32) -> Self {
        Self {
            contig: contig.into(),
            pos,
            end: Some(end),
        }
    }

    /// The whole of `contig`.
    pub fn contig(contig: impl Into<String>) -> Self {
        Self {
            contig: contig.into(),
            pos: 1,
            end: None,
        }
    }

    /// Rename the contig to `genome`'s naming and fill in an open end.
    pub fn normalize(&self, genome: &ReferenceGenome) -> Result<Region> {
        let contig = genome.normalize_contig(&self.contig)?;
        let end = match self.end {
            Some(end) => end,
            None => genome
                .contig_length(&contig)
                .ok_or_else(|| Error::UnknownContig(contig.clone()))?,
        };
        let region = Region::new(contig, self.pos, end);
        region.validate()?;
        Ok(region)
    }

    fn validate(&self) -> Result<()> {
        if self.pos == 0 {
            return Err(Error::InvalidInput(format!(
                "region {} starts at 0, positions are 1-based",
                self
            )));
        }
        if let Some(end) = self.end {
            if self.pos > end {
                return Err(Error::InvalidInput(format!(
                    "region {} starts after it ends",
                    self
                )));
            }
        }
        Ok(())
    }
}

fn parse_position(value: &str, region: &str) -> Result<u32> {
    value
        .replace(',', "")
        .parse()
        .map_err(|_| Error::InvalidInput(format!("invalid position '{}' in region {}", value, region)))
}

impl FromStr for Region {
    type Err = Error;

    /// Parse `contig`, `contig:pos` or `contig:pos-end`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (contig, range) = match s.rsplit_once(':') {
            Some((contig, range)) => (contig, Some(range)),
            None => (s, None),
        };
        if contig.is_empty() {
            return Err(Error::InvalidInput(format!("region '{}' has no contig", s)));
        }

        let region = match range {
            None => Region::contig(contig),
            Some(range) => match range.split_once('-') {
                Some((pos, end)) => {
                    Region::new(contig, parse_position(pos, s)?, parse_position(end, s)?)
                }
                None => {
                    let pos = parse_position(range, s)?;
                    Region::new(contig, pos, pos)
                }
            },
        };
        region.validate()?;
        Ok(region)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}:{}-{}", self.contig, self.pos, end),
            None => write!(f, "{}", self.contig),
        }
    }
}
