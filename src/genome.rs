//! Reference genome coordinate tables.
//!
//! Each [`ReferenceGenome`] knows its contig names, lengths and canonical
//! order, plus aliases from other naming conventions (`1` vs `chr1`). The
//! query layer only relies on contig normalization, ordering and lengths.

use crate::{Error, Result};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Contig name and length, in reference order.
type SeqDict = &'static [(&'static str, u32)];

const HG19_CONTIGS: SeqDict = &[
    ("chrM", 16571),
    ("chr1", 249250621),
    ("chr2", 243199373),
    ("chr3", 198022430),
    ("chr4", 191154276),
    ("chr5", 180915260),
    ("chr6", 171115067),
    ("chr7", 159138663),
    ("chr8", 146364022),
    ("chr9", 141213431),
    ("chr10", 135534747),
    ("chr11", 135006516),
    ("chr12", 133851895),
    ("chr13", 115169878),
    ("chr14", 107349540),
    ("chr15", 102531392),
    ("chr16", 90354753),
    ("chr17", 81195210),
    ("chr18", 78077248),
    ("chr19", 59128983),
    ("chr20", 63025520),
    ("chr21", 48129895),
    ("chr22", 51304566),
    ("chrX", 155270560),
    ("chrY", 59373566),
    ("chr1_gl000191_random", 106433),
    ("chr1_gl000192_random", 547496),
    ("chr4_ctg9_hap1", 590426),
    ("chr4_gl000193_random", 189789),
    ("chr4_gl000194_random", 191469),
    ("chr6_apd_hap1", 4622290),
    ("chr6_cox_hap2", 4795371),
    ("chr6_dbb_hap3", 4610396),
    ("chr6_mann_hap4", 4683263),
    ("chr6_mcf_hap5", 4833398),
    ("chr6_qbl_hap6", 4611984),
    ("chr6_ssto_hap7", 4928567),
    ("chr7_gl000195_random", 182896),
    ("chr8_gl000196_random", 38914),
    ("chr8_gl000197_random", 37175),
    ("chr9_gl000198_random", 90085),
    ("chr9_gl000199_random", 169874),
    ("chr9_gl000200_random", 187035),
    ("chr9_gl000201_random", 36148),
    ("chr11_gl000202_random", 40103),
    ("chr17_ctg5_hap1", 1680828),
    ("chr17_gl000203_random", 37498),
    ("chr17_gl000204_random", 81310),
    ("chr17_gl000205_random", 174588),
    ("chr17_gl000206_random", 41001),
    ("chr18_gl000207_random", 4262),
    ("chr19_gl000208_random", 92689),
    ("chr19_gl000209_random", 159169),
    ("chr21_gl000210_random", 27682),
    ("chrUn_gl000211", 166566),
    ("chrUn_gl000212", 186858),
    ("chrUn_gl000213", 164239),
    ("chrUn_gl000214", 137718),
    ("chrUn_gl000215", 172545),
    ("chrUn_gl000216", 172294),
    ("chrUn_gl000217", 172149),
    ("chrUn_gl000218", 161147),
    ("chrUn_gl000219", 179198),
    ("chrUn_gl000220", 161802),
    ("chrUn_gl000221", 155397),
    ("chrUn_gl000222", 186861),
    ("chrUn_gl000223", 180455),
    ("chrUn_gl000224", 179693),
    ("chrUn_gl000225", 211173),
    ("chrUn_gl000226", 15008),
    ("chrUn_gl000227", 128374),
    ("chrUn_gl000228", 129120),
    ("chrUn_gl000229", 19913),
    ("chrUn_gl000230", 43691),
    ("chrUn_gl000231", 27386),
    ("chrUn_gl000232", 40652),
    ("chrUn_gl000233", 45941),
    ("chrUn_gl000234", 40531),
    ("chrUn_gl000235", 34474),
    ("chrUn_gl000236", 41934),
    ("chrUn_gl000237", 45867),
    ("chrUn_gl000238", 39939),
    ("chrUn_gl000239", 33824),
    ("chrUn_gl000240", 41933),
    ("chrUn_gl000241", 42152),
    ("chrUn_gl000242", 43523),
    ("chrUn_gl000243", 43341),
    ("chrUn_gl000244", 39929),
    ("chrUn_gl000245", 36651),
    ("chrUn_gl000246", 38154),
    ("chrUn_gl000247", 36422),
    ("chrUn_gl000248", 39786),
    ("chrUn_gl000249", 38502),
];

const B37_CONTIGS: SeqDict = &[
    ("1", 249250621),
    ("2", 243199373),
    ("3", 198022430),
    ("4", 191154276),
    ("5", 180915260),
    ("6", 171115067),
    ("7", 159138663),
    ("8", 146364022),
    ("9", 141213431),
    ("10", 135534747),
    ("11", 135006516),
    ("12", 133851895),
    ("13", 115169878),
    ("14", 107349540),
    ("15", 102531392),
    ("16", 90354753),
    ("17", 81195210),
    ("18", 78077248),
    ("19", 59128983),
    ("20", 63025520),
    ("21", 48129895),
    ("22", 51304566),
    ("X", 155270560),
    ("Y", 59373566),
    ("MT", 16569),
    ("GL000207.1", 4262),
    ("GL000226.1", 15008),
    ("GL000229.1", 19913),
    ("GL000231.1", 27386),
    ("GL000210.1", 27682),
    ("GL000239.1", 33824),
    ("GL000235.1", 34474),
    ("GL000201.1", 36148),
    ("GL000247.1", 36422),
    ("GL000245.1", 36651),
    ("GL000197.1", 37175),
    ("GL000203.1", 37498),
    ("GL000246.1", 38154),
    ("GL000249.1", 38502),
    ("GL000196.1", 38914),
    ("GL000248.1", 39786),
    ("GL000244.1", 39929),
    ("GL000238.1", 39939),
    ("GL000202.1", 40103),
    ("GL000234.1", 40531),
    ("GL000232.1", 40652),
    ("GL000206.1", 41001),
    ("GL000240.1", 41933),
    ("GL000236.1", 41934),
    ("GL000241.1", 42152),
    ("GL000243.1", 43341),
    ("GL000242.1", 43523),
    ("GL000230.1", 43691),
    ("GL000237.1", 45867),
    ("GL000233.1", 45941),
    ("GL000204.1", 81310),
    ("GL000198.1", 90085),
    ("GL000208.1", 92689),
    ("GL000191.1", 106433),
    ("GL000227.1", 128374),
    ("GL000228.1", 129120),
    ("GL000214.1", 137718),
    ("GL000221.1", 155397),
    ("GL000209.1", 159169),
    ("GL000218.1", 161147),
    ("GL000220.1", 161802),
    ("GL000213.1", 164239),
    ("GL000211.1", 166566),
    ("GL000199.1", 169874),
    ("GL000217.1", 172149),
    ("GL000216.1", 172294),
    ("GL000215.1", 172545),
    ("GL000205.1", 174588),
    ("GL000219.1", 179198),
    ("GL000224.1", 179693),
    ("GL000223.1", 180455),
    ("GL000195.1", 182896),
    ("GL000212.1", 186858),
    ("GL000222.1", 186861),
    ("GL000200.1", 187035),
    ("GL000193.1", 189789),
    ("GL000194.1", 191469),
    ("GL000225.1", 211173),
    ("GL000192.1", 547496),
];

const HG38_CONTIGS: SeqDict = &[
    ("chr1", 248956422),
    ("chr2", 242193529),
    ("chr3", 198295559),
    ("chr4", 190214555),
    ("chr5", 181538259),
    ("chr6", 170805979),
    ("chr7", 159345973),
    ("chr8", 145138636),
    ("chr9", 138394717),
    ("chr10", 133797422),
    ("chr11", 135086622),
    ("chr12", 133275309),
    ("chr13", 114364328),
    ("chr14", 107043718),
    ("chr15", 101991189),
    ("chr16", 90338345),
    ("chr17", 83257441),
    ("chr18", 80373285),
    ("chr19", 58617616),
    ("chr20", 64444167),
    ("chr21", 46709983),
    ("chr22", 50818468),
    ("chrX", 156040895),
    ("chrY", 57227415),
    ("chrM", 16569),
];

/// Primary chromosome names without a `chr` prefix.
const PRIMARY: [&str; 24] = [
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16", "17",
    "18", "19", "20", "21", "22", "X", "Y",
];

/// Aliases from numeric names (`1`, `MT`) to UCSC names (`chr1`, `chrM`).
fn to_ucsc_aliases() -> HashMap<String, String> {
    let mut aliases: HashMap<String, String> = PRIMARY
        .iter()
        .map(|name| (name.to_string(), format!("chr{}", name)))
        .collect();
    aliases.insert("MT".to_string(), "chrM".to_string());
    aliases
}

/// Aliases from UCSC names (`chr1`, `chrM`) to numeric names (`1`, `MT`).
fn to_numeric_aliases() -> HashMap<String, String> {
    let mut aliases: HashMap<String, String> = PRIMARY
        .iter()
        .map(|name| (format!("chr{}", name), name.to_string()))
        .collect();
    aliases.insert("chrM".to_string(), "MT".to_string());
    aliases
}

#[derive(Debug, Clone)]
struct ContigEntry {
    length: u32,
    order: usize,
}

/// A reference genome's contig table.
#[derive(Debug)]
pub struct ReferenceGenome {
    short_name: &'static str,
    leading_chr: bool,
    names: Vec<&'static str>,
    contigs: HashMap<&'static str, ContigEntry>,
    liftover: HashMap<String, String>,
}

static HG19: LazyLock<ReferenceGenome> =
    LazyLock::new(|| ReferenceGenome::new("hg19", true, HG19_CONTIGS, to_ucsc_aliases()));
static B37: LazyLock<ReferenceGenome> =
    LazyLock::new(|| ReferenceGenome::new("b37", false, B37_CONTIGS, to_numeric_aliases()));
static HG38: LazyLock<ReferenceGenome> =
    LazyLock::new(|| ReferenceGenome::new("hg38", true, HG38_CONTIGS, to_ucsc_aliases()));

impl ReferenceGenome {
    fn new(
        short_name: &'static str,
        leading_chr: bool,
        seq_dict: SeqDict,
        liftover: HashMap<String, String>,
    ) -> Self {
        let contigs = seq_dict
            .iter()
            .enumerate()
            .map(|(order, (name, length))| {
                (
                    *name,
                    ContigEntry {
                        length: *length,
                        order,
                    },
                )
            })
            .collect();
        Self {
            short_name,
            leading_chr,
            names: seq_dict.iter().map(|(name, _)| *name).collect(),
            contigs,
            liftover,
        }
    }

    pub fn hg19() -> &'static ReferenceGenome {
        &HG19
    }

    pub fn b37() -> &'static ReferenceGenome {
        &B37
    }

    pub fn hg38() -> &'static ReferenceGenome {
        &HG38
    }

    /// Genome used when nothing in the header identifies one.
    pub fn default_genome() -> &'static ReferenceGenome {
        Self::hg19()
    }

    fn all() -> [&'static ReferenceGenome; 3] {
        [Self::hg19(), Self::b37(), Self::hg38()]
    }

    pub fn short_name(&self) -> &'static str {
        self.short_name
    }

    /// Whether contig names carry a `chr` prefix.
    pub fn leading_chr(&self) -> bool {
        self.leading_chr
    }

    /// Contig names in reference order.
    pub fn contigs(&self) -> &[&'static str] {
        &self.names
    }

    pub fn contig_length(&self, name: &str) -> Option<u32> {
        self.contigs.get(name).map(|entry| entry.length)
    }

    /// Position of `name` in reference order.
    pub fn contig_order(&self, name: &str) -> Option<usize> {
        self.contigs.get(name).map(|entry| entry.order)
    }

    /// This genome's name for `contig`, e.g. `1` becomes `chr1` for hg19.
    pub fn normalize_contig(&self, contig: &str) -> Result<String> {
        if self.contigs.contains_key(contig) {
            return Ok(contig.to_string());
        }
        self.liftover
            .get(contig)
            .cloned()
            .ok_or_else(|| Error::UnknownContig(contig.to_string()))
    }

    /// Compare two contigs by reference order.
    pub fn compare_contig(&self, lhs: &str, rhs: &str) -> Result<Ordering> {
        if lhs == rhs {
            return Ok(Ordering::Equal);
        }
        let order = |name: &str| {
            self.contig_order(name)
                .ok_or_else(|| Error::UnknownContig(name.to_string()))
        };
        Ok(order(lhs)?.cmp(&order(rhs)?))
    }

    /// Genome for a reference FASTA path, matched on its file name.
    pub fn from_file(path: &str) -> Option<&'static ReferenceGenome> {
        let path = path.strip_prefix("file://").unwrap_or(path);
        let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        match file_name {
            "human_g1k_v37.fasta" | "GRCh37.fa" => Some(Self::b37()),
            "ucsc.hg19.fasta" | "hg19.fa" => Some(Self::hg19()),
            "Homo_sapiens_assembly38.fasta" => Some(Self::hg38()),
            _ => None,
        }
    }

    /// The single genome containing every name in `contigs`, if unique.
    pub fn from_contigs<S: AsRef<str>>(contigs: &[S]) -> Option<&'static ReferenceGenome> {
        let mut candidates = Self::all().into_iter().filter(|genome| {
            contigs
                .iter()
                .all(|name| genome.contigs.contains_key(name.as_ref()))
        });
        match (candidates.next(), candidates.next()) {
            (Some(genome), None) => Some(genome),
            _ => None,
        }
    }

    pub fn from_short_name(name: &str) -> Option<&'static ReferenceGenome> {
        match name {
            "hg19" => Some(Self::hg19()),
            "b37" => Some(Self::b37()),
            "hg38" | "GRCh38.p2" => Some(Self::hg38()),
            _ => None,
        }
    }
}

impl PartialEq for ReferenceGenome {
    fn eq(&self, other: &Self) -> bool {
        self.short_name == other.short_name
    }
}

impl Eq for ReferenceGenome {}

impl fmt::Display for ReferenceGenome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_contig() {
        let hg19 = ReferenceGenome::hg19();
        assert_eq!(hg19.normalize_contig("chr1").unwrap(), "chr1");
        assert_eq!(hg19.normalize_contig("1").unwrap(), "chr1");
        assert_eq!(hg19.normalize_contig("MT").unwrap(), "chrM");

        let b37 = ReferenceGenome::b37();
        assert_eq!(b37.normalize_contig("chr10").unwrap(), "10");
        assert_eq!(b37.normalize_contig("chrM").unwrap(), "MT");
    }

    #[test]
    fn test_normalize_unknown_contig() {
        let err = ReferenceGenome::hg19().normalize_contig("junk").unwrap_err();
        assert!(matches!(err, Error::UnknownContig(_)));
    }

    #[test]
    fn test_compare_contig() {
        let hg19 = ReferenceGenome::hg19();
        assert_eq!(hg19.compare_contig("chr1", "chr1").unwrap(), Ordering::Equal);
        assert_eq!(hg19.compare_contig("chr2", "chr10").unwrap(), Ordering::Less);
        assert_eq!(hg19.compare_contig("chrM", "chr1").unwrap(), Ordering::Less);
        assert_eq!(hg19.compare_contig("chrY", "chrX").unwrap(), Ordering::Greater);
        assert!(hg19.compare_contig("chr1", "1").is_err());

        let hg38 = ReferenceGenome::hg38();
        assert_eq!(hg38.compare_contig("chrM", "chrY").unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_contig_length() {
        assert_eq!(ReferenceGenome::b37().contig_length("MT"), Some(16569));
        assert_eq!(ReferenceGenome::hg19().contig_length("chrM"), Some(16571));
        assert_eq!(ReferenceGenome::hg19().contig_length("MT"), None);
    }

    #[test]
    fn test_from_file() {
        assert_eq!(
            ReferenceGenome::from_file("file:///ref/human_g1k_v37.fasta"),
            Some(ReferenceGenome::b37())
        );
        assert_eq!(
            ReferenceGenome::from_file("C:\\refs\\hg19.fa"),
            Some(ReferenceGenome::hg19())
        );
        assert_eq!(ReferenceGenome::from_file("/ref/unknown.fa"), None);
    }

    #[test]
    fn test_from_contigs() {
        assert_eq!(
            ReferenceGenome::from_contigs(&["1", "2", "MT", "GL000192.1"]),
            Some(ReferenceGenome::b37())
        );
        assert_eq!(
            ReferenceGenome::from_contigs(&["chr1", "chr4_ctg9_hap1"]),
            Some(ReferenceGenome::hg19())
        );
        // chr1 alone is ambiguous between hg19 and hg38
        assert_eq!(ReferenceGenome::from_contigs(&["chr1"]), None);
        assert_eq!(ReferenceGenome::from_contigs(&["chr1", "1"]), None);
    }

    #[test]
    fn test_from_short_name() {
        assert_eq!(
            ReferenceGenome::from_short_name("GRCh38.p2"),
            Some(ReferenceGenome::hg38())
        );
        assert_eq!(ReferenceGenome::from_short_name("mm10"), None);
        assert!(ReferenceGenome::hg38().leading_chr());
        assert!(!ReferenceGenome::b37().leading_chr());
    }
}
