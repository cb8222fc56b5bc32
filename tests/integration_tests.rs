//! Integration tests for vcfseek
//!
//! Each test writes a bgzip-compressed VCF and its tabix index to a
//! temporary directory and queries it through `LocalStorage`.

use flate2::Compression;
use flate2::Crc;
use flate2::write::DeflateEncoder;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use vcfseek::formats::IndexFormat;
use vcfseek::storage::{LocalStorage, Storage, open_location};
use vcfseek::{Error, ReferenceGenome, TabixIndexedFile, VariantSource};

const COLUMNS: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT";

fn bgzf_block(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    let cdata = encoder.finish().unwrap();

    let bsize = (18 + cdata.len() + 8 - 1) as u16;
    let mut block = vec![0x1f, 0x8b, 0x08, 0x04, 0, 0, 0, 0, 0, 0xff, 6, 0, b'B', b'C', 2, 0];
    block.extend_from_slice(&bsize.to_le_bytes());
    block.extend_from_slice(&cdata);

    let mut crc = Crc::new();
    crc.update(data);
    block.extend_from_slice(&crc.sum().to_le_bytes());
    block.extend_from_slice(&(data.len() as u32).to_le_bytes());
    block
}

fn virtual_offset(compressed: usize, uncompressed: usize) -> u64 {
    ((compressed as u64) << 16) | uncompressed as u64
}

/// Bin a 0-based half-open interval is indexed under.
fn reg2bin(beg: u32, end: u32) -> u32 {
    let end = end - 1;
    for (shift, base) in [(14, 4681), (17, 585), (20, 73), (23, 9), (26, 1)] {
        if beg >> shift == end >> shift {
            return base + (beg >> shift);
        }
    }
    0
}

#[derive(Default)]
struct ContigIndex {
    bins: BTreeMap<u32, Vec<(u64, u64)>>,
    linear: Vec<u64>,
}

/// Writes a VCF whose header and each group of records get their own BGZF
/// block, together with a tabix index over it.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(header: &[&str], blocks: &[&[&str]]) -> Self {
        let dir = TempDir::new().unwrap();

        let header_text: String = header.iter().map(|line| format!("{}\n", line)).collect();
        let mut data = bgzf_block(header_text.as_bytes());

        let mut names: Vec<String> = Vec::new();
        let mut contigs: BTreeMap<String, ContigIndex> = BTreeMap::new();

        for block in blocks {
            let text: String = block.iter().map(|line| format!("{}\n", line)).collect();
            let compressed = bgzf_block(text.as_bytes());
            let block_start = data.len();
            let block_end = block_start + compressed.len();

            let mut within = 0;
            for (i, line) in block.iter().enumerate() {
                let fields: Vec<&str> = line.split('\t').collect();
                let beg = fields[1].parse::<u32>().unwrap() - 1;
                let end = fields[7]
                    .split(';')
                    .find_map(|entry| entry.strip_prefix("END="))
                    .map(|value| value.parse::<u32>().unwrap())
                    .unwrap_or(beg + fields[3].len() as u32);

                let begin_vo = virtual_offset(block_start, within);
                within += line.len() + 1;
                let end_vo = if i + 1 == block.len() {
                    virtual_offset(block_end, 0)
                } else {
                    virtual_offset(block_start, within)
                };

                if !names.iter().any(|name| name == fields[0]) {
                    names.push(fields[0].to_string());
                }
                let contig = contigs.entry(fields[0].to_string()).or_default();
                contig
                    .bins
                    .entry(reg2bin(beg, end))
                    .or_default()
                    .push((begin_vo, end_vo));

                let last_tile = ((end - 1) >> 14) as usize;
                if contig.linear.len() <= last_tile {
                    contig.linear.resize(last_tile + 1, 0);
                }
                for tile in (beg >> 14) as usize..=last_tile {
                    if contig.linear[tile] == 0 {
                        contig.linear[tile] = begin_vo;
                    }
                }
            }
            data.extend_from_slice(&compressed);
        }
        data.extend_from_slice(&bgzf_block(&[]));

        let index = encode_index(&names, &mut contigs);
        let mut compressed_index = bgzf_block(&index);
        compressed_index.extend_from_slice(&bgzf_block(&[]));

        std::fs::write(dir.path().join("sample.vcf.gz"), data).unwrap();
        std::fs::write(dir.path().join("sample.vcf.gz.tbi"), compressed_index).unwrap();
        Self { dir }
    }

    fn data_path(&self) -> PathBuf {
        self.dir.path().join("sample.vcf.gz")
    }

    fn index_path(&self) -> PathBuf {
        self.dir.path().join("sample.vcf.gz.tbi")
    }

    async fn open(&self, genome: Option<&'static ReferenceGenome>) -> vcfseek::Result<VariantSource> {
        VariantSource::open(storage(&self.data_path()), storage(&self.index_path()), genome).await
    }
}

fn storage(path: &Path) -> Arc<dyn Storage> {
    Arc::new(LocalStorage::new(path))
}

fn encode_index(names: &[String], contigs: &mut BTreeMap<String, ContigIndex>) -> Vec<u8> {
    let name_block: Vec<u8> = names
        .iter()
        .flat_map(|name| name.bytes().chain(std::iter::once(0)))
        .collect();

    let mut out = b"TBI\x01".to_vec();
    for value in [names.len() as i32, 2, 1, 2, 0, '#' as i32, 0, name_block.len() as i32] {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out.extend_from_slice(&name_block);

    for name in names {
        let contig = contigs.get_mut(name).unwrap();
        // Empty tiles take the offset of the preceding tile
        for tile in 1..contig.linear.len() {
            if contig.linear[tile] == 0 {
                contig.linear[tile] = contig.linear[tile - 1];
            }
        }

        out.extend_from_slice(&(contig.bins.len() as i32).to_le_bytes());
        for (bin, chunks) in &contig.bins {
            out.extend_from_slice(&bin.to_le_bytes());
            out.extend_from_slice(&(chunks.len() as i32).to_le_bytes());
            for (begin, end) in chunks {
                out.extend_from_slice(&begin.to_le_bytes());
                out.extend_from_slice(&end.to_le_bytes());
            }
        }
        out.extend_from_slice(&(contig.linear.len() as i32).to_le_bytes());
        for offset in &contig.linear {
            out.extend_from_slice(&offset.to_le_bytes());
        }
    }
    out
}

/// Single-sample file with one heterozygous SNV on chr1.
fn single_record_fixture() -> Fixture {
    let columns = format!("{}\tsample", COLUMNS);
    Fixture::new(
        &["##fileformat=VCFv4.2", &columns],
        &[&["chr1\t100\trs1\tA\tT\t100.0\tPASS\tAC=1;AN=2\tGT\t0/1"]],
    )
}

/// Two samples, several chr1 records across blocks, and one chr2 record.
fn multi_record_fixture() -> Fixture {
    let columns = format!("{}\tNA12878\tNA12891", COLUMNS);
    Fixture::new(
        &[
            "##fileformat=VCFv4.2",
            "##reference=file:///refs/ucsc.hg19.fasta",
            "##contig=<ID=chr1,length=249250621>",
            "##contig=<ID=chr2,length=243199373>",
            &columns,
        ],
        &[
            &[
                "chr1\t100\trs1\tA\tT\t50\tPASS\t.\tGT:DP\t0/1:10\t1|1:12",
                "chr1\t150\trs2\tC\tG,T\t50\tq10\t.\tGT\t2/1\t0/0",
            ],
            &["chr1\t20000\t.\tACGT\tA\t50\tPASS\t.\tGT\t0|1\t./."],
            &["chr1\t40000\tsv1\tN\t<DEL>\t50\tPASS\tSVTYPE=DEL;END=60000\tGT\t0/1\t0/0"],
            &["chr2\t500\trs9\tG\tC\t50\tPASS\t.\tGT\t1/1\t0/1"],
        ],
    )
}

#[tokio::test]
async fn test_variants_single_record() {
    let fixture = single_record_fixture();
    let source = fixture.open(None).await.unwrap();

    let records = source.variants("chr1", 1, 200).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ref_allele, "A");
    assert_eq!(records[0].alt, vec!["T"]);
    assert_eq!(records[0].genotype(Some("sample")), Some("A/T"));
    assert!(records[0].is_pass_filter());
}

#[tokio::test]
async fn test_variants_no_overlap() {
    let fixture = single_record_fixture();
    let source = fixture.open(None).await.unwrap();

    assert!(source.variants("chr1", 102, 102).await.unwrap().is_empty());
    assert!(source.variants("chr1", 1, 99).await.unwrap().is_empty());
    assert_eq!(source.variants("chr1", 100, 100).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_variants_contig_alias() {
    let fixture = single_record_fixture();
    let source = fixture.open(None).await.unwrap();

    let records = source.variants("1", 1, 200).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].contig, "chr1");
}

#[tokio::test]
async fn test_variants_contig_not_in_index() {
    let fixture = single_record_fixture();
    let source = fixture.open(None).await.unwrap();

    assert!(source.variants("7", 1000, 2000).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_variants_unknown_contig() {
    let fixture = single_record_fixture();
    let source = fixture.open(None).await.unwrap();

    let err = source.variants("junk", 1, 100).await.unwrap_err();
    assert!(matches!(err, Error::UnknownContig(_)));
}

#[tokio::test]
async fn test_variant_lookup_and_synthesis() {
    let fixture = single_record_fixture();
    let source = fixture.open(None).await.unwrap();

    assert!(source.variant("chr1", 100, "A", "G", false).await.unwrap().is_none());

    let record = source
        .variant("chr1", 100, "A", "G", true)
        .await
        .unwrap()
        .unwrap();
    assert!(record.is_synthetic);
    assert_eq!(record.genotype(Some("sample")), Some("A/A"));
    assert_eq!(record.hgvs().unwrap(), "chr1:g.100A>G");

    let found = source
        .variant("chr1", 100, "A", "T", true)
        .await
        .unwrap()
        .unwrap();
    assert!(!found.is_synthetic);
}

#[tokio::test]
async fn test_header_lines() {
    let fixture = single_record_fixture();
    let source = fixture.open(None).await.unwrap();

    let header = source.header();
    assert_eq!(header.len(), 2);
    assert_eq!(header[0], "##fileformat=VCFv4.2");
    assert!(header[1].starts_with("#CHROM"));
    assert!(header.iter().all(|line| line.starts_with('#')));
    assert_eq!(source.samples(), ["sample"]);
}

#[tokio::test]
async fn test_multi_block_region() {
    let fixture = multi_record_fixture();
    let source = fixture.open(None).await.unwrap();
    assert_eq!(source.reference_genome(), ReferenceGenome::hg19());

    let records = source.variants("chr1", 1, 200).await.unwrap();
    let described: Vec<String> = records.iter().map(|r| r.to_string()).collect();
    assert_eq!(described, vec!["chr1:100A>T", "chr1:150C>G,T"]);

    assert_eq!(records[0].genotype(Some("NA12891")), Some("T/T"));
    assert_eq!(records[1].genotype(Some("NA12878")), Some("G/T"));
    assert!(records[1].is_filtered());
    assert!(records[1].hgvs().is_err());

    let records = source.variants("chr1", 150, 20000).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].position, 20000);
    assert_eq!(records[1].genotype(Some("NA12891")), Some("./."));
}

#[tokio::test]
async fn test_deletion_and_structural_variant_extent() {
    let fixture = multi_record_fixture();
    let source = fixture.open(None).await.unwrap();

    // ACGT at 20000 covers 20000..=20003
    assert_eq!(source.variants("chr1", 20003, 20003).await.unwrap().len(), 1);
    assert!(source.variants("chr1", 20004, 20010).await.unwrap().is_empty());

    // END=60000 carries the deletion across linear index tiles
    let records = source.variants("chr1", 50000, 50000).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].alt, vec!["<DEL>"]);
    assert!(source.variants("chr1", 60001, 70000).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_variants_in_regions() {
    let fixture = multi_record_fixture();
    let source = fixture.open(None).await.unwrap();

    let records = source
        .variants_in_regions(&["chr2", "chr1:120-20,001", "1:1-100", "chr1:45,000"])
        .await
        .unwrap();
    let positions: Vec<(String, u32)> = records
        .iter()
        .map(|r| (r.contig.clone(), r.position))
        .collect();
    assert_eq!(
        positions,
        vec![
            ("chr1".to_string(), 100),
            ("chr1".to_string(), 150),
            ("chr1".to_string(), 20000),
            ("chr1".to_string(), 40000),
            ("chr2".to_string(), 500),
        ]
    );

    let err = source.variants_in_regions(&["chr1:300-200"]).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_concurrent_queries() {
    let fixture = multi_record_fixture();
    let source = Arc::new(fixture.open(None).await.unwrap());

    let mut tasks = tokio::task::JoinSet::new();
    for (pos, end) in [(1, 200), (90, 160), (1, 100_000), (20000, 20000)] {
        let source = Arc::clone(&source);
        tasks.spawn(async move { source.variants("chr1", pos, end).await.map(|r| r.len()) });
    }

    let mut counts = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        counts.push(joined.unwrap().unwrap());
    }
    counts.sort();
    assert_eq!(counts, vec![1, 2, 2, 4]);
    assert!(source.file().index().is_parsed("chr1"));
    assert!(!source.file().index().is_parsed("chr2"));
}

#[tokio::test]
async fn test_genome_inferred_from_reference_line() {
    let columns = format!("{}\ts1", COLUMNS);
    let fixture = Fixture::new(
        &[
            "##fileformat=VCFv4.1",
            "##reference=/refs/human_g1k_v37.fasta",
            &columns,
        ],
        &[&["1\t100\t.\tA\tC\t50\tPASS\t.\tGT\t0/1"]],
    );
    let source = fixture.open(None).await.unwrap();
    assert_eq!(source.reference_genome(), ReferenceGenome::b37());

    let records = source.variants("chr1", 1, 200).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].contig, "1");
}

#[tokio::test]
async fn test_genome_inferred_from_contig_lines() {
    let columns = format!("{}\ts1", COLUMNS);
    let fixture = Fixture::new(
        &[
            "##fileformat=VCFv4.1",
            "##contig=<ID=1,length=249250621>",
            "##contig=<ID=MT,length=16569>",
            &columns,
        ],
        &[&["MT\t73\t.\tA\tG\t50\tPASS\t.\tGT\t1/1"]],
    );
    let source = fixture.open(None).await.unwrap();
    assert_eq!(source.reference_genome(), ReferenceGenome::b37());

    let records = source.variants("chrM", 1, 100).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].genotype(None), Some("G/G"));
}

#[tokio::test]
async fn test_sites_only_file() {
    let fixture = Fixture::new(
        &[
            "##fileformat=VCFv4.2",
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO",
        ],
        &[&["chr1\t100\trs1\tA\tT\t100.0\tPASS\tAC=1"]],
    );
    let source = fixture.open(None).await.unwrap();
    assert!(source.samples().is_empty());

    let records = source.variants("chr1", 1, 200).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].to_string(), "chr1:100A>T");
    assert_eq!(records[0].genotype(None), None);

    let synthetic = source
        .variant("chr1", 100, "A", "G", true)
        .await
        .unwrap()
        .unwrap();
    assert!(synthetic.is_synthetic);
    assert_eq!(synthetic.genotypes().count(), 0);
    assert_eq!(synthetic.hgvs().unwrap(), "chr1:g.100A>G");

    let json: Value = serde_json::to_value(&records[0]).unwrap();
    assert!(json["genotypes"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_indexed_file_metadata() {
    let fixture = multi_record_fixture();
    let file = TabixIndexedFile::open(
        storage(&fixture.data_path()),
        storage(&fixture.index_path()),
    )
    .await
    .unwrap();

    assert_eq!(file.contigs(), ["chr1", "chr2"]);
    assert_eq!(file.format(), IndexFormat::Vcf);
    assert_eq!(file.comment_char(), '#');
    assert_eq!(file.skip_lines(), 0);

    let lines = file.records("chr2", 1, 1000).await.unwrap();
    assert_eq!(lines, vec!["chr2\t500\trs9\tG\tC\t50\tPASS\t.\tGT\t1/1\t0/1"]);

    let err = file.records("chr7", 1, 1000).await.unwrap_err();
    assert!(matches!(err, Error::ContigNotInIndex(_)));
}

#[tokio::test]
async fn test_invalid_index_rejected() {
    let fixture = single_record_fixture();
    let bogus = fixture.dir.path().join("bogus.tbi");
    let mut bytes = bgzf_block(b"BAI\x01not an index");
    bytes.extend_from_slice(&bgzf_block(&[]));
    std::fs::write(&bogus, bytes).unwrap();

    let err = VariantSource::open(storage(&fixture.data_path()), storage(&bogus), None)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::Format(_)));
}

#[tokio::test]
async fn test_missing_file() {
    let fixture = single_record_fixture();
    let missing = fixture.dir.path().join("missing.vcf.gz.tbi");

    let err = VariantSource::open(storage(&fixture.data_path()), storage(&missing), None)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_open_location_and_json_output() {
    let fixture = single_record_fixture();
    let data = open_location(fixture.data_path().to_str().unwrap()).unwrap();
    let index = open_location(fixture.index_path().to_str().unwrap()).unwrap();
    let source = VariantSource::open(data, index, None).await.unwrap();

    let records = source.variants("chr1", 1, 200).await.unwrap();
    let json: Value = serde_json::to_value(&records[0]).unwrap();
    assert_eq!(json["contig"], "chr1");
    assert_eq!(json["position"], 100);
    assert_eq!(json["ids"][0], "rs1");
    assert_eq!(json["ref"], "A");
    assert_eq!(json["is_synthetic"], false);
    assert_eq!(json["genotypes"]["sample"], "A/T");
}
