//! Plain text tables used around the interaction analysis
//!
//! Diet, correlation and BLAST files are small line oriented formats read by
//! hand so that errors can name the offending line. The similarity and growth
//! rate tables are CSV files handled through polars with explicit column
//! types, keeping ids as strings.
use std::fs;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use polars::prelude::*;
use thiserror::Error;

use crate::interaction::growth::{GrowthRateRecord, GROWTH_RATE_COLUMNS};
use crate::interaction::medium::Medium;
use crate::interaction::InteractionType;

pub const SIMILARITY_COLUMNS: [&str; 3] = ["OTU_ID", "GENOME_ID", "SIMILARITY"];

/// Association between two OTUs
#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub otu_a: String,
    pub otu_b: String,
    pub value: f64,
}

/// Best match of an OTU against a genome database
#[derive(Debug, Clone, PartialEq)]
pub struct Similarity {
    pub otu_id: String,
    pub genome_id: String,
    /// Percent identity of the match
    pub similarity: f64,
}

fn read_lines(path: &Path) -> Result<String, TabularError> {
    fs::read_to_string(path).map_err(|err| TabularError::Io {
        path: path.display().to_string(),
        source: err,
    })
}

fn format_error(path: &Path, line: usize, message: impl Into<String>) -> TabularError {
    TabularError::Format {
        path: path.display().to_string(),
        line,
        message: message.into(),
    }
}

fn parse_float(path: &Path, line: usize, value: &str) -> Result<f64, TabularError> {
    value
        .trim()
        .parse()
        .map_err(|_| format_error(path, line, format!("'{value}' is not a number")))
}

/// Read a diet file into a medium
///
/// Each line holds three tab separated fields: exchange reaction id, reaction
/// name (ignored) and the bound in the uptake direction, stored as its
/// absolute value. The first line is a header and is skipped. Any other line
/// without exactly three fields, blank lines included, is an error.
pub fn read_diet_file<P: AsRef<Path>>(path: P) -> Result<Medium, TabularError> {
    let path = path.as_ref();
    let content = read_lines(path)?;
    let mut medium = Medium::new();
    for (index, line) in content.lines().enumerate().skip(1) {
        let line_number = index + 1;
        let fields: Vec<&str> = line.trim().split('\t').collect();
        if fields.len() != 3 {
            return Err(format_error(path, line_number, "must have three fields"));
        }
        let bound = parse_float(path, line_number, fields[2])?;
        medium.insert(fields[0].to_string(), bound.abs());
    }
    Ok(medium)
}

/// Read a correlation file of OTU pairs
///
/// The first line is a header. Every other line has three whitespace
/// separated fields: two OTU ids and an association value in [-1, 1].
pub fn read_correlation_file<P: AsRef<Path>>(path: P) -> Result<Vec<Correlation>, TabularError> {
    let path = path.as_ref();
    let content = read_lines(path)?;
    let mut correlations = Vec::new();
    for (index, line) in content.lines().enumerate().skip(1) {
        let line_number = index + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != 3 {
            return Err(format_error(path, line_number, "must have three fields"));
        }
        let value = parse_float(path, line_number, fields[2])?;
        if !(-1.0..=1.0).contains(&value) {
            return Err(format_error(
                path,
                line_number,
                format!("value {value} is outside of [-1, 1]"),
            ));
        }
        correlations.push(Correlation {
            otu_a: fields[0].to_string(),
            otu_b: fields[1].to_string(),
            value,
        });
    }
    Ok(correlations)
}

/// OTU ids referenced by the correlations, in order of first appearance
pub fn unique_otus(correlations: &[Correlation]) -> IndexSet<String> {
    correlations
        .iter()
        .flat_map(|c| [c.otu_a.clone(), c.otu_b.clone()])
        .collect()
}

/// Parse BLAST tabular output (`-outfmt 6`)
///
/// Returns the matched genome ids and, for every query, its first hit as a
/// similarity row. The second field of a hit is the genome id and the third
/// the percent identity.
pub fn read_blast_output<P: AsRef<Path>>(
    path: P,
) -> Result<(IndexSet<String>, Vec<Similarity>), TabularError> {
    let path = path.as_ref();
    let content = read_lines(path)?;
    let mut genome_ids = IndexSet::new();
    let mut best_hits: IndexMap<String, Similarity> = IndexMap::new();
    for (index, line) in content.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 3 {
            return Err(format_error(path, index + 1, "must have at least three fields"));
        }
        let similarity = parse_float(path, index + 1, fields[2])?;
        genome_ids.insert(fields[1].to_string());
        best_hits
            .entry(fields[0].to_string())
            .or_insert_with(|| Similarity {
                otu_id: fields[0].to_string(),
                genome_id: fields[1].to_string(),
                similarity,
            });
    }
    Ok((genome_ids, best_hits.into_values().collect()))
}

/// One sequence of a FASTA file
#[derive(Debug, Clone, PartialEq)]
pub struct FastaRecord {
    /// Header text up to the first whitespace
    pub id: String,
    /// Full header line without the leading `>`
    pub description: String,
    pub sequence: String,
}

const FASTA_LINE_WIDTH: usize = 60;

/// Read every record of a FASTA file, sequence lines are concatenated
pub fn read_fasta<P: AsRef<Path>>(path: P) -> Result<Vec<FastaRecord>, TabularError> {
    let path = path.as_ref();
    let content = read_lines(path)?;
    let mut records: Vec<FastaRecord> = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if let Some(header) = line.strip_prefix('>') {
            let description = header.trim().to_string();
            records.push(FastaRecord {
                id: description
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string(),
                description,
                sequence: String::new(),
            });
        } else if !line.is_empty() {
            let record = records
                .last_mut()
                .ok_or_else(|| format_error(path, index + 1, "has sequence data before the first header"))?;
            record.sequence.push_str(line);
        }
    }
    Ok(records)
}

/// Write records as FASTA with sequences wrapped at 60 characters
pub fn write_fasta<P: AsRef<Path>>(records: &[FastaRecord], path: P) -> Result<(), TabularError> {
    let path = path.as_ref();
    let mut out = String::new();
    for record in records {
        out.push('>');
        out.push_str(&record.description);
        out.push('\n');
        let bases: Vec<char> = record.sequence.chars().collect();
        for chunk in bases.chunks(FASTA_LINE_WIDTH) {
            out.extend(chunk);
            out.push('\n');
        }
    }
    fs::write(path, out).map_err(|err| TabularError::Io {
        path: path.display().to_string(),
        source: err,
    })
}

/// Keep the 16S sequences of the OTUs named in a correlation file
///
/// Reads the OTUs of `correlation`, writes the records of `sequences` whose id
/// is one of them to `output` and returns the number of records written.
pub fn get_unique_otu_sequences<P, Q, R>(
    correlation: P,
    sequences: Q,
    output: R,
) -> Result<usize, TabularError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    let otus = unique_otus(&read_correlation_file(correlation)?);
    let records: Vec<FastaRecord> = read_fasta(sequences)?
        .into_iter()
        .filter(|record| otus.contains(&record.id))
        .collect();
    write_fasta(&records, output)?;
    Ok(records.len())
}

fn create_file(path: &Path) -> Result<File, TabularError> {
    File::create(path).map_err(|err| TabularError::Io {
        path: path.display().to_string(),
        source: err,
    })
}

fn read_csv(path: &Path, schema: Schema) -> Result<DataFrame, TabularError> {
    Ok(CsvReadOptions::default()
        .with_has_header(true)
        .with_schema(Some(Arc::new(schema)))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?)
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>, TabularError> {
    Ok(df
        .column(name)?
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>, TabularError> {
    Ok(df
        .column(name)?
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Write OTU to genome similarities as CSV
pub fn write_similarity_file<P: AsRef<Path>>(
    similarities: &[Similarity],
    path: P,
) -> Result<(), TabularError> {
    let [otu, genome, similarity] = SIMILARITY_COLUMNS;
    let mut df = df!(
        otu => similarities.iter().map(|s| s.otu_id.as_str()).collect::<Vec<_>>(),
        genome => similarities.iter().map(|s| s.genome_id.as_str()).collect::<Vec<_>>(),
        similarity => similarities.iter().map(|s| s.similarity).collect::<Vec<_>>()
    )?;
    let mut file = create_file(path.as_ref())?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(())
}

pub fn read_similarity_file<P: AsRef<Path>>(path: P) -> Result<Vec<Similarity>, TabularError> {
    let [otu, genome, similarity] = SIMILARITY_COLUMNS;
    let schema = Schema::from_iter([
        Field::new(otu, DataType::String),
        Field::new(genome, DataType::String),
        Field::new(similarity, DataType::Float64),
    ]);
    let df = read_csv(path.as_ref(), schema)?;
    let otu_ids = string_column(&df, otu)?;
    let genome_ids = string_column(&df, genome)?;
    let similarities = float_column(&df, similarity)?;
    Ok(otu_ids
        .into_iter()
        .zip(genome_ids)
        .zip(similarities)
        .map(|((otu_id, genome_id), similarity)| Similarity {
            otu_id,
            genome_id,
            similarity,
        })
        .collect())
}

/// Write growth rate records as CSV with the [`GROWTH_RATE_COLUMNS`] header
pub fn write_growth_rates_file<P: AsRef<Path>>(
    records: &[GrowthRateRecord],
    path: P,
) -> Result<(), TabularError> {
    let floats = |f: fn(&GrowthRateRecord) -> f64| records.iter().map(f).collect::<Vec<f64>>();
    let [a_id, b_id, kind, together, a_together, b_together, a_alone, b_alone, a_change, b_change] =
        GROWTH_RATE_COLUMNS;
    let mut df = df!(
        a_id => records.iter().map(|r| r.a_id.as_str()).collect::<Vec<_>>(),
        b_id => records.iter().map(|r| r.b_id.as_str()).collect::<Vec<_>>(),
        kind => records.iter().map(|r| r.interaction.as_str()).collect::<Vec<_>>(),
        together => floats(|r| r.together),
        a_together => floats(|r| r.a_together),
        b_together => floats(|r| r.b_together),
        a_alone => floats(|r| r.a_alone),
        b_alone => floats(|r| r.b_alone),
        a_change => floats(|r| r.a_change),
        b_change => floats(|r| r.b_change)
    )?;
    let mut file = create_file(path.as_ref())?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(())
}

/// Read a growth rate table, ids are always read as strings
pub fn read_growth_rates_file<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<GrowthRateRecord>, TabularError> {
    let schema = Schema::from_iter(GROWTH_RATE_COLUMNS.iter().enumerate().map(|(i, name)| {
        let dtype = if i < 3 {
            DataType::String
        } else {
            DataType::Float64
        };
        Field::new(name, dtype)
    }));
    let df = read_csv(path.as_ref(), schema)?;
    let [a_id, b_id, kind, rest @ ..] = GROWTH_RATE_COLUMNS;
    let a_ids = string_column(&df, a_id)?;
    let b_ids = string_column(&df, b_id)?;
    let kinds = string_column(&df, kind)?
        .iter()
        .map(|k| k.parse::<InteractionType>().map_err(TabularError::InteractionType))
        .collect::<Result<Vec<_>, _>>()?;
    let values = rest
        .iter()
        .map(|name| float_column(&df, name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((0..df.height())
        .map(|i| GrowthRateRecord {
            a_id: a_ids[i].clone(),
            b_id: b_ids[i].clone(),
            interaction: kinds[i],
            together: values[0][i],
            a_together: values[1][i],
            b_together: values[2][i],
            a_alone: values[3][i],
            b_alone: values[4][i],
            a_change: values[5][i],
            b_change: values[6][i],
        })
        .collect())
}

#[derive(Error, Debug)]
pub enum TabularError {
    #[error("Failed to access {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Line {line} in file \"{path}\" {message}")]
    Format {
        path: String,
        line: usize,
        message: String,
    },
    #[error("{0}")]
    InteractionType(String),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn diet() {
        let file = file_with("ID\tNAME\tBOUND\nEX_glc_e\tGlucose\t-10\nEX_o2_e\tOxygen\t18.5\n");
        let medium = read_diet_file(file.path()).unwrap();
        assert_eq!(medium.len(), 2);
        assert_eq!(medium["EX_glc_e"], 10.);
        assert_eq!(medium["EX_o2_e"], 18.5);
    }

    #[test]
    fn diet_errors_name_line_and_path() {
        let file = file_with("ID\tNAME\tBOUND\nEX_glc_e\tGlucose\t10\nEX_o2_e\t18.5\n");
        match read_diet_file(file.path()) {
            Err(TabularError::Format { path, line, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(path, file.path().display().to_string());
            }
            other => panic!("unexpected result {other:?}"),
        }
        let file = file_with("ID\tNAME\tBOUND\nEX_glc_e\tGlucose\tlots\n");
        let err = read_diet_file(file.path()).unwrap_err();
        assert!(err.to_string().starts_with("Line 2 in file"));

        let file = file_with("ID\tNAME\tBOUND\nEX_glc_e\tGlucose\t10\n\nEX_o2_e\tOxygen\t18.5\n");
        let err = read_diet_file(file.path()).unwrap_err();
        assert!(matches!(err, TabularError::Format { line: 3, .. }));
        assert!(err.to_string().ends_with("must have three fields"));
    }

    #[test]
    fn correlations() {
        let file = file_with("OTU1 OTU2 VALUE\notu_1\totu_2\t0.8\notu_2 otu_3 -0.25\n");
        let correlations = read_correlation_file(file.path()).unwrap();
        assert_eq!(correlations.len(), 2);
        assert_eq!(correlations[1].value, -0.25);
        let otus: Vec<String> = unique_otus(&correlations).into_iter().collect();
        assert_eq!(otus, vec!["otu_1", "otu_2", "otu_3"]);

        let file = file_with("header\notu_1 otu_2\n");
        assert!(matches!(
            read_correlation_file(file.path()),
            Err(TabularError::Format { line: 2, .. })
        ));
        let file = file_with("header\notu_1 otu_2 0.5\notu_1 otu_3 1.5\n");
        assert!(matches!(
            read_correlation_file(file.path()),
            Err(TabularError::Format { line: 3, .. })
        ));
    }

    #[test]
    fn blast_first_hit() {
        let file = file_with(
            "otu_1\t1234.5\t99.2\t1400\n\
             otu_1\t6789.1\t98.0\t1400\n\
             otu_2\t6789.1\t97.5\t1380\n",
        );
        let (genomes, hits) = read_blast_output(file.path()).unwrap();
        assert_eq!(genomes.len(), 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].genome_id, "1234.5");
        assert_eq!(hits[0].similarity, 99.2);
        assert_eq!(hits[1].otu_id, "otu_2");
    }

    #[test]
    fn similarity_table() {
        let rows = vec![
            Similarity {
                otu_id: "0001".to_string(),
                genome_id: "1234.5".to_string(),
                similarity: 99.2,
            },
            Similarity {
                otu_id: "0002".to_string(),
                genome_id: "6789.10".to_string(),
                similarity: 97.5,
            },
        ];
        let file = NamedTempFile::new().unwrap();
        write_similarity_file(&rows, file.path()).unwrap();
        // numeric looking ids keep their leading zeros
        assert_eq!(read_similarity_file(file.path()).unwrap(), rows);
    }

    #[test]
    fn growth_rate_table() {
        let records = vec![
            GrowthRateRecord {
                a_id: "0001".to_string(),
                b_id: "1234.50".to_string(),
                interaction: InteractionType::Commensalism,
                together: 20.,
                a_together: 10.,
                b_together: 10.,
                a_alone: 10.,
                b_alone: 0.,
                a_change: 0.,
                b_change: 1e13,
            },
            GrowthRateRecord {
                a_id: "sa".to_string(),
                b_id: "sb".to_string(),
                interaction: InteractionType::Empty,
                together: 0.,
                a_together: 0.,
                b_together: 0.,
                a_alone: 0.,
                b_alone: 0.,
                a_change: 0.,
                b_change: 0.,
            },
        ];
        let file = NamedTempFile::new().unwrap();
        write_growth_rates_file(&records, file.path()).unwrap();
        let header = fs::read_to_string(file.path()).unwrap();
        assert!(header.starts_with(&GROWTH_RATE_COLUMNS.join(",")));
        assert_eq!(read_growth_rates_file(file.path()).unwrap(), records);
    }

    #[test]
    fn otu_sequences() {
        let correlation = file_with("OTU_A OTU_B VALUE\notu_1 otu_3 0.7\notu_3 otu_4 -0.4\n");
        let sequences = file_with(
            ">otu_1 Bacteroides\nACGT\nACGT\n>otu_2\nGGGG\n>otu_3\nTTTT\n",
        );
        let output = NamedTempFile::new().unwrap();
        let written =
            get_unique_otu_sequences(correlation.path(), sequences.path(), output.path()).unwrap();
        // otu_4 has no sequence
        assert_eq!(written, 2);
        assert_eq!(
            fs::read_to_string(output.path()).unwrap(),
            ">otu_1 Bacteroides\nACGTACGT\n>otu_3\nTTTT\n"
        );
    }

    #[test]
    fn fasta_wrapping_and_errors() {
        let record = FastaRecord {
            id: "otu_1".to_string(),
            description: "otu_1".to_string(),
            sequence: "A".repeat(130),
        };
        let file = NamedTempFile::new().unwrap();
        write_fasta(&[record.clone()], file.path()).unwrap();
        let lengths: Vec<usize> = fs::read_to_string(file.path())
            .unwrap()
            .lines()
            .skip(1)
            .map(str::len)
            .collect();
        assert_eq!(lengths, vec![60, 60, 10]);
        assert_eq!(read_fasta(file.path()).unwrap(), vec![record]);

        let file = file_with("ACGT\n>otu_1\nACGT\n");
        assert!(matches!(
            read_fasta(file.path()),
            Err(TabularError::Format { line: 1, .. })
        ));
    }
}
