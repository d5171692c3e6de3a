//! Module providing MATLAB (MAT v5) IO for Models
//!
//! Models are stored the way the COBRA Toolbox stores them: a single struct
//! variable with fields such as `rxns`, `mets`, `S`, `lb`, `ub` and `c`.
//! Reading accepts little and big endian files and zlib compressed
//! elements, writing produces an uncompressed little endian file.
use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::community::ids::IdType;
use crate::configuration::current;
use crate::metabolic_model::gene::Gene;
use crate::metabolic_model::metabolite::Metabolite;
use crate::metabolic_model::model::Model;
use crate::metabolic_model::reaction::{ReactionBuilder, ReactionBuilderError};

// region Format constants
const HEADER_LEN: usize = 128;
const HEADER_TEXT_LEN: usize = 116;
const FIELD_NAME_LEN: usize = 32;

const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;
const MI_UTF8: u32 = 16;
const MI_UTF16: u32 = 17;
const MI_UTF32: u32 = 18;

const MX_CELL: u8 = 1;
const MX_STRUCT: u8 = 2;
const MX_CHAR: u8 = 4;
const MX_SPARSE: u8 = 5;
const MX_DOUBLE: u8 = 6;
const MX_UINT64: u8 = 15;
// endregion Format constants

/// Decoded MATLAB array
#[derive(Debug, Clone, PartialEq)]
enum MatArray {
    Numeric {
        dims: Vec<usize>,
        values: Vec<f64>,
    },
    Char {
        dims: Vec<usize>,
        chars: Vec<char>,
    },
    Cell {
        dims: Vec<usize>,
        cells: Vec<MatArray>,
    },
    Struct {
        dims: Vec<usize>,
        elements: Vec<IndexMap<String, MatArray>>,
    },
    Sparse {
        dims: Vec<usize>,
        triplets: Vec<(usize, usize, f64)>,
    },
    Unsupported(u8),
}

impl MatArray {
    /// Strings of a cell array or the rows of a char matrix
    fn strings(&self) -> Vec<String> {
        match self {
            MatArray::Cell { cells, .. } => cells
                .iter()
                .map(|cell| cell.strings().into_iter().next().unwrap_or_default())
                .collect(),
            MatArray::Char { dims, chars } => {
                let rows = dims.first().copied().unwrap_or(0);
                if rows == 0 {
                    return vec![String::new()];
                }
                let columns = chars.len() / rows;
                (0..rows)
                    .map(|r| {
                        (0..columns)
                            .map(|c| chars[c * rows + r])
                            .collect::<String>()
                            .trim_end()
                            .to_string()
                    })
                    .collect()
            }
            MatArray::Numeric { values, .. } if values.is_empty() => vec![String::new()],
            _ => Vec::new(),
        }
    }

    fn text(&self) -> String {
        self.strings().join("\n")
    }

    fn values(&self) -> Vec<f64> {
        match self {
            MatArray::Numeric { values, .. } => values.clone(),
            MatArray::Sparse { dims, triplets } => {
                let rows = dims.first().copied().unwrap_or(0);
                let mut values = vec![0.; dims.iter().product()];
                for (r, c, v) in triplets {
                    if let Some(slot) = values.get_mut(c * rows + r) {
                        *slot = *v;
                    }
                }
                values
            }
            _ => Vec::new(),
        }
    }

    /// Nonzero entries as (row, column, value)
    fn triplets(&self) -> Vec<(usize, usize, f64)> {
        match self {
            MatArray::Sparse { triplets, .. } => triplets.clone(),
            MatArray::Numeric { dims, values } => {
                let rows = dims.first().copied().unwrap_or(0).max(1);
                values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| **v != 0.)
                    .map(|(i, v)| (i % rows, i / rows, *v))
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}

// region Reading
struct ElementReader<'a> {
    data: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> ElementReader<'a> {
    fn new(data: &'a [u8], big_endian: bool) -> Self {
        ElementReader {
            data,
            pos: 0,
            big_endian,
        }
    }

    fn u32_at(&self, pos: usize) -> Result<u32, MatError> {
        let bytes: [u8; 4] = self
            .data
            .get(pos..pos + 4)
            .and_then(|b| b.try_into().ok())
            .ok_or(MatError::Truncated)?;
        Ok(if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    /// Next data element as (type, data), `None` at the end of the data
    fn next(&mut self) -> Result<Option<(u32, &'a [u8])>, MatError> {
        if self.pos + 8 > self.data.len() {
            return Ok(None);
        }
        let word = self.u32_at(self.pos)?;
        // small data element: size and type share the first word
        if word >> 16 != 0 {
            let size = (word >> 16) as usize;
            let data = self
                .data
                .get(self.pos + 4..self.pos + 4 + size.min(4))
                .ok_or(MatError::Truncated)?;
            self.pos += 8;
            return Ok(Some((word & 0xffff, data)));
        }
        let size = self.u32_at(self.pos + 4)? as usize;
        let start = self.pos + 8;
        let data = self
            .data
            .get(start..start + size)
            .ok_or(MatError::Truncated)?;
        self.pos = if word == MI_COMPRESSED {
            start + size
        } else {
            start + size.div_ceil(8) * 8
        };
        Ok(Some((word, data)))
    }

    fn required(&mut self) -> Result<(u32, &'a [u8]), MatError> {
        self.next()?.ok_or(MatError::Truncated)
    }
}

macro_rules! decode {
    ($data:expr, $big_endian:expr, $t:ty) => {{
        const N: usize = std::mem::size_of::<$t>();
        $data
            .chunks_exact(N)
            .map(|chunk| {
                let mut bytes = [0u8; N];
                bytes.copy_from_slice(chunk);
                if $big_endian {
                    <$t>::from_be_bytes(bytes) as f64
                } else {
                    <$t>::from_le_bytes(bytes) as f64
                }
            })
            .collect::<Vec<f64>>()
    }};
}

fn decode_numbers(data_type: u32, data: &[u8], big_endian: bool) -> Result<Vec<f64>, MatError> {
    Ok(match data_type {
        MI_INT8 => data.iter().map(|b| *b as i8 as f64).collect(),
        MI_UINT8 | MI_UTF8 => data.iter().map(|b| *b as f64).collect(),
        MI_INT16 => decode!(data, big_endian, i16),
        MI_UINT16 | MI_UTF16 => decode!(data, big_endian, u16),
        MI_INT32 => decode!(data, big_endian, i32),
        MI_UINT32 | MI_UTF32 => decode!(data, big_endian, u32),
        MI_SINGLE => decode!(data, big_endian, f32),
        MI_DOUBLE => decode!(data, big_endian, f64),
        MI_INT64 => decode!(data, big_endian, i64),
        MI_UINT64 => decode!(data, big_endian, u64),
        other => return Err(MatError::UnsupportedDataType(other)),
    })
}

fn decode_indices(data_type: u32, data: &[u8], big_endian: bool) -> Result<Vec<usize>, MatError> {
    Ok(decode_numbers(data_type, data, big_endian)?
        .into_iter()
        .map(|v| v.max(0.) as usize)
        .collect())
}

fn decode_chars(data_type: u32, data: &[u8], big_endian: bool) -> Result<Vec<char>, MatError> {
    Ok(match data_type {
        MI_UTF8 => String::from_utf8_lossy(data).chars().collect(),
        MI_UINT16 | MI_UTF16 => {
            let units: Vec<u16> = decode_numbers(data_type, data, big_endian)?
                .into_iter()
                .map(|v| v as u16)
                .collect();
            char::decode_utf16(units)
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
        other => decode_numbers(other, data, big_endian)?
            .into_iter()
            .map(|v| char::from_u32(v as u32).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect(),
    })
}

/// Parse the body of a miMATRIX element into its name and array
fn parse_matrix(body: &[u8], big_endian: bool) -> Result<(String, MatArray), MatError> {
    if body.is_empty() {
        return Ok((
            String::new(),
            MatArray::Numeric {
                dims: vec![0, 0],
                values: Vec::new(),
            },
        ));
    }
    let mut reader = ElementReader::new(body, big_endian);
    let (_, flags) = reader.required()?;
    let class = flags.first().copied().ok_or(MatError::Truncated)?;
    let (dims_type, dims) = reader.required()?;
    let dims = decode_indices(dims_type, dims, big_endian)?;
    let (_, name) = reader.required()?;
    let name = String::from_utf8_lossy(name).trim_end_matches('\0').to_string();
    let count: usize = dims.iter().product();

    let array = match class {
        MX_CELL => {
            let mut cells = Vec::with_capacity(count);
            for _ in 0..count {
                let (data_type, data) = reader.required()?;
                if data_type != MI_MATRIX {
                    return Err(MatError::UnsupportedDataType(data_type));
                }
                cells.push(parse_matrix(data, big_endian)?.1);
            }
            MatArray::Cell { dims, cells }
        }
        MX_STRUCT => {
            let (length_type, length) = reader.required()?;
            let length = decode_indices(length_type, length, big_endian)?
                .first()
                .copied()
                .unwrap_or(0)
                .max(1);
            let (_, names) = reader.required()?;
            let names: Vec<String> = names
                .chunks(length)
                .map(|chunk| {
                    String::from_utf8_lossy(chunk)
                        .trim_end_matches('\0')
                        .to_string()
                })
                .collect();
            let mut elements = Vec::with_capacity(count);
            for _ in 0..count {
                let mut fields = IndexMap::new();
                for field in &names {
                    let (data_type, data) = reader.required()?;
                    if data_type != MI_MATRIX {
                        return Err(MatError::UnsupportedDataType(data_type));
                    }
                    fields.insert(field.clone(), parse_matrix(data, big_endian)?.1);
                }
                elements.push(fields);
            }
            MatArray::Struct { dims, elements }
        }
        MX_CHAR => {
            let chars = match reader.next()? {
                Some((data_type, data)) => decode_chars(data_type, data, big_endian)?,
                None => Vec::new(),
            };
            MatArray::Char { dims, chars }
        }
        MX_SPARSE => {
            let (ir_type, ir) = reader.required()?;
            let ir = decode_indices(ir_type, ir, big_endian)?;
            let (jc_type, jc) = reader.required()?;
            let jc = decode_indices(jc_type, jc, big_endian)?;
            // logical sparse matrices carry no values
            let values = match reader.next()? {
                Some((data_type, data)) => decode_numbers(data_type, data, big_endian)?,
                None => vec![1.; ir.len()],
            };
            let mut triplets = Vec::with_capacity(ir.len());
            for (column, window) in jc.windows(2).enumerate() {
                for k in window[0]..window[1] {
                    let (Some(row), Some(value)) = (ir.get(k), values.get(k)) else {
                        return Err(MatError::Truncated);
                    };
                    triplets.push((*row, column, *value));
                }
            }
            MatArray::Sparse { dims, triplets }
        }
        MX_DOUBLE..=MX_UINT64 => {
            let values = match reader.next()? {
                Some((data_type, data)) => decode_numbers(data_type, data, big_endian)?,
                None => Vec::new(),
            };
            MatArray::Numeric { dims, values }
        }
        other => MatArray::Unsupported(other),
    };
    Ok((name, array))
}

/// All variables stored in a MAT file
fn read_variables(bytes: &[u8]) -> Result<Vec<(String, MatArray)>, MatError> {
    if bytes.len() < HEADER_LEN {
        return Err(MatError::NotMatFile);
    }
    let big_endian = match &bytes[HEADER_LEN - 2..HEADER_LEN] {
        b"IM" => false,
        b"MI" => true,
        _ => return Err(MatError::NotMatFile),
    };
    let mut reader = ElementReader::new(&bytes[HEADER_LEN..], big_endian);
    let mut variables = Vec::new();
    while let Some((data_type, data)) = reader.next()? {
        match data_type {
            MI_MATRIX => variables.push(parse_matrix(data, big_endian)?),
            MI_COMPRESSED => {
                let mut inflated = Vec::new();
                ZlibDecoder::new(data)
                    .read_to_end(&mut inflated)
                    .map_err(MatError::Decompress)?;
                let mut inner = ElementReader::new(&inflated, big_endian);
                if let Some((MI_MATRIX, data)) = inner.next()? {
                    variables.push(parse_matrix(data, big_endian)?);
                }
            }
            _ => {}
        }
    }
    Ok(variables)
}

fn required_field<'a>(
    fields: &'a IndexMap<String, MatArray>,
    name: &'static str,
) -> Result<&'a MatArray, MatError> {
    fields.get(name).ok_or(MatError::MissingField(name))
}

/// Strings of an optional per item field, padded to `len`
fn optional_strings(fields: &IndexMap<String, MatArray>, name: &str, len: usize) -> Vec<Option<String>> {
    let mut strings: Vec<Option<String>> = fields
        .get(name)
        .map(|array| {
            array
                .strings()
                .into_iter()
                .map(|s| if s.is_empty() { None } else { Some(s) })
                .collect()
        })
        .unwrap_or_default();
    strings.resize(len, None);
    strings
}

fn optional_notes(
    fields: &IndexMap<String, MatArray>,
    name: &str,
    len: usize,
) -> Result<Vec<IndexMap<String, Value>>, MatError> {
    optional_strings(fields, name, len)
        .into_iter()
        .map(|notes| match notes {
            Some(json) => serde_json::from_str(&json).map_err(MatError::InvalidNotes),
            None => Ok(IndexMap::new()),
        })
        .collect()
}

fn check_len(field: &'static str, expected: usize, found: usize) -> Result<(), MatError> {
    if expected != found {
        return Err(MatError::DimensionMismatch {
            field,
            expected,
            found,
        });
    }
    Ok(())
}

fn model_from_struct(
    variable: &str,
    fields: &IndexMap<String, MatArray>,
) -> Result<Model, MatError> {
    let configuration = current();
    let reaction_ids = required_field(fields, "rxns")?.strings();
    let metabolite_ids = required_field(fields, "mets")?.strings();
    let stoichiometry = required_field(fields, "S")?.triplets();
    let n_reactions = reaction_ids.len();
    let n_metabolites = metabolite_ids.len();

    let mut model = Model::new_empty();
    let description = fields.get("description").map(MatArray::text).unwrap_or_default();
    model.id = Some(if description.is_empty() {
        variable.to_string()
    } else {
        description
    });
    model.name = fields
        .get("modelName")
        .map(MatArray::text)
        .filter(|name| !name.is_empty());
    if let Some(notes) = fields.get("notes") {
        model.notes = serde_json::from_str(&notes.text()).map_err(MatError::InvalidNotes)?;
    }

    let compartment_ids = fields.get("comps").map(MatArray::strings).unwrap_or_default();
    let compartment_names = optional_strings(fields, "compNames", compartment_ids.len());
    for (id, name) in compartment_ids.iter().zip(&compartment_names) {
        model.add_compartment(id, name.as_deref().unwrap_or(id));
    }

    // metComps holds compartment ids or one based indices into comps
    let metabolite_compartments: Vec<Option<String>> = match fields.get("metComps") {
        Some(MatArray::Numeric { values, .. }) => values
            .iter()
            .map(|i| compartment_ids.get((*i as usize).wrapping_sub(1)).cloned())
            .collect(),
        Some(_) => optional_strings(fields, "metComps", n_metabolites),
        None => metabolite_ids
            .iter()
            .map(|id| IdType::classify(id).compartment(id))
            .collect(),
    };
    let names = optional_strings(fields, "metNames", n_metabolites);
    let formulas = optional_strings(fields, "metFormulas", n_metabolites);
    let charges = fields.get("metCharges").map(MatArray::values).unwrap_or_default();
    let metabolite_notes = optional_notes(fields, "metNotes", n_metabolites)?;
    for (i, id) in metabolite_ids.iter().enumerate() {
        model.add_metabolite(Metabolite {
            id: id.clone(),
            name: names[i].clone(),
            compartment: metabolite_compartments.get(i).cloned().flatten(),
            charge: charges
                .get(i)
                .filter(|c| c.is_finite())
                .map(|c| *c as i32)
                .unwrap_or(0),
            formula: formulas[i].clone(),
            notes: metabolite_notes[i].clone(),
            annotation: None,
        });
    }

    let reversible = fields.get("rev").map(MatArray::values);
    let lower_bounds = match fields.get("lb") {
        Some(lb) => lb.values(),
        None => (0..n_reactions)
            .map(|i| match &reversible {
                Some(rev) if rev.get(i).copied().unwrap_or(1.) == 0. => 0.,
                _ => configuration.lower_bound,
            })
            .collect(),
    };
    let upper_bounds = match fields.get("ub") {
        Some(ub) => ub.values(),
        None => vec![configuration.upper_bound; n_reactions],
    };
    check_len("lb", n_reactions, lower_bounds.len())?;
    check_len("ub", n_reactions, upper_bounds.len())?;
    let objective = fields.get("c").map(MatArray::values).unwrap_or_default();

    let mut columns: Vec<IndexMap<String, f64>> = vec![IndexMap::new(); n_reactions];
    for (row, column, value) in stoichiometry {
        if row >= n_metabolites || column >= n_reactions {
            return Err(MatError::DimensionMismatch {
                field: "S",
                expected: n_metabolites * n_reactions,
                found: row * n_reactions + column,
            });
        }
        columns[column].insert(metabolite_ids[row].clone(), value);
    }

    let reaction_names = optional_strings(fields, "rxnNames", n_reactions);
    let rules = optional_strings(fields, "grRules", n_reactions);
    let subsystems = optional_strings(fields, "subSystems", n_reactions);
    let reaction_notes = optional_notes(fields, "rxnNotes", n_reactions)?;
    for (i, (id, metabolites)) in reaction_ids.iter().zip(columns).enumerate() {
        let reaction = ReactionBuilder::default()
            .id(id.clone())
            .metabolites(metabolites)
            .name(reaction_names[i].clone())
            .gene_reaction_rule(rules[i].clone())
            .lower_bound(lower_bounds[i])
            .upper_bound(upper_bounds[i])
            .subsystem(subsystems[i].clone())
            .notes(reaction_notes[i].clone())
            .build()?;
        model.add_reaction(reaction);
        if let Some(coefficient) = objective.get(i).filter(|c| **c != 0.) {
            model.objective.insert(id.clone(), *coefficient);
        }
    }

    for gene in fields.get("genes").map(MatArray::strings).unwrap_or_default() {
        if !gene.is_empty() {
            model.add_gene(Gene::new(gene, None));
        }
    }
    Ok(model)
}

fn model_from_bytes(bytes: &[u8]) -> Result<Model, MatError> {
    read_variables(bytes)?
        .into_iter()
        .find_map(|(name, array)| match array {
            MatArray::Struct { mut elements, .. }
                if elements.len() == 1
                    && elements[0].contains_key("rxns")
                    && elements[0].contains_key("mets") =>
            {
                elements.pop().map(|fields| (name, fields))
            }
            _ => None,
        })
        .ok_or(MatError::NoModelStruct)
        .and_then(|(name, fields)| model_from_struct(&name, &fields))
}
// endregion Reading

// region Writing
fn push_element(out: &mut Vec<u8>, data_type: u32, data: &[u8]) {
    out.extend_from_slice(&data_type.to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    let padding = data.len().div_ceil(8) * 8 - data.len();
    out.extend(std::iter::repeat(0u8).take(padding));
}

fn matrix(name: &str, class: u8, nzmax: usize, dims: &[usize], content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    let mut flags = Vec::with_capacity(8);
    flags.extend_from_slice(&(class as u32).to_le_bytes());
    flags.extend_from_slice(&(nzmax as u32).to_le_bytes());
    push_element(&mut body, MI_UINT32, &flags);
    let dims: Vec<u8> = dims
        .iter()
        .flat_map(|d| (*d as i32).to_le_bytes())
        .collect();
    push_element(&mut body, MI_INT32, &dims);
    push_element(&mut body, MI_INT8, name.as_bytes());
    body.extend_from_slice(content);
    let mut element = Vec::with_capacity(body.len() + 8);
    push_element(&mut element, MI_MATRIX, &body);
    element
}

fn char_matrix(name: &str, text: &str) -> Vec<u8> {
    let units: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
    let dims = if units.is_empty() {
        [0, 0]
    } else {
        [1, units.len() / 2]
    };
    let mut content = Vec::new();
    push_element(&mut content, MI_UINT16, &units);
    matrix(name, MX_CHAR, 0, &dims, &content)
}

fn double_column(name: &str, values: &[f64]) -> Vec<u8> {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    let mut content = Vec::new();
    push_element(&mut content, MI_DOUBLE, &bytes);
    matrix(name, MX_DOUBLE, 0, &[values.len(), 1], &content)
}

fn string_cell<'a>(name: &str, strings: impl ExactSizeIterator<Item = &'a str>) -> Vec<u8> {
    let len = strings.len();
    let content: Vec<u8> = strings.flat_map(|s| char_matrix("", s)).collect();
    matrix(name, MX_CELL, 0, &[len, 1], &content)
}

/// Sparse matrix from entries sorted by column then row
fn sparse_matrix(name: &str, rows: usize, columns: usize, entries: &[(usize, usize, f64)]) -> Vec<u8> {
    let mut jc = vec![0i32; columns + 1];
    for (_, column, _) in entries {
        jc[column + 1] += 1;
    }
    for c in 0..columns {
        jc[c + 1] += jc[c];
    }
    let ir: Vec<u8> = entries
        .iter()
        .flat_map(|(row, _, _)| (*row as i32).to_le_bytes())
        .collect();
    let jc: Vec<u8> = jc.iter().flat_map(|v| v.to_le_bytes()).collect();
    let pr: Vec<u8> = entries.iter().flat_map(|(_, _, v)| v.to_le_bytes()).collect();
    let mut content = Vec::new();
    push_element(&mut content, MI_INT32, &ir);
    push_element(&mut content, MI_INT32, &jc);
    push_element(&mut content, MI_DOUBLE, &pr);
    matrix(name, MX_SPARSE, entries.len().max(1), &[rows, columns], &content)
}

fn struct_matrix(name: &str, fields: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut content = Vec::new();
    push_element(&mut content, MI_INT32, &(FIELD_NAME_LEN as i32).to_le_bytes());
    let mut names = Vec::with_capacity(fields.len() * FIELD_NAME_LEN);
    for (field, _) in fields {
        let mut padded = [0u8; FIELD_NAME_LEN];
        let len = field.len().min(FIELD_NAME_LEN - 1);
        padded[..len].copy_from_slice(&field.as_bytes()[..len]);
        names.extend_from_slice(&padded);
    }
    push_element(&mut content, MI_INT8, &names);
    for (_, value) in fields {
        content.extend_from_slice(value);
    }
    matrix(name, MX_STRUCT, 0, &[1, 1], &content)
}

/// Name of the struct variable: the model id made into a MATLAB identifier
fn variable_name(model: &Model) -> String {
    let sanitized: String = model
        .id
        .as_deref()
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(63)
        .collect();
    match sanitized.chars().next() {
        None => "model".to_string(),
        Some(c) if c.is_ascii_alphabetic() => sanitized,
        Some(_) => format!("m_{sanitized}").chars().take(63).collect(),
    }
}

fn encode_notes(notes: &IndexMap<String, Value>) -> Result<String, MatError> {
    if notes.is_empty() {
        return Ok(String::new());
    }
    serde_json::to_string(notes).map_err(MatError::InvalidNotes)
}

fn model_to_bytes(model: &Model) -> Result<Vec<u8>, MatError> {
    let metabolite_index: IndexMap<&str, usize> = model
        .metabolites
        .keys()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let mut entries = Vec::new();
    for (column, reaction) in model.reactions.values().enumerate() {
        let mut column_entries = Vec::with_capacity(reaction.metabolites.len());
        for (metabolite, coefficient) in &reaction.metabolites {
            let row = metabolite_index.get(metabolite.as_str()).ok_or_else(|| {
                MatError::UnknownMetabolite {
                    reaction: reaction.id.clone(),
                    metabolite: metabolite.clone(),
                }
            })?;
            column_entries.push((*row, column, *coefficient));
        }
        column_entries.sort_by_key(|(row, _, _)| *row);
        entries.extend(column_entries);
    }

    let reactions = || model.reactions.values();
    let metabolites = || model.metabolites.values();
    let lower: Vec<f64> = reactions().map(|r| r.lower_bound).collect();
    let upper: Vec<f64> = reactions().map(|r| r.upper_bound).collect();
    let objective: Vec<f64> = reactions()
        .map(|r| model.objective.get(&r.id).copied().unwrap_or(0.))
        .collect();
    let reversible: Vec<f64> = lower.iter().map(|lb| if *lb < 0. { 1. } else { 0. }).collect();
    let charges: Vec<f64> = metabolites().map(|m| m.charge as f64).collect();
    let metabolite_notes = metabolites()
        .map(|m| encode_notes(&m.notes))
        .collect::<Result<Vec<_>, _>>()?;
    let reaction_notes = reactions()
        .map(|r| encode_notes(&r.notes))
        .collect::<Result<Vec<_>, _>>()?;

    let mut fields: Vec<(&str, Vec<u8>)> = vec![
        ("rxns", string_cell("", reactions().map(|r| r.id.as_str()))),
        ("mets", string_cell("", metabolites().map(|m| m.id.as_str()))),
        (
            "S",
            sparse_matrix("", model.metabolites.len(), model.reactions.len(), &entries),
        ),
        ("lb", double_column("", &lower)),
        ("ub", double_column("", &upper)),
        ("c", double_column("", &objective)),
        ("b", double_column("", &vec![0.; model.metabolites.len()])),
        ("rev", double_column("", &reversible)),
        (
            "rxnNames",
            string_cell("", reactions().map(|r| r.name.as_deref().unwrap_or_default())),
        ),
        (
            "metNames",
            string_cell("", metabolites().map(|m| m.name.as_deref().unwrap_or_default())),
        ),
        (
            "metFormulas",
            string_cell("", metabolites().map(|m| m.formula.as_deref().unwrap_or_default())),
        ),
        ("metCharges", double_column("", &charges)),
        (
            "metComps",
            string_cell("", metabolites().map(|m| m.compartment.as_deref().unwrap_or_default())),
        ),
        ("genes", string_cell("", model.genes.keys().map(String::as_str))),
        (
            "grRules",
            string_cell(
                "",
                reactions().map(|r| r.gene_reaction_rule.as_deref().unwrap_or_default()),
            ),
        ),
        (
            "subSystems",
            string_cell("", reactions().map(|r| r.subsystem.as_deref().unwrap_or_default())),
        ),
    ];
    if let Some(compartments) = model.compartments.as_ref() {
        fields.push(("comps", string_cell("", compartments.keys().map(String::as_str))));
        fields.push((
            "compNames",
            string_cell("", compartments.values().map(String::as_str)),
        ));
    }
    fields.push((
        "description",
        char_matrix("", model.id.as_deref().unwrap_or_default()),
    ));
    if let Some(name) = model.name.as_deref() {
        fields.push(("modelName", char_matrix("", name)));
    }
    if !model.notes.is_empty() {
        fields.push(("notes", char_matrix("", &encode_notes(&model.notes)?)));
    }
    if metabolite_notes.iter().any(|n| !n.is_empty()) {
        fields.push(("metNotes", string_cell("", metabolite_notes.iter().map(String::as_str))));
    }
    if reaction_notes.iter().any(|n| !n.is_empty()) {
        fields.push(("rxnNotes", string_cell("", reaction_notes.iter().map(String::as_str))));
    }

    let mut bytes = Vec::new();
    let mut header = format!(
        "MATLAB 5.0 MAT-file, Platform: {}, Created by: mminte {}",
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION")
    )
    .into_bytes();
    header.resize(HEADER_TEXT_LEN, b' ');
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&[0u8; 8]);
    bytes.extend_from_slice(&0x0100u16.to_le_bytes());
    bytes.extend_from_slice(b"IM");
    bytes.extend(struct_matrix(&variable_name(model), &fields));
    Ok(bytes)
}
// endregion Writing

impl Model {
    /// Read a model stored as a COBRA struct in a MAT file
    pub fn read_mat<P: AsRef<Path>>(path: P) -> Result<Model, MatError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|err| MatError::UnableToRead {
            path: path.display().to_string(),
            source: err,
        })?;
        model_from_bytes(&bytes)
    }

    /// Write the model as a COBRA struct in a MAT file
    pub fn write_mat<P: AsRef<Path>>(&self, path: P) -> Result<(), MatError> {
        fs::write(path, model_to_bytes(self)?)?;
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum MatError {
    #[error("Unable to read {path}")]
    UnableToRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Not a MAT v5 file")]
    NotMatFile,
    #[error("MAT file ends inside a data element")]
    Truncated,
    #[error("Unable to decompress MAT data element")]
    Decompress(#[source] std::io::Error),
    #[error("Unsupported MAT data type {0}")]
    UnsupportedDataType(u32),
    #[error("No model struct found in MAT file")]
    NoModelStruct,
    #[error("Model struct is missing the {0} field")]
    MissingField(&'static str),
    #[error("Field {field} has size {found}, expected {expected}")]
    DimensionMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Reaction {reaction} uses metabolite {metabolite} missing from the model")]
    UnknownMetabolite { reaction: String, metabolite: String },
    #[error("Invalid notes")]
    InvalidNotes(#[source] serde_json::Error),
    #[error("Unable to build reaction")]
    UnableToBuildReaction(#[from] ReactionBuilderError),
    #[error("Unable to write to file")]
    UnableToWrite(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::community::{species, CommunityBuilder};
    use crate::test_utils::{species_a, species_b};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn header() -> Vec<u8> {
        let mut bytes = vec![b' '; HEADER_TEXT_LEN];
        bytes.extend_from_slice(&[0u8; 8]);
        bytes.extend_from_slice(&0x0100u16.to_le_bytes());
        bytes.extend_from_slice(b"IM");
        bytes
    }

    /// The struct variable of a written model
    fn written_fields(model: &Model) -> IndexMap<String, MatArray> {
        let bytes = model_to_bytes(model).unwrap();
        match read_variables(&bytes).unwrap().pop() {
            Some((_, MatArray::Struct { mut elements, .. })) => elements.pop().unwrap(),
            other => panic!("unexpected variable {other:?}"),
        }
    }

    #[test]
    fn variable_names() {
        let mut model = species_a();
        assert_eq!(variable_name(&model), "sa");
        model.id = Some("B. theta-1".to_string());
        assert_eq!(variable_name(&model), "B__theta_1");
        model.id = Some("123".to_string());
        assert_eq!(variable_name(&model), "m_123");
        model.id = None;
        assert_eq!(variable_name(&model), "model");
    }

    #[test]
    fn char_matrix_rows() {
        // column major 2x3 char matrix holding "abc" and "de "
        let array = MatArray::Char {
            dims: vec![2, 3],
            chars: vec!['a', 'd', 'b', 'e', 'c', ' '],
        };
        assert_eq!(array.strings(), vec!["abc".to_string(), "de".to_string()]);
    }

    #[test]
    fn community_round_trip() {
        let mut builder = CommunityBuilder::new();
        builder.add_species(species_a(), "sa.json").unwrap();
        builder.add_species(species_b(), "sb.json").unwrap();
        let community = builder.build().unwrap();

        let file = tempfile::Builder::new().suffix(".mat").tempfile().unwrap();
        community.write_mat(file.path()).unwrap();
        let loaded = Model::read_mat(file.path()).unwrap();
        assert_eq!(loaded.id, community.id);
        assert_eq!(loaded.name, community.name);
        assert_eq!(loaded.compartments, community.compartments);
        assert_eq!(species(&loaded).unwrap(), species(&community).unwrap());
        assert_eq!(loaded.metabolites["glc_u"].notes["type"], "modelseed");
        assert_eq!(loaded.metabolites["glc_u"].compartment.as_deref(), Some("u"));
        assert_eq!(loaded.objective, community.objective);
        assert_eq!(loaded.reactions.len(), community.reactions.len());
        assert_eq!(loaded.genes.len(), community.genes.len());
    }

    #[test]
    fn compartments_inferred_from_ids() {
        let mut fields = written_fields(&species_a());
        fields.shift_remove("metComps");
        let model = model_from_struct("sa", &fields).unwrap();
        assert_eq!(model.metabolites["glc_e"].compartment.as_deref(), Some("e"));
        assert_eq!(model.metabolites["glc_c"].compartment.as_deref(), Some("c"));
    }

    #[test]
    fn missing_reactions_field() {
        let mut fields = written_fields(&species_a());
        fields.shift_remove("rxns");
        assert!(matches!(
            model_from_struct("sa", &fields),
            Err(MatError::MissingField("rxns"))
        ));
    }

    #[test]
    fn compressed_variable() {
        let model = species_a();
        let plain = model_to_bytes(&model).unwrap();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&plain[HEADER_LEN..]).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut bytes = header();
        bytes.extend_from_slice(&MI_COMPRESSED.to_le_bytes());
        bytes.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&compressed);
        let loaded = model_from_bytes(&bytes).unwrap();
        assert_eq!(loaded.id, model.id);
        assert_eq!(loaded.objective, model.objective);
        assert_eq!(loaded.reactions["EX_glc_e"].bounds(), (-10., 1000.));
    }

    #[test]
    fn not_a_mat_file() {
        assert!(matches!(model_from_bytes(b"{}"), Err(MatError::NotMatFile)));
        assert!(matches!(
            model_from_bytes(&header()),
            Err(MatError::NoModelStruct)
        ));
    }
}
