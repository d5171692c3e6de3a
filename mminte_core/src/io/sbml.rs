//! Module providing SBML IO for Models
//!
//! Reading understands SBML level 2 files with COBRA style kinetic law
//! parameters (`LOWER_BOUND`, `UPPER_BOUND`, `OBJECTIVE_COEFFICIENT`) and
//! level 3 files using the flux balance constraints package (version 2).
//! Writing always produces level 3 version 1 with FBC version 2.
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::configuration::current;
use crate::metabolic_model::gene::Gene;
use crate::metabolic_model::metabolite::{Metabolite, MetaboliteBuilder};
use crate::metabolic_model::model::Model;
use crate::metabolic_model::reaction::{Reaction, ReactionBuilder, ReactionBuilderError};

const SBML_NS: &str = "http://www.sbml.org/sbml/level3/version1/core";
const FBC_NS: &str = "http://www.sbml.org/sbml/level3/version1/fbc/version2";
const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

const METABOLITE_PREFIX: &str = "M_";
const REACTION_PREFIX: &str = "R_";
const GENE_PREFIX: &str = "G_";

const GENE_ASSOCIATION_NOTE: &str = "GENE_ASSOCIATION";
const SUBSYSTEM_NOTE: &str = "SUBSYSTEM";

static ESCAPED_CHAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"__(\d+)__").unwrap_or_else(|err| panic!("invalid escape pattern: {err}"))
});

// region Ids
/// Turn an SBML id back into a model id, removing the type prefix and
/// decoding `__<code>__` escapes
fn decode_id(sbml_id: &str, prefix: &str) -> String {
    let stripped = sbml_id.strip_prefix(prefix).unwrap_or(sbml_id);
    ESCAPED_CHAR
        .replace_all(stripped, |caps: &Captures| {
            caps[1]
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// SBML ids only allow letters, digits and underscores
fn encode_id(id: &str, prefix: &str) -> String {
    let mut encoded = String::with_capacity(id.len() + prefix.len());
    encoded.push_str(prefix);
    for c in id.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            encoded.push(c);
        } else {
            encoded.push_str(&format!("__{}__", c as u32));
        }
    }
    encoded
}
// endregion Ids

// region Values
fn parse_number(value: &str) -> Result<f64, SbmlError> {
    match value.trim() {
        "INF" | "inf" | "Infinity" => Ok(f64::INFINITY),
        "-INF" | "-inf" | "-Infinity" => Ok(f64::NEG_INFINITY),
        other => other.parse().map_err(|_| SbmlError::InvalidNumber(other.to_string())),
    }
}

fn format_number(value: f64) -> String {
    if value == f64::INFINITY {
        "INF".to_string()
    } else if value == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        value.to_string()
    }
}

/// Notes are stored as `KEY: VALUE` paragraphs, values that are not plain
/// strings are JSON encoded
fn encode_note(value: &Value) -> String {
    match value {
        Value::String(s) if serde_json::from_str::<Value>(s).is_err() => s.clone(),
        other => other.to_string(),
    }
}

fn decode_note(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
// endregion Values

// region Reading
/// Root `sbml` element
#[derive(Debug, Deserialize)]
struct SbmlDocument {
    #[serde(default)]
    model: Option<SbmlModel>,
}

#[derive(Debug, Deserialize)]
struct SbmlModel {
    #[serde(rename = "@id", default)]
    id: Option<String>,
    #[serde(rename = "@name", default)]
    name: Option<String>,
    #[serde(default)]
    notes: Option<Notes>,
    #[serde(rename = "listOfCompartments", default)]
    compartments: Option<ListOfCompartments>,
    #[serde(rename = "listOfSpecies", default)]
    species: Option<ListOfSpecies>,
    #[serde(rename = "listOfParameters", default)]
    parameters: Option<ListOfParameters>,
    #[serde(rename = "listOfReactions", default)]
    reactions: Option<ListOfReactions>,
    #[serde(rename = "listOfObjectives", default)]
    objectives: Option<ListOfObjectives>,
    #[serde(rename = "listOfGeneProducts", default)]
    gene_products: Option<ListOfGeneProducts>,
}

/// XHTML notes, paragraphs may sit directly under `notes` or inside a
/// `body` or `html` element
#[derive(Debug, Deserialize)]
struct Notes {
    #[serde(default)]
    p: Vec<Paragraph>,
    #[serde(default)]
    body: Option<Box<Notes>>,
    #[serde(default)]
    html: Option<Box<Notes>>,
}

#[derive(Debug, Deserialize)]
struct Paragraph {
    #[serde(rename = "$text", default)]
    text: String,
}

impl Notes {
    fn paragraphs(self) -> Vec<String> {
        let mut paragraphs: Vec<String> = self.p.into_iter().map(|p| p.text).collect();
        for nested in [self.body, self.html].into_iter().flatten() {
            paragraphs.extend(nested.paragraphs());
        }
        paragraphs
    }

    /// `KEY: VALUE` paragraphs as notes, other paragraphs are dropped
    fn into_map(self) -> IndexMap<String, Value> {
        self.paragraphs()
            .iter()
            .filter_map(|text| text.split_once(':'))
            .map(|(key, value)| (key.trim().to_string(), decode_note(value.trim())))
            .collect()
    }
}

fn notes_map(notes: Option<Notes>) -> IndexMap<String, Value> {
    notes.map(Notes::into_map).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct ListOfCompartments {
    #[serde(default)]
    compartment: Vec<SbmlCompartment>,
}

#[derive(Debug, Deserialize)]
struct SbmlCompartment {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@name", default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListOfSpecies {
    #[serde(default)]
    species: Vec<SbmlSpecies>,
}

#[derive(Debug, Deserialize)]
struct SbmlSpecies {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@name", default)]
    name: Option<String>,
    #[serde(rename = "@compartment", default)]
    compartment: Option<String>,
    #[serde(rename = "@boundaryCondition", default)]
    boundary_condition: bool,
    /// Level 2 `charge` or FBC `fbc:charge`
    #[serde(rename = "@charge", default)]
    charge: Option<String>,
    #[serde(rename = "@chemicalFormula", default)]
    chemical_formula: Option<String>,
    #[serde(default)]
    notes: Option<Notes>,
}

impl SbmlSpecies {
    fn into_metabolite(self) -> Result<Metabolite, SbmlError> {
        let mut notes = notes_map(self.notes);
        let mut charge = match self.charge.as_deref() {
            Some(charge) => parse_number(charge)? as i32,
            None => 0,
        };
        if let Some(noted) = notes.shift_remove("CHARGE").and_then(|c| c.as_i64()) {
            charge = noted as i32;
        }
        let formula = self.chemical_formula.or_else(|| {
            notes
                .shift_remove("FORMULA")
                .and_then(|f| f.as_str().map(str::to_string))
        });
        notes.shift_remove("FORMULA");
        MetaboliteBuilder::default()
            .id(decode_id(&self.id, METABOLITE_PREFIX))
            .name(self.name)
            .compartment(self.compartment)
            .charge(charge)
            .formula(formula)
            .notes(notes)
            .build()
            .map_err(|err| SbmlError::Invalid(err.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ListOfParameters {
    #[serde(default)]
    parameter: Vec<SbmlParameter>,
}

#[derive(Debug, Deserialize)]
struct ListOfLocalParameters {
    #[serde(rename = "localParameter", default)]
    local_parameter: Vec<SbmlParameter>,
}

#[derive(Debug, Deserialize)]
struct SbmlParameter {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@value", default)]
    value: Option<String>,
}

/// Parameters with a value, keyed by id
fn parameter_values<'a>(
    parameters: impl IntoIterator<Item = &'a SbmlParameter>,
) -> Result<HashMap<&'a str, f64>, SbmlError> {
    parameters
        .into_iter()
        .filter_map(|p| p.value.as_deref().map(|value| (p.id.as_str(), value)))
        .map(|(id, value)| Ok((id, parse_number(value)?)))
        .collect()
}

#[derive(Debug, Deserialize)]
struct ListOfReactions {
    #[serde(default)]
    reaction: Vec<SbmlReaction>,
}

#[derive(Debug, Deserialize)]
struct SbmlReaction {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@name", default)]
    name: Option<String>,
    #[serde(rename = "@reversible", default)]
    reversible: Option<bool>,
    #[serde(rename = "@lowerFluxBound", default)]
    lower_flux_bound: Option<String>,
    #[serde(rename = "@upperFluxBound", default)]
    upper_flux_bound: Option<String>,
    #[serde(default)]
    notes: Option<Notes>,
    #[serde(rename = "listOfReactants", default)]
    reactants: Option<ListOfSpeciesReferences>,
    #[serde(rename = "listOfProducts", default)]
    products: Option<ListOfSpeciesReferences>,
    #[serde(rename = "kineticLaw", default)]
    kinetic_law: Option<KineticLaw>,
    #[serde(rename = "geneProductAssociation", default)]
    gene_product_association: Option<GeneProductAssociation>,
}

#[derive(Debug, Deserialize)]
struct ListOfSpeciesReferences {
    #[serde(rename = "speciesReference", default)]
    species_reference: Vec<SpeciesReference>,
}

#[derive(Debug, Deserialize)]
struct SpeciesReference {
    #[serde(rename = "@species")]
    species: String,
    #[serde(rename = "@stoichiometry", default)]
    stoichiometry: Option<String>,
}

/// COBRA style level 2 bounds live in the kinetic law parameters
#[derive(Debug, Deserialize)]
struct KineticLaw {
    #[serde(rename = "listOfParameters", default)]
    parameters: Option<ListOfParameters>,
    #[serde(rename = "listOfLocalParameters", default)]
    local_parameters: Option<ListOfLocalParameters>,
}

#[derive(Debug, Deserialize)]
struct GeneProductAssociation {
    #[serde(rename = "$value")]
    association: Association,
}

#[derive(Debug, Deserialize)]
enum Association {
    #[serde(rename = "geneProductRef")]
    Gene {
        #[serde(rename = "@geneProduct")]
        gene_product: String,
    },
    #[serde(rename = "and")]
    And {
        #[serde(rename = "$value", default)]
        children: Vec<Association>,
    },
    #[serde(rename = "or")]
    Or {
        #[serde(rename = "$value", default)]
        children: Vec<Association>,
    },
}

impl Association {
    /// Rule text, groups below the top level are parenthesized
    fn rule(&self, nested: bool) -> Option<String> {
        let (operator, children) = match self {
            Association::Gene { gene_product } => {
                return Some(decode_id(gene_product, GENE_PREFIX))
            }
            Association::And { children } => ("and", children),
            Association::Or { children } => ("or", children),
        };
        let parts: Vec<String> = children.iter().filter_map(|c| c.rule(true)).collect();
        match parts.len() {
            0 => None,
            1 => parts.into_iter().next(),
            _ => {
                let joined = parts.join(&format!(" {operator} "));
                Some(if nested { format!("({joined})") } else { joined })
            }
        }
    }
}

impl SbmlReaction {
    /// The reaction and its level 2 objective coefficient
    fn into_reaction(
        self,
        parameters: &HashMap<&str, f64>,
        boundary_species: &HashSet<String>,
    ) -> Result<(Reaction, Option<f64>), SbmlError> {
        let configuration = current();
        let id = decode_id(&self.id, REACTION_PREFIX);

        let mut metabolites = IndexMap::new();
        for (references, sign) in [(self.reactants, -1.), (self.products, 1.)] {
            let references = references.map(|l| l.species_reference).unwrap_or_default();
            for reference in references {
                if boundary_species.contains(&reference.species) {
                    continue;
                }
                let stoichiometry = match reference.stoichiometry.as_deref() {
                    Some(value) => parse_number(value)?,
                    None => 1.,
                };
                *metabolites
                    .entry(decode_id(&reference.species, METABOLITE_PREFIX))
                    .or_insert(0.) += sign * stoichiometry;
            }
        }

        let kinetic = match self.kinetic_law.as_ref() {
            Some(law) => parameter_values(
                law.parameters
                    .iter()
                    .flat_map(|l| &l.parameter)
                    .chain(law.local_parameters.iter().flat_map(|l| &l.local_parameter)),
            )?,
            None => HashMap::new(),
        };
        let resolve = |parameter: Option<&String>| -> Result<Option<f64>, SbmlError> {
            match parameter {
                Some(p) => match parameters.get(p.as_str()) {
                    Some(value) => Ok(Some(*value)),
                    None => Err(SbmlError::UnknownParameter {
                        reaction: id.clone(),
                        parameter: p.clone(),
                    }),
                },
                None => Ok(None),
            }
        };
        let reversible = self.reversible.unwrap_or(true);
        let lower_bound = match kinetic.get("LOWER_BOUND") {
            Some(value) => *value,
            None => resolve(self.lower_flux_bound.as_ref())?.unwrap_or(if reversible {
                configuration.lower_bound
            } else {
                0.
            }),
        };
        let upper_bound = match kinetic.get("UPPER_BOUND") {
            Some(value) => *value,
            None => resolve(self.upper_flux_bound.as_ref())?.unwrap_or(configuration.upper_bound),
        };
        let objective = kinetic.get("OBJECTIVE_COEFFICIENT").copied();

        let mut notes = notes_map(self.notes);
        let noted_rule = notes
            .shift_remove(GENE_ASSOCIATION_NOTE)
            .or_else(|| notes.shift_remove("GENE ASSOCIATION"))
            .and_then(|rule| match rule {
                Value::String(rule) if !rule.is_empty() => Some(rule),
                _ => None,
            });
        let subsystem = match notes.shift_remove(SUBSYSTEM_NOTE) {
            Some(Value::String(subsystem)) => Some(subsystem),
            _ => None,
        };
        let gene_reaction_rule = self
            .gene_product_association
            .and_then(|gpa| gpa.association.rule(false))
            .or(noted_rule);

        let reaction = ReactionBuilder::default()
            .id(id)
            .name(self.name)
            .metabolites(metabolites)
            .lower_bound(lower_bound)
            .upper_bound(upper_bound)
            .gene_reaction_rule(gene_reaction_rule)
            .subsystem(subsystem)
            .notes(notes)
            .build()?;
        Ok((reaction, objective))
    }
}

#[derive(Debug, Deserialize)]
struct ListOfObjectives {
    #[serde(rename = "@activeObjective", default)]
    active_objective: Option<String>,
    #[serde(default)]
    objective: Vec<SbmlObjective>,
}

#[derive(Debug, Deserialize)]
struct SbmlObjective {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "listOfFluxObjectives", default)]
    flux_objectives: Option<ListOfFluxObjectives>,
}

#[derive(Debug, Deserialize)]
struct ListOfFluxObjectives {
    #[serde(rename = "fluxObjective", default)]
    flux_objective: Vec<FluxObjective>,
}

#[derive(Debug, Deserialize)]
struct FluxObjective {
    #[serde(rename = "@reaction")]
    reaction: String,
    #[serde(rename = "@coefficient", default)]
    coefficient: Option<String>,
}

impl ListOfObjectives {
    /// Terms of the active objective, or of the first one when none is marked
    fn active_terms(self) -> Result<Vec<(String, f64)>, SbmlError> {
        let active = self.active_objective;
        let mut objectives = self.objective.into_iter();
        let objective = match active {
            Some(active) => objectives.find(|o| o.id == active),
            None => objectives.next(),
        };
        objective
            .and_then(|o| o.flux_objectives)
            .map(|l| l.flux_objective)
            .unwrap_or_default()
            .into_iter()
            .map(|flux| {
                let coefficient = match flux.coefficient.as_deref() {
                    Some(value) => parse_number(value)?,
                    None => 1.,
                };
                Ok((decode_id(&flux.reaction, REACTION_PREFIX), coefficient))
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ListOfGeneProducts {
    #[serde(rename = "geneProduct", default)]
    gene_product: Vec<GeneProduct>,
}

#[derive(Debug, Deserialize)]
struct GeneProduct {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@label", default)]
    label: Option<String>,
    #[serde(rename = "@name", default)]
    name: Option<String>,
    #[serde(default)]
    notes: Option<Notes>,
}

impl SbmlModel {
    fn into_model(self) -> Result<Model, SbmlError> {
        let mut model = Model::new_empty();
        model.id = self.id;
        model.name = self.name;
        model.notes = notes_map(self.notes);

        for compartment in self.compartments.map(|l| l.compartment).unwrap_or_default() {
            let name = compartment.name.as_deref().unwrap_or(&compartment.id);
            model.add_compartment(&compartment.id, name);
        }

        let mut boundary_species = HashSet::new();
        for species in self.species.map(|l| l.species).unwrap_or_default() {
            if species.boundary_condition {
                boundary_species.insert(species.id);
            } else {
                model.add_metabolite(species.into_metabolite()?);
            }
        }

        let parameters = self.parameters.map(|l| l.parameter).unwrap_or_default();
        let parameters = parameter_values(&parameters)?;
        for reaction in self.reactions.map(|l| l.reaction).unwrap_or_default() {
            let (reaction, objective) = reaction.into_reaction(&parameters, &boundary_species)?;
            if let Some(coefficient) = objective.filter(|c| *c != 0.) {
                model.objective.insert(reaction.id.clone(), coefficient);
            }
            model.add_reaction(reaction);
        }

        if let Some(objectives) = self.objectives {
            for (reaction, coefficient) in objectives.active_terms()? {
                if coefficient != 0. {
                    model.objective.insert(reaction, coefficient);
                }
            }
        }

        for product in self.gene_products.map(|l| l.gene_product).unwrap_or_default() {
            let mut gene = Gene::new(
                decode_id(&product.id, GENE_PREFIX),
                product.name.or(product.label),
            );
            gene.notes = notes_map(product.notes);
            model.add_gene(gene);
        }
        Ok(model)
    }
}

fn parse_sbml(content: &str) -> Result<Model, SbmlError> {
    let document: SbmlDocument = quick_xml::de::from_str(content)?;
    document.model.ok_or(SbmlError::NoModel)?.into_model()
}
// endregion Reading

// region Writing
struct SbmlWriter {
    writer: Writer<Vec<u8>>,
}

impl SbmlWriter {
    fn new() -> Self {
        SbmlWriter {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn element(name: &str, attrs: &[(&str, &str)]) -> BytesStart<'static> {
        let mut element = BytesStart::new(name.to_string());
        for attr in attrs {
            element.push_attribute(*attr);
        }
        element
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), SbmlError> {
        self.writer.write_event(Event::Start(Self::element(name, attrs)))?;
        Ok(())
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), SbmlError> {
        self.writer.write_event(Event::Empty(Self::element(name, attrs)))?;
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<(), SbmlError> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn notes(&mut self, notes: &[(String, String)]) -> Result<(), SbmlError> {
        if notes.is_empty() {
            return Ok(());
        }
        self.start("notes", &[])?;
        self.start("body", &[("xmlns", XHTML_NS)])?;
        for (key, value) in notes {
            self.start("p", &[])?;
            self.writer
                .write_event(Event::Text(BytesText::new(&format!("{key}: {value}"))))?;
            self.end("p")?;
        }
        self.end("body")?;
        self.end("notes")
    }

    fn write_model(&mut self, model: &Model) -> Result<(), SbmlError> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.start(
            "sbml",
            &[
                ("xmlns", SBML_NS),
                ("xmlns:fbc", FBC_NS),
                ("level", "3"),
                ("version", "1"),
                ("fbc:required", "false"),
            ],
        )?;
        let model_id = model.id.clone().unwrap_or_default();
        let mut model_attrs = vec![("id", model_id.as_str()), ("fbc:strict", "true")];
        if let Some(name) = model.name.as_deref() {
            model_attrs.push(("name", name));
        }
        self.start("model", &model_attrs)?;
        let model_notes: Vec<(String, String)> = model
            .notes
            .iter()
            .map(|(k, v)| (k.clone(), encode_note(v)))
            .collect();
        self.notes(&model_notes)?;

        if let Some(compartments) = model.compartments.as_ref().filter(|c| !c.is_empty()) {
            self.start("listOfCompartments", &[])?;
            for (id, name) in compartments {
                self.empty(
                    "compartment",
                    &[("id", id), ("name", name), ("constant", "true")],
                )?;
            }
            self.end("listOfCompartments")?;
        }

        if !model.metabolites.is_empty() {
            self.start("listOfSpecies", &[])?;
            for metabolite in model.metabolites.values() {
                self.write_species(metabolite)?;
            }
            self.end("listOfSpecies")?;
        }

        let bounds: Vec<(String, String, String, String)> = model
            .reactions
            .values()
            .map(|r| {
                let id = encode_id(&r.id, REACTION_PREFIX);
                (
                    format!("{id}_lower_bound"),
                    format_number(r.lower_bound),
                    format!("{id}_upper_bound"),
                    format_number(r.upper_bound),
                )
            })
            .collect();
        if !bounds.is_empty() {
            self.start("listOfParameters", &[])?;
            for (lower_id, lower, upper_id, upper) in &bounds {
                self.empty(
                    "parameter",
                    &[("id", lower_id), ("value", lower), ("constant", "true")],
                )?;
                self.empty(
                    "parameter",
                    &[("id", upper_id), ("value", upper), ("constant", "true")],
                )?;
            }
            self.end("listOfParameters")?;

            self.start("listOfReactions", &[])?;
            for (reaction, (lower_id, _, upper_id, _)) in model.reactions.values().zip(&bounds) {
                self.write_reaction(reaction, lower_id, upper_id)?;
            }
            self.end("listOfReactions")?;
        }

        self.start(
            "fbc:listOfObjectives",
            &[("fbc:activeObjective", "obj")],
        )?;
        self.start("fbc:objective", &[("fbc:id", "obj"), ("fbc:type", "maximize")])?;
        self.start("fbc:listOfFluxObjectives", &[])?;
        for (reaction, coefficient) in &model.objective {
            let reaction = encode_id(reaction, REACTION_PREFIX);
            let coefficient = format_number(*coefficient);
            self.empty(
                "fbc:fluxObjective",
                &[("fbc:reaction", &reaction), ("fbc:coefficient", &coefficient)],
            )?;
        }
        self.end("fbc:listOfFluxObjectives")?;
        self.end("fbc:objective")?;
        self.end("fbc:listOfObjectives")?;

        if !model.genes.is_empty() {
            self.start("fbc:listOfGeneProducts", &[])?;
            for gene in model.genes.values() {
                let id = encode_id(&gene.id, GENE_PREFIX);
                let mut attrs = vec![("fbc:id", id.as_str()), ("fbc:label", gene.id.as_str())];
                if let Some(name) = gene.name.as_deref() {
                    attrs.push(("fbc:name", name));
                }
                let notes: Vec<(String, String)> = gene
                    .notes
                    .iter()
                    .map(|(k, v)| (k.clone(), encode_note(v)))
                    .collect();
                if notes.is_empty() {
                    self.empty("fbc:geneProduct", &attrs)?;
                } else {
                    self.start("fbc:geneProduct", &attrs)?;
                    self.notes(&notes)?;
                    self.end("fbc:geneProduct")?;
                }
            }
            self.end("fbc:listOfGeneProducts")?;
        }

        self.end("model")?;
        self.end("sbml")
    }

    fn write_species(&mut self, metabolite: &Metabolite) -> Result<(), SbmlError> {
        let id = encode_id(&metabolite.id, METABOLITE_PREFIX);
        let charge = metabolite.charge.to_string();
        let mut attrs = vec![
            ("id", id.as_str()),
            ("hasOnlySubstanceUnits", "false"),
            ("boundaryCondition", "false"),
            ("constant", "false"),
            ("fbc:charge", charge.as_str()),
        ];
        if let Some(name) = metabolite.name.as_deref() {
            attrs.push(("name", name));
        }
        if let Some(compartment) = metabolite.compartment.as_deref() {
            attrs.push(("compartment", compartment));
        }
        if let Some(formula) = metabolite.formula.as_deref().filter(|f| !f.is_empty()) {
            attrs.push(("fbc:chemicalFormula", formula));
        }
        let notes: Vec<(String, String)> = metabolite
            .notes
            .iter()
            .map(|(k, v)| (k.clone(), encode_note(v)))
            .collect();
        if notes.is_empty() {
            self.empty("species", &attrs)
        } else {
            self.start("species", &attrs)?;
            self.notes(&notes)?;
            self.end("species")
        }
    }

    fn write_reaction(
        &mut self,
        reaction: &Reaction,
        lower_id: &str,
        upper_id: &str,
    ) -> Result<(), SbmlError> {
        let id = encode_id(&reaction.id, REACTION_PREFIX);
        let reversible = if reaction.lower_bound < 0. { "true" } else { "false" };
        let mut attrs = vec![
            ("id", id.as_str()),
            ("reversible", reversible),
            ("fast", "false"),
            ("fbc:lowerFluxBound", lower_id),
            ("fbc:upperFluxBound", upper_id),
        ];
        if let Some(name) = reaction.name.as_deref() {
            attrs.push(("name", name));
        }
        self.start("reaction", &attrs)?;

        let mut notes: Vec<(String, String)> = Vec::new();
        if let Some(rule) = reaction.gene_reaction_rule.as_deref() {
            notes.push((GENE_ASSOCIATION_NOTE.to_string(), rule.to_string()));
        }
        if let Some(subsystem) = reaction.subsystem.as_deref() {
            notes.push((SUBSYSTEM_NOTE.to_string(), subsystem.to_string()));
        }
        notes.extend(reaction.notes.iter().map(|(k, v)| (k.clone(), encode_note(v))));
        self.notes(&notes)?;

        for (list, sign) in [("listOfReactants", -1.), ("listOfProducts", 1.)] {
            let references: Vec<(String, String)> = reaction
                .metabolites
                .iter()
                .filter(|(_, c)| **c * sign > 0.)
                .map(|(m, c)| (encode_id(m, METABOLITE_PREFIX), format_number(c.abs())))
                .collect();
            if references.is_empty() {
                continue;
            }
            self.start(list, &[])?;
            for (species, stoichiometry) in &references {
                self.empty(
                    "speciesReference",
                    &[
                        ("species", species),
                        ("stoichiometry", stoichiometry),
                        ("constant", "true"),
                    ],
                )?;
            }
            self.end(list)?;
        }
        self.end("reaction")
    }
}
// endregion Writing

impl Model {
    /// Read a model from an SBML file
    pub fn read_sbml<P: AsRef<Path>>(path: P) -> Result<Model, SbmlError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|err| SbmlError::UnableToRead {
            path: path.display().to_string(),
            source: err,
        })?;
        parse_sbml(&content)
    }

    /// Write the model as SBML level 3 with the FBC package
    pub fn write_sbml<P: AsRef<Path>>(&self, path: P) -> Result<(), SbmlError> {
        let mut writer = SbmlWriter::new();
        writer.write_model(self)?;
        fs::write(path, writer.writer.into_inner())?;
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum SbmlError {
    #[error("Unable to read {path}")]
    UnableToRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to write xml")]
    Xml(#[from] quick_xml::Error),
    #[error("Malformed SBML document")]
    Document(#[from] quick_xml::DeError),
    #[error("Document has no model element")]
    NoModel,
    #[error("Invalid number {0}")]
    InvalidNumber(String),
    #[error("Reaction {reaction} refers to unknown parameter {parameter}")]
    UnknownParameter { reaction: String, parameter: String },
    #[error("Invalid model content: {0}")]
    Invalid(String),
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

    const LEVEL2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sbml xmlns="http://www.sbml.org/sbml/level2" level="2" version="1">
  <model id="l2model" name="Level 2">
    <listOfCompartments>
      <compartment id="c" name="cytosol"/>
      <compartment id="e" name="extracellular"/>
    </listOfCompartments>
    <listOfSpecies>
      <species id="M_cpd00027_e" name="Glucose" compartment="e" charge="0"/>
      <species id="M_cpd00027_c" name="Glucose" compartment="c"/>
      <species id="M_cpd00027_b" name="Glucose" compartment="e" boundaryCondition="true"/>
    </listOfSpecies>
    <listOfReactions>
      <reaction id="R_EX_cpd00027_e" reversible="true">
        <listOfReactants>
          <speciesReference species="M_cpd00027_e" stoichiometry="1"/>
        </listOfReactants>
        <listOfProducts>
          <speciesReference species="M_cpd00027_b"/>
        </listOfProducts>
        <kineticLaw>
          <listOfParameters>
            <parameter id="LOWER_BOUND" value="-10"/>
            <parameter id="UPPER_BOUND" value="1000"/>
            <parameter id="OBJECTIVE_COEFFICIENT" value="0"/>
          </listOfParameters>
        </kineticLaw>
      </reaction>
      <reaction id="R_bio1" reversible="false">
        <notes>
          <html:p xmlns:html="http://www.w3.org/1999/xhtml">GENE_ASSOCIATION: (g1 and g2)</html:p>
          <html:p xmlns:html="http://www.w3.org/1999/xhtml">SUBSYSTEM: Biomass</html:p>
        </notes>
        <listOfReactants>
          <speciesReference species="M_cpd00027_c" stoichiometry="2"/>
        </listOfReactants>
        <kineticLaw>
          <listOfParameters>
            <parameter id="LOWER_BOUND" value="0"/>
            <parameter id="UPPER_BOUND" value="1000"/>
            <parameter id="OBJECTIVE_COEFFICIENT" value="1"/>
          </listOfParameters>
        </kineticLaw>
      </reaction>
    </listOfReactions>
  </model>
</sbml>"#;

    const LEVEL3: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sbml xmlns="http://www.sbml.org/sbml/level3/version1/core" xmlns:fbc="http://www.sbml.org/sbml/level3/version1/fbc/version2" level="3" version="1" fbc:required="false">
  <model id="l3model" fbc:strict="true">
    <listOfSpecies>
      <species id="M_glc__D_e" compartment="e" fbc:charge="0" fbc:chemicalFormula="C6H12O6" boundaryCondition="false" constant="false" hasOnlySubstanceUnits="false"/>
    </listOfSpecies>
    <listOfParameters>
      <parameter id="cobra_default_lb" value="-1000" constant="true"/>
      <parameter id="cobra_default_ub" value="1000" constant="true"/>
      <parameter id="cobra_0_bound" value="0" constant="true"/>
      <parameter id="R_EX_glc__D_e_lower_bound" value="-INF" constant="true"/>
    </listOfParameters>
    <listOfReactions>
      <reaction id="R_EX_glc__D_e" reversible="true" fast="false" fbc:lowerFluxBound="R_EX_glc__D_e_lower_bound" fbc:upperFluxBound="cobra_default_ub">
        <listOfReactants>
          <speciesReference species="M_glc__D_e" stoichiometry="1" constant="true"/>
        </listOfReactants>
      </reaction>
      <reaction id="R_GROWTH" reversible="false" fast="false" fbc:lowerFluxBound="cobra_0_bound" fbc:upperFluxBound="cobra_default_ub">
        <listOfReactants>
          <speciesReference species="M_glc__D_e" stoichiometry="1" constant="true"/>
        </listOfReactants>
        <fbc:geneProductAssociation>
          <fbc:or>
            <fbc:geneProductRef fbc:geneProduct="G_b0001"/>
            <fbc:and>
              <fbc:geneProductRef fbc:geneProduct="G_b0002"/>
              <fbc:geneProductRef fbc:geneProduct="G_b0003"/>
            </fbc:and>
          </fbc:or>
        </fbc:geneProductAssociation>
      </reaction>
    </listOfReactions>
    <fbc:listOfObjectives fbc:activeObjective="obj">
      <fbc:objective fbc:id="other" fbc:type="maximize">
        <fbc:listOfFluxObjectives>
          <fbc:fluxObjective fbc:reaction="R_EX_glc__D_e" fbc:coefficient="1"/>
        </fbc:listOfFluxObjectives>
      </fbc:objective>
      <fbc:objective fbc:id="obj" fbc:type="maximize">
        <fbc:listOfFluxObjectives>
          <fbc:fluxObjective fbc:reaction="R_GROWTH" fbc:coefficient="1"/>
        </fbc:listOfFluxObjectives>
      </fbc:objective>
    </fbc:listOfObjectives>
    <fbc:listOfGeneProducts>
      <fbc:geneProduct fbc:id="G_b0001" fbc:label="b0001"/>
      <fbc:geneProduct fbc:id="G_b0002" fbc:label="b0002"/>
      <fbc:geneProduct fbc:id="G_b0003" fbc:label="b0003" fbc:name="thrC"/>
    </fbc:listOfGeneProducts>
  </model>
</sbml>"#;

    #[test]
    fn ids() {
        assert_eq!(encode_id("glc__D[e]", METABOLITE_PREFIX), "M_glc__D__91__e__93__");
        assert_eq!(decode_id("M_glc__D__91__e__93__", METABOLITE_PREFIX), "glc__D[e]");
        assert_eq!(decode_id("M_glc__D_e", METABOLITE_PREFIX), "glc__D_e");
        assert_eq!(decode_id("EX_ac_e", REACTION_PREFIX), "EX_ac_e");
    }

    #[test]
    fn notes_values() {
        assert_eq!(encode_note(&Value::String("bigg".to_string())), "bigg");
        assert_eq!(encode_note(&Value::String("1".to_string())), "\"1\"");
        assert_eq!(decode_note("\"1\""), Value::String("1".to_string()));
        assert_eq!(decode_note("bigg"), Value::String("bigg".to_string()));
        assert_eq!(decode_note("[1,2]"), serde_json::json!([1, 2]));
    }

    #[test]
    fn level2() {
        let model = parse_sbml(LEVEL2).unwrap();
        assert_eq!(model.id.as_deref(), Some("l2model"));
        assert_eq!(model.metabolites.len(), 2);
        let exchange = &model.reactions["EX_cpd00027_e"];
        assert_eq!(exchange.bounds(), (-10., 1000.));
        // the boundary species is dropped
        assert_eq!(
            exchange.metabolites,
            IndexMap::from([("cpd00027_e".to_string(), -1.)])
        );
        let biomass = &model.reactions["bio1"];
        assert_eq!(biomass.gene_reaction_rule.as_deref(), Some("(g1 and g2)"));
        assert_eq!(biomass.subsystem.as_deref(), Some("Biomass"));
        assert!(biomass.notes.is_empty());
        assert_eq!(model.objective, IndexMap::from([("bio1".to_string(), 1.)]));
    }

    #[test]
    fn level3() {
        let model = parse_sbml(LEVEL3).unwrap();
        assert_eq!(model.id.as_deref(), Some("l3model"));
        assert_eq!(model.metabolites["glc__D_e"].formula.as_deref(), Some("C6H12O6"));
        assert_eq!(
            model.reactions["EX_glc__D_e"].bounds(),
            (f64::NEG_INFINITY, 1000.)
        );
        assert_eq!(model.reactions["GROWTH"].bounds(), (0., 1000.));
        assert_eq!(
            model.reactions["GROWTH"].gene_reaction_rule.as_deref(),
            Some("b0001 or (b0002 and b0003)")
        );
        assert_eq!(model.objective, IndexMap::from([("GROWTH".to_string(), 1.)]));
        assert_eq!(model.genes.len(), 3);
        assert_eq!(model.genes["b0003"].name.as_deref(), Some("thrC"));
    }

    #[test]
    fn unknown_parameter() {
        let broken = LEVEL3.replace(
            "fbc:lowerFluxBound=\"R_EX_glc__D_e_lower_bound\"",
            "fbc:lowerFluxBound=\"missing\"",
        );
        assert!(matches!(
            parse_sbml(&broken),
            Err(SbmlError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn not_a_model() {
        assert!(matches!(
            parse_sbml("<sbml level=\"3\"></sbml>"),
            Err(SbmlError::NoModel)
        ));
    }

    #[test]
    fn species_without_id() {
        let document = r#"<sbml><model id="m"><listOfSpecies><species name="x"/></listOfSpecies></model></sbml>"#;
        assert!(matches!(parse_sbml(document), Err(SbmlError::Document(_))));
    }

    #[test]
    fn notes_inside_html() {
        let document = r#"<sbml><model id="m">
  <notes><html xmlns="http://www.w3.org/1999/xhtml"><p>SOURCE: seed</p><p>untagged</p></html></notes>
</model></sbml>"#;
        let model = parse_sbml(document).unwrap();
        assert_eq!(
            model.notes,
            IndexMap::from([("SOURCE".to_string(), Value::String("seed".to_string()))])
        );
    }

    #[test]
    fn community_round_trip() {
        let mut builder = CommunityBuilder::new();
        builder.add_species(species_a(), "sa.json").unwrap();
        builder.add_species(species_b(), "sb.json").unwrap();
        let mut community = builder.build().unwrap();
        community.reactions["sa_GLCt"].gene_reaction_rule = Some("g1 or g2".to_string());
        community.reactions["sa_GLCt"].subsystem = Some("Transport".to_string());

        let file = tempfile::Builder::new().suffix(".xml").tempfile().unwrap();
        community.write_sbml(file.path()).unwrap();
        let loaded = Model::read_sbml(file.path()).unwrap();
        assert_eq!(loaded.id, community.id);
        assert_eq!(loaded.compartments, community.compartments);
        assert_eq!(species(&loaded).unwrap(), species(&community).unwrap());
        assert_eq!(loaded.objective, community.objective);
        assert_eq!(
            loaded.reactions["sa_GLCt"].gene_reaction_rule.as_deref(),
            Some("g1 or g2")
        );
        assert_eq!(loaded.reactions["sa_GLCt"].subsystem.as_deref(), Some("Transport"));
        assert_eq!(loaded.metabolites["glc_u"].notes["type"], "modelseed");
        assert_eq!(loaded.reactions["EX_glc_e"].bounds(), (-1000., 1000.));
    }
}
