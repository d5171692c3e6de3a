use std::path::PathBuf;

use mminte_core::analysis::{self, AnalysisError};
use mminte_core::interaction::{self, InteractionType, Medium};
use mminte_core::io::tabular::{self, TabularError};
use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

fn analysis_error(err: AnalysisError) -> PyErr {
    match err {
        AnalysisError::InvalidPair { .. } => PyValueError::new_err(err.to_string()),
        AnalysisError::ModelIo(_) => PyIOError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

fn tabular_error(err: TabularError) -> PyErr {
    match err {
        TabularError::Io { .. } => PyIOError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

/// Growth rates of a two species community, one row of the growth rate table
#[pyclass(get_all)]
#[derive(Clone)]
struct GrowthRate {
    a_id: String,
    b_id: String,
    interaction: String,
    together: f64,
    a_together: f64,
    b_together: f64,
    a_alone: f64,
    b_alone: f64,
    a_change: f64,
    b_change: f64,
}

impl From<interaction::GrowthRateRecord> for GrowthRate {
    fn from(r: interaction::GrowthRateRecord) -> Self {
        GrowthRate {
            a_id: r.a_id,
            b_id: r.b_id,
            interaction: r.interaction.to_string(),
            together: r.together,
            a_together: r.a_together,
            b_together: r.b_together,
            a_alone: r.a_alone,
            b_alone: r.b_alone,
            a_change: r.a_change,
            b_change: r.b_change,
        }
    }
}

#[pymethods]
impl GrowthRate {
    fn __repr__(&self) -> String {
        format!(
            "GrowthRate({} x {}: {}, A {:.4} -> {:.4}, B {:.4} -> {:.4})",
            self.a_id,
            self.b_id,
            self.interaction,
            self.a_alone,
            self.a_together,
            self.b_alone,
            self.b_together
        )
    }
}

/// All unique pairs of model files
#[pyfunction]
fn get_all_pairs(source_models: Vec<PathBuf>) -> Vec<Vec<PathBuf>> {
    analysis::get_all_pairs(&source_models)
}

/// Create and save the community model of every pair, returning the file paths
#[pyfunction]
#[pyo3(signature = (source_models, output_folder, n_processes=None))]
fn create_interaction_models(
    py: Python<'_>,
    source_models: Vec<Vec<PathBuf>>,
    output_folder: PathBuf,
    n_processes: Option<usize>,
) -> PyResult<Vec<PathBuf>> {
    py.allow_threads(|| {
        analysis::create_interaction_models(&source_models, &output_folder, n_processes)
            .and_then(|outcome| outcome.into_result())
    })
    .map_err(analysis_error)
}

/// Growth rates of community models under a medium of exchange id -> bound
#[pyfunction]
#[pyo3(signature = (pair_models, medium, n_processes=None))]
fn calculate_growth_rates(
    py: Python<'_>,
    pair_models: Vec<PathBuf>,
    medium: Medium,
    n_processes: Option<usize>,
) -> PyResult<Vec<GrowthRate>> {
    py.allow_threads(|| {
        analysis::calculate_growth_rates(&pair_models, &medium, n_processes)
            .and_then(|outcome| outcome.into_result())
    })
    .map(|records| records.into_iter().map(GrowthRate::from).collect())
    .map_err(analysis_error)
}

/// Read a tab separated diet file into a medium
#[pyfunction]
fn read_diet_file(diet_filename: PathBuf) -> PyResult<Medium> {
    tabular::read_diet_file(diet_filename).map_err(tabular_error)
}

/// Write the 16S sequences of the OTUs in a correlation file, returning how many were kept
#[pyfunction]
fn get_unique_otu_sequences(
    correlation_filename: PathBuf,
    sequence_filename: PathBuf,
    output_filename: PathBuf,
) -> PyResult<usize> {
    tabular::get_unique_otu_sequences(correlation_filename, sequence_filename, output_filename)
        .map_err(tabular_error)
}

/// Relative growth changes and interaction type from growth together and alone
#[pyfunction]
fn evaluate_interaction(
    a_together: f64,
    b_together: f64,
    a_alone: f64,
    b_alone: f64,
) -> (f64, f64, String) {
    let (a_change, b_change, interaction): (f64, f64, InteractionType) =
        interaction::evaluate_interaction(a_together, b_together, a_alone, b_alone);
    (a_change, b_change, interaction.to_string())
}

/// A Python module implemented in Rust. The name of this function must match
/// the `lib.name` setting in the `Cargo.toml`, else Python will not be able to
/// import the module.
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(get_all_pairs, m)?)?;
    m.add_function(wrap_pyfunction!(create_interaction_models, m)?)?;
    m.add_function(wrap_pyfunction!(calculate_growth_rates, m)?)?;
    m.add_function(wrap_pyfunction!(read_diet_file, m)?)?;
    m.add_function(wrap_pyfunction!(get_unique_otu_sequences, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_interaction, m)?)?;
    m.add_class::<GrowthRate>()?;
    Ok(())
}
