//! Batch analysis of many two species communities
//!
//! Every pair is an independent task on a rayon thread pool. A task loads its
//! own models and either writes a file or returns a value, so a failing pair
//! never affects the others: failures are collected next to the completed
//! results.
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use thiserror::Error;

use crate::community::{create_community_model, model_name, CommunityError};
use crate::configuration::current;
use crate::interaction::{compute_growth_rates_from_file, GrowthRateRecord, InteractionError, Medium};
use crate::io::{load_model, save_model, ModelIoError};
use crate::metabolic_model::model::ModelError;

/// Growth below this is reported as no growth by [`check_growth`]
pub const MINIMUM_GROWTH: f64 = 1e-4;

/// All unordered pairs of `models`, in input order
pub fn get_all_pairs<T: Clone>(models: &[T]) -> Vec<Vec<T>> {
    models
        .iter()
        .tuple_combinations()
        .map(|(a, b)| vec![a.clone(), b.clone()])
        .collect()
}

/// Default pool size: available cores, capped by the configured process limit
pub fn default_processes() -> usize {
    let cores = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    cores.min(current().processes).max(1)
}

fn thread_pool(n_processes: Option<usize>) -> Result<ThreadPool, AnalysisError> {
    let threads = n_processes.unwrap_or_else(default_processes).max(1);
    Ok(ThreadPoolBuilder::new().num_threads(threads).build()?)
}

/// A task of a batch that did not complete
#[derive(Debug)]
pub struct PairFailure {
    /// Position of the task in the batch input
    pub index: usize,
    /// Files the task was working on
    pub inputs: Vec<PathBuf>,
    pub error: AnalysisError,
}

/// Results of a batch, completed tasks and failures
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub completed: Vec<T>,
    pub failures: Vec<PairFailure>,
}

impl<T> BatchOutcome<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The completed results, or the error of the first failed task
    pub fn into_result(self) -> Result<Vec<T>, AnalysisError> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(self.completed),
        }
    }
}

/// Growth rates of a batch of communities
pub type GrowthRates = BatchOutcome<GrowthRateRecord>;

impl GrowthRates {
    /// Record of the pair formed by `a` and `b`, in either order
    pub fn get(&self, a: &str, b: &str) -> Option<&GrowthRateRecord> {
        self.completed
            .iter()
            .find(|r| (r.a_id == a && r.b_id == b) || (r.a_id == b && r.b_id == a))
    }
}

fn run_batch<I, T, F>(
    inputs: &[I],
    n_processes: Option<usize>,
    files: impl Fn(&I) -> Vec<PathBuf>,
    task: F,
) -> Result<BatchOutcome<T>, AnalysisError>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> Result<T, AnalysisError> + Sync,
{
    let pool = thread_pool(n_processes)?;
    let results: Vec<Result<T, AnalysisError>> =
        pool.install(|| inputs.par_iter().map(&task).collect());
    let mut outcome = BatchOutcome {
        completed: Vec::with_capacity(results.len()),
        failures: Vec::new(),
    };
    for (index, (input, result)) in inputs.iter().zip(results).enumerate() {
        match result {
            Ok(value) => outcome.completed.push(value),
            Err(error) => {
                warn!("Task {} failed: {}", index, error);
                outcome.failures.push(PairFailure {
                    index,
                    inputs: files(input),
                    error,
                });
            }
        }
    }
    Ok(outcome)
}

/// Build the community of a pair and save it as `<output_folder>/<A>x<B>.json`
pub fn create_pair_model<P: AsRef<Path>>(
    pair: &[P],
    output_folder: &Path,
) -> Result<PathBuf, AnalysisError> {
    let community = create_community_model(pair)?;
    let path = output_folder.join(format!("{}.json", model_name(&community)));
    save_model(&community, &path)?;
    debug!("Saved community {}", path.display());
    Ok(path)
}

/// Build and save the community model of every pair
///
/// Each element of `pairs` must hold exactly two model files, this is checked
/// for the whole batch before any work starts. Returns the paths of the saved
/// community models.
pub fn create_interaction_models<P: AsRef<Path> + Sync>(
    pairs: &[Vec<P>],
    output_folder: &Path,
    n_processes: Option<usize>,
) -> Result<BatchOutcome<PathBuf>, AnalysisError> {
    if let Some((index, pair)) = pairs.iter().find_position(|pair| pair.len() != 2) {
        return Err(AnalysisError::InvalidPair {
            index,
            len: pair.len(),
        });
    }
    info!("Creating {} community models in {}", pairs.len(), output_folder.display());
    run_batch(
        pairs,
        n_processes,
        |pair| pair.iter().map(|p| p.as_ref().to_path_buf()).collect(),
        |pair| create_pair_model(pair, output_folder),
    )
}

/// Compute growth rates for every two species community model under `medium`
pub fn calculate_growth_rates<P: AsRef<Path> + Sync>(
    pair_models: &[P],
    medium: &Medium,
    n_processes: Option<usize>,
) -> Result<GrowthRates, AnalysisError> {
    info!("Calculating growth rates of {} communities", pair_models.len());
    run_batch(
        pair_models,
        n_processes,
        |path| vec![path.as_ref().to_path_buf()],
        |path| Ok(compute_growth_rates_from_file(path.as_ref(), medium)?),
    )
}

/// Optimize single species models and report their growth
///
/// Models that do not reach [`MINIMUM_GROWTH`] are logged as a warning, a
/// non-optimal solution counts as no growth.
pub fn check_growth<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<(PathBuf, f64)>, AnalysisError> {
    let mut growth = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let model = load_model(path)?;
        let solution = model.optimize()?;
        let value = if solution.status.is_optimal() {
            solution.objective_value.unwrap_or(0.)
        } else {
            0.
        };
        if value <= MINIMUM_GROWTH {
            warn!("Model {} does not produce growth", model_name(&model));
        }
        growth.push((path.to_path_buf(), value));
    }
    Ok(growth)
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("There must be exactly two models at index {index} in the list of source models, found {len}")]
    InvalidPair { index: usize, len: usize },
    #[error("Unable to start worker pool")]
    ThreadPool(#[from] ThreadPoolBuildError),
    #[error(transparent)]
    Community(#[from] CommunityError),
    #[error(transparent)]
    ModelIo(#[from] ModelIoError),
    #[error(transparent)]
    Interaction(#[from] InteractionError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::InteractionType;
    use approx::assert_abs_diff_eq;
    use std::fs;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("test_data")
            .join("test_models")
            .join(name)
    }

    #[test]
    fn all_pairs() {
        let pairs = get_all_pairs(&["a", "b", "c"]);
        assert_eq!(pairs, vec![vec!["a", "b"], vec!["a", "c"], vec!["b", "c"]]);
        assert!(get_all_pairs(&["a"]).is_empty());
    }

    #[test]
    fn processes() {
        let n = default_processes();
        assert!(n >= 1);
        assert!(n <= current().processes);
    }

    #[test]
    fn invalid_pair_fails_before_dispatch() {
        let output = tempfile::tempdir().unwrap();
        let pairs = vec![
            vec![fixture("sa.json"), fixture("sb.json")],
            vec![fixture("sa.json"), fixture("sb.json"), fixture("sa.json")],
        ];
        match create_interaction_models(&pairs, output.path(), Some(1)) {
            Err(AnalysisError::InvalidPair { index, len }) => {
                assert_eq!(index, 1);
                assert_eq!(len, 3);
            }
            other => panic!("unexpected result {other:?}"),
        }
        // the valid first pair was not built either
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);

        let pairs = vec![
            vec![fixture("sa.json"), fixture("sb.json")],
            vec![fixture("sb.json"), fixture("sa.json")],
            vec![fixture("sa.json")],
        ];
        match create_interaction_models(&pairs, output.path(), Some(1)) {
            Err(err @ AnalysisError::InvalidPair { index: 2, len: 1 }) => {
                assert!(err.to_string().contains("at index 2"));
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[test]
    fn end_to_end() {
        let output = tempfile::tempdir().unwrap();
        let pairs = get_all_pairs(&[fixture("sa.json"), fixture("sb.json")]);
        let models = create_interaction_models(&pairs, output.path(), Some(2))
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(models, vec![output.path().join("saxsb.json")]);

        let medium = Medium::from([("EX_glc_e".to_string(), 10.)]);
        let rates = calculate_growth_rates(&models, &medium, Some(2)).unwrap();
        assert!(rates.is_complete());
        let record = rates.get("sb", "sa").unwrap();
        assert_eq!(record.interaction, InteractionType::Commensalism);
        assert_abs_diff_eq!(record.a_alone, 10., epsilon = 1e-4);
    }

    #[test]
    fn failed_pair_is_isolated() {
        let output = tempfile::tempdir().unwrap();
        let pairs = vec![
            vec![fixture("sa.json"), fixture("missing.json")],
            vec![fixture("sa.json"), fixture("sb.json")],
        ];
        let outcome = create_interaction_models(&pairs, output.path(), Some(2)).unwrap();
        assert_eq!(outcome.completed.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        let failure = &outcome.failures[0];
        assert_eq!(failure.index, 0);
        assert_eq!(failure.inputs[1], fixture("missing.json"));
        assert!(matches!(failure.error, AnalysisError::Community(_)));
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn single_species_growth() {
        let growth = check_growth(&[fixture("sa.json"), fixture("sb.json")]).unwrap();
        assert_abs_diff_eq!(growth[0].1, 10., epsilon = 1e-4);
        assert_abs_diff_eq!(growth[1].1, 10., epsilon = 1e-4);
    }
}
