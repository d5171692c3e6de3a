//! Module for reading and writing Models
//!
//! The format of a model file is chosen by its extension, see [`load_model`]
//! and [`save_model`].
use std::path::Path;

use thiserror::Error;

use crate::metabolic_model::model::Model;

pub mod json;
pub mod matlab;
pub mod sbml;
pub mod tabular;

use json::JsonError;
use matlab::MatError;
use sbml::SbmlError;

/// Reader and writer for one model file format
struct FormatStrategy {
    extensions: &'static [&'static str],
    load: fn(&Path) -> Result<Model, ModelIoError>,
    save: fn(&Model, &Path) -> Result<(), ModelIoError>,
}

fn load_json(path: &Path) -> Result<Model, ModelIoError> {
    Ok(Model::read_json(path)?)
}

fn save_json(model: &Model, path: &Path) -> Result<(), ModelIoError> {
    Ok(model.write_json(path)?)
}

fn load_sbml(path: &Path) -> Result<Model, ModelIoError> {
    Ok(Model::read_sbml(path)?)
}

fn save_sbml(model: &Model, path: &Path) -> Result<(), ModelIoError> {
    Ok(model.write_sbml(path)?)
}

fn load_mat(path: &Path) -> Result<Model, ModelIoError> {
    Ok(Model::read_mat(path)?)
}

fn save_mat(model: &Model, path: &Path) -> Result<(), ModelIoError> {
    Ok(model.write_mat(path)?)
}

static FORMATS: [FormatStrategy; 3] = [
    FormatStrategy {
        extensions: &["json"],
        load: load_json,
        save: save_json,
    },
    FormatStrategy {
        extensions: &["xml", "sbml"],
        load: load_sbml,
        save: save_sbml,
    },
    FormatStrategy {
        extensions: &["mat"],
        load: load_mat,
        save: save_mat,
    },
];

fn strategy(path: &Path) -> Result<&'static FormatStrategy, ModelIoError> {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();
    FORMATS
        .iter()
        .find(|format| format.extensions.contains(&extension.as_str()))
        .ok_or_else(|| ModelIoError::UnsupportedFormat {
            extension,
            path: path.display().to_string(),
        })
}

/// Whether a path has one of the supported model file extensions
pub fn is_supported(path: &Path) -> bool {
    strategy(path).is_ok()
}

/// Load a model, the file format is chosen by the extension of `path`
///
/// Supported extensions are `.json`, `.xml`/`.sbml` and `.mat`.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Model, ModelIoError> {
    let path = path.as_ref();
    (strategy(path)?.load)(path)
}

/// Save a model, the file format is chosen by the extension of `path`
pub fn save_model<P: AsRef<Path>>(model: &Model, path: P) -> Result<(), ModelIoError> {
    let path = path.as_ref();
    (strategy(path)?.save)(model, path)
}

#[derive(Error, Debug)]
pub enum ModelIoError {
    #[error("Model file extension '{extension}' not supported for {path}")]
    UnsupportedFormat { extension: String, path: String },
    #[error(transparent)]
    Json(#[from] JsonError),
    #[error(transparent)]
    Sbml(#[from] SbmlError),
    #[error(transparent)]
    Mat(#[from] MatError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::species_a;
    use approx::assert_abs_diff_eq;

    #[test]
    fn unsupported_extension() {
        let err = load_model("models/sa.txt").unwrap_err();
        match err {
            ModelIoError::UnsupportedFormat { extension, path } => {
                assert_eq!(extension, "txt");
                assert_eq!(path, "models/sa.txt");
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(matches!(
            save_model(&species_a(), "no_extension"),
            Err(ModelIoError::UnsupportedFormat { .. })
        ));
        assert!(!is_supported(Path::new("model.JSON5")));
    }

    /// Save and load through every format, checking ids, bounds and objective
    #[test]
    fn round_trip_every_format() {
        let dir = tempfile::tempdir().unwrap();
        let model = species_a();
        for name in ["sa.json", "sa.xml", "sa.sbml", "sa.mat"] {
            let path = dir.path().join(name);
            save_model(&model, &path).unwrap();
            let loaded = load_model(&path).unwrap();
            assert_eq!(loaded.id, model.id, "{name}");
            assert_eq!(
                loaded.reactions.keys().collect::<Vec<_>>(),
                model.reactions.keys().collect::<Vec<_>>(),
                "{name}"
            );
            assert_eq!(
                loaded.metabolites.keys().collect::<Vec<_>>(),
                model.metabolites.keys().collect::<Vec<_>>(),
                "{name}"
            );
            for (id, reaction) in &model.reactions {
                let other = &loaded.reactions[id];
                assert_abs_diff_eq!(other.lower_bound, reaction.lower_bound, epsilon = 1e-9);
                assert_abs_diff_eq!(other.upper_bound, reaction.upper_bound, epsilon = 1e-9);
                for (met, coef) in &reaction.metabolites {
                    assert_abs_diff_eq!(other.metabolites[met], *coef, epsilon = 1e-9);
                }
            }
            assert_eq!(loaded.objective, model.objective, "{name}");
        }
    }
}
