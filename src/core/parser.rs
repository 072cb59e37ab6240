//! Recipe file parsing.
//!
//! A recipe file is a YAML document with a `steps` list; each entry is a
//! typed step. Structural problems (duplicate ids, dangling requisites,
//! cycles) are not this module's job: parse here, then run the result
//! through graph validation.

use super::types::Step;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

#[derive(Debug, serde::Deserialize)]
struct RecipeFile {
    #[serde(default)]
    steps: Vec<Step>,
}

/// Parse a recipe file from disk.
pub fn parse_recipe_file(path: &Path) -> Result<Vec<Step>, ParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| ParseError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_recipe(&content)
}

/// Parse a recipe from a YAML string.
pub fn parse_recipe(yaml: &str) -> Result<Vec<Step>, ParseError> {
    let file: RecipeFile = serde_yaml_ng::from_str(yaml)?;
    Ok(file.steps)
}
