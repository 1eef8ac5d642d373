//! Recipe file discovery and loading.

use std::path::{Path, PathBuf};

use anyhow::Context;

use ovenctl_domain::error::OvenError;
use ovenctl_domain::recipe::RecipeLibrary;

use crate::error::CliError;

const CANDIDATES: [&str; 2] = ["recipes.yml", "recipes.yaml"];

/// Where to look for a recipe file, in order.
///
/// An explicit path is the only candidate; otherwise the working directory
/// comes first, then `~/.ovenctl/recipes.yml`.
fn candidates(explicit: Option<&Path>, home: Option<&Path>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    let mut paths: Vec<PathBuf> = CANDIDATES.iter().map(PathBuf::from).collect();
    if let Some(home) = home {
        paths.push(home.join(".ovenctl").join("recipes.yml"));
    }
    paths
}

/// Load the recipe library.
///
/// Finding no file yields an empty library and a warning.
///
/// # Errors
///
/// - [`CliError::Other`] when a file exists but cannot be read
/// - [`CliError::Oven`] wrapping a recipe parse error
pub fn load(explicit: Option<&Path>) -> Result<RecipeLibrary, CliError> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let Some(path) = candidates(explicit, home.as_deref())
        .into_iter()
        .find(|path| path.is_file())
    else {
        match explicit {
            Some(path) => tracing::warn!(path = %path.display(), "recipe file not found"),
            None => tracing::warn!("no recipe file found, the recipe library is empty"),
        }
        return Ok(RecipeLibrary::default());
    };

    let source = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read recipe file {}", path.display()))?;
    let library = RecipeLibrary::from_yaml_str(&source).map_err(OvenError::from)?;
    tracing::debug!(path = %path.display(), count = library.len(), "recipes loaded");
    Ok(library)
}
