//! Recipe service: lookup and compilation against a device.

use std::sync::Arc;

use ovenctl_domain::device::Device;
use ovenctl_domain::error::{OvenError, RecipeNotFoundError};
use ovenctl_domain::recipe::{Recipe, RecipeLibrary};
use ovenctl_domain::stage::CookProgram;

/// Read-only access to a loaded [`RecipeLibrary`].
#[derive(Debug, Clone)]
pub struct RecipeService {
    library: Arc<RecipeLibrary>,
}

impl RecipeService {
    /// Create a new service over an already-loaded library.
    #[must_use]
    pub fn new(library: Arc<RecipeLibrary>) -> Self {
        Self { library }
    }

    /// Recipes in id order.
    #[must_use]
    pub fn list(&self) -> Vec<&Recipe> {
        self.library.iter().collect()
    }

    /// # Errors
    ///
    /// Returns [`OvenError::RecipeNotFound`] when no recipe has `id`.
    pub fn get(&self, id: &str) -> Result<&Recipe, OvenError> {
        self.library.get(id).ok_or_else(|| {
            RecipeNotFoundError {
                recipe_id: id.to_string(),
            }
            .into()
        })
    }

    /// Compile recipe `id` into a program for `device`.
    ///
    /// Stage warnings (dry mode with steam, no element active, ...) are logged,
    /// not rejected.
    ///
    /// # Errors
    ///
    /// - [`OvenError::RecipeNotFound`] for an unknown id
    /// - [`OvenError::IncompatibleRecipe`] when the recipe targets another oven
    ///   version
    /// - [`OvenError::Validation`] when a stage is out of range
    #[tracing::instrument(skip(self, device), fields(device_id = %device.id))]
    pub fn compile_for_device(&self, id: &str, device: &Device) -> Result<CookProgram, OvenError> {
        let recipe = self.get(id)?;
        let program = recipe.compile_for(device.oven_version.as_ref())?;
        for (index, stage) in program.stages().iter().enumerate() {
            for warning in stage.warnings() {
                tracing::warn!(recipe = %recipe.id, stage_index = index, %warning, "questionable stage");
            }
        }
        Ok(program)
    }
}
