//! Recipes: named, reusable cook programs authored in a YAML file.
//!
//! A [`RecipeLibrary`] is parsed once from the file and never mutated; a
//! [`Recipe`] is compiled into a [`CookProgram`](crate::stage::CookProgram)
//! each time it is cooked.

mod compiler;
mod definition;
mod library;

use serde::Serialize;

use crate::device::OvenVersion;

pub use definition::{
    HeatingElementsDefinition, StageDefinition, SteamDefinition, TemperatureDefinition,
    TimerDefinition,
};
pub use library::RecipeLibrary;

/// A named multi-stage recipe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Oven generation the recipe was written for; `None` runs anywhere.
    pub oven_version: Option<OvenVersion>,
    pub stages: Vec<StageDefinition>,
}
