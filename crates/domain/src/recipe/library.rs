//! Parsing of the recipe file into a [`RecipeLibrary`].
//!
//! Accepted layouts for the top-level `recipes` key:
//!
//! ```yaml
//! recipes:
//!   bread: { name: ..., stages: [...] }
//! ```
//!
//! or a list of single-entry mappings:
//!
//! ```yaml
//! recipes:
//!   - bread: { name: ..., stages: [...] }
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde_yaml::{Mapping, Value};

use super::Recipe;
use super::definition::StageDefinition;
use crate::device::OvenVersion;
use crate::error::RecipeParseError;

/// Recipes keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeLibrary {
    recipes: BTreeMap<String, Recipe>,
}

impl RecipeLibrary {
    /// Parse a recipe document.
    ///
    /// An empty document or an empty `recipes` key yields an empty library.
    ///
    /// # Errors
    ///
    /// Returns [`RecipeParseError`] naming the recipe and field path when the
    /// document is malformed, a required field is missing, or an id repeats.
    pub fn from_yaml_str(source: &str) -> Result<Self, RecipeParseError> {
        let root: Value = serde_yaml::from_str(source)
            .map_err(|err| RecipeParseError::new(None, "<document>", err.to_string()))?;
        if root.is_null() {
            return Ok(Self::default());
        }
        let Some(root) = root.as_mapping() else {
            return Err(RecipeParseError::new(None, "<document>", "expected a mapping"));
        };
        let recipes = match root.get("recipes") {
            None => {
                return Err(RecipeParseError::new(
                    None,
                    "recipes",
                    "missing top-level key",
                ));
            }
            Some(Value::Null) => return Ok(Self::default()),
            Some(value) => value,
        };

        let mut library = Self::default();
        for (id, body) in entries(recipes)? {
            let recipe = parse_recipe(&id, body)?;
            match library.recipes.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert(recipe);
                }
                Entry::Occupied(slot) => {
                    return Err(RecipeParseError::new(
                        Some(slot.key().as_str()),
                        "<id>",
                        "duplicate recipe id",
                    ));
                }
            }
        }
        Ok(library)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Recipe> {
        self.recipes.get(id)
    }

    /// Recipes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.recipes.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

fn entries(recipes: &Value) -> Result<Vec<(String, &Value)>, RecipeParseError> {
    match recipes {
        Value::Mapping(map) => map_entries(map, "recipes"),
        Value::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let field = format!("recipes[{index}]");
                let Some(map) = item.as_mapping() else {
                    return Err(RecipeParseError::new(None, field, "expected a mapping"));
                };
                if map.len() != 1 {
                    return Err(RecipeParseError::new(
                        None,
                        field,
                        "expected exactly one recipe id per list entry",
                    ));
                }
                out.extend(map_entries(map, &field)?);
            }
            Ok(out)
        }
        _ => Err(RecipeParseError::new(
            None,
            "recipes",
            "expected a mapping or a list",
        )),
    }
}

fn map_entries<'a>(
    map: &'a Mapping,
    field: &str,
) -> Result<Vec<(String, &'a Value)>, RecipeParseError> {
    map.iter()
        .map(|(key, value)| match key {
            Value::String(id) => Ok((id.clone(), value)),
            Value::Number(id) => Ok((id.to_string(), value)),
            _ => Err(RecipeParseError::new(
                None,
                field,
                "recipe id must be a string",
            )),
        })
        .collect()
}

fn parse_recipe(id: &str, body: &Value) -> Result<Recipe, RecipeParseError> {
    let err = |field: &str, reason: &str| RecipeParseError::new(Some(id), field, reason);
    let Some(body) = body.as_mapping() else {
        return Err(err("<recipe>", "expected a mapping"));
    };

    let name = match body.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
        Some(Value::String(_)) => return Err(err("name", "must not be empty")),
        Some(_) => return Err(err("name", "expected a string")),
        None => return Err(err("name", "missing field")),
    };
    let description = match body.get("description") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => return Err(err("description", "expected a string")),
    };
    let oven_version = match body.get("oven_version") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            serde_yaml::from_value::<OvenVersion>(value.clone())
                .map_err(|e| err("oven_version", &e.to_string()))?,
        ),
    };
    let stages = match body.get("stages") {
        Some(Value::Sequence(stages)) => stages,
        Some(_) => return Err(err("stages", "expected a list")),
        None => return Err(err("stages", "missing field")),
    };
    let stages = stages
        .iter()
        .enumerate()
        .map(|(index, stage)| {
            serde_yaml::from_value::<StageDefinition>(stage.clone())
                .map_err(|e| err(&format!("stages[{index}]"), &e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Recipe {
        id: id.to_string(),
        name,
        description,
        oven_version,
        stages,
    })
}
