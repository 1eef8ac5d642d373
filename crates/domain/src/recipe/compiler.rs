//! Translation of recipes into validated cook programs.
//!
//! Every stage goes through the same constructors as a hand-built
//! [`CookStage`], so a recipe can never produce a program that manual
//! construction would reject.

use super::Recipe;
use super::definition::StageDefinition;
use crate::device::OvenVersion;
use crate::error::{IncompatibleRecipeError, OvenError, ValidationError};
use crate::heating::HeatingElements;
use crate::stage::{CookProgram, CookStage};
use crate::steam::SteamSettings;
use crate::temperature::Temperature;
use crate::timer::Timer;

impl Recipe {
    /// Check that the recipe can run on a device reporting `device_version`.
    ///
    /// A recipe without a version requirement runs on any device. A recipe
    /// with one requires the device to report that exact version.
    ///
    /// # Errors
    ///
    /// Returns [`OvenError::IncompatibleRecipe`] on a mismatch or when the
    /// device reports no version.
    pub fn validate_for_oven(&self, device_version: Option<&OvenVersion>) -> Result<(), OvenError> {
        let Some(required) = self.oven_version else {
            return Ok(());
        };
        if device_version == Some(&required) {
            return Ok(());
        }
        Err(IncompatibleRecipeError {
            recipe_id: self.id.clone(),
            required,
            actual: device_version.copied(),
        }
        .into())
    }

    /// Validate each stage definition in order.
    ///
    /// # Errors
    ///
    /// Returns [`OvenError::Validation`] for the first invalid stage, or
    /// [`ValidationError::EmptyProgram`] when the recipe has no stages.
    pub fn to_cook_stages(&self) -> Result<Vec<CookStage>, OvenError> {
        if self.stages.is_empty() {
            return Err(ValidationError::EmptyProgram.into());
        }
        let stages = self
            .stages
            .iter()
            .map(StageDefinition::to_cook_stage)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stages)
    }

    /// # Errors
    ///
    /// See [`Recipe::to_cook_stages`].
    pub fn compile(&self) -> Result<CookProgram, OvenError> {
        Ok(CookProgram::new(self.to_cook_stages()?)?)
    }

    /// Compile after checking compatibility with the target device.
    ///
    /// # Errors
    ///
    /// See [`Recipe::validate_for_oven`] and [`Recipe::to_cook_stages`].
    pub fn compile_for(&self, device_version: Option<&OvenVersion>) -> Result<CookProgram, OvenError> {
        self.validate_for_oven(device_version)?;
        self.compile()
    }
}

impl StageDefinition {
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] raised by the stage's components.
    pub fn to_cook_stage(&self) -> Result<CookStage, ValidationError> {
        let temperature = Temperature::new(self.temperature.value, self.temperature.unit)?;
        let mut builder = CookStage::builder(temperature).mode(self.temperature.mode);

        if let Some(elements) = self.heating_elements {
            builder = builder.heating_elements(HeatingElements::new(
                elements.top,
                elements.bottom,
                elements.rear,
            )?);
        }
        if let Some(steam) = self.steam {
            builder = builder.steam(SteamSettings::new(steam.mode, steam.magnitude)?);
        }
        if let Some(timer) = self.timer {
            builder = builder.timer(Timer::new(timer.seconds, timer.start_type)?);
        }
        if let Some(title) = &self.title {
            builder = builder.title(title.clone());
        }
        if let Some(description) = &self.description {
            builder = builder.description(description.clone());
        }
        if let Some(fan_speed) = self.fan_speed {
            builder = builder.fan_speed(fan_speed);
        }
        if let Some(rack) = self.rack_position {
            builder = builder.rack_position(rack);
        }
        builder.vent_open(self.vent_open).build()
    }
}
