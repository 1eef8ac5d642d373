//! Heating element selection.

use std::fmt;

use serde::Serialize;

use crate::error::ValidationError;

/// Which independently controllable heating zones are active.
///
/// The oven firmware refuses a stage with every element powered, so that
/// combination cannot be constructed. The rule is specific to the three-zone
/// cavity modelled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct HeatingElements {
    top: bool,
    bottom: bool,
    rear: bool,
}

impl HeatingElements {
    /// Number of heating zones in the cavity.
    pub const COUNT: usize = 3;

    /// # Errors
    ///
    /// Returns [`ValidationError::AllHeatingElementsActive`] when `top`,
    /// `bottom` and `rear` are all `true`.
    pub fn new(top: bool, bottom: bool, rear: bool) -> Result<Self, ValidationError> {
        let elements = Self { top, bottom, rear };
        if elements.active_count() == Self::COUNT {
            return Err(ValidationError::AllHeatingElementsActive);
        }
        Ok(elements)
    }

    #[must_use]
    pub fn top(&self) -> bool {
        self.top
    }

    #[must_use]
    pub fn bottom(&self) -> bool {
        self.bottom
    }

    #[must_use]
    pub fn rear(&self) -> bool {
        self.rear
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        [self.top, self.bottom, self.rear]
            .into_iter()
            .filter(|on| *on)
            .count()
    }

    #[must_use]
    pub fn is_any_active(&self) -> bool {
        self.active_count() > 0
    }

    /// Names of the active zones in `top, bottom, rear` order.
    #[must_use]
    pub fn active_names(&self) -> Vec<&'static str> {
        [("top", self.top), ("bottom", self.bottom), ("rear", self.rear)]
            .into_iter()
            .filter_map(|(name, on)| on.then_some(name))
            .collect()
    }
}

/// Rear element only, the oven's convection default.
impl Default for HeatingElements {
    fn default() -> Self {
        Self {
            top: false,
            bottom: false,
            rear: true,
        }
    }
}

impl fmt::Display for HeatingElements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.active_names();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(", "))
        }
    }
}
