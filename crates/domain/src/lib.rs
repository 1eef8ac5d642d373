//! # ovenctl-domain
//!
//! Pure domain model for controlling networked combi-steam ovens.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Validated settings: **Temperature**, **HeatingElements**, **SteamSettings**, **Timer**
//! - **CookStage** / **CookProgram**: the ordered stages sent to an oven
//! - **Recipes**: file-authored stage lists and their compilation into programs
//! - **Presets**: ready-made programs for common techniques
//! - **Devices** and **Events** as seen by the rest of the workspace
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! The transport boundary is expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod device;
pub mod event;
pub mod heating;
pub mod preset;
pub mod recipe;
pub mod stage;
pub mod steam;
pub mod temperature;
pub mod timer;
