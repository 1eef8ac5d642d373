//! Command-line definition.

use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};

use ovenctl_domain::preset::Preset;
use ovenctl_domain::temperature::TemperatureUnit;

use crate::config::Backend;

/// Control networked combi-steam ovens.
#[derive(Debug, Parser)]
#[command(name = "ovenctl", version, about, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration file (default: ./ovenctl.toml when present)
    #[arg(long, global = true, env = "OVENCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Recipe file, overriding the configured one
    #[arg(long, global = true)]
    pub recipes: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Transport to use, overriding the configured one
    #[arg(long, global = true, value_enum)]
    pub backend: Option<Backend>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List ovens on the account
    Discover(DiscoverArgs),

    /// Start a cook from a recipe, a preset or a single temperature
    Cook(CookArgs),

    /// Stop the running cook
    Stop(DeviceArgs),

    /// Set the food probe target
    Probe(ProbeArgs),

    /// Inspect the recipe library
    #[command(subcommand)]
    Recipes(RecipesCommand),
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Seconds to wait for answers
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Keep collecting until the timeout instead of stopping at the first answer
    #[arg(long)]
    pub wait_all: bool,

    /// Accessory type to keep, repeatable (default: configured accessories)
    #[arg(long = "accessory")]
    pub accessories: Vec<String>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct DeviceArgs {
    /// Device id as shown by `discover`
    #[arg(long)]
    pub device: String,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("program").required(true).args(["recipe", "temp"])))]
pub struct CookArgs {
    #[command(flatten)]
    pub device: DeviceArgs,

    /// Recipe id from the recipe library
    #[arg(long, conflicts_with_all = ["preset", "temp", "duration", "fan_speed"])]
    pub recipe: Option<String>,

    /// Ready-made program; needs --temp and --duration
    #[arg(long, requires_all = ["temp", "duration"])]
    pub preset: Option<Preset>,

    /// Cavity temperature
    #[arg(long)]
    pub temp: Option<f64>,

    #[arg(long, default_value = "C")]
    pub unit: TemperatureUnit,

    /// Cook time in seconds; omitted runs until stopped
    #[arg(long)]
    pub duration: Option<u32>,

    /// Fan speed 0-100 for a single-temperature cook
    #[arg(long, conflicts_with = "preset")]
    pub fan_speed: Option<u8>,

    /// Sear temperature for the sous_vide_then_sear preset, in --unit
    /// (default 230 °C / 450 °F)
    #[arg(long)]
    pub sear_temp: Option<f64>,

    /// Sear time in seconds for the sous_vide_then_sear preset
    #[arg(long, default_value_t = 300)]
    pub sear_duration: u32,

    /// Stay attached until the cook ends
    #[arg(long)]
    pub wait: bool,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub device: DeviceArgs,

    /// Target core temperature
    #[arg(long)]
    pub temp: f64,

    #[arg(long, default_value = "C")]
    pub unit: TemperatureUnit,
}

#[derive(Debug, Subcommand)]
pub enum RecipesCommand {
    /// List every recipe
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one recipe and its compiled stages
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
}
