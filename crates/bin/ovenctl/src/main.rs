//! # ovenctl
//!
//! Composition root for the oven controller. Loads configuration, builds the
//! recipe library, wires the chosen command channel into the application
//! services and runs one subcommand.

mod cli;
mod commands;
mod config;
mod error;
mod recipes_file;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ovenctl_adapter_virtual::{Simulation, VirtualOvenChannel};
use ovenctl_adapter_websocket::WebSocketChannel;
use ovenctl_app::notification_bus::NotificationBus;
use ovenctl_app::ports::CommandChannel;
use ovenctl_app::services::oven_service::OvenService;
use ovenctl_app::services::recipe_service::RecipeService;

use crate::cli::{Cli, Command};
use crate::commands::Context;
use crate::config::{Backend, Config};
use crate::error::{CliError, exit_code};

const EVENT_CAPACITY: usize = 256;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(()) => exit_code::SUCCESS,
        Err(error) => {
            report(&error);
            error.exit_code()
        }
    };
    std::process::exit(code);
}

fn report(error: &CliError) {
    eprintln!("error: {error}");
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}

fn init_tracing(verbosity: u8, filter: Option<&str>) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = filter
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = Config::load(cli.global.config.as_deref(), cli.global.backend)?;
    init_tracing(cli.global.verbose, config.logging.filter.as_deref());
    tracing::debug!(backend = ?config.connection.backend, "configuration loaded");

    let recipes_path = cli
        .global
        .recipes
        .as_deref()
        .or(config.recipes.file.as_deref());
    let recipes = RecipeService::new(Arc::new(recipes_file::load(recipes_path)?));

    match cli.command {
        Command::Recipes(command) => commands::recipes(&recipes, command),
        command => match config.connection.backend {
            Backend::Virtual => {
                let simulation = Simulation {
                    time_scale: config.connection.virtual_time_scale,
                    ..Simulation::default()
                };
                let channel = VirtualOvenChannel::default().with_simulation(simulation);
                run_with(Arc::new(channel), command, recipes, &config).await
            }
            Backend::Websocket => {
                let channel = WebSocketChannel::new(config.websocket_config());
                run_with(Arc::new(channel), command, recipes, &config).await
            }
        },
    }
}

async fn run_with<C: CommandChannel>(
    channel: Arc<C>,
    command: Command,
    recipes: RecipeService,
    config: &Config,
) -> Result<(), CliError> {
    let bus = NotificationBus::new(EVENT_CAPACITY);
    let ctx = Context {
        service: OvenService::new(channel, bus.clone(), config.session_config()),
        bus,
        recipes,
        config,
    };
    let result = tokio::select! {
        result = dispatch(&ctx, command) => result,
        _ = tokio::signal::ctrl_c() => Err(CliError::Interrupted),
    };
    ctx.service.shutdown().await;
    result
}

async fn dispatch<C: CommandChannel>(ctx: &Context<'_, C>, command: Command) -> Result<(), CliError> {
    match command {
        Command::Discover(args) => commands::discover(ctx, args).await,
        Command::Cook(args) => commands::cook(ctx, args).await,
        Command::Stop(args) => commands::stop(ctx, args).await,
        Command::Probe(args) => commands::probe(ctx, args).await,
        Command::Recipes(command) => commands::recipes(&ctx.recipes, command),
    }
}
