//! Subcommand handlers.

use std::time::Duration;

use serde::Serialize;

use ovenctl_app::notification_bus::{CookOutcome, NotificationBus, wait_for_cook_end};
use ovenctl_app::ports::CommandChannel;
use ovenctl_app::services::oven_service::{DiscoveryOptions, DiscoveryWait, OvenService};
use ovenctl_app::services::recipe_service::RecipeService;
use ovenctl_domain::device::Device;
use ovenctl_domain::error::{OvenError, StageFailedError};
use ovenctl_domain::id::DeviceId;
use ovenctl_domain::preset::{self, Preset};
use ovenctl_domain::stage::{CookProgram, CookStage};
use ovenctl_domain::temperature::{ProbeTarget, Temperature, TemperatureUnit};
use ovenctl_domain::timer::Timer;

use crate::cli::{CookArgs, DeviceArgs, DiscoverArgs, ProbeArgs, RecipesCommand};
use crate::config::Config;
use crate::error::CliError;

/// Everything a device subcommand needs.
pub struct Context<'a, C> {
    pub service: OvenService<C, NotificationBus>,
    pub bus: NotificationBus,
    pub recipes: RecipeService,
    pub config: &'a Config,
}

pub async fn discover<C: CommandChannel>(
    ctx: &Context<'_, C>,
    args: DiscoverArgs,
) -> Result<(), CliError> {
    let timeout = match args.timeout {
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map_err(|_| CliError::Usage(format!("invalid timeout {secs}")))?,
        None => ctx.config.discovery_timeout(),
    };
    let options = DiscoveryOptions {
        wait: if args.wait_all {
            DiscoveryWait::FullTimeout
        } else {
            DiscoveryWait::FirstResponse
        },
        accessories: if args.accessories.is_empty() {
            ctx.config.connection.supported_accessories.clone()
        } else {
            args.accessories
        },
    };
    let devices = ctx.service.discover_devices(timeout, &options).await?;

    if args.json {
        return print_json(&devices);
    }
    if devices.is_empty() {
        println!("no ovens found");
    }
    for device in &devices {
        print_device(device);
    }
    Ok(())
}

pub async fn cook<C: CommandChannel>(ctx: &Context<'_, C>, args: CookArgs) -> Result<(), CliError> {
    let device_id = DeviceId::new(args.device.device.as_str());
    let device = ensure_device(ctx, &device_id).await?;
    let program = build_program(ctx, &device, &args)?;

    // later stages and preheat timers are driven by this process
    let wait = args.wait || program.len() > 1 || program.requires_preheat();
    if wait && !args.wait {
        tracing::info!("staying attached to sequence the program");
    }

    print_program(&program);
    let mut events = ctx.bus.subscribe();
    let cook_id = ctx.service.start_cook(&device_id, program).await?;
    println!("cook {cook_id} started on {}", device.name);
    if !wait {
        return Ok(());
    }

    match wait_for_cook_end(&mut events, &device_id).await? {
        CookOutcome::Completed => println!("cook complete"),
        CookOutcome::Stopped => println!("cook stopped"),
        CookOutcome::StageFailed {
            stage_index,
            reason,
        } => {
            return Err(OvenError::from(StageFailedError {
                device_id,
                stage_index,
                reason,
            })
            .into());
        }
        CookOutcome::Faulted { message } => {
            return Err(anyhow::anyhow!("device `{device_id}` reported a fault: {message}").into());
        }
    }
    Ok(())
}

pub async fn stop<C: CommandChannel>(ctx: &Context<'_, C>, args: DeviceArgs) -> Result<(), CliError> {
    let device_id = DeviceId::new(args.device.as_str());
    let device = ensure_device(ctx, &device_id).await?;
    ctx.service.stop_cook(&device_id).await?;
    println!("cook stopped on {}", device.name);
    Ok(())
}

pub async fn probe<C: CommandChannel>(ctx: &Context<'_, C>, args: ProbeArgs) -> Result<(), CliError> {
    let target = ProbeTarget::new(args.temp, args.unit)?;
    let device_id = DeviceId::new(args.device.device.as_str());
    let device = ensure_device(ctx, &device_id).await?;
    ctx.service.set_probe(&device_id, target).await?;
    println!("probe target set to {target} on {}", device.name);
    Ok(())
}

/// Recipe inspection needs no connection.
pub fn recipes(recipes: &RecipeService, command: RecipesCommand) -> Result<(), CliError> {
    match command {
        RecipesCommand::List { json } => {
            let list = recipes.list();
            if json {
                return print_json(&list);
            }
            if list.is_empty() {
                println!("no recipes");
            }
            for recipe in list {
                let version = recipe
                    .oven_version
                    .map(|version| format!(", {version} only"))
                    .unwrap_or_default();
                println!(
                    "{:<20} {} ({} stage(s){version})",
                    recipe.id,
                    recipe.name,
                    recipe.stages.len()
                );
            }
        }
        RecipesCommand::Show { id, json } => {
            let recipe = recipes.get(&id)?;
            let program = recipe.compile()?;
            if json {
                return print_json(&serde_json::json!({ "recipe": recipe, "program": program }));
            }
            println!("{} ({})", recipe.name, recipe.id);
            if let Some(description) = &recipe.description {
                println!("{description}");
            }
            if let Some(version) = recipe.oven_version {
                println!("requires {version}");
            }
            print_program(&program);
        }
    }
    Ok(())
}

/// Look `device_id` up, running a quick discovery if it is not known yet.
async fn ensure_device<C: CommandChannel>(
    ctx: &Context<'_, C>,
    device_id: &DeviceId,
) -> Result<Device, CliError> {
    if let Ok(device) = ctx.service.get_device(device_id) {
        return Ok(device);
    }
    let options = DiscoveryOptions {
        wait: DiscoveryWait::FirstResponse,
        accessories: ctx.config.connection.supported_accessories.clone(),
    };
    ctx.service
        .discover_devices(ctx.config.discovery_timeout(), &options)
        .await?;
    Ok(ctx.service.get_device(device_id)?)
}

fn build_program<C: CommandChannel>(
    ctx: &Context<'_, C>,
    device: &Device,
    args: &CookArgs,
) -> Result<CookProgram, CliError> {
    if let Some(recipe) = &args.recipe {
        return Ok(ctx.recipes.compile_for_device(recipe, device)?);
    }
    let Some(value) = args.temp else {
        return Err(CliError::Usage("either --recipe or --temp is required".to_string()));
    };
    let temperature = Temperature::new(value, args.unit)?;

    let Some(preset) = args.preset else {
        return Ok(single_stage(temperature, args.duration, args.fan_speed)?);
    };
    let Some(duration) = args.duration else {
        return Err(CliError::Usage(format!("preset {preset} needs --duration")));
    };
    let program = match preset {
        Preset::Roast => preset::roast(temperature, duration)?,
        Preset::SteamBake => preset::steam_bake(temperature, duration)?,
        Preset::SousVideThenSear => {
            let sear = args.sear_temp.unwrap_or(match args.unit {
                TemperatureUnit::Celsius => 230.0,
                TemperatureUnit::Fahrenheit => 450.0,
            });
            let sear = Temperature::new(sear, args.unit)?;
            preset::sous_vide_then_sear(temperature, duration, sear, args.sear_duration)?
        }
    };
    Ok(program)
}

fn single_stage(
    temperature: Temperature,
    duration: Option<u32>,
    fan_speed: Option<u8>,
) -> Result<CookProgram, ovenctl_domain::error::ValidationError> {
    let Some(fan_speed) = fan_speed else {
        return CookProgram::simple(temperature, duration);
    };
    let mut builder = CookStage::builder(temperature).title("Cook").fan_speed(fan_speed);
    if let Some(seconds) = duration {
        builder = builder.timer(Timer::immediate(seconds)?);
    }
    CookProgram::new(vec![builder.build()?])
}

fn print_device(device: &Device) {
    let version = device
        .oven_version
        .map_or_else(|| "-".to_string(), |version| version.to_string());
    let temperature = device
        .current_temperature
        .map_or_else(|| "-".to_string(), |celsius| format!("{celsius:.1}°C"));
    println!(
        "{:<24} {:<20} {:<5} {:<8} {:<11} {temperature}",
        device.id, device.name, device.device_type, version, device.state
    );
}

fn print_program(program: &CookProgram) {
    for (index, stage) in program.stages().iter().enumerate() {
        println!("  {}. {}", index + 1, describe_stage(stage));
        for warning in stage.warnings() {
            println!("     warning: {warning}");
        }
    }
}

fn describe_stage(stage: &CookStage) -> String {
    let mut parts = vec![
        format!("{} {}", stage.temperature(), stage.mode()),
        format!("elements: {}", stage.heating_elements()),
        format!("fan {}%", stage.fan_speed()),
    ];
    if let Some(steam) = stage.steam() {
        parts.push(format!("steam {steam}"));
    }
    if stage.vent_open() {
        parts.push("vent open".to_string());
    }
    if let Some(rack) = stage.rack_position() {
        parts.push(format!("rack {rack}"));
    }
    match stage.timer() {
        Some(timer) if timer.waits_for_preheat() => parts.push(format!("{timer} after preheat")),
        Some(timer) => parts.push(timer.to_string()),
        None => parts.push("until stopped".to_string()),
    }
    format!("{}: {}", stage.title(), parts.join(", "))
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value).map_err(anyhow::Error::from)?;
    println!("{rendered}");
    Ok(())
}
