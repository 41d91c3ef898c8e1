use anyhow::{Context, Result};
use brewflow::system::{EngineConfig, ScriptedHost};
use brewflow::{BrewEngine, Recipe, RecipeStep};
use embassy_executor::Spawner;
use log::{error, info, warn};

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting brewflow");

    // The session bus lives inside run(); box it so the main task stays within the executor arena
    if let Err(e) = Box::pin(run()).await {
        error!("Brew failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let recipe = match args.next() {
        Some(path) => load_recipe(&path)?,
        None => default_recipe(),
    };
    let config = match args.next() {
        Some(path) => load_config(&path)?,
        None => EngineConfig::default(),
    };

    let mut engine = BrewEngine::with_config(recipe.clone(), &config)
        .with_context(|| format!("Recipe '{}' cannot be brewed", recipe.name))?;

    match ScriptedHost::default().run(&mut engine).await {
        Some(summary) => {
            let json = serde_json::to_string_pretty(&summary)
                .context("Failed to serialize brew summary")?;
            println!("{}", json);
        }
        None => warn!("Brew ended without a summary, nothing to record"),
    }

    Ok(())
}

fn load_recipe(path: &str) -> Result<Recipe> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read recipe from {}", path))?;
    Recipe::from_json(&json).with_context(|| format!("Invalid recipe in {}", path))
}

fn load_config(path: &str) -> Result<EngineConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path))?;
    EngineConfig::from_json(&json).with_context(|| format!("Invalid config in {}", path))
}

fn default_recipe() -> Recipe {
    Recipe::new(
        "V60 single cup",
        vec![
            RecipeStep::new("Bloom", 30, 50.0).with_instruction("Pour 50ml and swirl gently"),
            RecipeStep::new("First pour", 30, 100.0).with_instruction("Slow spirals to 150ml"),
            RecipeStep::new("Second pour", 30, 100.0).with_instruction("Center pour to 250ml"),
            RecipeStep::new("Drawdown", 45, 0.0).with_instruction("Let it drain"),
        ],
    )
}
