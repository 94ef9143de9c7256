use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Select};
use toolcall_core::config::Config;

const BANNER: &str = r"
    -------------------------------------

     t o o l c a l l

     weather · stocks · news · movies
     recipes · images · time · disk

    -------------------------------------
";

const PROVIDERS: [&str; 3] = ["gemini", "openai", "ollama"];

fn print_step(step: usize, total: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, total, title))
            .cyan()
            .bold()
    );
    println!();
}

fn setup_provider() -> Result<&'static str> {
    let selection = Select::new()
        .with_prompt("Select your model provider")
        .items(&PROVIDERS)
        .default(0)
        .interact()
        .context("Failed to select provider")?;

    Ok(PROVIDERS[selection])
}

fn setup_api_key(provider: &str) -> Result<String> {
    if provider == "ollama" {
        return Ok(String::new());
    }

    let api_key: String = Input::new()
        .with_prompt(format!("Enter your {} API key", provider))
        .interact_text()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        return Err(anyhow::anyhow!("API key cannot be empty"));
    }

    Ok(api_key.trim().to_string())
}

fn models_for(provider: &str) -> &'static [&'static str] {
    match provider {
        "openai" => &["gpt-4o", "gpt-4o-mini"],
        "ollama" => &["llama3.2", "qwen2.5"],
        _ => &["gemini-2.0-flash-exp", "gemini-2.0-flash", "gemini-1.5-pro"],
    }
}

fn setup_model(provider: &str) -> Result<String> {
    let models = models_for(provider);

    let selection = Select::new()
        .with_prompt("Select your model")
        .items(models)
        .default(0)
        .interact()
        .context("Failed to select model")?;

    Ok(models[selection].to_string())
}

pub fn run_onboard() -> Result<Config> {
    println!("{}", style(BANNER).cyan().bold());

    println!("  {}", style("Welcome to toolcall!").white().bold());
    println!(
        "  {}",
        style("Pick a model provider and you are ready to chat.").dim()
    );
    println!();

    print_step(1, 3, "Provider");
    let provider = setup_provider()?;

    print_step(2, 3, "API Key Setup");
    let api_key = setup_api_key(provider)?;

    print_step(3, 3, "Model Selection");
    let model = setup_model(provider)?;

    let config = Config {
        provider: Some(provider.to_string()),
        api_key,
        model,
        ..Default::default()
    };

    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!(
        "  {} Config saved to {}",
        style("→").green(),
        style(toolcall_core::config::get_config_path().display()).cyan()
    );
    println!(
        "  {} Tool API keys go in the [tools] section or their environment variables",
        style("→").green()
    );
    println!();
    println!(
        "  {} You can now run: {}",
        style("→").green(),
        style("toolcall chat").cyan().bold()
    );
    println!();

    Ok(config)
}
