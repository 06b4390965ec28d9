//! Interactive first-run setup wizard (`aura setup`)

use dialoguer::{Confirm, Input, Select};

use crate::config::Settings;
use crate::gateway::InferenceClient;

/// Run the interactive setup wizard
///
/// # Errors
///
/// Returns error if user input fails or the settings file cannot be
/// written.
pub async fn run_setup(existing: Settings) -> anyhow::Result<()> {
    println!("Aura Setup\n");

    let path = crate::config::settings_path_display();
    if path.exists() {
        println!("Existing settings found at {}\n", path.display());
    }

    let mut settings = existing;

    // 1. Backend URL
    settings.base_url = Input::new()
        .with_prompt("Generation backend URL")
        .default(settings.base_url.clone())
        .interact_text()?;
    settings.base_url = settings.base_url.trim_end_matches('/').to_string();

    // 2. Model — offer a live list when the backend is reachable
    let models = match InferenceClient::new(&settings.base_url) {
        Ok(client) => client.list_models().await.unwrap_or_default(),
        Err(_) => Vec::new(),
    };

    if models.is_empty() {
        println!("(backend not reachable, enter a model id manually)");
        settings.model = Input::new()
            .with_prompt("Model id")
            .default(settings.model.clone())
            .interact_text()?;
    } else {
        let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        let default_idx = names
            .iter()
            .position(|&n| n == settings.model || n.starts_with(&settings.model))
            .unwrap_or(0);
        let idx = Select::new()
            .with_prompt("Select a model")
            .items(&names)
            .default(default_idx)
            .interact()?;
        settings.model = names[idx].to_string();
    }

    // 3. Wake phrase
    let phrase: String = Input::new()
        .with_prompt("Wake phrase")
        .default(settings.trigger_phrase().to_string())
        .interact_text()?;
    settings.set_trigger_phrase(&phrase);

    // 4. Sampling temperature
    let temperature: f64 = Input::new()
        .with_prompt("Temperature (0.0-2.0)")
        .default(settings.temperature())
        .interact_text()?;
    settings.set_temperature(temperature);

    // 5. System prompt
    settings.system_prompt = Input::new()
        .with_prompt("System prompt")
        .default(settings.system_prompt.clone())
        .interact_text()?;

    if Confirm::new()
        .with_prompt(format!("Write settings to {}?", path.display()))
        .default(true)
        .interact()?
    {
        settings.save()?;
        println!("Settings saved.");
    } else {
        println!("Nothing written.");
    }

    Ok(())
}
