use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use aura_assistant::avatar::AvatarState;
use aura_assistant::speech::{
    ConsoleRecognizer, ConsoleSynthesizer, DisabledRecognizer, SpeechEngine,
};
use aura_assistant::{ChatOrchestrator, InferenceClient, Settings, prompt};

/// Aura - voice-driven chat client for local language models
#[derive(Parser)]
#[command(name = "aura", version, about)]
struct Cli {
    /// Disable voice input, reading typed messages instead
    #[arg(long, env = "AURA_TEXT_ONLY")]
    text: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List models available on the backend
    Models,
    /// Run a single one-shot generation
    Ask {
        /// Prompt text
        prompt: String,
    },
    /// Extract structured JSON for a task (playground)
    Extract {
        /// Task description
        task: String,
        /// Override the sampling temperature
        #[arg(short, long)]
        temperature: Option<f64>,
    },
    /// Generate a short constrained reply (playground)
    Brief {
        /// Task instruction
        instruction: String,
        /// Override the sampling temperature
        #[arg(short, long)]
        temperature: Option<f64>,
    },
    /// Generate content in a persona's voice (playground)
    Persona {
        /// Persona description (e.g. "a weary ship's captain")
        persona: String,
        /// Output format (e.g. "a letter home")
        format: String,
        /// Required sections, in order
        #[arg(short, long)]
        section: Vec<String>,
        /// Override the sampling temperature
        #[arg(short, long)]
        temperature: Option<f64>,
    },
    /// Answer a question from supplied context only (playground)
    Grounded {
        /// Question to answer
        question: String,
        /// Context the answer must come from
        #[arg(short, long)]
        context: String,
        /// Override the sampling temperature
        #[arg(short, long)]
        temperature: Option<f64>,
    },
    /// Show or change settings
    Settings {
        /// Apply key=value pairs (base-url, model, system-prompt,
        /// temperature, trigger-phrase)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },
    /// Interactive first-run setup
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,aura_assistant=info",
        1 => "info,aura_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load();

    if let Some(command) = cli.command {
        return match command {
            Command::Models => cmd_models(&settings).await,
            Command::Ask { prompt } => cmd_ask(&settings, &prompt).await,
            Command::Extract { task, temperature } => {
                let client = connect(&settings)?;
                let value =
                    prompt::extract_structured(&client, &settings.model, &task, temperature)
                        .await?;
                println!("{}", serde_json::to_string_pretty(&value)?);
                Ok(())
            }
            Command::Brief {
                instruction,
                temperature,
            } => {
                let client = connect(&settings)?;
                let reply =
                    prompt::short_text(&client, &settings.model, &instruction, temperature)
                        .await?;
                println!("{reply}");
                Ok(())
            }
            Command::Persona {
                persona,
                format,
                section,
                temperature,
            } => {
                let client = connect(&settings)?;
                let sections: Vec<&str> = section.iter().map(String::as_str).collect();
                let sections = (!sections.is_empty()).then_some(sections.as_slice());
                let reply = prompt::persona_content(
                    &client,
                    &settings.model,
                    &persona,
                    &format,
                    sections,
                    temperature,
                )
                .await?;
                println!("{reply}");
                Ok(())
            }
            Command::Grounded {
                question,
                context,
                temperature,
            } => {
                let client = connect(&settings)?;
                let reply = prompt::grounded_answer(
                    &client,
                    &settings.model,
                    &context,
                    &question,
                    temperature,
                )
                .await?;
                println!("{reply}");
                Ok(())
            }
            Command::Settings { set } => cmd_settings(settings, &set),
            Command::Setup => aura_assistant::setup::run_setup(settings).await,
        };
    }

    if cli.text {
        run_text_repl(settings).await
    } else {
        run_voice_loop(settings).await
    }
}

fn connect(settings: &Settings) -> anyhow::Result<InferenceClient> {
    InferenceClient::new(&settings.base_url).map_err(Into::into)
}

/// Voice assistant loop on the console speech backend
async fn run_voice_loop(settings: Settings) -> anyhow::Result<()> {
    let client = Arc::new(connect(&settings)?);

    let (speech_tx, speech_rx) = mpsc::channel(64);
    let speech = SpeechEngine::spawn(
        ConsoleRecognizer::new(),
        ConsoleSynthesizer::new(),
        settings.trigger_phrase(),
        speech_tx,
    );

    let trigger = settings.trigger_phrase().to_string();
    let (chat, mut avatar) = ChatOrchestrator::spawn(settings, client, speech, speech_rx);

    println!("Type \"{trigger} ...\" to wake me, then type your command.");
    println!("Ctrl-C to exit.\n");
    render_avatar(*avatar.borrow());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = avatar.changed() => {
                if changed.is_err() {
                    break;
                }
                render_avatar(*avatar.borrow());
                if let Some(status) = chat.status().await {
                    if let Some(reason) = status.permission_error {
                        eprintln!("voice input unavailable: {reason}");
                    }
                }
            }
        }
    }

    println!("\nbye");
    Ok(())
}

/// Text-only REPL over the same conversation path
async fn run_text_repl(settings: Settings) -> anyhow::Result<()> {
    use tokio::io::{AsyncBufReadExt, BufReader};

    let client = Arc::new(connect(&settings)?);

    let (speech_tx, speech_rx) = mpsc::channel(64);
    let speech = SpeechEngine::spawn(
        DisabledRecognizer,
        ConsoleSynthesizer::new(),
        settings.trigger_phrase(),
        speech_tx,
    );

    let (chat, mut avatar) = ChatOrchestrator::spawn(settings, client, speech, speech_rx);

    println!("Text mode. Type a message, Ctrl-C or Ctrl-D to exit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        if let Err(e) = chat.submit_text(line).await {
            eprintln!("{e}");
            continue;
        }

        // Wait for the reply to finish playing before prompting again.
        while *avatar.borrow() != AvatarState::Resting {
            if avatar.changed().await.is_err() {
                return Ok(());
            }
        }
    }

    println!("\nbye");
    Ok(())
}

fn render_avatar(state: AvatarState) {
    println!("{} [{}]", state.glyph(), state.label());
}

async fn cmd_models(settings: &Settings) -> anyhow::Result<()> {
    let client = connect(settings)?;

    let models = match client.list_models().await {
        Ok(models) => models,
        Err(e) => {
            eprintln!("cannot reach the backend at {}: {e}", settings.base_url);
            return Err(e.into());
        }
    };

    if models.is_empty() {
        println!("no models installed");
        return Ok(());
    }

    for model in models {
        println!(
            "{:<40} {:>10}  {}",
            model.name,
            bytesize::ByteSize(model.size_bytes).to_string(),
            model.modified_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

async fn cmd_ask(settings: &Settings, prompt: &str) -> anyhow::Result<()> {
    let client = connect(settings)?;
    let reply = client
        .generate_once(&settings.model, prompt, settings.temperature(), None)
        .await?;
    println!("{}", reply.trim());
    Ok(())
}

fn cmd_settings(mut settings: Settings, set: &[String]) -> anyhow::Result<()> {
    if !set.is_empty() {
        for entry in set {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("expected KEY=VALUE, got {entry:?}"))?;
            apply_setting(&mut settings, key, value)?;
        }
        settings.save()?;
        println!("Settings saved.\n");
    }

    println!("base-url:       {}", settings.base_url);
    println!("model:          {}", settings.model);
    println!("temperature:    {}", settings.temperature());
    println!("trigger-phrase: {}", settings.trigger_phrase());
    println!("system-prompt:  {}", settings.system_prompt);
    println!(
        "\nfile: {}",
        aura_assistant::config::settings_path_display().display()
    );
    Ok(())
}

fn apply_setting(settings: &mut Settings, key: &str, value: &str) -> anyhow::Result<()> {
    match key {
        "base-url" => settings.base_url = value.trim_end_matches('/').to_string(),
        "model" => settings.model = value.to_string(),
        "system-prompt" => settings.system_prompt = value.to_string(),
        "temperature" => settings.set_temperature(value.parse()?),
        "trigger-phrase" => settings.set_trigger_phrase(value),
        other => anyhow::bail!("unknown setting {other:?}"),
    }
    Ok(())
}
