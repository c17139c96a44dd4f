//! Minerva CLI
//!
//! Multi-agent scam detection for message screenshots.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use minerva_agents::{
    create_anthropic_backend, create_backend, AnthropicConfig, OpenAIBackendConfig, RoleConfig,
    SharedBackend,
};
use minerva_core::{ImageInput, DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_MAX_TURNS};
use minerva_runtime::{predict, AnalysisRecord, Minerva, PipelineConfig, ResultStore};
use minerva_safety::{LinkSafetyChecker, SafetyConfig, UrlSafety};

const DEFAULT_DB: &str = "sqlite://minerva.db";

#[derive(Parser)]
#[command(name = "minerva")]
#[command(author, version, about = "Minerva: multi-agent scam detection for message screenshots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a screenshot of a message
    Analyze {
        /// Screenshot to analyze (PNG, JPEG, WebP, GIF)
        image: PathBuf,

        /// LLM model to use
        #[arg(short, long, default_value = "gpt-4o")]
        model: String,

        /// OpenAI API key (or set OPENAI_API_KEY env var)
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Anthropic API key (or set ANTHROPIC_API_KEY env var)
        #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
        anthropic_key: Option<String>,

        /// OpenRouter API key (or set OPENROUTER_API_KEY env var)
        #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
        openrouter_key: Option<String>,

        /// Use Anthropic instead of OpenAI
        #[arg(long, conflicts_with = "openrouter")]
        anthropic: bool,

        /// Use OpenRouter instead of OpenAI
        #[arg(long)]
        openrouter: bool,

        /// Safe Browsing API key (or set SAFEBROWSING_API_KEY env var)
        #[arg(long, env = "SAFEBROWSING_API_KEY", hide_env_values = true)]
        safebrowsing_key: Option<String>,

        /// Role instructions file (defaults to the built-in instructions)
        #[arg(long)]
        agents: Option<PathBuf>,

        /// Maximum number of agent turns
        #[arg(long, default_value_t = DEFAULT_MAX_TURNS)]
        max_turns: u32,

        /// Maximum tool round-trips within one agent turn
        #[arg(long, default_value_t = DEFAULT_MAX_TOOL_ROUNDS)]
        max_tool_rounds: u32,

        /// End the run early when an agent emits this text
        #[arg(long)]
        stop_signal: Option<String>,

        /// Results database (or set MINERVA_DB env var)
        #[arg(long, env = "MINERVA_DB", default_value = DEFAULT_DB)]
        db: String,

        /// Do not save the verdict
        #[arg(long)]
        no_save: bool,
    },

    /// Check a single URL against the threat service
    CheckUrl {
        url: String,

        /// Safe Browsing API key (or set SAFEBROWSING_API_KEY env var)
        #[arg(long, env = "SAFEBROWSING_API_KEY", hide_env_values = true)]
        safebrowsing_key: Option<String>,
    },

    /// List the most recent saved verdicts
    History {
        /// Number of results to show
        #[arg(short = 'k', long, default_value = "10")]
        limit: u32,

        /// Results database (or set MINERVA_DB env var)
        #[arg(long, env = "MINERVA_DB", default_value = DEFAULT_DB)]
        db: String,
    },

    /// Show one saved verdict
    Show {
        id: i64,

        /// Results database (or set MINERVA_DB env var)
        #[arg(long, env = "MINERVA_DB", default_value = DEFAULT_DB)]
        db: String,
    },
}

/// Reasoning provider selection
struct ProviderArgs {
    model: String,
    api_key: Option<String>,
    anthropic_key: Option<String>,
    openrouter_key: Option<String>,
    anthropic: bool,
    openrouter: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Best effort: a missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Analyze {
            image,
            model,
            api_key,
            anthropic_key,
            openrouter_key,
            anthropic,
            openrouter,
            safebrowsing_key,
            agents,
            max_turns,
            max_tool_rounds,
            stop_signal,
            db,
            no_save,
        } => {
            let provider = ProviderArgs {
                model,
                api_key,
                anthropic_key,
                openrouter_key,
                anthropic,
                openrouter,
            };
            let mut config = PipelineConfig::default()
                .with_max_turns(max_turns)
                .with_max_tool_rounds(max_tool_rounds);
            if let Some(signal) = stop_signal.as_deref() {
                config = config.with_stop_signal(signal);
            }
            let db = if no_save { None } else { Some(db) };

            run_analysis(&image, provider, safebrowsing_key, agents, config, db).await?;
        }
        Commands::CheckUrl {
            url,
            safebrowsing_key,
        } => {
            check_url(&url, safebrowsing_key).await?;
        }
        Commands::History { limit, db } => {
            show_history(&db, limit).await?;
        }
        Commands::Show { id, db } => {
            show_result(&db, id).await?;
        }
    }

    Ok(())
}

fn create_reasoning_backend(args: &ProviderArgs) -> Result<(SharedBackend, &'static str)> {
    if args.anthropic {
        let key = args.anthropic_key.as_deref().ok_or_else(|| {
            anyhow!("Anthropic API key required. Set ANTHROPIC_API_KEY or use --anthropic-key")
        })?;
        Ok((create_anthropic_backend(AnthropicConfig::new(key, &args.model))?, "Anthropic"))
    } else if args.openrouter {
        let key = args.openrouter_key.as_deref().ok_or_else(|| {
            anyhow!("OpenRouter API key required. Set OPENROUTER_API_KEY or use --openrouter-key")
        })?;
        Ok((create_backend(OpenAIBackendConfig::openrouter(key, &args.model))?, "OpenRouter"))
    } else {
        // Default: OpenAI
        let key = args.api_key.as_deref().ok_or_else(|| {
            anyhow!("OpenAI API key required. Set OPENAI_API_KEY or use --api-key")
        })?;
        Ok((create_backend(OpenAIBackendConfig::openai(key, &args.model))?, "OpenAI"))
    }
}

fn create_checker(safebrowsing_key: Option<String>) -> Result<Arc<dyn UrlSafety>> {
    let config = SafetyConfig::default().with_api_key(safebrowsing_key);
    Ok(Arc::new(LinkSafetyChecker::new(config)?))
}

fn load_image(path: &Path) -> Result<ImageInput> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() != mime_guess::mime::IMAGE {
        bail!("{} does not look like an image ({})", path.display(), mime);
    }

    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if data.is_empty() {
        bail!("{} is empty", path.display());
    }

    Ok(ImageInput::new(mime.essence_str(), data))
}

async fn run_analysis(
    image_path: &Path,
    provider: ProviderArgs,
    safebrowsing_key: Option<String>,
    agents: Option<PathBuf>,
    config: PipelineConfig,
    db: Option<String>,
) -> Result<()> {
    println!("🦉 Minerva - Multi-agent scam detection\n");

    let image = load_image(image_path)?;
    let (backend, provider_name) = create_reasoning_backend(&provider)?;

    let roles = match &agents {
        Some(path) => RoleConfig::load_from_path(path)
            .with_context(|| format!("Failed to load role instructions from {}", path.display()))?,
        None => RoleConfig::load_embedded()?,
    };

    let checker = create_checker(safebrowsing_key)?;
    let minerva = Minerva::new(config, &roles, backend, checker)?;

    let store = match &db {
        Some(url) => match ResultStore::open(url).await {
            Ok(store) => Some(store),
            Err(e) => {
                println!("⚠️  Result store unavailable ({}), verdict will not be saved\n", e);
                None
            }
        },
        None => None,
    };

    println!("📡 Provider: {} | Model: {}", provider_name, provider.model);
    println!("🖼️  Image: {} ({} bytes)", image_path.display(), image.data.len());
    println!(
        "🤖 Agents: {} | Max turns: {}\n",
        minerva
            .agents()
            .iter()
            .map(|a| a.id())
            .collect::<Vec<_>>()
            .join(" → "),
        minerva.config().max_turns
    );

    let updates = predict(&minerva, image, store.as_ref());
    futures::pin_mut!(updates);

    while let Some(update) = updates.next().await {
        if let Some(turn) = update.latest.as_deref().filter(|t| !t.is_empty()) {
            println!("{}\n", turn);
            println!("{}", "-".repeat(60));
        }

        if update.is_final() {
            println!("\n{}", "=".repeat(60));
            println!("🔎 Verdict:\n");
            println!("{}", update.text);
        }
    }

    Ok(())
}

async fn check_url(url: &str, safebrowsing_key: Option<String>) -> Result<()> {
    println!("🔗 Checking {}...\n", url);

    let checker = create_checker(safebrowsing_key)?;
    let result = checker.check(url).await?;

    if result.is_flagged() {
        println!("🚨 {}", result.verdict);
        for m in &result.matches {
            println!("   {} → {}", m.threat_type, m.matched_url);
        }
    } else {
        println!("✅ {}", result.verdict);
    }

    Ok(())
}

fn print_record(record: &AnalysisRecord) {
    let label = if record.is_scam { "🚨 SCAM" } else { "✅ NOT SCAM" };
    let confidence = record
        .confidence_level
        .map(|c| format!("{}%", c))
        .unwrap_or_else(|| "n/a".to_string());

    println!(
        "#{} | {} | {} | confidence {}",
        record.id, record.created_at, label, confidence
    );
}

async fn show_history(db: &str, limit: u32) -> Result<()> {
    let store = ResultStore::open(db).await?;
    let records = store.top_k(limit).await?;
    debug!("Loaded {} results", records.len());

    if records.is_empty() {
        println!("📭 No saved results.");
        return Ok(());
    }

    println!("📊 Last {} results:\n", records.len());
    for record in &records {
        print_record(record);
        if let Some(summary) = &record.summary {
            let preview: String = summary.chars().take(120).collect();
            println!("   {}", preview.replace('\n', " "));
        }
    }

    Ok(())
}

async fn show_result(db: &str, id: i64) -> Result<()> {
    let store = ResultStore::open(db).await?;
    let record = store
        .get_result(id)
        .await?
        .ok_or_else(|| anyhow!("No result with id {}", id))?;

    print_record(&record);
    println!("\n{}", record.text);

    Ok(())
}
