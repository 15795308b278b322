//! Caroumate CLI
//!
//! Generates, edits, lists and exports carousels from the terminal.
//!
//! Usage:
//!   caroumate generate "5 habits of productive people" --niche Productivity --magic
//!   caroumate list
//!   caroumate export <CAROUSEL_ID> --out ./exports

mod commands;
mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use caroumate::persistence::LocalStore;
use caroumate::{AppContext, GeminiClient, Orchestrator, PersistenceGateway, SupabaseGateway};

use crate::progress::BarSink;

const LOCAL_OWNER: &str = "local";

#[derive(Parser)]
#[command(
    name = "caroumate",
    about = "Generate social media carousels with AI",
    version
)]
struct Args {
    /// Settings directory (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Gemini API key, overriding the saved one
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Supabase project URL; without it carousels are kept locally
    #[arg(long, env = "SUPABASE_URL", global = true)]
    supabase_url: Option<String>,

    /// Supabase anon key
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true, global = true)]
    supabase_anon_key: Option<String>,

    /// Signed-in user's access token
    #[arg(long, env = "SUPABASE_ACCESS_TOKEN", hide_env_values = true, global = true)]
    supabase_access_token: Option<String>,

    /// Owner ID for remote carousels
    #[arg(long, env = "CAROUMATE_USER_ID", global = true)]
    user_id: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PartArg {
    Headline,
    Body,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DirectionArg {
    Left,
    Right,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a new carousel from a topic
    Generate {
        topic: String,
        #[arg(short, long)]
        niche: Option<String>,
        /// 1:1, 4:5, 9:16 or 16:9
        #[arg(short, long, default_value = "1:1")]
        aspect_ratio: String,
        /// Minimalist, Bold, Elegant, Playful, Corporate or Vibrant
        #[arg(short, long, default_value = "Minimalist")]
        style: String,
        /// Also generate an image for every slide
        #[arg(short, long)]
        magic: bool,
    },
    /// Generate an image for every slide
    Images { carousel: String },
    /// Generate a video for every slide
    Videos { carousel: String },
    /// Generate an image for one slide (1-based number or slide ID)
    Image { carousel: String, slide: String },
    /// Generate a video for one slide
    Video { carousel: String, slide: String },
    /// Edit a slide's image with an instruction
    EditImage {
        carousel: String,
        slide: String,
        instruction: String,
    },
    /// Rewrite a slide's headline or body
    Regenerate {
        carousel: String,
        slide: String,
        #[arg(short, long, value_enum, default_value = "headline")]
        part: PartArg,
    },
    /// Write a social caption for a carousel
    Caption { carousel: String },
    /// Rewrite a carousel as a text thread
    Thread { carousel: String },
    /// Apply an AI design suggestion
    Suggest { carousel: String },
    /// Apply the saved brand kit
    Brand { carousel: String },
    /// Move a slide left or right
    Move {
        carousel: String,
        slide: String,
        #[arg(value_enum)]
        direction: DirectionArg,
    },
    /// List saved carousels
    List,
    /// Delete one carousel
    Delete { carousel: String },
    /// Delete every carousel
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// Export a carousel as a zip of slide images
    Export {
        carousel: String,
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Move local carousels into the Supabase store
    Migrate,
    /// Show or change settings
    Settings {
        #[arg(long)]
        set_api_key: Option<String>,
        /// gemini-2.5-flash (flash) or gemini-3-pro-preview (pro)
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        system_prompt: Option<String>,
    },
}

/// Everything a command needs.
pub struct App {
    pub context: AppContext,
    pub orchestrator: Orchestrator,
    pub remote: Option<(Arc<SupabaseGateway>, String)>,
    pub bar: BarSink,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "caroumate=debug" } else { "caroumate=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn config_dir(args: &Args) -> anyhow::Result<PathBuf> {
    match &args.config_dir {
        Some(dir) => Ok(dir.clone()),
        None => dirs::config_dir()
            .map(|d| d.join("caroumate"))
            .context("No config directory on this platform. Use --config-dir."),
    }
}

fn remote_gateway(args: &Args) -> anyhow::Result<Option<(Arc<SupabaseGateway>, String)>> {
    let (Some(url), Some(anon_key)) = (&args.supabase_url, &args.supabase_anon_key) else {
        return Ok(None);
    };
    let owner = args
        .user_id
        .clone()
        .filter(|u| !u.is_empty())
        .context("CAROUMATE_USER_ID is required with a Supabase project")?;
    let gateway = SupabaseGateway::new(url, anon_key, args.supabase_access_token.as_deref())?;
    Ok(Some((Arc::new(gateway), owner)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let context = AppContext::load(config_dir(&args)?)?;
    let mut settings = context.settings.clone();
    if let Some(key) = args.api_key.as_ref().filter(|k| !k.is_empty()) {
        settings = settings.with_api_key(key.clone());
    }

    let remote = remote_gateway(&args)?;
    let (gateway, owner) = match &remote {
        Some((gateway, owner)) => (gateway.clone() as Arc<dyn PersistenceGateway>, owner.clone()),
        None => {
            let local: Arc<dyn PersistenceGateway> = Arc::new(LocalStore::open(context.history_path())?);
            (local, LOCAL_OWNER.to_string())
        }
    };

    let bar = BarSink::new()?;
    let orchestrator = Orchestrator::new(Arc::new(GeminiClient::new()?), gateway, owner, settings)
        .with_profile(context.profile.clone())
        .with_progress(Arc::new(bar.clone()));

    let mut app = App {
        context,
        orchestrator,
        remote,
        bar,
    };
    commands::run(&mut app, args.command).await
}
