//! Clauseguard — clause-level risk analysis for consumer agreements

mod input;
mod render;

use anyhow::Context;
use clap::{Parser, Subcommand};
use clauseguard_core::config::AnalyzerConfig;
use clauseguard_engine::{
    CascadeOrchestrator, DocumentAnalyzer, MemoryCache, Stage1Classifier, Stage2Analyzer,
};
use clauseguard_llm::{AnthropicProvider, HttpEmbeddingClient, HttpSimilarityStore};
use clauseguard_signals::{
    semantic::default_template_specs, CompoundRiskDetector, IndicatorLibrary, IndicatorMatcher,
    PrevalenceEstimator, SemanticRiskMatcher,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "clauseguard",
    about = "Clauseguard — flags anomalous and risky clauses in legal documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Offline scan: lexical indicators, compound patterns, severity. No network.
    Scan {
        /// Document JSON file ({document_id, clauses: [...]})
        #[arg(short, long)]
        input: PathBuf,
        /// Config TOML (defaults apply if missing)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Emit the raw report as JSON instead of the summary table
        #[arg(long)]
        json: bool,
    },
    /// Full analysis: signals, prevalence, semantic matching, and the
    /// two-stage explanation cascade.
    Analyze {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Write the default config TOML
    InitConfig {
        /// Target path (default: clauseguard.toml)
        path: Option<PathBuf>,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clauseguard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { input, config, json } => {
            let config = load_config(config)?;
            let document = input::load_document(&input)
                .with_context(|| format!("loading document {}", input.display()))?;
            let report = input::offline_scan(&document, &config);
            print_report(&report, json)?;
        }

        Commands::Analyze { input, config, json } => {
            let config = load_config(config)?;
            let document = input::load_document(&input)
                .with_context(|| format!("loading document {}", input.display()))?;
            let analyzer = build_analyzer(&config).await?;

            let cancel = CancellationToken::new();
            let ctrl_c_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received — finishing in-flight clauses");
                    ctrl_c_cancel.cancel();
                }
            });

            let report = analyzer
                .analyze_document(&document.document_id, document.clauses(), cancel)
                .await?;
            print_report(&report, json)?;
        }

        Commands::InitConfig { path } => {
            let path = path.unwrap_or_else(|| PathBuf::from("clauseguard.toml"));
            std::fs::write(&path, AnalyzerConfig::default().to_toml())?;
            println!("wrote {}", path.display());
        }

        Commands::Version => {
            println!("clauseguard v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<AnalyzerConfig> {
    let config = match path {
        Some(p) => AnalyzerConfig::load(&p),
        None => AnalyzerConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn print_report(report: &clauseguard_core::types::AnomalyReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", render::render_report(report));
    }
    Ok(())
}

/// Wire the full pipeline from environment-provided service endpoints.
async fn build_analyzer(config: &AnalyzerConfig) -> anyhow::Result<DocumentAnalyzer> {
    let api_key = std::env::var("ANTHROPIC_API_KEY")
        .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY is required for analyze"))?;
    let embeddings_url = std::env::var("CLAUSEGUARD_EMBEDDINGS_URL")
        .map_err(|_| anyhow::anyhow!("CLAUSEGUARD_EMBEDDINGS_URL is required for analyze"))?;
    let similarity_url = std::env::var("CLAUSEGUARD_SIMILARITY_URL")
        .map_err(|_| anyhow::anyhow!("CLAUSEGUARD_SIMILARITY_URL is required for analyze"))?;

    let completion = Arc::new(AnthropicProvider::new(api_key));

    let mut embedder = HttpEmbeddingClient::new(embeddings_url, config.models.embedding_model.clone());
    if let Ok(key) = std::env::var("CLAUSEGUARD_EMBEDDINGS_API_KEY") {
        embedder = embedder.with_api_key(key);
    }
    let embedder: Arc<dyn clauseguard_llm::EmbeddingProvider> = Arc::new(embedder);

    let mut store = HttpSimilarityStore::new(similarity_url);
    if let Ok(key) = std::env::var("CLAUSEGUARD_SIMILARITY_API_KEY") {
        store = store.with_api_key(key);
    }

    let matcher = IndicatorMatcher::new(
        IndicatorLibrary::default(),
        config.indicators.min_clause_chars,
    );
    let estimator = PrevalenceEstimator::new(Arc::new(store), config.prevalence.clone());
    let semantic = SemanticRiskMatcher::build(
        embedder.as_ref(),
        default_template_specs(),
        config.semantic.match_threshold,
    )
    .await?;

    let stage1 = Arc::new(Stage1Classifier::new(
        completion.clone(),
        config.models.stage1_model.clone(),
        config.cascade.stage1_usd_per_1k_tokens,
    ));
    let stage2 = Arc::new(Stage2Analyzer::new(
        completion,
        config.models.stage2_model.clone(),
        config.cascade.stage2_usd_per_1k_tokens,
    ));
    let orchestrator = Arc::new(CascadeOrchestrator::new(
        stage1,
        stage2,
        Arc::new(MemoryCache::new()),
        config.cascade.clone(),
        config.runtime.call_timeout_secs,
    ));

    Ok(DocumentAnalyzer::new(
        embedder,
        matcher,
        estimator,
        semantic,
        CompoundRiskDetector::default(),
        orchestrator,
        config.clone(),
    ))
}
