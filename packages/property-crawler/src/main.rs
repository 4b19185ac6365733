use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use property_crawler::{
    ClassifierConfig, CrawlerConfig, CrawlerStorage, FeatureExtractor, HttpFetcher,
    MemoryStorage, NoopEnricher, PageClassifier, PatternLearner, PostgresStorage,
    PropertyCrawler, RecrawlPolicy, ReferenceUrl,
};
use sqlx::postgres::PgPoolOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "property-crawler")]
#[command(about = "Crawl real-estate agency sites for property listings")]
struct Cli {
    /// Classifier phrase lists and thresholds (JSON)
    #[arg(long, global = true)]
    classifier_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl from one or more seed URLs
    Crawl {
        #[arg(required = true)]
        seeds: Vec<String>,

        /// Learned pattern table to classify with
        #[arg(long)]
        patterns: Option<PathBuf>,

        /// Periodically write the pattern table here while crawling
        #[arg(long, requires = "patterns")]
        export_to: Option<PathBuf>,

        /// Cron expression for the pattern export
        #[arg(long, default_value = "0 */15 * * * *")]
        export_cron: String,
    },

    /// Learn URL and content patterns from reference pages
    Train {
        /// JSON array of `{ "url": ..., "label": "property" | "catalog" }`
        references: PathBuf,

        /// Where to write the pattern table; existing patterns are merged
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Drop crawl history older than the given age
    Cleanup {
        #[arg(long, default_value_t = 24 * 30)]
        older_than_hours: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,property_crawler=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = CrawlerConfig::from_env().context("Failed to load crawler configuration")?;
    let classifier_config = match &cli.classifier_config {
        Some(path) => ClassifierConfig::from_file(path)
            .with_context(|| format!("Failed to load classifier config {}", path.display()))?,
        None => ClassifierConfig::default(),
    };

    match cli.command {
        Commands::Crawl {
            seeds,
            patterns,
            export_to,
            export_cron,
        } => {
            let extractor = Arc::new(FeatureExtractor::new(&classifier_config)?);
            let learner = Arc::new(PatternLearner::new(extractor));
            if let Some(path) = &patterns {
                let loaded = learner
                    .load_from_file(path)
                    .await
                    .with_context(|| format!("Failed to load patterns {}", path.display()))?;
                tracing::info!(patterns = loaded, "Loaded pattern table");
            }

            let scheduler = match export_to {
                Some(path) => Some(start_export_job(learner.clone(), path, &export_cron).await?),
                None => None,
            };

            let classifier =
                Arc::new(PageClassifier::new(classifier_config).with_learner(learner));

            match database_url() {
                Some(url) => {
                    let storage = Arc::new(connect_postgres(&url).await?);
                    run_crawl(config, storage, classifier, &seeds).await?;
                }
                None => {
                    tracing::warn!("DATABASE_URL not set, crawl history is kept in memory only");
                    run_crawl(config, Arc::new(MemoryStorage::new()), classifier, &seeds).await?;
                }
            }

            if let Some(mut scheduler) = scheduler {
                scheduler.shutdown().await?;
            }
        }

        Commands::Train { references, output } => {
            let raw = tokio::fs::read_to_string(&references)
                .await
                .with_context(|| format!("Failed to read {}", references.display()))?;
            let references: Vec<ReferenceUrl> =
                serde_json::from_str(&raw).context("Invalid reference list")?;

            let extractor = Arc::new(FeatureExtractor::new(&classifier_config)?);
            let learner = PatternLearner::new(extractor);
            if output.exists() {
                learner.load_from_file(&output).await?;
            }

            let fetcher = HttpFetcher::from_config(&config)?;
            let report = learner.train(&references, &fetcher).await;
            learner.consolidate();
            learner.save_to_file(&output).await?;

            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Cleanup { older_than_hours } => {
            let url = database_url().context("DATABASE_URL must be set for cleanup")?;
            let storage = Arc::new(connect_postgres(&url).await?);
            let policy = RecrawlPolicy::new(storage, &config);
            let removed = policy
                .cleanup_older_than(Duration::from_secs(older_than_hours * 3600))
                .await?;
            tracing::info!(removed, older_than_hours, "Cleaned up crawl history");
        }
    }

    Ok(())
}

fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty())
}

async fn connect_postgres(url: &str) -> Result<PostgresStorage> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("Failed to connect to database")?;
    let storage = PostgresStorage::new(pool);
    storage.migrate().await.context("Failed to run migrations")?;
    Ok(storage)
}

async fn run_crawl<S: CrawlerStorage + 'static>(
    config: CrawlerConfig,
    storage: Arc<S>,
    classifier: Arc<PageClassifier>,
    seeds: &[String],
) -> Result<()> {
    let fetcher = Arc::new(HttpFetcher::from_config(&config)?);
    let crawler = PropertyCrawler::new(config, fetcher, storage, Arc::new(NoopEnricher), classifier)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing in-flight pages");
            on_signal.cancel();
        }
    });

    let stats = crawler.start_crawl(seeds, cancel).await;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

/// Write the pattern table to `path` on a cron schedule.
async fn start_export_job(
    learner: Arc<PatternLearner>,
    path: PathBuf,
    cron: &str,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let learner = learner.clone();
        let path = path.clone();
        Box::pin(async move {
            if let Err(e) = export_patterns(&learner, &path).await {
                tracing::error!("Pattern export failed: {}", e);
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!(cron, "Scheduled pattern table export");
    Ok(scheduler)
}

async fn export_patterns(learner: &PatternLearner, path: &Path) -> Result<()> {
    learner.save_to_file(path).await?;
    tracing::info!(patterns = learner.len(), path = %path.display(), "Exported pattern table");
    Ok(())
}
