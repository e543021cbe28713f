use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tw_core::{ArticleStore, Error, Result};
use tw_crawler::{init_logging, CrawlArgs, CrawlController, JobRegistry, RunOrigin, ScheduleInterval, CRAWL_JOB};
use tw_storage::StorageKind;
use tw_web::analytics::{self, GroupBy};
use tw_web::AppState;

const STORAGE_CHECK_RETRIES: u32 = 3;
const STORAGE_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(author, version, about = "Collect articles from a tag page and report on them", long_about = None)]
pub struct Cli {
    /// Storage backend: memory or sqlite
    #[arg(long, env = "TAGWATCH_STORAGE", default_value = "sqlite")]
    storage: StorageKind,
    /// Backend url, e.g. sqlite://articles.db
    #[arg(long, env = "TAGWATCH_DATABASE_URL")]
    database_url: Option<String>,
    /// Collection (table) holding the articles
    #[arg(long, env = "TAGWATCH_COLLECTION")]
    collection: Option<String>,
    #[command(flatten)]
    crawl: CrawlArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run one crawl session now
    Crawl,
    /// Crawl periodically until interrupted
    Schedule {
        /// Interval in hours: 1, 2, 5, 12 or 24
        #[arg(long, default_value = "24")]
        every: ScheduleInterval,
        /// Also crawl once right away
        #[arg(long)]
        now: bool,
    },
    /// Serve the dashboard API
    Serve {
        #[arg(long, env = "TAGWATCH_ADDR", default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
        /// Activate the periodic crawl at startup
        #[arg(long)]
        every: Option<ScheduleInterval>,
    },
    /// Print word and volume statistics
    Stats {
        #[arg(long, default_value_t = analytics::DEFAULT_TOP_WORDS)]
        top: usize,
        #[arg(long, default_value = "daily")]
        group_by: GroupBy,
    },
}

async fn check_storage(storage: &Arc<dyn ArticleStore>, storage_type: &str) -> Result<()> {
    let total = storage.count().await?;
    info!("🏦 Storage backend initialized successfully (using {}, {} articles)", storage_type, total);
    Ok(())
}

async fn check_storage_with_retry(
    storage: &Arc<dyn ArticleStore>,
    storage_type: &str,
    max_retries: u32,
    timeout: Duration,
) -> Result<()> {
    let mut retries = 0;
    loop {
        let error = match tokio::time::timeout(timeout, check_storage(storage, storage_type)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e,
            Err(_) => Error::Storage(format!("Storage health check timed out after {:?}", timeout)),
        };
        retries += 1;
        if retries >= max_retries {
            return Err(error);
        }
        warn!("Storage health check failed ({}), retrying {}/{}...", error, retries, max_retries);
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
}

async fn open_storage(cli: &Cli) -> Result<Arc<dyn ArticleStore>> {
    let storage = tw_storage::create_storage(
        cli.storage,
        cli.database_url.as_deref(),
        cli.collection.as_deref(),
    )
    .await?;
    check_storage_with_retry(&storage, &cli.storage.to_string(), STORAGE_CHECK_RETRIES, STORAGE_CHECK_TIMEOUT).await?;
    Ok(storage)
}

fn print_report(report: &tw_crawler::CrawlReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

async fn print_stats(storage: &Arc<dyn ArticleStore>, top: usize, group_by: GroupBy) -> Result<()> {
    let articles = storage.list_articles().await?;
    println!("📚 Total articles in store: {}", articles.len());

    let contents = articles.iter().map(|a| a.content.as_str()).filter(|c| !c.is_empty());
    let words = analytics::top_words(contents, top);
    if words.is_empty() {
        println!("No article content to analyse yet.");
        return Ok(());
    }

    println!("\n🔍 Top {} words", words.len());
    for (rank, word) in words.iter().enumerate() {
        println!("{:>3}. {:<24} {}", rank + 1, word.word, word.count);
    }

    let volume = analytics::crawl_volume(&articles, group_by);
    if let (Some(first), Some(last)) = (volume.first(), volume.last()) {
        println!("\n📆 Articles per {:?} period, {} to {}", group_by, first.period, last.period);
        for entry in &volume {
            println!("  {}  {}", entry.period, entry.count);
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    let logger = init_logging().with_prefix("🦗".to_string());
    let cli = Cli::parse();

    if let Commands::Stats { top, group_by } = cli.command {
        let storage = open_storage(&cli).await?;
        return print_stats(&storage, top, group_by).await;
    }

    // A bad template or selector fails before the store is touched
    let config = cli.crawl.to_config()?;
    let storage = open_storage(&cli).await?;

    let controller = Arc::new(CrawlController::with_http(config, storage)?);
    logger.info(&format!("Crawling {}", controller.config().listing_url));

    match cli.command {
        Commands::Crawl => {
            let report = controller.run(RunOrigin::Manual).await?;
            print_report(&report)?;
        }
        Commands::Schedule { every, now } => {
            let registry = JobRegistry::new();
            registry.schedule(CRAWL_JOB, every, controller.clone()).await;
            if now {
                let report = controller.run(RunOrigin::Manual).await?;
                print_report(&report)?;
            }
            logger.info(&format!("Next crawl in {}, press Ctrl-C to stop", every));
            shutdown_signal().await;
            registry.shutdown().await;
        }
        Commands::Serve { addr, every } => {
            let registry = Arc::new(JobRegistry::new());
            if let Some(every) = every {
                registry.schedule(CRAWL_JOB, every, controller.clone()).await;
            }

            let app = tw_web::create_app(AppState::new(controller, registry.clone()));
            let listener = tokio::net::TcpListener::bind(addr).await?;
            logger.info(&format!("📊 Dashboard API listening on http://{}", addr));
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            registry.shutdown().await;
        }
        Commands::Stats { .. } => {}
    }

    Ok(())
}
