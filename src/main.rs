use clap::{Parser, Subcommand};
use scene_crawler::cache::DownloadCache;
use scene_crawler::config::{self, Credentials, CrawlerConfig};
use scene_crawler::discovery::{RedditSource, Source};
use scene_crawler::http::{ReqwestTransport, Transport};
use scene_crawler::imaging::RustBackend;
use scene_crawler::output;
use scene_crawler::pipeline::Pipeline;
use scene_crawler::process::{ProcessConfig, Processor};
use scene_crawler::resolve::ResolverRegistry;
use scene_crawler::store::PostStore;
use scene_crawler::types::SceneCollection;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scene-crawler")]
#[command(about = "Collect side-by-side stereo photos from Reddit")]
#[command(long_about = "\
Collect side-by-side stereo photos from Reddit

Reads the top posts of a community (r/crossview by default), resolves each
post's link to direct image URLs, downloads the images, and keeps the ones
shaped like a side-by-side stereo pair.

Files:

  crawler.toml          # Optional config (see 'scene-crawler gen-config')
  drop/
  ├── posts.json        # Discovered posts (resume point for 'run')
  └── i.redd.it_k3x9.jpg  # Cached downloads, named after their URL
  out/
  └── posts.json        # Accepted posts with image URL, file, and size

Resolvers:
  i.redd.it, i.imgur.com         direct image links
  imgur.com                      single images and albums
  reddit.com                     galleries and crossposts

Set REDDIT_CLIENT_ID, REDDIT_CLIENT_SECRET, REDDIT_USERNAME and
REDDIT_PASSWORD to read listings through the OAuth API.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = "crawler.toml", global = true)]
    config: PathBuf,

    /// More diagnostics on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch top posts and write the discovered snapshot
    Discover,
    /// Resolve, download, and validate discovered posts
    Run {
        /// Discover again instead of resuming from the discovered snapshot
        #[arg(long)]
        fresh: bool,
        /// Stop after resolving links: no downloads, no accepted snapshot
        #[arg(long)]
        skip_processing: bool,
    },
    /// Print a stock crawler.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Discover => {
            let config = config::load_config(&cli.config)?;
            let transport = build_transport(&config)?;
            discover(&config, transport.as_ref())?;
        }
        Command::Run {
            fresh,
            skip_processing,
        } => {
            let config = config::load_config(&cli.config)?;
            let transport = build_transport(&config)?;
            let discovered = if fresh {
                discover(&config, transport.as_ref())?
            } else {
                let store = PostStore::new(config.discovered_snapshot_path());
                let collection = store.load()?;
                println!(
                    "Resuming with {} posts from {}",
                    collection.len(),
                    store.path().display()
                );
                collection
            };
            run(&config, transport, &discovered, skip_processing)?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Diagnostics go to stderr so stdout stays the report.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "scene_crawler=error",
        1 => "scene_crawler=info",
        _ => "scene_crawler=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_transport(config: &CrawlerConfig) -> Result<Arc<dyn Transport>, Box<dyn std::error::Error>> {
    let transport = ReqwestTransport::new(&config.source.user_agent, config.network.timeout())?;
    Ok(Arc::new(transport))
}

/// Stage 1: list posts and persist them as the discovered snapshot.
fn discover(
    config: &CrawlerConfig,
    transport: &dyn Transport,
) -> Result<SceneCollection, Box<dyn std::error::Error>> {
    let credentials = Credentials::from_env();
    info!(
        subreddit = %config.source.subreddit,
        oauth = credentials.is_some(),
        "discovering posts"
    );
    let source = RedditSource::new(transport, credentials);
    let collection = SceneCollection::new(source.discover(&config.discovery_query())?);

    let store = PostStore::new(config.discovered_snapshot_path());
    store.save(&collection)?;
    output::print_discovery(&collection, store.path());
    Ok(collection)
}

/// Stages 2–4, with progress printed as posts complete.
fn run(
    config: &CrawlerConfig,
    transport: Arc<dyn Transport>,
    discovered: &SceneCollection,
    skip_processing: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    init_thread_pool(&config.processing);

    let processor = Processor::new(
        Arc::new(RustBackend::new()),
        ProcessConfig::from_crawler_config(config),
    );
    let pipeline = Pipeline::new(
        ResolverRegistry::with_defaults(),
        transport,
        DownloadCache::new(&config.paths.download_dir),
        processor,
        config.pipeline.fan_out,
    );

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_event(&event) {
                println!("{}", line);
            }
        }
    });

    if skip_processing {
        let report = pipeline.resolve_all(discovered, Some(tx));
        printer.join().map_err(|_| "output thread panicked")?;
        output::print_summary(&report.stats, None);
        return Ok(());
    }

    let result = pipeline.run(discovered, Some(tx));
    printer.join().map_err(|_| "output thread panicked")?;

    let accepted_path = config.accepted_snapshot_path();
    PostStore::new(&accepted_path).save(&result.accepted)?;
    output::print_summary(&result.stats, Some(&accepted_path));
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
