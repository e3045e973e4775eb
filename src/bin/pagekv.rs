//! pagekv CLI
//!
//! Create, edit and inspect pages in a local data directory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use pagekv::wal::WalRecovery;
use pagekv::{
    Config, HandleCharset, Page, PageDraft, PageStore, PublishConfig, PublishError, Publisher,
    StoreError, WalSyncStrategy,
};
use tracing_subscriber::{fmt, EnvFilter};

/// pagekv
#[derive(Parser, Debug)]
#[command(name = "pagekv")]
#[command(about = "Embedded page store for anonymous Markdown publishing")]
#[command(version)]
struct Cli {
    /// Data directory
    #[arg(short, long, default_value = "./pagekv_data")]
    data_dir: PathBuf,

    /// fsync the WAL only every N commits instead of on every commit
    #[arg(long)]
    sync_every: Option<usize>,

    /// MemTable size limit in KB before flush
    #[arg(short = 'm', long, default_value = "4096")]
    memtable_kb: usize,

    /// Reject digits in social handles
    #[arg(long)]
    letters_only_handles: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish a new page and print its id and name
    Create(DraftArgs),

    /// Edit an existing page
    Update {
        /// Secret id issued at creation
        #[arg(long)]
        id: String,

        /// Public page name
        #[arg(long)]
        name: String,

        #[command(flatten)]
        draft: DraftArgs,
    },

    /// Show a page by its public name
    View { name: String },

    /// Show a page by its secret id
    Lookup { id: String },

    /// Print the plain-text sitemap
    Sitemap {
        /// Site root, e.g. https://publish.example
        #[arg(long, default_value = "http://localhost:8080")]
        base_url: String,
    },

    /// Merge all SSTables into one
    Compact,

    /// Check the WAL without modifying it
    VerifyWal,
}

#[derive(Args, Debug)]
struct DraftArgs {
    #[arg(long)]
    title: String,

    /// Markdown content
    #[arg(long, default_value = "", conflicts_with = "file")]
    content: String,

    /// Read Markdown content from a file
    #[arg(long)]
    file: Option<PathBuf>,

    #[arg(long, default_value = "")]
    author: String,

    #[arg(long, default_value = "")]
    website: String,

    #[arg(long, default_value = "")]
    twitter: String,

    #[arg(long, default_value = "")]
    github: String,

    #[arg(long, default_value = "")]
    facebook: String,

    #[arg(long, default_value = "")]
    instagram: String,
}

impl DraftArgs {
    fn into_draft(self) -> std::io::Result<PageDraft> {
        let content = match &self.file {
            Some(path) => std::fs::read_to_string(path)?,
            None => self.content,
        };
        Ok(PageDraft::new(self.title, content)
            .author(self.author)
            .website(self.website)
            .twitter(self.twitter)
            .github(self.github)
            .facebook(self.facebook)
            .instagram(self.instagram))
    }
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pagekv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_fault() {
                tracing::error!("{}", e);
            } else {
                eprintln!("{}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PublishError> {
    let wal_sync_strategy = match cli.sync_every {
        Some(count) => WalSyncStrategy::EveryNEntries { count },
        None => WalSyncStrategy::EveryWrite,
    };
    let config = Config::builder()
        .data_dir(&cli.data_dir)
        .wal_sync_strategy(wal_sync_strategy)
        .memtable_size_limit(memtable_limit(cli.memtable_kb)?)
        .build();
    let publish_config = PublishConfig {
        handle_charset: if cli.letters_only_handles {
            HandleCharset::LettersOnly
        } else {
            HandleCharset::LettersAndDigits
        },
        ..PublishConfig::default()
    };

    // Inspecting the WAL must not go through Engine::open, which repairs it
    if let Commands::VerifyWal = cli.command {
        return verify_wal(&cli.data_dir);
    }

    let store = Arc::new(PageStore::open(config)?);
    let publisher = Publisher::new(Arc::clone(&store)).with_config(publish_config);

    match cli.command {
        Commands::Create(args) => {
            let page = publisher.create(args.into_draft().map_err(StoreError::from)?)?;
            println!("id:   {}", page.id);
            println!("name: {}", page.name);
        }
        Commands::Update { id, name, draft } => {
            let draft = draft.into_draft().map_err(StoreError::from)?;
            let page = publisher.update(&id, &name, draft)?;
            println!("updated {} at {}", page.name, page.updated_at.to_rfc3339());
        }
        Commands::View { name } => match publisher.view(&name)? {
            Some(page) => print_page(&page),
            None => return Err(PublishError::NotFound("This page name does not exist.")),
        },
        Commands::Lookup { id } => match publisher.lookup(&id)? {
            Some(page) => print_page(&page),
            None => return Err(PublishError::NotFound("This page Id does not exist.")),
        },
        Commands::Sitemap { base_url } => print!("{}", publisher.sitemap(&base_url)?),
        Commands::Compact => {
            store.engine().compact()?;
            println!("sstables: {}", store.engine().sstable_count());
        }
        Commands::VerifyWal => verify_wal(&cli.data_dir)?,
    }

    drop(publisher);
    if let Ok(store) = Arc::try_unwrap(store) {
        store.close()?;
    }
    Ok(())
}

/// Convert the `--memtable-kb` flag to bytes
fn memtable_limit(kb: usize) -> Result<usize, StoreError> {
    kb.checked_mul(1024).ok_or_else(|| {
        StoreError::Config(format!("--memtable-kb {} overflows the memtable size limit", kb))
    })
}

fn verify_wal(data_dir: &Path) -> Result<(), PublishError> {
    let wal_path = data_dir.join("wal.log");
    if !wal_path.exists() {
        println!("no WAL at {}", wal_path.display());
        return Ok(());
    }
    let result = WalRecovery::verify(&wal_path)?;
    println!("{:#?}", result);
    Ok(())
}

fn print_page(page: &Page) {
    println!("name:    {}", page.name);
    println!("title:   {}", page.title);
    println!("author:  {}", page.author);
    for (label, value) in [
        ("website", &page.website),
        ("twitter", &page.twitter),
        ("github", &page.github),
        ("facebook", &page.facebook),
        ("instagram", &page.instagram),
    ] {
        if let Some(value) = value {
            println!("{:<9}{}", format!("{}:", label), value);
        }
    }
    println!("created: {}", page.created_at.to_rfc3339());
    println!("updated: {}", page.updated_at.to_rfc3339());
    println!();
    println!("{}", page.html);
}
