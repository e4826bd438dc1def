mod builder;
mod config;
mod error;
mod fetch;
mod model;
mod probe;

use anyhow::Result;
use clap::Parser;
use log::error;
use std::path::PathBuf;
use crate::builder::{BuildOptions, EntryBuilder, Overrides};
use crate::config::load_config;
use crate::fetch::{IconCache, MetadataFetcher};
use crate::probe::VersionProber;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate .desktop files", long_about = None)]
struct Args {
    /// Executable, URL or directory to create an entry for
    #[arg(value_name = "PATH")]
    paths: Vec<String>,

    /// Icon for the entry
    #[arg(short, long)]
    icon: Option<PathBuf>,

    /// Command to execute the application
    #[arg(long)]
    exec: Option<String>,

    /// Display name
    #[arg(short, long)]
    name: Option<String>,

    #[arg(long)]
    comment: Option<String>,

    #[arg(long)]
    generic_name: Option<String>,

    /// Comma separated, e.g. `Development,IDE`
    #[arg(long, value_delimiter = ',')]
    categories: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    keywords: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    mime_type: Vec<String>,

    #[arg(long)]
    startup_wm_class: Option<String>,

    /// Run the application in a terminal
    #[arg(long)]
    terminal: bool,

    /// Hide the entry from menus
    #[arg(long)]
    no_display: bool,

    /// Output file, or directory to write `<Name>.desktop` into
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write keys for absent fields with empty values
    #[arg(long)]
    keep_empty: bool,

    /// Print each written entry as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            name: self.name.clone(),
            icon: self.icon.clone(),
            exec: self.exec.clone(),
            comment: self.comment.clone(),
            generic_name: self.generic_name.clone(),
            categories: self.categories.clone(),
            keywords: self.keywords.clone(),
            mime_type: self.mime_type.clone(),
            startup_wm_class: self.startup_wm_class.clone(),
            terminal: self.terminal.then_some(true),
            no_display: self.no_display.then_some(true),
        }
    }
}

fn init_logging() {
    let level = if std::env::var_os("DEBUG").is_some() { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Processes every input in order. A failed input is logged and skipped.
/// Returns the number of entries written.
async fn process_all(builder: &EntryBuilder<'_>, paths: &[String], json: bool) -> usize {
    let mut written = 0;
    for p in paths {
        match builder.build_and_save(p).await {
            Ok((entry, _)) => {
                written += 1;
                if json {
                    match serde_json::to_string_pretty(&entry) {
                        Ok(s) => println!("{}", s),
                        Err(e) => error!("Error encoding {} as JSON: {}", p, e),
                    }
                }
            }
            Err(e) => error!("Error creating .desktop file for {}: {}", p, e),
        }
    }
    written
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    // 1. Load Config
    let mut config = load_config()?;
    if args.keep_empty {
        config.output.keep_empty = true;
    }

    // 2. Shared context, built once for all inputs
    let prober = VersionProber::new(&config.probe);
    let fetcher = MetadataFetcher::new(&config.fetch, IconCache::from_project_dirs()?)?;
    let options = BuildOptions {
        overrides: args.overrides(),
        output: args.output.clone(),
        output_config: config.output.clone(),
    };
    let builder = EntryBuilder::new(&prober, &fetcher, &options);

    // 3. Run
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(process_all(&builder, &args.paths, args.json));

    Ok(())
}
