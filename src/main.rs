mod anchor;
mod augment;
mod categorize;
mod commands;
mod config;
mod crawl;
mod diagnostics;
mod dom;
mod domain;
mod error;
mod fetch;
mod index_file;
mod overlay;
mod parser;
mod query;
mod render;
mod types;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

/// Command line of the `specmonkey` binary.
#[derive(Parser)]
#[command(name = "specmonkey", version, about = "Annotate spec pages with the source code that links to their anchors")]
struct Cli {
    /// Command to run.
    #[command(subcommand)]
    command: Commands,
    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

/// Subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run the annotation chain against a saved page and report what was attached
    Annotate {
        /// Config path or URL (JSON, or TOML when it ends in .toml)
        #[arg(long)]
        config: String,
        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
        /// Hover this fragment's button and print the inlay
        #[arg(long)]
        hover: Option<String>,
        /// Base URL of a pre-built index, overriding the config
        #[arg(long)]
        index_url: Option<String>,
        /// Saved HTML of the page
        #[arg(long)]
        page: PathBuf,
        /// Click this fragment's button and print the pinned box
        #[arg(long)]
        pin: Option<String>,
        /// Log initialization errors and exit 0, as the in-page engine does
        #[arg(long)]
        silent: bool,
        /// Address the page was saved from
        #[arg(long)]
        url: String,
    },
    /// Write a default config file
    CreateConfig {
        /// Where to write it
        path: PathBuf,
    },
    /// Fetch a page's fragment index and save it as <out>/<domain>.json
    ExportIndex {
        /// Config path or URL
        #[arg(long)]
        config: String,
        /// Output directory
        #[arg(long)]
        out: PathBuf,
        /// Address of the page whose domain to index
        #[arg(long)]
        url: String,
    },
    /// Crawl a source checkout and write <out>/<domain>.json for every configured domain it links to
    Index {
        /// Config path or URL
        #[arg(long)]
        config: String,
        /// Root of the source checkout
        source: PathBuf,
        /// Output directory
        out: PathBuf,
    },
    /// Show the search query and extraction pattern for a host
    Query {
        /// Config path or URL
        #[arg(long)]
        config: String,
        /// Host name to match against the configured domains
        #[arg(long)]
        domain: String,
    },
}

/// Report format for `annotate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// JSON document on stdout.
    Json,
    /// One line per fragment.
    Text,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let result = match cli.command {
        Commands::Annotate {
            config,
            format,
            hover,
            index_url,
            page,
            pin,
            silent,
            url,
        } => commands::annotate(&commands::AnnotateArgs {
            config,
            format,
            hover,
            index_url,
            page,
            pin,
            silent,
            url,
        }),
        Commands::CreateConfig { path } => commands::create_config(&path),
        Commands::ExportIndex { config, out, url } => commands::export_index(&config, &url, &out),
        Commands::Index { config, out, source } => commands::index(&config, &source, &out),
        Commands::Query { config, domain } => commands::query(&config, &domain),
    };

    return match result {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::FAILURE
        },
    };
}
