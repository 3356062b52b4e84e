use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use agrimedia::monitoring::ReportFormat;

#[derive(Parser)]
#[command(name = "agrimedia")]
#[command(author, version, about = "Image retrieval and caching engine for agricultural marketplaces")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show component health
    Health {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a metrics snapshot as JSON
    Metrics {
        /// Trailing window in minutes
        #[arg(long, default_value = "60")]
        window_mins: i64,
    },

    /// Render a monitoring report
    Report {
        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: FormatArg,

        /// Trailing window in minutes
        #[arg(long, default_value = "60")]
        window_mins: i64,
    },

    /// Clear the image cache
    ClearCache,

    /// Resolve an image request and print the descriptor(s)
    Fetch {
        #[command(subcommand)]
        request: FetchRequest,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum FetchRequest {
    /// Hero image for a theme
    Theme {
        /// Theme name (default theme if omitted)
        name: Option<String>,
    },

    /// Images for a marketplace category
    Category {
        #[arg(required = true)]
        name: String,

        /// Number of images (1-50)
        #[arg(short = 'n', long, default_value = "6")]
        count: usize,
    },

    /// Background image for a page section
    Section {
        #[arg(required = true)]
        name: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Json,
    Text,
    Markdown,
    Csv,
}

impl From<FormatArg> for ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => ReportFormat::Json,
            FormatArg::Text => ReportFormat::Text,
            FormatArg::Markdown => ReportFormat::Markdown,
            FormatArg::Csv => ReportFormat::Csv,
        }
    }
}

/// Commands that run against a [`MediaEngine`](agrimedia::engine::MediaEngine)
/// inside the tokio runtime.
pub enum EngineCommand {
    Health { json: bool },
    Metrics { window_mins: i64 },
    Report { format: ReportFormat, window_mins: i64 },
    ClearCache,
    Fetch(FetchRequest),
}

/// Where a parsed command gets executed.
pub enum Dispatch {
    /// Validate a config file without building the engine.
    Validate(Option<PathBuf>),
    Version,
    Engine(EngineCommand),
}

impl Commands {
    pub fn dispatch(self) -> Dispatch {
        match self {
            Commands::Validate { config } => Dispatch::Validate(config),
            Commands::Version => Dispatch::Version,
            Commands::Health { json } => Dispatch::Engine(EngineCommand::Health { json }),
            Commands::Metrics { window_mins } => {
                Dispatch::Engine(EngineCommand::Metrics { window_mins })
            }
            Commands::Report {
                format,
                window_mins,
            } => Dispatch::Engine(EngineCommand::Report {
                format: format.into(),
                window_mins,
            }),
            Commands::ClearCache => Dispatch::Engine(EngineCommand::ClearCache),
            Commands::Fetch { request } => Dispatch::Engine(EngineCommand::Fetch(request)),
        }
    }
}
