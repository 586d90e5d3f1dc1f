use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the `novella` binary.
#[derive(Debug, Parser)]
#[command(
    name = "novella",
    version,
    about = "Cached client for the novel translation workbench"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "NOVELLA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the backend base URL.
    #[arg(long = "base-url", value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// Override the backend request timeout.
    #[arg(long = "api-timeout-ms", value_name = "MILLIS", global = true)]
    pub api_timeout_ms: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Disable result caching; concurrent identical reads are still shared.
    #[arg(long = "no-cache", global = true)]
    pub no_cache: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List all series, or show one.
    Series(SeriesArgs),
    /// List chapters, optionally for one series.
    Chapters(ChaptersArgs),
    /// List glossary terms in scope.
    Glossary(GlossaryArgs),
    /// Highlight glossary terms in a piece of text.
    Highlight(HighlightArgs),
    /// Translate a chapter paragraph by paragraph.
    Translate(TranslateArgs),
    /// List share links, newest first.
    Shares,
    /// Warm the cache with common reads and print its statistics.
    Stats,
}

#[derive(Debug, Args, Clone)]
pub struct SeriesArgs {
    /// Show only this series.
    #[arg(long = "id", value_name = "ID")]
    pub id: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ChaptersArgs {
    /// Only chapters of this series.
    #[arg(long = "series", value_name = "ID")]
    pub series: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct GlossaryArgs {
    /// Series whose glossary to read.
    #[arg(long = "series", value_name = "ID")]
    pub series: String,

    /// Narrow to terms relevant to one chapter.
    #[arg(long = "chapter", value_name = "ID")]
    pub chapter: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct HighlightArgs {
    #[arg(long = "series", value_name = "ID")]
    pub series: String,

    #[arg(long = "chapter", value_name = "ID")]
    pub chapter: Option<String>,

    /// Text to scan.
    #[arg(value_name = "TEXT")]
    pub text: String,
}

#[derive(Debug, Args, Clone)]
pub struct TranslateArgs {
    /// Chapter to translate.
    #[arg(long = "chapter", value_name = "ID")]
    pub chapter: String,

    /// Paragraphs translated concurrently.
    #[arg(long = "batch-size", default_value_t = 3, value_parser = clap::value_parser!(usize))]
    pub batch_size: usize,
}
