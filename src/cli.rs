use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Srt,
}

#[derive(Parser)]
#[command(name = "ytscript", about = "YouTube transcript fetcher", version)]
pub struct Cli {
    /// YouTube video URL or video ID (reads from stdin if omitted)
    pub url: Option<String>,

    /// Preferred caption language, repeat for fallbacks in order [default: en]
    #[arg(short, long)]
    pub lang: Vec<String>,

    /// Route all requests through this proxy (http, https or socks5 URL)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Output format: text (default), json, srt
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Attempts for failures that may be transient
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Show which caption track was used
    #[arg(short, long)]
    pub verbose: bool,
}
