use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use eyre::{Result, bail};
use log::{debug, info, warn};

use ytscript::{Transcript, TranscriptError, Transcriber};

mod cli;

use cli::{Cli, OutputFormat};

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytscript.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytscript")
        .join("logs")
}

/// Backoff before the retry following `attempt`, doubling up to a cap of ~8.5 minutes
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempt.min(10)))
}

/// Retry with exponential backoff, giving up at once on definitive errors
async fn retry<F, Fut, T>(max_attempts: u32, operation: F) -> std::result::Result<T, TranscriptError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, TranscriptError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) if e.is_definitive() || attempt + 1 >= max_attempts => return Err(e),
            Err(e) => {
                let delay = backoff_delay(attempt);
                debug!("Attempt {} failed: {e}, retrying in {delay:?}", attempt + 1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let cli = Cli::parse();

    // Config file is optional; CLI flags take priority
    let config = ytscript::config::Config::load().unwrap_or_else(|e| {
        warn!("Ignoring config file: {e}");
        Default::default()
    });

    let langs = if cli.lang.is_empty() {
        config.default_lang.clone().unwrap_or_else(|| vec!["en".to_string()])
    } else {
        cli.lang.clone()
    };
    let proxy = cli.proxy.clone().or(config.proxy.clone());
    let format = match (cli.format, config.default_format.as_deref()) {
        (Some(format), _) => format,
        (None, Some(name)) => OutputFormat::from_str(name, true).unwrap_or_else(|_| {
            warn!("Unknown default_format in config: {name}");
            OutputFormat::Text
        }),
        (None, None) => OutputFormat::Text,
    };

    if cli.verbose {
        let config_path = ytscript::config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
    }
    debug!("Languages: {langs:?}, proxy: {proxy:?}, format: {format:?}");

    let transcriber = Transcriber::with_proxy(proxy.as_deref())?;

    // Collect URLs: from arg or stdin
    let urls = if let Some(ref url) = cli.url {
        vec![url.clone()]
    } else {
        let stdin = io::stdin();
        stdin.lock().lines().collect::<Result<Vec<_>, _>>()?
    };

    if urls.is_empty() {
        bail!("no URL or video ID provided\n\nUsage: ytscript <URL>\n       echo <URL> | ytscript");
    }

    for url_input in &urls {
        let url_input = url_input.trim();
        if url_input.is_empty() {
            continue;
        }

        let transcript: Transcript = retry(cli.retries.max(1), || transcriber.fetch(url_input, langs.as_slice())).await?;

        if cli.verbose {
            eprintln!(
                "Video: {}\nLanguage: {}{}\nSegments: {}",
                transcript.video_id,
                transcript.language_code,
                if transcript.is_generated { " (auto-generated)" } else { "" },
                transcript.items.len(),
            );
        }

        let rendered = match format {
            OutputFormat::Text => ytscript::output::render_text(&transcript.items),
            OutputFormat::Json => ytscript::output::render_json(&transcript.items)?,
            OutputFormat::Srt => ytscript::output::render_srt(&transcript.items),
        };

        if let Some(ref path) = cli.output {
            std::fs::write(path, &rendered)?;
            if cli.verbose {
                eprintln!("Output written to: {}", path.display());
            }
        } else {
            println!("{rendered}");
        }
    }

    Ok(())
}
