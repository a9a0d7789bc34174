mod channels;
mod cleanup;
mod config;
mod http;
mod logging;
mod progress;
mod prompt;
mod retry;
mod rpc;

use crate::config::{AppConfig, ConfigError, LoadedConfig, chunk_size_bytes};
use crate::progress::BarProgress;
use crate::prompt::{PromptDecider, prompt_optional, prompt_optional_u32, prompt_with_default};
use crate::retry::{retry, total_retry_sleep_seconds};
use crate::rpc::RpcClient;
use anyhow::{Context, Result, anyhow, bail};
use chanvid::{
    BatchSummary, FixedDecision, PartialPolicy, ResumableDownloader, ResumeDecider, StopSignal,
    VideoExtractor,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

const DEFAULT_MAX_RETRIES: usize = 10;

#[derive(Parser)]
#[command(
    name = "chanvid",
    version = env!("CARGO_PKG_VERSION"),
    about = "Download videos from a channel's recent history, resuming partial files",
    disable_version_flag = true
)]
struct Cli {
    /// Path to custom configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override maximum retry attempts for directory and history calls
    #[arg(long, global = true)]
    retries: Option<usize>,
    /// Debug logging (CHANVID_LOG wins when set)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List joined channels and chats
    Channels,
    /// Download the videos from one page of a channel's history
    Download {
        /// Channel id or @username (numbered menu when omitted)
        #[arg(long)]
        channel: Option<String>,
        /// Output directory
        #[arg(long)]
        out: Option<PathBuf>,
        /// Number of recent messages to scan
        #[arg(long)]
        limit: Option<u32>,
        /// What to do with partially downloaded files: ask, continue, new or skip
        #[arg(long)]
        on_partial: Option<PartialPolicy>,
        /// Request size in KiB (multiple of 4, at most 1024)
        #[arg(long)]
        chunk_size: Option<u32>,
    },
    /// Display the currently configured defaults
    Config,
    /// Interactive configuration helper
    Setup,
    /// Display chanvid version information
    Version,
}

struct DownloadArgs {
    channel: Option<String>,
    out: Option<PathBuf>,
    limit: Option<u32>,
    on_partial: Option<PartialPolicy>,
    chunk_size: Option<u32>,
}

fn main() -> Result<()> {
    let Cli {
        config,
        retries,
        verbose,
        command,
    } = Cli::parse();
    logging::setup_logging(verbose);

    let loaded_config = config::load_config(config.as_deref())?;
    let retry_attempts = resolve_retries(retries, &loaded_config.data);
    let env_lookup = |key: &str| std::env::var(key).ok();

    match command {
        Command::Channels => {
            let app_config = effective_config(&loaded_config.data, env_lookup)?;
            list_channels(&app_config, retry_attempts)
        }
        Command::Download {
            channel,
            out,
            limit,
            on_partial,
            chunk_size,
        } => {
            let app_config = effective_config(&loaded_config.data, env_lookup)?;
            download(
                &app_config,
                retry_attempts,
                DownloadArgs {
                    channel,
                    out,
                    limit,
                    on_partial,
                    chunk_size,
                },
            )
        }
        Command::Config => match effective_config(&loaded_config.data, env_lookup) {
            Ok(app_config) => show_config(&loaded_config, &app_config, None, config.as_deref()),
            Err(err) => show_config(
                &loaded_config,
                &loaded_config.data,
                Some(&err),
                config.as_deref(),
            ),
        },
        Command::Setup => run_setup(config.as_deref(), &loaded_config.data),
        Command::Version => {
            println!("{}", version_summary());
            Ok(())
        }
    }
}

/// File values with the environment applied on top. Only the commands that
/// talk to the gateway need this to succeed.
fn effective_config<F>(file: &AppConfig, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = file.clone();
    config.apply_env_overrides(lookup)?;
    Ok(config)
}

fn version_summary() -> String {
    format!(
        "chanvid: {}\nOS/Arch: {}/{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

fn connect(config: &AppConfig, retries: usize) -> Result<RpcClient> {
    let credentials = config.credentials()?;
    let client = RpcClient::new(&config.api_url(), credentials)?;
    let me = retry("session check", retries, || Ok(client.get_self()?))
        .context("not signed in; check session_token and the gateway")?;
    info!("Logged in as {}", me.display_name());
    Ok(client)
}

fn list_channels(config: &AppConfig, retries: usize) -> Result<()> {
    let client = connect(config, retries)?;
    let channels = channels::fetch_channels(&client, retries)?;
    channels::print_channels(&channels);
    Ok(())
}

fn download(config: &AppConfig, retries: usize, args: DownloadArgs) -> Result<()> {
    let policy = match args.on_partial {
        Some(policy) => policy,
        None => config.partial_policy()?,
    };
    let chunk_size = chunk_size_bytes(
        args.chunk_size
            .or(config.chunk_size_kib)
            .unwrap_or(config::DEFAULT_CHUNK_SIZE_KIB),
    )?;
    let output_dir = args.out.unwrap_or_else(|| config.output_dir());
    let limit = args
        .limit
        .filter(|limit| *limit > 0)
        .unwrap_or_else(|| config.history_limit());

    let client = connect(config, retries)?;
    let channels = channels::fetch_channels(&client, retries)?;
    if channels.is_empty() {
        println!("No joined channels found.");
        return Ok(());
    }
    let channel = match args.channel.as_deref() {
        Some(query) => channels::find_channel(&channels, query)
            .cloned()
            .ok_or_else(|| anyhow!("channel '{}' is not among the joined channels", query))?,
        None => match channels::select_channel(&channels)? {
            Some(channel) => channel,
            None => {
                println!("No channel selected.");
                return Ok(());
            }
        },
    };

    info!(channel = %channel.display_name(), limit, "fetching history");
    let messages = retry("fetch history", retries, || {
        Ok(client.get_history(&channel, limit)?)
    })?
    .into_messages();

    let stop = StopSignal::new();
    cleanup::install_signal_handler(stop.clone());

    let fixed;
    let interactive;
    let decider: &dyn ResumeDecider = match policy.fixed_action() {
        Some(action) => {
            fixed = FixedDecision(action);
            &fixed
        }
        None => {
            interactive = PromptDecider::stdio();
            &interactive
        }
    };
    let progress = BarProgress::new();
    let downloader = ResumableDownloader::new(&client).with_chunk_size(chunk_size);
    let summary = VideoExtractor::new(downloader, decider)
        .with_progress(&progress)
        .with_stop_signal(stop)
        .process(&messages, &output_dir)?;

    print_summary(&summary, &output_dir);
    if summary.cancelled {
        cleanup::report_preserved(&cleanup::take_partial_files(), "Download stopped");
    }
    if !summary.failed.is_empty() {
        bail!("{} of {} video(s) failed", summary.failed.len(), summary.found);
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary, output_dir: &Path) {
    println!();
    println!("Output dir : {}", output_dir.display());
    println!("Videos     : {}", summary.found);
    println!(
        "Downloaded : {} ({} resumed)",
        summary.downloaded, summary.resumed
    );
    println!("Skipped    : {}", summary.skipped);
    println!("Failed     : {}", summary.failed.len());
    for failure in &summary.failed {
        println!(
            "  message {} -> {}: {}",
            failure.message_id,
            failure.path.display(),
            failure.error
        );
    }
}

fn resolve_retries(retry_arg: Option<usize>, config: &AppConfig) -> usize {
    retry_arg
        .filter(|value| *value > 0)
        .or_else(|| {
            config
                .max_retries
                .filter(|value| *value > 0)
                .map(|value| value as usize)
        })
        .unwrap_or(DEFAULT_MAX_RETRIES)
}

fn run_setup(path_override: Option<&Path>, current: &AppConfig) -> Result<()> {
    let api_url_default = current.api_url.as_deref().unwrap_or(config::DEFAULT_API_URL);
    let api_url = prompt_with_default("Gateway URL", api_url_default)?;
    let api_id = prompt_optional_u32(
        "API id (APP_ID overrides)",
        current.api_id.and_then(|id| u32::try_from(id).ok()),
        |value| i32::try_from(value).is_ok(),
    )?;
    let api_hash = prompt_optional("API hash (APP_HASH overrides)", current.api_hash.as_deref())?;
    let session_token = prompt_optional("Session token", current.session_token.as_deref())?;
    let output_default = current
        .output_dir
        .as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| config::DEFAULT_OUTPUT_DIR.to_string());
    let output_dir = prompt_with_default("Output directory", &output_default)?;
    let chunk_size_kib = prompt_optional_u32(
        "Chunk size in KiB (blank to keep/default, '-' to clear)",
        current.chunk_size_kib,
        |value| chunk_size_bytes(value).is_ok(),
    )?;
    let history_limit = prompt_optional_u32(
        "Messages to scan per run (blank to keep/default, '-' to clear)",
        current.history_limit,
        |value| value > 0,
    )?;
    let max_retries = prompt_optional_u32(
        "Max retry attempts (blank to keep/default, '-' to clear)",
        current.max_retries,
        |value| value > 0,
    )?;
    let policy_default = current.on_partial.as_deref().unwrap_or("ask");
    let on_partial = loop {
        let answer = prompt_with_default("Partial files (ask/continue/new/skip)", policy_default)?;
        match answer.parse::<PartialPolicy>() {
            Ok(policy) => break policy,
            Err(err) => println!("{err}"),
        }
    };

    let new_config = AppConfig {
        api_url: Some(api_url),
        api_id: api_id.and_then(|id| i32::try_from(id).ok()),
        api_hash,
        session_token,
        output_dir: Some(PathBuf::from(output_dir)),
        chunk_size_kib,
        history_limit,
        max_retries,
        on_partial: Some(on_partial.to_string()),
    };

    let saved_path = config::save_config(path_override, &new_config)?;
    println!();
    println!("Saved configuration to {}", saved_path.display());
    println!("Tip: pass --config to use a different configuration path.");
    Ok(())
}

fn show_config(
    loaded: &LoadedConfig,
    effective: &AppConfig,
    env_error: Option<&ConfigError>,
    override_path: Option<&Path>,
) -> Result<()> {
    if let Some(path) = override_path {
        println!("--config arg    : {}", path.display());
    }
    if let Some(err) = env_error {
        println!("Environment     : ignored ({})", err);
    }

    match &loaded.source {
        Some(path) => {
            if loaded.existed {
                println!("Config file     : {} (loaded)", path.display());
            } else {
                println!(
                    "Config file     : {} (missing, using defaults)",
                    path.display()
                );
            }
        }
        None => println!("Config file     : <none> (built-in defaults)"),
    }

    println!("Gateway URL     : {}", effective.api_url());
    println!(
        "API id          : {}",
        effective
            .api_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "<not set>".to_string())
    );
    println!(
        "API hash        : {}",
        if effective.api_hash.as_deref().is_some_and(|hash| !hash.is_empty()) {
            "<set>"
        } else {
            "<not set>"
        }
    );
    println!(
        "Session token   : {}",
        if effective.session_token.as_deref().is_some_and(|token| !token.is_empty()) {
            "<set>"
        } else {
            "<not set>"
        }
    );
    println!("Output dir      : {}", effective.output_dir().display());
    let chunk_kib = effective
        .chunk_size_kib
        .unwrap_or(config::DEFAULT_CHUNK_SIZE_KIB);
    match chunk_size_bytes(chunk_kib) {
        Ok(_) => println!("Chunk size      : {} KiB", chunk_kib),
        Err(err) => println!("Chunk size      : {} KiB (invalid: {})", chunk_kib, err),
    }
    println!("History limit   : {}", effective.history_limit());
    match effective.partial_policy() {
        Ok(policy) => println!("Partial files   : {}", policy),
        Err(err) => println!("Partial files   : invalid ({})", err),
    }
    let retries = resolve_retries(None, effective);
    let sleep_secs = total_retry_sleep_seconds(retries);
    println!("Max retries     : {} (max sleep ~{}s)", retries, sleep_secs);
    Ok(())
}
