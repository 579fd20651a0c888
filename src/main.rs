mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use sf_av::{FfprobeProber, ToolRegistry};
use sf_core::config::Config;
use sf_probe::{MediaInfo, Prober};
use sf_stream::{Catalog, ProbeCache, Resolver};

async fn start_server(host: Option<String>, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let mut config = Config::load_or_default(config_path);

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting streamforged");
    tracing::info!(
        "Serving {} on {}:{}",
        config.server.media_root.display(),
        config.server.host,
        config.server.port
    );

    sf_server::start(config).await?;
    Ok(())
}

fn prober(config: &Config) -> Result<FfprobeProber> {
    let tools = ToolRegistry::discover(&config.tools);
    let ffprobe = tools.require("ffprobe")?.to_path_buf();
    Ok(FfprobeProber::new(ffprobe))
}

async fn print_manifest(file: PathBuf, playable: Vec<String>, config: &Config) -> Result<()> {
    let prober: Arc<dyn Prober> = Arc::new(prober(config)?);
    let catalog = Catalog::new(
        Arc::new(ProbeCache::new(prober)),
        Arc::new(Resolver::new(config.streaming.clone())),
    );

    let manifest = catalog
        .manifest(&file, &playable)
        .await
        .with_context(|| format!("Failed to build manifest for {}", file.display()))?;
    tracing::debug!(kind = ?manifest.kind, "Manifest built");
    println!("{}", manifest.xml);
    Ok(())
}

async fn probe_file(file: PathBuf, json: bool, config: &Config) -> Result<()> {
    let prober = prober(config)?;
    let info = prober
        .probe(&file)
        .await
        .with_context(|| format!("Failed to probe {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_media_info(&info);
    }
    Ok(())
}

fn print_media_info(info: &MediaInfo) {
    println!("File: {}", info.file_path.display());
    println!("Duration: {:.3}s", info.duration.as_secs_f64());
    println!("Streams:");
    for stream in &info.streams {
        let mut line = format!(
            "  #{} {} {} ({})",
            stream.index, stream.stream_type, stream.codec_name, stream.codecs
        );
        if let (Some(w), Some(h)) = (stream.width, stream.height) {
            line.push_str(&format!(" {w}x{h}"));
        }
        if let Some(bitrate) = stream.bitrate {
            line.push_str(&format!(" {} kb/s", bitrate / 1000));
        }
        if let Some(lang) = &stream.language {
            line.push_str(&format!(" [{lang}]"));
        }
        println!("{line}");
    }
}

fn check_tools(config: &Config) -> Result<()> {
    let tools = ToolRegistry::discover(&config.tools);
    let results = tools.check_all();

    println!("External Tools Status:");
    println!("======================");

    let mut all_ok = true;
    for tool in &results {
        let status = if tool.available { "✓" } else { "✗" };
        let version = tool.version.as_deref().unwrap_or("not found");
        println!("{} {}: {}", status, tool.name, version);
        if let Some(path) = &tool.path {
            println!("    Path: {}", path.display());
        }
        all_ok &= tool.available;
    }

    if !all_ok {
        anyhow::bail!("Some required tools are missing");
    }
    println!("\nAll tools are available.");
    Ok(())
}

fn validate_config(path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = Config::from_json(&contents)?;

    println!("Configuration is valid.");
    println!("  Listen: {}:{}", config.server.host, config.server.port);
    println!("  Media root: {}", config.server.media_root.display());
    println!(
        "  Segments: {}ms minimum, {}ms transcoded, {} per session",
        config.streaming.min_segment_ms,
        config.streaming.transcode_segment_ms,
        config.streaming.segments_per_session
    );
    println!(
        "  Transcode presets: {} video, {} audio",
        config.streaming.presets.video.len(),
        config.streaming.presets.audio.len()
    );
    println!(
        "  TMDB: {}",
        if config.metadata.tmdb_api_key.is_some() { "enabled" } else { "disabled" }
    );

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  - {warning}");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        match cli.verbose {
            0 => "streamforged=info,sf_server=info,sf_stream=info,sf_metadata=info,tower_http=info",
            1 => "streamforged=debug,sf_server=debug,sf_stream=debug,sf_av=debug,sf_metadata=debug,tower_http=debug",
            _ => "trace",
        }
        .to_string()
    });

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, config_path))?;
        }
        Commands::Manifest { file, playable_codecs } => {
            let config = Config::load_or_default(config_path);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(print_manifest(file, playable_codecs, &config))?;
        }
        Commands::Probe { file, json } => {
            let config = Config::load_or_default(config_path);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(file, json, &config))?;
        }
        Commands::CheckTools => {
            let config = Config::load_or_default(config_path);
            check_tools(&config)?;
        }
        Commands::Validate { config } => {
            let path = config
                .or_else(|| cli.config.clone())
                .context("No config file given (pass a path or --config)")?;
            validate_config(&path)?;
        }
        Commands::Version => {
            println!("streamforged {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
