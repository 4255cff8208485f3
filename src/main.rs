mod cli;

use streamforge::{config, server, streaming::SourceFile};
use streamforge_av::tools::get_tool_path;
use streamforge_av::{check_tools as detect_tools, FfprobeProber, Prober};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

async fn start_server(host: String, port: u16, config_path: Option<&Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI
    config.server.host = host;
    config.server.port = port;

    tracing::info!("Starting Streamforge server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );
    tracing::info!("Stream cache at {:?}", config.library.cache_dir);

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "streamforge=trace,streamforge_av=debug,streamforge_media=debug,tower_http=debug"
                .to_string()
        } else {
            "streamforge=info,streamforge_av=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Probe { file, json } => probe_file(&file, json, cli.config.as_deref()),
        Commands::CheckTools => check_tools(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("streamforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let ffprobe = get_tool_path("ffprobe", config.transcode.ffprobe_path.as_deref())
        .context("ffprobe not found")?;
    let prober = FfprobeProber::new(ffprobe);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let media_info = rt.block_on(prober.probe(file))?;

    if json {
        let json_str = serde_json::to_string_pretty(&media_info)?;
        println!("{}", json_str);
        return Ok(());
    }

    println!("File: {}", media_info.file_path.display());
    println!("Container: {}", media_info.container);
    println!("Size: {} bytes", media_info.file_size);
    if let Some(ref duration) = media_info.duration {
        let secs = duration.as_secs();
        let mins = secs / 60;
        let hours = mins / 60;
        println!("Duration: {:02}:{:02}:{:02}", hours, mins % 60, secs % 60);
    }

    println!("\nVideo Tracks: {}", media_info.video_tracks.len());
    for (i, track) in media_info.video_tracks.iter().enumerate() {
        print!("  [{}] {} {}x{}", i, track.codec, track.width, track.height);
        if let Some(fps) = track.frame_rate {
            print!(", {:.3} fps", fps);
        }
        println!();
    }

    println!("\nAudio Tracks: {}", media_info.audio_tracks.len());
    for (i, track) in media_info.audio_tracks.iter().enumerate() {
        print!("  [{}] {} {}ch", i, track.codec, track.channels);
        if let Some(ref lang) = track.language {
            print!(" ({})", lang);
        }
        println!();
    }

    let source = SourceFile::from_media_info("", &media_info);
    println!("\nStreaming:");
    println!("  Segments: {}", source.timeline().segment_count());
    println!(
        "  Audio: {}",
        if source.has_audio() {
            "transcoded"
        } else {
            "none (video only)"
        }
    );
    println!("  DASH frame rate: {}", source.dash_frame_rate());

    Ok(())
}

fn check_tools() -> Result<()> {
    println!("Checking external tools...\n");

    let tools = detect_tools();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Streaming needs both ffmpeg and ffprobe.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Library paths: {}", config.library.paths.len());
            println!("  Cache dir: {}", config.library.cache_dir.display());
            println!(
                "  Default resolution: {}",
                config.transcode.max_streaming_transcode_size
            );
            println!(
                "  Hardware acceleration: {}",
                match (&config.transcode.hardware_codec, config.transcode.hardware_acceleration) {
                    (Some(codec), true) => codec.as_str(),
                    (None, true) => "enabled (no codec)",
                    (_, false) => "disabled",
                }
            );
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Cache dir: {}", config.library.cache_dir.display());
        }
    }

    Ok(())
}
