use anyhow::{anyhow, Context, Result};
use clap::Parser;
use dialoguer::{Input, Select};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use termreel::utils::format_duration;
use tokio::sync::oneshot;
use termreel::{
    open_video, AssetLibrary, Cli, FfmpegExtractor, FrameSource, PlaybackOutcome, Player,
    Renderer, RodioDevice,
};

/// Ask the user for a video, width and fallback frame rate
fn prompt_for_video(cli: &mut Cli, library: &AssetLibrary) -> Result<PathBuf> {
    let videos = library.list_videos().unwrap_or_else(|e| {
        warn!("Could not list {}: {}", library.root().display(), e);
        Vec::new()
    });

    let input = if videos.is_empty() {
        println!("No videos found in assets folder: {}", library.root().display());
        println!("You can add videos there or enter a full path.");
        Input::<String>::new()
            .with_prompt("Video filename or path")
            .interact_text()?
    } else {
        let mut items = videos.clone();
        items.push("Enter a filename or path...".to_string());
        let selection = Select::new()
            .with_prompt("Choose a video from the assets folder")
            .default(0)
            .items(&items)
            .interact()?;

        match videos.get(selection) {
            Some(name) => name.clone(),
            None => Input::<String>::new()
                .with_prompt("Video filename or path")
                .interact_text()?,
        }
    };

    cli.width = Input::new()
        .with_prompt("Terminal width")
        .default(cli.width)
        .interact_text()?;
    cli.fps = Some(
        Input::new()
            .with_prompt("FPS when the video reports none (0 = default)")
            .default(cli.fps.unwrap_or(0))
            .interact_text()?,
    );

    Ok(library.resolve(input.trim()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    info!("Starting termreel v{}", termreel::VERSION);

    let library = AssetLibrary::new(cli.assets.clone());
    if let Err(e) = library.ensure_exists() {
        warn!("Could not create assets folder {}: {}", library.root().display(), e);
    }

    let video_path = match cli.video.clone() {
        Some(video) => library.resolve(&video),
        None if atty::is(atty::Stream::Stdin) => prompt_for_video(&mut cli, &library)?,
        None => {
            error!("No video given and stdin is not interactive");
            std::process::exit(1);
        }
    };

    if let Err(e) = cli.validate(&video_path) {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let source = match open_video(&video_path) {
        Ok(source) => source,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let video = source.info().clone();
    info!(
        "Video info: {}x{}, {} FPS, {} duration",
        video.width,
        video.height,
        video
            .frame_rate
            .map_or_else(|| "unknown".to_string(), |fps| format!("{:.2}", fps)),
        format_duration(video.duration)
    );

    if cli.info {
        let json = serde_json::to_string_pretty(&video).context("Failed to serialize video info")?;
        println!("{}", json);
        return Ok(());
    }

    debug!("Source frame rate: {:?}", source.frame_rate());

    let config = cli.playback_config(video_path);
    let mut player = Player::new(
        config,
        FfmpegExtractor::with_program(cli.ffmpeg.clone()),
        Arc::new(RodioDevice),
        Renderer::new(),
    );

    // Listen for Ctrl+C before playback starts so the audio extraction
    // phase is covered too
    let (interrupt_tx, interrupt_rx) = oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = interrupt_tx.send(());
            }
            Err(e) => warn!("Could not listen for Ctrl+C: {}", e),
        }
    });
    let interrupt = async move {
        if interrupt_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    match player.play(source, interrupt).await {
        Ok(report) => {
            if report.outcome == PlaybackOutcome::Interrupted {
                println!("\nVideo playback interrupted.");
            }
            info!(
                "Played {} frames{}",
                report.frames_rendered,
                if report.audio_played { " with audio" } else { "" }
            );
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            Err(anyhow!("playback failed"))
        }
    }
}
