use ai_storyteller::config::Config;
use ai_storyteller::delivery::{self, ResultSlot};
use ai_storyteller::generator::StoryPipeline;
use ai_storyteller::init;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "ai-storyteller", about = "Turn a topic into a short narrated video")]
struct Args {
    /// What the video should be about, e.g. "a lighthouse at dusk".
    topic: String,

    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Directory the video, image archive and previews are written to.
    #[arg(long, default_value = "output")]
    out: PathBuf,

    /// Scenes whose media may be generated at the same time.
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let args = Args::parse();
    if args.topic.trim().is_empty() {
        anyhow::bail!("Please enter a topic for the video.");
    }

    let mut cfg = Config::load(&args.config).await?;
    if let Some(n) = args.concurrency {
        cfg.media_concurrency = n;
        cfg.validate()?;
    }

    init::ensure_output_dir(&args.out).await?;
    if !init::check_encoder(&cfg.ffmpeg_bin).await {
        eprintln!("[WARNING] FFmpeg not found in PATH. Please install FFmpeg.");
    }

    let pipeline = StoryPipeline::from_config(&cfg)
        .context("Failed to set up generation services")?
        .with_progress(Arc::new(|percent: u8| eprintln!("[PROGRESS] {}%", percent)));

    let mut slot = ResultSlot::new();
    let result = slot.store(pipeline.run(&args.topic).await);

    let files = delivery::export(result, &args.out)
        .await
        .context("Failed to export results")?;
    if let Some(video) = &files.video {
        println!("Video: {}", video.display());
    }
    if let Some(archive) = &files.archive {
        println!("Images: {}", archive.display());
    }
    for thumb in &files.thumbnails {
        println!("Preview: {}", thumb.display());
    }

    if let Some(err) = &result.error {
        eprintln!("[ERROR] {}", err);
        std::process::exit(1);
    }
    Ok(())
}
