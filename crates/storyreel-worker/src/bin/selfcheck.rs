use std::path::Path;

use storyreel_media::{check_ffmpeg, check_ffprobe};
use storyreel_worker::{CapabilityEndpoints, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();
    config.validate()?;

    println!(
        "storyreel-selfcheck: starting with scratch_root={} output_root={}",
        config.scratch_root.display(),
        config.output_root.display()
    );
    ensure_dir(&config.scratch_root).await?;
    ensure_dir(&config.output_root).await?;
    ensure_tools()?;

    let endpoints = CapabilityEndpoints::from_env();
    println!(
        "storyreel-selfcheck: image={} speech={}",
        endpoints.image_url, endpoints.speech_url
    );
    if !config.music_root.is_dir() {
        println!(
            "storyreel-selfcheck: music root {} missing, auto music will be skipped",
            config.music_root.display()
        );
    }

    println!("storyreel-selfcheck: ok");
    Ok(())
}

async fn ensure_dir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

fn ensure_tools() -> anyhow::Result<()> {
    let ffmpeg = check_ffmpeg().map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;
    let ffprobe = check_ffprobe().map_err(|e| anyhow::anyhow!("ffprobe not available: {}", e))?;
    println!(
        "storyreel-selfcheck: ffmpeg={} ffprobe={}",
        ffmpeg.display(),
        ffprobe.display()
    );
    Ok(())
}
