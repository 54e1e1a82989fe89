//! Final video composition.
//!
//! Downloads the ordered scene clips and the music track, concatenates the
//! clips (normalized to 1080p/30fps), lays the music under them, and
//! republishes the result at a durable URL.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::{debug, info};

use reel_assets::BucketClient;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{ComposeError, ComposeResult};

/// Produces one final video from ordered clip URLs and a music URL.
#[async_trait]
pub trait Compositor: Send + Sync {
    /// Compose and publish; returns the final video's public URL.
    async fn compose(
        &self,
        project_id: &str,
        clip_urls: &[String],
        music_url: &str,
    ) -> ComposeResult<String>;
}

/// FFmpeg-based compositor publishing to the asset bucket.
pub struct FfmpegCompositor {
    http: reqwest::Client,
    bucket: Arc<BucketClient>,
    runner: FfmpegRunner,
}

impl FfmpegCompositor {
    pub fn new(bucket: Arc<BucketClient>) -> Self {
        Self {
            http: reqwest::Client::new(),
            bucket,
            runner: FfmpegRunner::default(),
        }
    }

    async fn download_to(&self, url: &str, dest: &Path) -> ComposeResult<()> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ComposeError::DownloadFailed(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        let bytes = response.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }
}

/// Build the concat filter graph: scale/pad every clip to 1080p30, then
/// concatenate the video streams.
fn concat_filter(clip_count: usize) -> String {
    let mut parts: Vec<String> = (0..clip_count)
        .map(|i| {
            format!(
                "[{i}:v]scale=1920:1080:force_original_aspect_ratio=decrease,\
                 pad=1920:1080:(ow-iw)/2:(oh-ih)/2,setsar=1,fps=30[v{i}]"
            )
        })
        .collect();

    let concat_inputs: String = (0..clip_count).map(|i| format!("[v{i}]")).collect();
    parts.push(format!(
        "{concat_inputs}concat=n={clip_count}:v=1:a=0[outv]"
    ));
    parts.join(";")
}

#[async_trait]
impl Compositor for FfmpegCompositor {
    async fn compose(
        &self,
        project_id: &str,
        clip_urls: &[String],
        music_url: &str,
    ) -> ComposeResult<String> {
        if clip_urls.is_empty() {
            return Err(ComposeError::NoClips);
        }

        let workdir = TempDir::new()?;

        let mut clip_files: Vec<PathBuf> = Vec::with_capacity(clip_urls.len());
        for (i, url) in clip_urls.iter().enumerate() {
            let dest = workdir.path().join(format!("clip-{i}.mp4"));
            debug!(url = %url, "downloading clip");
            self.download_to(url, &dest).await?;
            clip_files.push(dest);
        }

        let music_file = workdir.path().join("music.mp3");
        self.download_to(music_url, &music_file).await?;

        let output_file = workdir.path().join("final.mp4");

        let mut cmd = FfmpegCommand::new(&output_file);
        for clip in &clip_files {
            cmd = cmd.input(clip);
        }
        let cmd = cmd
            .input(&music_file)
            .filter_complex(concat_filter(clip_files.len()))
            .map("[outv]")
            // Music is the last input.
            .map(format!("{}:a", clip_files.len()))
            .video_codec("libx264")
            .preset("medium")
            .crf(23)
            .audio_codec("aac")
            .audio_bitrate("192k")
            .output_args(["-shortest", "-movflags", "+faststart"]);

        self.runner.run(&cmd).await?;

        let key = format!("final/{}/final-{}.mp4", project_id, unix_millis());
        let url = self
            .bucket
            .upload_file(&output_file, &key, "video/mp4")
            .await?;

        info!(project_id = %project_id, url = %url, "final video composed");
        Ok(url)
    }
}

fn unix_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
