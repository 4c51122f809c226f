// TubeForge Renderer Bridge
// Copyright (c) 2026 Xing_The_Creator | TubeForge
//
// Video rendering is delegated to an external automation tool. The tool is
// invoked as `<program> --script <file> --output <file> --title <title>` and
// must leave a non-empty output file behind.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("No renderer is configured")]
    Unavailable,

    #[error("Failed to launch renderer: {0}")]
    Launch(#[from] std::io::Error),

    #[error("Renderer exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("Renderer produced no output at {0:?}")]
    MissingOutput(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RenderJob {
    pub video_id: String,
    pub title: String,
    pub script_path: PathBuf,
    pub output_path: PathBuf,
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, job: &RenderJob) -> Result<PathBuf, RenderError>;
}

/// Used when `TUBEFORGE_RENDER_CMD` is unset.
pub struct UnconfiguredRenderer;

#[async_trait]
impl Renderer for UnconfiguredRenderer {
    async fn render(&self, _job: &RenderJob) -> Result<PathBuf, RenderError> {
        Err(RenderError::Unavailable)
    }
}

pub struct CommandRenderer {
    program: PathBuf,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(&self, job: &RenderJob) -> Result<PathBuf, RenderError> {
        let started = SystemTime::now();
        info!("[RENDER] 🎬 {:?} -> {:?}", self.program, job.output_path);

        let output = Command::new(&self.program)
            .arg("--script")
            .arg(&job.script_path)
            .arg("--output")
            .arg(&job.output_path)
            .arg("--title")
            .arg(&job.title)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("[RENDER] Job {} failed: {}", job.video_id, stderr);
            return Err(RenderError::Failed {
                code: output.status.code(),
                stderr,
            });
        }

        if !is_fresh_output(&job.output_path, started).await {
            return Err(RenderError::MissingOutput(job.output_path.clone()));
        }
        Ok(job.output_path.clone())
    }
}

async fn is_fresh_output(path: &Path, started: SystemTime) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => meta
            .modified()
            .map(|m| m >= started - std::time::Duration::from_secs(1))
            .unwrap_or(true),
        _ => false,
    }
}

/// Grab a frame at 1s as the thumbnail. Returns `None` on any failure.
pub async fn extract_thumbnail(ffmpeg: &str, video: &Path, output: &Path) -> Option<PathBuf> {
    let status = Command::new(ffmpeg)
        .args(["-y", "-ss", "1", "-i"])
        .arg(video)
        .args(["-vframes", "1", "-q:v", "3", "-vf", "scale=1280:-1"])
        .arg(output)
        .output()
        .await;

    match status {
        Ok(out) if out.status.success() && output.exists() => Some(output.to_path_buf()),
        Ok(out) => {
            warn!(
                "[RENDER] Thumbnail extraction failed: {}",
                String::from_utf8_lossy(&out.stderr).lines().last().unwrap_or("")
            );
            None
        }
        Err(e) => {
            warn!("[RENDER] ffmpeg unavailable for thumbnails: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(dir: &Path) -> RenderJob {
        RenderJob {
            video_id: "vid".into(),
            title: "Test".into(),
            script_path: dir.join("script.txt"),
            output_path: dir.join("out.mp4"),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_renderer() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = UnconfiguredRenderer.render(&job(dir.path())).await.unwrap_err();
        assert!(matches!(err, RenderError::Unavailable));
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let renderer = CommandRenderer::new("/definitely/not/a/renderer");
        let err = renderer.render(&job(dir.path())).await.unwrap_err();
        assert!(matches!(err, RenderError::Launch(_)));
    }

    #[tokio::test]
    async fn test_thumbnail_failure_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let thumb = extract_thumbnail(
            "/definitely/not/ffmpeg",
            &dir.path().join("in.mp4"),
            &dir.path().join("thumb.jpg"),
        )
        .await;
        assert!(thumb.is_none());
    }
}
