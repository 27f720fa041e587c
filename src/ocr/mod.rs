//! Text recognition for downloaded images.
//!
//! OCR runs out of process, one invocation per image. The engine is any
//! command that prints the recognized text to stdout, either as plain text
//! or as JSON `{"text": "..."}`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::app::{CrawlError, Result};

/// Placeholder in `args` replaced by the absolute image path
pub const IMAGE_PLACEHOLDER: &str = "{image}";

/// Configuration of the OCR subprocess
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Allow OCR at all; tasks can still opt out with `noimage` (default: true)
    pub enabled: bool,

    /// Program to run (default: "tesseract")
    pub program: String,

    /// Arguments; `{image}` is replaced by the image path, which is
    /// appended when no placeholder is present
    pub args: Vec<String>,

    /// Per-image timeout in seconds (default: 120)
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "tesseract".to_string(),
            args: vec![
                IMAGE_PLACEHOLDER.to_string(),
                "stdout".to_string(),
                "-l".to_string(),
                "chi_sim+eng".to_string(),
            ],
            timeout_secs: 120,
        }
    }
}

impl OcrConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Recognizes text in an image file
#[async_trait]
pub trait OcrService: Send + Sync {
    async fn extract_text(&self, image: &Path) -> Result<String>;
}

/// Runs an external OCR command per image
#[derive(Debug, Clone)]
pub struct CommandOcr {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandOcr {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: config.timeout(),
        }
    }

    fn build_args(&self, image: &Path) -> Vec<String> {
        let image = image.to_string_lossy();
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(IMAGE_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(IMAGE_PLACEHOLDER, &image)
                } else {
                    arg.clone()
                }
            })
            .collect();
        if !substituted {
            args.push(image.into_owned());
        }
        args
    }
}

#[async_trait]
impl OcrService for CommandOcr {
    async fn extract_text(&self, image: &Path) -> Result<String> {
        let image: PathBuf = std::path::absolute(image)?;
        if !image.exists() {
            return Err(CrawlError::Ocr(format!("image not found: {}", image.display())));
        }

        let args = self.build_args(&image);
        debug!("Running OCR: {} {:?}", self.program, args);

        let child = Command::new(&self.program)
            .args(&args)
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CrawlError::Ocr(format!("failed to start {}: {}", self.program, e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                CrawlError::Ocr(format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CrawlError::Ocr(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Accept `{"text": ...}`, a bare JSON string, or plain text.
pub fn parse_output(stdout: &str) -> String {
    let trimmed = stdout.trim();
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) => map
            .get("text")
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .trim()
            .to_string(),
        Ok(serde_json::Value::String(s)) => s.trim().to_string(),
        _ => trimmed.to_string(),
    }
}
