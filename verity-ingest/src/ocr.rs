//! OCR engines.
//!
//! The router only sees [`OcrEngine`]; the default engine shells out to the
//! `tesseract` CLI (command and extra args come from `~/.verity/config.toml`).

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::document::PageImage;

pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Recognise text on the given pages, in order, joined by newlines.
    fn extract_text(&self, pages: &[PageImage]) -> Result<String>;
}

/// `tesseract stdin stdout [args...]`, one process per page.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self {
            command: "tesseract".to_string(),
            args: vec!["--psm".to_string(), "6".to_string()],
        }
    }
}

impl TesseractCli {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    fn run_page(&self, page: &PageImage) -> Result<String> {
        let png = page
            .to_png()
            .with_context(|| format!("encode page {} as png", page.index))?;

        let mut child = Command::new(&self.command)
            .arg("stdin")
            .arg("stdout")
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start `{}`", self.command))?;

        {
            let mut stdin = child.stdin.take().context("ocr stdin unavailable")?;
            stdin
                .write_all(&png)
                .with_context(|| format!("write page {} to `{}`", page.index, self.command))?;
        }

        let output = child.wait_with_output().context("wait for ocr process")?;
        if !output.status.success() {
            bail!(
                "`{}` exited with {} on page {}: {}",
                self.command,
                output.status,
                page.index,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractCli {
    fn name(&self) -> &str {
        &self.command
    }

    fn extract_text(&self, pages: &[PageImage]) -> Result<String> {
        let mut texts = Vec::with_capacity(pages.len());
        for page in pages {
            let text = self.run_page(page)?;
            debug!(page = page.index, chars = text.len(), "ocr page done");
            texts.push(text);
        }
        Ok(texts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_missing_binary_is_an_error() {
        let engine = TesseractCli::new("verity-no-such-ocr-binary", Vec::new());
        let page = PageImage::new(0, RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        let err = engine.extract_text(&[page]).unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }

    #[test]
    fn test_no_pages_no_process() {
        let engine = TesseractCli::new("verity-no-such-ocr-binary", Vec::new());
        assert_eq!(engine.extract_text(&[]).unwrap(), "");
    }
}
