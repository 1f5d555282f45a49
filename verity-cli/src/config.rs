use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use verity_core::BalanceReconciler;
use verity_fraud::PixelBands;
use verity_ingest::{DocumentClassifier, SkewCorrector, TesseractCli};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub classifier: ClassifierSection,
    pub deskew: DeskewSection,
    pub reconcile: ReconcileSection,
    pub pixel: PixelBands,
    pub ocr: OcrSection,
    pub llm: LlmSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    /// Below this many selectable characters (with images present) a
    /// document is treated as a scan.
    pub text_threshold: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskewSection {
    pub min_angle_degrees: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSection {
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSection {
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub enabled: bool,
    /// OpenAI-compatible API root; `/v1/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            text_threshold: DocumentClassifier::default().text_threshold,
        }
    }
}

impl Default for DeskewSection {
    fn default() -> Self {
        Self {
            min_angle_degrees: SkewCorrector::default().min_angle_degrees,
        }
    }
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            tolerance: BalanceReconciler::default().tolerance,
        }
    }
}

impl Default for OcrSection {
    fn default() -> Self {
        let t = TesseractCli::default();
        Self {
            command: t.command,
            args: t.args,
        }
    }
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.0,
            max_tokens: 4096,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

impl Config {
    pub fn classifier(&self) -> DocumentClassifier {
        DocumentClassifier::new(self.classifier.text_threshold)
    }

    pub fn deskew(&self) -> SkewCorrector {
        SkewCorrector::new(self.deskew.min_angle_degrees)
    }

    pub fn reconciler(&self) -> BalanceReconciler {
        BalanceReconciler::new(self.reconcile.tolerance)
    }

    pub fn ocr_engine(&self) -> TesseractCli {
        TesseractCli::new(self.ocr.command.clone(), self.ocr.args.clone())
    }
}

/// `$VERITY_HOME`, or `~/.verity`.
pub fn verity_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("VERITY_HOME") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".verity"))
}

pub fn ensure_verity_home() -> Result<PathBuf> {
    let dir = verity_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(verity_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config(cfg: &Config) -> Result<PathBuf> {
    let p = ensure_verity_home()?.join("config.toml");
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(p)
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    let p = save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn show_config() -> Result<()> {
    let cfg = load_config()?;
    println!("# {}", config_path()?.display());
    print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
    Ok(())
}
