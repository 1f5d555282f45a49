use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use verity_ingest::{estimate_angle, open_document, PageImage};

mod config;
mod llm;
mod pipeline;

use pipeline::{parse_edited, render_report, AnalyzeOptions, Pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "verity",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("VERITY_BUILD_SHA"), ")"),
    about = "Bank statement ingestion, reconciliation and fraud signals"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify, extract, normalize, reconcile and scan a statement (PDF or image)
    Analyze {
        file: PathBuf,

        /// Skip the LLM extractor and reviewer even when configured
        #[arg(long)]
        offline: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Do not run pixel or semantic fraud detection
        #[arg(long)]
        skip_fraud: bool,
    },

    /// Re-run balance reconciliation on an edited transaction list (JSON)
    Revalidate {
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Print whether a document is image-based or text-based
    Classify {
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Straighten a single scanned page image
    Deskew {
        image: PathBuf,

        /// Output image path (format from extension)
        #[arg(long)]
        out: PathBuf,
    },

    /// Manage ~/.verity/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default config if none exists
    Init,
    /// Print the effective config
    Show,
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Analyze {
            file,
            offline,
            json,
            skip_fraud,
        } => {
            let cfg = config::load_config()?;
            let llm = if offline {
                None
            } else {
                llm::LlmSettings::from_section(&cfg.llm)?
                    .map(llm::LlmClient::new)
                    .transpose()?
            };
            let pipeline = Pipeline::new(&cfg, llm);
            let report = pipeline
                .analyze_file(&file, AnalyzeOptions { skip_fraud })
                .with_context(|| format!("analyzing {}", file.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render_report(&report));
            }
        }

        Command::Revalidate { file, json } => {
            let cfg = config::load_config()?;
            let s = std::fs::read_to_string(&file)
                .with_context(|| format!("read {}", file.display()))?;
            let edited = parse_edited(&s)
                .with_context(|| format!("parsing {}", file.display()))?;
            let skipped = edited.skipped;
            let result = cfg.reconciler().reconcile(edited.transactions);

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.is_clean() {
                println!("{} transactions, balances reconcile.", result.transactions.len());
            } else {
                println!(
                    "{} transactions, {} flagged:",
                    result.transactions.len(),
                    result.mismatches.len()
                );
                for d in result.descriptions() {
                    println!("- {d}");
                }
            }
            if !json {
                for skip in &skipped {
                    println!("- {skip}");
                }
            }
        }

        Command::Classify { file, json } => {
            let cfg = config::load_config()?;
            let bytes = std::fs::read(&file).with_context(|| format!("read {}", file.display()))?;
            let doc = open_document(&bytes).with_context(|| format!("open {}", file.display()))?;
            let c = cfg.classifier().classify(doc.as_ref())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&c)?);
            } else {
                println!(
                    "{}: {} ({} text chars, {} images)",
                    file.display(),
                    c.kind,
                    c.text_chars,
                    c.images
                );
                for p in &c.pages {
                    println!("  page {}: {} chars, {} images", p.page + 1, p.text_chars, p.images);
                }
            }
        }

        Command::Deskew { image: input, out } => {
            let cfg = config::load_config()?;
            let pixels = image::open(&input)
                .with_context(|| format!("open {}", input.display()))?
                .to_rgb8();
            let gray = image::imageops::grayscale(&pixels);
            let angle = estimate_angle(&gray);
            let page = cfg.deskew().deskew_page(PageImage::new(0, pixels));
            page.pixels
                .save(&out)
                .with_context(|| format!("write {}", out.display()))?;
            info!(?angle, rotated = page.deskewed, "deskew finished");
            println!(
                "{} -> {} ({})",
                input.display(),
                out.display(),
                match (angle, page.deskewed) {
                    (Some(a), true) => format!("rotated {a:.2} degrees"),
                    (Some(a), false) => format!("left as is, {a:.2} degrees"),
                    (None, _) => "blank page, left as is".to_string(),
                }
            );
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => config::show_config()?,
        },
    }

    Ok(())
}
