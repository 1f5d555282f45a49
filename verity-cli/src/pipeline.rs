//! End-to-end analysis of one statement document.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use verity_core::{
    decode_edited, AccountInfo, BalanceReconciler, EditedRows, FraudIssue, Mismatch, Statement,
    Transaction,
};
use verity_fraud::{FraudScanner, PixelAnomalyDetector, SemanticReviewer};
use verity_ingest::{
    extract_structured, open_document, Classification, DocumentKind, DocumentSource,
    ExtractionRouter, ExtractionSource, PageImage, RawPayload, SkewCorrector, StructuredExtractor,
    TransactionNormalizer,
};

use crate::config::Config;
use crate::llm::LlmClient;

#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeOptions {
    pub skip_fraud: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub file: String,
    pub classification: Classification,
    pub extraction: ExtractionSource,
    pub account_info: AccountInfo,
    pub transactions: Vec<Transaction>,
    pub mismatches: Vec<Mismatch>,
    pub mismatch_descriptions: Vec<String>,
    pub skipped_rows: Vec<String>,
    pub fraud_issues: Vec<FraudIssue>,
}

pub struct Pipeline {
    router: ExtractionRouter,
    normalizer: TransactionNormalizer,
    reconciler: BalanceReconciler,
    deskew: SkewCorrector,
    pixel: PixelAnomalyDetector,
    llm: Option<LlmClient>,
}

impl Pipeline {
    pub fn new(cfg: &Config, llm: Option<LlmClient>) -> Self {
        Self {
            router: ExtractionRouter::with_ocr(
                cfg.classifier(),
                Box::new(cfg.ocr_engine()),
                cfg.deskew(),
            ),
            normalizer: TransactionNormalizer::new(),
            reconciler: cfg.reconciler(),
            deskew: cfg.deskew(),
            pixel: PixelAnomalyDetector::new(cfg.pixel),
            llm,
        }
    }

    pub fn analyze_file(&self, path: &Path, opts: AnalyzeOptions) -> Result<AnalysisReport> {
        let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let doc = open_document(&bytes).with_context(|| format!("open {}", path.display()))?;
        self.analyze(&path.display().to_string(), doc.as_ref(), opts)
    }

    pub fn analyze(
        &self,
        file: &str,
        doc: &dyn DocumentSource,
        opts: AnalyzeOptions,
    ) -> Result<AnalysisReport> {
        let (classification, raw) = self.router.route(doc)?;

        // Page images feed the vision extractor and the fraud scan. Scans must
        // render; text documents contribute whichever pages embed an image.
        let pages = match classification.kind {
            DocumentKind::ImageBased => doc.render_pages()?,
            DocumentKind::TextBased => render_embedded(doc, &classification),
        };
        let pages = self.deskew.deskew(pages);

        let (raw, extraction) = match &self.llm {
            Some(llm) => {
                let hint = match &raw.payload {
                    RawPayload::Text(t) => Some(t.as_str()),
                    RawPayload::Structured(_) => None,
                };
                let extractor: &dyn StructuredExtractor = llm;
                info!(model = llm.model(), pages = pages.len(), "structured extraction");
                (extract_structured(extractor, &pages, hint)?, ExtractionSource::VisionStructured)
            }
            None => {
                let source = raw.source;
                (raw, source)
            }
        };

        let normalized = self.normalizer.normalize(&raw)?;
        if !normalized.skipped.is_empty() {
            warn!(skipped = normalized.skipped.len(), "rows dropped during normalization");
        }
        let Statement {
            account_info,
            transactions,
        } = normalized.statement;

        let reconciliation = self.reconciler.reconcile(transactions);
        info!(
            transactions = reconciliation.transactions.len(),
            mismatches = reconciliation.mismatches.len(),
            "reconciliation finished"
        );

        let fraud_issues = if opts.skip_fraud {
            Vec::new()
        } else if pages.is_empty() {
            info!("no page images; skipping fraud scan");
            Vec::new()
        } else {
            let reviewer = self
                .llm
                .clone()
                .map(|c| Box::new(c) as Box<dyn SemanticReviewer>);
            FraudScanner::new(self.pixel, reviewer).scan(&pages)
        };

        Ok(AnalysisReport {
            file: file.to_string(),
            classification,
            extraction,
            account_info,
            mismatch_descriptions: reconciliation.descriptions(),
            mismatches: reconciliation.mismatches,
            transactions: reconciliation.transactions,
            skipped_rows: normalized.skipped.iter().map(|s| s.to_string()).collect(),
            fraud_issues,
        })
    }
}

/// Pages of a text document that embed an image, rendered best-effort.
fn render_embedded(doc: &dyn DocumentSource, classification: &Classification) -> Vec<PageImage> {
    classification
        .pages
        .iter()
        .filter(|p| p.images > 0)
        .filter_map(|p| match doc.render_page(p.page) {
            Ok(page) => Some(page),
            Err(e) => {
                warn!(page = p.page, error = %e, "page image not rendered; left out of fraud scan");
                None
            }
        })
        .collect()
}

/// Decode an edited transaction list. Rows that cannot be decoded are
/// returned as skips; the rest are reconciled.
pub fn parse_edited(json: &str) -> Result<EditedRows> {
    let value: Value = serde_json::from_str(json).context("edited data is not valid JSON")?;
    Ok(decode_edited(&value)?)
}

pub fn render_report(r: &AnalysisReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", r.file);
    let _ = writeln!(
        out,
        "Document: {} ({} text chars, {} images, {} pages); extracted via {}",
        r.classification.kind,
        r.classification.text_chars,
        r.classification.images,
        r.classification.pages.len(),
        r.extraction
    );

    let info = &r.account_info;
    for (label, value) in [
        ("Holder", &info.holder_name),
        ("Account", &info.account_number),
        ("Period", &info.period),
        ("Bank", &info.bank_name),
    ] {
        if let Some(v) = value {
            let _ = writeln!(out, "{label}: {v}");
        }
    }
    if let Some(b) = info.final_balance {
        let _ = writeln!(out, "Final balance: {b:.2}");
    }

    let _ = writeln!(out, "\n## Transactions ({})", r.transactions.len());
    for t in &r.transactions {
        let balance = match &t.balance {
            Some(b) => match b.value() {
                Ok(Some(v)) => format!("{v:.2}"),
                _ => format!("{b:?}"),
            },
            None => "-".to_string(),
        };
        let _ = writeln!(
            out,
            "{} {:>4} {} {:<40} {:>12.2} {:>12}",
            if t.mismatch { "!" } else { " " },
            t.id,
            verity_core::dates::format_dmy(t.date),
            t.details,
            t.amount,
            balance
        );
    }

    if r.mismatch_descriptions.is_empty() {
        let _ = writeln!(out, "\nBalances reconcile.");
    } else {
        let _ = writeln!(out, "\n## Mismatches ({})", r.mismatch_descriptions.len());
        for d in &r.mismatch_descriptions {
            let _ = writeln!(out, "- {d}");
        }
    }

    if !r.skipped_rows.is_empty() {
        let _ = writeln!(out, "\n## Skipped rows ({})", r.skipped_rows.len());
        for s in &r.skipped_rows {
            let _ = writeln!(out, "- {s}");
        }
    }

    let _ = writeln!(out, "\n## Fraud signals ({})", r.fraud_issues.len());
    for i in &r.fraud_issues {
        let evidence = match (&i.text_snippet, &i.image_snippet) {
            (Some(t), _) => format!(" [{t}]"),
            (None, Some(_)) => " [image snippet]".to_string(),
            (None, None) => String::new(),
        };
        let _ = writeln!(out, "- {}: {}{}", i.issue_type, i.description, evidence);
    }
    out
}
