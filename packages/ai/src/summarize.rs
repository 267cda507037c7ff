//! Best-effort structured summaries of report text.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use envwatch_report_models::AiAnalysis;

use crate::providers::LlmProvider;

/// Instructions sent with every summarization request.
pub const SYSTEM_PROMPT: &str = "You analyze citizen reports about environmental problems \
(waste, air pollution, water pollution, noise) in Korean cities. Reply with a single JSON \
object and nothing else, using exactly these keys: \"summary\" (one or two sentences), \
\"keywords\" (array of up to five short strings), \"category\" (one of waste, air, water, \
noise), \"urgency\" (one of low, medium, high), \"estimatedCost\" (short free text), \
\"expectedDuration\" (short free text). Answer in the language of the report.";

/// Requests a structured analysis of `text`.
///
/// Returns `None` if the request itself fails. A reply that is not a
/// valid analysis object is kept as a summary-only analysis.
pub async fn summarize(provider: &dyn LlmProvider, text: &str) -> Option<AiAnalysis> {
    match provider.complete(SYSTEM_PROMPT, text).await {
        Ok(reply) => Some(parse_analysis(&reply)),
        Err(e) => {
            log::warn!("AI summarization failed: {e}");
            None
        }
    }
}

/// Like [`summarize`], but drops the result if the dialog that asked for it
/// has closed in the meantime.
pub async fn summarize_for_dialog(
    provider: &dyn LlmProvider,
    text: &str,
    liveness: &DialogLiveness,
) -> Option<AiAnalysis> {
    let analysis = summarize(provider, text).await?;
    if liveness.is_open() {
        Some(analysis)
    } else {
        log::debug!("Discarding AI summary for a closed dialog");
        None
    }
}

/// Parses a model reply into an [`AiAnalysis`].
///
/// Markdown code fences around the JSON are tolerated. Anything that does
/// not parse becomes `{ summary: <reply> }`.
#[must_use]
pub fn parse_analysis(reply: &str) -> AiAnalysis {
    let body = strip_code_fences(reply);
    match serde_json::from_str::<AiAnalysis>(body) {
        Ok(analysis) if !analysis.summary.trim().is_empty() => analysis,
        Ok(_) => {
            log::debug!("AI reply had no summary; keeping raw text");
            AiAnalysis::from_raw_text(reply.trim())
        }
        Err(e) => {
            log::debug!("AI reply was not valid JSON ({e}); keeping raw text");
            AiAnalysis::from_raw_text(reply.trim())
        }
    }
}

fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening fence line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Shared open/closed flag for a dialog waiting on a summary.
#[derive(Debug, Clone)]
pub struct DialogLiveness(Arc<AtomicBool>);

impl DialogLiveness {
    /// Creates a flag for a dialog that is currently open.
    #[must_use]
    pub fn open() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Marks the dialog closed. Pending results will be discarded.
    pub fn close(&self) {
        self.0.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for DialogLiveness {
    fn default() -> Self {
        Self::open()
    }
}
