//! Keyword-bucket intent classifier.

use coldmail_core::{ClassificationResult, Intent};

/// Buckets in scoring order. Earlier buckets win ties.
const SIGNALS: [(Intent, &[&str]); 5] = [
    (Intent::Debug, &["error", "bug", "failed", "issue", "crash"]),
    (
        Intent::React,
        &["react", "jsx", "component", "hook", "usestate", "useeffect"],
    ),
    (
        Intent::Explain,
        &["explain", "what is", "how does", "why", "difference"],
    ),
    (
        Intent::Code,
        &["code", "example", "snippet", "implement", "write"],
    ),
    (Intent::Design, &["architecture", "design", "structure", "flow"]),
];

/// Score `text` against each bucket; the strictly highest count wins.
///
/// Each keyword counts once no matter how often it appears. No hits at all
/// yields `general` with confidence 0.
pub fn classify(text: &str) -> ClassificationResult {
    let lowered = text.to_lowercase();

    let mut best = ClassificationResult::default();
    for (intent, keywords) in SIGNALS {
        let score = keywords.iter().filter(|k| lowered.contains(*k)).count() as u32;
        if score > best.confidence {
            best = ClassificationResult {
                intent,
                confidence: score,
            };
        }
    }
    best
}
