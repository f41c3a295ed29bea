//! Cold email generation.
//!
//! Thirty drafts are requested from the model in concurrent batches. A draft
//! the model fails to produce is filled from a deterministic template, so an
//! unreachable endpoint still yields a full set.

use coldmail_core::ColdMailError;
use coldmail_inference::Endpoint;
use coldmail_store::Store;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

pub const EMAIL_COUNT: usize = 30;
pub const BATCH_SIZE: usize = 4;
pub const STYLES: [&str; 4] = ["Professional", "Warm", "Friendly", "Consultative"];

const GREETINGS: [&str; 5] = ["Hi", "Hello", "Good day", "Greetings", "Hope you're having a great day"];
const OPENERS: [&str; 6] = [
    "I came across your company and was genuinely impressed.",
    "I’ve been following your work and wanted to reach out.",
    "Your company stood out to me while researching this space.",
    "I noticed your team while exploring leaders in your industry.",
    "I’ve admired how your company approaches its work.",
    "Your product and direction caught my attention recently.",
];
const VALUE_PROPS: [&str; 6] = [
    "We help teams improve results without adding complexity.",
    "Our work focuses on clarity, execution, and measurable outcomes.",
    "We support companies looking to move faster and smarter.",
    "We specialize in practical solutions that actually ship.",
    "We help teams remove friction and focus on impact.",
    "Our approach emphasizes long-term value, not quick wins.",
];
const CTAS: [&str; 5] = [
    "Would you be open to a short conversation?",
    "Open to a brief intro call?",
    "Happy to share more context if helpful.",
    "Would it make sense to explore this further?",
    "Let me know if this is worth discussing.",
];
const SUBJECTS: [&str; 7] = [
    "Quick question",
    "Exploring a potential fit",
    "Idea worth sharing",
    "Reaching out briefly",
    "Thought this might be relevant",
    "Potential collaboration",
    "A short introduction",
];

/// What the user wants to pitch, and to whom.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailBrief {
    pub company_url: String,
    pub target_name: Option<String>,
    pub your_offer: String,
}

impl EmailBrief {
    pub fn validate(&self) -> Result<(), ColdMailError> {
        if self.company_url.trim().is_empty() || self.your_offer.trim().is_empty() {
            return Err(ColdMailError::validation("Missing required fields"));
        }
        Ok(())
    }

    /// Leading-space-prefixed name for greetings, or empty.
    fn salutation_name(&self) -> String {
        match self.target_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!(" {name}"),
            _ => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedEmail {
    pub style: String,
    pub subject: String,
    pub body: String,
    pub ai_generated: bool,
}

/// Generate the full set of drafts for `brief`.
///
/// Never fails on inference errors; every failed slot is backfilled.
pub async fn generate_emails(endpoint: &Endpoint, brief: &EmailBrief) -> Vec<GeneratedEmail> {
    let mut drafts: Vec<Option<GeneratedEmail>> = Vec::with_capacity(EMAIL_COUNT);

    let indices: Vec<usize> = (0..EMAIL_COUNT).collect();
    for batch in indices.chunks(BATCH_SIZE) {
        let results = join_all(batch.iter().map(|&i| draft_email(endpoint, brief, i))).await;
        drafts.extend(results);
    }

    let failed = drafts.iter().filter(|d| d.is_none()).count();
    if failed > 0 {
        warn!(failed, total = EMAIL_COUNT, "Backfilling emails from templates");
    }

    drafts
        .into_iter()
        .enumerate()
        .map(|(i, draft)| draft.unwrap_or_else(|| template_email(brief, i)))
        .collect()
}

/// Validate, generate, and account for one request against a workspace.
pub async fn generate_for_workspace(
    endpoint: &Endpoint,
    store: &Store,
    workspace_id: &str,
    brief: &EmailBrief,
) -> Result<Vec<GeneratedEmail>, ColdMailError> {
    brief.validate()?;

    let emails = generate_emails(endpoint, brief).await;
    let ai_generated = emails.iter().filter(|e| e.ai_generated).count();

    store
        .record_generated(workspace_id, emails.len() as u32)
        .await?;
    store
        .log_activity(
            workspace_id,
            "emails.generated",
            json!({
                "companyUrl": brief.company_url,
                "count": emails.len(),
                "aiGenerated": ai_generated,
            }),
        )
        .await?;

    info!(workspace_id = %workspace_id, count = emails.len(), ai_generated, "Emails generated");
    Ok(emails)
}

async fn draft_email(endpoint: &Endpoint, brief: &EmailBrief, index: usize) -> Option<GeneratedEmail> {
    let style = STYLES[index % STYLES.len()];
    match endpoint.generate(draft_prompt(brief, style, index)).await {
        Ok(response) => parse_draft(&response.content, style, index),
        Err(e) => {
            debug!(index, error = %e, "Email draft failed");
            None
        }
    }
}

fn draft_prompt(brief: &EmailBrief, style: &str, index: usize) -> String {
    let recipient = match brief.target_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => "the decision maker",
    };
    format!(
        "Write a short cold email (variation {n} of {EMAIL_COUNT}) in a {style} tone.\n\
Recipient: {recipient}\n\
Their company: {company}\n\
Our offer: {offer}\n\n\
Start with a line \"Subject: <subject>\", then a blank line, then the body. \
Keep the body under 120 words, end with \"Best regards,\" and add nothing else.",
        n = index + 1,
        company = brief.company_url.trim(),
        offer = brief.your_offer.trim(),
    )
}

/// Split model output into subject and body.
///
/// A missing `Subject:` line falls back to the rotating subject list; an empty
/// body counts as a failed draft.
fn parse_draft(output: &str, style: &str, index: usize) -> Option<GeneratedEmail> {
    let text = output.trim();
    let (subject, body) = match text.split_once('\n') {
        Some((first, rest)) if first.trim().to_ascii_lowercase().starts_with("subject:") => {
            let subject = first.trim()["subject:".len()..].trim().to_string();
            (subject, rest.trim())
        }
        _ => (String::new(), text),
    };

    if body.is_empty() {
        return None;
    }

    Some(GeneratedEmail {
        style: style.to_string(),
        subject: if subject.is_empty() {
            SUBJECTS[index % SUBJECTS.len()].to_string()
        } else {
            subject
        },
        body: body.to_string(),
        ai_generated: true,
    })
}

/// Deterministic draft number `index`, rotating through the phrase lists.
pub fn template_email(brief: &EmailBrief, index: usize) -> GeneratedEmail {
    let name = brief.salutation_name();
    let offer = brief.your_offer.trim();

    let g = GREETINGS[index % GREETINGS.len()];
    let o = OPENERS[index % OPENERS.len()];
    let v = VALUE_PROPS[index % VALUE_PROPS.len()];
    let c = CTAS[index % CTAS.len()];
    let of = match index % 4 {
        0 => format!("Specifically, {offer}."),
        1 => format!("One area we often help with is {offer}."),
        2 => format!("This usually involves {offer}."),
        _ => format!("Our recent work includes {offer}."),
    };

    let body = match index % 4 {
        0 => format!("{g}{name},\n\n{o}\n\n{v}\n{of}\n\n{c}\n\nBest regards,"),
        1 => format!("{g}{name},\n\nI’ll keep this brief.\n\n{v}\n{of}\n\n{c}\n\nBest regards,"),
        2 => format!("{g}{name},\n\n{o}\n{of}\n\nIf helpful, happy to share more.\n\nBest regards,"),
        _ => format!("{g}{name},\n\n{v}\n\n{c}\n\nBest regards,"),
    };

    GeneratedEmail {
        style: STYLES[index % STYLES.len()].to_string(),
        subject: SUBJECTS[index % SUBJECTS.len()].to_string(),
        body: body.trim().to_string(),
        ai_generated: false,
    }
}
