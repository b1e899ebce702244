use crate::models::ParseResult;
use serde::Serialize;

/// What to ask the producer for next.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ContinuationRequest {
    pub next_batch: u32,
    pub total: u32,
    pub remaining_paths: Vec<String>,
    pub incomplete_paths: Vec<String>,
    pub prompt: String,
}

fn bullet_list(lines: &mut Vec<String>, paths: &[String]) {
    lines.extend(paths.iter().map(|path| format!("- {}", path)));
}

/// Builds the follow-up request for an unfinished batch. `None` when nothing is left.
pub fn plan_continuation(result: &ParseResult) -> Option<ContinuationRequest> {
    let batch = result.batch()?;
    if batch.is_complete {
        return None;
    }

    let next_batch = batch.current.saturating_add(1);
    let total = batch.total.max(next_batch);
    let incomplete_paths = result.incomplete_paths().to_vec();
    let mut lines = vec![format!(
        "Continue the multi-part generation with batch {} of {}.",
        next_batch, total
    )];

    if batch.remaining_paths.is_empty() {
        lines.push(
            "The remaining files were not listed; continue from where the previous batch stopped."
                .to_string(),
        );
    } else {
        lines.push(format!(
            "{} file(s) remain to be written:",
            batch.remaining_paths.len()
        ));
        bullet_list(&mut lines, &batch.remaining_paths);
    }

    if !batch.completed_paths.is_empty() {
        lines.push("Already completed, do not repeat:".to_string());
        bullet_list(&mut lines, &batch.completed_paths);
    }

    if !incomplete_paths.is_empty() {
        lines.push("These files were cut off and must be regenerated in full:".to_string());
        bullet_list(&mut lines, &incomplete_paths);
    }

    if let Some(hint) = &batch.hint {
        lines.push(format!("Hint from the previous batch: {}", hint));
    }

    lines.push("Use the same response format as the previous batch.".to_string());

    Some(ContinuationRequest {
        next_batch,
        total,
        remaining_paths: batch.remaining_paths.clone(),
        incomplete_paths,
        prompt: lines.join("\n"),
    })
}
