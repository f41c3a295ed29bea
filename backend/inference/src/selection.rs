//! Model selection against the endpoint's discovered model list.

/// Drop a trailing `:tag` from a model name (`llama3.2:latest` → `llama3.2`).
pub fn strip_version_suffix(model: &str) -> &str {
    match model.rsplit_once(':') {
        Some((base, _)) if !base.is_empty() => base,
        _ => model,
    }
}

/// Pick the model to request.
///
/// Order: the preferred name verbatim, the suffix-stripped name, the first
/// model containing the stripped name (case-insensitive), the first available
/// model, and finally the preferred name unchanged when nothing was discovered.
pub fn select_model(preferred: &str, available: &[String]) -> String {
    if available.iter().any(|m| m == preferred) {
        return preferred.to_string();
    }

    let stripped = strip_version_suffix(preferred);
    if available.iter().any(|m| m == stripped) {
        return stripped.to_string();
    }

    let needle = stripped.to_lowercase();
    if let Some(partial) = available
        .iter()
        .find(|m| !needle.is_empty() && m.to_lowercase().contains(&needle))
    {
        return partial.clone();
    }

    available
        .first()
        .cloned()
        .unwrap_or_else(|| preferred.to_string())
}
