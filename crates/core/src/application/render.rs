// Prompt rendering — substitutes `{{field.path}}` references into a
// template step's prompt source from the seed row and prior step outputs.
// The filter library itself is treated as an external pure function (out
// of scope); this is the minimal variable-substitution contract the
// generation worker depends on.

use std::collections::BTreeMap;

/// Render `prompt_source` against the seed row and the outputs of steps
/// that ran earlier in this record (keyed by `step_id`).
pub fn render_prompt(
    prompt_source: &str,
    seed_row: &serde_json::Value,
    prior_outputs: &BTreeMap<String, serde_json::Value>,
) -> String {
    let mut out = String::with_capacity(prompt_source.len());
    let mut rest = prompt_source;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let path = after[..end].trim();
                out.push_str(&resolve_path(path, seed_row, prior_outputs));
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_path(
    path: &str,
    seed_row: &serde_json::Value,
    prior_outputs: &BTreeMap<String, serde_json::Value>,
) -> String {
    let mut parts = path.splitn(2, '.');
    let head = parts.next().unwrap_or("");
    let tail = parts.next();

    let root = if head == "seed" {
        Some(seed_row)
    } else {
        prior_outputs.get(head)
    };

    let Some(mut value) = root else { return String::new() };

    if let Some(tail) = tail {
        for segment in tail.split('.') {
            match value.get(segment) {
                Some(v) => value = v,
                None => return String::new(),
            }
        }
    }

    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Check that `output` contains every dotted path in `required_schema_fields`.
pub fn validate_schema(output: &serde_json::Value, required_schema_fields: &[String]) -> bool {
    required_schema_fields.iter().all(|path| {
        let mut value = output;
        for segment in path.split('.') {
            match value.get(segment) {
                Some(v) => value = v,
                None => return false,
            }
        }
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_seed_field_reference() {
        let seed = json!({"name": "Ada"});
        let prior = BTreeMap::new();
        let rendered = render_prompt("Hello {{seed.name}}!", &seed, &prior);
        assert_eq!(rendered, "Hello Ada!");
    }

    #[test]
    fn renders_prior_step_output_reference() {
        let seed = json!({});
        let mut prior = BTreeMap::new();
        prior.insert("step1".to_string(), json!({"summary": "done"}));
        let rendered = render_prompt("Prior: {{step1.summary}}", &seed, &prior);
        assert_eq!(rendered, "Prior: done");
    }

    #[test]
    fn validate_schema_detects_missing_field() {
        let output = json!({"a": {"b": 1}});
        assert!(validate_schema(&output, &["a.b".to_string()]));
        assert!(!validate_schema(&output, &["a.c".to_string()]));
    }
}
