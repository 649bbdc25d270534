//! Document rendering.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Serializer;
use tracing::warn;

/// Pretty-print a document as JSON with a 4-space indent.
///
/// Never fails: if `value` cannot be represented as JSON, its debug form is
/// returned instead.
pub fn render_json<T: Serialize + std::fmt::Debug>(value: &T) -> String {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);

    match value.serialize(&mut serializer) {
        Ok(()) => String::from_utf8(buffer).unwrap_or_else(|e| {
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }),
        Err(e) => {
            warn!(error = %e, "Document is not representable as JSON, rendering as text");
            format!("{:?}", value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_four_space_indent_and_order() {
        let rendered = render_json(&json!({"summary": "Login fails", "labels": ["auth"]}));
        assert_eq!(
            rendered,
            "{\n    \"summary\": \"Login fails\",\n    \"labels\": [\n        \"auth\"\n    ]\n}"
        );
    }

    #[test]
    fn test_unicode_kept() {
        assert_eq!(render_json(&json!("Grüße")), "\"Grüße\"");
    }

    #[test]
    fn test_unrepresentable_falls_back_to_text() {
        // Non-string map keys cannot be JSON object keys
        let mut value = HashMap::new();
        value.insert((1, 2), "pair");
        assert_eq!(render_json(&value), "{(1, 2): \"pair\"}");
    }
}
