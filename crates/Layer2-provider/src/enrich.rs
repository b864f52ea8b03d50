//! Folds input examples into tool descriptions
//!
//! Some providers accept input examples natively; for the rest, appending
//! them to the description measurably improves call accuracy.

use serde_json::Value;

/// Append a normalized "Input examples:" block to a description.
///
/// Returns the description unchanged when there are no examples.
pub fn enrich_description_with_examples(description: &str, examples: &[Value]) -> String {
    if examples.is_empty() {
        return description.to_string();
    }

    let mut result = String::from(description);
    result.push_str("\n\nInput examples:\n");
    for (i, example) in examples.iter().enumerate() {
        let compact = serde_json::to_string(example).unwrap_or_else(|_| "{}".to_string());
        result.push_str(&format!("Example {}: {}\n", i + 1, compact));
    }
    result.trim_end().to_string()
}

/// Render examples as indented `key: value` lines for humans
pub fn format_examples_readable(examples: &[Value]) -> String {
    if examples.is_empty() {
        return String::new();
    }

    let mut result = String::new();
    for (i, example) in examples.iter().enumerate() {
        if i > 0 {
            result.push('\n');
        }
        result.push_str(&format!("Example {}:\n", i + 1));
        match example {
            Value::Object(map) => {
                for (key, value) in map {
                    result.push_str(&format!("  {}: {}\n", key, value));
                }
            }
            other => {
                result.push_str(&format!("  {}\n", other));
            }
        }
    }
    result.trim_end().to_string()
}

/// Validate an example set against tool-authoring conventions.
///
/// Non-fatal: returns findings as strings. Used by tool-definition tests,
/// never at runtime.
pub fn validate_examples(examples: &[Value], required_fields: &[&str]) -> Vec<String> {
    let mut findings = Vec::new();

    if examples.len() < 2 {
        findings.push("At least 2 examples are recommended".to_string());
    }
    if examples.len() > 4 {
        findings.push("At most 4 examples are recommended".to_string());
    }

    for (i, example) in examples.iter().enumerate() {
        for field in required_fields {
            if example.get(field).is_none() {
                findings.push(format!(
                    "Example {} is missing required field: {}",
                    i + 1,
                    field
                ));
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enrich_noop_on_empty() {
        let description = "This is a tool.";
        assert_eq!(enrich_description_with_examples(description, &[]), description);
    }

    #[test]
    fn test_enrich_appends_examples() {
        let description = "Records a metric for the user.";
        let examples = vec![
            json!({"type": "weight", "value": 82.5, "unit": "kg"}),
            json!({"type": "expense", "value": 150, "category": "food"}),
        ];
        let result = enrich_description_with_examples(description, &examples);

        assert!(result.contains("Records a metric for the user."));
        assert!(result.contains("Input examples:"));
        assert!(result.contains("Example 1:"));
        assert!(result.contains(r#""type":"weight""#));
        assert!(result.contains("Example 2:"));
        assert!(result.contains(r#""type":"expense""#));
    }

    #[test]
    fn test_enrich_single_example() {
        let result = enrich_description_with_examples("Test tool.", &[json!({"query": "test"})]);
        assert!(result.contains("Example 1:"));
        assert!(!result.contains("Example 2:"));
    }

    #[test]
    fn test_readable_empty() {
        assert_eq!(format_examples_readable(&[]), "");
    }

    #[test]
    fn test_readable_formats_fields() {
        let examples = vec![
            json!({"type": "weight", "value": 82.5}),
            json!({"type": "expense", "value": 150}),
        ];
        let result = format_examples_readable(&examples);

        assert!(result.contains("Example 1:"));
        assert!(result.contains(r#"type: "weight""#));
        assert!(result.contains("value: 82.5"));
        assert!(result.contains("Example 2:"));
        assert!(result.contains(r#"type: "expense""#));
    }

    #[test]
    fn test_validate_count_bounds() {
        let too_few = vec![json!({"query": "test"})];
        assert!(validate_examples(&too_few, &["query"])
            .contains(&"At least 2 examples are recommended".to_string()));

        let too_many: Vec<Value> = (0..5).map(|i| json!({ "query": i.to_string() })).collect();
        assert!(validate_examples(&too_many, &["query"])
            .contains(&"At most 4 examples are recommended".to_string()));
    }

    #[test]
    fn test_validate_missing_fields() {
        let examples = vec![json!({"query": "test1"}), json!({"name": "test2"})];
        let findings = validate_examples(&examples, &["query"]);
        assert!(findings.contains(&"Example 2 is missing required field: query".to_string()));
    }

    #[test]
    fn test_validate_ok() {
        let examples = vec![
            json!({"query": "test1", "type": "fact"}),
            json!({"query": "test2", "type": "preference"}),
        ];
        assert!(validate_examples(&examples, &["query"]).is_empty());
    }
}
