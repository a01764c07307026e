//! Classification of command output.

use serde_json::Value;

/// What a command printed, reduced to the shapes the runner can record.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    /// A single number.
    Scalar(f64),
    /// A flat mapping of component name to number, in output order.
    ComponentMap(Vec<(String, f64)>),
    /// Anything else: text, lists, nested mappings, empty output.
    Unsupported,
}

/// Classify trimmed standard output.
///
/// Accepts a finite numeric literal, or a flat mapping written either as a
/// JSON object or with single-quoted keys (`{'a': 1}`). Every mapping value
/// must be a number, otherwise the whole output is unsupported.
pub fn classify(stdout: &str) -> ParsedValue {
    let text = stdout.trim();

    if text.starts_with('{') {
        return parse_mapping(text)
            .map(ParsedValue::ComponentMap)
            .unwrap_or(ParsedValue::Unsupported);
    }

    match parse_number(text) {
        Some(value) => ParsedValue::Scalar(value),
        None => ParsedValue::Unsupported,
    }
}

fn parse_number(text: &str) -> Option<f64> {
    // `f64::from_str` also takes "inf"/"nan"; only plain literals count.
    if !text.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.')) {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Rewrite single-quoted strings as JSON strings, leaving double-quoted
/// ones untouched.
fn requote(text: &str) -> String {
    #[derive(Clone, Copy)]
    enum State {
        Outside,
        Double,
        Single,
    }

    let mut out = String::with_capacity(text.len());
    let mut state = State::Outside;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match (state, c) {
            (State::Outside, '\'') => {
                out.push('"');
                state = State::Single;
            }
            (State::Outside, '"') => {
                out.push('"');
                state = State::Double;
            }
            (State::Double, '\\') => {
                out.push('\\');
                out.extend(chars.next());
            }
            (State::Double, '"') | (State::Single, '\'') => {
                out.push('"');
                state = State::Outside;
            }
            (State::Single, '\\') => match chars.next() {
                Some('\'') => out.push('\''),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            (State::Single, '"') => out.push_str("\\\""),
            (_, c) => out.push(c),
        }
    }
    out
}

fn parse_mapping(text: &str) -> Option<Vec<(String, f64)>> {
    let object = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => object,
        Ok(_) => return None,
        Err(_) => match serde_json::from_str::<Value>(&requote(text)) {
            Ok(Value::Object(object)) => object,
            _ => return None,
        },
    };

    object
        .into_iter()
        .map(|(key, value)| match value {
            Value::Number(n) => n.as_f64().map(|v| (key, v)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar() {
        assert_eq!(classify("42"), ParsedValue::Scalar(42.0));
        assert_eq!(classify("-0.5\n"), ParsedValue::Scalar(-0.5));
        assert_eq!(classify("1e3"), ParsedValue::Scalar(1000.0));
    }

    #[test]
    fn test_json_mapping_keeps_order() {
        assert_eq!(
            classify(r#"{"b": 2.5, "a": 1}"#),
            ParsedValue::ComponentMap(vec![("b".to_string(), 2.5), ("a".to_string(), 1.0)])
        );
    }

    #[test]
    fn test_single_quoted_mapping() {
        assert_eq!(
            classify("{'sda': 10, 'sdb': 20}"),
            ParsedValue::ComponentMap(vec![("sda".to_string(), 10.0), ("sdb".to_string(), 20.0)])
        );
    }

    #[test]
    fn test_single_quoted_keys_with_inner_quotes() {
        assert_eq!(
            classify(r#"{'a"b': 1, "it's": 2, 'don\'t': 3}"#),
            ParsedValue::ComponentMap(vec![
                ("a\"b".to_string(), 1.0),
                ("it's".to_string(), 2.0),
                ("don't".to_string(), 3.0),
            ])
        );
    }

    #[test]
    fn test_empty_mapping() {
        assert_eq!(classify("{}"), ParsedValue::ComponentMap(Vec::new()));
    }

    #[test]
    fn test_unsupported() {
        for output in [
            "",
            "oops",
            "\"oops\"",
            "[1, 2]",
            "nan",
            "inf",
            "1 2",
            r#"{"a": "high"}"#,
            r#"{"a": {"b": 1}}"#,
            r#"{"a": 1"#,
        ] {
            assert_eq!(classify(output), ParsedValue::Unsupported, "output: {output:?}");
        }
    }
}
