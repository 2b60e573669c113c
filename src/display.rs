//! Display formatting for management values
//!
//! Responses are rendered in DMR notation, one entry per line, nested
//! values indented by four spaces. Lists and objects short enough to fit
//! the terminal width stay on one line.

use crate::value::ModelValue;

const INDENT: &str = "    ";

/// Format a value for terminal display
pub fn format_value(val: &ModelValue, max_width: usize) -> String {
    let mut out = String::new();
    write_value(&mut out, val, 0, max_width);
    out
}

fn write_value(out: &mut String, val: &ModelValue, level: usize, max_width: usize) {
    let compact = format_value_inline(val);
    let fits = INDENT.len() * level + compact.len() <= max_width;
    match val {
        ModelValue::Object(map) if !map.is_empty() && !fits => {
            out.push_str("{\n");
            let last = map.len() - 1;
            for (i, (key, value)) in map.iter().enumerate() {
                out.push_str(&INDENT.repeat(level + 1));
                out.push_str(&format!("\"{}\" => ", key));
                write_value(out, value, level + 1, max_width);
                if i < last {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&INDENT.repeat(level));
            out.push('}');
        }
        ModelValue::List(items) if !items.is_empty() && !fits => {
            out.push_str("[\n");
            let last = items.len() - 1;
            for (i, item) in items.iter().enumerate() {
                out.push_str(&INDENT.repeat(level + 1));
                write_value(out, item, level + 1, max_width);
                if i < last {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&INDENT.repeat(level));
            out.push(']');
        }
        _ => out.push_str(&compact),
    }
}

/// Format a value on a single line
pub fn format_value_inline(val: &ModelValue) -> String {
    val.to_string()
}

/// Format a value for the `vars` listing (very compact)
pub fn format_value_hint(val: &ModelValue) -> String {
    match val {
        ModelValue::List(items) if items.len() > 5 => format!("[...{}]", items.len()),
        ModelValue::Object(map) if map.len() > 5 => format!("{{...{}}}", map.len()),
        other => truncate_str(&other.to_string(), 60),
    }
}

/// Truncate a string to max width, adding ellipsis if needed
fn truncate_str(s: &str, max_width: usize) -> String {
    if s.chars().count() <= max_width {
        s.to_string()
    } else if max_width <= 1 {
        ".".to_string()
    } else {
        let kept: String = s.chars().take(max_width - 1).collect();
        format!("{}…", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> ModelValue {
        ModelValue::object()
            .with("outcome", ModelValue::string("success"))
            .with(
                "result",
                ModelValue::List(vec![ModelValue::string("app.war"), ModelValue::string("b.war")]),
            )
    }

    #[test]
    fn test_format_wide_stays_inline() {
        let result = format_value(&response(), 200);
        assert_eq!(result, r#"{"outcome" => "success","result" => ["app.war","b.war"]}"#);
    }

    #[test]
    fn test_format_narrow_breaks_lines() {
        let result = format_value(&response(), 30);
        assert_eq!(
            result,
            "{\n    \"outcome\" => \"success\",\n    \"result\" => [\"app.war\",\"b.war\"]\n}"
        );
    }

    #[test]
    fn test_format_scalars() {
        assert_eq!(format_value(&ModelValue::Int(5), 10), "5");
        assert_eq!(format_value(&ModelValue::object(), 1), "{}");
        assert_eq!(format_value(&ModelValue::List(vec![]), 1), "[]");
    }

    #[test]
    fn test_hint() {
        let long = ModelValue::List((0..10).map(ModelValue::Int).collect());
        assert_eq!(format_value_hint(&long), "[...10]");
        assert_eq!(format_value_hint(&ModelValue::string("x")), "\"x\"");
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 5), "hell…");
        assert_eq!(truncate_str("hi", 2), "hi");
    }
}
