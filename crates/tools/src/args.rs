//! Typed accessors over validated tool arguments.
//!
//! Models occasionally send numbers as strings ("5") or integers where a
//! float is expected; these helpers accept both.

use erpilot_core::error::ToolError;
use erpilot_core::tool::ToolArgs;
use serde_json::Value;

pub(crate) fn string(args: &ToolArgs, name: &str) -> Result<String, ToolError> {
    match args.get(name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(ToolError::InvalidArguments(format!(
            "'{name}' must not be empty"
        ))),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ToolError::InvalidArguments(format!("'{name}' must be a string"))),
    }
}

pub(crate) fn optional_string(args: &ToolArgs, name: &str) -> Option<String> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

pub(crate) fn number(args: &ToolArgs, name: &str) -> Result<f64, ToolError> {
    let value = args.get(name);
    value
        .and_then(Value::as_f64)
        .or_else(|| value.and_then(Value::as_str).and_then(|s| s.trim().parse().ok()))
        .filter(|n: &f64| n.is_finite())
        .ok_or_else(|| ToolError::InvalidArguments(format!("'{name}' must be a number")))
}

pub(crate) fn integer(args: &ToolArgs, name: &str) -> Result<i64, ToolError> {
    let value = args.get(name);
    value
        .and_then(Value::as_i64)
        .or_else(|| {
            value
                .and_then(Value::as_f64)
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        })
        .or_else(|| value.and_then(Value::as_str).and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| ToolError::InvalidArguments(format!("'{name}' must be an integer")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(v: Value) -> ToolArgs {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn string_trims_and_rejects_blank() {
        let a = args(json!({"order_name": " SO001 ", "blank": "  "}));
        assert_eq!(string(&a, "order_name").unwrap(), "SO001");
        assert!(string(&a, "blank").is_err());
        assert!(string(&a, "missing").is_err());
    }

    #[test]
    fn number_accepts_strings_and_integers() {
        let a = args(json!({"a": 5, "b": "7.5", "c": "lots"}));
        assert_eq!(number(&a, "a").unwrap(), 5.0);
        assert_eq!(number(&a, "b").unwrap(), 7.5);
        assert!(number(&a, "c").is_err());
    }

    #[test]
    fn integer_rejects_fractions() {
        let a = args(json!({"a": 3, "b": 3.0, "c": 3.5, "d": "4"}));
        assert_eq!(integer(&a, "a").unwrap(), 3);
        assert_eq!(integer(&a, "b").unwrap(), 3);
        assert!(integer(&a, "c").is_err());
        assert_eq!(integer(&a, "d").unwrap(), 4);
    }

    #[test]
    fn optional_string_ignores_blank_and_non_strings() {
        let a = args(json!({"email": "", "phone": 5551234, "name": "Jane"}));
        assert_eq!(optional_string(&a, "email"), None);
        assert_eq!(optional_string(&a, "phone"), None);
        assert_eq!(optional_string(&a, "name").as_deref(), Some("Jane"));
    }
}
