//! Small utility helpers used across modules.

use serde_json::Value;

/// Text form of a loosely-typed JSON field: strings as-is, numbers and
/// booleans via their JSON spelling, missing or null as "".
pub fn value_to_text(v: Option<&Value>) -> String {
  match v {
    None | Some(Value::Null) => String::new(),
    Some(Value::String(s)) => s.clone(),
    Some(other) => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn value_to_text_variants() {
    assert_eq!(value_to_text(None), "");
    assert_eq!(value_to_text(Some(&json!(null))), "");
    assert_eq!(value_to_text(Some(&json!("abc"))), "abc");
    assert_eq!(value_to_text(Some(&json!(1234))), "1234");
    assert_eq!(value_to_text(Some(&json!(true))), "true");
  }
}
