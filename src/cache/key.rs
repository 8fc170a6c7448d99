//! Cache key derivation.

use color_eyre::{eyre::eyre, Result};
use serde::Serialize;

/// Separator between the topic name and the serialized params.
pub const PARAMS_SEPARATOR: char = '@';

/// Derive the cache key for a topic and its optional params.
///
/// The key is `topic` when there are no params and `topic@<json>` otherwise.
/// Params are converted to a `serde_json::Value` first, whose object maps keep
/// their keys sorted, so two structurally equal param objects always produce
/// the same key regardless of field order.
pub fn cache_key<P>(topic: &str, params: Option<&P>) -> Result<String>
where
  P: Serialize + ?Sized,
{
  match params {
    None => Ok(topic.to_string()),
    Some(params) => {
      let value = serde_json::to_value(params)
        .map_err(|e| eyre!("Failed to serialize params for {}: {}", topic, e))?;
      let json = serde_json::to_string(&value)
        .map_err(|e| eyre!("Failed to serialize params for {}: {}", topic, e))?;
      Ok(format!("{}{}{}", topic, PARAMS_SEPARATOR, json))
    }
  }
}

/// Topic portion of a cache key (everything before the first `@`).
pub fn topic_of(key: &str) -> &str {
  key
    .split_once(PARAMS_SEPARATOR)
    .map_or(key, |(topic, _)| topic)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::collections::HashMap;

  #[test]
  fn test_no_params_is_bare_topic() {
    let key = cache_key::<()>("employees", None).unwrap();
    assert_eq!(key, "employees");
  }

  #[test]
  fn test_params_are_appended() {
    let key = cache_key("paginatedTransactions", Some(&json!({ "page": 0 }))).unwrap();
    assert_eq!(key, r#"paginatedTransactions@{"page":0}"#);
  }

  #[test]
  fn test_field_order_is_irrelevant() {
    #[derive(Serialize)]
    struct Forward {
      a: u32,
      b: &'static str,
    }

    #[derive(Serialize)]
    struct Backward {
      b: &'static str,
      a: u32,
    }

    let forward = cache_key("topic", Some(&Forward { a: 1, b: "x" })).unwrap();
    let backward = cache_key("topic", Some(&Backward { b: "x", a: 1 })).unwrap();
    assert_eq!(forward, backward);

    let mut map = HashMap::new();
    map.insert("b", json!("x"));
    map.insert("a", json!(1));
    assert_eq!(cache_key("topic", Some(&map)).unwrap(), forward);
  }

  #[test]
  fn test_different_params_differ() {
    let a = cache_key("transactionsByEmployee", Some(&json!({ "employeeId": "e1" }))).unwrap();
    let b = cache_key("transactionsByEmployee", Some(&json!({ "employeeId": "e2" }))).unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn test_topic_of() {
    assert_eq!(topic_of("employees"), "employees");
    assert_eq!(topic_of(r#"transactionsByEmployee@{"employeeId":"a@b"}"#), "transactionsByEmployee");
  }
}
