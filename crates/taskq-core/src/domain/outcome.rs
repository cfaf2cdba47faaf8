//! Job outcome: the value-or-description a unit of work produces.
//!
//! Failures are plain strings, not live error objects, so an outcome can be
//! stored in a record and written to disk as-is.

use std::fmt::Display;

use serde::Serialize;

/// Result of running one unit of work.
pub type JobOutput = Result<serde_json::Value, String>;

/// Convert a typed closure result into a [`JobOutput`].
///
/// A value that cannot be serialized turns into a failure.
pub fn into_output<T, E>(result: Result<T, E>) -> JobOutput
where
    T: Serialize,
    E: Display,
{
    match result {
        Ok(value) => serde_json::to_value(value)
            .map_err(|e| format!("result is not serializable: {e}")),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_values_become_json() {
        let out = into_output::<_, String>(Ok((3, "x")));
        assert_eq!(out, Ok(json!([3, "x"])));
    }

    #[test]
    fn errors_keep_their_description() {
        let out = into_output::<(), _>(Err("boom"));
        assert_eq!(out, Err("boom".to_string()));
    }

    #[test]
    fn unserializable_values_fail() {
        use std::collections::HashMap;
        // JSON object keys must be strings.
        let mut map = HashMap::new();
        map.insert((1, 2), "v");
        let out = into_output::<_, String>(Ok(map));
        assert!(out.unwrap_err().contains("not serializable"));
    }
}
