//!
//! Deep merge of two TOML documents: user values override the defaults key by key.
//!
//! Tables merge recursively. Every other value, arrays included, is replaced
//! as a whole so that a user list never gets appended to a default list.
//!

use toml::{map::Map, Value};

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("incompatible types at \"{path}\": expected {expected}, found {found}")]
pub struct MergeError {
    pub path: String,
    pub expected: &'static str,
    pub found: &'static str,
}

pub fn merge(defaults: Value, overrides: Value) -> Result<Value, MergeError> {
    merge_at(defaults, overrides, "$")
}

fn merge_at(defaults: Value, overrides: Value, path: &str) -> Result<Value, MergeError> {
    match (defaults, overrides) {
        (Value::Table(mut table), Value::Table(overrides)) => {
            merge_tables(&mut table, overrides, path)?;
            Ok(Value::Table(table))
        }
        (d, o) if d.same_type(&o) => Ok(o),
        (d, o) => Err(MergeError {
            path: path.to_owned(),
            expected: d.type_str(),
            found: o.type_str(),
        }),
    }
}

fn merge_tables(
    table: &mut Map<String, Value>,
    overrides: Map<String, Value>,
    path: &str,
) -> Result<(), MergeError> {
    for (key, value) in overrides {
        let merged = match table.remove(&key) {
            Some(existing) => merge_at(existing, value, &format!("{path}.{key}"))?,
            None => value,
        };
        table.insert(key, merged);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged(defaults: &str, overrides: &str) -> Result<Value, MergeError> {
        merge(defaults.parse().unwrap(), overrides.parse().unwrap())
    }

    #[test]
    fn overrides_scalars_and_keeps_the_rest() {
        let result = merged(
            "[retry]\nmax_retries = 3\ninitial_delay_ms = 200\n",
            "[retry]\nmax_retries = 5\n",
        )
        .unwrap();
        let expected: Value = "[retry]\nmax_retries = 5\ninitial_delay_ms = 200\n"
            .parse()
            .unwrap();
        assert_eq!(result, expected);
    }

    #[test]
    fn adds_unknown_keys() {
        let result = merged("[verifier]\nkind = \"yggdrasil\"\n", "[verifier]\npublic_key = \"ab\"\n")
            .unwrap();
        assert_eq!(result["verifier"]["kind"].as_str(), Some("yggdrasil"));
        assert_eq!(result["verifier"]["public_key"].as_str(), Some("ab"));
    }

    #[test]
    fn replaces_arrays() {
        let result = merged("levels = [\"a\", \"b\"]", "levels = [\"c\"]").unwrap();
        assert_eq!(result, "levels = [\"c\"]".parse::<Value>().unwrap());
    }

    #[test]
    fn rejects_type_mismatch() {
        let err = merged("[registry]\nttl_s = 600\n", "[registry]\nttl_s = \"ten\"\n").unwrap_err();
        assert_eq!(err.path, "$.registry.ttl_s");
        assert_eq!(err.expected, "integer");
        assert_eq!(err.found, "string");
    }
}
