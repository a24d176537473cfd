//! Recorded random choices of one puzzle instance.
//!
//! A [`Configuration`] is a JSON object keyed by construct name. Sampled
//! pools are stored as `"__N__"` index markers so that replay can tell a
//! recorded index from a literal value.

use std::fs;
use std::path::Path;

use puzzleforge_core::{PuzzleError, Result};
use puzzleforge_expr::Value;
use puzzleforge_sampler::{marker, parse_marker, Row};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// Key holding the recorded query option pools.
pub const QUERIES_KEY: &str = "_queries";

/// Key holding the index of the post-generation baseline solution.
pub const SOLUTION_ID_KEY: &str = "_sol_id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    entries: Map<String, Json>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a JSON object.
    pub fn from_json(json: Json) -> Result<Self> {
        match json {
            Json::Object(entries) => Ok(Self { entries }),
            other => Err(PuzzleError::replay(format!(
                "a configuration must be a JSON object, found {other}"
            ))),
        }
    }

    pub fn to_json(&self) -> Json {
        Json::Object(self.entries.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Json> {
        self.entries.get(key)
    }

    /// The recorded entry for `key`, or a replay error naming it.
    pub fn require(&self, key: &str) -> Result<&Json> {
        self.entries
            .get(key)
            .ok_or_else(|| PuzzleError::replay(format!("configuration has no entry for '{key}'")))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Json) {
        self.entries.insert(key.into(), value);
    }

    /// The recorded option pools of query `name`.
    pub fn query(&self, name: &str) -> Result<&Json> {
        self.require(QUERIES_KEY)?
            .get(name)
            .ok_or_else(|| PuzzleError::replay(format!("configuration has no options for query '{name}'")))
    }

    pub fn insert_query(&mut self, name: &str, value: Json) {
        let queries = self
            .entries
            .entry(QUERIES_KEY)
            .or_insert_with(|| Json::Object(Map::new()));
        if let Json::Object(map) = queries {
            map.insert(name.to_string(), value);
        } else {
            let mut map = Map::new();
            map.insert(name.to_string(), value);
            *queries = Json::Object(map);
        }
    }
}

/// One recorded pool cell.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEntry {
    Index(usize),
    Literal(Value),
}

/// Encodes a `[source][amount]` row as markers.
pub fn encode_row(row: &Row) -> Json {
    Json::Array(
        row.iter()
            .map(|field| Json::Array(field.iter().map(|&i| Json::String(marker(i))).collect()))
            .collect(),
    )
}

/// Encodes a `[domain][dim][source][amount]` batch. One-dimensional draws
/// drop the `dim` level.
pub fn encode_rows(rows: &[Vec<Row>], dim: usize) -> Json {
    Json::Array(
        rows.iter()
            .map(|entry| {
                if dim == 1 {
                    entry.first().map(encode_row).unwrap_or(Json::Array(Vec::new()))
                } else {
                    Json::Array(entry.iter().map(encode_row).collect())
                }
            })
            .collect(),
    )
}

/// Decodes a symbol or condition pool cell. Markers are indices, anything
/// else is a literal value.
pub fn decode_value_entry(json: &Json) -> PoolEntry {
    match json.as_str().and_then(parse_marker) {
        Some(i) => PoolEntry::Index(i),
        None => PoolEntry::Literal(Value::from_json(json)),
    }
}

/// Decodes an option pool cell. Markers and bare non-negative integers are
/// indices.
pub fn decode_index_entry(json: &Json) -> Result<usize> {
    if let Some(i) = json.as_str().and_then(parse_marker) {
        return Ok(i);
    }
    json.as_u64()
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| PuzzleError::replay(format!("option pool entry {json} is not an index")))
}

fn array<'a>(json: &'a Json, what: &str) -> Result<&'a Vec<Json>> {
    json.as_array()
        .ok_or_else(|| PuzzleError::replay(format!("{what} must be a list, found {json}")))
}

/// Decodes a `[source][amount]` row.
pub fn decode_row<T>(json: &Json, cell: &dyn Fn(&Json) -> Result<T>) -> Result<Vec<Vec<T>>> {
    array(json, "a pool row")?
        .iter()
        .map(|field| array(field, "a pool field")?.iter().map(cell).collect())
        .collect()
}

/// Decodes a recorded symbol pool into `[domain][dim][source][amount]`.
pub fn decode_rows(json: &Json, dim: usize) -> Result<Vec<Vec<Vec<Vec<PoolEntry>>>>> {
    let cell = |j: &Json| -> Result<PoolEntry> { Ok(decode_value_entry(j)) };
    array(json, "a pool")?
        .iter()
        .map(|entry| {
            if dim == 1 {
                Ok(vec![decode_row(entry, &cell)?])
            } else {
                array(entry, "a pool entry")?
                    .iter()
                    .map(|row| decode_row(row, &cell))
                    .collect()
            }
        })
        .collect()
}

/// Reads a configuration file.
///
/// A file holding one JSON object is a single configuration. Otherwise every
/// non-blank line must be a JSON record with a `config` field, as written by
/// generation.
pub fn read_configurations(path: impl AsRef<Path>) -> Result<Vec<Configuration>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    if let Ok(json @ Json::Object(_)) = serde_json::from_str::<Json>(&text) {
        let json = match json.get("config") {
            Some(config) if json.get("problem").is_some() => config.clone(),
            _ => json,
        };
        return Ok(vec![Configuration::from_json(json)?]);
    }
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            let record: Json = serde_json::from_str(line).map_err(|e| {
                PuzzleError::replay(format!("{}:{}: {e}", path.display(), n + 1))
            })?;
            match record.get("config") {
                Some(config) => Configuration::from_json(config.clone()),
                None => Err(PuzzleError::replay(format!(
                    "{}:{}: record has no `config` field",
                    path.display(),
                    n + 1
                ))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_rows_encode_as_markers() {
        let rows = vec![vec![vec![vec![0, 3]]], vec![vec![vec![5, 1]]]];
        assert_eq!(encode_rows(&rows, 1), json!([[["__0__", "__3__"]], [["__5__", "__1__"]]]));
        let two_dim = vec![vec![vec![vec![1]], vec![vec![2]]]];
        assert_eq!(encode_rows(&two_dim, 2), json!([[[["__1__"]], [["__2__"]]]]));
    }

    #[test]
    fn test_decode_accepts_literals() {
        let pool = json!([[["__2__", "x"]], [[7]]]);
        let rows = decode_rows(&pool, 1).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0][0][0], PoolEntry::Index(2));
        assert_eq!(rows[0][0][0][1], PoolEntry::Literal(Value::from("x")));
        assert_eq!(rows[1][0][0][0], PoolEntry::Literal(Value::Int(7)));
    }

    #[test]
    fn test_option_entries_accept_bare_indices() {
        assert_eq!(decode_index_entry(&json!("__4__")).unwrap(), 4);
        assert_eq!(decode_index_entry(&json!(3)).unwrap(), 3);
        assert!(matches!(
            decode_index_entry(&json!("three")),
            Err(PuzzleError::Replay(_))
        ));
    }

    #[test]
    fn test_queries_are_nested() {
        let mut config = Configuration::new();
        config.insert("n", json!(4));
        config.insert_query("which", json!({"pool": []}));
        config.insert_query("other", json!({"pool": [[["__1__"]]]}));
        assert_eq!(config.len(), 2);
        assert_eq!(config.query("which").unwrap(), &json!({"pool": []}));
        assert!(config.query("missing").is_err());
        assert!(matches!(config.require("m"), Err(PuzzleError::Replay(_))));
    }

    #[test]
    fn test_read_single_object_and_jsonl() {
        let dir = tempfile::tempdir().unwrap();

        let single = dir.path().join("config.json");
        std::fs::write(&single, r#"{"n": 3, "_sol_id": 0}"#).unwrap();
        let configs = read_configurations(&single).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].get("n"), Some(&json!(3)));

        let lines = dir.path().join("output.jsonl");
        let mut file = std::fs::File::create(&lines).unwrap();
        writeln!(file, r#"{{"problem": "p", "config": {{"n": 3}}}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"problem": "q", "config": {{"n": 5}}}}"#).unwrap();
        drop(file);
        let configs = read_configurations(&lines).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[1].get("n"), Some(&json!(5)));
    }

    #[test]
    fn test_jsonl_record_without_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"problem\": \"p\"}\n{\"problem\": \"q\"}\n").unwrap();
        assert!(matches!(
            read_configurations(&path),
            Err(PuzzleError::Replay(_))
        ));
    }
}
