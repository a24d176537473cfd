//! Reading specification documents from YAML, JSON or TOML.

use std::path::Path;

use puzzleforge_core::{PuzzleError, Result};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::document::*;

/// Document syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Toml,
}

impl Format {
    /// Picks the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Some(Format::Yaml),
            Some("json") => Some(Format::Json),
            Some("toml") => Some(Format::Toml),
            _ => None,
        }
    }

    fn parse(self, text: &str) -> Result<serde_json::Value> {
        let parsed = match self {
            Format::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(text).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| PuzzleError::schema("<document>", format!("invalid {self:?}: {message}")))
    }
}

impl Specification {
    /// Loads and validates a specification file. Unknown extensions are
    /// tried as YAML, then JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let spec = match Format::from_path(path) {
            Some(format) => Self::from_str_as(&text, format)?,
            None => {
                let doc = Format::Yaml.parse(&text).or_else(|_| Format::Json.parse(&text))?;
                Self::from_value(doc)?
            }
        };
        debug!(
            event = "spec_loaded",
            path = %path.display(),
            variables = spec.variables.len(),
            symbols = spec.symbols.len(),
            conditions = spec.conditions.len(),
            queries = spec.queries.len(),
        );
        Ok(spec)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Self::from_str_as(text, Format::Yaml)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::from_str_as(text, Format::Json)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Self::from_str_as(text, Format::Toml)
    }

    pub fn from_str_as(text: &str, format: Format) -> Result<Self> {
        Self::from_value(format.parse(text)?)
    }

    /// Builds a specification from an already parsed document tree.
    pub fn from_value(doc: serde_json::Value) -> Result<Self> {
        let spec: Specification = match serde_json::from_value(doc.clone()) {
            Ok(spec) => spec,
            Err(e) => return Err(locate(&doc, e)),
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PuzzleError::schema("<document>", e.to_string()))
    }
}

fn entry<T: DeserializeOwned>(path: String, raw: &serde_json::Value) -> Option<PuzzleError> {
    serde_json::from_value::<T>(raw.clone())
        .err()
        .map(|e| PuzzleError::schema(path, e.to_string()))
}

fn section<T: DeserializeOwned>(doc: &serde_json::Value, name: &str) -> Option<PuzzleError> {
    doc.get(name)?
        .as_object()?
        .iter()
        .find_map(|(key, raw)| entry::<T>(format!("{name}.{key}"), raw))
}

/// Narrows a whole-document deserialization error down to the first
/// offending entry so the message carries a field path.
fn locate(doc: &serde_json::Value, err: serde_json::Error) -> PuzzleError {
    if !doc.is_object() {
        return PuzzleError::schema("<document>", "expected a mapping at the top level");
    }
    section::<Variable>(doc, "variables")
        .or_else(|| section::<Symbol>(doc, "symbols"))
        .or_else(|| section::<Condition>(doc, "conditions"))
        .or_else(|| section::<Query>(doc, "queries"))
        .or_else(|| {
            doc.get("post_generation")
                .filter(|raw| !raw.is_null())
                .and_then(|raw| entry::<PostGeneration>("post_generation".into(), raw))
        })
        .or_else(|| {
            doc.get("optimize")
                .filter(|raw| !raw.is_null())
                .and_then(|raw| entry::<Optimization>("optimize".into(), raw))
        })
        .unwrap_or_else(|| PuzzleError::schema("<document>", err.to_string()))
}
