/*!
 * Glossary mapping and loader for terminology consistency.
 *
 * A glossary is an ordered set of `(source term, target term)` pairs with
 * unique source terms. Externally supplied glossaries are JSON objects whose
 * keys and values must all be strings; duplicate keys are rejected rather
 * than silently collapsed, which is why the loader walks the object itself
 * instead of deserializing into a map.
 */

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::errors::PipelineError;

/// A single glossary pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub source: String,
    pub target: String,
}

/// Ordered term mapping threaded into prompts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlossaryMapping {
    terms: Vec<GlossaryTerm>,
}

impl GlossaryMapping {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapping from pairs, rejecting empty or duplicate source terms
    pub fn from_pairs<I, S, T>(pairs: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let mut mapping = Self::new();
        for (source, target) in pairs {
            mapping.insert(source.into(), target.into())?;
        }
        Ok(mapping)
    }

    fn insert(&mut self, source: String, target: String) -> Result<(), PipelineError> {
        let source_trimmed = source.trim();
        if source_trimmed.is_empty() {
            return Err(PipelineError::GlossaryInvalid("empty source term".to_string()));
        }
        if target.trim().is_empty() {
            return Err(PipelineError::GlossaryInvalid(format!(
                "empty target term for '{}'",
                source_trimmed
            )));
        }
        if self.get(source_trimmed).is_some() {
            return Err(PipelineError::GlossaryInvalid(format!(
                "duplicate source term '{}'",
                source_trimmed
            )));
        }
        self.terms.push(GlossaryTerm {
            source: source_trimmed.to_string(),
            target: target.trim().to_string(),
        });
        Ok(())
    }

    /// Target term for a source term
    pub fn get(&self, source: &str) -> Option<&str> {
        self.terms
            .iter()
            .find(|t| t.source == source)
            .map(|t| t.target.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlossaryTerm> {
        self.terms.iter()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether `line` restates one of the pairs, e.g. `- API → 接口` or `API: 接口`
    pub fn echoes_pair(&self, line: &str) -> bool {
        let body = line
            .trim()
            .trim_start_matches(['-', '*', '•'])
            .trim();
        if body.is_empty() {
            return false;
        }
        self.terms.iter().any(|term| {
            let Some(rest) = body.strip_prefix(term.source.as_str()) else {
                return false;
            };
            let rest = rest
                .trim_start()
                .trim_start_matches(['→', ':', '：', '=', '-', '>'])
                .trim();
            rest == term.target
        })
    }
}

impl Serialize for GlossaryMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.terms.len()))?;
        for term in &self.terms {
            map.serialize_entry(&term.source, &term.target)?;
        }
        map.end()
    }
}

struct MappingVisitor;

impl<'de> Visitor<'de> for MappingVisitor {
    type Value = GlossaryMapping;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object of string terms to string translations")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut mapping = GlossaryMapping::new();
        let mut seen = HashSet::new();
        while let Some(key) = access.next_key::<String>()? {
            if !seen.insert(key.clone()) {
                return Err(de::Error::custom(format!("duplicate source term '{}'", key)));
            }
            let value = access.next_value::<serde_json::Value>()?;
            let target = value.as_str().ok_or_else(|| {
                de::Error::custom(format!("translation for '{}' must be a string, found {}", key, value))
            })?;
            mapping
                .insert(key, target.to_string())
                .map_err(de::Error::custom)?;
        }
        Ok(mapping)
    }
}

impl<'de> Deserialize<'de> for GlossaryMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MappingVisitor)
    }
}

/// Validates externally supplied glossaries before they reach the prompt renderer
pub struct GlossaryLoader;

impl GlossaryLoader {
    /// Parse a JSON object of term translations
    pub fn from_json_str(json: &str) -> Result<GlossaryMapping, PipelineError> {
        serde_json::from_str::<GlossaryMapping>(json)
            .map_err(|e| PipelineError::GlossaryInvalid(e.to_string()))
    }

    /// Validate an already parsed JSON value
    pub fn from_value(value: &serde_json::Value) -> Result<GlossaryMapping, PipelineError> {
        let object = value.as_object().ok_or_else(|| {
            PipelineError::GlossaryInvalid(format!("expected an object, found {}", value))
        })?;
        let mut mapping = GlossaryMapping::new();
        for (key, value) in object {
            let target = value.as_str().ok_or_else(|| {
                PipelineError::GlossaryInvalid(format!(
                    "translation for '{}' must be a string, found {}",
                    key, value
                ))
            })?;
            mapping.insert(key.clone(), target.to_string())?;
        }
        Ok(mapping)
    }

    /// Load a glossary file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<GlossaryMapping, PipelineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::GlossaryInvalid(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }
}
