//! Answer sets: the cumulative answer state of a work session.
//!
//! An [`AnswerSet`] maps variable names to typed values. It is exchanged with
//! the engine as a JSON answer document:
//!
//! ```json
//! { "version": "1", "answers": { "ClientName": { "type": "text", "value": "Ada" } } }
//! ```
//!
//! Two mutations exist: [`AnswerSet::load`] replaces the whole set and
//! [`AnswerSet::overlay`] merges another set on top, the incoming value
//! winning for every variable it defines.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AnswerError;

const DOCUMENT_VERSION: &str = "1";

/// A single typed answer value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    TrueFalse(bool),
    MultipleChoice(Vec<String>),
    /// One value per repetition of a repeated dialog.
    Repeated(Vec<AnswerValue>),
    /// The variable is known but explicitly has no answer.
    Unanswered,
}

impl AnswerValue {
    /// False for a NaN or infinite number, including inside repeated values.
    pub fn is_finite(&self) -> bool {
        match self {
            AnswerValue::Number(n) => n.is_finite(),
            AnswerValue::Repeated(values) => values.iter().all(AnswerValue::is_finite),
            _ => true,
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Text(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        AnswerValue::Text(value)
    }
}

impl From<f64> for AnswerValue {
    fn from(value: f64) -> Self {
        AnswerValue::Number(value)
    }
}

impl From<bool> for AnswerValue {
    fn from(value: bool) -> Self {
        AnswerValue::TrueFalse(value)
    }
}

impl From<NaiveDate> for AnswerValue {
    fn from(value: NaiveDate) -> Self {
        AnswerValue::Date(value)
    }
}

/// The named answers of a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerSet {
    answers: BTreeMap<String, AnswerValue>,
}

/// Wire form of an answer set.
#[derive(Serialize, Deserialize)]
struct AnswerDocument {
    version: String,
    #[serde(default)]
    answers: BTreeMap<String, AnswerValue>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON answer document. Blank input yields an empty set.
    pub fn from_document(document: &str) -> Result<Self, AnswerError> {
        if document.trim().is_empty() {
            return Ok(Self::new());
        }
        let doc: AnswerDocument =
            serde_json::from_str(document).map_err(|e| AnswerError::Parse(e.to_string()))?;
        if doc.version != DOCUMENT_VERSION {
            return Err(AnswerError::UnsupportedVersion(doc.version));
        }
        Ok(Self {
            answers: doc.answers,
        })
    }

    /// Serialize this set as a JSON answer document.
    ///
    /// Fails if a number answer is NaN or infinite, which JSON cannot carry.
    pub fn to_document(&self) -> Result<String, AnswerError> {
        if let Some(name) = self
            .answers
            .iter()
            .find_map(|(name, value)| (!value.is_finite()).then_some(name))
        {
            return Err(AnswerError::NonFiniteNumber(name.clone()));
        }
        let doc = AnswerDocument {
            version: DOCUMENT_VERSION.to_string(),
            answers: self.answers.clone(),
        };
        serde_json::to_string(&doc).map_err(|e| AnswerError::Parse(e.to_string()))
    }

    /// Replace the entire set with `other`.
    pub fn load(&mut self, other: AnswerSet) {
        self.answers = other.answers;
    }

    /// Merge `other` on top of this set. Variables absent from `other` are untouched.
    pub fn overlay(&mut self, other: &AnswerSet) {
        for (name, value) in &other.answers {
            self.answers.insert(name.clone(), value.clone());
        }
    }

    /// Parse `document` and replace this set with it.
    pub fn load_document(&mut self, document: &str) -> Result<(), AnswerError> {
        self.load(Self::from_document(document)?);
        Ok(())
    }

    /// Parse `document` and overlay it onto this set.
    pub fn overlay_document(&mut self, document: &str) -> Result<(), AnswerError> {
        let incoming = Self::from_document(document)?;
        self.overlay(&incoming);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AnswerValue> {
        self.answers.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AnswerValue>) {
        self.answers.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<AnswerValue> {
        self.answers.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.answers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Variable names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.answers.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnswerValue)> {
        self.answers.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for AnswerSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        AnswerDocument {
            version: DOCUMENT_VERSION.to_string(),
            answers: self.answers.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AnswerSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let doc = AnswerDocument::deserialize(deserializer)?;
        if doc.version != DOCUMENT_VERSION {
            return Err(serde::de::Error::custom(format!(
                "unsupported answer document version {}",
                doc.version
            )));
        }
        Ok(Self {
            answers: doc.answers,
        })
    }
}

impl<K: Into<String>, V: Into<AnswerValue>> FromIterator<(K, V)> for AnswerSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            answers: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
