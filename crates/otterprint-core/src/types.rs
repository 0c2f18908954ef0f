// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the print bridge.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{BridgeError, Result};

/// Unique identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-supplied print options.
///
/// The bridge never interprets option semantics; it only checks the payload
/// has one of the two shapes the backends understand:
///
///   - a JSON array of strings (`["-o landscape", "-n 2"]`), forwarded as-is
///   - a JSON object (`{"paperSize": "A5", "copies": 2}`)
///
/// `null` is accepted and treated like an empty list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrintOptions(Value);

impl Default for PrintOptions {
    fn default() -> Self {
        Self(Value::Array(Vec::new()))
    }
}

impl PrintOptions {
    /// Parse the raw text of an `options` form field.
    ///
    /// Blank input yields the empty list.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| BridgeError::MalformedRequest(format!("options is not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Wrap an already-decoded JSON value, rejecting unsupported shapes.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Array(items) => {
                for item in &items {
                    let Some(entry) = item.as_str() else {
                        return Err(BridgeError::MalformedRequest(
                            "options list may only contain strings".into(),
                        ));
                    };
                    if shlex::split(entry).is_none() {
                        return Err(BridgeError::MalformedRequest(format!(
                            "options entry has unbalanced quoting: {entry}"
                        )));
                    }
                }
                Ok(Self(Value::Array(items)))
            }
            Value::Object(map) => Ok(Self(Value::Object(map))),
            other => Err(BridgeError::MalformedRequest(format!(
                "options must be a JSON array or object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// The option list, when the caller sent an array.
    pub fn as_list(&self) -> Option<Vec<&str>> {
        match &self.0 {
            Value::Array(items) => Some(items.iter().filter_map(Value::as_str).collect()),
            _ => None,
        }
    }

    /// The option list split into shell words, when the caller sent an array.
    ///
    /// `"-o job-name='Quarterly Report'"` yields `-o` and
    /// `job-name=Quarterly Report`. Entries were checked for balanced
    /// quoting on construction.
    pub fn list_tokens(&self) -> Option<Vec<String>> {
        let list = self.as_list()?;
        Some(
            list.into_iter()
                .flat_map(|entry| shlex::split(entry).unwrap_or_default())
                .collect(),
        )
    }

    /// The option map, when the caller sent an object.
    pub fn as_map(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => true,
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A single submission received by the bridge.
///
/// The document bytes themselves are not kept here; they live in the
/// scratch directory for the duration of the dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    /// Target printer. Empty means "let the backend decide".
    pub printer: String,
    pub options: PrintOptions,
    /// File name supplied with the upload, or `"document"`.
    pub document_name: String,
    /// SHA-256 hash of the document bytes.
    pub document_hash: String,
    pub size_bytes: u64,
    pub received_at: DateTime<Utc>,
}

impl PrintJob {
    pub fn new(
        printer: impl Into<String>,
        options: PrintOptions,
        document_name: Option<String>,
        document: &[u8],
    ) -> Self {
        Self {
            id: JobId::new(),
            printer: printer.into(),
            options,
            document_name: document_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "document".into()),
            document_hash: hash_bytes(document),
            size_bytes: document.len() as u64,
            received_at: Utc::now(),
        }
    }

    /// File extension to stage the document with, derived from the uploaded
    /// file name. Falls back to `pdf`.
    pub fn staging_extension(&self) -> String {
        std::path::Path::new(&self.document_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| {
                !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "pdf".into())
    }
}

/// Hex-encoded SHA-256 of a byte slice.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// An installed printer as reported by the host.
///
/// Only `name` is guaranteed across platforms; the rest is passed through
/// from whatever the host reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl PrinterDescriptor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            status: None,
            driver: None,
            is_default: false,
            options: BTreeMap::new(),
        }
    }
}

/// Result of handing a staged document to the print backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    Succeeded,
    /// Backend-reported reason.
    Failed(String),
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Succeeded => Ok(()),
            Self::Failed(reason) => Err(BridgeError::DispatchRejected(reason)),
        }
    }
}

/// Standard paper sizes understood by the Windows print backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A3,
    A4,
    A5,
    Letter,
    Legal,
    Tabloid,
}

impl PaperSize {
    /// Keyword used in a `-print-settings` string.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::A3 => "A3",
            Self::A4 => "A4",
            Self::A5 => "A5",
            Self::Letter => "letter",
            Self::Legal => "legal",
            Self::Tabloid => "tabloid",
        }
    }
}

/// Lifecycle states of the bridge's HTTP listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Listening,
    Draining,
}
