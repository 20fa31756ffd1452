//! # Service descriptor: what a script reports about itself.
//!
//! A script invoked with the single argument `info` must print a JSON
//! document describing one logical service and its endpoints. This module is
//! the sole gate between that duck-typed contract and the typed runtime:
//! [`ServiceDescriptor::parse`] deserializes the bytes and
//! [`ServiceDescriptor::validate`] enforces the structural invariants.
//!
//! ## Rules
//! - `name` must be non-empty after trimming; it is the grouping key.
//! - `endpoints` must be non-empty; endpoint names and subjects must each be
//!   unique within the descriptor.
//! - Subjects are restricted to letters, digits, `.`, `-`, `_`.
//! - Unknown JSON fields are ignored; missing fields are never coerced.
//!
//! ## Example
//! ```
//! use shellvisor::descriptor::ServiceDescriptor;
//!
//! let raw = br#"{
//!     "name": "Sys",
//!     "version": "1.0.0",
//!     "endpoints": [{"name": "Facts", "subject": "sys.facts"}]
//! }"#;
//! let descriptor = ServiceDescriptor::parse(raw).unwrap();
//! descriptor.validate().unwrap();
//! assert_eq!(descriptor.name, "Sys");
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a descriptor fails to parse or validate.
///
/// Each structural violation gets its own variant so rejections can be logged
/// with a precise cause.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// The bytes are not a JSON document of the expected shape.
    #[error("descriptor is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The service name is empty after trimming.
    #[error("service name is empty")]
    EmptyName,

    /// The descriptor declares no endpoints.
    #[error("service declares no endpoints")]
    NoEndpoints,

    /// An endpoint has an empty name.
    #[error("endpoint {index} has an empty name")]
    EmptyEndpointName {
        /// Zero-based position in the endpoint list.
        index: usize,
    },

    /// An endpoint has an empty subject.
    #[error("endpoint '{name}' has an empty subject")]
    EmptySubject {
        /// The endpoint's name.
        name: String,
    },

    /// A subject contains characters outside the allowed set.
    #[error("endpoint '{name}' subject '{subject}' contains disallowed characters")]
    InvalidSubject {
        /// The endpoint's name.
        name: String,
        /// The offending subject.
        subject: String,
    },

    /// Two endpoints share a name.
    #[error("duplicate endpoint name '{name}'")]
    DuplicateName {
        /// The duplicated name.
        name: String,
    },

    /// Two endpoints share a subject.
    #[error("duplicate endpoint subject '{subject}'")]
    DuplicateSubject {
        /// The duplicated subject.
        subject: String,
    },
}

/// One named handler for one declared subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Human identifier, unique within the owning descriptor.
    pub name: String,
    /// Declared (pre-rewrite) bus address.
    pub subject: String,
    /// Free text surfaced in bus discovery.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Arbitrary JSON-shaped metadata, flattened for the bus on registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

impl Endpoint {
    /// Checks this endpoint's own invariants.
    fn validate(&self, index: usize) -> Result<(), DescriptorError> {
        if self.name.trim().is_empty() {
            return Err(DescriptorError::EmptyEndpointName { index });
        }
        if self.subject.trim().is_empty() {
            return Err(DescriptorError::EmptySubject {
                name: self.name.clone(),
            });
        }
        if !self
            .subject
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        {
            return Err(DescriptorError::InvalidSubject {
                name: self.name.clone(),
                subject: self.subject.clone(),
            });
        }
        Ok(())
    }

    /// Flattens metadata into the string→string form the bus accepts.
    ///
    /// String values pass through unchanged; everything else is serialized to
    /// JSON text. `description` is promoted into the map when no `description`
    /// key is already present.
    pub fn bus_metadata(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        if let Some(metadata) = &self.metadata {
            for (key, value) in metadata {
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                out.insert(key.clone(), rendered);
            }
        }
        if !self.description.is_empty() && !out.contains_key("description") {
            out.insert("description".to_string(), self.description.clone());
        }
        out
    }
}

/// A script's self-description: one logical service and its endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Logical service identity used for grouping.
    pub name: String,
    /// Free-text version, passed to the bus on registration.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Free-text description, passed to the bus on registration.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Declared endpoints, in declaration order.
    pub endpoints: Vec<Endpoint>,
}

impl ServiceDescriptor {
    /// Deserializes a descriptor from raw script output.
    ///
    /// Parsing is strict about shape but tolerant of unknown fields. Call
    /// [`validate`](Self::validate) afterwards; parsing alone does not check
    /// structural invariants.
    pub fn parse(bytes: &[u8]) -> Result<Self, DescriptorError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Checks the structural invariants of the descriptor.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.name.trim().is_empty() {
            return Err(DescriptorError::EmptyName);
        }
        if self.endpoints.is_empty() {
            return Err(DescriptorError::NoEndpoints);
        }

        let mut names = HashSet::new();
        let mut subjects = HashSet::new();
        for (index, endpoint) in self.endpoints.iter().enumerate() {
            endpoint.validate(index)?;
            if !names.insert(endpoint.name.as_str()) {
                return Err(DescriptorError::DuplicateName {
                    name: endpoint.name.clone(),
                });
            }
            if !subjects.insert(endpoint.subject.as_str()) {
                return Err(DescriptorError::DuplicateSubject {
                    subject: endpoint.subject.clone(),
                });
            }
        }
        Ok(())
    }
}
