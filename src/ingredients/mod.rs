//! Ingredient capabilities — the pluggable step implementations the cook
//! engine dispatches to.
//!
//! Each ingredient module registers a factory under a (family, method) pair.
//! The engine resolves a step's capability from the registry, parses the
//! step's property bag into a [`Cooker`], and invokes `apply` (or `test`
//! for dry runs). Each ingredient validates its own properties; the core
//! never interprets the bag.

pub mod cmd;
pub mod file;
pub mod pkg;
pub mod shell;

use crate::core::types::Step;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Failure inside an ingredient, or a registry lookup miss. Fatal to the
/// step it belongs to, never to the envelope.
#[derive(Debug, Error)]
pub enum IngredientError {
    #[error("no ingredient registered for {ingredient}.{method}")]
    UnknownCapability { ingredient: String, method: String },

    #[error("step '{step_id}': missing required property '{property}'")]
    MissingProperty { step_id: String, property: String },

    #[error("step '{step_id}': property '{property}' must be a {expected}")]
    InvalidProperty {
        step_id: String,
        property: String,
        expected: &'static str,
    },

    #[error("shell execution failed: {0}")]
    Shell(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// What applying (or dry-running) a step did.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Whether the step converged (or would converge) successfully
    pub succeeded: bool,

    /// Whether system state was (or would be) altered
    pub changed: bool,

    /// Human-readable change notes, in order
    pub notes: Vec<String>,
}

impl StepResult {
    /// Success without changes — the system already matched desired state.
    pub fn unchanged() -> Self {
        Self {
            succeeded: true,
            changed: false,
            notes: Vec::new(),
        }
    }

    /// Success with one change note.
    pub fn changed(note: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            changed: true,
            notes: vec![note.into()],
        }
    }

    /// Failure with one note.
    pub fn failed(note: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            changed: false,
            notes: vec![note.into()],
        }
    }
}

/// A step's parsed capability object. `apply` converges the host toward
/// desired state; `test` reports what `apply` would do without side effects.
#[async_trait]
pub trait Cooker: Send + Sync {
    async fn apply(&self) -> Result<StepResult, IngredientError>;

    async fn test(&self) -> Result<StepResult, IngredientError>;

    /// The parsed property view, for diagnostics.
    fn properties(&self) -> IndexMap<String, serde_json::Value>;
}

/// Factory for one capability family. Registered at startup; `parse`
/// validates a step's properties against the family's own schema.
pub trait Ingredient: Send + Sync {
    /// Family name and the methods it supports.
    fn methods(&self) -> (&'static str, Vec<&'static str>);

    fn parse(&self, step: &Step) -> Result<Box<dyn Cooker>, IngredientError>;
}

/// Registry keyed by (family, method). An unknown pair is a hard failure at
/// dispatch time, surfaced as the step's Failed completion.
pub struct IngredientRegistry {
    factories: HashMap<(String, String), Arc<dyn Ingredient>>,
}

impl IngredientRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// All built-in ingredients: file, pkg, cmd.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(file::FileIngredient));
        registry.register(Arc::new(pkg::PkgIngredient));
        registry.register(Arc::new(cmd::CmdIngredient));
        registry
    }

    /// Register a factory under every (family, method) pair it declares.
    pub fn register(&mut self, factory: Arc<dyn Ingredient>) {
        let (family, methods) = factory.methods();
        for method in methods {
            self.factories
                .insert((family.to_string(), method.to_string()), factory.clone());
        }
    }

    /// Resolve and parse a step's capability.
    pub fn parse(&self, step: &Step) -> Result<Box<dyn Cooker>, IngredientError> {
        let key = (step.ingredient.clone(), step.method.clone());
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| IngredientError::UnknownCapability {
                ingredient: step.ingredient.clone(),
                method: step.method.clone(),
            })?;
        factory.parse(step)
    }

    /// Registered (family, method) pairs, sorted for stable display.
    pub fn capabilities(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<_> = self.factories.keys().cloned().collect();
        pairs.sort();
        pairs
    }
}

impl Default for IngredientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Property bag accessors shared by the built-in ingredients
// ============================================================================

/// Required string property.
pub(crate) fn require_string(step: &Step, key: &str) -> Result<String, IngredientError> {
    match step.properties.get(key) {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(IngredientError::InvalidProperty {
            step_id: step.id.clone(),
            property: key.to_string(),
            expected: "string",
        }),
        None => Err(IngredientError::MissingProperty {
            step_id: step.id.clone(),
            property: key.to_string(),
        }),
    }
}

/// Optional string property.
pub(crate) fn optional_string(step: &Step, key: &str) -> Result<Option<String>, IngredientError> {
    match step.properties.get(key) {
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(IngredientError::InvalidProperty {
            step_id: step.id.clone(),
            property: key.to_string(),
            expected: "string",
        }),
        None => Ok(None),
    }
}

/// Required list-of-strings property.
pub(crate) fn require_string_list(step: &Step, key: &str) -> Result<Vec<String>, IngredientError> {
    let invalid = || IngredientError::InvalidProperty {
        step_id: step.id.clone(),
        property: key.to_string(),
        expected: "list of strings",
    };
    match step.properties.get(key) {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(|s| s.to_string()).ok_or_else(invalid))
            .collect(),
        Some(_) => Err(invalid()),
        None => Err(IngredientError::MissingProperty {
            step_id: step.id.clone(),
            property: key.to_string(),
        }),
    }
}
