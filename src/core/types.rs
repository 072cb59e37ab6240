//! Step model — the typed representation of steps, requisites, and
//! completion state shared by the validator, evaluator, and cook engine.
//!
//! All wire-facing types derive Serialize/Deserialize so envelopes and
//! completions round-trip through YAML recipe files and the JSONL job log.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Steps
// ============================================================================

/// One declarative unit of desired state.
///
/// `properties` is a schema-less bag passed through to the ingredient
/// uninterpreted; each ingredient validates it against its own schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Opaque identifier, unique within an envelope
    pub id: String,

    /// Capability family (e.g. "file", "pkg", "cmd")
    pub ingredient: String,

    /// Operation within the family (e.g. "managed", "present", "run")
    pub method: String,

    /// Ingredient configuration (order-preserving)
    #[serde(default)]
    pub properties: IndexMap<String, serde_json::Value>,

    /// Dependency groups, implicitly ANDed
    #[serde(default)]
    pub requisites: Vec<Requisite>,

    /// True if some other step in the same graph names this one as a
    /// dependency. Derived by the validator, never parsed.
    #[serde(skip)]
    pub is_requisite: bool,
}

impl Step {
    /// Construct a step with no properties or requisites.
    pub fn new(id: impl Into<String>, ingredient: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ingredient: ingredient.into(),
            method: method.into(),
            properties: IndexMap::new(),
            requisites: Vec::new(),
            is_requisite: false,
        }
    }

    /// Attach a requisite group.
    pub fn with_requisite(mut self, condition: RequisiteCondition, step_ids: &[&str]) -> Self {
        self.requisites.push(Requisite {
            condition,
            step_ids: step_ids.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Attach a property.
    pub fn with_property(mut self, key: &str, value: serde_json::Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }
}

// ============================================================================
// Requisites
// ============================================================================

/// A dependency declaration on other steps, qualified by a condition kind.
///
/// Resolution of `step_ids` to concrete steps lives in the validated
/// [`Graph`](super::graph::Graph); every id is guaranteed to resolve within
/// the same graph once validation succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requisite {
    pub condition: RequisiteCondition,

    #[serde(rename = "steps")]
    pub step_ids: Vec<String>,
}

/// The six requisite condition kinds: require/onchanges/onfail, each in an
/// ALL variant and an ANY variant over the group's referenced steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequisiteCondition {
    #[serde(rename = "require")]
    Require,
    #[serde(rename = "require_any")]
    RequireAny,
    #[serde(rename = "onchanges")]
    OnChanges,
    #[serde(rename = "onchanges_any")]
    OnChangesAny,
    #[serde(rename = "onfail")]
    OnFail,
    #[serde(rename = "onfail_any")]
    OnFailAny,
}

impl fmt::Display for RequisiteCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Require => write!(f, "require"),
            Self::RequireAny => write!(f, "require_any"),
            Self::OnChanges => write!(f, "onchanges"),
            Self::OnChangesAny => write!(f, "onchanges_any"),
            Self::OnFail => write!(f, "onfail"),
            Self::OnFailAny => write!(f, "onfail_any"),
        }
    }
}

// ============================================================================
// Completions
// ============================================================================

/// Per-step execution status. Monotonic: a step moves
/// NotStarted → InProgress → {Completed|Failed} exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed,
}

impl CompletionStatus {
    /// Completed or Failed.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The status record for one step — both the engine's internal event payload
/// and the externally published progress record (one JSONL line per record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCompletion {
    pub id: String,

    pub status: CompletionStatus,

    /// Whether applying the step altered system state
    #[serde(default)]
    pub changes_made: bool,

    /// Human-readable change notes, in the order the ingredient reported them
    #[serde(default)]
    pub changes: Vec<String>,

    /// Present only when status is Failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepCompletion {
    /// A fresh NotStarted record for a step.
    pub fn not_started(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: CompletionStatus::NotStarted,
            changes_made: false,
            changes: Vec::new(),
            error: None,
        }
    }

    /// A Failed record carrying an error message.
    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: CompletionStatus::Failed,
            changes_made: false,
            changes: Vec::new(),
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// Envelopes
// ============================================================================

/// The full set of steps submitted for one cook operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeEnvelope {
    /// Caller-supplied correlation identifier, treated as opaque
    pub job_id: String,

    /// Already-resolved step list for this cook
    pub steps: Vec<Step>,

    /// Dry-run flag propagated to every step
    #[serde(default)]
    pub test: bool,
}

/// Immediate receipt sent back to the caller before execution begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub acknowledged: bool,
    pub job_id: String,
}

// ============================================================================
// Tests
// ============================================================================
