//! Command ingredient — `cmd.run` executes an arbitrary shell command.
//!
//! A run is always a change when it executes; dry runs report the command
//! without executing it.

use super::{optional_string, require_string, shell, Cooker, Ingredient, IngredientError, StepResult};
use crate::core::types::Step;
use async_trait::async_trait;
use indexmap::IndexMap;

pub struct CmdIngredient;

impl Ingredient for CmdIngredient {
    fn methods(&self) -> (&'static str, Vec<&'static str>) {
        ("cmd", vec!["run"])
    }

    fn parse(&self, step: &Step) -> Result<Box<dyn Cooker>, IngredientError> {
        Ok(Box::new(CmdRun {
            command: require_string(step, "command")?,
            cwd: optional_string(step, "cwd")?,
        }))
    }
}

struct CmdRun {
    command: String,
    cwd: Option<String>,
}

impl CmdRun {
    fn script(&self) -> String {
        match &self.cwd {
            Some(dir) => format!("set -euo pipefail\ncd '{}'\n{}", dir, self.command),
            None => format!("set -euo pipefail\n{}", self.command),
        }
    }
}

#[async_trait]
impl Cooker for CmdRun {
    async fn apply(&self) -> Result<StepResult, IngredientError> {
        let out = shell::run_script(&self.script()).await?;
        if !out.success() {
            return Ok(StepResult::failed(format!(
                "command exit code {}: {}",
                out.exit_code,
                out.stderr.trim()
            )));
        }
        let mut notes = vec![format!("ran '{}'", self.command)];
        let stdout = out.stdout.trim();
        if !stdout.is_empty() {
            notes.push(stdout.to_string());
        }
        Ok(StepResult {
            succeeded: true,
            changed: true,
            notes,
        })
    }

    async fn test(&self) -> Result<StepResult, IngredientError> {
        Ok(StepResult::changed(format!("would run '{}'", self.command)))
    }

    fn properties(&self) -> IndexMap<String, serde_json::Value> {
        let mut props = IndexMap::new();
        props.insert("command".to_string(), serde_json::json!(self.command));
        if let Some(cwd) = &self.cwd {
            props.insert("cwd".to_string(), serde_json::json!(cwd));
        }
        props
    }
}
