//! Package ingredient — `pkg.present` / `pkg.absent` over apt.
//!
//! Converges by generating purified shell and running it locally: a check
//! script reads current state so unchanged applies stay no-ops, then an
//! install/remove script converges only when needed.

use super::{require_string_list, shell, Cooker, Ingredient, IngredientError, StepResult};
use crate::core::types::Step;
use async_trait::async_trait;
use indexmap::IndexMap;

pub struct PkgIngredient;

impl Ingredient for PkgIngredient {
    fn methods(&self) -> (&'static str, Vec<&'static str>) {
        ("pkg", vec!["present", "absent"])
    }

    fn parse(&self, step: &Step) -> Result<Box<dyn Cooker>, IngredientError> {
        let names = require_string_list(step, "names")?;
        let present = match step.method.as_str() {
            "present" => true,
            "absent" => false,
            _ => {
                return Err(IngredientError::UnknownCapability {
                    ingredient: step.ingredient.clone(),
                    method: step.method.clone(),
                })
            }
        };
        Ok(Box::new(PkgState { names, present }))
    }
}

struct PkgState {
    names: Vec<String>,
    present: bool,
}

/// One `installed:<pkg>` or `missing:<pkg>` line per package.
pub fn check_script(names: &[String]) -> String {
    names
        .iter()
        .map(|p| {
            format!(
                "dpkg -s '{}' >/dev/null 2>&1 && echo 'installed:{}' || echo 'missing:{}'",
                p, p, p
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Install every named package, non-interactively.
pub fn install_script(names: &[String]) -> String {
    let joined = names
        .iter()
        .map(|p| format!("'{}'", p))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "set -euo pipefail\n\
         apt-get update -qq\n\
         DEBIAN_FRONTEND=noninteractive apt-get install -y -qq {joined}\n\
         for pkg in {joined}; do\n\
           dpkg -s \"$pkg\" >/dev/null 2>&1\n\
         done"
    )
}

/// Remove every named package.
pub fn remove_script(names: &[String]) -> String {
    let joined = names
        .iter()
        .map(|p| format!("'{}'", p))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "set -euo pipefail\n\
         DEBIAN_FRONTEND=noninteractive apt-get remove -y -qq {joined}"
    )
}

impl PkgState {
    /// Packages whose state differs from desired.
    async fn divergent(&self) -> Result<Vec<String>, IngredientError> {
        let out = shell::run_script(&check_script(&self.names)).await?;
        let wanted_marker = if self.present { "missing:" } else { "installed:" };
        Ok(out
            .stdout
            .lines()
            .filter_map(|line| line.strip_prefix(wanted_marker))
            .map(|p| p.to_string())
            .collect())
    }
}

#[async_trait]
impl Cooker for PkgState {
    async fn apply(&self) -> Result<StepResult, IngredientError> {
        let divergent = self.divergent().await?;
        if divergent.is_empty() {
            return Ok(StepResult::unchanged());
        }

        let script = if self.present {
            install_script(&divergent)
        } else {
            remove_script(&divergent)
        };
        let out = shell::run_script(&script).await?;
        if !out.success() {
            return Ok(StepResult::failed(format!(
                "apt exit code {}: {}",
                out.exit_code,
                out.stderr.trim()
            )));
        }

        let verb = if self.present { "installed" } else { "removed" };
        let notes = divergent
            .iter()
            .map(|p| format!("{} {}", verb, p))
            .collect();
        Ok(StepResult {
            succeeded: true,
            changed: true,
            notes,
        })
    }

    async fn test(&self) -> Result<StepResult, IngredientError> {
        let divergent = self.divergent().await?;
        if divergent.is_empty() {
            return Ok(StepResult::unchanged());
        }
        let verb = if self.present {
            "would install"
        } else {
            "would remove"
        };
        let notes = divergent
            .iter()
            .map(|p| format!("{} {}", verb, p))
            .collect();
        Ok(StepResult {
            succeeded: true,
            changed: true,
            notes,
        })
    }

    fn properties(&self) -> IndexMap<String, serde_json::Value> {
        let mut props = IndexMap::new();
        props.insert("names".to_string(), serde_json::json!(self.names));
        props.insert(
            "state".to_string(),
            serde_json::json!(if self.present { "present" } else { "absent" }),
        );
        props
    }
}
