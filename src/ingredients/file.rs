//! File ingredient — `file.managed` converges a file's content and mode,
//! `file.absent` removes a path.

use super::{optional_string, require_string, Cooker, Ingredient, IngredientError, StepResult};
use crate::core::types::Step;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub struct FileIngredient;

impl Ingredient for FileIngredient {
    fn methods(&self) -> (&'static str, Vec<&'static str>) {
        ("file", vec!["managed", "absent"])
    }

    fn parse(&self, step: &Step) -> Result<Box<dyn Cooker>, IngredientError> {
        let path = PathBuf::from(require_string(step, "path")?);
        match step.method.as_str() {
            "managed" => {
                let mode = match optional_string(step, "mode")? {
                    Some(text) => Some(parse_mode(step, &text)?),
                    None => None,
                };
                Ok(Box::new(FileManaged {
                    path,
                    content: optional_string(step, "content")?,
                    mode,
                }))
            }
            "absent" => Ok(Box::new(FileAbsent { path })),
            _ => Err(IngredientError::UnknownCapability {
                ingredient: step.ingredient.clone(),
                method: step.method.clone(),
            }),
        }
    }
}

/// Octal mode string like "0644".
fn parse_mode(step: &Step, text: &str) -> Result<u32, IngredientError> {
    u32::from_str_radix(text, 8).map_err(|_| IngredientError::InvalidProperty {
        step_id: step.id.clone(),
        property: "mode".to_string(),
        expected: "octal mode string",
    })
}

struct FileManaged {
    path: PathBuf,
    content: Option<String>,
    mode: Option<u32>,
}

impl FileManaged {
    /// What needs to change. Empty = already converged.
    fn pending_changes(&self) -> Result<Vec<PendingChange>, IngredientError> {
        let mut pending = Vec::new();

        let exists = self.path.exists();
        match &self.content {
            Some(desired) => {
                let current = if exists {
                    Some(std::fs::read_to_string(&self.path)?)
                } else {
                    None
                };
                if current.as_deref() != Some(desired.as_str()) {
                    pending.push(PendingChange::Content);
                }
            }
            None => {
                if !exists {
                    pending.push(PendingChange::Create);
                }
            }
        }

        if let Some(mode) = self.mode {
            if exists {
                let current = std::fs::metadata(&self.path)?.permissions().mode() & 0o7777;
                if current != mode {
                    pending.push(PendingChange::Mode);
                }
            } else {
                pending.push(PendingChange::Mode);
            }
        }

        Ok(pending)
    }
}

enum PendingChange {
    Content,
    Create,
    Mode,
}

#[async_trait]
impl Cooker for FileManaged {
    async fn apply(&self) -> Result<StepResult, IngredientError> {
        let pending = self.pending_changes()?;
        if pending.is_empty() {
            return Ok(StepResult::unchanged());
        }

        let mut notes = Vec::new();
        for change in &pending {
            match change {
                PendingChange::Content | PendingChange::Create => {
                    if let Some(parent) = self.path.parent() {
                        if !parent.as_os_str().is_empty() {
                            std::fs::create_dir_all(parent)?;
                        }
                    }
                    std::fs::write(&self.path, self.content.as_deref().unwrap_or(""))?;
                    notes.push(format!("wrote {}", self.path.display()));
                }
                PendingChange::Mode => {
                    if let Some(mode) = self.mode {
                        std::fs::set_permissions(
                            &self.path,
                            std::fs::Permissions::from_mode(mode),
                        )?;
                        notes.push(format!("mode {:o} on {}", mode, self.path.display()));
                    }
                }
            }
        }

        Ok(StepResult {
            succeeded: true,
            changed: true,
            notes,
        })
    }

    async fn test(&self) -> Result<StepResult, IngredientError> {
        let pending = self.pending_changes()?;
        if pending.is_empty() {
            return Ok(StepResult::unchanged());
        }
        let notes = pending
            .iter()
            .map(|change| match change {
                PendingChange::Content => format!("would rewrite {}", self.path.display()),
                PendingChange::Create => format!("would create {}", self.path.display()),
                PendingChange::Mode => format!("would chmod {}", self.path.display()),
            })
            .collect();
        Ok(StepResult {
            succeeded: true,
            changed: true,
            notes,
        })
    }

    fn properties(&self) -> IndexMap<String, serde_json::Value> {
        let mut props = IndexMap::new();
        props.insert(
            "path".to_string(),
            serde_json::json!(self.path.display().to_string()),
        );
        if let Some(content) = &self.content {
            props.insert("content".to_string(), serde_json::json!(content));
        }
        if let Some(mode) = self.mode {
            props.insert("mode".to_string(), serde_json::json!(format!("{:o}", mode)));
        }
        props
    }
}

struct FileAbsent {
    path: PathBuf,
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}

#[async_trait]
impl Cooker for FileAbsent {
    async fn apply(&self) -> Result<StepResult, IngredientError> {
        if !self.path.exists() {
            return Ok(StepResult::unchanged());
        }
        remove_path(&self.path)?;
        Ok(StepResult::changed(format!("removed {}", self.path.display())))
    }

    async fn test(&self) -> Result<StepResult, IngredientError> {
        if !self.path.exists() {
            return Ok(StepResult::unchanged());
        }
        Ok(StepResult::changed(format!(
            "would remove {}",
            self.path.display()
        )))
    }

    fn properties(&self) -> IndexMap<String, serde_json::Value> {
        let mut props = IndexMap::new();
        props.insert(
            "path".to_string(),
            serde_json::json!(self.path.display().to_string()),
        );
        props
    }
}
