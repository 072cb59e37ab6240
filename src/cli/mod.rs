//! CLI subcommands — validate, tree, cook, log.

use crate::core::{engine, graph, parser, tree};
use crate::ingredients::IngredientRegistry;
use crate::joblog;
use clap::Subcommand;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a recipe without executing anything
    Validate {
        /// Path to the recipe file
        #[arg(short, long, default_value = "recipe.yaml")]
        file: PathBuf,
    },

    /// Print the requisite tree of a recipe
    Tree {
        /// Path to the recipe file
        #[arg(short, long, default_value = "recipe.yaml")]
        file: PathBuf,
    },

    /// Cook a recipe on this host
    Cook {
        /// Path to the recipe file
        #[arg(short, long, default_value = "recipe.yaml")]
        file: PathBuf,

        /// Report would-be changes without applying them
        #[arg(long)]
        test: bool,

        /// Job identifier (generated when omitted)
        #[arg(long)]
        job_id: Option<String>,

        /// Job log directory
        #[arg(long, default_value = "jobs")]
        log_dir: PathBuf,

        /// Sprout name the log is filed under
        #[arg(long, default_value = "local")]
        sprout: String,
    },

    /// Replay a job's completion log
    Log {
        /// Job identifier
        job_id: String,

        /// Job log directory
        #[arg(long, default_value = "jobs")]
        log_dir: PathBuf,

        /// Sprout name the log is filed under
        #[arg(long, default_value = "local")]
        sprout: String,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Tree { file } => cmd_tree(&file),
        Commands::Cook {
            file,
            test,
            job_id,
            log_dir,
            sprout,
        } => cmd_cook(&file, test, job_id, &log_dir, &sprout),
        Commands::Log {
            job_id,
            log_dir,
            sprout,
        } => cmd_log(&log_dir, &sprout, &job_id),
    }
}

/// Generate a job ID from the clock.
fn generate_job_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("j-{:012x}", nanos & 0xFFFF_FFFF_FFFF)
}

/// Parse a recipe file and validate its requisite graph.
fn load_graph(file: &Path) -> Result<graph::Graph, String> {
    let steps = parser::parse_recipe_file(file).map_err(|e| e.to_string())?;
    graph::Graph::validate(steps).map_err(|e| e.to_string())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let graph = load_graph(file)?;
    println!(
        "OK: {} ({} steps, {} roots)",
        file.display(),
        graph.len(),
        graph.roots().len()
    );
    Ok(())
}

fn cmd_tree(file: &Path) -> Result<(), String> {
    let graph = load_graph(file)?;
    print!("{}", tree::render(&graph));
    Ok(())
}

fn cmd_cook(
    file: &Path,
    test: bool,
    job_id: Option<String>,
    log_dir: &Path,
    sprout: &str,
) -> Result<(), String> {
    let steps = parser::parse_recipe_file(file).map_err(|e| e.to_string())?;
    let envelope = crate::core::types::RecipeEnvelope {
        job_id: job_id.unwrap_or_else(generate_job_id),
        steps,
        test,
    };
    let job_id = envelope.job_id.clone();

    let engine = engine::CookEngine::new(Arc::new(IngredientRegistry::builtin()));
    let sink = Arc::new(joblog::JobLog::new(log_dir, sprout));

    let ack = engine::CookEngine::ack(&envelope);
    println!("job {} acknowledged, cooking...", ack.job_id);

    let runtime = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
    runtime
        .block_on(engine.cook(envelope, sink))
        .map_err(|e| e.to_string())?;

    print_completions(log_dir, sprout, &job_id)
}

fn cmd_log(log_dir: &Path, sprout: &str, job_id: &str) -> Result<(), String> {
    print_completions(log_dir, sprout, job_id)
}

/// Replay a job's log to stdout and summarize.
fn print_completions(log_dir: &Path, sprout: &str, job_id: &str) -> Result<(), String> {
    let completions = joblog::read(log_dir, sprout, job_id).map_err(|e| e.to_string())?;

    let mut completed = 0;
    let mut changed = 0;
    let mut failed = 0;

    for c in &completions {
        if c.id == engine::START_MARKER || c.id == engine::COMPLETED_MARKER {
            continue;
        }
        match c.status {
            crate::core::types::CompletionStatus::Completed => {
                completed += 1;
                if c.changes_made {
                    changed += 1;
                    println!("  ~ {}: {}", c.id, c.changes.join("; "));
                } else {
                    println!("    {}: unchanged", c.id);
                }
            }
            crate::core::types::CompletionStatus::Failed => {
                failed += 1;
                println!(
                    "  ! {}: {}",
                    c.id,
                    c.error.as_deref().unwrap_or("failed")
                );
            }
            _ => {}
        }
    }

    println!();
    if failed > 0 {
        println!(
            "Job {}: {} completed ({} changed), {} FAILED",
            job_id, completed, changed, failed
        );
        return Err(format!("{} step(s) failed", failed));
    }
    println!(
        "Job {}: {} completed, {} changed.",
        job_id, completed, changed
    );
    Ok(())
}
