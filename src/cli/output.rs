//! CLI output formatting

use crate::execution::{PreflightEvent, RollbackAction};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar spanning the pipeline steps
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

fn rollback_label(action: RollbackAction) -> &'static str {
    match action {
        RollbackAction::ReenableSourceOrgVdc => "re-enable source org VDC",
        RollbackAction::RestoreAffinityRules => "restore source affinity rules",
    }
}

/// Format a pipeline event for display
pub fn format_event(event: &PreflightEvent) -> String {
    match event {
        PreflightEvent::RunStarted { run_id, total_steps } => format!(
            "{} Starting preflight validation ({}) with {} steps",
            ROCKET,
            style(&run_id.to_string()[..8]).dim(),
            style(total_steps).cyan()
        ),
        PreflightEvent::StepStarted { name, index, total } => format!(
            "{} [{}/{}] {}",
            SPINNER,
            index + 1,
            total,
            style(name).cyan()
        ),
        PreflightEvent::StepCompleted { name } => {
            format!("{} {}", CHECK, style(name).green())
        }
        PreflightEvent::RunFailed { step, error } => format!(
            "{} {}: {}",
            CROSS,
            style(step).red(),
            style(error).dim()
        ),
        PreflightEvent::RollbackStarted { action } => {
            format!("{} rollback: {}", WARN, style(rollback_label(*action)).yellow())
        }
        PreflightEvent::RollbackCompleted { action } => {
            format!("{} rollback: {} done", CHECK, style(rollback_label(*action)).green())
        }
        PreflightEvent::RollbackFailed { action, error } => format!(
            "{} rollback: {} failed: {}",
            CROSS,
            style(rollback_label(*action)).red(),
            style(error).dim()
        ),
        PreflightEvent::RunCompleted { run_id } => format!(
            "{} Preflight validation ({}) {}",
            INFO,
            style(&run_id.to_string()[..8]).dim(),
            style("completed successfully").green()
        ),
    }
}
