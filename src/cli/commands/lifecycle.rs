//! Install and activate commands - drive the lifecycle against the origin

use super::{short_hash, LocalWorker};
use crate::cli::args::TargetArgs;
use crate::config::Config;
use crate::error::WorkerResult;
use crate::ui::{self, ActivityBar, TaskSpinner, UiContext};

/// Fetch the manifest and install its version next to the active one
pub async fn install(args: TargetArgs, config: &Config) -> WorkerResult<()> {
    let ctx = UiContext::detect();
    let local = LocalWorker::open(config, &args);
    let outcome = run_install(&ctx, &local).await;
    local.close().await;
    outcome
}

async fn run_install(ctx: &UiContext, local: &LocalWorker) -> WorkerResult<()> {
    let before = local.driver().restore().await?;

    let activity = ActivityBar::follow(
        ctx,
        &format!("Installing from {}", local.origin()),
        local.driver().logger(),
    );
    let status = match local.driver().install().await {
        Ok(status) => status,
        Err(e) => {
            activity.finish_error("Install failed");
            return Err(e);
        }
    };

    let installed = status.installing.as_deref().unwrap_or_default();
    activity.finish(&format!("Installed {}", short_hash(installed)));

    match before.active.as_deref() {
        Some(active) if active == installed => {
            ui::remark(ctx, "This version is already active");
        }
        Some(active) => ui::remark(
            ctx,
            &format!(
                "{} keeps serving until: offline-worker activate",
                short_hash(active)
            ),
        ),
        None => ui::remark(ctx, "Run: offline-worker activate"),
    }
    Ok(())
}

/// Promote the installed version and retire the previous one
pub async fn activate(args: TargetArgs, config: &Config) -> WorkerResult<()> {
    let ctx = UiContext::detect();
    let local = LocalWorker::open(config, &args);
    let outcome = run_activate(&ctx, &local).await;
    local.close().await;
    outcome
}

async fn run_activate(ctx: &UiContext, local: &LocalWorker) -> WorkerResult<()> {
    let before = local.driver().restore().await?;

    let mut spinner = TaskSpinner::new(ctx);
    spinner.start("Activating installed version");
    let status = match local.driver().activate().await {
        Ok(status) => status,
        Err(e) => {
            spinner.stop_error("Activation failed");
            return Err(e);
        }
    };

    let active = status.active.as_deref().unwrap_or_default();
    spinner.stop(&format!("Active version {}", short_hash(active)));
    if let Some(previous) = before.active.as_deref().filter(|p| *p != active) {
        ui::remark(ctx, &format!("Retired {}", short_hash(previous)));
    }
    Ok(())
}
