//! Terminal output for the command line front end
//!
//! Uses `cliclack` framing and `indicatif` spinners on an interactive
//! terminal, and falls back to plain tagged lines in CI, pipes, or when a
//! command prints JSON.
//!
//! ```rust,ignore
//! use offline_worker::ui::{self, ActivityBar, UiContext};
//!
//! let ctx = UiContext::detect();
//! let activity = ActivityBar::follow(&ctx, "Installing", driver.logger());
//! let status = driver.install().await?;
//! activity.finish("Installed");
//! ui::remark(&ctx, "Run: offline-worker activate");
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    key_value, key_value_status, remark, section, step_info, step_ok, step_ok_detail,
    step_warn_hint,
};
pub use progress::{ActivityBar, TaskSpinner};
