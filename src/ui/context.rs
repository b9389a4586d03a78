//! Decides between styled terminal output and plain lines

use std::io::IsTerminal;

/// Environment variables set by common CI providers
const CI_MARKERS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
];

/// How the current invocation should render output
#[derive(Debug, Clone)]
pub struct UiContext {
    /// stdout is a terminal and no CI marker is set
    interactive: bool,
}

impl UiContext {
    /// Inspect the terminal and environment
    pub fn detect() -> Self {
        Self {
            interactive: std::io::stdout().is_terminal() && !running_in_ci(),
        }
    }

    /// A context that never styles or animates
    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Spinners and cliclack framing
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}

fn running_in_ci() -> bool {
    CI_MARKERS.iter().any(|var| std::env::var_os(var).is_some())
}
