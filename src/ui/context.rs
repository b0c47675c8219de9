//! UI context: interactive terminal or plain output

use std::io::IsTerminal;

/// Environment variables set by common CI systems
const CI_MARKERS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
];

/// Decides between fancy and plain output, and whether prompts may block
#[derive(Debug, Clone)]
pub struct UiContext {
    interactive: bool,
    auto_yes: bool,
}

impl UiContext {
    /// Interactive only when both stdin and stdout are terminals outside CI
    pub fn detect() -> Self {
        let terminal = std::io::stdout().is_terminal() && std::io::stdin().is_terminal();
        let in_ci = CI_MARKERS.iter().any(|var| std::env::var_os(var).is_some());
        Self {
            interactive: terminal && !in_ci,
            auto_yes: false,
        }
    }

    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            auto_yes: false,
        }
    }

    /// Approve confirmation prompts without asking
    pub fn with_auto_yes(mut self, yes: bool) -> Self {
        self.auto_yes = yes;
        self
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }

    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_context() {
        let ctx = UiContext::non_interactive();
        assert!(!ctx.is_interactive());
        assert!(!ctx.use_fancy_output());
        assert!(ctx.with_auto_yes(true).auto_yes());
    }
}
