//! Adapter selection
//!
//! The only place that inspects the host environment to decide which adapter
//! to use. Everything downstream receives an already built adapter.

use crate::types::AdapterType;

/// Environment markers set by VS Code's integrated terminal
const VSCODE_MARKERS: &[&str] = &["VSCODE_PID", "VSCODE_INJECTION", "VSCODE_GIT_IPC_HANDLE"];

/// Concrete adapter family chosen for a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// Local shell processes
    Native,
    /// Terminals provided by the hosting editor
    Hosted,
}

impl AdapterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Hosted => "vscode",
        }
    }
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the requested adapter type using an environment lookup
pub fn select_adapter_kind<F>(requested: AdapterType, lookup: F) -> AdapterKind
where
    F: Fn(&str) -> Option<String>,
{
    match requested {
        AdapterType::Native => AdapterKind::Native,
        AdapterType::Vscode => AdapterKind::Hosted,
        AdapterType::Auto => {
            if running_in_vscode(&lookup) {
                AdapterKind::Hosted
            } else {
                AdapterKind::Native
            }
        }
    }
}

/// Resolve the requested adapter type from the process environment
pub fn detect_from_env(requested: AdapterType) -> AdapterKind {
    let kind = select_adapter_kind(requested, |key| std::env::var(key).ok());
    tracing::debug!(requested = %requested, selected = %kind, "Selected terminal adapter");
    kind
}

fn running_in_vscode<F>(lookup: &F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    if lookup("TERM_PROGRAM").is_some_and(|v| v.eq_ignore_ascii_case("vscode")) {
        return true;
    }
    VSCODE_MARKERS
        .iter()
        .any(|key| lookup(key).is_some_and(|v| !v.is_empty()))
}
