//! Terminal abstraction and adapters
//!
//! - [`Terminal`] / [`TerminalAdapter`]: the capability the pool is built on
//! - [`NativeAdapter`]: persistent local shell processes
//! - [`select_adapter_kind`]: environment-based adapter selection

mod adapter;
mod native;
mod selection;
mod wrapped_child;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{ListenerId, OutputListener, Terminal, TerminalAdapter};
pub use native::{DEFAULT_SHELL, NativeAdapter, NativeTerminal};
pub use selection::{AdapterKind, detect_from_env, select_adapter_kind};
pub use wrapped_child::WrappedChild;
