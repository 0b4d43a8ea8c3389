//! # tether-tools
//!
//! The [`Tool`] trait every invocable operation implements, the
//! [`ToolRegistry`] that indexes them (and serves as the transport's
//! [`ToolCatalog`](tether_core::ToolCatalog)), and a small set of built-in tools.

#![deny(unsafe_code)]

pub mod builtin;
pub mod registry;
pub mod traits;

pub use builtin::register_builtins;
pub use registry::ToolRegistry;
pub use traits::Tool;
