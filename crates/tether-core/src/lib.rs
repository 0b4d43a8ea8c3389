//! # tether-core
//!
//! Foundation types shared by every tether crate:
//!
//! - **Branded IDs**: [`ids::SessionId`] as a newtype over a UUID v7 string
//! - **Tool catalog contract**: [`tools::ToolCatalog`], [`tools::ToolDescriptor`],
//!   [`tools::ToolOutput`], [`tools::ToolError`]
//! - **Logging**: [`logging::init_subscriber`] for the global `tracing` subscriber
//! - **Constants**: package name and version

#![deny(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod logging;
pub mod tools;

pub use ids::SessionId;
pub use logging::{LogFormat, init_subscriber};
pub use tools::{ToolCatalog, ToolDescriptor, ToolError, ToolOutput};
