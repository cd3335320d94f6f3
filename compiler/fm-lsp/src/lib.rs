// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Formality Language Server Protocol implementation.
//!
//! Binds the workspace core in `fm-db` to the editor protocol, providing:
//!
//! - Workspace-wide parse and type diagnostics, kept current as files change
//! - Hover with definition signatures
//! - Go-to-definition across files
//! - Completion of every global definition

pub mod config;
pub mod convert;
pub mod engine;
pub mod server;
pub mod worker;

pub use config::{Cli, ConfigError, ServerConfig};
pub use engine::{FmDef, FormalityEngine};
pub use server::FormalityLanguageServer;
