// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loading and validation for the Switchboard services.
//!
//! TOML files merged through the XDG hierarchy with `SWITCHBOARD_*`
//! environment overrides, strict unknown-field rejection, and semantic
//! validation at startup.

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::SwitchboardConfig;
pub use validation::validate_config;
