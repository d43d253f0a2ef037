// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod decorator;
mod snapshot;
mod state;
mod workflow;

pub use config::ConfigError;
pub use decorator::DecoratorError;
pub use snapshot::SnapshotError;
pub use state::StateError;
pub use workflow::WorkflowError;
