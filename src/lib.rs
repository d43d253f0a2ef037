// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;     // engine options + file loader
pub mod engine;     // join-dispatch scheduler
pub mod errors;     // error handling
pub mod events;     // event kinds and instances
pub mod middleware; // snapshot, state, decorators
pub mod observability;
pub mod traits;     // interceptor and observer hooks
