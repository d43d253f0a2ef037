// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecoratorError {
    #[error("Decorator '{0}' is already registered")]
    DuplicateDecorator(String),
}
