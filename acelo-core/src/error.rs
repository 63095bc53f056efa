// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Validation error types
//!
//! Validation errors are raised before any network call and are surfaced
//! inline to the user; they are never sent upstream.

use thiserror::Error;

/// Result type for validation
pub type Result<T> = std::result::Result<T, ValidationError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required form field was missing or blank
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Input schema JSON did not match the automation schema
    #[error("Invalid input schema: {0}")]
    InvalidSchema(String),

    #[error("Unknown context category: {0}")]
    UnknownCategory(String),
}
