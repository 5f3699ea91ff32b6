// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Structural sanity checks on rendered Terraform text.
//!
//! This is a cheap gate before publication, not a grammar check: a passing
//! artifact can still fail `terraform validate`. Running the real validator
//! would require a Terraform binary in a controlled environment.

use serde::Serialize;

/// Section keywords a plausible configuration contains at least one of.
const REQUIRED_SECTIONS: [&str; 5] = ["resource", "module", "provider", "variable", "output"];

/// Outcome of the structural checks.
#[derive(Debug, Clone, Serialize)]
pub struct Validation {
    /// Whether every check passed.
    pub is_valid: bool,
    /// One message per failed check.
    pub errors: Vec<String>,
}

/// Run both structural checks on rendered text.
///
/// The checks are independent; both can fail and contribute a message.
pub fn validate(text: &str) -> Validation {
    let mut errors = Vec::new();

    if !text.contains('{') || !text.contains('}') {
        errors.push("Configuration does not contain any Terraform block braces".to_string());
    }

    if !REQUIRED_SECTIONS.iter().any(|section| text.contains(section)) {
        errors.push(
            "Configuration contains none of the required sections \
             (resource, module, provider, variable, output)"
                .to_string(),
        );
    }

    Validation {
        is_valid: errors.is_empty(),
        errors,
    }
}
