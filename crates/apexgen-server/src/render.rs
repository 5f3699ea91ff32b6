// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tera-based rendering of stored templates into Terraform text.
//!
//! Rendering is a pure function of the template text and the resource data.
//! Undefined variables and bad syntax are rendering errors, not silently
//! empty output. Two filters are exposed to templates for Terraform literal
//! formatting: `terraform_string` and `terraform_list`.

use std::collections::HashMap;

use serde_json::Value;
use tracing::info;

use crate::store::ResourceData;

/// Template name under which the artifact is registered per render.
const ARTIFACT_TEMPLATE: &str = "artifact";

/// Renders stored templates with the Terraform formatting filters installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer;

impl Renderer {
    /// Create a renderer.
    pub fn new() -> Self {
        Self
    }

    /// Render a template against one resource's attribute mapping.
    pub fn render(&self, template: &str, data: &ResourceData) -> tera::Result<String> {
        // A fresh Tera instance per render: templates arrive as strings from
        // the store, not from a directory the engine could preload.
        let mut tera = tera::Tera::default();
        tera.register_filter("terraform_string", terraform_string);
        tera.register_filter("terraform_list", terraform_list);
        tera.add_raw_template(ARTIFACT_TEMPLATE, template)?;

        let context = tera::Context::from_value(Value::Object(data.clone()))?;
        let rendered = tera.render(ARTIFACT_TEMPLATE, &context)?;

        info!(bytes = rendered.len(), "Terraform configuration rendered");
        Ok(rendered)
    }
}

/// Scalar value as bare text, without JSON quoting.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `terraform_string` filter: quote a scalar, `null` when absent.
fn terraform_string(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let rendered = match value {
        Value::Null => "null".to_string(),
        other => format!("\"{}\"", scalar_text(other)),
    };
    Ok(Value::String(rendered))
}

/// `terraform_list` filter: bracketed, comma-joined list of quoted items.
///
/// Accepts a native sequence, an already-bracketed stringified list (split on
/// commas after stripping the outer brackets), or a bare scalar which becomes
/// a one-item list. Empty or falsy input yields `[]`; empty items are dropped.
fn terraform_list(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let items: Vec<String> = match value {
        Value::Null => Vec::new(),
        Value::Bool(false) => Vec::new(),
        Value::Number(n) if n.as_f64() == Some(0.0) => Vec::new(),
        Value::String(s) if s.is_empty() => Vec::new(),
        Value::String(s) if s.starts_with('[') && s.ends_with(']') => s[1..s.len() - 1]
            .split(',')
            .map(|item| item.trim().to_string())
            .collect(),
        Value::Array(values) => values.iter().map(scalar_text).collect(),
        other => vec![scalar_text(other)],
    };

    let formatted: Vec<String> = items
        .into_iter()
        .filter(|item| !item.is_empty())
        .map(|item| format!("\"{item}\""))
        .collect();

    Ok(Value::String(format!("[{}]", formatted.join(", "))))
}
