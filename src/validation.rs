//! Field-level validation shared by the models, the form controller and the
//! HTTP layer.
//!
//! Errors are collected per field (wire name, nested fields as
//! `roadmap[0].tasks[1].title`) so the dashboard can show them inline.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::humanize;

lazy_static! {
    /// Deliberately loose: one `@`, no whitespace, a dot in the domain
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^@\s]+@[^@\s]+\.[^@\s]+$"
    ).unwrap();

    static ref URL_REGEX: Regex = Regex::new(
        r"^https?://[a-zA-Z0-9][-a-zA-Z0-9]*(\.[a-zA-Z0-9][-a-zA-Z0-9]*)*(:\d+)?(/\S*)?$"
    ).unwrap();

    static ref DATE_REGEX: Regex = Regex::new(
        r"^\d{4}-\d{2}-\d{2}"
    ).unwrap();
}

/// Characters the document store does not allow in a key
const FORBIDDEN_KEY_CHARS: [char; 6] = ['.', '#', '$', '[', ']', '/'];

/// Validation errors keyed by field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validation error for a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    /// Add "<Field> is required" when `value` is blank
    pub fn require(&mut self, field: impl Into<String>, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            let field = field.into();
            let label = field.rsplit('.').next().unwrap_or(&field).to_string();
            self.add(field, format!("{} is required", humanize(&label)));
        }
        self
    }

    /// First message recorded for `field`
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// One-line summary suitable for a toast
    pub fn summary(&self) -> String {
        if self.errors.len() == 1 {
            self.errors
                .values()
                .next()
                .and_then(|v| v.first())
                .cloned()
                .unwrap_or_else(|| "Validation failed".to_string())
        } else {
            format!("Validation failed for {} fields", self.errors.len())
        }
    }

    /// Drop every field that already fails in `before`
    pub fn excluding(mut self, before: &FieldErrors) -> Self {
        self.errors.retain(|field, _| !before.errors.contains_key(field));
        self
    }

    pub fn into_map(self) -> BTreeMap<String, Vec<String>> {
        self.errors
    }

    /// Return Ok(()) if no errors were recorded
    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a date field that may be left empty (`YYYY-MM-DD` or RFC 3339)
pub fn validate_optional_date(date: &str) -> Result<(), String> {
    if date.trim().is_empty() {
        return Ok(());
    }

    if !DATE_REGEX.is_match(date.trim()) {
        return Err("Invalid date format. Use YYYY-MM-DD".to_string());
    }

    if crate::models::ticket::parse_day(date).is_none() {
        return Err("Invalid date".to_string());
    }

    Ok(())
}

/// Validate an HTTP(S) link that may be left empty
pub fn validate_optional_url(url: &str) -> Result<(), String> {
    if url.trim().is_empty() {
        return Ok(());
    }

    if url.len() > 2048 {
        return Err("URL is too long (max 2048 characters)".to_string());
    }

    if !URL_REGEX.is_match(url.trim()) {
        return Err("Invalid URL format. Must start with http:// or https://".to_string());
    }

    Ok(())
}

/// Validate an entity id taken from a request path
pub fn validate_entity_id(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if id.len() > 128 {
        return Err(format!("{} is too long (max 128 characters)", field_name));
    }

    if id.chars().any(|c| FORBIDDEN_KEY_CHARS.contains(&c) || c.is_control()) {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}
