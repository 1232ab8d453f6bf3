//! Field validation for form input
//!
//! Rules are declared per field key (`user.email`, `avatar`, ...) and evaluated
//! against a [`FieldSource`]. Failures are collected into a [`FieldErrors`] bag
//! keyed by field, so a caller can surface every message next to its input.
//!
//! Rules other than the presence rules (`Required`, `RequiredWith`) are skipped
//! when the value is absent, which is how optional fields are expressed.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::core::storage::UploadedFile;

/// Maximum length for short text fields
pub const MAX_TEXT_LENGTH: usize = 255;

/// Image extensions accepted by [`Rule::Image`]
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Field-keyed collection of validation messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Merge another bag into this one
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// All messages recorded for a field
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.get(field).first().map(String::as_str)
    }

    /// Drop the messages of a single field
    pub fn forget(&mut self, field: &str) {
        self.0.remove(field);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys of the fields with at least one message
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

/// Read access to the values being validated
pub trait FieldSource {
    /// Text value of a field, `None` when the field is unset
    fn text(&self, field: &str) -> Option<&str>;

    /// Uploaded file staged for a field
    fn file(&self, field: &str) -> Option<&UploadedFile> {
        let _ = field;
        None
    }
}

/// A single validation rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Value must be present and not blank
    Required,
    /// Value must be present when the other field is present
    RequiredWith(&'static str),
    /// Minimum length in characters
    Min(usize),
    /// Maximum length in characters
    Max(usize),
    /// Value must look like an email address
    Email,
    /// Uploaded file must be an image
    Image,
    /// Uploaded file must not exceed this many kilobytes
    MaxKilobytes(u64),
    /// Value must equal `<field>_confirmation`
    Confirmed,
    /// Value must equal the other field
    Same(&'static str),
    /// Value must not be used by another record; deferred to the caller
    Unique { ignore: Option<Uuid> },
}

impl Rule {
    fn is_presence_rule(&self) -> bool {
        matches!(self, Rule::Required | Rule::RequiredWith(_))
    }
}

/// Uniqueness check the evaluator cannot answer on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueCheck {
    pub field: String,
    pub value: String,
    pub ignore: Option<Uuid>,
}

/// Result of evaluating a [`RuleSet`]
#[derive(Debug, Default)]
pub struct Validation {
    pub errors: FieldErrors,
    /// Uniqueness checks for fields that passed every other rule
    pub deferred: Vec<UniqueCheck>,
}

/// Ordered mapping of field keys to their rules
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<(&'static str, Vec<Rule>)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rules for a field
    pub fn field(mut self, field: &'static str, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules.push((field, rules.into_iter().collect()));
        self
    }

    /// Rules declared for a field
    pub fn rules_for(&self, field: &str) -> Option<&[Rule]> {
        self.rules
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, rules)| rules.as_slice())
    }

    /// Subset of this rule set restricted to the given fields
    pub fn only(&self, fields: &[&str]) -> RuleSet {
        RuleSet {
            rules: self
                .rules
                .iter()
                .filter(|(name, _)| fields.contains(name))
                .cloned()
                .collect(),
        }
    }

    /// Evaluate every rule against the source
    pub fn validate(&self, source: &dyn FieldSource) -> Validation {
        let mut validation = Validation::default();

        for (field, rules) in &self.rules {
            let mut pending = Vec::new();

            for rule in rules {
                if !rule.is_presence_rule() && !is_present(source, field) {
                    continue;
                }

                if let Rule::Unique { ignore } = rule {
                    if let Some(value) = source.text(field) {
                        pending.push(UniqueCheck {
                            field: field.to_string(),
                            value: value.to_string(),
                            ignore: *ignore,
                        });
                    }
                    continue;
                }

                if let Err(message) = check_rule(rule, field, source) {
                    validation.errors.add(*field, message);
                }
            }

            if !validation.errors.has(field) {
                validation.deferred.extend(pending);
            }
        }

        validation
    }
}

fn is_present(source: &dyn FieldSource, field: &str) -> bool {
    source.file(field).is_some() || source.text(field).is_some_and(|v| !v.is_empty())
}

fn is_filled(source: &dyn FieldSource, field: &str) -> bool {
    source.file(field).is_some() || source.text(field).is_some_and(|v| !v.trim().is_empty())
}

fn check_rule(rule: &Rule, field: &str, source: &dyn FieldSource) -> Result<(), String> {
    let attribute = attribute_name(field);
    let text = source.text(field).unwrap_or_default();

    match rule {
        Rule::Required => {
            if !is_filled(source, field) {
                return Err(format!("The {} field is required.", attribute));
            }
        }
        Rule::RequiredWith(other) => {
            if is_present(source, other) && !is_filled(source, field) {
                return Err(format!(
                    "The {} field is required when {} is present.",
                    attribute,
                    attribute_name(other)
                ));
            }
        }
        Rule::Min(min) => {
            if text.chars().count() < *min {
                return Err(format!(
                    "The {} field must be at least {} characters.",
                    attribute, min
                ));
            }
        }
        Rule::Max(max) => {
            if text.chars().count() > *max {
                return Err(format!(
                    "The {} field must not be greater than {} characters.",
                    attribute, max
                ));
            }
        }
        Rule::Email => {
            if !is_valid_email(text) {
                return Err(format!(
                    "The {} field must be a valid email address.",
                    attribute
                ));
            }
        }
        Rule::Image => {
            if !source.file(field).is_some_and(UploadedFile::is_image) {
                return Err(format!("The {} field must be an image.", attribute));
            }
        }
        Rule::MaxKilobytes(max) => {
            if let Some(file) = source.file(field)
                && file.size_kilobytes() > *max
            {
                return Err(max_kilobytes_message(field, *max));
            }
        }
        Rule::Confirmed => {
            let confirmation = format!("{}_confirmation", field);
            if source.text(&confirmation) != Some(text) {
                return Err(format!(
                    "The {} field confirmation does not match.",
                    attribute
                ));
            }
        }
        Rule::Same(other) => {
            if source.text(other) != Some(text) {
                return Err(format!(
                    "The {} field must match {}.",
                    attribute,
                    attribute_name(other)
                ));
            }
        }
        Rule::Unique { .. } => {}
    }

    Ok(())
}

/// Message recorded when a [`Rule::Unique`] check fails
pub fn unique_message(field: &str) -> String {
    format!("The {} has already been taken.", attribute_name(field))
}

/// Message recorded when a file exceeds [`Rule::MaxKilobytes`]
pub fn max_kilobytes_message(field: &str, max: u64) -> String {
    format!(
        "The {} field must not be greater than {} kilobytes.",
        attribute_name(field),
        max
    )
}

/// Human readable name of a field key: `user.email` -> `email`
pub fn attribute_name(field: &str) -> String {
    field.rsplit('.').next().unwrap_or(field).replace('_', " ")
}

/// Validate email format: `local@domain.tld`, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }

    if !domain.contains('.') {
        return false;
    }

    !domain.split('.').any(str::is_empty)
}
