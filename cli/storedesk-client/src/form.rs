//! Per-field error state for forms fed by mediated requests.

use indexmap::IndexMap;

use crate::types::{FieldErrors, Outcome};

/// Field errors currently shown next to a form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: IndexMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the record after a submission.
    ///
    /// Any classified outcome resets the previous errors. Validation
    /// failures then contribute their field errors. Cancelled requests leave
    /// the record untouched.
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Cancelled => {},
            Outcome::Success(_) => self.reset(),
            Outcome::Failure(failure) => {
                self.reset();
                if let Some(field_errors) = &failure.field_errors {
                    self.merge(field_errors);
                }
            },
        }
    }

    /// Add messages to the existing record without dropping earlier ones.
    pub fn merge(&mut self, field_errors: &FieldErrors) {
        for (field, messages) in field_errors {
            let existing = self.fields.entry(field.clone()).or_default();
            for message in messages {
                if !existing.contains(message) {
                    existing.push(message.clone());
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.fields.clear();
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// The first message for `field`, which is what a form usually shows.
    pub fn first(&self, field: &str) -> Option<&str> {
        self.get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }
}
