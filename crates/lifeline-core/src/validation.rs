//! Form-level checks for event and account input.
//!
//! Every check reports against the field it concerns so callers can show all
//! problems at once instead of stopping at the first.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::event::{EventDraft, EventPatch};

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;
pub const PASSWORD_MIN_CHARS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Description,
    Image,
    Attachment,
    Email,
    Password,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::Image => "image",
            Field::Attachment => "attachment",
            Field::Email => "email",
            Field::Password => "password",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("invalid input: {}", join_errors(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn check(&mut self, field: Field, ok: bool, message: &str) {
        if !ok {
            self.push(FieldError::new(field, message));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has(&self, field: Field) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn check_title(errors: &mut ValidationErrors, title: &str) {
    errors.check(Field::Title, !title.trim().is_empty(), "Title is required.");
    errors.check(
        Field::Title,
        title.chars().count() <= TITLE_MAX_CHARS,
        &format!("Title must be at most {TITLE_MAX_CHARS} characters."),
    );
}

fn check_description(errors: &mut ValidationErrors, description: Option<&str>) {
    if let Some(description) = description {
        errors.check(
            Field::Description,
            description.chars().count() <= DESCRIPTION_MAX_CHARS,
            &format!("Description must be at most {DESCRIPTION_MAX_CHARS} characters."),
        );
    }
}

pub fn validate_draft(draft: &EventDraft, errors: &mut ValidationErrors) {
    check_title(errors, &draft.title);
    check_description(errors, draft.description.as_deref());
}

pub fn validate_patch(patch: &EventPatch, errors: &mut ValidationErrors) {
    if let Some(title) = patch.title.as_deref() {
        check_title(errors, title);
    }
    if let Some(description) = &patch.description {
        check_description(errors, description.as_deref());
    }
}

pub fn validate_credentials(email: &str, password: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let email = email.trim();
    if email.is_empty() {
        errors.push(FieldError::new(Field::Email, "Email is required."));
    } else if !looks_like_email(email) {
        errors.push(FieldError::new(Field::Email, "Please enter a valid email address."));
    }
    errors.check(
        Field::Password,
        password.chars().count() >= PASSWORD_MIN_CHARS,
        &format!("Password must be at least {PASSWORD_MIN_CHARS} characters."),
    );
    errors.into_result()
}

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex must compile")
});

fn looks_like_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;

    #[test]
    fn reports_every_problem_together() {
        let mut draft = EventDraft::new(EventType::Note, "   ");
        draft.description = Some("x".repeat(DESCRIPTION_MAX_CHARS + 1));

        let mut errors = ValidationErrors::default();
        validate_draft(&draft, &mut errors);
        assert!(errors.has(Field::Title));
        assert!(errors.has(Field::Description));
        assert_eq!(errors.errors.len(), 2);
    }

    #[test]
    fn title_length_counts_characters() {
        let draft = EventDraft::new(EventType::Note, "é".repeat(TITLE_MAX_CHARS));
        let mut errors = ValidationErrors::default();
        validate_draft(&draft, &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn patch_only_checks_fields_it_sets() {
        let mut errors = ValidationErrors::default();
        validate_patch(&EventPatch::default(), &mut errors);
        assert!(errors.is_empty());

        validate_patch(
            &EventPatch {
                title: Some(String::new()),
                ..EventPatch::default()
            },
            &mut errors,
        );
        assert!(errors.has(Field::Title));
    }

    #[test]
    fn credentials_need_email_shape_and_password_length() {
        assert!(validate_credentials("me@example.com", "hunter22").is_ok());

        let err = validate_credentials("me-at-example", "123").expect_err("invalid");
        assert!(err.has(Field::Email));
        assert!(err.has(Field::Password));
        assert!(err.to_string().starts_with("invalid input: email:"));
    }

    #[test]
    fn email_shape_is_checked_on_every_call() {
        for good in ["a@b.co", "first.last@mail.example.org"] {
            assert!(looks_like_email(good), "{good}");
        }
        for bad in ["", "a@b", "a b@c.de", "@example.com", "a@@b.com"] {
            assert!(!looks_like_email(bad), "{bad}");
        }
    }
}
