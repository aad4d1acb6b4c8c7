use crate::models::{ContactMessage, NewComment};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email regex pattern")
});

const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 254;
const MAX_SUBJECT_LEN: usize = 200;
const MAX_MESSAGE_LEN: usize = 5000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("email address is not valid")]
    InvalidEmail,
    #[error("{field} must be {max} characters or fewer")]
    TooLong { field: &'static str, max: usize },
}

fn required(value: &str, field: &'static str, max: usize) -> Result<String, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FormError::Missing(field));
    }
    if value.chars().count() > max {
        return Err(FormError::TooLong { field, max });
    }
    Ok(value.to_string())
}

fn email(value: &str) -> Result<String, FormError> {
    let value = required(value, "email", MAX_EMAIL_LEN)?;
    if !EMAIL_REGEX.is_match(&value) {
        return Err(FormError::InvalidEmail);
    }
    Ok(value)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub csrf_token: String,
}

impl CommentForm {
    pub fn validate(&self, post_id: &str) -> Result<NewComment, FormError> {
        Ok(NewComment {
            post_id: post_id.to_string(),
            name: required(&self.name, "name", MAX_NAME_LEN)?,
            email: email(&self.email)?,
            message: required(&self.message, "message", MAX_MESSAGE_LEN)?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing)]
    pub csrf_token: String,
}

impl ContactForm {
    pub fn validate(&self) -> Result<ContactMessage, FormError> {
        let subject = self.subject.trim();
        if subject.chars().count() > MAX_SUBJECT_LEN {
            return Err(FormError::TooLong {
                field: "subject",
                max: MAX_SUBJECT_LEN,
            });
        }
        Ok(ContactMessage {
            name: required(&self.name, "name", MAX_NAME_LEN)?,
            email: email(&self.email)?,
            subject: (!subject.is_empty()).then(|| subject.to_string()),
            message: required(&self.message, "message", MAX_MESSAGE_LEN)?,
        })
    }
}
