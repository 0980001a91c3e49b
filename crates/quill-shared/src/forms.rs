//! Submitted forms and their validation rules.
//!
//! Length limits count characters, not bytes.

use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use quill_core::domain::PostStatus;

use crate::response::FieldErrors;

/// Post create/edit form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PostForm {
    #[validate(
        length(min = 5, message = "Title must be at least 5 characters long."),
        custom(function = "title_max")
    )]
    #[serde(deserialize_with = "trimmed")]
    pub title: String,

    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 20, message = "Content must be at least 20 characters long."))]
    pub content: String,

    #[serde(default)]
    pub status: PostStatus,
}

/// Comment form. Guest fields only apply to anonymous commenters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CommentForm {
    #[validate(
        length(min = 5, message = "Comment must be at least 5 characters long."),
        custom(function = "comment_max")
    )]
    #[serde(deserialize_with = "trimmed")]
    pub text: String,

    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(max = 80, message = "Name must be at most 80 characters long."))]
    pub guest_name: Option<String>,

    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(email(message = "Enter a valid email address."))]
    pub guest_email: Option<String>,
}

impl CommentForm {
    /// Drop the guest fields when the commenter is signed in.
    pub fn for_requester(mut self, authenticated: bool) -> Self {
        if authenticated {
            self.guest_name = None;
            self.guest_email = None;
        }
        self
    }
}

/// Account sign-up form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignupForm {
    #[validate(
        length(min = 1, max = 150, message = "Username must be 1 to 150 characters long."),
        custom(function = "username_chars")
    )]
    #[serde(deserialize_with = "trimmed")]
    pub username: String,

    #[serde(deserialize_with = "trimmed")]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    #[validate(
        length(min = 8, message = "Password must be at least 8 characters long."),
        custom(function = "not_entirely_numeric")
    )]
    pub password: String,

    #[validate(must_match(other = "password", message = "The two password fields didn't match."))]
    pub password_confirm: String,
}

/// Login form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginForm {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "This field is required."))]
    pub username: String,

    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,
}

/// Combined account + profile edit form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProfileForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(max = 150, message = "First name must be at most 150 characters long."))]
    pub first_name: String,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(max = 150, message = "Last name must be at most 150 characters long."))]
    pub last_name: String,

    #[serde(deserialize_with = "trimmed")]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    #[serde(default)]
    #[validate(length(max = 500, message = "Bio must be at most 500 characters long."))]
    pub bio: String,

    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(url(message = "Enter a valid URL."))]
    pub avatar_url: Option<String>,
}

/// Flatten validator output into `field -> messages`.
pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

fn title_max(value: &str) -> Result<(), ValidationError> {
    at_most(value, 250, "Title must be at most 250 characters long.")
}

fn comment_max(value: &str) -> Result<(), ValidationError> {
    at_most(value, 500, "Comment must be at most 500 characters long.")
}

fn at_most(value: &str, max: usize, message: &'static str) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::new("length").with_message(message.into()));
    }
    Ok(())
}

fn username_chars(value: &str) -> Result<(), ValidationError> {
    let valid = value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if !valid {
        return Err(ValidationError::new("username").with_message(
            "Username may contain only letters, numbers, and @/./+/-/_ characters.".into(),
        ));
    }
    Ok(())
}

fn not_entirely_numeric(value: &str) -> Result<(), ValidationError> {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new("password_entirely_numeric")
            .with_message("This password is entirely numeric.".into()));
    }
    Ok(())
}

/// Surrounding whitespace never counts toward a field's length.
fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_form(title: &str, content: &str) -> PostForm {
        PostForm {
            title: title.to_string(),
            content: content.to_string(),
            status: PostStatus::Published,
        }
    }

    #[test]
    fn test_short_title_rejected() {
        let errors = post_form("Tiny", "This content is long enough to pass.")
            .validate()
            .unwrap_err();
        let fields = field_errors(&errors);
        assert_eq!(
            fields["title"],
            vec!["Title must be at least 5 characters long.".to_string()]
        );
        assert!(!fields.contains_key("content"));
    }

    #[test]
    fn test_short_content_rejected() {
        let errors = post_form("A valid title", "too short").validate().unwrap_err();
        assert!(field_errors(&errors).contains_key("content"));
    }

    #[test]
    fn test_boundary_lengths_accepted() {
        assert!(post_form("Five!", &"x".repeat(20)).validate().is_ok());
        // Five characters, more than five bytes.
        assert!(post_form("héllo", &"é".repeat(20)).validate().is_ok());
        assert!(post_form(&"t".repeat(251), &"x".repeat(20)).validate().is_err());
    }

    #[test]
    fn test_padding_does_not_count_toward_lengths() {
        let form: PostForm = serde_json::from_value(serde_json::json!({
            "title": "   ab   ",
            "content": format!("{}x", " ".repeat(25)),
        }))
        .unwrap();
        assert_eq!(form.title, "ab");

        let fields = field_errors(&form.validate().unwrap_err());
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("content"));

        let form: CommentForm =
            serde_json::from_value(serde_json::json!({ "text": "      " })).unwrap();
        assert!(field_errors(&form.validate().unwrap_err()).contains_key("text"));
    }

    #[test]
    fn test_trimmed_values_are_kept() {
        let form: SignupForm = serde_json::from_value(serde_json::json!({
            "username": "  writer ",
            "email": " writer@example.com ",
            "password": " spaced secret ",
            "password_confirm": " spaced secret ",
        }))
        .unwrap();
        assert_eq!(form.username, "writer");
        assert_eq!(form.email, "writer@example.com");
        // Passwords are taken verbatim.
        assert_eq!(form.password, " spaced secret ");
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_short_comment_rejected() {
        let form = CommentForm {
            text: "hey".into(),
            ..Default::default()
        };
        let fields = field_errors(&form.validate().unwrap_err());
        assert_eq!(
            fields["text"],
            vec!["Comment must be at least 5 characters long.".to_string()]
        );
    }

    #[test]
    fn test_blank_guest_fields_are_absent() {
        let form: CommentForm = serde_json::from_str(
            r#"{"text": "Lovely read", "guest_name": "  ", "guest_email": ""}"#,
        )
        .unwrap();
        assert!(form.guest_name.is_none());
        assert!(form.guest_email.is_none());
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_authenticated_commenter_drops_guest_fields() {
        let form = CommentForm {
            text: "Signed-in comment".into(),
            guest_name: Some("Mallory".into()),
            guest_email: Some("mallory@example.com".into()),
        }
        .for_requester(true);
        assert!(form.guest_name.is_none());
        assert!(form.guest_email.is_none());
    }

    #[test]
    fn test_signup_rules() {
        let mut form = SignupForm {
            username: "new.writer".into(),
            email: "writer@example.com".into(),
            password: "correct horse".into(),
            password_confirm: "correct horse".into(),
        };
        assert!(form.validate().is_ok());

        form.password_confirm = "something else".into();
        assert!(field_errors(&form.validate().unwrap_err()).contains_key("password_confirm"));

        form.password = "12345678".into();
        form.password_confirm = "12345678".into();
        assert!(field_errors(&form.validate().unwrap_err()).contains_key("password"));

        form.password = "correct horse".into();
        form.password_confirm = "correct horse".into();
        form.username = "no spaces".into();
        assert!(field_errors(&form.validate().unwrap_err()).contains_key("username"));
    }
}
