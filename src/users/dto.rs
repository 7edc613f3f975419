use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo::User;
use crate::{auth::password, error::ApiError, recipes::dto::RecipeSummary};

const MAX_EMAIL_LEN: usize = 254;
const MAX_NAME_LEN: usize = 150;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    }
    // "me" would shadow the /users/me route.
    username != "me" && USERNAME_RE.is_match(username)
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl RegisterRequest {
    /// Trims and lowercases the email, then checks every field.
    pub fn normalize_and_validate(&mut self) -> Result<(), ApiError> {
        self.email = self.email.trim().to_lowercase();
        self.username = self.username.trim().to_string();

        if self.email.len() > MAX_EMAIL_LEN || !is_valid_email(&self.email) {
            return Err(ApiError::Validation("Invalid email".into()));
        }
        if self.username.chars().count() > MAX_NAME_LEN || !is_valid_username(&self.username) {
            return Err(ApiError::Validation("Invalid username".into()));
        }
        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            if value.trim().is_empty() || value.chars().count() > MAX_NAME_LEN {
                return Err(ApiError::Validation(format!("Invalid {field}")));
            }
        }
        password::ensure_acceptable(&self.password)
    }
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// User as returned right after registration or login.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            email: u.email,
            id: u.id,
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
        }
    }
}

/// Profile fields plus whether the viewer follows this user.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: PublicUser,
    pub is_subscribed: bool,
}

impl UserSummary {
    pub fn new(user: User, is_subscribed: bool) -> Self {
        Self {
            user: user.into(),
            is_subscribed,
        }
    }
}

/// Extra fields shown for a followed author.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDetails {
    pub recipes: Vec<RecipeSummary>,
    pub recipes_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscribedAuthor {
    #[serde(flatten)]
    pub summary: UserSummary,
    #[serde(flatten)]
    pub details: SubscriptionDetails,
}
