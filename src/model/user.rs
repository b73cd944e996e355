//! # Users
//!
//! Identity supplied by the authentication layer before a write reaches
//! the fan-out core.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, rename = "firstName")]
    pub first_name: String,

    #[serde(default, rename = "lastName")]
    pub last_name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub picture: String,

    #[serde(default, rename = "isAnonymous")]
    pub is_anonymous: bool,
}

impl User {
    /// Identity used when authentication is disabled
    pub fn anonymous() -> Self {
        Self {
            is_anonymous: true,
            ..Default::default()
        }
    }

    /// Name shown as a post's author
    pub fn display_name(&self) -> String {
        if self.is_anonymous {
            return "anonymous".to_string();
        }

        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}
