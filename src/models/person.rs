use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Person {
    pub person_id: i64,
    /// Stable subject identifier from the identity provider
    pub external_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub allergies: String,
    pub comments: String,
    /// Account came from the campus single-sign-on provider
    pub is_sso_acct: bool,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    /// Get the best display name for this person
    /// Priority: "first last" > email
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        if name.trim().is_empty() {
            self.email.clone()
        } else {
            name.trim().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(first: &str, last: &str, email: &str) -> Person {
        Person {
            person_id: 1,
            external_id: "abc123".to_string(),
            email: email.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            phone: String::new(),
            allergies: String::new(),
            comments: String::new(),
            is_sso_acct: true,
            is_staff: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_name_prefers_full_name() {
        let p = person("Ada", "Lovelace", "ada@example.edu");
        assert_eq!(p.display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let p = person("", "", "anon@example.edu");
        assert_eq!(p.display_name(), "anon@example.edu");
    }

    #[test]
    fn test_display_name_trims_partial_names() {
        let p = person("Ada", "", "ada@example.edu");
        assert_eq!(p.display_name(), "Ada");
    }
}
