use crate::errors::ServerError;
use crate::schema::users;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use diesel::{Insertable, Queryable};
use serde_derive::Deserialize;
use std::time::SystemTime;

#[derive(Clone, Debug, Queryable, Insertable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub created_at: SystemTime,
}

impl User {
    pub fn new(email: String, name: Option<String>, password: &str) -> Result<Self, ServerError> {
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
            .to_string();

        Ok(User {
            id: nanoid::nanoid!(),
            email,
            name,
            password_hash,
            created_at: SystemTime::now(),
        })
    }

    pub fn verify_password(&self, password: &str) -> Result<bool, ServerError> {
        let parsed_hash = PasswordHash::new(&self.password_hash)?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

impl Credentials {
    pub fn required(self) -> Result<(String, String, Option<String>), ServerError> {
        match (self.email, self.password) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Ok((email.trim().to_lowercase(), password, self.name))
            }
            _ => Err(ServerError::InvalidArgument(
                "Missing required fields".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let user = User::new("demo@example.com".into(), None, "demo123").unwrap();
        assert_ne!(user.password_hash, "demo123");
        assert!(user.verify_password("demo123").unwrap());
        assert!(!user.verify_password("demo124").unwrap());
    }

    #[test]
    fn credentials_normalize_email() {
        let creds = Credentials {
            email: Some("  Demo@Example.com ".into()),
            password: Some("pw".into()),
            name: None,
        };
        let (email, _, _) = creds.required().unwrap();
        assert_eq!(email, "demo@example.com");
    }
}
