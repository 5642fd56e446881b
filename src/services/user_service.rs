use crate::models::user::User;
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Password too weak (minimum 8 characters)")]
    WeakPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("User not found")]
    UserNotFound,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Password hashing failed: {0}")]
    HashingError(String),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: Option<String>,
    pub email_verified: bool,
}

pub struct UpdatePasswordRequest {
    pub user_id: i64,
    pub new_password: String,
    pub new_password_confirm: Option<String>,
}

pub struct UpdateEmailRequest {
    pub user_id: i64,
    pub new_email: String,
}

/// Repository `NotFound` surfaces as the user-facing `UserNotFound`
fn not_found_as_user(err: RepositoryError) -> UserServiceError {
    match err {
        RepositoryError::NotFound => UserServiceError::UserNotFound,
        RepositoryError::AlreadyExists => UserServiceError::EmailTaken,
        other => UserServiceError::RepositoryError(other),
    }
}

pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, UserServiceError> {
        let email = request.email.trim().to_lowercase();
        Self::validate_email(&email)?;

        if let Some(ref confirm) = request.password_confirm {
            if request.password != *confirm {
                return Err(UserServiceError::PasswordMismatch);
            }
        }

        Self::validate_password(&request.password)?;
        let password_hash = Self::hash_password(&request.password)?;

        self.repository
            .create_user(&email, &password_hash, request.email_verified)
            .await
            .map_err(not_found_as_user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        let email = email.trim().to_lowercase();
        Ok(self.repository.find_by_email(&email).await?)
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    /// Like [`find_user_by_id`](Self::find_user_by_id) but absence is an error.
    pub async fn get_user(&self, id: i64) -> Result<User, UserServiceError> {
        self.find_user_by_id(id)
            .await?
            .ok_or(UserServiceError::UserNotFound)
    }

    pub async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<User>, UserServiceError> {
        Ok(self.repository.list_users(limit, offset).await?)
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), UserServiceError> {
        self.repository
            .delete_user(id)
            .await
            .map_err(not_found_as_user)
    }

    pub async fn verify_user_email(&self, id: i64) -> Result<(), UserServiceError> {
        self.repository
            .verify_email(id)
            .await
            .map_err(not_found_as_user)
    }

    pub async fn update_password(
        &self,
        request: UpdatePasswordRequest,
    ) -> Result<(), UserServiceError> {
        if let Some(ref confirm) = request.new_password_confirm {
            if request.new_password != *confirm {
                return Err(UserServiceError::PasswordMismatch);
            }
        }

        Self::validate_password(&request.new_password)?;
        let password_hash = Self::hash_password(&request.new_password)?;

        self.repository
            .update_password(request.user_id, &password_hash)
            .await
            .map_err(not_found_as_user)
    }

    pub async fn update_email(&self, request: UpdateEmailRequest) -> Result<User, UserServiceError> {
        let new_email = request.new_email.trim().to_lowercase();
        Self::validate_email(&new_email)?;

        if let Some(existing_user) = self.repository.find_by_email(&new_email).await? {
            if existing_user.id != request.user_id {
                return Err(UserServiceError::EmailTaken);
            }
        }

        self.repository
            .update_email(request.user_id, &new_email)
            .await
            .map_err(not_found_as_user)?;

        self.get_user(request.user_id).await
    }

    pub fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        match PasswordHash::new(password_hash) {
            Ok(parsed_hash) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok(),
            Err(_) => false,
        }
    }

    fn validate_email(email: &str) -> Result<(), UserServiceError> {
        let valid = match email.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.'),
            None => false,
        };
        if !valid || email.len() > 255 {
            return Err(UserServiceError::InvalidEmail);
        }
        Ok(())
    }

    fn validate_password(password: &str) -> Result<(), UserServiceError> {
        if password.chars().count() < 8 {
            return Err(UserServiceError::WeakPassword);
        }
        Ok(())
    }

    fn hash_password(password: &str) -> Result<String, UserServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| UserServiceError::HashingError(e.to_string()))
    }
}
