use crate::error::{AppError, Result};
use crate::forms::{
    FormErrors, FormResult, LoginForm, PasswordChangeForm, SetPasswordForm, SignupForm,
};
use crate::models::{NewUser, User};
use crate::repository::SharedRepository;
use crate::services::password::{hash_password, verify_password};
use tracing::{info, warn};

/// Signup, login, password change and reset
#[derive(Clone)]
pub struct AccountService {
    repo: SharedRepository,
}

impl AccountService {
    pub fn new(repo: SharedRepository) -> Self {
        Self { repo }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<User> {
        self.repo
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", username)))
    }

    pub async fn signup(&self, form: &SignupForm) -> Result<FormResult<User>> {
        let mut errors = form.validate_all();
        if !errors.is_empty() {
            return Ok(Err(errors));
        }

        let new_user = NewUser {
            username: form.username.trim().to_string(),
            email: form.email.trim().to_string(),
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            password_hash: hash_password(&form.password1)?,
        };

        match self.repo.create_user(new_user).await? {
            Some(user) => {
                info!(user_id = user.id, username = %user.username, "user signed up");
                Ok(Ok(user))
            }
            None => {
                errors.add("username", "A user with that username already exists.");
                Ok(Err(errors))
            }
        }
    }

    /// Check credentials; bad username and bad password look the same
    pub async fn login(&self, form: &LoginForm) -> Result<FormResult<User>> {
        let mut errors = FormErrors::check(form);
        if !errors.is_empty() {
            return Ok(Err(errors));
        }

        if let Some(user) = self.repo.find_user_by_username(form.username.trim()).await? {
            if verify_password(&form.password, &user.password_hash)? {
                info!(user_id = user.id, "user logged in");
                return Ok(Ok(user));
            }
        }

        warn!(username = %form.username, "login failed");
        errors.add_non_field(
            "Please enter a correct username and password. Note that both fields may be case-sensitive.",
        );
        Ok(Err(errors))
    }

    /// Returns the user with the new hash, so the caller can re-issue its session
    pub async fn change_password(
        &self,
        user: &User,
        form: &PasswordChangeForm,
    ) -> Result<FormResult<User>> {
        let mut errors = form.validate_all();
        if !verify_password(&form.old_password, &user.password_hash)? {
            errors.add(
                "old_password",
                "Your old password was entered incorrectly. Please enter it again.",
            );
        }
        if !errors.is_empty() {
            return Ok(Err(errors));
        }

        let updated = self.store_password(user, &form.new_password1).await?;
        info!(user_id = user.id, "password changed");
        Ok(Ok(updated))
    }

    /// Accounts a reset link may be mailed to
    pub async fn users_for_reset(&self, email: &str) -> Result<Vec<User>> {
        let email = email.trim();
        if email.is_empty() {
            return Ok(Vec::new());
        }
        let users = self.repo.find_users_by_email(email).await?;
        Ok(users
            .into_iter()
            .filter(|u| !u.password_hash.is_empty())
            .collect())
    }

    /// Set a new password without the old one (reset link already checked)
    pub async fn set_password(
        &self,
        user: &User,
        form: &SetPasswordForm,
    ) -> Result<FormResult<User>> {
        let errors = form.validate_all();
        if !errors.is_empty() {
            return Ok(Err(errors));
        }

        let updated = self.store_password(user, &form.new_password1).await?;
        info!(user_id = user.id, "password reset");
        Ok(Ok(updated))
    }

    async fn store_password(&self, user: &User, password: &str) -> Result<User> {
        let hash = hash_password(password)?;
        self.repo.update_user_password(user.id, &hash).await?;
        Ok(User {
            password_hash: hash,
            ..user.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryBlogRepository;
    use std::sync::Arc;

    fn signup_form(username: &str) -> SignupForm {
        SignupForm {
            username: username.into(),
            email: format!("{}@mail.com", username),
            password1: "Str0ngPassw0rd".into(),
            password2: "Str0ngPassw0rd".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let service = AccountService::new(Arc::new(InMemoryBlogRepository::new()));
        let user = service.signup(&signup_form("leo")).await.unwrap().unwrap();
        assert_ne!(user.password_hash, "Str0ngPassw0rd");

        let logged_in = service
            .login(&LoginForm {
                username: "leo".into(),
                password: "Str0ngPassw0rd".into(),
                ..Default::default()
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(logged_in.id, user.id);

        let denied = service
            .login(&LoginForm {
                username: "leo".into(),
                password: "wrong-password".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(denied.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_field_error() {
        let service = AccountService::new(Arc::new(InMemoryBlogRepository::new()));
        service.signup(&signup_form("leo")).await.unwrap().unwrap();

        let errors = service.signup(&signup_form("leo")).await.unwrap().unwrap_err();
        assert!(errors.has("username"));
    }

    #[tokio::test]
    async fn test_change_password_requires_old_password() {
        let service = AccountService::new(Arc::new(InMemoryBlogRepository::new()));
        let user = service.signup(&signup_form("leo")).await.unwrap().unwrap();

        let form = PasswordChangeForm {
            old_password: "not-it".into(),
            new_password1: "An0therPassw0rd".into(),
            new_password2: "An0therPassw0rd".into(),
        };
        let errors = service.change_password(&user, &form).await.unwrap().unwrap_err();
        assert!(errors.has("old_password"));

        let form = PasswordChangeForm {
            old_password: "Str0ngPassw0rd".into(),
            ..form
        };
        let changed = service.change_password(&user, &form).await.unwrap().unwrap();
        assert_ne!(changed.password_hash, user.password_hash);

        let relogin = service
            .login(&LoginForm {
                username: "leo".into(),
                password: "An0therPassw0rd".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(relogin.is_ok());
    }

    #[tokio::test]
    async fn test_reset_lookup_and_set_password() {
        let service = AccountService::new(Arc::new(InMemoryBlogRepository::new()));
        let user = service.signup(&signup_form("leo")).await.unwrap().unwrap();

        let found = service.users_for_reset("LEO@mail.com").await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(service.users_for_reset("nobody@mail.com").await.unwrap().is_empty());
        assert!(service.users_for_reset(" ").await.unwrap().is_empty());

        let form = SetPasswordForm {
            new_password1: "An0therPassw0rd".into(),
            new_password2: "An0therPassw0rd".into(),
        };
        let updated = service.set_password(&user, &form).await.unwrap().unwrap();
        assert_ne!(updated.password_hash, user.password_hash);

        let relogin = service
            .login(&LoginForm {
                username: "leo".into(),
                password: "An0therPassw0rd".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(relogin.is_ok());
    }
}
