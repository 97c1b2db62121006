use crate::profile::{NewUser, Profile, ProfileError, ProfileStore, UserType};
use tracing::{info, warn};

pub const MIN_PASSWORD_LEN: usize = 6;

const DEVICE_INFO_MAX: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("please fill all fields")]
    MissingFields,
    #[error("password must be at least {} characters", MIN_PASSWORD_LEN)]
    WeakPassword,
    #[error("email already in use")]
    EmailInUse,
    #[error("user not found")]
    UserNotFound,
    #[error("wrong password")]
    WrongPassword,
    #[error("access denied: this account is not an admin")]
    NotAdmin,
    #[error("failed to hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error(transparent)]
    Store(ProfileError),
}

impl From<ProfileError> for AuthError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::EmailInUse(_) => AuthError::EmailInUse,
            other => AuthError::Store(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignupForm {
    pub name: String,
    pub grade: u32,
    pub email: String,
    pub password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.name.trim().is_empty()
            || self.grade == 0
            || self.email.trim().is_empty()
            || self.password.is_empty()
        {
            return Err(AuthError::MissingFields);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        Ok(())
    }
}

/// Short description of this client, stored with each login event.
pub fn device_info() -> String {
    format!(
        "{} {} ({} {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
    .chars()
    .take(DEVICE_INFO_MAX)
    .collect()
}

/// Local credential checks over a profile store.
pub struct Accounts<'a, S: ProfileStore> {
    store: &'a S,
    cost: u32,
}

impl<'a, S: ProfileStore> Accounts<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Hash cost override, mostly for tests.
    pub fn with_cost(store: &'a S, cost: u32) -> Self {
        Self { store, cost }
    }

    pub fn signup(&self, form: &SignupForm) -> Result<Profile, AuthError> {
        form.validate()?;

        let email = form.email.trim();
        if self.store.find_by_email(email)?.is_some() {
            return Err(AuthError::EmailInUse);
        }

        let profile = self.store.create_user(&NewUser {
            name: form.name.trim().to_string(),
            grade: form.grade,
            email: email.to_string(),
            password_hash: bcrypt::hash(&form.password, self.cost)?,
        })?;
        info!(uid = profile.uid, "student registered");
        Ok(profile)
    }

    fn verify(&self, email: &str, password: &str) -> Result<Profile, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }

        let account = self
            .store
            .find_by_email(email)?
            .ok_or(AuthError::UserNotFound)?;
        if !bcrypt::verify(password, &account.password_hash)? {
            warn!(uid = account.profile.uid, "rejected login with wrong password");
            return Err(AuthError::WrongPassword);
        }
        Ok(account.profile)
    }

    pub fn login_student(&self, email: &str, password: &str) -> Result<Profile, AuthError> {
        let profile = self.verify(email, password)?;
        self.store
            .record_login(profile.uid, UserType::Student, &device_info())?;
        info!(uid = profile.uid, "student login");
        Ok(profile)
    }

    pub fn login_admin(&self, email: &str, password: &str) -> Result<Profile, AuthError> {
        let profile = self.verify(email, password)?;
        if !self.store.is_admin(&profile.email)? {
            warn!(uid = profile.uid, "non-admin tried the admin view");
            return Err(AuthError::NotAdmin);
        }
        self.store
            .record_login(profile.uid, UserType::Admin, &device_info())?;
        info!(uid = profile.uid, "admin login");
        Ok(profile)
    }
}
