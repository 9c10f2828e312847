//! Account registration, login and logout.
//!
//! Registration mints a KEM keypair and stores the secret key only under a
//! key stretched from the user's password. Login is the one place the
//! secret key is recovered; it then lives in the session cache until the
//! session ends.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use hushpost_core::{Environment, SessionId, UserId, UserRecord};
use hushpost_crypto::{SALT_SIZE, unwrap_secret_key, wrap_secret_key};

use crate::{
    Server,
    error::ServerError,
    storage::{Storage, StorageError},
};

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 20;
const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Check a username against the account rules.
///
/// 3-20 characters; ASCII letters, digits and underscore only.
pub fn validate_username(username: &str) -> Result<(), ServerError> {
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&username.chars().count()) {
        return Err(ServerError::InvalidUsername("must be between 3 and 20 characters"));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ServerError::InvalidUsername(
            "can only contain letters, numbers, and underscores",
        ));
    }
    Ok(())
}

/// Check a password against the account rules.
///
/// At least 8 characters, with an uppercase letter, a lowercase letter, a
/// digit and one of ``!@#$%^&*(),.?":{}|<>``.
pub fn validate_password(password: &str) -> Result<(), ServerError> {
    let rule = if password.chars().count() < PASSWORD_MIN_LEN {
        "must be at least 8 characters long"
    } else if !password.chars().any(|c| c.is_ascii_uppercase()) {
        "must contain an uppercase letter"
    } else if !password.chars().any(|c| c.is_ascii_lowercase()) {
        "must contain a lowercase letter"
    } else if !password.chars().any(|c| c.is_ascii_digit()) {
        "must contain a number"
    } else if !password.chars().any(|c| PASSWORD_SPECIAL_CHARACTERS.contains(c)) {
        "must contain a special character"
    } else {
        return Ok(());
    };

    Err(ServerError::InvalidPassword(rule))
}

impl<E: Environment, S: Storage> Server<E, S> {
    /// Create an account.
    ///
    /// Surrounding whitespace is stripped from the username. Returns the new
    /// user's id.
    ///
    /// # Errors
    ///
    /// - `MissingField`, `InvalidUsername`, `InvalidPassword`,
    ///   `PasswordMismatch`: checked in that order
    /// - `UsernameTaken`: the username is registered already
    /// - `Storage`: the record could not be written
    pub fn register(
        &self,
        username: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<UserId, ServerError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() || confirm_password.is_empty() {
            return Err(ServerError::MissingField);
        }
        validate_username(username)?;
        validate_password(password)?;
        if password != confirm_password {
            return Err(ServerError::PasswordMismatch);
        }

        if self.storage.user_by_username(username)?.is_some() {
            return Err(ServerError::UsernameTaken(username.to_string()));
        }

        let env = self.sessions.env();
        let keys = self.sessions.kem().generate_keypair()?;
        let salt: [u8; SALT_SIZE] = env.random_array();
        let wrapped =
            wrap_secret_key(&keys.secret_key, password, &salt, env.random_array(), self.pbkdf2);
        let password_hash = hash_password(env, password)?;

        let user_id = UserId::new(format!("{:032x}", env.random_u128()));
        let record = UserRecord::new(
            user_id.clone(),
            username,
            password_hash,
            &keys.public_key,
            &wrapped,
            &salt,
        );

        match self.storage.insert_user(&record) {
            Ok(()) => {},
            // Lost a race with a concurrent registration of the same name
            Err(StorageError::Conflict(_)) => {
                return Err(ServerError::UsernameTaken(username.to_string()));
            },
            Err(err) => return Err(err.into()),
        }

        tracing::info!(user = %user_id, "account registered");
        Ok(user_id)
    }

    /// Verify credentials and open a session.
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials`: unknown username or wrong password
    /// - `Crypto`: the stored secret key does not open with this password
    ///   (the record was tampered with, or the PBKDF2 iteration count changed
    ///   since registration)
    pub fn login(&self, username: &str, password: &str) -> Result<SessionId, ServerError> {
        let Some(record) = self.storage.user_by_username(username.trim())? else {
            tracing::debug!("login for unknown username");
            return Err(ServerError::InvalidCredentials);
        };
        if !verify_password(&record.password_hash, password)? {
            tracing::debug!(user = %record.user_id, "login with wrong password");
            return Err(ServerError::InvalidCredentials);
        }

        let secret_key = unwrap_secret_key(
            &record.wrapped_secret_key()?,
            password,
            &record.salt()?,
            self.pbkdf2,
        )?;

        let session = self.sessions.open(record.user_id.clone(), secret_key);
        tracing::info!(user = %record.user_id, "logged in");
        Ok(session)
    }

    /// End a session. Logging out twice is not an error.
    ///
    /// # Errors
    ///
    /// Returns `Core(SessionNotFound)` for a token that was never issued.
    pub fn logout(&self, session: SessionId) -> Result<(), ServerError> {
        self.sessions.expire(session)?;
        Ok(())
    }
}

/// Argon2id PHC string for a login password.
fn hash_password<E: Environment>(env: &E, password: &str) -> Result<String, ServerError> {
    let salt_bytes: [u8; SALT_SIZE] = env.random_array();
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| ServerError::Internal(e.to_string()))?;

    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .to_string())
}

fn verify_password(hash: &str, password: &str) -> Result<bool, ServerError> {
    let parsed = PasswordHash::new(hash).map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}
