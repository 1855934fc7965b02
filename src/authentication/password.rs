use crate::{
    domain::{NewPassword, UserEmail},
    telemetry::spawn_blocking_with_tracing,
};
use anyhow::{anyhow, Context};
use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use secrecy::{ExposeSecret, Secret};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const FALLBACK_PASSWORD_HASH: &str = "$argon2id$v=19$m=15000,t=2,p=1$\
    gZiV/M1gPc22ElAH/Jh1Hw$\
    CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials(#[source] anyhow::Error),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

pub struct Credentials {
    pub email: UserEmail,
    pub password: Secret<String>,
}

#[tracing::instrument(name = "Validate credentials", skip(credentials, db_pool))]
pub async fn validate_credentials(
    db_pool: &PgPool,
    credentials: Credentials,
) -> Result<Uuid, AuthError> {
    let mut user_id = None;
    let mut expected_password_hash = Secret::new(FALLBACK_PASSWORD_HASH.to_string());

    if let Some((stored_user_id, stored_password_hash)) =
        get_stored_credentials(db_pool, &credentials.email).await?
    {
        user_id = Some(stored_user_id);
        expected_password_hash = stored_password_hash;
    }

    spawn_blocking_with_tracing(move || {
        verify_password_hash(expected_password_hash, credentials.password)
    })
    .await
    .context("Failed to spawn blocking task")??;

    user_id
        .ok_or_else(|| anyhow!("Unknown email"))
        .map_err(AuthError::InvalidCredentials)
}

#[tracing::instrument(name = "Get stored credentials", skip(email, db_pool))]
async fn get_stored_credentials(
    db_pool: &PgPool,
    email: &UserEmail,
) -> Result<Option<(Uuid, Secret<String>)>, anyhow::Error> {
    let row = sqlx::query_as::<_, (Uuid, String)>(
        r#"
        SELECT user_id, password_hash
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email.as_ref())
    .fetch_optional(db_pool)
    .await
    .context("Failed to perform a query to retrieve stored credentials")?
    .map(|(user_id, password_hash)| (user_id, Secret::new(password_hash)));

    Ok(row)
}

#[tracing::instrument(
    name = "Verify password hash",
    skip(expected_password_hash, password_candidate)
)]
fn verify_password_hash(
    expected_password_hash: Secret<String>,
    password_candidate: Secret<String>,
) -> Result<(), AuthError> {
    let expected_password_hash = PasswordHash::new(expected_password_hash.expose_secret())
        .context("Failed to parse hash in PHC string format")?;

    Argon2::default()
        .verify_password(
            password_candidate.expose_secret().as_bytes(),
            &expected_password_hash,
        )
        .context("Invalid password")
        .map_err(AuthError::InvalidCredentials)
}

pub fn compute_password_hash(password: NewPassword) -> Result<Secret<String>, anyhow::Error> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let password_hash = Argon2::new(
        Algorithm::Argon2id,
        Version::V0x13,
        Params::new(15000, 2, 1, None).map_err(|e| anyhow!(e))?,
    )
    .hash_password(password.expose_secret().as_bytes(), &salt)
    .map_err(|e| anyhow!(e))?
    .to_string();

    Ok(Secret::new(password_hash))
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Email is already registered")]
    EmailTaken,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

/// Stores a new user with a freshly hashed password and returns its id.
#[tracing::instrument(name = "Register user", skip(executor, password), fields(email = %email))]
pub async fn register_user<'e, E>(
    executor: E,
    email: &UserEmail,
    password: NewPassword,
) -> Result<Uuid, RegistrationError>
where
    E: PgExecutor<'e>,
{
    let password_hash = spawn_blocking_with_tracing(move || compute_password_hash(password))
        .await
        .context("Failed to spawn blocking task")??;

    let user_id = Uuid::new_v4();
    let inserted = sqlx::query(
        r#"
        INSERT INTO users (user_id, email, password_hash)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(email.as_ref())
    .bind(password_hash.expose_secret())
    .execute(executor)
    .await
    .context("Failed to store new user")?;

    if inserted.rows_affected() == 0 {
        return Err(RegistrationError::EmailTaken);
    }

    Ok(user_id)
}
