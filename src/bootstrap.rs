use crate::{
    config::BootstrapAdmin,
    error::AppError,
    handlers::normalize_email,
    models::{NewUser, Role},
    password::{hash_password_blocking, validate_password},
    repository::Repository,
};

/// What `ensure_admin` found or did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created,
    AlreadyPresent,
}

/// ensure_admin
///
/// Makes sure the configured first administrator exists. An account that already
/// uses the email is left exactly as it is, whatever its role.
pub async fn ensure_admin(
    repo: &dyn Repository,
    admin: &BootstrapAdmin,
) -> Result<BootstrapOutcome, AppError> {
    let email = normalize_email(&admin.email);
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("invalid bootstrap admin email"));
    }

    if let Some(existing) = repo.find_user_by_email(&email).await? {
        if existing.user.role != Role::Admin {
            tracing::warn!(
                user_id = %existing.user.id,
                "bootstrap admin email belongs to a non-admin account"
            );
        }
        return Ok(BootstrapOutcome::AlreadyPresent);
    }

    validate_password(&admin.password)?;
    let password_hash = hash_password_blocking(admin.password.clone()).await?;

    let name = match admin.name.trim() {
        "" => "Administrator".to_string(),
        name => name.to_string(),
    };

    let user = repo
        .create_user(NewUser {
            email,
            name,
            role: Role::Admin,
            password_hash,
        })
        .await?;

    tracing::info!(user_id = %user.id, "bootstrap admin created");
    Ok(BootstrapOutcome::Created)
}
