use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{info, warn};

use crate::db::Store;
use crate::error::{FieldErrors, ServiceError};
use crate::models::{LoginRequest, LoginResponse, Student, StudentResponse};

/// Splits an `Authorization: Basic ...` value into email and password.
pub fn parse_basic_header(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (email, password) = decoded.split_once(':')?;
    Some((email.to_string(), password.to_string()))
}

pub fn basic_header(email: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{email}:{password}")))
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, ServiceError> {
    bcrypt::hash(password, cost).map_err(|e| ServiceError::Internal(e.to_string()))
}

/// Resolves credentials to an active student.
pub async fn authenticate(
    store: &dyn Store,
    email: &str,
    password: &str,
) -> Result<Student, ServiceError> {
    let email = email.trim();
    let Some(student) = store.find_student_by_email(email).await? else {
        warn!("Login attempt for unknown email: {}", email);
        return Err(ServiceError::invalid_credentials());
    };

    let matches = bcrypt::verify(password, &student.password).unwrap_or_else(|e| {
        warn!("Stored hash for {} is unusable: {}", email, e);
        false
    });
    if !matches {
        warn!("Invalid password attempt for email: {}", email);
        return Err(ServiceError::invalid_credentials());
    }
    if !student.is_active {
        return Err(ServiceError::Unauthorized("User account is disabled.".into()));
    }
    Ok(student)
}

pub async fn login(store: &dyn Store, request: &LoginRequest) -> Result<LoginResponse, ServiceError> {
    let mut errors = FieldErrors::new();
    if request.email.trim().is_empty() {
        errors.add("email", "This field is required.");
    }
    if request.password.is_empty() {
        errors.add("password", "This field is required.");
    }
    errors.into_result()?;

    match authenticate(store, &request.email, &request.password).await {
        Ok(student) => {
            info!("Student {} logged in", student.email);
            Ok(LoginResponse {
                success: true,
                user: StudentResponse::from(&student),
            })
        }
        Err(ServiceError::Unauthorized(message)) => Err(ServiceError::Validation(
            FieldErrors::single(FieldErrors::NON_FIELD, message.trim_end_matches('.')),
        )),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_header_round_trips() {
        let header = basic_header("asha@college.edu", "pa:ss");
        assert_eq!(
            parse_basic_header(&header),
            Some(("asha@college.edu".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn other_schemes_and_garbage_are_rejected() {
        assert_eq!(parse_basic_header("Bearer abc"), None);
        assert_eq!(parse_basic_header("Basic !!!"), None);
        assert_eq!(parse_basic_header("Basic"), None);
        // base64("nocolon")
        assert_eq!(parse_basic_header("Basic bm9jb2xvbg=="), None);
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let header = basic_header("a@b.c", "x").replacen("Basic", "basic", 1);
        assert!(parse_basic_header(&header).is_some());
    }
}
