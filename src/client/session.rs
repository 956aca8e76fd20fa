//! Who is logged in, and the local file that remembers it between runs.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::api::ApiClient;
use super::error::ApiError;
use crate::models::StudentResponse;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session file could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StoredSession {
    pub credential: Option<String>,
    pub user: StudentResponse,
}

/// JSON file standing in for browser local storage.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$HOME/.college-transport/session.json`, or the working directory
    /// when no home is known.
    pub fn default_path() -> PathBuf {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".college-transport")
            .join("session.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is no session; an unreadable one is discarded.
    pub fn load(&self) -> Option<StoredSession> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Could not read session file {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Discarding corrupt session file: {}", e);
                if let Err(e) = self.clear() {
                    warn!("Could not remove corrupt session file: {}", e);
                }
                None
            }
        }
    }

    pub fn save(&self, session: &StoredSession) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(session)?)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Unauthenticated,
    Restoring,
    Authenticated(StudentResponse),
}

/// Process-wide authentication: the API client's credential, the current
/// student, and the session file kept in step with both.
pub struct AuthContext {
    api: ApiClient,
    sessions: SessionFile,
    state: AuthState,
}

impl AuthContext {
    pub fn new(api: ApiClient, sessions: SessionFile) -> Self {
        Self {
            api,
            sessions,
            state: AuthState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated(_))
    }

    pub fn user(&self) -> Option<&StudentResponse> {
        match &self.state {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    fn persist(&self, user: &StudentResponse) {
        let session = StoredSession {
            credential: self.api.credential().map(str::to_string),
            user: user.clone(),
        };
        if let Err(e) = self.sessions.save(&session) {
            warn!("Could not save session: {}", e);
        }
    }

    fn forget(&mut self) {
        self.api.clear_credential();
        if let Err(e) = self.sessions.clear() {
            warn!("Could not remove session file: {}", e);
        }
        self.state = AuthState::Unauthenticated;
    }

    /// Revalidates a remembered session against `/user/`. Any failure leaves
    /// the context unauthenticated with local state purged.
    pub async fn restore(&mut self) -> &AuthState {
        let Some(session) = self.sessions.load() else {
            debug!("No stored session");
            self.state = AuthState::Unauthenticated;
            return &self.state;
        };
        let Some(credential) = session.credential else {
            info!("Stored session has no credential, login required");
            self.forget();
            return &self.state;
        };

        self.state = AuthState::Restoring;
        self.api.set_credential(Some(credential));
        match self.api.current_user().await {
            Ok(user) => {
                info!("Session restored for {}", user.email);
                self.persist(&user);
                self.state = AuthState::Authenticated(user);
            }
            Err(e) if e.is_unauthorized() => {
                info!("Stored session rejected: {}", e);
                self.forget();
            }
            Err(e) => {
                warn!("Could not revalidate stored session, login required: {}", e);
                self.forget();
            }
        }
        &self.state
    }

    /// On failure the previous state is kept and the error returned.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<StudentResponse, ApiError> {
        let previous = self.api.credential().map(str::to_string);
        match self.api.login(email, password).await {
            Ok(user) => {
                self.persist(&user);
                self.state = AuthState::Authenticated(user.clone());
                Ok(user)
            }
            Err(e) => {
                self.api.set_credential(previous);
                Err(e)
            }
        }
    }

    pub async fn logout(&mut self) {
        self.api.logout().await;
        self.forget();
        info!("Logged out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> StudentResponse {
        StudentResponse {
            id: "65f0c0ffee".into(),
            email: "asha@college.edu".into(),
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            phone_number: "9876543210".into(),
            year: "3".into(),
            roll_no: "21CS042".into(),
            dept: "CSE".into(),
            gender: "F".into(),
            student_type: "REGULAR".into(),
            degree_type: "BTECH".into(),
        }
    }

    #[test]
    fn save_load_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("nested").join("session.json"));
        assert!(file.load().is_none());

        let session = StoredSession {
            credential: Some("Basic abc".into()),
            user: student(),
        };
        file.save(&session).unwrap();
        assert_eq!(file.load(), Some(session));

        file.clear().unwrap();
        assert!(file.load().is_none());
        // clearing twice is fine
        file.clear().unwrap();
    }

    #[test]
    fn corrupt_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let file = SessionFile::new(&path);
        assert!(file.load().is_none());
        assert!(!path.exists());
    }
}
