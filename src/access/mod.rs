//! Phone registration and the feature gate in front of the shared credential.
//!
//! Users without their own API key register a phone number; an admin then
//! activates it. Activated phones (and admin sessions) may use the system key.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Required number of digits in a phone number.
pub const PHONE_DIGITS: usize = 10;

/// Errors from registration and admin operations.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Phone is not 10 digits starting with 0.
    #[error("Số điện thoại không hợp lệ (cần 10 chữ số, bắt đầu bằng 0)")]
    InvalidPhone(String),
    /// Name was blank.
    #[error("Vui lòng nhập họ tên")]
    MissingName,
    /// Phone already awaits review.
    #[error("Số điện thoại này đang chờ duyệt")]
    AlreadyPending,
    /// Phone is already active.
    #[error("Số điện thoại này đã được kích hoạt")]
    AlreadyActivated,
    /// No registration for this phone.
    #[error("Không tìm thấy số điện thoại {0}")]
    NotFound(String),
    /// Wrong admin username or password.
    #[error("Sai tên đăng nhập hoặc mật khẩu")]
    InvalidAdminLogin,
    /// Failed to read or write the registration file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The registration file is malformed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Review state of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    /// Waiting for an admin
    Pending,
    /// May use the system credential
    Activated,
    /// Refused; may register again
    Rejected,
}

/// One phone registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// Normalised phone number (digits only)
    pub phone: String,
    /// Name as entered
    pub full_name: String,
    /// Time of the latest registration or review
    pub timestamp: DateTime<Utc>,
    /// Review state
    pub status: RegistrationStatus,
}

/// Strips everything but digits and checks the local phone format.
pub fn normalize_phone(raw: &str) -> Result<String, AccessError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == PHONE_DIGITS && digits.starts_with('0') {
        Ok(digits)
    } else {
        Err(AccessError::InvalidPhone(raw.to_string()))
    }
}

/// Registrations persisted as a JSON array.
#[derive(Debug, Clone)]
pub struct RegistrationStore {
    path: PathBuf,
    registrations: Vec<Registration>,
}

impl RegistrationStore {
    /// Loads the store at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AccessError> {
        let path = path.into();
        let registrations = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            registrations,
        })
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), AccessError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.registrations)?)?;
        Ok(())
    }

    fn find_mut(&mut self, phone: &str) -> Result<&mut Registration, AccessError> {
        let phone = normalize_phone(phone)?;
        self.registrations
            .iter_mut()
            .find(|r| r.phone == phone)
            .ok_or(AccessError::NotFound(phone))
    }

    /// Records a new pending registration.
    ///
    /// A previously rejected phone may register again; pending or activated
    /// phones may not.
    pub fn register(&mut self, phone: &str, full_name: &str) -> Result<&Registration, AccessError> {
        let phone = normalize_phone(phone)?;
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(AccessError::MissingName);
        }

        let index = match self.registrations.iter().position(|r| r.phone == phone) {
            Some(i) => {
                match self.registrations[i].status {
                    RegistrationStatus::Pending => return Err(AccessError::AlreadyPending),
                    RegistrationStatus::Activated => return Err(AccessError::AlreadyActivated),
                    RegistrationStatus::Rejected => {}
                }
                let entry = &mut self.registrations[i];
                entry.full_name = full_name.to_string();
                entry.status = RegistrationStatus::Pending;
                entry.timestamp = Utc::now();
                i
            }
            None => {
                self.registrations.push(Registration {
                    phone: phone.clone(),
                    full_name: full_name.to_string(),
                    timestamp: Utc::now(),
                    status: RegistrationStatus::Pending,
                });
                self.registrations.len() - 1
            }
        };

        self.save()?;
        info!(phone = %phone, "registration received");
        Ok(&self.registrations[index])
    }

    fn set_status(&mut self, phone: &str, status: RegistrationStatus) -> Result<(), AccessError> {
        let entry = self.find_mut(phone)?;
        entry.status = status;
        entry.timestamp = Utc::now();
        let phone = entry.phone.clone();
        self.save()?;
        info!(phone = %phone, ?status, "registration updated");
        Ok(())
    }

    /// Activates a registration.
    pub fn activate(&mut self, phone: &str) -> Result<(), AccessError> {
        self.set_status(phone, RegistrationStatus::Activated)
    }

    /// Rejects a registration.
    pub fn reject(&mut self, phone: &str) -> Result<(), AccessError> {
        self.set_status(phone, RegistrationStatus::Rejected)
    }

    /// Removes a registration entirely, so the phone starts over.
    pub fn deactivate(&mut self, phone: &str) -> Result<(), AccessError> {
        let phone = normalize_phone(phone)?;
        let before = self.registrations.len();
        self.registrations.retain(|r| r.phone != phone);
        if self.registrations.len() == before {
            return Err(AccessError::NotFound(phone));
        }
        self.save()?;
        info!(phone = %phone, "registration removed");
        Ok(())
    }

    fn with_status(&self, status: RegistrationStatus) -> Vec<&Registration> {
        self.registrations
            .iter()
            .filter(|r| r.status == status)
            .collect()
    }

    /// Registrations awaiting review.
    pub fn pending(&self) -> Vec<&Registration> {
        self.with_status(RegistrationStatus::Pending)
    }

    /// Registrations allowed to use the system credential.
    pub fn activated(&self) -> Vec<&Registration> {
        self.with_status(RegistrationStatus::Activated)
    }

    /// Status of `phone`, if it is registered and well-formed.
    pub fn status(&self, phone: &str) -> Option<RegistrationStatus> {
        let phone = normalize_phone(phone).ok()?;
        self.registrations
            .iter()
            .find(|r| r.phone == phone)
            .map(|r| r.status)
    }
}

/// Admin login for the review commands.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminCredentials {
    /// Admin username
    pub username: String,
    /// Admin password; an empty password disables admin login
    pub password: String,
}

impl Default for AdminCredentials {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: String::new(),
        }
    }
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

impl AdminCredentials {
    /// Whether the given login matches.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        !self.password.is_empty() && self.username == username.trim() && self.password == password
    }

    /// Like [`verify`](Self::verify), as a `Result`.
    pub fn login(&self, username: &str, password: &str) -> Result<(), AccessError> {
        if self.verify(username, password) {
            Ok(())
        } else {
            Err(AccessError::InvalidAdminLogin)
        }
    }
}

/// Decides whether the shared system credential may be used.
pub trait FeatureGate: Send + Sync {
    /// Whether the current user may use features without their own key.
    fn can_access_feature(&self) -> bool;
}

/// Gate backed by the registration store.
#[derive(Debug, Clone)]
pub struct AccessGate {
    store: RegistrationStore,
    admin_logged_in: bool,
    user_phone: Option<String>,
}

impl AccessGate {
    /// A gate for the given user, who may be an admin.
    pub fn new(store: RegistrationStore, admin_logged_in: bool, user_phone: Option<String>) -> Self {
        Self {
            store,
            admin_logged_in,
            user_phone,
        }
    }

    /// The current user's registration status.
    pub fn user_status(&self) -> Option<RegistrationStatus> {
        self.user_phone
            .as_deref()
            .and_then(|phone| self.store.status(phone))
    }
}

impl FeatureGate for AccessGate {
    fn can_access_feature(&self) -> bool {
        self.admin_logged_in || self.user_status() == Some(RegistrationStatus::Activated)
    }
}

/// Gate that always allows access.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl FeatureGate for Unrestricted {
    fn can_access_feature(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, RegistrationStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistrationStore::open(dir.path().join("registrations.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn phone_normalisation() {
        assert_eq!(normalize_phone("0912 345 678").unwrap(), "0912345678");
        assert_eq!(normalize_phone("091-234-5678").unwrap(), "0912345678");
        assert!(matches!(
            normalize_phone("912345678"),
            Err(AccessError::InvalidPhone(_))
        ));
        assert!(normalize_phone("1912345678").is_err());
        assert!(normalize_phone("09123456789").is_err());
    }

    #[test]
    fn register_then_activate_persists() {
        let (dir, mut store) = store();
        store.register("0912345678", "  Nguyễn Văn A ").unwrap();
        assert_eq!(store.pending().len(), 1);
        assert_eq!(store.pending()[0].full_name, "Nguyễn Văn A");

        store.activate("0912 345 678").unwrap();
        let reopened = RegistrationStore::open(dir.path().join("registrations.json")).unwrap();
        assert_eq!(reopened.activated().len(), 1);
        assert!(reopened.pending().is_empty());
        assert_eq!(
            reopened.status("0912345678"),
            Some(RegistrationStatus::Activated)
        );
    }

    #[test]
    fn duplicate_rules() {
        let (_dir, mut store) = store();
        store.register("0912345678", "A").unwrap();
        assert!(matches!(
            store.register("0912345678", "A"),
            Err(AccessError::AlreadyPending)
        ));

        store.reject("0912345678").unwrap();
        store.register("0912345678", "B").unwrap();
        assert_eq!(store.status("0912345678"), Some(RegistrationStatus::Pending));

        store.activate("0912345678").unwrap();
        assert!(matches!(
            store.register("0912345678", "B"),
            Err(AccessError::AlreadyActivated)
        ));
    }

    #[test]
    fn blank_name_and_unknown_phone() {
        let (_dir, mut store) = store();
        assert!(matches!(
            store.register("0912345678", "   "),
            Err(AccessError::MissingName)
        ));
        assert!(matches!(
            store.activate("0987654321"),
            Err(AccessError::NotFound(_))
        ));
        assert!(store.deactivate("0987654321").is_err());
    }

    #[test]
    fn deactivate_removes_entry() {
        let (_dir, mut store) = store();
        store.register("0912345678", "A").unwrap();
        store.activate("0912345678").unwrap();
        store.deactivate("0912345678").unwrap();
        assert_eq!(store.status("0912345678"), None);
        store.register("0912345678", "A").unwrap();
    }

    #[test]
    fn gate_allows_admin_or_activated_phone() {
        let (_dir, mut store) = store();
        store.register("0912345678", "A").unwrap();

        let gate = AccessGate::new(store.clone(), false, Some("0912345678".into()));
        assert!(!gate.can_access_feature());

        let admin = AccessGate::new(store.clone(), true, None);
        assert!(admin.can_access_feature());

        store.activate("0912345678").unwrap();
        let gate = AccessGate::new(store, false, Some("0912345678".into()));
        assert!(gate.can_access_feature());
        assert!(Unrestricted.can_access_feature());
    }

    #[test]
    fn admin_credentials() {
        assert!(!AdminCredentials::default().verify("admin", ""));
        let admin = AdminCredentials {
            username: "admin".into(),
            password: "s3cret".into(),
        };
        assert!(admin.verify(" admin ", "s3cret"));
        assert!(admin.login("admin", "wrong").is_err());
        assert!(!format!("{admin:?}").contains("s3cret"));
    }
}
