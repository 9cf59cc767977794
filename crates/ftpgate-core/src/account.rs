//! The persistent account record, its credential secret and the schema it is validated against.

use crate::command::Permission;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, num::NonZeroU32};
use thiserror::Error;
use uuid::Uuid;

/// The storage driver an account's files are served from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum DriverKind {
    /// Local disk, rooted at the account's home directory.
    #[default]
    Local,
    /// An object store bucket.
    ObjectStorage,
    /// A version-control backed tree.
    Vcs,
    /// A driver name this build does not know. Kept so that driver selection can apply its
    /// fallback; rejected when an account is created or updated.
    Unknown(String),
}

impl DriverKind {
    /// Parses a driver name. Never fails: unrecognised names become [`DriverKind::Unknown`].
    pub fn from_name(name: &str) -> DriverKind {
        match name {
            "local" => DriverKind::Local,
            "object-storage" | "s3" => DriverKind::ObjectStorage,
            "vcs" | "git" => DriverKind::Vcs,
            other => DriverKind::Unknown(other.to_string()),
        }
    }

    /// The canonical name of this kind.
    pub fn name(&self) -> &str {
        match self {
            DriverKind::Local => "local",
            DriverKind::ObjectStorage => "object-storage",
            DriverKind::Vcs => "vcs",
            DriverKind::Unknown(name) => name,
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for DriverKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for DriverKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(DriverKind::from_name(&s))
    }
}

/// The stored credential of an account.
///
/// Comparing a supplied password against it is the job of a secret verifier; this type only
/// carries the stored form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PasswordSecret {
    /// A PBKDF2-HMAC-SHA512 derived key.
    Pbkdf2 {
        /// The salt the key was derived with.
        pbkdf2_salt: String,
        /// The base64 encoded derived key.
        pbkdf2_key: String,
        /// Iteration count.
        pbkdf2_iter: NonZeroU32,
    },
    /// A secret stored as-is. Only found in records created by older tooling.
    Plaintext {
        /// The password itself.
        password: String,
    },
}

impl fmt::Debug for PasswordSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordSecret::Pbkdf2 { pbkdf2_iter, .. } => write!(f, "Pbkdf2 {{ iter: {pbkdf2_iter}, key: ******* }}"),
            PasswordSecret::Plaintext { .. } => write!(f, "Plaintext {{ password: ******* }}"),
        }
    }
}

/// An FTP account as persisted by an [`AccountRepository`](crate::repository::AccountRepository).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Store assigned identifier.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Unique login name.
    pub username: String,
    /// The stored credential.
    #[serde(flatten)]
    pub secret: PasswordSecret,
    /// Absolute path the account's files live under.
    #[serde(rename = "homedir")]
    pub home_directory: String,
    /// Storage quota in bytes. Carried, not enforced here.
    #[serde(default)]
    pub quota: u64,
    /// Upload/download ratio. Carried, not enforced here.
    #[serde(default)]
    pub ratio: u64,
    /// Which storage driver serves the account.
    #[serde(default)]
    pub driver: DriverKind,
    /// Allowed (`TOKEN`) and denied (`!TOKEN`) commands.
    #[serde(default = "Permission::defaults")]
    pub permissions: Vec<Permission>,
    /// When the record was created.
    #[serde(default = "Utc::now", rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Checks the persisted fields against the [`schema`] rules.
    pub fn validate(&self) -> Result<(), ValidationError> {
        schema::USERNAME.check(&self.username)?;
        schema::HOMEDIR.check(&self.home_directory)?;
        schema::check_absolute(&self.home_directory)?;
        schema::QUOTA.check(self.quota)?;
        schema::RATIO.check(self.ratio)?;
        schema::check_driver(&self.driver)
    }

    /// The parts of the account that may be shown to operators.
    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            username: self.username.clone(),
            home_directory: self.home_directory.clone(),
            driver: self.driver.clone(),
            quota: self.quota,
            ratio: self.ratio,
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.username, self.home_directory)
    }
}

/// An account without its credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    /// Login name
    pub username: String,
    /// Home directory
    pub home_directory: String,
    /// Storage driver
    pub driver: DriverKind,
    /// Quota in bytes
    pub quota: u64,
    /// Ratio
    pub ratio: u64,
}

/// The input for creating an account, as received from an operator.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    /// Login name
    pub username: String,
    /// Plain password, sealed before it is stored
    pub password: String,
    /// Home directory
    #[serde(rename = "homedir")]
    pub home_directory: String,
    /// Quota in bytes
    #[serde(default)]
    pub quota: u64,
    /// Ratio
    #[serde(default)]
    pub ratio: u64,
    /// Driver name, `local` when absent
    #[serde(default)]
    pub driver: Option<String>,
    /// Permission tokens, every token allowed when absent
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

impl NewAccount {
    /// Validates every field and parses the driver and permission names.
    pub fn validate(self) -> Result<ValidatedAccount, ValidationError> {
        schema::USERNAME.check(&self.username)?;
        schema::PASSWORD.check(&self.password)?;
        schema::HOMEDIR.check(&self.home_directory)?;
        let home_directory = self.home_directory.trim().to_string();
        schema::check_absolute(&home_directory)?;
        schema::QUOTA.check(self.quota)?;
        schema::RATIO.check(self.ratio)?;

        let driver = self.driver.as_deref().map(DriverKind::from_name).unwrap_or_default();
        schema::check_driver(&driver)?;

        let permissions = match self.permissions {
            None => Permission::defaults(),
            Some(names) => names
                .iter()
                .map(|name| name.parse::<Permission>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| {
                    let message = format!("{e}; permissions must be one of the FTP command tokens, optionally prefixed with '!'");
                    ValidationError::new("permissions", message)
                })?,
        };

        Ok(ValidatedAccount {
            username: self.username,
            password: self.password.trim().to_string(),
            home_directory,
            quota: self.quota,
            ratio: self.ratio,
            driver,
            permissions,
        })
    }
}

/// A [`NewAccount`] that passed validation and only lacks its sealed secret.
#[derive(Debug)]
pub struct ValidatedAccount {
    username: String,
    password: String,
    home_directory: String,
    quota: u64,
    ratio: u64,
    driver: DriverKind,
    permissions: Vec<Permission>,
}

impl ValidatedAccount {
    /// The login name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The plain password, to be sealed into a [`PasswordSecret`].
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Turns this into a storable account carrying `secret` instead of the plain password.
    pub fn into_account(self, secret: PasswordSecret) -> Account {
        Account {
            id: Uuid::new_v4(),
            username: self.username,
            secret,
            home_directory: self.home_directory,
            quota: self.quota,
            ratio: self.ratio,
            driver: self.driver,
            permissions: self.permissions,
            created_at: Utc::now(),
        }
    }
}

/// A field failed its schema rule.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    /// The offending field
    pub field: String,
    /// What is expected of it
    pub message: String,
}

impl ValidationError {
    /// Creates a validation error for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// The field rules accounts are checked against.
pub mod schema {
    use super::{DriverKind, ValidationError};

    /// A bound on the character length of a string field.
    #[derive(Debug, Clone, Copy)]
    pub struct LengthRule {
        /// Field name
        pub field: &'static str,
        /// Minimum length in characters
        pub min: usize,
        /// Maximum length in characters
        pub max: usize,
        /// Whether surrounding whitespace is ignored
        pub trim: bool,
        /// Message reported on violation
        pub message: &'static str,
    }

    impl LengthRule {
        /// Checks `value` against the rule.
        pub fn check(&self, value: &str) -> Result<(), ValidationError> {
            let value = if self.trim { value.trim() } else { value };
            let len = value.chars().count();
            if len < self.min || len > self.max {
                return Err(ValidationError::new(self.field, self.message));
            }
            Ok(())
        }
    }

    /// An inclusive bound on a numeric field.
    #[derive(Debug, Clone, Copy)]
    pub struct RangeRule {
        /// Field name
        pub field: &'static str,
        /// Smallest accepted value
        pub min: u64,
        /// Largest accepted value
        pub max: u64,
        /// Message reported on violation
        pub message: &'static str,
    }

    impl RangeRule {
        /// Checks `value` against the rule.
        pub fn check(&self, value: u64) -> Result<(), ValidationError> {
            if value < self.min || value > self.max {
                return Err(ValidationError::new(self.field, self.message));
            }
            Ok(())
        }
    }

    /// Stored usernames.
    pub const USERNAME: LengthRule = LengthRule {
        field: "username",
        min: 4,
        max: 32,
        trim: false,
        message: "Username must be 4-32 characters long",
    };

    /// Passwords, ignoring surrounding whitespace.
    pub const PASSWORD: LengthRule = LengthRule {
        field: "password",
        min: 8,
        max: 64,
        trim: true,
        message: "Password must be 8-64 characters long",
    };

    /// Home directory paths.
    pub const HOMEDIR: LengthRule = LengthRule {
        field: "homedir",
        min: 1,
        max: 255,
        trim: true,
        message: "Home directory must be 1-255 characters long",
    };

    /// Storage quota in bytes.
    pub const QUOTA: RangeRule = RangeRule {
        field: "quota",
        min: 0,
        max: 1_000_000_000,
        message: "Quota must be 0-1000000000",
    };

    /// Upload/download ratio.
    pub const RATIO: RangeRule = RangeRule {
        field: "ratio",
        min: 0,
        max: 1_000_000_000,
        message: "Ratio must be 0-1000000000",
    };

    /// Login input is bounded more loosely than stored usernames.
    pub const LOGIN_USERNAME: LengthRule = LengthRule {
        field: "username",
        min: 3,
        max: 32,
        trim: false,
        message: "Username must be 3-32 characters long",
    };

    pub(super) fn check_absolute(home: &str) -> Result<(), ValidationError> {
        if !home.trim().starts_with('/') {
            return Err(ValidationError::new("homedir", "Home directory must be an absolute path"));
        }
        Ok(())
    }

    pub(super) fn check_driver(driver: &DriverKind) -> Result<(), ValidationError> {
        if let DriverKind::Unknown(_) = driver {
            return Err(ValidationError::new("driver", "Driver must be one of local, object-storage, vcs"));
        }
        Ok(())
    }
}
