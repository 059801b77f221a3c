// src/models.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_LOGIN_LEN: usize = 100;
pub const MAX_PASSWORD_LEN: usize = 100;
pub const MAX_LABELS_LEN: usize = 50; // summed over every label's text

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub text: String,
}

impl Label {
    pub fn new(text: impl Into<String>) -> Self {
        Label { text: text.into() }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Local,
    Ldap,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Local => write!(f, "local"),
            AccountType::Ldap => write!(f, "ldap"),
        }
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(AccountType::Local),
            "ldap" => Ok(AccountType::Ldap),
            other => Err(format!("Unknown account type '{}' (expected 'local' or 'ldap')", other)),
        }
    }
}

/// One account entry as held by the repository and written to storage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub id: i64,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(rename = "type", default)]
    pub account_type: AccountType,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl AccountRecord {
    /// A blank local record: empty login and password, no labels.
    pub fn blank(id: i64) -> Self {
        AccountRecord {
            id,
            labels: Vec::new(),
            account_type: AccountType::Local,
            login: String::new(),
            password: Some(String::new()),
        }
    }

    pub fn apply(&mut self, update: AccountUpdate) {
        match update {
            AccountUpdate::SetLogin(login) => self.login = login,
            AccountUpdate::SetPassword(password) => self.password = password,
            AccountUpdate::SetType(account_type) => self.account_type = account_type,
            AccountUpdate::SetLabels(labels) => self.labels = labels,
        }
    }
}

/// A single field edit on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountUpdate {
    SetLogin(String),
    SetPassword(Option<String>),
    SetType(AccountType),
    SetLabels(Vec<Label>),
}

/// The shape handed to callers outside the repository. Never stored.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ExternalAccountView {
    pub id: i64,
    pub labels: Vec<Label>,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub login: String,
    pub password: Option<String>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldError {
    Required,
    TooLong { max: usize },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Required => write!(f, "is required"),
            FieldError::TooLong { max } => write!(f, "must not exceed {} characters", max),
        }
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<FieldError>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.login.is_none() && self.password.is_none() && self.labels.is_none()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            ("login", self.login),
            ("password", self.password),
            ("labels", self.labels),
        ];
        let mut first = true;
        for (name, error) in fields {
            if let Some(error) = error {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{} {}", name, error)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_record_is_local_with_empty_fields() {
        let record = AccountRecord::blank(7);
        assert_eq!(record.id, 7);
        assert_eq!(record.account_type, AccountType::Local);
        assert!(record.login.is_empty());
        assert_eq!(record.password.as_deref(), Some(""));
        assert!(record.labels.is_empty());
    }

    #[test]
    fn test_apply_updates_each_field() {
        let mut record = AccountRecord::blank(1);
        record.apply(AccountUpdate::SetLogin("alice".to_string()));
        record.apply(AccountUpdate::SetPassword(Some("pw".to_string())));
        record.apply(AccountUpdate::SetType(AccountType::Ldap));
        record.apply(AccountUpdate::SetLabels(vec![Label::new("work")]));

        assert_eq!(record.login, "alice");
        assert_eq!(record.password.as_deref(), Some("pw"));
        assert_eq!(record.account_type, AccountType::Ldap);
        assert_eq!(record.labels, vec![Label::new("work")]);
        assert_eq!(record.id, 1);
    }

    #[test]
    fn test_record_json_shape() {
        let mut record = AccountRecord::blank(42);
        record.login = "bob".to_string();
        record.account_type = AccountType::Ldap;
        record.password = None;
        record.labels = vec![Label::new("ops")];

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 42,
                "labels": [{ "text": "ops" }],
                "type": "ldap",
                "login": "bob",
                "password": null
            })
        );
    }

    #[test]
    fn test_record_ignores_ui_only_keys() {
        let raw = r#"{"id":1,"labels":[],"type":"local","login":"a","password":"b",
            "showPassword":true,"errors":{}}"#;
        let record: AccountRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.login, "a");
        assert_eq!(record.password.as_deref(), Some("b"));
    }

    #[test]
    fn test_account_type_from_str() {
        assert_eq!("LDAP".parse::<AccountType>(), Ok(AccountType::Ldap));
        assert_eq!(" local ".parse::<AccountType>(), Ok(AccountType::Local));
        assert!("kerberos".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_validation_errors_display() {
        let errors = ValidationErrors {
            login: Some(FieldError::Required),
            password: None,
            labels: Some(FieldError::TooLong { max: 50 }),
        };
        assert_eq!(errors.to_string(), "login is required; labels must not exceed 50 characters");
        assert!(!errors.is_empty());
        assert!(ValidationErrors::default().is_empty());
    }
}
