// src/projection.rs
use crate::models::{AccountRecord, AccountType, ExternalAccountView, Label};

/// Shapes a record for callers outside the repository.
/// Directory-backed accounts never expose a password.
pub fn project(record: &AccountRecord) -> ExternalAccountView {
    let password = match record.account_type {
        AccountType::Ldap => None,
        AccountType::Local => record.password.clone(),
    };
    ExternalAccountView {
        id: record.id,
        labels: record.labels.clone(),
        account_type: record.account_type,
        login: record.login.clone(),
        password,
    }
}

/// Renders labels the way a user would type them.
pub fn labels_to_text(labels: &[Label]) -> String {
    labels
        .iter()
        .map(|label| label.text.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
