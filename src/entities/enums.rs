//! Value enums shared by the batch transfer tables.
//!
//! All enums are stored as short strings so the rows stay readable from the
//! admin UI and from plain SQL.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which side of a batch is fixed across all of its relations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// One fixed source account pays many recipients
    #[sea_orm(string_value = "one_to_many")]
    OneToMany,
    /// Many source accounts pay one fixed recipient
    #[sea_orm(string_value = "many_to_one")]
    ManyToOne,
}

impl BatchMode {
    /// Wire/storage spelling of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneToMany => "one_to_many",
            Self::ManyToOne => "many_to_one",
        }
    }
}

/// Lifecycle status used by both batches and relations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Created, not yet attempted
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Attempt in flight
    #[sea_orm(string_value = "processing")]
    Processing,
    /// Finished successfully
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Finished unsuccessfully
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl TransferStatus {
    /// Wire/storage spelling of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// `completed` and `failed` end a lifecycle and stamp the batch end time.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Relations only move forward. Nothing returns to `pending`, a relation that
    /// errors before its attempt starts may fail straight from `pending`, and a
    /// `failed` relation may be picked up again by a single-relation retry.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending | Self::Failed, Self::Processing)
            | (Self::Pending, Self::Failed)
            | (Self::Processing, Self::Completed | Self::Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the recipient of a transfer is addressed at the account provider.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ContactType {
    /// Provider user id
    #[sea_orm(string_value = "uid")]
    Uid,
    /// Provider account email
    #[sea_orm(string_value = "email")]
    Email,
    /// Internal account reference managed by this back office
    #[default]
    #[sea_orm(string_value = "inner")]
    Inner,
}

impl ContactType {
    /// Wire/storage spelling of the contact type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uid => "uid",
            Self::Email => "email",
            Self::Inner => "inner",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_transitions_move_forward() {
        use TransferStatus::{Completed, Failed, Pending, Processing};

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Failed));

        assert!(!Processing.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn test_serde_spelling_matches_storage() {
        assert_eq!(
            serde_json::to_string(&BatchMode::OneToMany).ok(),
            Some("\"one_to_many\"".to_string())
        );
        assert_eq!(
            serde_json::from_str::<ContactType>("\"email\"").ok(),
            Some(ContactType::Email)
        );
        assert_eq!(TransferStatus::Failed.to_string(), "failed");
    }
}
