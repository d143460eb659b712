//! Request credentials.

use std::sync::Arc;

use crate::policy::PolicyDocument;

/// A resolved request credential.
///
/// `extern_user_id` identifies the acting user; `extern_root_id` identifies
/// the root account it belongs to. A root user has the two equal; a sub-user
/// carries its root's id in `extern_root_id`. Anonymous requests have both
/// empty.
#[derive(Clone, Default)]
pub struct Credential {
    /// Access key id the request was signed with; empty for anonymous.
    pub access_key: String,
    /// Display name, for listing owners and initiators.
    pub display_name: String,
    /// Canonical id of the acting user.
    pub extern_user_id: String,
    /// Canonical id of the owning root account.
    pub extern_root_id: String,
    /// The user's IAM policy, if one is attached.
    pub iam_policy: Option<Arc<dyn PolicyDocument>>,
    /// Set by the authorization pipeline when a policy layer allowed the
    /// request; downstream ACL evaluation is skipped when set.
    pub allow_other_user_access: bool,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_key", &self.access_key)
            .field("extern_user_id", &self.extern_user_id)
            .field("extern_root_id", &self.extern_root_id)
            .field("has_iam_policy", &self.iam_policy.is_some())
            .field("allow_other_user_access", &self.allow_other_user_access)
            .finish_non_exhaustive()
    }
}

impl Credential {
    /// The anonymous credential.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A root-account credential (user id equals root id).
    #[must_use]
    pub fn root(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            access_key: String::new(),
            display_name: display_name.into(),
            extern_user_id: id.clone(),
            extern_root_id: id,
            iam_policy: None,
            allow_other_user_access: false,
        }
    }

    /// Whether this is the anonymous credential.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.extern_user_id.is_empty()
    }

    /// Whether this credential is the root user of the given account.
    #[must_use]
    pub fn is_root_of(&self, owner_id: &str) -> bool {
        self.extern_root_id == owner_id && self.extern_user_id == self.extern_root_id
    }
}
