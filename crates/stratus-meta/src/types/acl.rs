//! Access-control-list types shared by buckets and objects.
//!
//! An [`Acl`] carries either a canned ACL or a list of explicit grants; the
//! two are mutually exclusive (a non-empty canned ACL takes precedence, as in
//! the persisted form).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CannedAcl
// ---------------------------------------------------------------------------

/// Predefined (canned) ACL grants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CannedAcl {
    /// Owner gets `FULL_CONTROL`. No one else has access rights (default).
    #[default]
    Private,
    /// Owner gets `FULL_CONTROL`. The `AllUsers` group gets `READ` access.
    PublicRead,
    /// Owner gets `FULL_CONTROL`. The `AllUsers` group gets `READ` and `WRITE` access.
    PublicReadWrite,
    /// Owner gets `FULL_CONTROL`. The `AuthenticatedUsers` group gets `READ` access.
    AuthenticatedRead,
    /// The `LogDelivery` group gets `WRITE` and `READ_ACP` permissions.
    LogDeliveryWrite,
}

impl CannedAcl {
    /// Return the string representation of the canned ACL.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::PublicRead => "public-read",
            Self::PublicReadWrite => "public-read-write",
            Self::AuthenticatedRead => "authenticated-read",
            Self::LogDeliveryWrite => "log-delivery-write",
        }
    }
}

impl fmt::Display for CannedAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`CannedAcl`] from a string fails.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown canned ACL: {0}")]
pub struct ParseCannedAclError(String);

impl FromStr for CannedAcl {
    type Err = ParseCannedAclError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "public-read" => Ok(Self::PublicRead),
            "public-read-write" => Ok(Self::PublicReadWrite),
            "authenticated-read" => Ok(Self::AuthenticatedRead),
            "log-delivery-write" => Ok(Self::LogDeliveryWrite),
            _ => Err(ParseCannedAclError(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Permission / Grantee / Grant
// ---------------------------------------------------------------------------

/// A permission that can be granted to a grantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    /// Grants full control (READ, WRITE, READ_ACP, WRITE_ACP).
    FullControl,
    /// Allows listing the bucket or reading object data.
    Read,
    /// Allows creating and overwriting objects in the bucket.
    Write,
    /// Allows reading the ACL.
    ReadAcp,
    /// Allows writing the ACL.
    WriteAcp,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FullControl => "FULL_CONTROL",
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::ReadAcp => "READ_ACP",
            Self::WriteAcp => "WRITE_ACP",
        };
        f.write_str(s)
    }
}

/// Predefined grantee groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AclGroup {
    /// Anyone, authenticated or not.
    AllUsers,
    /// Any request carrying a non-anonymous credential.
    AuthenticatedUsers,
    /// The access-log delivery group.
    LogDelivery,
}

/// A grantee in an explicit grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Grantee {
    /// A canonical user identified by account id.
    CanonicalUser {
        /// The canonical user id.
        id: String,
    },
    /// A predefined group.
    Group {
        /// The group.
        group: AclGroup,
    },
}

/// An explicit grant pairing a grantee with a permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    /// The entity receiving the permission.
    pub grantee: Grantee,
    /// The permission granted.
    pub permission: Permission,
}

// ---------------------------------------------------------------------------
// Acl
// ---------------------------------------------------------------------------

/// An access control list: a canned ACL or explicit grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Acl {
    /// The canned ACL, if one was applied. Takes precedence over `grants`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canned: Option<CannedAcl>,
    /// Explicit grants, evaluated only when no canned ACL is set.
    #[serde(default)]
    pub grants: Vec<Grant>,
}

impl Acl {
    /// Build an ACL from a canned value.
    #[must_use]
    pub fn canned(acl: CannedAcl) -> Self {
        Self {
            canned: Some(acl),
            grants: Vec::new(),
        }
    }

    /// Whether any grant matches the given canonical user id with the given
    /// permission.
    #[must_use]
    pub fn is_permission_matched_by_id(&self, permission: Permission, user_id: &str) -> bool {
        self.grants.iter().any(|g| {
            g.permission == permission
                && matches!(&g.grantee, Grantee::CanonicalUser { id } if id == user_id)
        })
    }

    /// Whether any grant matches the given group with the given permission.
    #[must_use]
    pub fn is_permission_matched_by_group(&self, permission: Permission, group: AclGroup) -> bool {
        self.grants.iter().any(|g| {
            g.permission == permission && matches!(&g.grantee, Grantee::Group { group: gr } if *gr == group)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
