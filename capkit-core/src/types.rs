//! Domain types for a Capkit workspace.
//!
//! A workspace is addressed by the signed-in user's stable id and owns the
//! nine module documents listed in [`ModuleName::ALL`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable identity of a signed-in user; also identifies their workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Slash-separated address of a document in the store,
/// e.g. `workspaces/u1/modules/canvas` or `users/u1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentPath(pub String);

impl DocumentPath {
    /// `workspaces/{uid}/modules/{module}`
    pub fn module(uid: &UserId, module: ModuleName) -> Self {
        Self(format!("workspaces/{}/modules/{}", uid.0, module.as_str()))
    }

    /// `users/{uid}`
    pub fn profile(uid: &UserId) -> Self {
        Self(format!("users/{}", uid.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments, skipping empty ones.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for DocumentPath {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Module names
// ---------------------------------------------------------------------------

/// One of the nine independently synchronized workspace documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleName {
    Canvas,
    Personas,
    MarketResearch,
    Copywriting,
    Mindset,
    ProductDesign,
    Economics,
    Sales,
    Grow,
}

impl ModuleName {
    pub const ALL: [ModuleName; 9] = [
        ModuleName::Canvas,
        ModuleName::Personas,
        ModuleName::MarketResearch,
        ModuleName::Copywriting,
        ModuleName::Mindset,
        ModuleName::ProductDesign,
        ModuleName::Economics,
        ModuleName::Sales,
        ModuleName::Grow,
    ];

    /// Wire name used in document paths.
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleName::Canvas => "canvas",
            ModuleName::Personas => "personas",
            ModuleName::MarketResearch => "marketResearch",
            ModuleName::Copywriting => "copywriting",
            ModuleName::Mindset => "mindset",
            ModuleName::ProductDesign => "productDesign",
            ModuleName::Economics => "economics",
            ModuleName::Sales => "sales",
            ModuleName::Grow => "grow",
        }
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleName {
    type Err = CoreError;

    /// Accepts the wire name case-insensitively, with or without `-`/`_`
    /// separators (`marketResearch`, `market-research`, `market_research`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        ModuleName::ALL
            .into_iter()
            .find(|m| m.as_str().to_ascii_lowercase() == folded)
            .ok_or_else(|| CoreError::UnknownModule(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Identity and profile
// ---------------------------------------------------------------------------

/// What the identity provider reports for a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl AuthUser {
    pub fn new(uid: impl Into<UserId>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Display attributes stored at `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Profile written on first sign-in when no profile document exists.
    pub fn default_for(user: &AuthUser, now: DateTime<Utc>) -> Self {
        Self {
            name: user.display_name.clone().unwrap_or_default(),
            email: user.email.clone().unwrap_or_default(),
            created_at: Some(now),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_paths_use_wire_names() {
        let uid = UserId::from("u1");
        assert_eq!(
            DocumentPath::module(&uid, ModuleName::MarketResearch).as_str(),
            "workspaces/u1/modules/marketResearch"
        );
        assert_eq!(DocumentPath::profile(&uid).as_str(), "users/u1");
    }

    #[test]
    fn module_name_serde_matches_wire_name() {
        for module in ModuleName::ALL {
            let json = serde_json::to_string(&module).expect("serialize");
            assert_eq!(json, format!("\"{}\"", module.as_str()));
        }
    }

    #[test]
    fn default_profile_falls_back_to_empty_strings() {
        let now = Utc::now();
        let profile = UserProfile::default_for(&AuthUser::new("u1"), now);
        assert_eq!(profile.name, "");
        assert_eq!(profile.email, "");
        assert_eq!(profile.created_at, Some(now));
    }

    #[test]
    fn segments_skip_empty_parts() {
        let path = DocumentPath::from("/users//u1/");
        assert_eq!(path.segments().collect::<Vec<_>>(), vec!["users", "u1"]);
    }
}
