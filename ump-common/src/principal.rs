//! Requesting identities and their super capabilities

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Kinds of protected catalogue resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    MediaItem,
    Channel,
    Playlist,
}

impl ResourceKind {
    /// Model name used in capability codenames
    pub fn model_name(&self) -> &'static str {
        match self {
            ResourceKind::MediaItem => "mediaitem",
            ResourceKind::Channel => "channel",
            ResourceKind::Playlist => "playlist",
        }
    }
}

/// Action a capability grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Download,
    Change,
}

impl Action {
    fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Download => "download",
            Action::Change => "change",
        }
    }
}

/// A principal-level override, e.g. "can always view media items"
///
/// Stored and displayed by codename: `view_mediaitem`, `download_mediaitem`,
/// `change_channel`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capability {
    pub action: Action,
    pub kind: ResourceKind,
}

impl Capability {
    pub const fn new(action: Action, kind: ResourceKind) -> Self {
        Self { action, kind }
    }

    /// Super-view capability for a kind of resource
    pub const fn view(kind: ResourceKind) -> Self {
        Self::new(Action::View, kind)
    }

    /// Super-download capability for a kind of resource
    pub const fn download(kind: ResourceKind) -> Self {
        Self::new(Action::Download, kind)
    }

    pub fn codename(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.action.as_str(), self.kind.model_name())
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (action, kind) = s
            .split_once('_')
            .ok_or_else(|| Error::InvalidInput(format!("Invalid capability: {}", s)))?;

        let action = match action {
            "view" => Action::View,
            "download" => Action::Download,
            "change" => Action::Change,
            _ => return Err(Error::InvalidInput(format!("Invalid capability action: {}", s))),
        };

        let kind = match kind {
            "mediaitem" => ResourceKind::MediaItem,
            "channel" => ResourceKind::Channel,
            "playlist" => ResourceKind::Playlist,
            _ => return Err(Error::InvalidInput(format!("Invalid capability resource: {}", s))),
        };

        Ok(Capability::new(action, kind))
    }
}

/// Authenticated user as seen by the visibility resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub crsid: String,
    pub capabilities: BTreeSet<Capability>,
}

/// The requesting identity
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Principal {
    #[default]
    Anonymous,
    User(User),
}

impl Principal {
    /// Authenticated principal without any super capability
    pub fn user(crsid: impl Into<String>) -> Self {
        Principal::User(User {
            crsid: crsid.into(),
            capabilities: BTreeSet::new(),
        })
    }

    /// Authenticated principal holding the given capabilities
    pub fn with_capabilities(
        crsid: impl Into<String>,
        capabilities: impl IntoIterator<Item = Capability>,
    ) -> Self {
        Principal::User(User {
            crsid: crsid.into(),
            capabilities: capabilities.into_iter().collect(),
        })
    }

    pub fn crsid(&self) -> Option<&str> {
        match self {
            Principal::Anonymous => None,
            Principal::User(user) => Some(&user.crsid),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Principal::User(_))
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        match self {
            Principal::Anonymous => false,
            Principal::User(user) => user.capabilities.contains(&capability),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_codename_round_trip() {
        for codename in [
            "view_mediaitem",
            "download_mediaitem",
            "view_playlist",
            "change_channel",
        ] {
            let cap: Capability = codename.parse().unwrap();
            assert_eq!(cap.codename(), codename);
            assert_eq!(cap.to_string(), codename);
        }
    }

    #[test]
    fn test_capability_rejects_unknown() {
        assert!("delete_mediaitem".parse::<Capability>().is_err());
        assert!("view_album".parse::<Capability>().is_err());
        assert!("viewmediaitem".parse::<Capability>().is_err());
    }

    #[test]
    fn test_anonymous_has_nothing() {
        let anon = Principal::Anonymous;
        assert!(!anon.is_authenticated());
        assert_eq!(anon.crsid(), None);
        assert!(!anon.has_capability(Capability::view(ResourceKind::MediaItem)));
    }

    #[test]
    fn test_user_capabilities() {
        let user = Principal::with_capabilities(
            "spqr1",
            [Capability::download(ResourceKind::MediaItem)],
        );
        assert_eq!(user.crsid(), Some("spqr1"));
        assert!(user.has_capability(Capability::download(ResourceKind::MediaItem)));
        assert!(!user.has_capability(Capability::view(ResourceKind::MediaItem)));
    }
}
