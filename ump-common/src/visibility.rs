//! Visibility resolver
//!
//! Decides whether a viewer may see or download a protected resource:
//!
//! 1. A super-view capability for the resource kind always grants viewing.
//! 2. Otherwise the resource's view permission is evaluated against the
//!    principal and its resolved lookup memberships.
//!
//! Downloading needs a super-download capability, or viewability plus the
//! resource's `downloadable` flag.

use std::time::Duration;

use crate::catalogue::Channel;
use crate::lookup::{resolve_memberships, IdentityLookup, Memberships};
use crate::permission::Permission;
use crate::principal::{Action, Capability, Principal, ResourceKind};

/// A catalogue entity guarded by a view permission
pub trait Protected {
    const KIND: ResourceKind;

    fn view_permission(&self) -> &Permission;

    /// Whether the owner allows downloads; only media items set this
    fn downloadable(&self) -> bool {
        false
    }

    /// Whether the resource came from the legacy SMS
    fn has_legacy_link(&self) -> bool {
        false
    }
}

/// A principal together with its resolved lookup memberships
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Viewer {
    principal: Principal,
    memberships: Memberships,
}

impl Viewer {
    pub fn new(principal: Principal, memberships: Memberships) -> Self {
        Self {
            principal,
            memberships,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Resolve memberships through the lookup collaborator, best effort
    pub async fn resolve(
        principal: Principal,
        lookup: &dyn IdentityLookup,
        timeout: Duration,
    ) -> Self {
        let memberships = resolve_memberships(lookup, &principal, timeout).await;
        Self::new(principal, memberships)
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn memberships(&self) -> &Memberships {
        &self.memberships
    }

    fn grants(&self, permission: &Permission) -> bool {
        permission.grants(&self.principal, &self.memberships)
    }
}

/// Can the viewer see this resource?
pub fn is_visible_to<R: Protected>(resource: &R, viewer: &Viewer) -> bool {
    if viewer.principal.has_capability(Capability::view(R::KIND)) {
        return true;
    }
    viewer.grants(resource.view_permission())
}

/// Can the viewer download this resource?
pub fn is_downloadable_by<R: Protected>(resource: &R, viewer: &Viewer) -> bool {
    if viewer.principal.has_capability(Capability::download(R::KIND)) {
        return true;
    }
    is_visible_to(resource, viewer) && resource.downloadable()
}

/// Can the resource appear in feed-style (RSS) listings at all?
///
/// Resources not sourced from the legacy SMS never appear in feeds. This is
/// layered on top of visibility, not a replacement for it.
pub fn is_feed_eligible<R: Protected>(resource: &R) -> bool {
    resource.has_legacy_link()
}

/// Can the viewer edit a channel and the items and playlists it contains?
pub fn can_edit_channel(channel: &Channel, viewer: &Viewer) -> bool {
    if viewer
        .principal
        .has_capability(Capability::new(Action::Change, ResourceKind::Channel))
    {
        return true;
    }
    viewer.grants(&channel.edit_permission)
}

/// Keep only the resources the viewer can see, preserving order
pub fn filter_viewable<R: Protected>(resources: Vec<R>, viewer: &Viewer) -> Vec<R> {
    resources
        .into_iter()
        .filter(|r| is_visible_to(r, viewer))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doc {
        permission: Permission,
        downloadable: bool,
    }

    impl Protected for Doc {
        const KIND: ResourceKind = ResourceKind::MediaItem;

        fn view_permission(&self) -> &Permission {
            &self.permission
        }

        fn downloadable(&self) -> bool {
            self.downloadable
        }
    }

    fn doc(permission: Permission, downloadable: bool) -> Doc {
        Doc {
            permission,
            downloadable,
        }
    }

    fn viewers() -> Vec<Viewer> {
        vec![
            Viewer::anonymous(),
            Viewer::new(Principal::user("spqr1"), Memberships::default()),
            Viewer::new(Principal::user("abc12"), Memberships::new(["101888"], ["ENG"])),
        ]
    }

    #[test]
    fn test_public_visible_to_everyone() {
        let d = doc(Permission::public(), false);
        for viewer in viewers() {
            assert!(is_visible_to(&d, &viewer));
        }
    }

    #[test]
    fn test_reset_permission_hidden_from_everyone() {
        let d = doc(Permission::new(), true);
        for viewer in viewers() {
            assert!(!is_visible_to(&d, &viewer));
            assert!(!is_downloadable_by(&d, &viewer));
        }
    }

    #[test]
    fn test_super_view_overrides_permission() {
        let d = doc(Permission::new(), false);
        let viewer = Viewer::new(
            Principal::with_capabilities("admin1", [Capability::view(ResourceKind::MediaItem)]),
            Memberships::default(),
        );
        assert!(is_visible_to(&d, &viewer));
        assert!(!is_downloadable_by(&d, &viewer), "super-view does not bypass downloadable");
    }

    #[test]
    fn test_super_view_is_per_kind() {
        let d = doc(Permission::new(), false);
        let viewer = Viewer::new(
            Principal::with_capabilities("admin1", [Capability::view(ResourceKind::Playlist)]),
            Memberships::default(),
        );
        assert!(!is_visible_to(&d, &viewer));
    }

    #[test]
    fn test_super_download_overrides_everything() {
        let d = doc(Permission::new(), false);
        let viewer = Viewer::new(
            Principal::with_capabilities(
                "admin1",
                [Capability::download(ResourceKind::MediaItem)],
            ),
            Memberships::default(),
        );
        assert!(is_downloadable_by(&d, &viewer));
    }

    #[test]
    fn test_downloadable_requires_visibility_and_flag() {
        let visible_flagged = doc(Permission::public(), true);
        let visible_unflagged = doc(Permission::public(), false);
        let hidden_flagged = doc(Permission::new(), true);
        let anon = Viewer::anonymous();

        assert!(is_downloadable_by(&visible_flagged, &anon));
        assert!(!is_downloadable_by(&visible_unflagged, &anon));
        assert!(!is_downloadable_by(&hidden_flagged, &anon));
    }

    #[test]
    fn test_group_gated_with_empty_memberships_is_hidden() {
        let mut p = Permission::new();
        p.group_ids.insert("101888".to_string());
        let d = doc(p, true);

        let degraded = Viewer::new(Principal::user("abc12"), Memberships::default());
        assert!(!is_visible_to(&d, &degraded));

        let member = Viewer::new(Principal::user("abc12"), Memberships::new(["101888"], Vec::<String>::new()));
        assert!(is_visible_to(&d, &member));
    }

    #[test]
    fn test_filter_viewable_preserves_order() {
        let mut only_spqr1 = Permission::new();
        only_spqr1.crsids.insert("spqr1".to_string());

        let docs = vec![
            doc(Permission::public(), false),
            doc(Permission::new(), false),
            doc(only_spqr1, false),
        ];
        let viewer = Viewer::new(Principal::user("spqr1"), Memberships::default());

        let visible = filter_viewable(docs, &viewer);
        assert_eq!(visible.len(), 2);
        assert!(visible[0].permission.is_public);
        assert!(visible[1].permission.crsids.contains("spqr1"));
    }

    #[test]
    fn test_not_feed_eligible_by_default() {
        assert!(!is_feed_eligible(&doc(Permission::public(), true)));
    }
}
