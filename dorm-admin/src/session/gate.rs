use crate::models::{Capability, StaffProfile};
use crate::services::StaffDirectory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantSource {
    /// Signed-in staff profile.
    Session,
    /// LINE user id confirmed as staff by the backend.
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted(GrantSource),
    Denied,
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted(_))
    }
}

/// Decide whether the caller may use `capability`.
///
/// A signed-in profile is checked first. A profile without the grant, or no
/// profile, falls back to looking up the remembered LINE user id in the staff
/// directory. Every other case, lookup errors included, is denied.
pub async fn authorize(
    profile: Option<&StaffProfile>,
    line_user_id: Option<&str>,
    capability: Capability,
    directory: &dyn StaffDirectory,
) -> Access {
    if let Some(profile) = profile {
        if profile.can(capability) {
            return Access::Granted(GrantSource::Session);
        }
    }

    let Some(line_user_id) = line_user_id.map(str::trim).filter(|id| !id.is_empty()) else {
        return Access::Denied;
    };

    match directory.staff_by_line_user(line_user_id).await {
        Ok(Some(lookup)) if lookup.can(capability) => Access::Granted(GrantSource::Line),
        Ok(_) => {
            tracing::info!(capability = capability.as_str(), "LINE user lacks capability");
            Access::Denied
        }
        Err(e) => {
            tracing::warn!(
                capability = capability.as_str(),
                error = %e,
                "Staff lookup failed, denying access"
            );
            Access::Denied
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, StaffLookup};
    use crate::services::ApiError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Directory {
        Staff(StaffLookup),
        NotStaff,
        Broken,
    }

    struct FakeDirectory {
        answer: Directory,
        lookups: AtomicUsize,
    }

    impl FakeDirectory {
        fn new(answer: Directory) -> Self {
            Self {
                answer,
                lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StaffDirectory for FakeDirectory {
        async fn staff_by_line_user(&self, _: &str) -> Result<Option<StaffLookup>, ApiError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            match &self.answer {
                Directory::Staff(lookup) => Ok(Some(lookup.clone())),
                Directory::NotStaff => Ok(None),
                Directory::Broken => Err(ApiError::Status {
                    status: 503,
                    message: "maintenance".into(),
                }),
            }
        }
    }

    fn profile(role: Role, permissions: &[&str]) -> StaffProfile {
        StaffProfile {
            id: "s1".into(),
            username: "nok".into(),
            display_name: None,
            role,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn line_staff(role: Option<Role>, permissions: &[&str]) -> StaffLookup {
        StaffLookup {
            is_staff: true,
            display_name: Some("Nok".into()),
            role,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn session_profile_with_grant_skips_lookup() {
        let directory = FakeDirectory::new(Directory::Broken);
        let p = profile(Role::Staff, &["meter"]);

        let access = authorize(Some(&p), Some("U1"), Capability::Meter, &directory).await;

        assert_eq!(access, Access::Granted(GrantSource::Session));
        assert_eq!(directory.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn admin_profile_is_granted() {
        let directory = FakeDirectory::new(Directory::NotStaff);
        let p = profile(Role::Admin, &[]);
        let access = authorize(Some(&p), None, Capability::Invoices, &directory).await;
        assert_eq!(access, Access::Granted(GrantSource::Session));
    }

    #[tokio::test]
    async fn line_staff_with_permission_is_granted() {
        let directory =
            FakeDirectory::new(Directory::Staff(line_staff(Some(Role::Staff), &["meter"])));
        let access = authorize(None, Some("U1"), Capability::Meter, &directory).await;
        assert_eq!(access, Access::Granted(GrantSource::Line));
    }

    #[tokio::test]
    async fn line_owner_is_granted_without_permissions() {
        let directory = FakeDirectory::new(Directory::Staff(line_staff(Some(Role::Owner), &[])));
        let access = authorize(None, Some("U1"), Capability::Meter, &directory).await;
        assert!(access.is_granted());
    }

    #[tokio::test]
    async fn profile_without_grant_falls_back_to_line() {
        let directory =
            FakeDirectory::new(Directory::Staff(line_staff(Some(Role::Staff), &["meter"])));
        let p = profile(Role::Staff, &["invoices"]);
        let access = authorize(Some(&p), Some("U1"), Capability::Meter, &directory).await;
        assert_eq!(access, Access::Granted(GrantSource::Line));
    }

    #[tokio::test]
    async fn line_staff_without_permission_is_denied() {
        let directory =
            FakeDirectory::new(Directory::Staff(line_staff(Some(Role::Staff), &["chat"])));
        let access = authorize(None, Some("U1"), Capability::Meter, &directory).await;
        assert_eq!(access, Access::Denied);
    }

    #[tokio::test]
    async fn unknown_line_user_is_denied() {
        let directory = FakeDirectory::new(Directory::NotStaff);
        let access = authorize(None, Some("U1"), Capability::Meter, &directory).await;
        assert_eq!(access, Access::Denied);
    }

    #[tokio::test]
    async fn lookup_error_fails_closed() {
        let directory = FakeDirectory::new(Directory::Broken);
        let access = authorize(None, Some("U1"), Capability::Meter, &directory).await;
        assert_eq!(access, Access::Denied);
        assert_eq!(directory.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn nobody_is_denied_without_lookup() {
        let directory = FakeDirectory::new(Directory::NotStaff);
        let access = authorize(None, Some("   "), Capability::Meter, &directory).await;
        assert_eq!(access, Access::Denied);
        assert_eq!(directory.lookups.load(Ordering::SeqCst), 0);
    }
}
