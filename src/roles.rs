use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Explorer,
}

impl Role {
    /// Admin outranks explorer, explorer outranks user.
    pub fn rank(self) -> u8 {
        match self {
            Role::Admin => 3,
            Role::Explorer => 2,
            Role::User => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Explorer => "explorer",
        }
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            Role::Admin => Capabilities {
                can_edit: true,
                can_view: true,
                can_manage_users: true,
                can_view_metrics: true,
                can_access_explorer: true,
            },
            Role::User => Capabilities {
                can_edit: false,
                can_view: true,
                can_manage_users: false,
                can_view_metrics: true,
                can_access_explorer: false,
            },
            Role::Explorer => Capabilities {
                can_edit: false,
                can_view: true,
                can_manage_users: false,
                can_view_metrics: true,
                can_access_explorer: true,
            },
        }
    }

    pub fn permissions(self) -> &'static [Permission] {
        use Permission::*;
        match self {
            Role::Admin => &[
                SwitchProfile,
                EditProfile,
                ViewProfiles,
                ManageUsers,
                CreateUser,
                DeleteUser,
                ManageSpace,
                ViewSpace,
                AccessAdmin,
                AccessExplorer,
                ModifySecurity,
                ViewLogs,
            ],
            Role::Explorer => &[SwitchProfile, ViewProfiles, ViewSpace, AccessExplorer],
            Role::User => &[EditProfile, ViewSpace, ManageSpace],
        }
    }

    pub fn has_permission(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn is_protected(self) -> bool {
        matches!(self, Role::Admin | Role::Explorer)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse capability set attached to each role.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub can_edit: bool,
    pub can_view: bool,
    pub can_manage_users: bool,
    pub can_view_metrics: bool,
    pub can_access_explorer: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    SwitchProfile,
    EditProfile,
    ViewProfiles,
    ManageUsers,
    CreateUser,
    DeleteUser,
    ManageSpace,
    ViewSpace,
    AccessAdmin,
    AccessExplorer,
    ModifySecurity,
    ViewLogs,
}

pub fn has_permission(role: Option<Role>, permission: Permission) -> bool {
    role.is_some_and(|r| r.has_permission(permission))
}

pub fn can_edit_user(actor: Option<Role>, target: Option<Role>) -> bool {
    match (actor, target) {
        (Some(a), Some(t)) => a.rank() > t.rank(),
        _ => false,
    }
}

pub fn can_switch_to_profile(actor: Option<Role>, target: Option<Role>) -> bool {
    matches!((actor, target), (Some(Role::Admin), Some(_)))
}

pub fn can_manage_role(actor: Option<Role>, target: Option<Role>) -> bool {
    can_edit_user(actor, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_tables() {
        assert!(Role::Admin.capabilities().can_manage_users);
        assert!(!Role::User.capabilities().can_edit);
        assert!(!Role::User.capabilities().can_access_explorer);
        let explorer = Role::Explorer.capabilities();
        assert!(explorer.can_access_explorer && explorer.can_view && !explorer.can_edit);
    }

    #[test]
    fn fine_grained_permissions() {
        assert!(Role::Admin.has_permission(Permission::ViewLogs));
        assert!(Role::User.has_permission(Permission::ManageSpace));
        assert!(!Role::User.has_permission(Permission::SwitchProfile));
        assert!(Role::Explorer.has_permission(Permission::SwitchProfile));
        assert!(!Role::Explorer.has_permission(Permission::EditProfile));
        assert!(!has_permission(None, Permission::ViewSpace));
    }

    #[test]
    fn hierarchy_checks() {
        assert!(can_edit_user(Some(Role::Admin), Some(Role::User)));
        assert!(can_edit_user(Some(Role::Explorer), Some(Role::User)));
        assert!(!can_edit_user(Some(Role::User), Some(Role::User)));
        assert!(!can_edit_user(Some(Role::Admin), Some(Role::Admin)));
        assert!(!can_edit_user(None, Some(Role::User)));
        assert!(can_manage_role(Some(Role::Admin), Some(Role::Explorer)));
        assert!(can_switch_to_profile(Some(Role::Admin), Some(Role::User)));
        assert!(!can_switch_to_profile(Some(Role::Explorer), Some(Role::User)));
    }

    #[test]
    fn protected_roles_and_serde() {
        assert!(Role::Admin.is_protected());
        assert!(Role::Explorer.is_protected());
        assert!(!Role::User.is_protected());
        assert_eq!(serde_json::to_string(&Role::Explorer).unwrap(), "\"explorer\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }
}
