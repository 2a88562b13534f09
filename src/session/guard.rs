use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use super::store::SessionStore;
use crate::roles::Role;

/// Access requirements attached to a route.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_admin: bool,
    /// Modes allowed on the route. Empty means any.
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Navigation {
    Proceed,
    Redirect {
        path: &'static str,
        /// Where to return after logging in.
        #[serde(skip_serializing_if = "Option::is_none")]
        redirect: Option<String>,
    },
}

impl Navigation {
    fn to(path: &'static str) -> Self {
        Navigation::Redirect {
            path,
            redirect: None,
        }
    }

    fn to_login_from(full_path: &str) -> Self {
        Navigation::Redirect {
            path: "/login",
            redirect: Some(full_path.to_string()),
        }
    }
}

/// Decides whether the session may enter `full_path`. An expired explorer
/// session is logged out here, on the first guarded navigation after expiry.
pub fn check_navigation(
    session: &mut SessionStore,
    meta: &RouteMeta,
    full_path: &str,
    now: OffsetDateTime,
) -> Navigation {
    let guarded = meta.requires_auth || meta.requires_admin || !meta.roles.is_empty();
    if guarded && session.is_explorer_expired(now) {
        info!(path = full_path, "explorer session expired, logging out");
        session.logout();
        return Navigation::to("/login");
    }

    if meta.requires_admin && !session.is_admin() {
        return Navigation::to_login_from(full_path);
    }

    if meta.requires_auth && !session.is_logged_in() {
        return Navigation::to_login_from(full_path);
    }

    if !meta.roles.is_empty() {
        let allowed = session.mode().is_some_and(|m| meta.roles.contains(&m));
        if !allowed {
            return if session.is_explorer() {
                Navigation::to("/explorer")
            } else if session.is_logged_in() {
                Navigation::to("/dashboard")
            } else {
                Navigation::to("/login")
            };
        }
    }

    Navigation::Proceed
}
