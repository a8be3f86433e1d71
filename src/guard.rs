//! Navigation gating for the dashboard and mobile clients.
//!
//! Decisions are driven by claims read with [`jwt::decode`], so they only shape what a user is
//! shown. The API enforces access separately through [`crate::auth`].

use crate::jwt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub title: String,
    pub href: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuGroup {
    pub title: String,
    pub items: Vec<MenuItem>,
    /// Roles allowed into this group. `None` leaves the group open.
    #[serde(default)]
    pub role_access: Option<Vec<String>>,
}

impl MenuGroup {
    fn matches(&self, path: &str) -> bool {
        self.items
            .iter()
            .any(|item| !item.href.is_empty() && path.contains(item.href.as_str()))
    }

    fn permits(&self, role: Option<&str>) -> bool {
        match (&self.role_access, role) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(allowed), Some(role)) => allowed.iter().any(|r| r == role),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// No token stored; this guard leaves the decision to the session check.
    Skip,
    Deny { notice: String, redirect: String },
    Redirect(String),
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    pub menu: Vec<MenuGroup>,
    pub fallback_route: String,
    pub login_route: String,
}

impl RouteGuard {
    pub fn new(
        menu: Vec<MenuGroup>,
        fallback_route: impl Into<String>,
        login_route: impl Into<String>,
    ) -> Self {
        Self {
            menu,
            fallback_route: fallback_route.into(),
            login_route: login_route.into(),
        }
    }

    /// Top-level check: without a usable token the user goes to the login route.
    pub fn check_session(&self, token: Option<&str>, now: i64) -> GuardDecision {
        match token {
            Some(token) if jwt::is_valid_at(token, now) => GuardDecision::Allow,
            _ => GuardDecision::Redirect(self.login_route.clone()),
        }
    }

    pub fn check_route(&self, path: &str, token: Option<&str>) -> GuardDecision {
        let Some(token) = token else {
            return GuardDecision::Skip;
        };
        let role = jwt::decode(token).and_then(|payload| payload.role);
        self.check_role(path, role.as_deref())
    }

    pub fn check_role(&self, path: &str, role: Option<&str>) -> GuardDecision {
        let Some(group) = self.menu.iter().find(|group| group.matches(path)) else {
            return GuardDecision::Allow;
        };
        if group.permits(role) {
            return GuardDecision::Allow;
        }
        tracing::debug!("route {} denied for role {:?}", path, role);
        GuardDecision::Deny {
            notice: format!("You do not have access to {}", group.title),
            redirect: self.fallback_route.clone(),
        }
    }
}
