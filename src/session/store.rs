use std::sync::Arc;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use crate::game::levels::{calculate_level, calculate_progress};
use crate::game::metrics::MetricCategory;
use crate::game::{achievements, EarnedAchievement, Level, MetricService};
use crate::roles::{Capabilities, Permission, Role};
use crate::users::repo::EXPLORER_NAME;
use crate::users::repo_types::{
    Accessibility, Boundaries, OnboardingStep, SpaceBinding, SpaceSize, UserDraft, UserPatch,
    UserRecord, Visibility,
};
use crate::users::secrets::generate_space_id;
use crate::users::validation::{is_valid_email, is_valid_phone, MSG_EMAIL, MSG_PHONE};
use crate::users::{PublicUser, UserDb, UserDbError};

pub const EXPLORER_SESSION_DAYS: i64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("The explorer account is only available in explorer mode")]
    ExplorerLogin,
    #[error("Explorer session expired")]
    ExplorerExpired,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    StepLocked(&'static str),
    #[error("{0}")]
    Invalid(&'static str),
    #[error(transparent)]
    User(#[from] UserDbError),
}

impl SessionError {
    pub fn status(&self) -> StatusCode {
        match self {
            SessionError::NotLoggedIn
            | SessionError::InvalidCredentials
            | SessionError::ExplorerExpired => StatusCode::UNAUTHORIZED,
            SessionError::ExplorerLogin | SessionError::Forbidden(_) => StatusCode::FORBIDDEN,
            SessionError::StepLocked(_) => StatusCode::CONFLICT,
            SessionError::Invalid(_) => StatusCode::BAD_REQUEST,
            SessionError::User(e) => e.status(),
        }
    }
}

/// Self-service profile changes. Role, XP and verification are not editable here.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub cosmical_name: Option<String>,
    pub password: Option<String>,
    pub recovery_phrase: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AccessibilityPatch {
    pub public: Option<bool>,
    pub friends: Option<bool>,
    pub private: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BoundariesPatch {
    pub size: Option<SpaceSize>,
    pub expandable: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SpacePatch {
    pub theme: Option<String>,
    pub visibility: Option<Visibility>,
    pub template: Option<String>,
    pub accessibility: Option<AccessibilityPatch>,
    pub boundaries: Option<BoundariesPatch>,
}

impl AccessibilityPatch {
    fn apply(self, target: &mut Accessibility) {
        if let Some(v) = self.public {
            target.public = v;
        }
        if let Some(v) = self.friends {
            target.friends = v;
        }
        if let Some(v) = self.private {
            target.private = v;
        }
    }
}

impl BoundariesPatch {
    fn apply(self, target: &mut Boundaries) {
        if let Some(v) = self.size {
            target.size = v;
        }
        if let Some(v) = self.expandable {
            target.expandable = v;
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MetricOutcome {
    pub xp_earned: u32,
    pub level_up: Option<Level>,
}

/// Serializable snapshot of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub logged_in: bool,
    pub mode: Option<Role>,
    pub user: Option<PublicUser>,
    pub capabilities: Capabilities,
    pub explorer_expires_at: Option<String>,
    pub xp: u32,
    pub level: Level,
    pub level_title: &'static str,
    pub level_progress: u32,
    pub next_level: Option<Level>,
    pub current_step: Option<OnboardingStep>,
    pub onboarding_complete: bool,
}

/// Current-session state for one client, backed by the user repository.
///
/// Explorer sessions share the system explorer account, so their progress
/// stays in the session and is never written back.
pub struct SessionStore {
    users: Arc<UserDb>,
    metrics: Arc<MetricService>,
    user: Option<UserRecord>,
    login_time: Option<OffsetDateTime>,
}

impl SessionStore {
    pub fn new(users: Arc<UserDb>, metrics: Arc<MetricService>) -> Self {
        Self {
            users,
            metrics,
            user: None,
            login_time: None,
        }
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }

    pub fn mode(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.mode() == Some(Role::Admin)
    }

    pub fn is_explorer(&self) -> bool {
        self.mode() == Some(Role::Explorer)
    }

    pub fn explorer_expires_at(&self) -> Option<OffsetDateTime> {
        if !self.is_explorer() {
            return None;
        }
        self.login_time
            .map(|t| t + Duration::days(EXPLORER_SESSION_DAYS))
    }

    /// Strictly after `login_time + 10 days`.
    pub fn is_explorer_expired(&self, now: OffsetDateTime) -> bool {
        self.explorer_expires_at().is_some_and(|exp| now > exp)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.mode().map(Role::capabilities).unwrap_or_default()
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.mode().is_some_and(|r| r.has_permission(permission))
    }

    pub fn can_access_explorer(&self, now: OffsetDateTime) -> bool {
        self.is_explorer() && !self.is_explorer_expired(now)
    }

    pub fn xp(&self) -> u32 {
        self.user.as_ref().map(|u| u.xp).unwrap_or(0)
    }

    pub fn level(&self) -> Level {
        self.user.as_ref().map(|u| u.level).unwrap_or_default()
    }

    pub fn achievements(&self) -> &[EarnedAchievement] {
        self.user
            .as_ref()
            .map(|u| u.achievements.as_slice())
            .unwrap_or(&[])
    }

    pub fn view(&self, now: OffsetDateTime) -> SessionView {
        let xp = self.xp();
        let level = self.level();
        SessionView {
            logged_in: self.is_logged_in(),
            mode: self.mode(),
            user: self.user.as_ref().map(PublicUser::from),
            capabilities: self.capabilities(),
            explorer_expires_at: self
                .explorer_expires_at()
                .and_then(|t| t.format(&time::format_description::well_known::Rfc3339).ok()),
            xp,
            level,
            level_title: level.title(),
            level_progress: calculate_progress(xp),
            next_level: level.next(),
            current_step: self.user.as_ref().map(|u| u.onboarding_step),
            onboarding_complete: self.is_onboarding_complete() && !self.is_explorer_expired(now),
        }
    }

    /// Adopts a record changed outside this session, if it is the session's user.
    pub fn sync_user(&mut self, record: &UserRecord) {
        if let Some(user) = self.user.as_mut() {
            if user.id == record.id && user.role != Role::Explorer {
                *user = record.clone();
            }
        }
    }

    fn current(&self) -> Result<&UserRecord, SessionError> {
        self.user.as_ref().ok_or(SessionError::NotLoggedIn)
    }

    /// Working copy of the current user. Changes reach the session only
    /// through `commit`.
    fn working_copy(&self) -> Result<UserRecord, SessionError> {
        self.current().cloned()
    }

    /// Persists `patch` for stored users and adopts the result only once the
    /// write went through. A user deleted behind the session logs it out.
    async fn commit(&mut self, updated: UserRecord, patch: UserPatch) -> Result<(), SessionError> {
        if updated.role == Role::Explorer {
            self.user = Some(updated);
            return Ok(());
        }
        match self.users.update_user_by_id(updated.id, patch).await {
            Ok(stored) => {
                self.user = Some(stored);
                Ok(())
            }
            Err(UserDbError::NotFound) => {
                warn!(user_id = %updated.id, "stored user is gone, ending session");
                self.logout();
                Err(SessionError::NotLoggedIn)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Re-reads the stored user so changes made elsewhere show up. Ends the
    /// session when the user no longer exists.
    pub async fn reload(&mut self) -> Result<(), SessionError> {
        let Some(user) = self.user.as_ref() else {
            return Ok(());
        };
        if user.role == Role::Explorer {
            return Ok(());
        }
        let id = user.id;
        match self.users.get_user_by_id(id).await? {
            Some(stored) => {
                self.user = Some(stored);
                Ok(())
            }
            None => {
                info!(user_id = %id, "stored user is gone, ending session");
                self.logout();
                Err(SessionError::NotLoggedIn)
            }
        }
    }

    pub async fn login(&mut self, cosmical_name: &str, phrase: &str) -> Result<(), SessionError> {
        let user = self
            .users
            .get_user(cosmical_name)
            .await?
            .ok_or(UserDbError::NotFound)?;
        if user.role == Role::Explorer {
            return Err(SessionError::ExplorerLogin);
        }
        if !self.users.verify_secret(&user.cosmical_name, phrase).await? {
            warn!(cosmical_name, "login invalid phrase");
            return Err(SessionError::InvalidCredentials);
        }

        info!(cosmical_name = %user.cosmical_name, role = %user.role, "user logged in");
        self.user = Some(user);
        self.login_time = None;
        self.unlock_achievement("first-login").await?;
        Ok(())
    }

    pub async fn login_as_explorer(&mut self, now: OffsetDateTime) -> Result<(), SessionError> {
        let explorer = self
            .users
            .get_user(EXPLORER_NAME)
            .await?
            .ok_or(UserDbError::NotFound)?;
        self.user = Some(explorer);
        self.login_time = Some(now);
        info!(expires_at = ?self.explorer_expires_at(), "explorer session started");
        Ok(())
    }

    /// Creates a regular user and logs it in. Returns the generated recovery
    /// phrase when the draft did not carry one.
    pub async fn register(&mut self, mut draft: UserDraft) -> Result<Option<String>, SessionError> {
        draft.role = Some(Role::User);
        let created = self.users.create_local_user(draft).await?;
        info!(cosmical_name = %created.user.cosmical_name, "user registered");
        self.user = Some(created.user);
        self.login_time = None;
        self.unlock_achievement("first-login").await?;
        Ok(created.generated_phrase)
    }

    pub fn logout(&mut self) {
        if let Some(user) = self.user.take() {
            debug!(cosmical_name = %user.cosmical_name, "logged out");
        }
        self.login_time = None;
    }

    pub async fn update_profile(&mut self, update: ProfileUpdate) -> Result<(), SessionError> {
        let user = self.working_copy()?;
        if user.role == Role::Explorer {
            return Err(SessionError::Forbidden("Explorers cannot edit profiles"));
        }
        let customized = update.display_name.is_some();
        let patch = UserPatch {
            display_name: update.display_name,
            email: update.email,
            cosmical_name: update.cosmical_name,
            password: update.password,
            recovery_phrase: update.recovery_phrase,
            ..Default::default()
        };
        self.commit(user, patch).await?;
        if customized {
            self.unlock_achievement("customize-profile").await?;
        }
        Ok(())
    }

    pub async fn track_metric(
        &mut self,
        metric_id: &str,
        category: MetricCategory,
        data: serde_json::Value,
    ) -> Result<MetricOutcome, SessionError> {
        self.current()?;
        let xp_earned = self.metrics.track_metric(metric_id, category, data).await;
        let level_up = if xp_earned > 0 {
            self.add_xp(xp_earned).await?
        } else {
            None
        };
        Ok(MetricOutcome {
            xp_earned,
            level_up,
        })
    }

    /// Returns the new level when the XP crosses a threshold.
    pub async fn add_xp(&mut self, amount: u32) -> Result<Option<Level>, SessionError> {
        let mut user = self.working_copy()?;
        let before = user.level;
        user.xp = user.xp.saturating_add(amount);
        user.level = calculate_level(user.xp);
        let (xp, level) = (user.xp, user.level);
        let patch = UserPatch {
            xp: Some(xp),
            level: Some(level),
            ..Default::default()
        };
        self.commit(user, patch).await?;

        if level > before {
            info!(xp, level = ?level, "level up");
            Ok(Some(level))
        } else {
            Ok(None)
        }
    }

    /// False for unknown or already earned achievements.
    pub async fn unlock_achievement(&mut self, id: &str) -> Result<bool, SessionError> {
        let Some(achievement) = achievements::find(id) else {
            return Ok(false);
        };
        let mut user = self.working_copy()?;
        if user.achievements.iter().any(|a| a.id == id) {
            return Ok(false);
        }
        user.achievements.push(EarnedAchievement {
            id: id.to_string(),
            earned_at: OffsetDateTime::now_utc(),
        });
        user.xp = user.xp.saturating_add(achievement.xp);
        user.level = calculate_level(user.xp);
        let patch = UserPatch {
            achievements: Some(user.achievements.clone()),
            xp: Some(user.xp),
            level: Some(user.level),
            ..Default::default()
        };
        self.commit(user, patch).await?;
        info!(achievement = id, xp = achievement.xp, "achievement unlocked");
        Ok(true)
    }

    // Onboarding

    pub async fn verify_email(&mut self, email: &str) -> Result<(), SessionError> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(SessionError::Invalid(MSG_EMAIL));
        }
        let mut user = self.working_copy()?;
        user.email = email.clone();
        user.email_verified = true;
        user.refresh_verified();
        let patch = UserPatch {
            email: Some(email),
            email_verified: Some(true),
            ..Default::default()
        };
        self.commit(user, patch).await
    }

    pub async fn verify_phone(&mut self, phone: &str) -> Result<(), SessionError> {
        let phone = phone.trim().to_string();
        if !is_valid_phone(&phone) {
            return Err(SessionError::Invalid(MSG_PHONE));
        }
        let mut user = self.working_copy()?;
        user.phone = Some(phone.clone());
        user.sim_verified = true;
        user.refresh_verified();
        let patch = UserPatch {
            phone: Some(phone),
            sim_verified: Some(true),
            ..Default::default()
        };
        self.commit(user, patch).await
    }

    pub fn is_verified(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_verified)
    }

    pub async fn configure_space(&mut self, patch: SpacePatch) -> Result<(), SessionError> {
        let mut user = self.working_copy()?;
        let themed = patch.theme.is_some();
        let public = patch.visibility == Some(Visibility::Public);
        if let Some(v) = patch.theme {
            user.space.theme = Some(v);
        }
        if let Some(v) = patch.visibility {
            user.space.visibility = v;
        }
        if let Some(v) = patch.template {
            user.space.template = Some(v);
        }
        if let Some(v) = patch.accessibility {
            v.apply(&mut user.space.accessibility);
        }
        if let Some(v) = patch.boundaries {
            v.apply(&mut user.space.boundaries);
        }
        let space = user.space.clone();
        let patch = UserPatch {
            space: Some(space),
            ..Default::default()
        };
        self.commit(user, patch).await?;

        if themed {
            self.unlock_achievement("theme-master").await?;
        }
        if public {
            self.unlock_achievement("network-ambassador").await?;
        }
        Ok(())
    }

    pub async fn setup_csmcl_id(
        &mut self,
        now: OffsetDateTime,
    ) -> Result<SpaceBinding, SessionError> {
        if !self.can_proceed_to_csmcl_id() {
            return Err(SessionError::StepLocked("Complete space setup first"));
        }
        let binding = SpaceBinding {
            space_id: generate_space_id(),
            timestamp: now,
        };
        let mut user = self.working_copy()?;
        user.csmcl_id.space_binding = Some(binding.clone());
        let patch = UserPatch {
            csmcl_id: Some(user.csmcl_id.clone()),
            ..Default::default()
        };
        self.commit(user, patch).await?;
        self.unlock_achievement("space-architect").await?;
        Ok(binding)
    }

    pub async fn confirm_csmcl_id(&mut self) -> Result<(), SessionError> {
        let mut user = self.working_copy()?;
        if user.cosmical_name.is_empty()
            || user.cosmical_email.is_empty()
            || user.csmcl_id.space_binding.is_none()
        {
            return Err(SessionError::StepLocked("CSMCL.ID details incomplete"));
        }
        user.csmcl_id.confirmed = true;
        let patch = UserPatch {
            csmcl_id: Some(user.csmcl_id.clone()),
            ..Default::default()
        };
        self.commit(user, patch).await
    }

    pub async fn connect_wallet(&mut self, address: &str) -> Result<(), SessionError> {
        if !self.can_proceed_to_wallet() {
            return Err(SessionError::StepLocked("Confirm CSMCL.ID first"));
        }
        let address = address.trim();
        if address.is_empty() {
            return Err(SessionError::Invalid("Wallet address is required"));
        }
        let mut user = self.working_copy()?;
        user.wallet.address = Some(address.to_string());
        user.wallet.connected = true;
        let patch = UserPatch {
            wallet: Some(user.wallet.clone()),
            ..Default::default()
        };
        self.commit(user, patch).await
    }

    pub async fn start_step(&mut self, step: OnboardingStep) -> Result<(), SessionError> {
        let mut user = self.working_copy()?;
        let Some(state) = user.step_progress.get_mut(step) else {
            return Ok(());
        };
        state.started = true;
        let patch = UserPatch {
            step_progress: Some(user.step_progress.clone()),
            ..Default::default()
        };
        self.commit(user, patch).await
    }

    /// Marks the step done and moves the cursor to the step after it.
    pub async fn complete_step(&mut self, step: OnboardingStep) -> Result<(), SessionError> {
        let mut user = self.working_copy()?;
        let Some(state) = user.step_progress.get_mut(step) else {
            return Ok(());
        };
        state.completed = true;
        user.onboarding_step = step.next();
        let patch = UserPatch {
            step_progress: Some(user.step_progress.clone()),
            onboarding_step: Some(user.onboarding_step),
            ..Default::default()
        };
        self.commit(user, patch).await
    }

    pub fn can_proceed_to_space(&self) -> bool {
        self.user.as_ref().is_some_and(|u| {
            u.step_progress.identity.completed && u.email_verified && u.sim_verified
        })
    }

    pub fn can_proceed_to_csmcl_id(&self) -> bool {
        self.user.as_ref().is_some_and(|u| {
            u.step_progress.space.completed
                && u.space.theme.is_some()
                && u.space.template.is_some()
        })
    }

    pub fn can_proceed_to_wallet(&self) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| u.step_progress.csmcl_id.completed && u.csmcl_id.confirmed)
    }

    pub fn is_onboarding_complete(&self) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| u.step_progress.wallet.completed && u.wallet.connected)
    }
}
