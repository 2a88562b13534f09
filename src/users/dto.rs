use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{
    CsmclId, KycRecord, OnboardingStep, SpaceConfig, StepProgress, UserRecord, UserStatus, Wallet,
};
use crate::game::{EarnedAchievement, Level};
use crate::roles::Role;

/// User as returned to clients. Secret hashes never leave the repository.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub cosmical_name: String,
    pub display_name: String,
    pub email: String,
    pub cosmical_email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub email_verified: bool,
    pub sim_verified: bool,
    pub is_verified: bool,
    pub kyc: KycRecord,
    pub space: SpaceConfig,
    pub csmcl_id: CsmclId,
    pub wallet: Wallet,
    pub onboarding_step: OnboardingStep,
    pub step_progress: StepProgress,
    pub xp: u32,
    pub level: Level,
    pub achievements: Vec<EarnedAchievement>,
    pub status: UserStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub submitted_at: Option<OffsetDateTime>,
}

impl From<&UserRecord> for PublicUser {
    fn from(u: &UserRecord) -> Self {
        Self {
            id: u.id,
            cosmical_name: u.cosmical_name.clone(),
            display_name: u.display_name.clone(),
            email: u.email.clone(),
            cosmical_email: u.cosmical_email.clone(),
            role: u.role,
            phone: u.phone.clone(),
            email_verified: u.email_verified,
            sim_verified: u.sim_verified,
            is_verified: u.is_verified,
            kyc: u.kyc.clone(),
            space: u.space.clone(),
            csmcl_id: u.csmcl_id.clone(),
            wallet: u.wallet.clone(),
            onboarding_step: u.onboarding_step,
            step_progress: u.step_progress.clone(),
            xp: u.xp,
            level: u.level,
            achievements: u.achievements.clone(),
            status: u.status,
            created_at: u.created_at,
            updated_at: u.updated_at,
            submitted_at: u.submitted_at,
        }
    }
}

impl From<UserRecord> for PublicUser {
    fn from(u: UserRecord) -> Self {
        PublicUser::from(&u)
    }
}

/// Response of `POST /users`.
#[derive(Debug, Serialize)]
pub struct CreatedUserResponse {
    pub user: PublicUser,
    /// Present only when the phrase was generated server-side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_phrase: Option<String>,
}
