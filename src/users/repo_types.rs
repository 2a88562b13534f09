use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::game::{EarnedAchievement, Level};
use crate::roles::Role;

pub const COSMICAL_DOMAIN: &str = "csmcl.space";

/// `${cosmicalName}@csmcl.space`, lowercased.
pub fn cosmical_email(cosmical_name: &str) -> String {
    format!("{}@{}", cosmical_name.to_lowercase(), COSMICAL_DOMAIN)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum KycStatus {
    #[default]
    NotStarted,
    Pending,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KycDocument {
    pub kind: String,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct KycRecord {
    pub status: KycStatus,
    pub level: u8,
    #[serde(default)]
    pub documents: Vec<KycDocument>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Friends,
    Public,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpaceSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Accessibility {
    pub public: bool,
    pub friends: bool,
    pub private: bool,
}

impl Default for Accessibility {
    fn default() -> Self {
        Self {
            public: false,
            friends: true,
            private: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Boundaries {
    pub size: SpaceSize,
    pub expandable: bool,
}

impl Default for Boundaries {
    fn default() -> Self {
        Self {
            size: SpaceSize::Medium,
            expandable: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SpaceConfig {
    pub theme: Option<String>,
    pub visibility: Visibility,
    pub template: Option<String>,
    #[serde(default)]
    pub accessibility: Accessibility,
    #[serde(default)]
    pub boundaries: Boundaries,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpaceBinding {
    pub space_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CsmclId {
    pub space_binding: Option<SpaceBinding>,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Wallet {
    pub address: Option<String>,
    pub connected: bool,
    #[serde(default)]
    pub assets: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum OnboardingStep {
    #[default]
    Identity,
    Space,
    CsmclId,
    Wallet,
    Complete,
}

impl OnboardingStep {
    pub fn next(self) -> OnboardingStep {
        match self {
            OnboardingStep::Identity => OnboardingStep::Space,
            OnboardingStep::Space => OnboardingStep::CsmclId,
            OnboardingStep::CsmclId => OnboardingStep::Wallet,
            OnboardingStep::Wallet | OnboardingStep::Complete => OnboardingStep::Complete,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OnboardingStep::Identity => "identity",
            OnboardingStep::Space => "space",
            OnboardingStep::CsmclId => "csmclId",
            OnboardingStep::Wallet => "wallet",
            OnboardingStep::Complete => "complete",
        }
    }
}

impl std::str::FromStr for OnboardingStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(OnboardingStep::Identity),
            "space" => Ok(OnboardingStep::Space),
            "csmclId" | "csmcl-id" => Ok(OnboardingStep::CsmclId),
            "wallet" => Ok(OnboardingStep::Wallet),
            "complete" => Ok(OnboardingStep::Complete),
            other => Err(format!("unknown onboarding step {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StepState {
    pub started: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StepProgress {
    pub identity: StepState,
    pub space: StepState,
    pub csmcl_id: StepState,
    pub wallet: StepState,
}

impl StepProgress {
    /// `None` for the terminal step, which has no progress of its own.
    pub fn get_mut(&mut self, step: OnboardingStep) -> Option<&mut StepState> {
        match step {
            OnboardingStep::Identity => Some(&mut self.identity),
            OnboardingStep::Space => Some(&mut self.space),
            OnboardingStep::CsmclId => Some(&mut self.csmcl_id),
            OnboardingStep::Wallet => Some(&mut self.wallet),
            OnboardingStep::Complete => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Pending,
    Submitted,
}

/// User record as persisted in the users blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub cosmical_name: String,
    pub display_name: String,
    pub email: String,
    pub cosmical_email: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub sim_verified: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub kyc: KycRecord,
    #[serde(default)]
    pub space: SpaceConfig,
    #[serde(default)]
    pub csmcl_id: CsmclId,
    #[serde(default)]
    pub wallet: Wallet,
    #[serde(default)]
    pub onboarding_step: OnboardingStep,
    #[serde(default)]
    pub step_progress: StepProgress,
    #[serde(default)]
    pub xp: u32,
    #[serde(default)]
    pub level: Level,
    #[serde(default)]
    pub achievements: Vec<EarnedAchievement>,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub phrase_hash: Option<String>,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub submitted_at: Option<OffsetDateTime>,
}

impl UserRecord {
    pub fn matches_name(&self, cosmical_name: &str) -> bool {
        self.cosmical_name.eq_ignore_ascii_case(cosmical_name)
    }

    /// `is_verified` follows the email and SIM flags.
    pub fn refresh_verified(&mut self) {
        self.is_verified = self.email_verified && self.sim_verified;
    }
}

/// Input for a new local user.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UserDraft {
    pub cosmical_name: String,
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub recovery_phrase: Option<String>,
    #[serde(default)]
    pub agree_to_terms: bool,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Partial update. Only `Some` fields are applied.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UserPatch {
    pub cosmical_name: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub email_verified: Option<bool>,
    pub sim_verified: Option<bool>,
    pub kyc: Option<KycRecord>,
    pub space: Option<SpaceConfig>,
    pub csmcl_id: Option<CsmclId>,
    pub wallet: Option<Wallet>,
    pub onboarding_step: Option<OnboardingStep>,
    pub step_progress: Option<StepProgress>,
    pub xp: Option<u32>,
    pub level: Option<Level>,
    pub achievements: Option<Vec<EarnedAchievement>>,
    pub password: Option<String>,
    pub recovery_phrase: Option<String>,
}

/// What a create returns: the stored record plus a generated recovery
/// phrase, handed out exactly once.
#[derive(Debug, Clone)]
pub struct CreatedUser {
    pub user: UserRecord,
    pub generated_phrase: Option<String>,
}
