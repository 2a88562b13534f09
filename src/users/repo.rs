use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use time::{macros::datetime, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::UserDbError;
use super::repo_types::{
    cosmical_email, CreatedUser, KycRecord, KycStatus, SpaceConfig, UserDraft, UserPatch,
    UserRecord, UserStatus,
};
use super::secrets::{generate_recovery_phrase, hash_secret, verify_secret_hash};
use super::validation::{validate_draft, validate_patch, MSG_NAME_TAKEN};
use crate::roles::Role;
use crate::storage::{load_json, save_json, KvStore, BLOB_VERSION, USERS_KEY};

pub const ADMIN_NAME: &str = "INNERPIXEL";
pub const EXPLORER_NAME: &str = "CSMCL.Explorer";
pub const ADMIN_PHRASE: &str = "cosmical space adventure";

pub fn is_system_account(cosmical_name: &str) -> bool {
    cosmical_name.eq_ignore_ascii_case(ADMIN_NAME)
        || cosmical_name.eq_ignore_ascii_case(EXPLORER_NAME)
}

#[derive(Debug, Serialize, Deserialize)]
struct UsersBlob {
    version: u32,
    users: Vec<UserRecord>,
}

fn admin_phrase_hash() -> anyhow::Result<String> {
    static HASH: OnceLock<String> = OnceLock::new();
    if let Some(hash) = HASH.get() {
        return Ok(hash.clone());
    }
    let hash = hash_secret(ADMIN_PHRASE)?;
    Ok(HASH.get_or_init(|| hash).clone())
}

fn system_account(
    name: &str,
    display_name: &str,
    email: &str,
    role: Role,
    theme: &str,
    template: &str,
) -> UserRecord {
    let seeded_at = datetime!(2025-01-04 18:43:21 +02:00);
    UserRecord {
        id: Uuid::new_v4(),
        cosmical_name: name.into(),
        display_name: display_name.into(),
        email: email.into(),
        cosmical_email: email.into(),
        role,
        phone: None,
        email_verified: true,
        sim_verified: true,
        is_verified: true,
        kyc: KycRecord {
            status: KycStatus::Verified,
            level: if role == Role::Admin { 3 } else { 1 },
            documents: Vec::new(),
            expires_at: None,
        },
        space: SpaceConfig {
            theme: Some(theme.into()),
            template: Some(template.into()),
            ..Default::default()
        },
        csmcl_id: Default::default(),
        wallet: Default::default(),
        onboarding_step: Default::default(),
        step_progress: Default::default(),
        xp: 0,
        level: Default::default(),
        achievements: Vec::new(),
        status: UserStatus::Submitted,
        phrase_hash: None,
        password_hash: None,
        created_at: seeded_at,
        updated_at: seeded_at,
        submitted_at: Some(seeded_at),
    }
}

fn default_users() -> anyhow::Result<Vec<UserRecord>> {
    let mut admin = system_account(
        ADMIN_NAME,
        "InnerPixel",
        "innerpixel@csmcl.space",
        Role::Admin,
        "admin-dark",
        "admin",
    );
    admin.phrase_hash = Some(admin_phrase_hash()?);
    let explorer = system_account(
        EXPLORER_NAME,
        "CSMCL Explorer",
        "explorer@csmcl.space",
        Role::Explorer,
        "cosmic-explorer",
        "explorer",
    );
    Ok(vec![admin, explorer])
}

/// CRUD over the users blob. Read-modify-write cycles are serialized, so
/// concurrent updates resolve last-write-wins without losing records.
pub struct UserDb {
    store: Arc<dyn KvStore>,
    write_lock: Mutex<()>,
}

impl UserDb {
    /// Opens the repository, seeding the system accounts on first use.
    pub async fn init(store: Arc<dyn KvStore>) -> Result<Self, UserDbError> {
        let db = Self {
            store,
            write_lock: Mutex::new(()),
        };
        if db.store.get(USERS_KEY).await?.is_none() {
            let blob = UsersBlob {
                version: BLOB_VERSION,
                users: default_users()?,
            };
            db.write_db(&blob).await?;
            info!("seeded system accounts");
        }
        Ok(db)
    }

    async fn read_db(&self) -> Result<UsersBlob, UserDbError> {
        let blob = load_json::<UsersBlob>(self.store.as_ref(), USERS_KEY)
            .await
            .map_err(|e| {
                error!(error = %e, "reading users failed");
                UserDbError::Storage(e)
            })?;
        Ok(blob.unwrap_or(UsersBlob {
            version: BLOB_VERSION,
            users: Vec::new(),
        }))
    }

    async fn write_db(&self, blob: &UsersBlob) -> Result<(), UserDbError> {
        save_json(self.store.as_ref(), USERS_KEY, blob)
            .await
            .map_err(|e| {
                error!(error = %e, "writing users failed");
                UserDbError::Storage(e)
            })
    }

    pub async fn get_user(&self, cosmical_name: &str) -> Result<Option<UserRecord>, UserDbError> {
        let db = self.read_db().await?;
        Ok(db.users.into_iter().find(|u| u.matches_name(cosmical_name)))
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, UserDbError> {
        let db = self.read_db().await?;
        Ok(db.users.into_iter().find(|u| u.id == id))
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>, UserDbError> {
        Ok(self.read_db().await?.users)
    }

    /// Case-insensitive. `except` skips one record, for renames.
    pub async fn is_name_taken(
        &self,
        cosmical_name: &str,
        except: Option<Uuid>,
    ) -> Result<bool, UserDbError> {
        let db = self.read_db().await?;
        Ok(db
            .users
            .iter()
            .any(|u| u.matches_name(cosmical_name) && Some(u.id) != except))
    }

    pub async fn create_local_user(&self, draft: UserDraft) -> Result<CreatedUser, UserDbError> {
        let errors = validate_draft(&draft);
        if !errors.is_empty() {
            warn!(cosmical_name = %draft.cosmical_name, ?errors, "invalid user draft");
            return Err(UserDbError::Invalid(errors));
        }

        let (phrase, generated_phrase) = match draft.recovery_phrase {
            Some(p) => (p, None),
            None => {
                let p = generate_recovery_phrase();
                (p.clone(), Some(p))
            }
        };
        let phrase_hash = hash_secret(&phrase)?;
        let password_hash = draft.password.as_deref().map(hash_secret).transpose()?;

        let _guard = self.write_lock.lock().await;
        let mut db = self.read_db().await?;
        if db.users.iter().any(|u| u.matches_name(&draft.cosmical_name)) {
            warn!(cosmical_name = %draft.cosmical_name, "user already exists");
            return Err(UserDbError::AlreadyExists);
        }

        let now = OffsetDateTime::now_utc();
        let user = UserRecord {
            id: Uuid::new_v4(),
            cosmical_email: cosmical_email(&draft.cosmical_name),
            cosmical_name: draft.cosmical_name,
            display_name: draft.display_name.trim().to_string(),
            email: draft.email.trim().to_lowercase(),
            role: draft.role.unwrap_or(Role::User),
            phone: None,
            email_verified: false,
            sim_verified: false,
            is_verified: false,
            kyc: KycRecord::default(),
            space: SpaceConfig::default(),
            csmcl_id: Default::default(),
            wallet: Default::default(),
            onboarding_step: Default::default(),
            step_progress: Default::default(),
            xp: 0,
            level: Default::default(),
            achievements: Vec::new(),
            status: UserStatus::Pending,
            phrase_hash: Some(phrase_hash),
            password_hash,
            created_at: now,
            updated_at: now,
            submitted_at: None,
        };
        db.users.push(user.clone());
        self.write_db(&db).await?;

        info!(cosmical_name = %user.cosmical_name, user_id = %user.id, "local user created");
        Ok(CreatedUser {
            user,
            generated_phrase,
        })
    }

    pub async fn update_user(
        &self,
        cosmical_name: &str,
        patch: UserPatch,
    ) -> Result<UserRecord, UserDbError> {
        self.update_matching(|u| u.matches_name(cosmical_name), patch)
            .await
    }

    /// Same as `update_user`, keyed by id so that renames do not break it.
    pub async fn update_user_by_id(
        &self,
        id: Uuid,
        patch: UserPatch,
    ) -> Result<UserRecord, UserDbError> {
        self.update_matching(|u| u.id == id, patch).await
    }

    async fn update_matching(
        &self,
        matches: impl Fn(&UserRecord) -> bool + Send,
        patch: UserPatch,
    ) -> Result<UserRecord, UserDbError> {
        let errors = validate_patch(&patch);
        if !errors.is_empty() {
            return Err(UserDbError::Invalid(errors));
        }
        let phrase_hash = patch.recovery_phrase.as_deref().map(hash_secret).transpose()?;
        let password_hash = patch.password.as_deref().map(hash_secret).transpose()?;

        let _guard = self.write_lock.lock().await;
        let mut db = self.read_db().await?;
        let idx = db
            .users
            .iter()
            .position(|u| matches(u))
            .ok_or(UserDbError::NotFound)?;

        let system = is_system_account(&db.users[idx].cosmical_name);
        if system && (patch.cosmical_name.is_some() || patch.role.is_some()) {
            return Err(UserDbError::Protected(db.users[idx].cosmical_name.clone()));
        }
        if let Some(new_name) = &patch.cosmical_name {
            let id = db.users[idx].id;
            if db.users.iter().any(|u| u.matches_name(new_name) && u.id != id) {
                return Err(UserDbError::Invalid(vec![MSG_NAME_TAKEN.to_string()]));
            }
        }

        let user = &mut db.users[idx];
        if let Some(v) = patch.cosmical_name {
            user.cosmical_email = cosmical_email(&v);
            user.cosmical_name = v;
        }
        if let Some(v) = patch.display_name {
            user.display_name = v.trim().to_string();
        }
        if let Some(v) = patch.email {
            user.email = v.trim().to_lowercase();
        }
        if let Some(v) = patch.role {
            user.role = v;
        }
        if let Some(v) = patch.phone {
            user.phone = Some(v);
        }
        if let Some(v) = patch.email_verified {
            user.email_verified = v;
        }
        if let Some(v) = patch.sim_verified {
            user.sim_verified = v;
        }
        if let Some(v) = patch.kyc {
            user.kyc = v;
        }
        if let Some(v) = patch.space {
            user.space = v;
        }
        if let Some(v) = patch.csmcl_id {
            user.csmcl_id = v;
        }
        if let Some(v) = patch.wallet {
            user.wallet = v;
        }
        if let Some(v) = patch.onboarding_step {
            user.onboarding_step = v;
        }
        if let Some(v) = patch.step_progress {
            user.step_progress = v;
        }
        if let Some(v) = patch.xp {
            user.xp = v;
        }
        if let Some(v) = patch.level {
            user.level = v;
        }
        if let Some(v) = patch.achievements {
            user.achievements = v;
        }
        if phrase_hash.is_some() {
            user.phrase_hash = phrase_hash;
        }
        if password_hash.is_some() {
            user.password_hash = password_hash;
        }
        user.refresh_verified();
        user.updated_at = OffsetDateTime::now_utc();

        let updated = user.clone();
        self.write_db(&db).await?;
        debug!(cosmical_name = %updated.cosmical_name, "user updated");
        Ok(updated)
    }

    pub async fn delete_user(&self, cosmical_name: &str) -> Result<(), UserDbError> {
        let _guard = self.write_lock.lock().await;
        let mut db = self.read_db().await?;
        let idx = db
            .users
            .iter()
            .position(|u| u.matches_name(cosmical_name))
            .ok_or(UserDbError::NotFound)?;
        if is_system_account(&db.users[idx].cosmical_name) {
            warn!(cosmical_name, "refusing to delete system account");
            return Err(UserDbError::Protected(db.users[idx].cosmical_name.clone()));
        }
        let removed = db.users.remove(idx);
        self.write_db(&db).await?;
        info!(cosmical_name = %removed.cosmical_name, "user deleted");
        Ok(())
    }

    /// Hands a pending user to the backend. The backend is simulated: the
    /// record is marked submitted. Submitting twice is a no-op.
    pub async fn submit_user(&self, cosmical_name: &str) -> Result<UserRecord, UserDbError> {
        let _guard = self.write_lock.lock().await;
        let mut db = self.read_db().await?;
        let user = db
            .users
            .iter_mut()
            .find(|u| u.matches_name(cosmical_name))
            .ok_or(UserDbError::NotFound)?;
        if user.status == UserStatus::Submitted {
            return Ok(user.clone());
        }
        let now = OffsetDateTime::now_utc();
        user.status = UserStatus::Submitted;
        user.submitted_at = Some(now);
        user.updated_at = now;
        let submitted = user.clone();
        self.write_db(&db).await?;
        info!(cosmical_name = %submitted.cosmical_name, "user submitted");
        Ok(submitted)
    }

    /// True when `secret` matches the user's recovery phrase or password.
    pub async fn verify_secret(
        &self,
        cosmical_name: &str,
        secret: &str,
    ) -> Result<bool, UserDbError> {
        let user = self
            .get_user(cosmical_name)
            .await?
            .ok_or(UserDbError::NotFound)?;
        for hash in [&user.phrase_hash, &user.password_hash].into_iter().flatten() {
            if verify_secret_hash(secret, hash)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
