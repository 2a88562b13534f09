use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// Lifetime of onboarding access tokens.
    pub ttl_minutes: i64,
    /// Lifetime of single-use transition tokens.
    pub transition_ttl_minutes: i64,
    /// Lifetime of main-platform session tokens minted from a transition.
    pub session_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Postgres-backed key-value store when set, in-memory otherwise.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub main_app_url: String,
}

fn env_minutes(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "csmcl-space".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "csmcl-platform".into()),
            ttl_minutes: env_minutes("JWT_TTL_MINUTES", 60),
            transition_ttl_minutes: env_minutes("TRANSITION_TTL_MINUTES", 5),
            session_ttl_minutes: env_minutes("SESSION_TTL_MINUTES", 60 * 24),
        };
        let main_app_url = std::env::var("MAIN_APP_URL")
            .unwrap_or_else(|_| "https://platform.csmcl.space".into());
        Ok(Self {
            database_url,
            jwt,
            main_app_url,
        })
    }

    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                transition_ttl_minutes: 5,
                session_ttl_minutes: 60,
            },
            main_app_url: "https://platform.test".into(),
        }
    }
}
