use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum UserDbError {
    #[error("{}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("User already exists")]
    AlreadyExists,
    #[error("User not found")]
    NotFound,
    #[error("{0} is a protected account")]
    Protected(String),
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl UserDbError {
    pub fn status(&self) -> StatusCode {
        match self {
            UserDbError::Invalid(_) => StatusCode::BAD_REQUEST,
            UserDbError::AlreadyExists => StatusCode::CONFLICT,
            UserDbError::NotFound => StatusCode::NOT_FOUND,
            UserDbError::Protected(_) => StatusCode::FORBIDDEN,
            UserDbError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
