use lazy_static::lazy_static;
use regex::Regex;

use super::repo_types::{UserDraft, UserPatch};

pub const NAME_MIN: usize = 3;
pub const NAME_MAX: usize = 32;
pub const DISPLAY_NAME_MIN: usize = 3;
pub const PASSWORD_MIN: usize = 8;
pub const PHRASE_MIN: usize = 8;

pub const MSG_NAME: &str =
    "Cosmical name must be 3-32 lowercase letters or digits, separated by single hyphens";
pub const MSG_NAME_TAKEN: &str = "This Cosmical name is already taken";
pub const MSG_DISPLAY_NAME: &str = "Display name must be at least 3 characters";
pub const MSG_EMAIL: &str = "Please enter a valid email address";
pub const MSG_PASSWORD_LEN: &str = "Password must be at least 8 characters";
pub const MSG_PASSWORD_MIX: &str =
    "Password must contain an uppercase letter, a lowercase letter and a digit";
pub const MSG_PHRASE: &str = "Recovery phrase must be at least 8 characters";
pub const MSG_TERMS: &str = "You must agree to the terms and conditions";
pub const MSG_PHONE: &str = "Please enter a valid phone number";

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9]{7,15}$").unwrap();
}

pub fn is_valid_cosmical_name(name: &str) -> bool {
    (NAME_MIN..=NAME_MAX).contains(&name.len()) && NAME_RE.is_match(name)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// E.164-ish: optional plus, 7 to 15 digits, separators stripped.
pub fn is_valid_phone(phone: &str) -> bool {
    let compact: String = phone.chars().filter(|c| !matches!(c, ' ' | '-' | '(' | ')')).collect();
    PHONE_RE.is_match(&compact)
}

pub fn validate_display_name(name: &str) -> Option<&'static str> {
    (name.trim().chars().count() < DISPLAY_NAME_MIN).then_some(MSG_DISPLAY_NAME)
}

pub fn validate_password(password: &str) -> Vec<&'static str> {
    let mut errors = Vec::new();
    if password.chars().count() < PASSWORD_MIN {
        errors.push(MSG_PASSWORD_LEN);
    }
    let upper = password.chars().any(|c| c.is_ascii_uppercase());
    let lower = password.chars().any(|c| c.is_ascii_lowercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());
    if !(upper && lower && digit) {
        errors.push(MSG_PASSWORD_MIX);
    }
    errors
}

pub fn validate_recovery_phrase(phrase: &str) -> Option<&'static str> {
    (phrase.trim().chars().count() < PHRASE_MIN).then_some(MSG_PHRASE)
}

/// Every problem with a draft, in form order. Uniqueness is checked by the
/// repository.
pub fn validate_draft(draft: &UserDraft) -> Vec<String> {
    let mut errors: Vec<&'static str> = Vec::new();
    errors.extend(validate_display_name(&draft.display_name));
    if !is_valid_email(&draft.email) {
        errors.push(MSG_EMAIL);
    }
    if !is_valid_cosmical_name(&draft.cosmical_name) {
        errors.push(MSG_NAME);
    }
    if let Some(password) = &draft.password {
        errors.extend(validate_password(password));
    }
    if let Some(phrase) = &draft.recovery_phrase {
        errors.extend(validate_recovery_phrase(phrase));
    }
    if !draft.agree_to_terms {
        errors.push(MSG_TERMS);
    }
    errors.into_iter().map(String::from).collect()
}

/// Checks only the fields a patch touches.
pub fn validate_patch(patch: &UserPatch) -> Vec<String> {
    let mut errors: Vec<&'static str> = Vec::new();
    if let Some(name) = &patch.display_name {
        errors.extend(validate_display_name(name));
    }
    if let Some(email) = &patch.email {
        if !is_valid_email(email) {
            errors.push(MSG_EMAIL);
        }
    }
    if let Some(name) = &patch.cosmical_name {
        if !is_valid_cosmical_name(name) {
            errors.push(MSG_NAME);
        }
    }
    if let Some(password) = &patch.password {
        errors.extend(validate_password(password));
    }
    if let Some(phrase) = &patch.recovery_phrase {
        errors.extend(validate_recovery_phrase(phrase));
    }
    errors.into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_draft() -> UserDraft {
        UserDraft {
            cosmical_name: "test-user".into(),
            display_name: "Test User".into(),
            email: "test@example.com".into(),
            password: Some("Secur3Pass".into()),
            recovery_phrase: Some("secure-recovery-phrase".into()),
            agree_to_terms: true,
            role: None,
        }
    }

    #[test]
    fn cosmical_name_rules() {
        assert!(is_valid_cosmical_name("nova"));
        assert!(is_valid_cosmical_name("star-dust-42"));
        assert!(!is_valid_cosmical_name("ab"));
        assert!(!is_valid_cosmical_name("Nova"));
        assert!(!is_valid_cosmical_name("double--dash"));
        assert!(!is_valid_cosmical_name("-lead"));
        assert!(!is_valid_cosmical_name("trail-"));
        assert!(!is_valid_cosmical_name("has space"));
        assert!(!is_valid_cosmical_name(&"a".repeat(33)));
    }

    #[test]
    fn email_rules() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("invalid-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.d"));
    }

    #[test]
    fn phone_rules() {
        assert!(is_valid_phone("+31 6 1234 5678"));
        assert!(is_valid_phone("(555) 123-4567"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("call me"));
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("Secur3Pass").is_empty());
        assert_eq!(validate_password("Sh0rt"), vec![MSG_PASSWORD_LEN]);
        assert_eq!(validate_password("alllowercase1"), vec![MSG_PASSWORD_MIX]);
    }

    #[test]
    fn valid_draft_has_no_errors() {
        assert!(validate_draft(&good_draft()).is_empty());
    }

    #[test]
    fn draft_collects_every_message() {
        let draft = UserDraft {
            cosmical_name: "Bad Name".into(),
            display_name: "ab".into(),
            email: "invalid-email".into(),
            password: None,
            recovery_phrase: Some("short".into()),
            agree_to_terms: false,
            role: None,
        };
        let errors = validate_draft(&draft);
        assert_eq!(
            errors,
            vec![MSG_DISPLAY_NAME, MSG_EMAIL, MSG_NAME, MSG_PHRASE, MSG_TERMS]
        );
    }

    #[test]
    fn patch_checks_only_present_fields() {
        assert!(validate_patch(&UserPatch::default()).is_empty());
        let patch = UserPatch {
            email: Some("nope".into()),
            ..Default::default()
        };
        assert_eq!(validate_patch(&patch), vec![MSG_EMAIL]);
    }
}
