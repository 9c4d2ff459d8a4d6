use std::collections::BTreeMap;

use lazy_static::lazy_static;
use lettre::Address;
use regex::Regex;

use crate::i18n::MessageKey;

/// Field name → message key. At most one entry per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<&'static str, MessageKey>);

impl ValidationErrors {
    pub fn add(&mut self, field: &'static str, key: MessageKey) {
        self.0.entry(field).or_insert(key);
    }

    pub fn get(&self, field: &str) -> Option<MessageKey> {
        self.0.get(field).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&&'static str, &MessageKey)> {
        self.0.iter()
    }

    pub fn single(field: &'static str, key: MessageKey) -> Self {
        let mut errors = Self::default();
        errors.add(field, key);
        errors
    }
}

/// Needs a dotted domain and an address the mail transport can deliver to.
pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email) && email.parse::<Address>().is_ok()
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

pub fn check_username(username: Option<&str>) -> Option<MessageKey> {
    let Some(username) = present(username) else {
        return Some(MessageKey::UsernameNull);
    };
    let len = username.chars().count();
    if !(3..=20).contains(&len) {
        return Some(MessageKey::UsernameSize);
    }
    None
}

/// Shape checks only; whether the address is taken needs the store.
pub fn check_email_shape(email: Option<&str>) -> Option<MessageKey> {
    let Some(email) = present(email) else {
        return Some(MessageKey::EmailNull);
    };
    if !is_valid_email(email) {
        return Some(MessageKey::EmailInvalid);
    }
    None
}

pub fn check_password(password: Option<&str>) -> Option<MessageKey> {
    let Some(password) = present(password) else {
        return Some(MessageKey::PasswordNull);
    };
    if password.chars().count() < 8 {
        return Some(MessageKey::PasswordSize);
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_lower && has_upper && has_digit) {
        return Some(MessageKey::PasswordPattern);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert_eq!(check_username(None), Some(MessageKey::UsernameNull));
        assert_eq!(check_username(Some("")), Some(MessageKey::UsernameNull));
        assert_eq!(check_username(Some("ab")), Some(MessageKey::UsernameSize));
        assert_eq!(
            check_username(Some("a-very-long-username-here")),
            Some(MessageKey::UsernameSize)
        );
        assert_eq!(check_username(Some("user1")), None);
    }

    #[test]
    fn email_shape_rules() {
        assert_eq!(check_email_shape(None), Some(MessageKey::EmailNull));
        assert_eq!(check_email_shape(Some("mail.com")), Some(MessageKey::EmailInvalid));
        assert_eq!(check_email_shape(Some("user@mail")), Some(MessageKey::EmailInvalid));
        assert_eq!(check_email_shape(Some("a<b@c.de")), Some(MessageKey::EmailInvalid));
        assert_eq!(check_email_shape(Some("a,b@c.de")), Some(MessageKey::EmailInvalid));
        assert_eq!(check_email_shape(Some("user1@mail.com")), None);
    }

    #[test]
    fn password_rules_bail_at_first_failure() {
        assert_eq!(check_password(None), Some(MessageKey::PasswordNull));
        assert_eq!(check_password(Some("Pa1")), Some(MessageKey::PasswordSize));
        assert_eq!(check_password(Some("alllowercase1")), Some(MessageKey::PasswordPattern));
        assert_eq!(check_password(Some("ALLUPPERCASE1")), Some(MessageKey::PasswordPattern));
        assert_eq!(check_password(Some("NoDigitsHere")), Some(MessageKey::PasswordPattern));
        assert_eq!(check_password(Some("Ps123456")), None);
    }

    #[test]
    fn first_message_per_field_wins() {
        let mut errors = ValidationErrors::default();
        errors.add("email", MessageKey::EmailInvalid);
        errors.add("email", MessageKey::EmailInUse);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("email"), Some(MessageKey::EmailInvalid));
    }
}
