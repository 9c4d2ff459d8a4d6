use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::ACCEPT_LANGUAGE, request::Parts},
};

/// Response language, picked from `Accept-Language`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lang {
    #[default]
    En,
    Tr,
}

impl Lang {
    pub fn from_header(value: &str) -> Self {
        let primary = value
            .split(',')
            .next()
            .and_then(|tag| tag.split(';').next())
            .map(|tag| tag.trim().to_ascii_lowercase())
            .unwrap_or_default();
        if primary == "tr" || primary.starts_with("tr-") {
            Lang::Tr
        } else {
            Lang::En
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Lang {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
            .map(Lang::from_header)
            .unwrap_or_default())
    }
}

/// Opaque message keys. Workflows only ever hand these out; text is
/// produced at the HTTP edge by [`translate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    UsernameNull,
    UsernameSize,
    EmailNull,
    EmailInvalid,
    EmailInUse,
    PasswordNull,
    PasswordSize,
    PasswordPattern,
    ValidationFailure,
    UserCreateSuccess,
    EmailFailure,
    AccountActivationSuccess,
    AccountActivationFailure,
    AuthenticationFailure,
    AccountNotVerified,
    LoginSuccess,
    UnauthorizedUserUpdate,
    UserUpdateSuccess,
    UserNotFound,
    UnexpectedFailure,
    BodyInvalid,
}

impl MessageKey {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKey::UsernameNull => "username_null",
            MessageKey::UsernameSize => "username_size",
            MessageKey::EmailNull => "email_null",
            MessageKey::EmailInvalid => "email_invalid",
            MessageKey::EmailInUse => "email_in_use",
            MessageKey::PasswordNull => "password_null",
            MessageKey::PasswordSize => "password_size",
            MessageKey::PasswordPattern => "password_pattern",
            MessageKey::ValidationFailure => "validation_failure",
            MessageKey::UserCreateSuccess => "user_create_success",
            MessageKey::EmailFailure => "email_failure",
            MessageKey::AccountActivationSuccess => "account_activation_success",
            MessageKey::AccountActivationFailure => "account_activation_failure",
            MessageKey::AuthenticationFailure => "authentication_failure",
            MessageKey::AccountNotVerified => "account_not_verified",
            MessageKey::LoginSuccess => "login_success",
            MessageKey::UnauthorizedUserUpdate => "unauthorized_user_update",
            MessageKey::UserUpdateSuccess => "user_update_success",
            MessageKey::UserNotFound => "user_not_found",
            MessageKey::UnexpectedFailure => "unexpected_failure",
            MessageKey::BodyInvalid => "body_invalid",
        }
    }
}

pub fn translate(key: MessageKey, lang: Lang) -> &'static str {
    match lang {
        Lang::En => english(key),
        Lang::Tr => turkish(key),
    }
}

fn english(key: MessageKey) -> &'static str {
    match key {
        MessageKey::UsernameNull => "Username cannot be null",
        MessageKey::UsernameSize => "Must have min 3 and max 20 characters",
        MessageKey::EmailNull => "E-mail cannot be null",
        MessageKey::EmailInvalid => "E-mail is not valid",
        MessageKey::EmailInUse => "E-mail in use",
        MessageKey::PasswordNull => "Password cannot be null",
        MessageKey::PasswordSize => "Password must be at least 8 characters",
        MessageKey::PasswordPattern => {
            "Password must have at least 1 uppercase, 1 lowercase letter and 1 number"
        }
        MessageKey::ValidationFailure => "Validation Failure",
        MessageKey::UserCreateSuccess => "User created successfully",
        MessageKey::EmailFailure => "E-mail Failure",
        MessageKey::AccountActivationSuccess => "Account is activated",
        MessageKey::AccountActivationFailure => {
            "This account is either active or the token is invalid"
        }
        MessageKey::AuthenticationFailure => "Incorrect credentials",
        MessageKey::AccountNotVerified => "Account is not verified, please check your e-mail",
        MessageKey::LoginSuccess => "User logged successfully",
        MessageKey::UnauthorizedUserUpdate => "You are not authorized to update user",
        MessageKey::UserUpdateSuccess => "User updated successfully",
        MessageKey::UserNotFound => "User not found",
        MessageKey::UnexpectedFailure => "Something went wrong",
        MessageKey::BodyInvalid => "Request body is not valid JSON for this endpoint",
    }
}

fn turkish(key: MessageKey) -> &'static str {
    match key {
        MessageKey::UsernameNull => "Kullanıcı adı boş olamaz",
        MessageKey::UsernameSize => "En az 3, en fazla 20 karakter olmalı",
        MessageKey::EmailNull => "E-posta boş olamaz",
        MessageKey::EmailInvalid => "E-posta geçerli değil",
        MessageKey::EmailInUse => "Bu e-posta kullanılıyor",
        MessageKey::PasswordNull => "Şifre boş olamaz",
        MessageKey::PasswordSize => "Şifre en az 8 karakter olmalı",
        MessageKey::PasswordPattern => {
            "Şifrede en az 1 büyük harf, 1 küçük harf ve 1 sayı bulunmalı"
        }
        MessageKey::ValidationFailure => "Girilen değerler uygun değil",
        MessageKey::UserCreateSuccess => "Kullanıcı oluşturuldu",
        MessageKey::EmailFailure => "E-posta gönderiminde hata oluştu",
        MessageKey::AccountActivationSuccess => "Hesabınız aktifleştirildi",
        MessageKey::AccountActivationFailure => "Bu hesap zaten aktif ya da token geçersiz",
        MessageKey::AuthenticationFailure => "Hatalı giriş bilgileri",
        MessageKey::AccountNotVerified => "Hesap doğrulanmadı, lütfen e-postanızı kontrol edin",
        MessageKey::LoginSuccess => "Giriş başarılı",
        MessageKey::UnauthorizedUserUpdate => "Kullanıcıyı güncelleme yetkiniz yok",
        MessageKey::UserUpdateSuccess => "Kullanıcı güncellendi",
        MessageKey::UserNotFound => "Kullanıcı bulunamadı",
        MessageKey::UnexpectedFailure => "Beklenmedik bir hata oluştu",
        MessageKey::BodyInvalid => "İstek gövdesi bu uç nokta için geçerli JSON değil",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_turkish_only_for_tr_primary_tag() {
        assert_eq!(Lang::from_header("tr"), Lang::Tr);
        assert_eq!(Lang::from_header("tr-TR,en;q=0.8"), Lang::Tr);
        assert_eq!(Lang::from_header("en-US,tr;q=0.9"), Lang::En);
        assert_eq!(Lang::from_header("de"), Lang::En);
        assert_eq!(Lang::from_header(""), Lang::En);
    }

    #[test]
    fn english_registration_texts() {
        assert_eq!(
            translate(MessageKey::UsernameNull, Lang::En),
            "Username cannot be null"
        );
        assert_eq!(
            translate(MessageKey::UserCreateSuccess, Lang::En),
            "User created successfully"
        );
    }
}
