use tracing::{error, info, warn};

use crate::{
    auth::{jwt::AuthUser, password::hash_password},
    error::AppError,
    i18n::MessageKey,
    mail::Mailer,
    users::{
        dto::PageResponse,
        pagination::Pagination,
        repo::{StoreError, UserStore},
        repo_types::{NewUser, UserSummary},
        token::activation_token,
        validation::{check_email_shape, check_password, check_username, ValidationErrors},
    },
};

/// Raw registration input; nothing is trusted until [`register`] validates it.
#[derive(Debug, Default)]
pub struct RegisterCommand {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Runs every field check and reports all failures together.
async fn validate_registration(
    store: &dyn UserStore,
    cmd: &RegisterCommand,
) -> Result<ValidationErrors, AppError> {
    let mut errors = ValidationErrors::default();

    if let Some(key) = check_username(cmd.username.as_deref()) {
        errors.add("username", key);
    }

    match check_email_shape(cmd.email.as_deref()) {
        Some(key) => errors.add("email", key),
        None => {
            let email = cmd.email.as_deref().unwrap_or_default();
            if store.find_by_email(email).await?.is_some() {
                warn!(%email, "email already registered");
                errors.add("email", MessageKey::EmailInUse);
            }
        }
    }

    if let Some(key) = check_password(cmd.password.as_deref()) {
        errors.add("password", key);
    }

    Ok(errors)
}

/// Creates an unverified user and mails the activation token.
///
/// The insert and the mail are one unit: if the mail cannot be sent the
/// row is rolled back and the email stays free for another attempt.
pub async fn register(
    store: &dyn UserStore,
    mailer: &dyn Mailer,
    mut cmd: RegisterCommand,
) -> Result<(), AppError> {
    cmd.email = cmd.email.map(|e| e.trim().to_lowercase());

    let errors = validate_registration(store, &cmd).await?;
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let username = cmd.username.unwrap_or_default();
    let email = cmd.email.unwrap_or_default();
    let password = hash_password(&cmd.password.unwrap_or_default()).map_err(|e| {
        error!(error = %e, "hash_password failed");
        AppError::Unexpected(e)
    })?;
    let token = activation_token();

    let mut tx = store.begin().await?;
    let user = match tx
        .insert(NewUser {
            username,
            email,
            password,
            activation_token: token.clone(),
        })
        .await
    {
        Ok(u) => u,
        Err(StoreError::DuplicateEmail) => {
            warn!("email registered concurrently");
            return Err(email_in_use());
        }
        Err(e) => {
            error!(error = %e, "insert user failed");
            return Err(e.into());
        }
    };

    if let Err(e) = mailer.send_activation(&user.email, &token).await {
        error!(error = %e, email = %user.email, "activation mail failed; rolling back");
        if let Err(rollback) = tx.rollback().await {
            error!(error = %rollback, "rollback failed");
        }
        return Err(AppError::EmailDelivery(e));
    }

    match tx.commit().await {
        Ok(()) => {}
        Err(StoreError::DuplicateEmail) => {
            warn!(email = %user.email, "email registered concurrently");
            return Err(email_in_use());
        }
        Err(e) => {
            error!(error = %e, "commit user failed");
            return Err(e.into());
        }
    }

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(())
}

fn email_in_use() -> AppError {
    AppError::Validation(ValidationErrors::single("email", MessageKey::EmailInUse))
}

/// Consumes an activation token; a token works exactly once.
pub async fn activate(store: &dyn UserStore, token: &str) -> Result<(), AppError> {
    let Some(user_id) = store.consume_activation_token(token).await? else {
        warn!("unknown or used activation token");
        return Err(AppError::InvalidToken);
    };

    info!(user_id, "account activated");
    Ok(())
}

pub async fn list_users(
    store: &dyn UserStore,
    pagination: Pagination,
) -> Result<PageResponse, AppError> {
    let (content, total) = store
        .find_active_page(pagination.size, pagination.offset())
        .await?;
    Ok(PageResponse {
        content,
        page: pagination.page,
        size: pagination.size,
        total_pages: pagination.total_pages(total),
    })
}

pub async fn get_user(store: &dyn UserStore, id: i64) -> Result<UserSummary, AppError> {
    store
        .find_active_by_id(id)
        .await?
        .ok_or(AppError::UserNotFound)
}

/// Renames the caller's own account. Anyone else, including anonymous
/// callers, is refused before the body is looked at.
pub async fn update_user(
    store: &dyn UserStore,
    auth: Option<&AuthUser>,
    id: i64,
    username: Option<String>,
) -> Result<(), AppError> {
    let caller = match auth {
        Some(auth) if auth.id == id => auth,
        Some(auth) => {
            warn!(caller = auth.id, target = id, "update of another user refused");
            return Err(AppError::Forbidden);
        }
        None => {
            warn!(target = id, "anonymous update refused");
            return Err(AppError::Forbidden);
        }
    };

    if let Some(key) = check_username(username.as_deref()) {
        return Err(AppError::Validation(ValidationErrors::single("username", key)));
    }

    let Some(mut user) = store.find_by_id(id).await? else {
        return Err(AppError::UserNotFound);
    };
    user.username = username.unwrap_or_default();
    store.update(&user).await?;

    info!(user_id = id, email = %caller.email, "username updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::password::verify_password,
        mail::{
            testing::{FailingMailer, RecordingMailer},
            MailError,
        },
        users::{
            memory::MemoryUserStore,
            pagination::PageQuery,
            repo::UserTransaction,
            repo_types::User,
        },
    };
    use axum::async_trait;

    /// Never reports an existing email, so concurrent registrations get
    /// past validation and meet at the insert.
    struct BlindEmailStore(MemoryUserStore);

    #[async_trait]
    impl UserStore for BlindEmailStore {
        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
            Ok(None)
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
            self.0.find_by_id(id).await
        }

        async fn consume_activation_token(&self, token: &str) -> Result<Option<i64>, StoreError> {
            self.0.consume_activation_token(token).await
        }

        async fn find_active_by_id(&self, id: i64) -> Result<Option<UserSummary>, StoreError> {
            self.0.find_active_by_id(id).await
        }

        async fn find_active_page(
            &self,
            limit: i64,
            offset: i64,
        ) -> Result<(Vec<UserSummary>, i64), StoreError> {
            self.0.find_active_page(limit, offset).await
        }

        async fn update(&self, user: &User) -> Result<(), StoreError> {
            self.0.update(user).await
        }

        async fn begin(&self) -> Result<Box<dyn UserTransaction>, StoreError> {
            self.0.begin().await
        }
    }

    /// Commits a competing row for the same address while the activation
    /// mail is in flight.
    struct RacingMailer {
        store: MemoryUserStore,
    }

    #[async_trait]
    impl Mailer for RacingMailer {
        async fn send_activation(&self, to: &str, _token: &str) -> Result<(), MailError> {
            let mut tx = self.store.begin().await.unwrap();
            tx.insert(NewUser {
                username: "rival".into(),
                email: to.into(),
                password: "hash".into(),
                activation_token: "fedcba9876543210".into(),
            })
            .await
            .unwrap();
            tx.commit().await.unwrap();
            Ok(())
        }
    }

    fn valid(username: &str, email: &str) -> RegisterCommand {
        RegisterCommand {
            username: Some(username.into()),
            email: Some(email.into()),
            password: Some("Ps123456".into()),
        }
    }

    async fn register_verified(store: &MemoryUserStore, mailer: &RecordingMailer, i: usize) {
        register(store, mailer, valid(&format!("user{i}"), &format!("user{i}@mail.com")))
            .await
            .unwrap();
        activate(store, &mailer.last_token().unwrap()).await.unwrap();
    }

    fn auth(id: i64) -> AuthUser {
        AuthUser {
            id,
            email: format!("user{id}@mail.com"),
        }
    }

    #[tokio::test]
    async fn register_stores_hashed_password_and_pending_token() {
        let store = MemoryUserStore::new();
        let mailer = RecordingMailer::default();
        register(&store, &mailer, valid("user1", "user1@mail.com"))
            .await
            .unwrap();

        let users = store.all();
        assert_eq!(users.len(), 1);
        let user = &users[0];
        assert_eq!(user.username, "user1");
        assert_eq!(user.email, "user1@mail.com");
        assert_ne!(user.password, "Ps123456");
        assert!(verify_password("Ps123456", &user.password).unwrap());
        assert!(!user.email_verified);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "user1@mail.com");
        assert_eq!(user.activation_token.as_deref(), Some(sent[0].1.as_str()));
    }

    #[tokio::test]
    async fn null_username_reports_only_username() {
        let store = MemoryUserStore::new();
        let mailer = RecordingMailer::default();
        let cmd = RegisterCommand {
            username: None,
            email: Some("a@b.com".into()),
            password: Some("Ps123456".into()),
        };
        let AppError::Validation(errors) = register(&store, &mailer, cmd).await.unwrap_err() else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("username"), Some(MessageKey::UsernameNull));
        assert!(store.all().is_empty());
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn collects_errors_from_every_field() {
        let store = MemoryUserStore::new();
        let mailer = RecordingMailer::default();
        let cmd = RegisterCommand {
            username: Some("ab".into()),
            email: Some("not-an-email".into()),
            password: Some("lowercase1".into()),
        };
        let AppError::Validation(errors) = register(&store, &mailer, cmd).await.unwrap_err() else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.get("username"), Some(MessageKey::UsernameSize));
        assert_eq!(errors.get("email"), Some(MessageKey::EmailInvalid));
        assert_eq!(errors.get("password"), Some(MessageKey::PasswordPattern));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_field_error() {
        let store = MemoryUserStore::new();
        let mailer = RecordingMailer::default();
        register(&store, &mailer, valid("user1", "user1@mail.com"))
            .await
            .unwrap();

        let AppError::Validation(errors) = register(&store, &mailer, valid("user2", "USER1@mail.com "))
            .await
            .unwrap_err()
        else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.get("email"), Some(MessageKey::EmailInUse));
        assert_eq!(store.all().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_at_insert_becomes_email_in_use() {
        let inner = MemoryUserStore::new();
        let store = BlindEmailStore(inner.clone());
        let mailer = RecordingMailer::default();
        register(&store, &mailer, valid("user1", "user1@mail.com"))
            .await
            .unwrap();

        let err = register(&store, &mailer, valid("user2", "user1@mail.com"))
            .await
            .unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("email"), Some(MessageKey::EmailInUse));
        assert_eq!(inner.all().len(), 1);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_at_commit_becomes_email_in_use() {
        let store = MemoryUserStore::new();
        let mailer = RacingMailer {
            store: store.clone(),
        };

        let err = register(&store, &mailer, valid("user1", "user1@mail.com"))
            .await
            .unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.get("email"), Some(MessageKey::EmailInUse));

        let users = store.all();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "rival");
    }

    #[tokio::test]
    async fn undeliverable_address_is_rejected_before_insert() {
        let store = MemoryUserStore::new();
        let mailer = RecordingMailer::default();
        let err = register(&store, &mailer, valid("user1", "a<b@c.de"))
            .await
            .unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.get("email"), Some(MessageKey::EmailInvalid));
        assert!(store.all().is_empty());
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn mail_failure_rolls_back_and_frees_email() {
        let store = MemoryUserStore::new();
        let err = register(&store, &FailingMailer, valid("user1", "user1@mail.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmailDelivery(_)));
        assert!(store.all().is_empty());

        let mailer = RecordingMailer::default();
        register(&store, &mailer, valid("user1", "user1@mail.com"))
            .await
            .unwrap();
        assert_eq!(store.all().len(), 1);
    }

    #[tokio::test]
    async fn activation_token_works_once() {
        let store = MemoryUserStore::new();
        let mailer = RecordingMailer::default();
        register(&store, &mailer, valid("user1", "user1@mail.com"))
            .await
            .unwrap();
        let token = mailer.last_token().unwrap();

        activate(&store, &token).await.unwrap();
        let user = store.all().remove(0);
        assert!(user.email_verified);
        assert!(user.activation_token.is_none());

        let err = activate(&store, &token).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[tokio::test]
    async fn listing_shows_only_verified_users() {
        let store = MemoryUserStore::new();
        let mailer = RecordingMailer::default();
        for i in 0..6 {
            register_verified(&store, &mailer, i).await;
        }
        for i in 6..11 {
            register(&store, &mailer, valid(&format!("user{i}"), &format!("user{i}@mail.com")))
                .await
                .unwrap();
        }

        let page = list_users(&store, Pagination::from_query(&PageQuery::default()))
            .await
            .unwrap();
        assert_eq!(page.content.len(), 6);
        assert_eq!(page.page, 0);
        assert_eq!(page.size, 10);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn second_page_starts_after_first_ten() {
        let store = MemoryUserStore::new();
        let mailer = RecordingMailer::default();
        for i in 0..15 {
            register_verified(&store, &mailer, i).await;
        }

        let query = PageQuery {
            page: Some("1".into()),
            size: None,
        };
        let page = list_users(&store, Pagination::from_query(&query)).await.unwrap();
        assert_eq!(page.content.len(), 5);
        assert_eq!(page.content[0].username, "user10");
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 2);
    }

    #[tokio::test]
    async fn get_user_hides_unverified() {
        let store = MemoryUserStore::new();
        let mailer = RecordingMailer::default();
        register(&store, &mailer, valid("user1", "user1@mail.com"))
            .await
            .unwrap();
        let id = store.all()[0].id;

        assert!(matches!(get_user(&store, id).await, Err(AppError::UserNotFound)));
        activate(&store, &mailer.last_token().unwrap()).await.unwrap();
        assert_eq!(get_user(&store, id).await.unwrap().username, "user1");
    }

    #[tokio::test]
    async fn update_requires_matching_identity() {
        let store = MemoryUserStore::new();
        let mailer = RecordingMailer::default();
        register_verified(&store, &mailer, 1).await;
        let id = store.all()[0].id;

        let anonymous = update_user(&store, None, id, Some("renamed".into())).await;
        assert!(matches!(anonymous, Err(AppError::Forbidden)));
        let other = update_user(&store, Some(&auth(id + 1)), id, Some("renamed".into())).await;
        assert!(matches!(other, Err(AppError::Forbidden)));
        assert_eq!(store.all()[0].username, "user1");

        update_user(&store, Some(&auth(id)), id, Some("renamed".into()))
            .await
            .unwrap();
        assert_eq!(store.all()[0].username, "renamed");
    }

    #[tokio::test]
    async fn update_validates_new_username() {
        let store = MemoryUserStore::new();
        let mailer = RecordingMailer::default();
        register_verified(&store, &mailer, 1).await;
        let id = store.all()[0].id;

        let err = update_user(&store, Some(&auth(id)), id, Some("x".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.all()[0].username, "user1");
    }
}
