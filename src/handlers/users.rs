use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use validator::Validate;

use crate::{
    authentication::{
        cryptography::{hash_password, password_problems, verify_password},
        jwt::{generate_jwt_session, SessionData},
        permissions::viewer_id,
    },
    constants::{FORBIDDEN_USERNAMES, RESERVED_USERNAMES, USER_EMAIL_UNIQUE, USER_USERNAME_UNIQUE},
    database::{
        error::StoreError,
        form::Form,
        pagination::{Page, PageQuery},
        schema::{Id, NewUser, SubscriptionRow},
    },
    error::{ApiError, FieldErrors},
    state::AppState,
    views::{subscription_views, user_view, CreatedUserView, SubscriptionView, TokenView, UserView},
};

static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("USERNAME_PATTERN: invalid regex pattern"));

const REQUIRED: &str = "This field is required.";

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegistrationForm {
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Ensure this field has no more than 254 characters.")
    )]
    pub email: Option<String>,
    #[validate(length(
        min = 1,
        max = 150,
        message = "Ensure this field has between 1 and 150 characters."
    ))]
    pub username: Option<String>,
    #[validate(length(
        min = 1,
        max = 150,
        message = "Ensure this field has between 1 and 150 characters."
    ))]
    pub first_name: Option<String>,
    #[validate(length(
        min = 1,
        max = 150,
        message = "Ensure this field has between 1 and 150 characters."
    ))]
    pub last_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub new_password: Option<String>,
    #[serde(default)]
    pub current_password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn check_username(username: &str, errors: &mut FieldErrors) {
    if !USERNAME_PATTERN.is_match(username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    if RESERVED_USERNAMES.contains(&username) {
        errors.add("username", format!("The username \"{username}\" is reserved."));
    }
}

fn check_password(field: &str, password: &str, errors: &mut FieldErrors) {
    for problem in password_problems(password) {
        errors.add(field, problem);
    }
}

fn registration_error(error: StoreError) -> ApiError {
    match error {
        StoreError::UniqueViolation { constraint } if constraint == USER_EMAIL_UNIQUE => {
            ApiError::field("email", "A user with that email already exists.")
        }
        StoreError::UniqueViolation { constraint } if constraint == USER_USERNAME_UNIQUE => {
            ApiError::field("username", "A user with that username already exists.")
        }
        StoreError::CheckViolation { constraint } if constraint == FORBIDDEN_USERNAMES => {
            ApiError::field("username", "This username is reserved.")
        }
        other => other.into(),
    }
}

/// Reads `recipes_limit`; anything but a positive integer means no limit.
pub fn recipes_limit(form: &Form) -> Option<i64> {
    form.get_str("recipes_limit")
        .and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|limit| *limit > 0)
}

pub async fn list(
    state: &AppState,
    session: Option<&SessionData>,
    path: &str,
    form: &Form,
) -> Result<Page<UserView>, ApiError> {
    let store = state.store();
    let viewer = viewer_id(session);
    let page = PageQuery::from_form(form, state.config.page_size)?;

    let (rows, total) = store.fetch_users(viewer, &page).await?;
    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        views.push(user_view(store, viewer, path, row).await?);
    }

    Page::from_rows(views, total, &page, path, form)
}

pub async fn create(state: &AppState, form: RegistrationForm) -> Result<CreatedUserView, ApiError> {
    let mut errors: FieldErrors = match form.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => e.into(),
    };

    for (field, missing) in [
        ("email", form.email.is_none()),
        ("username", form.username.is_none()),
        ("first_name", form.first_name.is_none()),
        ("last_name", form.last_name.is_none()),
        ("password", form.password.is_none()),
    ] {
        if missing {
            errors.add(field, REQUIRED);
        }
    }
    if let Some(username) = &form.username {
        check_username(username, &mut errors);
    }
    if let Some(password) = &form.password {
        check_password("password", password, &mut errors);
    }
    errors.into_result()?;

    let (Some(email), Some(username), Some(first_name), Some(last_name), Some(password)) = (
        form.email,
        form.username,
        form.first_name,
        form.last_name,
        form.password,
    ) else {
        return Err(ApiError::non_field(REQUIRED));
    };

    let user = state
        .store()
        .create_user(&NewUser {
            email,
            username,
            first_name,
            last_name,
            password: hash_password(&password)?,
        })
        .await
        .map_err(registration_error)?;
    log::info!("Registered user {} ({})", user.id, user.username);

    Ok(user.into())
}

pub async fn retrieve(
    state: &AppState,
    session: Option<&SessionData>,
    path: &str,
    id: Id,
) -> Result<UserView, ApiError> {
    let store = state.store();
    let viewer = viewer_id(session);

    let row = store
        .get_user(id, viewer)
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok(user_view(store, viewer, path, row).await?)
}

pub async fn me(state: &AppState, session: &SessionData, path: &str) -> Result<UserView, ApiError> {
    retrieve(state, Some(session), path, session.user_id).await
}

pub async fn set_password(
    state: &AppState,
    session: &SessionData,
    form: PasswordForm,
) -> Result<(), ApiError> {
    let store = state.store();
    let mut errors = FieldErrors::new();

    let user = store
        .get_user(session.user_id, None)
        .await?
        .ok_or(ApiError::InvalidToken)?
        .user;

    match &form.current_password {
        None => errors.add("current_password", REQUIRED),
        Some(current) => {
            if !verify_password(current, &user.password)? {
                errors.add("current_password", "Invalid password.");
            }
        }
    }
    match &form.new_password {
        None => errors.add("new_password", REQUIRED),
        Some(new_password) => check_password("new_password", new_password, &mut errors),
    }
    errors.into_result()?;

    let Some(new_password) = form.new_password else {
        return Err(ApiError::field("new_password", REQUIRED));
    };
    store
        .set_password(user.id, &hash_password(&new_password)?)
        .await?;
    log::info!("User {} changed their password", user.id);

    Ok(())
}

pub async fn login(state: &AppState, form: LoginForm) -> Result<TokenView, ApiError> {
    let mut errors = FieldErrors::new();
    if form.email.is_none() {
        errors.add("email", REQUIRED);
    }
    if form.password.is_none() {
        errors.add("password", REQUIRED);
    }
    errors.into_result()?;

    let (Some(email), Some(password)) = (form.email, form.password) else {
        return Err(ApiError::non_field(REQUIRED));
    };

    let invalid = || ApiError::non_field("Unable to log in with provided credentials.");
    let user = state
        .store()
        .get_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&password, &user.password)? {
        return Err(invalid());
    }

    let auth_token = generate_jwt_session(&user, &state.config.secret, state.config.token_hours)?;
    log::info!("User {} logged in", user.id);

    Ok(TokenView { auth_token })
}

pub async fn subscribe(
    state: &AppState,
    session: &SessionData,
    form: &Form,
    author_id: Id,
) -> Result<SubscriptionView, ApiError> {
    let store = state.store();

    if author_id == session.user_id {
        return Err(ApiError::non_field("You cannot subscribe to yourself."));
    }

    let author = store
        .get_user(author_id, None)
        .await?
        .ok_or_else(ApiError::not_found)?
        .user;

    let created = store
        .subscribe(session.user_id, author_id)
        .await
        .map_err(|e| match e {
            StoreError::ForeignKeyViolation { .. } => ApiError::not_found(),
            other => other.into(),
        })?;
    if !created {
        return Err(ApiError::Conflict(String::from(
            "You are already subscribed to this author.",
        )));
    }
    log::info!("User {} subscribed to {author_id}", session.user_id);

    let recipes_count = store.count_author_recipes(author_id).await?;
    let mut views = subscription_views(
        store,
        vec![SubscriptionRow {
            author,
            recipes_count,
            count: 1,
        }],
        recipes_limit(form),
    )
    .await?;

    views
        .pop()
        .ok_or_else(|| ApiError::Internal(format!("Subscription to {author_id} vanished")))
}

pub async fn unsubscribe(
    state: &AppState,
    session: &SessionData,
    author_id: Id,
) -> Result<(), ApiError> {
    let store = state.store();

    if store.get_user(author_id, None).await?.is_none() {
        return Err(ApiError::not_found());
    }

    if !store.unsubscribe(session.user_id, author_id).await? {
        return Err(ApiError::NotFound(String::from(
            "You are not subscribed to this author.",
        )));
    }
    log::info!("User {} unsubscribed from {author_id}", session.user_id);

    Ok(())
}

pub async fn list_subscriptions(
    state: &AppState,
    session: &SessionData,
    path: &str,
    form: &Form,
) -> Result<Page<SubscriptionView>, ApiError> {
    let store = state.store();
    let page = PageQuery::from_form(form, state.config.page_size)?;

    let (rows, total) = store.fetch_subscriptions(session.user_id, &page).await?;
    let views = subscription_views(store, rows, recipes_limit(form)).await?;

    Page::from_rows(views, total, &page, path, form)
}
