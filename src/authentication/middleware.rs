use std::{convert::Infallible, sync::Arc};

use warp::{reject::Rejection, Filter};

use crate::{error::ApiError, state::AppState};

use super::jwt::{verify_jwt_session, SessionData};

pub fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// `Token <jwt>` or `Bearer <jwt>`; other schemes are not ours.
fn parse_authorization(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    match scheme {
        "Token" | "Bearer" => Some(token.trim()),
        _ => None,
    }
}

/// Resolves the caller. No header means anonymous; a bad token, or one for a
/// deleted user, is an error.
pub async fn resolve_session(
    state: &AppState,
    header: Option<&str>,
) -> Result<Option<SessionData>, ApiError> {
    let Some(token) = header.and_then(parse_authorization) else {
        return Ok(None);
    };

    let claims = verify_jwt_session(token, &state.config.secret)?;
    let row = state
        .store()
        .get_user(claims.user_id, None)
        .await?
        .ok_or(ApiError::InvalidToken)?;

    Ok(Some(SessionData::from(&row.user)))
}

pub fn with_possible_session(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let state = state.clone();
        async move {
            resolve_session(&state, header.as_deref())
                .await
                .map_err(warp::reject::custom)
        }
    })
}

pub fn with_session(
    state: Arc<AppState>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    with_possible_session(state).and_then(|session: Option<SessionData>| async move {
        session.ok_or_else(|| warp::reject::custom(ApiError::Unauthorized))
    })
}

#[cfg(test)]
mod tests {
    use super::parse_authorization;

    #[test]
    fn both_token_schemes_are_accepted() {
        assert_eq!(parse_authorization("Token abc"), Some("abc"));
        assert_eq!(parse_authorization("Bearer abc "), Some("abc"));
        assert_eq!(parse_authorization("Basic abc"), None);
        assert_eq!(parse_authorization("abc"), None);
    }
}
