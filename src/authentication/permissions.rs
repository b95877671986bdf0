use crate::{
    database::schema::{Id, Recipe},
    error::ApiError,
};

use super::jwt::SessionData;

pub fn viewer_id(session: Option<&SessionData>) -> Option<Id> {
    session.map(|session| session.user_id)
}

/// Only the author may change or delete a recipe.
pub fn ensure_author(session: &SessionData, recipe: &Recipe) -> Result<(), ApiError> {
    if recipe.author_id != session.user_id {
        return Err(ApiError::PermissionDenied);
    }
    Ok(())
}
