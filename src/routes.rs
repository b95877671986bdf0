use std::{convert::Infallible, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use warp::{
    filters::{body::BodyDeserializeError, cors::CorsForbidden, path::FullPath},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    reject::{InvalidQuery, LengthRequired, MethodNotAllowed, PayloadTooLarge, UnsupportedMediaType},
    reply::{self, Response},
    Filter, Rejection, Reply,
};

use crate::{
    authentication::{
        jwt::SessionData,
        middleware::{with_possible_session, with_session, with_state},
    },
    constants::MAX_BODY_SIZE,
    database::{
        form::Form,
        schema::{Id, RecipeMark},
    },
    error::ApiError,
    export,
    handlers::{
        catalog,
        recipes::{self, RecipeForm},
        users::{self, LoginForm, PasswordForm, RegistrationForm},
    },
    state::AppState,
};

type Routes = warp::filters::BoxedFilter<(Response,)>;

/// The full `/api` route table with error recovery, CORS and access logging.
pub fn routes(state: Arc<AppState>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["authorization", "content-type"])
        .allow_methods(vec!["GET", "POST", "PATCH", "DELETE"]);

    let api = recipe_routes(state.clone())
        .or(catalog_routes(state.clone()))
        .unify()
        .or(user_routes(state))
        .unify();

    warp::path("api")
        .and(api)
        .with(cors)
        .recover(handle_rejection)
        .with(warp::log("foodgram::http"))
}

fn query_form() -> impl Filter<Extract = (Form,), Error = Rejection> + Clone {
    warp::query::raw()
        .or_else(|_| async { Ok::<_, Rejection>((String::new(),)) })
        .map(|raw: String| Form::from_query(&raw))
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_SIZE).and(warp::body::json())
}

fn mark_path() -> impl Filter<Extract = (Id, RecipeMark), Error = Rejection> + Clone {
    let favorite =
        warp::path!("recipes" / Id / "favorite").map(|id: Id| (id, RecipeMark::Favorite));
    let cart =
        warp::path!("recipes" / Id / "shopping_cart").map(|id: Id| (id, RecipeMark::ShoppingCart));
    favorite.or(cart).unify().untuple_one()
}

fn recipe_routes(state: Arc<AppState>) -> Routes {
    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and_then(download_shopping_cart);

    let list = warp::path!("recipes")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_possible_session(state.clone()))
        .and(warp::path::full())
        .and(query_form())
        .and_then(list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and(warp::path::full())
        .and(json_body())
        .and_then(create_recipe);

    let retrieve = warp::path!("recipes" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_possible_session(state.clone()))
        .and(warp::path::full())
        .and_then(retrieve_recipe);

    let update = warp::path!("recipes" / Id)
        .and(warp::patch())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and(warp::path::full())
        .and(json_body())
        .and_then(update_recipe);

    let delete = warp::path!("recipes" / Id)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and_then(delete_recipe);

    let add_mark = mark_path()
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and_then(add_mark);

    let remove_mark = mark_path()
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(with_session(state))
        .and_then(remove_mark);

    download
        .or(list)
        .unify()
        .or(create)
        .unify()
        .or(retrieve)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(add_mark)
        .unify()
        .or(remove_mark)
        .unify()
        .boxed()
}

fn catalog_routes(state: Arc<AppState>) -> Routes {
    let tags = warp::path!("tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(|state: Arc<AppState>| async move {
            Ok::<_, Rejection>(respond(catalog::list_tags(state.store()).await, StatusCode::OK))
        });

    let tag = warp::path!("tags" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(|id: Id, state: Arc<AppState>| async move {
            Ok::<_, Rejection>(respond(catalog::get_tag(state.store(), id).await, StatusCode::OK))
        });

    let ingredients = warp::path!("ingredients")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(query_form())
        .and_then(|state: Arc<AppState>, form: Form| async move {
            Ok::<_, Rejection>(respond(
                catalog::list_ingredients(state.store(), &form).await,
                StatusCode::OK,
            ))
        });

    let ingredient = warp::path!("ingredients" / Id)
        .and(warp::get())
        .and(with_state(state))
        .and_then(|id: Id, state: Arc<AppState>| async move {
            Ok::<_, Rejection>(respond(
                catalog::get_ingredient(state.store(), id).await,
                StatusCode::OK,
            ))
        });

    tags.or(tag)
        .unify()
        .or(ingredients)
        .unify()
        .or(ingredient)
        .unify()
        .boxed()
}

fn user_routes(state: Arc<AppState>) -> Routes {
    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and(warp::path::full())
        .and_then(
            |state: Arc<AppState>, session: SessionData, path: FullPath| async move {
                Ok::<_, Rejection>(respond(
                    users::me(&state, &session, path.as_str()).await,
                    StatusCode::OK,
                ))
            },
        );

    let set_password = warp::path!("users" / "set_password")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and(json_body())
        .and_then(
            |state: Arc<AppState>, session: SessionData, form: PasswordForm| async move {
                Ok::<_, Rejection>(no_content(
                    users::set_password(&state, &session, form).await,
                ))
            },
        );

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and(warp::path::full())
        .and(query_form())
        .and_then(list_subscriptions);

    let list = warp::path!("users")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_possible_session(state.clone()))
        .and(warp::path::full())
        .and(query_form())
        .and_then(list_users);

    let register = warp::path!("users")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(|state: Arc<AppState>, form: RegistrationForm| async move {
            Ok::<_, Rejection>(respond(
                users::create(&state, form).await,
                StatusCode::CREATED,
            ))
        });

    let retrieve = warp::path!("users" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_possible_session(state.clone()))
        .and(warp::path::full())
        .and_then(retrieve_user);

    let subscribe = warp::path!("users" / Id / "subscribe")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and(query_form())
        .and_then(subscribe);

    let unsubscribe = warp::path!("users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(with_session(state.clone()))
        .and_then(
            |author_id: Id, state: Arc<AppState>, session: SessionData| async move {
                Ok::<_, Rejection>(no_content(
                    users::unsubscribe(&state, &session, author_id).await,
                ))
            },
        );

    let login = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(with_state(state))
        .and(json_body())
        .and_then(|state: Arc<AppState>, form: LoginForm| async move {
            Ok::<_, Rejection>(respond(users::login(&state, form).await, StatusCode::OK))
        });

    me.or(set_password)
        .unify()
        .or(subscriptions)
        .unify()
        .or(list)
        .unify()
        .or(register)
        .unify()
        .or(retrieve)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
        .or(login)
        .unify()
        .boxed()
}

async fn list_recipes(
    state: Arc<AppState>,
    session: Option<SessionData>,
    path: FullPath,
    form: Form,
) -> Result<Response, Rejection> {
    Ok(respond(
        recipes::list(&state, session.as_ref(), path.as_str(), &form).await,
        StatusCode::OK,
    ))
}

async fn create_recipe(
    state: Arc<AppState>,
    session: SessionData,
    path: FullPath,
    form: RecipeForm,
) -> Result<Response, Rejection> {
    Ok(respond(
        recipes::create(&state, &session, path.as_str(), form).await,
        StatusCode::CREATED,
    ))
}

async fn retrieve_recipe(
    id: Id,
    state: Arc<AppState>,
    session: Option<SessionData>,
    path: FullPath,
) -> Result<Response, Rejection> {
    Ok(respond(
        recipes::retrieve(&state, session.as_ref(), path.as_str(), id).await,
        StatusCode::OK,
    ))
}

async fn update_recipe(
    id: Id,
    state: Arc<AppState>,
    session: SessionData,
    path: FullPath,
    form: RecipeForm,
) -> Result<Response, Rejection> {
    Ok(respond(
        recipes::update(&state, &session, path.as_str(), id, form).await,
        StatusCode::OK,
    ))
}

async fn delete_recipe(
    id: Id,
    state: Arc<AppState>,
    session: SessionData,
) -> Result<Response, Rejection> {
    Ok(no_content(recipes::delete(&state, &session, id).await))
}

async fn add_mark(
    id: Id,
    mark: RecipeMark,
    state: Arc<AppState>,
    session: SessionData,
) -> Result<Response, Rejection> {
    Ok(respond(
        recipes::add_mark(&state, &session, id, mark).await,
        StatusCode::CREATED,
    ))
}

async fn remove_mark(
    id: Id,
    mark: RecipeMark,
    state: Arc<AppState>,
    session: SessionData,
) -> Result<Response, Rejection> {
    Ok(no_content(
        recipes::remove_mark(&state, &session, id, mark).await,
    ))
}

async fn download_shopping_cart(
    state: Arc<AppState>,
    session: SessionData,
) -> Result<Response, Rejection> {
    let pdf = match recipes::download_shopping_cart(&state, &session).await {
        Ok(pdf) => pdf,
        Err(e) => return Ok(error_reply(&e)),
    };

    let disposition = format!("attachment; filename=\"{}\"", export::FILENAME);
    Ok(reply::with_header(
        reply::with_header(pdf, CONTENT_TYPE, "application/pdf"),
        CONTENT_DISPOSITION,
        disposition,
    )
    .into_response())
}

async fn list_users(
    state: Arc<AppState>,
    session: Option<SessionData>,
    path: FullPath,
    form: Form,
) -> Result<Response, Rejection> {
    Ok(respond(
        users::list(&state, session.as_ref(), path.as_str(), &form).await,
        StatusCode::OK,
    ))
}

async fn retrieve_user(
    id: Id,
    state: Arc<AppState>,
    session: Option<SessionData>,
    path: FullPath,
) -> Result<Response, Rejection> {
    Ok(respond(
        users::retrieve(&state, session.as_ref(), path.as_str(), id).await,
        StatusCode::OK,
    ))
}

async fn subscribe(
    author_id: Id,
    state: Arc<AppState>,
    session: SessionData,
    form: Form,
) -> Result<Response, Rejection> {
    Ok(respond(
        users::subscribe(&state, &session, &form, author_id).await,
        StatusCode::CREATED,
    ))
}

async fn list_subscriptions(
    state: Arc<AppState>,
    session: SessionData,
    path: FullPath,
    form: Form,
) -> Result<Response, Rejection> {
    Ok(respond(
        users::list_subscriptions(&state, &session, path.as_str(), &form).await,
        StatusCode::OK,
    ))
}

fn respond<T: Serialize>(result: Result<T, ApiError>, status: StatusCode) -> Response {
    match result {
        Ok(payload) => reply::with_status(reply::json(&payload), status).into_response(),
        Err(e) => error_reply(&e),
    }
}

fn no_content(result: Result<(), ApiError>) -> Response {
    match result {
        Ok(()) => reply::with_status(warp::reply(), StatusCode::NO_CONTENT).into_response(),
        Err(e) => error_reply(&e),
    }
}

fn error_reply(error: &ApiError) -> Response {
    if let ApiError::Internal(message) = error {
        log::error!("Internal error: {message}");
    }
    reply::with_status(reply::json(&error.body()), error.status()).into_response()
}

fn detail(message: impl Into<String>, status: StatusCode) -> Response {
    let body = serde_json::json!({ "detail": message.into() });
    reply::with_status(reply::json(&body), status).into_response()
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let response = if let Some(e) = err.find::<ApiError>() {
        error_reply(e)
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        detail(format!("JSON parse error - {e}"), StatusCode::BAD_REQUEST)
    } else if err.find::<InvalidQuery>().is_some() {
        detail("Invalid query string.", StatusCode::BAD_REQUEST)
    } else if err.find::<PayloadTooLarge>().is_some() {
        detail("Request body is too large.", StatusCode::PAYLOAD_TOO_LARGE)
    } else if err.find::<LengthRequired>().is_some() {
        detail("Content-Length is required.", StatusCode::LENGTH_REQUIRED)
    } else if err.find::<UnsupportedMediaType>().is_some() {
        detail("Unsupported media type.", StatusCode::UNSUPPORTED_MEDIA_TYPE)
    } else if let Some(e) = err.find::<CorsForbidden>() {
        detail(e.to_string(), StatusCode::FORBIDDEN)
    } else if err.is_not_found() {
        detail("Not found.", StatusCode::NOT_FOUND)
    } else if err.find::<MethodNotAllowed>().is_some() {
        detail("Method not allowed.", StatusCode::METHOD_NOT_ALLOWED)
    } else {
        log::error!("Unhandled rejection: {err:?}");
        detail("Internal server error", StatusCode::INTERNAL_SERVER_ERROR)
    };

    Ok(response)
}
