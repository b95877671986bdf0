use std::sync::Arc;

use foodgram::{
    database::schema::{Id, NewTag},
    routes, AppState, Config, MemoryStore,
};
use serde_json::{json, Value};
use warp::{
    http::{header::CONTENT_TYPE, StatusCode},
    test::RequestBuilder,
};

const PASSWORD: &str = "supersecret1";

struct App {
    state: Arc<AppState>,
}

impl App {
    fn new() -> Self {
        Self {
            state: AppState::new(Arc::new(MemoryStore::new()), Config::default()),
        }
    }

    async fn send(&self, request: RequestBuilder) -> (StatusCode, Value) {
        let response = request.reply(&routes(self.state.clone())).await;
        let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
        (response.status(), body)
    }

    async fn register(&self, username: &str) -> (Id, String) {
        let email = format!("{username}@example.com");
        let (status, body) = self
            .send(
                warp::test::request()
                    .method("POST")
                    .path("/api/users/")
                    .json(&json!({
                        "email": email,
                        "username": username,
                        "first_name": "First",
                        "last_name": "Last",
                        "password": PASSWORD,
                    })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let id = body["id"].as_i64().unwrap() as Id;

        let (status, body) = self
            .send(
                warp::test::request()
                    .method("POST")
                    .path("/api/auth/token/login/")
                    .json(&json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let token = body["auth_token"].as_str().unwrap().to_owned();

        (id, format!("Token {token}"))
    }

    async fn tag(&self, slug: &str) -> Id {
        self.state
            .store()
            .create_tag(&NewTag {
                name: slug.to_owned(),
                color: String::from("#49B64E"),
                slug: slug.to_owned(),
            })
            .await
            .unwrap()
            .id
    }

    async fn ingredient(&self, name: &str) -> Id {
        self.state
            .store()
            .create_ingredient(name, "g")
            .await
            .unwrap()
            .id
    }

    async fn recipe(&self, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            warp::test::request()
                .method("POST")
                .path("/api/recipes/")
                .header("authorization", token)
                .json(&body),
        )
        .await
    }
}

fn recipe_body(name: &str, tags: Vec<Id>, ingredients: Value) -> Value {
    json!({
        "ingredients": ingredients,
        "tags": tags,
        "image": "pancakes.png",
        "name": name,
        "text": "Mix and fry.",
        "cooking_time": 20,
    })
}

#[tokio::test]
async fn registration_hides_password_and_login_issues_a_token() {
    let app = App::new();
    let (id, token) = app.register("anna").await;

    let (status, body) = app
        .send(
            warp::test::request()
                .path("/api/users/me/")
                .header("authorization", &token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], json!(id));
    assert_eq!(body["is_subscribed"], json!(false));
    assert!(body.get("password").is_none());

    let (status, body) = app
        .send(
            warp::test::request()
                .method("POST")
                .path("/api/auth/token/login")
                .json(&json!({ "email": "anna@example.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "non_field_errors": ["Unable to log in with provided credentials."] })
    );
}

#[tokio::test]
async fn weak_passwords_and_duplicates_are_rejected() {
    let app = App::new();
    app.register("anna").await;

    let (status, body) = app
        .send(
            warp::test::request()
                .method("POST")
                .path("/api/users/")
                .json(&json!({
                    "email": "anna@example.com",
                    "username": "other",
                    "first_name": "A",
                    "last_name": "B",
                    "password": "1234567",
                })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["password"].as_array().map(Vec::len), Some(2));

    let (status, body) = app
        .send(
            warp::test::request()
                .method("POST")
                .path("/api/users/")
                .json(&json!({
                    "email": "anna@example.com",
                    "username": "other",
                    "first_name": "A",
                    "last_name": "B",
                    "password": PASSWORD,
                })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("email").is_some(), "{body}");
}

#[tokio::test]
async fn favorite_toggles_between_two_states() {
    let app = App::new();
    let (_, token) = app.register("anna").await;
    let flour = app.ingredient("flour").await;
    let (_, recipe) = app
        .recipe(
            &token,
            recipe_body("Pancakes", vec![], json!([{ "id": flour, "amount": 200 }])),
        )
        .await;
    let path = format!("/api/recipes/{}/favorite/", recipe["id"]);

    let toggle = |method: &'static str| {
        warp::test::request()
            .method(method)
            .path(&path)
            .header("authorization", &token)
    };

    let (status, body) = app.send(toggle("POST")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], json!("Pancakes"));
    assert_eq!(body["cooking_time"], json!(20));

    let (status, body) = app.send(toggle("POST")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("non_field_errors").is_some());

    assert_eq!(app.send(toggle("DELETE")).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.send(toggle("DELETE")).await.0, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(warp::test::request().method("POST").path(&path))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            warp::test::request()
                .method("POST")
                .path("/api/recipes/999/favorite/")
                .header("authorization", &token),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn flags_depend_on_the_viewer() {
    let app = App::new();
    let (_, token) = app.register("anna").await;
    let flour = app.ingredient("flour").await;
    let (_, recipe) = app
        .recipe(
            &token,
            recipe_body("Pancakes", vec![], json!([{ "id": flour, "amount": 200 }])),
        )
        .await;
    app.send(
        warp::test::request()
            .method("POST")
            .path(&format!("/api/recipes/{}/favorite/", recipe["id"]))
            .header("authorization", &token),
    )
    .await;

    let (_, anonymous) = app.send(warp::test::request().path("/api/recipes/")).await;
    assert_eq!(anonymous["results"][0]["is_favorited"], json!(false));
    assert_eq!(anonymous["results"][0]["is_in_shopping_cart"], json!(false));

    let (_, owner) = app
        .send(
            warp::test::request()
                .path("/api/recipes/?is_favorited=1")
                .header("authorization", &token),
        )
        .await;
    assert_eq!(owner["count"], json!(1));
    assert_eq!(owner["results"][0]["is_favorited"], json!(true));
    assert_eq!(owner["results"][0]["is_in_shopping_cart"], json!(false));
    assert_eq!(owner["results"][0]["ingredients"][0]["amount"], json!(200));
}

#[tokio::test]
async fn recipes_filter_by_tag_slug() {
    let app = App::new();
    let (_, token) = app.register("anna").await;
    let flour = app.ingredient("flour").await;
    let breakfast = app.tag("breakfast").await;
    let dinner = app.tag("dinner").await;
    let parts = json!([{ "id": flour, "amount": 100 }]);

    app.recipe(&token, recipe_body("Pancakes", vec![breakfast], parts.clone()))
        .await;
    app.recipe(&token, recipe_body("Pie", vec![dinner, breakfast], parts.clone()))
        .await;
    app.recipe(&token, recipe_body("Soup", vec![dinner], parts)).await;

    let (_, body) = app
        .send(warp::test::request().path("/api/recipes/?tags=breakfast"))
        .await;
    assert_eq!(body["count"], json!(2));

    let (status, body) = app
        .send(warp::test::request().path("/api/recipes/?tags=brunch"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("tags").is_some());
}

#[tokio::test]
async fn ingredient_lists_are_validated() {
    let app = App::new();
    let (_, token) = app.register("anna").await;
    let flour = app.ingredient("flour").await;

    let (status, body) = app
        .recipe(&token, recipe_body("Nothing", vec![], json!([])))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("ingredients").is_some());

    let (status, body) = app
        .recipe(
            &token,
            recipe_body(
                "Twice",
                vec![],
                json!([{ "id": flour, "amount": 1 }, { "id": flour, "amount": 2 }]),
            ),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("ingredients").is_some());

    let (status, body) = app
        .recipe(
            &token,
            recipe_body("Ghost", vec![], json!([{ "id": 404, "amount": 1 }])),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["ingredients"],
        json!(["Invalid pk \"404\" - object does not exist."])
    );

    let (_, list) = app.send(warp::test::request().path("/api/recipes/")).await;
    assert_eq!(list["count"], json!(0));
}

#[tokio::test]
async fn only_the_author_may_change_a_recipe() {
    let app = App::new();
    let (_, author) = app.register("anna").await;
    let (_, stranger) = app.register("boris").await;
    let flour = app.ingredient("flour").await;
    let (_, recipe) = app
        .recipe(
            &author,
            recipe_body("Pancakes", vec![], json!([{ "id": flour, "amount": 200 }])),
        )
        .await;
    let path = format!("/api/recipes/{}/", recipe["id"]);

    let (status, _) = app
        .send(
            warp::test::request()
                .method("PATCH")
                .path(&path)
                .header("authorization", &stranger)
                .json(&json!({ "name": "Mine now" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(
            warp::test::request()
                .method("PATCH")
                .path(&path)
                .header("authorization", &author)
                .json(&json!({ "ingredients": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("ingredients").is_some());

    let (status, body) = app
        .send(
            warp::test::request()
                .method("PATCH")
                .path(&path)
                .header("authorization", &author)
                .json(&json!({ "name": "Thin pancakes" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], json!("Thin pancakes"));
    assert_eq!(body["ingredients"][0]["id"], json!(flour));

    let (status, _) = app
        .send(
            warp::test::request()
                .method("DELETE")
                .path(&path)
                .header("authorization", &stranger),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            warp::test::request()
                .method("DELETE")
                .path(&path)
                .header("authorization", &author),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        app.send(warp::test::request().path(&path)).await.0,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn subscriptions_respect_recipes_limit() {
    let app = App::new();
    let (author_id, author) = app.register("anna").await;
    let (reader_id, reader) = app.register("boris").await;
    let flour = app.ingredient("flour").await;
    for name in ["One", "Two", "Three"] {
        app.recipe(
            &author,
            recipe_body(name, vec![], json!([{ "id": flour, "amount": 10 }])),
        )
        .await;
    }

    let (status, body) = app
        .send(
            warp::test::request()
                .method("POST")
                .path(&format!("/api/users/{reader_id}/subscribe/"))
                .header("authorization", &reader),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "non_field_errors": ["You cannot subscribe to yourself."] })
    );

    let subscribe = format!("/api/users/{author_id}/subscribe/?recipes_limit=2");
    let (status, body) = app
        .send(
            warp::test::request()
                .method("POST")
                .path(&subscribe)
                .header("authorization", &reader),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["is_subscribed"], json!(true));
    assert_eq!(body["recipes_count"], json!(3));
    assert_eq!(body["recipes"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["recipes"][0]["name"], json!("Three"));

    let (status, _) = app
        .send(
            warp::test::request()
                .method("POST")
                .path(&subscribe)
                .header("authorization", &reader),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            warp::test::request()
                .path("/api/users/subscriptions/?recipes_limit=abc")
                .header("authorization", &reader),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["results"][0]["recipes"].as_array().map(Vec::len), Some(3));

    let (_, profile) = app
        .send(
            warp::test::request()
                .path(&format!("/api/users/{author_id}/"))
                .header("authorization", &reader),
        )
        .await;
    assert_eq!(profile["is_subscribed"], json!(true));

    let unsubscribe = || {
        warp::test::request()
            .method("DELETE")
            .path(&subscribe)
            .header("authorization", &reader)
    };
    assert_eq!(app.send(unsubscribe()).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.send(unsubscribe()).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn shopping_cart_exports_a_paged_pdf() {
    let app = App::new();
    let (_, token) = app.register("anna").await;

    let mut parts = vec![];
    for i in 0..17 {
        let id = app.ingredient(&format!("ingredient {i:02}")).await;
        parts.push(json!({ "id": id, "amount": 5 }));
    }
    let (_, recipe) = app
        .recipe(&token, recipe_body("Everything", vec![], Value::from(parts)))
        .await;
    app.send(
        warp::test::request()
            .method("POST")
            .path(&format!("/api/recipes/{}/shopping_cart/", recipe["id"]))
            .header("authorization", &token),
    )
    .await;

    let response = warp::test::request()
        .path("/api/recipes/download_shopping_cart/")
        .header("authorization", &token)
        .reply(&routes(app.state.clone()))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/pdf");
    assert!(response.body().starts_with(b"%PDF-1.4"));
    assert!(String::from_utf8_lossy(response.body()).contains("/Count 2"));

    let (status, _) = app
        .send(warp::test::request().path("/api/recipes/download_shopping_cart/"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_ingredient_cannot_be_deleted() {
    let app = App::new();
    let (_, token) = app.register("anna").await;
    let flour = app.ingredient("flour").await;
    app.recipe(
        &token,
        recipe_body("Bread", vec![], json!([{ "id": flour, "amount": 500 }])),
    )
    .await;

    let error = foodgram::handlers::catalog::delete_ingredient(app.state.store(), flour)
        .await
        .unwrap_err();
    assert_eq!(error.status(), StatusCode::CONFLICT);

    let (status, body) = app
        .send(warp::test::request().path(&format!("/api/ingredients/{flour}/")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], json!("flour"));
}

#[tokio::test]
async fn bad_tokens_and_unknown_routes() {
    let app = App::new();

    let (status, body) = app
        .send(
            warp::test::request()
                .path("/api/recipes/")
                .header("authorization", "Token not-a-jwt"),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "detail": "Invalid token." }));

    let (status, _) = app.send(warp::test::request().path("/api/users/me/")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send(warp::test::request().path("/api/nothing/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(warp::test::request().method("PUT").path("/api/tags/"))
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn pages_link_to_their_neighbours() {
    let app = App::new();
    let (_, token) = app.register("anna").await;
    let flour = app.ingredient("flour").await;
    for name in ["One", "Two", "Three"] {
        app.recipe(
            &token,
            recipe_body(name, vec![], json!([{ "id": flour, "amount": 10 }])),
        )
        .await;
    }

    let (_, first) = app
        .send(warp::test::request().path("/api/recipes/?limit=2"))
        .await;
    assert_eq!(first["count"], json!(3));
    assert_eq!(first["next"], json!("/api/recipes/?limit=2&page=2"));
    assert_eq!(first["previous"], Value::Null);
    assert_eq!(first["results"][0]["name"], json!("Three"));

    let (_, second) = app
        .send(warp::test::request().path("/api/recipes/?limit=2&page=2"))
        .await;
    assert_eq!(second["next"], Value::Null);
    assert_eq!(second["previous"], json!("/api/recipes/?limit=2"));
    assert_eq!(second["results"].as_array().map(Vec::len), Some(1));

    let (status, body) = app
        .send(warp::test::request().path("/api/recipes/?limit=2&page=3"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Invalid page." }));
}

#[tokio::test]
async fn pages_beyond_any_offset_are_not_found() {
    let app = App::new();
    app.register("anna").await;

    for path in [
        "/api/recipes/?page=9223372036854775807&limit=10",
        "/api/users/?page=4611686018427387905&limit=4",
    ] {
        let (status, body) = app.send(warp::test::request().path(path)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
        assert_eq!(body, json!({ "detail": "Invalid page." }));
    }
}

#[tokio::test]
async fn anonymous_viewers_never_see_subscriptions() {
    let app = App::new();
    let (author_id, author) = app.register("anna").await;
    let (_, reader) = app.register("boris").await;
    let flour = app.ingredient("flour").await;
    app.recipe(
        &author,
        recipe_body("Pancakes", vec![], json!([{ "id": flour, "amount": 200 }])),
    )
    .await;
    let (status, _) = app
        .send(
            warp::test::request()
                .method("POST")
                .path(&format!("/api/users/{author_id}/subscribe/"))
                .header("authorization", &reader),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, list) = app.send(warp::test::request().path("/api/recipes/")).await;
    assert_eq!(list["results"][0]["author"]["is_subscribed"], json!(false));

    let (status, profile) = app
        .send(warp::test::request().path(&format!("/api/users/{author_id}/")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["is_subscribed"], json!(false));

    let (_, list) = app
        .send(
            warp::test::request()
                .path("/api/recipes/")
                .header("authorization", &reader),
        )
        .await;
    assert_eq!(list["results"][0]["author"]["is_subscribed"], json!(true));
}

#[tokio::test]
async fn empty_author_filter_is_ignored() {
    let app = App::new();
    let (author_id, author) = app.register("anna").await;
    let (_, other) = app.register("boris").await;
    let flour = app.ingredient("flour").await;
    let parts = json!([{ "id": flour, "amount": 100 }]);
    app.recipe(&author, recipe_body("Pancakes", vec![], parts.clone()))
        .await;
    app.recipe(&other, recipe_body("Soup", vec![], parts)).await;

    let (status, body) = app
        .send(warp::test::request().path("/api/recipes/?author="))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(2));

    let (_, body) = app
        .send(warp::test::request().path(&format!("/api/recipes/?author={author_id}")))
        .await;
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["results"][0]["name"], json!("Pancakes"));
}
