pub const DEFAULT_PAGE_SIZE: i64 = 10;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MIN_INGREDIENT_AMOUNT: i32 = 1;
pub const MAX_SMALL_INTEGER: i32 = 32767;

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const RESERVED_USERNAMES: &[&str] = &["me", "subscriptions"];

pub const MAX_BODY_SIZE: u64 = 16 * 1024 * 1024;

/* constraint names shared by the migration and the in-memory store */
pub const USER_EMAIL_UNIQUE: &str = "users_email_key";
pub const USER_USERNAME_UNIQUE: &str = "users_username_key";
pub const FORBIDDEN_USERNAMES: &str = "forbidden_usernames";
pub const TAG_NAME_UNIQUE: &str = "tags_name_key";
pub const TAG_SLUG_UNIQUE: &str = "tags_slug_key";
pub const TAG_COLOR_FORMAT: &str = "tags_color_hex";
pub const INGREDIENT_UNIQUE: &str = "ingredient_measurement_unique";
pub const RECIPE_INGREDIENT_UNIQUE: &str = "recipe_ingredient_unique";
pub const RECIPE_INGREDIENT_PROTECT: &str = "recipe_ingredient_protect";
pub const RECIPE_AUTHOR_FK: &str = "recipes_author_id_fkey";
pub const RECIPE_TAG_FK: &str = "recipe_tags_tag_id_fkey";
pub const FAVORITE_UNIQUE: &str = "favorite_unique";
pub const SHOPPING_UNIQUE: &str = "shopping_unique";
pub const SUBSCRIPTION_UNIQUE: &str = "user_author_unique";
pub const SUBSCRIPTION_SELF: &str = "user_author_different";
pub const RECIPE_COOKING_TIME_RANGE: &str = "recipes_cooking_time_range";
pub const RECIPE_AMOUNT_RANGE: &str = "recipe_ingredients_amount_range";
