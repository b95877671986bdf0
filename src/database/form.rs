use std::str::FromStr;

use crate::error::ApiError;

/// Raw query-string parameters in request order; keys may repeat.
#[derive(Debug, Clone, Default)]
pub struct Form {
    inner: Vec<(String, String)>,
}

impl Form {
    pub fn from_query(raw: &str) -> Self {
        match serde_urlencoded::from_str::<Vec<(String, String)>>(raw) {
            Ok(inner) => Self { inner },
            Err(e) => {
                log::debug!("Ignoring malformed query string {raw:?}: {e}");
                Self::default()
            }
        }
    }

    /// Last value for `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.inner
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn get_number<T>(&self, key: &str) -> Result<Option<T>, ApiError>
    where
        T: FromStr,
    {
        // An empty value is no value.
        match self.get_str(key).map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_e| ApiError::field(key, "A valid integer is required.")),
            None => Ok(None),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ApiError> {
        match self.get_str(key) {
            Some("1" | "true" | "True") => Ok(Some(true)),
            Some("0" | "false" | "False") => Ok(Some(false)),
            Some(_) => Err(ApiError::field(key, "Must be a valid boolean.")),
            None => Ok(None),
        }
    }

    /// `path` with the current query, `key` replaced by `value` or dropped when `None`.
    pub fn link(&self, path: &str, key: &str, value: Option<String>) -> String {
        let mut pairs: Vec<(&str, &str)> = self
            .inner
            .iter()
            .filter(|(k, _)| k != key)
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if let Some(value) = value.as_deref() {
            pairs.push((key, value));
        }

        match serde_urlencoded::to_string(&pairs) {
            Ok(query) if !query.is_empty() => format!("{path}?{query}"),
            _ => path.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_keys_are_kept_in_order() {
        let form = Form::from_query("tags=breakfast&author=3&tags=lunch");

        assert_eq!(form.get_all("tags"), vec!["breakfast", "lunch"]);
        assert_eq!(form.get_number::<i32>("author").unwrap(), Some(3));
        assert_eq!(form.get_str("missing"), None);
    }

    #[test]
    fn invalid_number_is_a_field_error() {
        let form = Form::from_query("author=abc");

        assert!(matches!(
            form.get_number::<i32>("author"),
            Err(ApiError::Validation(errors)) if errors.contains("author")
        ));
    }

    #[test]
    fn empty_number_is_absent() {
        let form = Form::from_query("author=&limit=%20");

        assert_eq!(form.get_number::<i32>("author").unwrap(), None);
        assert_eq!(form.get_number::<i32>("limit").unwrap(), None);
    }

    #[test]
    fn booleans_accept_the_usual_spellings() {
        let form = Form::from_query("a=1&b=True&c=false&d=maybe");

        assert_eq!(form.get_bool("a").unwrap(), Some(true));
        assert_eq!(form.get_bool("b").unwrap(), Some(true));
        assert_eq!(form.get_bool("c").unwrap(), Some(false));
        assert!(form.get_bool("d").is_err());
        assert_eq!(form.get_bool("e").unwrap(), None);
    }

    #[test]
    fn links_replace_a_single_key() {
        let form = Form::from_query("tags=lunch&page=2&limit=5");

        assert_eq!(
            form.link("/api/recipes/", "page", Some(String::from("3"))),
            "/api/recipes/?tags=lunch&limit=5&page=3"
        );
        assert_eq!(
            form.link("/api/recipes/", "page", None),
            "/api/recipes/?tags=lunch&limit=5"
        );
        assert_eq!(Form::default().link("/api/users/", "page", None), "/api/users/");
    }
}
