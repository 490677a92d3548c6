//! `POST /search`: redirect to the index carrying the term.

use axum::extract::Form;
use axum::response::Redirect;
use serde::Deserialize;

use crate::gallery::search::normalize_term;

#[derive(Debug, Default, Deserialize)]
pub struct SearchForm {
    pub term: Option<String>,
}

pub async fn search(Form(form): Form<SearchForm>) -> Redirect {
    Redirect::to(&index_location(form.term.as_deref()))
}

/// `/` or `/?term=<urlencoded>`.
pub fn index_location(term: Option<&str>) -> String {
    normalize_term(term)
        .and_then(|term| reqwest::Url::parse_with_params("http://localhost/", &[("term", term)]).ok())
        .and_then(|url| url.query().map(|query| format!("/?{query}")))
        .unwrap_or_else(|| "/".to_string())
}
