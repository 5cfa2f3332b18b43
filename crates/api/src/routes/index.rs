//! Static counter page.

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// GET / — the page that polls `/api/list` and posts to `/api/add`.
pub async fn get() -> Html<&'static str> {
    Html(INDEX_HTML)
}
