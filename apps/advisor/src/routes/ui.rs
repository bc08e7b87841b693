use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// GET /
/// Two tabs: "Upload Resume" and "Chat with Job Advisor".
pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}
