pub async fn handler() -> &'static str {
    "ok"
}
