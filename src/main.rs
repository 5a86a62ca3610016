use lambda_http::{run, tracing, Error};
use tokensmith::{config::Config, routes, state::AppState};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = Config::from_env();
    let state = AppState::new(&config).await;

    run(routes::router(state)).await
}
