mod app;
mod auth;
mod catalog;
mod config;
mod error;
mod pagination;
mod recipes;
mod state;
#[cfg(test)]
mod testing;
mod users;

const DEFAULT_LOG_FILTER: &str = "foodgram=debug,axum=info,tower_http=info";

/// `RUST_LOG` picks the filter; `LOG_FORMAT=json` switches to structured output.
fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.with_target(false).json().init(),
        _ => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let state = state::AppState::init().await?;
    sqlx::migrate!("./migrations").run(&state.db).await?;
    tracing::info!("schema up to date");

    app::serve(app::build_app(state)).await
}
