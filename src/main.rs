mod handler;
mod storage;
mod tg;
mod tmdb;

use dotenvy::dotenv;
use teloxide::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let bot = Bot::from_env();
    let tmdb_key = std::env::var("TMDB_API_KEY").expect("TMDB_API_KEY is missing");
    let tmdb = tmdb::TmdbClient::new(tmdb_key);

    let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL is missing");
    let storage = storage::Storage::connect(&db_url)?;
    // база может лежать: бот всё равно отвечает, история просто не пишется
    if let Err(e) = storage.init().await {
        tracing::warn!("database init failed: {e}");
    }

    // писать ли историю по неудачным поискам (по умолчанию только удачные)
    let record_misses = std::env::var("RECORD_MISSES")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let deps = tg::Deps {
        tmdb,
        storage,
        state: tg::ChatState::new(),
        record_misses,
    };

    tracing::info!("starting bot polling");
    tg::run(bot, deps).await;
    Ok(())
}
