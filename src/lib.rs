pub mod config;
pub mod dag;
pub mod dates;
pub mod exchange;
pub mod fake_provider;
pub mod game_extract;
pub mod http_client;
pub mod loader;
pub mod logging;
pub mod model;
pub mod nba_stats;
pub mod pacing;
pub mod player_extract;
pub mod postgres_sink;
pub mod provider;
pub mod sink;
pub mod sqlite_sink;
pub mod table;
pub mod transform;
