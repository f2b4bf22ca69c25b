use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{web, App, HttpServer};
use betpool_engine::config::config::Config;
use betpool_engine::controller;
use betpool_engine::repository::database::Database;
use betpool_engine::repository::redis::StandingsCache;
use betpool_engine::service::clock::SystemClock;
use betpool_engine::util::real_ip_key_extractor::RealIpKeyExtractor;
use betpool_engine::AppState;
use log::{info, warn};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    log4rs::init_file("./log-config.yml", Default::default()).expect("Log config file not found.");
    let config = Config::init();

    let cache = config.redis_url.as_deref().and_then(|url| {
        StandingsCache::new(url, config.standings_cache_ttl_seconds)
            .map_err(|e| warn!("standings cache disabled: {e}"))
            .ok()
    });
    let db = Database::new(config.clone());
    let bind = (config.server_host.clone(), config.server_port);
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(config.rate_limit_per_second)
        .burst_size(config.rate_limit_burst)
        .key_extractor(RealIpKeyExtractor)
        .finish()
        .expect("Invalid rate limit configuration.");

    let app_data = web::Data::new(AppState {
        gateway: Arc::new(db),
        clock: Arc::new(SystemClock),
        cache,
        config,
    });

    info!("listening on {}:{}", bind.0, bind.1);
    HttpServer::new(move || {
        App::new()
            .app_data(app_data.clone())
            .configure(controller::handler::config)
            .default_service(web::route().to(controller::handler::not_found))
            .wrap(actix_web::middleware::Logger::default())
            .wrap(Governor::new(&governor_conf))
    })
    .bind(bind)?
    .run()
    .await
}
