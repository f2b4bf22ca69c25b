use dotenv::dotenv;
use std::net::IpAddr;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_ca_file: Option<String>,
    pub jwt_secret: String,
    pub redis_url: Option<String>,
    pub standings_cache_ttl_seconds: usize,
    pub server_host: String,
    pub server_port: u16,
    pub trusted_proxy_ip: IpAddr,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> T {
    match optional_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .unwrap_or_else(|_| panic!("Failed to parse {name} from `{raw}`")),
        None => default,
    }
}

impl Config {
    pub fn init() -> Config {
        dotenv().ok();
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        Config {
            database_url,
            database_ca_file: optional_var("DATABASE_CA_FILE"),
            jwt_secret,
            redis_url: optional_var("REDIS_URL"),
            standings_cache_ttl_seconds: parsed_var("STANDINGS_CACHE_TTL_SECONDS", 300),
            server_host: optional_var("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            server_port: parsed_var("SERVER_PORT", 8080),
            trusted_proxy_ip: parsed_var("TRUSTED_PROXY_IP", IpAddr::from([127, 0, 0, 1])),
            rate_limit_per_second: parsed_var("RATE_LIMIT_PER_SECOND", 10),
            rate_limit_burst: parsed_var("RATE_LIMIT_BURST", 5),
        }
    }
}
