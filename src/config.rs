use std::time::Duration;

#[derive(clap::ValueEnum, Clone, Debug, Copy)]
pub enum CargoEnv {
    Development,
    Production,
}

#[derive(clap::Parser, Clone, Debug)]
pub struct AppConfig {
    // production or development
    #[clap(long, env, value_enum)]
    pub cargo_env: CargoEnv,

    // port that the app will bind to
    #[clap(long, env, default_value = "3000")]
    pub port: u16,

    // optional sentry integration
    #[clap(long, env)]
    pub sentry_dsn: Option<String>,

    // where rewritten playlists point back to, e.g. https://relay.example.com
    // when this is unset it's rebuilt from x-forwarded-proto and the host header on each request
    #[clap(long, env)]
    pub public_base_url: Option<String>,

    // folder of json documents for the /api4 lookup
    #[clap(long, env, default_value = "data/movies")]
    pub catalog_dir: String,

    // catalog site that /api5 scrapes for embeds
    #[clap(long, env, default_value = "https://toonstream.world")]
    pub toonstream_base_url: String,

    // every upstream call made while resolving an embed
    #[clap(long, env, default_value = "8")]
    pub resolve_timeout_secs: u64,

    // proxied playlists and segments, this one needs to be longer for big ranges
    #[clap(long, env, default_value = "30")]
    pub proxy_timeout_secs: u64,

    #[clap(long, env, default_value = "5")]
    pub max_redirects: usize,
}

impl AppConfig {
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout_secs)
    }
}

impl Default for AppConfig {
    // mostly for tests, the binary always goes through clap
    fn default() -> Self {
        Self {
            cargo_env: CargoEnv::Development,
            port: 3000,
            sentry_dsn: None,
            public_base_url: None,
            catalog_dir: "data/movies".to_string(),
            toonstream_base_url: "https://toonstream.world".to_string(),
            resolve_timeout_secs: 8,
            proxy_timeout_secs: 30,
            max_redirects: 5,
        }
    }
}
