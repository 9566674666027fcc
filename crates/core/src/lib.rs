pub mod domain;
pub mod llm;
pub mod predict;
pub mod quotes;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub openrouter_api_key: Option<String>,
        pub openrouter_base_url: Option<String>,
        pub app_origin: Option<String>,
        pub alpha_vantage_api_key: Option<String>,
        pub alpha_vantage_base_url: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                openrouter_api_key: non_empty_var("OPENROUTER_API_KEY"),
                openrouter_base_url: non_empty_var("OPENROUTER_BASE_URL"),
                app_origin: non_empty_var("APP_ORIGIN"),
                alpha_vantage_api_key: non_empty_var("ALPHA_VANTAGE_API_KEY"),
                alpha_vantage_base_url: non_empty_var("ALPHA_VANTAGE_BASE_URL"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn require_openrouter_api_key(&self) -> anyhow::Result<&str> {
            self.openrouter_api_key
                .as_deref()
                .context("OPENROUTER_API_KEY is required")
        }

        /// Alpha Vantage's public `demo` key only serves a handful of fixed symbols, so it is
        /// treated the same as no key at all.
        pub fn live_alpha_vantage_key(&self) -> Option<&str> {
            self.alpha_vantage_api_key
                .as_deref()
                .filter(|k| !k.eq_ignore_ascii_case("demo"))
        }
    }

    /// Reads an optional numeric override such as `OPENROUTER_TIMEOUT_SECS`.
    pub fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
        std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

}
