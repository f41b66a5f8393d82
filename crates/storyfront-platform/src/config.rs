use anyhow::{Context, Result, bail};
use storyfront_currency::RateTable;

pub const DEFAULT_HMAC_MAX_SKEW_SECS: i64 = 300;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeMode {
    Development,
    Production,
}

impl RuntimeMode {
    fn parse(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
            None | Some("") | Some("development") | Some("dev") | Some("test") => {
                Ok(RuntimeMode::Development)
            }
            Some("production") | Some("prod") => Ok(RuntimeMode::Production),
            Some(other) => bail!("APP_ENV must be development or production, got {other}"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub mode: RuntimeMode,
    /// Absent in development means the in-memory store is used.
    pub database_url: Option<String>,
    pub http_addr: String,
    /// Absent in development disables request signing checks.
    pub hmac_secret: Option<String>,
    pub hmac_max_skew_secs: i64,
    pub fx_rates: RateTable,
}

impl ServiceConfig {
    pub fn from_env(default_http_addr: &str) -> Result<Self> {
        Self::from_lookup(default_http_addr, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(default_http_addr: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mode = RuntimeMode::parse(lookup("APP_ENV").as_deref())?;
        let database_url = non_empty("DATABASE_URL");
        let hmac_secret = non_empty("HMAC_SECRET");

        if mode == RuntimeMode::Production {
            database_url
                .as_ref()
                .context("DATABASE_URL is required in production")?;
            hmac_secret
                .as_ref()
                .context("HMAC_SECRET is required in production")?;
        }

        let http_addr = match (non_empty("HTTP_ADDR"), non_empty("PORT")) {
            (Some(addr), _) => addr,
            (None, Some(port)) => {
                let port: u16 = port
                    .trim()
                    .parse()
                    .with_context(|| format!("PORT must be a valid port number, got {port}"))?;
                format!("0.0.0.0:{port}")
            }
            (None, None) => default_http_addr.to_string(),
        };

        let hmac_max_skew_secs = match non_empty("HMAC_MAX_SKEW_SECS") {
            Some(raw) => {
                let secs: i64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("HMAC_MAX_SKEW_SECS must be an integer, got {raw}"))?;
                if secs <= 0 {
                    bail!("HMAC_MAX_SKEW_SECS must be positive");
                }
                secs
            }
            None => DEFAULT_HMAC_MAX_SKEW_SECS,
        };

        let strict_rates = non_empty("FX_RATES_STRICT")
            .is_some_and(|value| matches!(value.trim(), "1" | "true" | "yes"));
        let base_rates = if strict_rates {
            RateTable::strict()
        } else {
            RateTable::default()
        };
        let fx_rates = match non_empty("FX_RATES") {
            Some(spec) => base_rates.merge_spec(&spec).context("FX_RATES is invalid")?,
            None => base_rates,
        };

        Ok(Self {
            mode,
            database_url,
            http_addr,
            hmac_secret,
            hmac_max_skew_secs,
            fx_rates,
        })
    }
}
