use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub reset_link_base: String,
    pub reset_ttl_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            access_secret: std::env::var("JWT_SECRET")?,
            refresh_secret: std::env::var("JWT_REFRESH_SECRET")?,
            // Earlier revisions shipped 6h; 24h is the documented default.
            access_ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 7),
        };
        let smtp = SmtpConfig {
            host: std::env::var("SMTP_HOST")?,
            username: std::env::var("SMTP_USERNAME")?,
            password: std::env::var("SMTP_PASSWORD")?,
            from: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| "no-reply@cherryblossom.id".into()),
        };
        Ok(Self {
            database_url,
            jwt,
            smtp,
            reset_link_base: std::env::var("RESET_LINK_BASE")
                .unwrap_or_else(|_| "http://localhost:5000".into()),
            reset_ttl_minutes: std::env::var("RESET_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
        })
    }
}
