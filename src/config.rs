use reqwest::Url;
use std::env;
use std::fmt;

pub const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
pub const DEFAULT_SCOPES: &str = "openid email profile https://www.googleapis.com/auth/drive.file";
pub const DEFAULT_AUTHORIZATION_PARAMS: &str = "access_type=offline,prompt=consent";
pub const DEFAULT_STATE_MAX_AGE_SECONDS: i64 = 300;
pub const DEFAULT_REFRESH_MARGIN_SECONDS: i64 = 60;
pub const DEFAULT_SESSION_IDLE_TIMEOUT_SECONDS: i64 = 8 * 60 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "production" || v == "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// OAuth client registration as known to the identity provider.
///
/// `redirect_uri` is kept exactly as configured. The provider compares it
/// byte-for-byte against its registration, so it is never re-serialised
/// through a URL parser.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub scopes: Vec<String>,
    pub extra_authorization_params: Vec<(String, String)>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("userinfo_endpoint", &self.userinfo_endpoint)
            .field("scopes", &self.scopes)
            .field("extra_authorization_params", &self.extra_authorization_params)
            .finish()
    }
}

impl ClientConfig {
    /// Create a config with the provider defaults for every endpoint.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            authorization_endpoint: DEFAULT_AUTHORIZATION_ENDPOINT.to_string(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            userinfo_endpoint: DEFAULT_USERINFO_ENDPOINT.to_string(),
            scopes: parse_scopes(DEFAULT_SCOPES),
            extra_authorization_params: parse_params(DEFAULT_AUTHORIZATION_PARAMS),
        }
    }

    /// Check every field. Runs at startup and again before each new
    /// authorization request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("client_id", &self.client_id)?;
        require("client_secret", &self.client_secret)?;
        require("redirect_uri", &self.redirect_uri)?;
        require("authorization_endpoint", &self.authorization_endpoint)?;
        require("token_endpoint", &self.token_endpoint)?;
        require("userinfo_endpoint", &self.userinfo_endpoint)?;

        let redirect = parse_absolute_url("redirect_uri", &self.redirect_uri)?;
        if redirect.fragment().is_some() {
            return Err(ConfigError::RedirectUriFragment);
        }
        parse_absolute_url("authorization_endpoint", &self.authorization_endpoint)?;
        parse_absolute_url("token_endpoint", &self.token_endpoint)?;
        parse_absolute_url("userinfo_endpoint", &self.userinfo_endpoint)?;

        if self.scopes.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::EmptyScopes);
        }

        Ok(())
    }

    /// Path component of the redirect URI, used to mount the callback route.
    pub fn redirect_path(&self) -> Result<String, ConfigError> {
        let url = parse_absolute_url("redirect_uri", &self.redirect_uri)?;
        Ok(url.path().to_string())
    }

    /// Space-delimited `scope` parameter value.
    pub fn scope_param(&self) -> String {
        self.scopes
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub client: ClientConfig,
    pub app_base_url: Option<String>,
    pub state_signing_secret: Option<String>,
    pub state_max_age_seconds: i64,
    pub refresh_margin_seconds: i64,
    pub trust_signed_state: bool,
    pub session_idle_timeout_seconds: i64,
    pub token_store_dir: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    pub secure_cookies: bool,
    pub service_name: String,
    pub otel_exporter_endpoint: Option<String>,
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (environment, test map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = Environment::parse(get("APP_ENV").as_deref());

        let client_id = get("GOOGLE_CLIENT_ID").ok_or(ConfigError::MissingField("client_id"))?;
        let client_secret =
            get("GOOGLE_CLIENT_SECRET").ok_or(ConfigError::MissingField("client_secret"))?;

        let app_base_url = get("APP_BASE_URL").map(|v| v.trim().to_string());
        let redirect_uri = get("OAUTH_REDIRECT_URI")
            .or_else(|| app_base_url.clone())
            .ok_or(ConfigError::MissingField("redirect_uri"))?;

        let mut client = ClientConfig::new(client_id, client_secret, redirect_uri);
        if let Some(endpoint) = get("OAUTH_AUTHORIZATION_ENDPOINT") {
            client.authorization_endpoint = endpoint;
        }
        if let Some(endpoint) = get("OAUTH_TOKEN_ENDPOINT") {
            client.token_endpoint = endpoint;
        }
        if let Some(endpoint) = get("OAUTH_USERINFO_ENDPOINT") {
            client.userinfo_endpoint = endpoint;
        }
        if let Some(scopes) = get("OAUTH_SCOPES") {
            client.scopes = parse_scopes(&scopes);
        }
        if let Some(params) = lookup("OAUTH_AUTHORIZATION_PARAMS") {
            client.extra_authorization_params = parse_params(&params);
        }
        client.validate()?;

        let state_signing_secret = get("OAUTH_STATE_SECRET");
        if state_signing_secret.is_none() && environment.is_production() {
            return Err(ConfigError::MissingSigningSecret);
        }

        let state_max_age_seconds = parse_number(
            get("OAUTH_STATE_MAX_AGE"),
            "OAUTH_STATE_MAX_AGE",
            DEFAULT_STATE_MAX_AGE_SECONDS,
        )?;
        if state_max_age_seconds <= 0 {
            return Err(ConfigError::InvalidNumber("OAUTH_STATE_MAX_AGE"));
        }

        let refresh_margin_seconds = parse_number(
            get("OAUTH_REFRESH_MARGIN"),
            "OAUTH_REFRESH_MARGIN",
            DEFAULT_REFRESH_MARGIN_SECONDS,
        )?
        .max(0);

        let trust_signed_state = parse_flag(get("OAUTH_TRUST_SIGNED_STATE").as_deref(), false);

        let session_idle_timeout_seconds = parse_number(
            get("SESSION_IDLE_TIMEOUT"),
            "SESSION_IDLE_TIMEOUT",
            DEFAULT_SESSION_IDLE_TIMEOUT_SECONDS,
        )?;
        if session_idle_timeout_seconds <= 0 {
            return Err(ConfigError::InvalidNumber("SESSION_IDLE_TIMEOUT"));
        }

        let token_store_dir = get("OAUTH_TOKEN_DIR");

        let server_host = get("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let server_port = get("SERVER_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let secure_cookies = parse_flag(
            get("SECURE_COOKIES").as_deref(),
            environment.is_production(),
        );

        let service_name = get("SERVICE_NAME").unwrap_or_else(|| "fieldmap".to_string());

        let otel_exporter_endpoint = get("OTEL_EXPORTER_OTLP_ENDPOINT");

        let metrics_port = match get("METRICS_PORT") {
            Some(port) => Some(port.trim().parse().map_err(|_| ConfigError::InvalidPort)?),
            None => None,
        };

        Ok(Config {
            environment,
            client,
            app_base_url,
            state_signing_secret,
            state_max_age_seconds,
            refresh_margin_seconds,
            trust_signed_state,
            session_idle_timeout_seconds,
            token_store_dir,
            server_host,
            server_port,
            secure_cookies,
            service_name,
            otel_exporter_endpoint,
            metrics_port,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Non-fatal redirect URI problems worth surfacing to the operator.
    pub fn redirect_uri_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let redirect = &self.client.redirect_uri;

        if let Some(base) = &self.app_base_url {
            if redirect.trim_end_matches('/') == base.trim_end_matches('/') && redirect != base {
                warnings.push(format!(
                    "redirect_uri {redirect} differs from APP_BASE_URL {base} only by a trailing slash; \
                     the provider registration must match one of them exactly"
                ));
            }
        }
        if redirect.starts_with("http://") && self.environment.is_production() {
            warnings.push(format!("redirect_uri {redirect} is not https"));
        }

        warnings
    }

    /// Settings that weaken callback protection, worth a loud log line.
    pub fn security_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.trust_signed_state {
            let mut warning = "OAUTH_TRUST_SIGNED_STATE accepts any state signed by this server \
                               without a per-browser copy, so a callback link from another \
                               browser can sign this one in"
                .to_string();
            if self.environment.is_production() {
                warning.push_str("; do not enable it in production unless cookies are unusable");
            }
            warnings.push(warning);
        }
        warnings
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("OAuth configuration missing: {0}")]
    MissingField(&'static str),

    #[error("OAuth configuration field {0} still holds a template placeholder")]
    Placeholder(&'static str),

    #[error("OAuth configuration field {field} is not a valid absolute URL: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error("redirect_uri must not contain a fragment")]
    RedirectUriFragment,

    #[error("at least one OAuth scope is required")]
    EmptyScopes,

    #[error("OAUTH_STATE_SECRET must be set in production")]
    MissingSigningSecret,

    #[error("Invalid number in {0}")]
    InvalidNumber(&'static str),

    #[error("Invalid port number")]
    InvalidPort,
}

fn require(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::MissingField(field));
    }
    if trimmed.starts_with('<') {
        return Err(ConfigError::Placeholder(field));
    }
    Ok(())
}

fn parse_absolute_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    if value.trim() != value {
        return Err(ConfigError::InvalidUrl {
            field,
            reason: "surrounding whitespace".to_string(),
        });
    }
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            field,
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    Ok(url)
}

fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_params(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn parse_number(
    value: Option<String>,
    field: &'static str,
    default: i64,
) -> Result<i64, ConfigError> {
    match value {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidNumber(field)),
        None => Ok(default),
    }
}

fn parse_flag(value: Option<&str>, default: bool) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) => matches!(v.as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}
