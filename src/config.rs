use serde::{Deserialize, Serialize};

pub const RANKINGS_PLACEHOLDER: &str = "{rankings}";

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub recommendations: RecommendationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default)]
    pub tlscert: Option<String>,
    #[serde(default)]
    pub tlskey: Option<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: default_port(),
            tlscert: None,
            tlskey: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub sqlite: Option<SqliteConfig>,
    /// Deadline for every single store operation.
    #[serde(default = "default_db_timeout", alias = "timeoutsecs")]
    pub timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite: None,
            timeout_secs: default_db_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SqliteConfig {
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default, alias = "accesssecret")]
    pub access_secret: String,
    #[serde(default, alias = "refreshsecret")]
    pub refresh_secret: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_bcrypt_cost", alias = "bcryptcost")]
    pub bcrypt_cost: u32,
    /// Also require the presented access token to be the one stored for the user.
    #[serde(default, alias = "enforcerevocation")]
    pub enforce_revocation: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            issuer: default_issuer(),
            bcrypt_cost: default_bcrypt_cost(),
            enforce_revocation: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    #[serde(default, alias = "apikey")]
    pub api_key: String,
    #[serde(default = "default_base_url", alias = "baseurl")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, alias = "prompttemplate")]
    pub prompt_template: String,
    #[serde(default = "default_classifier_timeout", alias = "timeoutsecs")]
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            prompt_template: String::new(),
            timeout_secs: default_classifier_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecommendationConfig {
    /// Maximum number of recommended movies; 0 returns all matches.
    #[serde(default = "default_recommendation_limit")]
    pub limit: u32,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            limit: default_recommendation_limit(),
        }
    }
}

fn default_port() -> String {
    "8080".to_string()
}

fn default_db_timeout() -> u64 {
    100
}

fn default_issuer() -> String {
    "MagicStreamMovies".to_string()
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_classifier_timeout() -> u64 {
    30
}

fn default_recommendation_limit() -> u32 {
    5
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_string(), e))?;

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_string(), e))?;

        Ok(config)
    }

    /// Read the optional config file, apply environment overrides and validate.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override settings from environment variables. The lookup is passed in
    /// so tests do not have to touch the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.sqlite = Some(SqliteConfig { filename: url });
        }
        if let Some(port) = lookup("LISTEN_PORT") {
            self.listen.port = port;
        }
        if let Some(secret) = lookup("SECRET_KEY") {
            self.auth.access_secret = secret;
        }
        if let Some(secret) = lookup("SECRET_REFRESH_KEY") {
            self.auth.refresh_secret = secret;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.classifier.api_key = key;
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.classifier.base_url = url;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.classifier.model = model;
        }
        if let Some(template) = lookup("BASE_PROMPT_TEMPLATE") {
            self.classifier.prompt_template = template;
        }
        if let Some(limit) = lookup("RECOMMENDED_MOVIE_LIMIT") {
            self.recommendations.limit = limit
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("RECOMMENDED_MOVIE_LIMIT", limit.clone()))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.access_secret.is_empty() {
            return Err(ConfigError::Missing("auth.access_secret (SECRET_KEY)"));
        }
        if self.auth.refresh_secret.is_empty() {
            return Err(ConfigError::Missing("auth.refresh_secret (SECRET_REFRESH_KEY)"));
        }
        if self.classifier.api_key.is_empty() {
            return Err(ConfigError::Missing("classifier.api_key (OPENAI_API_KEY)"));
        }
        if self.classifier.prompt_template.is_empty() {
            return Err(ConfigError::Missing(
                "classifier.prompt_template (BASE_PROMPT_TEMPLATE)",
            ));
        }
        if !self.classifier.prompt_template.contains(RANKINGS_PLACEHOLDER) {
            return Err(ConfigError::Invalid(
                "classifier.prompt_template",
                format!("missing {} placeholder", RANKINGS_PLACEHOLDER),
            ));
        }
        Ok(())
    }

    pub fn get_database_path(&self) -> String {
        match self.database.sqlite {
            Some(ref sqlite) => sqlite.filename.clone(),
            None => "sqlite://magicstream.db".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(String, std::io::Error),
    #[error("Failed to parse config file {0}: {1}")]
    ParseError(String, serde_yaml::Error),
    #[error("Missing required setting {0}")]
    Missing(&'static str),
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
