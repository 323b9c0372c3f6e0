//! Stored Feishu Project plugin credentials.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::ClientError;

/// Default Feishu Project host.
pub const DEFAULT_HOST: &str = "project.feishu.cn";

/// Which kind of plugin token the exchange should issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// `plugin_access_token`, the production credential.
    #[default]
    PluginAccessToken,
    /// `virtual_plugin_token`, for debugging during plugin development.
    VirtualPluginToken,
}

impl TokenType {
    /// Numeric code sent as `type` in the token exchange body.
    pub fn code(self) -> u8 {
        match self {
            Self::PluginAccessToken => 0,
            Self::VirtualPluginToken => 1,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Bare host (`project.feishu.cn`) or a full base URL.
    #[serde(default = "default_host")]
    pub host: String,
    pub plugin_id: String,
    pub plugin_secret: String,
    #[serde(default)]
    pub token_type: TokenType,
    /// User the plugin acts on behalf of; sent as `X-USER-KEY`.
    pub user_key: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_owned()
}

impl Credentials {
    pub fn new(
        host: impl Into<String>,
        plugin_id: impl Into<String>,
        plugin_secret: impl Into<String>,
        user_key: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            plugin_id: plugin_id.into(),
            plugin_secret: plugin_secret.into(),
            token_type: TokenType::default(),
            user_key: user_key.into(),
        }
    }

    pub fn with_token_type(mut self, token_type: TokenType) -> Self {
        self.token_type = token_type;
        self
    }

    /// Base URL for every API call. A bare host is served over https.
    pub fn base_url(&self) -> Result<Url, ClientError> {
        let host = self.host.trim().trim_end_matches('/');
        let raw = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_owned()
        } else {
            format!("https://{host}")
        };
        Ok(Url::parse(&raw)?)
    }
}

/// Mask sensitive credential values for logging
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("plugin_id", &self.plugin_id)
            .field("plugin_secret", &mask(&self.plugin_secret))
            .field("token_type", &self.token_type)
            .field("user_key", &self.user_key)
            .finish()
    }
}
