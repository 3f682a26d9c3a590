//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (`remote.token_env`).
//! - Binaries call [`resolve_secrets`] once at startup and pass the result to
//!   constructors; no other module reads these env vars.
//! - `Debug` redacts values. Errors name the variable, never the value.

use anyhow::{bail, Result};

use crate::Settings;

/// Secrets resolved from the environment. **Values are redacted in `Debug`.**
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Env var the token was (or would have been) read from.
    pub shop_token_var: String,
    /// Admin API access token. `None` if the named env var was absent or blank.
    pub shop_token: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("shop_token_var", &self.shop_token_var)
            .field("shop_token", &self.shop_token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl ResolvedSecrets {
    /// The access token, or an error naming the missing variable.
    pub fn require_shop_token(&self) -> Result<&str> {
        match self.shop_token.as_deref() {
            Some(t) => Ok(t),
            None => bail!(
                "SECRETS_MISSING: required env var '{}' (shop access token) is not set or empty",
                self.shop_token_var
            ),
        }
    }
}

/// Resolve all secrets named by `settings` from the process environment.
pub fn resolve_secrets(settings: &Settings) -> ResolvedSecrets {
    resolve_secrets_with(settings, |name| std::env::var(name).ok())
}

/// Same as [`resolve_secrets`] with an injectable lookup (tests).
pub fn resolve_secrets_with<F>(settings: &Settings, lookup: F) -> ResolvedSecrets
where
    F: Fn(&str) -> Option<String>,
{
    let var = settings.remote.token_env.trim().to_string();
    let shop_token = lookup(&var).filter(|v| !v.trim().is_empty());
    ResolvedSecrets {
        shop_token_var: var,
        shop_token,
    }
}
