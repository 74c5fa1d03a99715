use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::FlowError;

/// Environment keys consulted for each credential, first non-blank wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialKeys {
    pub email: Vec<String>,
    pub password: Vec<String>,
}

impl Default for CredentialKeys {
    fn default() -> Self {
        Self {
            email: vec!["WEBMOBI_EMAIL".to_string(), "EMAIL".to_string()],
            password: vec!["WEBMOBI_PASSWORD".to_string(), "PASSWORD".to_string()],
        }
    }
}

/// Login credentials. Never printed in cleartext.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    /// Build credentials, rejecting blank fields.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Result<Self, FlowError> {
        let email = email.into().trim().to_string();
        let password = password.into();

        let mut missing = Vec::new();
        if email.is_empty() {
            missing.push("email".to_string());
        }
        if password.trim().is_empty() {
            missing.push("password".to_string());
        }
        if !missing.is_empty() {
            return Err(FlowError::MissingCredentials { missing });
        }

        Ok(Self { email, password })
    }

    /// Resolve credentials through `lookup`, trying each configured key in order.
    pub fn from_lookup<F>(keys: &CredentialKeys, lookup: F) -> Result<Self, FlowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolve = |candidates: &[String]| {
            candidates
                .iter()
                .filter_map(|key| lookup(key))
                .find(|value| !value.trim().is_empty())
        };

        let email = resolve(&keys.email);
        let password = resolve(&keys.password);

        let mut missing = Vec::new();
        if email.is_none() {
            missing.push(keys.email.join("/"));
        }
        if password.is_none() {
            missing.push(keys.password.join("/"));
        }
        match (email, password) {
            (Some(email), Some(password)) => Credentials::new(email, password),
            _ => Err(FlowError::MissingCredentials { missing }),
        }
    }

    /// Load credentials from `env_file` (when it exists), then the process
    /// environment. The process environment is not modified.
    pub fn load(env_file: Option<&Path>, keys: &CredentialKeys) -> Result<Self, FlowError> {
        let file_values = match env_file {
            Some(path) => read_env_file(path)?,
            None => HashMap::new(),
        };

        let credentials = Credentials::from_lookup(keys, |key| {
            file_values
                .get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
        })?;
        info!(email = %credentials.masked_email(), "Loaded credentials");
        Ok(credentials)
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// `qa@example.com` becomes `q*@example.com`.
    pub fn masked_email(&self) -> String {
        mask_email(&self.email)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.masked_email())
            .field("password", &"*****")
            .finish()
    }
}

pub(crate) fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first: String = local.chars().take(1).collect();
            format!("{first}*@{domain}")
        }
        None => "*****".to_string(),
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>, FlowError> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => {
            debug!(path = %path.display(), "env file not found, using process environment");
            return Ok(HashMap::new());
        }
        Err(e) => {
            return Err(FlowError::Config(format!(
                "Failed to read {}: {e}",
                path.display()
            )))
        }
    };

    iter.map(|item| {
        item.map_err(|e| FlowError::Config(format!("Failed to parse {}: {e}", path.display())))
    })
    .collect()
}
