use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration, set {env_var}")]
    MissingEnvVar { env_var: String },

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// Map a dotted settings field like `provider.api_key` to the env var
/// that supplies it, e.g. `CONFAB_PROVIDER__API_KEY`.
pub fn to_env_var(field: &str) -> String {
    format!("CONFAB_{}", field.replace('.', "__").to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("provider.api_key"), "CONFAB_PROVIDER__API_KEY");
        assert_eq!(to_env_var("type"), "CONFAB_TYPE");
    }
}
