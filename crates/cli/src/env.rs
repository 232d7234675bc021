use crate::error::CliError;
use runtime::EnvLoader;

/// Builds a [`EnvLoader`], seeding it from `env_file` first (if given) so
/// real process environment variables still take precedence.
pub fn init_env(env_file: Option<&str>) -> Result<EnvLoader, CliError> {
    let mut env = EnvLoader::new();
    if let Some(path) = env_file {
        tracing::info!(path, "loading environment variables from file");
        env.load_from_file(path).map_err(|err| CliError::Config(err.to_string()))?;
    }
    Ok(env)
}
