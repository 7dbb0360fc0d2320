use config::{Config, ConfigError, Environment, File};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Resolve `<service>/config` whether the process runs from the workspace
/// root or from inside the service directory.
pub fn configuration_directory(base_path: &Path, service_dir: &str) -> PathBuf {
    if base_path.ends_with(service_dir) {
        base_path.join("config")
    } else {
        base_path.join(service_dir).join("config")
    }
}

/// Load `base.yaml` for a service, layered with `APP_`-prefixed environment
/// variables (`APP_SERVER__PORT=9000`).
pub fn load_layered<T: DeserializeOwned>(service_dir: &str) -> Result<T, ConfigError> {
    dotenvy::dotenv().ok();

    let base_path = std::env::current_dir()
        .map_err(|e| ConfigError::Message(format!("cannot read current directory: {}", e)))?;
    let directory = configuration_directory(&base_path, service_dir);

    let settings = Config::builder()
        .add_source(File::from(directory.join("base.yaml")).required(true))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_directory_from_workspace_root() {
        let dir = configuration_directory(Path::new("/srv/app"), "dorm-admin");
        assert_eq!(dir, PathBuf::from("/srv/app/dorm-admin/config"));
    }

    #[test]
    fn configuration_directory_from_service_dir() {
        let dir = configuration_directory(Path::new("/srv/app/dorm-admin"), "dorm-admin");
        assert_eq!(dir, PathBuf::from("/srv/app/dorm-admin/config"));
    }
}
