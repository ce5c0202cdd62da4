pub mod error;

use std::fs;
use std::path::{Path, PathBuf};

use discarr_model::ServiceKind;

use crate::constants::{
    DEFAULT_CONFIG_LOCATIONS, DEFAULT_MAX_ALLOWED_CATCHUP_TIME,
    DEFAULT_MAX_ALLOWED_DOWNLOAD_TIME, DEFAULT_MAX_TIME_WITHOUT_METADATA,
    DEFAULT_METADATA_LEDGER_FILE, DEFAULT_REQUEST_TIMEOUT, DEFAULT_STATE_DIR,
};
use crate::models::sources::{
    EnvConfig, FileConfig, FileServiceConfig, FileTransmissionConfig,
};
use crate::models::{
    Config, ConfigMetadata, MetadataSweepConfig, ServiceConfig,
    StallThresholds, TransmissionConfig, resolve_in, threshold_fields,
};
use crate::util::{duration_or, read_secret_file};
use crate::validation::{self, ConfigWarnings};

use error::ConfigLoadError;

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    /// Overrides `state_dir` from every other source.
    pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_state_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.state_dir = Some(path.into());
        self
    }

    /// Apply `.env`, read the process environment, then compose.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Compose from an already gathered environment. Does not touch the
    /// process environment.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) =
            self.compose_config(file_config, env, config_path)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let mut source = ConfigPathSource::default();

        if let Some(explicit) = &self.options.config_path {
            source.explicit = Some(explicit.clone());
        } else if let Some(from_env) = &env.config_path {
            source.env = Some(from_env.clone());
        } else {
            source.default = DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists());
        }

        let Some((path, provenance)) = source.resolved_path() else {
            return Ok((None, None));
        };

        if !path.exists() {
            if provenance.must_exist() {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents =
            fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
                path: path.clone(),
                source,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|source| {
                ConfigLoadError::Parse {
                    path: path.clone(),
                    source,
                }
            })?;

        tracing::debug!(
            path = %path.display(),
            ?provenance,
            "loaded configuration file"
        );
        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
    ) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if config_path.is_none() {
            warnings.push_with_hint(
                "No discarr.toml detected; using environment variables only",
                "Create discarr.toml or pass --config to point at one",
            );
        }

        let FileConfig {
            state_dir: file_state_dir,
            request_timeout: file_request_timeout,
            stall: file_stall,
            radarr: file_radarr,
            sonarr: file_sonarr,
            transmission: file_transmission,
            metadata: file_metadata,
        } = file_config.unwrap_or_default();

        let state_dir = self
            .options
            .state_dir
            .clone()
            .or(env.state_dir.clone())
            .or(file_state_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR));

        let request_timeout = duration_or(
            "request_timeout",
            env.request_timeout
                .as_deref()
                .or(file_request_timeout.as_deref()),
            DEFAULT_REQUEST_TIMEOUT,
        )?;

        let stall = StallThresholds {
            max_allowed_download_time: duration_or(
                "stall.max_allowed_download_time",
                env.max_allowed_download_time
                    .as_deref()
                    .or(file_stall.max_allowed_download_time.as_deref()),
                DEFAULT_MAX_ALLOWED_DOWNLOAD_TIME,
            )?,
            max_allowed_catchup_time: duration_or(
                "stall.max_allowed_catchup_time",
                env.max_allowed_catchup_time
                    .as_deref()
                    .or(file_stall.max_allowed_catchup_time.as_deref()),
                DEFAULT_MAX_ALLOWED_CATCHUP_TIME,
            )?,
        };

        let radarr = compose_service(
            ServiceKind::Radarr,
            ServiceEnv {
                url: env.radarr_url.clone(),
                api_key: env.radarr_api_key.clone(),
                api_key_file: env.radarr_api_key_file.clone(),
            },
            file_radarr,
            stall,
            &state_dir,
        )?;
        let sonarr = compose_service(
            ServiceKind::Sonarr,
            ServiceEnv {
                url: env.sonarr_url.clone(),
                api_key: env.sonarr_api_key.clone(),
                api_key_file: env.sonarr_api_key_file.clone(),
            },
            file_sonarr,
            stall,
            &state_dir,
        )?;

        let transmission = compose_transmission(&env, file_transmission);

        let metadata_sweep = MetadataSweepConfig {
            max_time_without_metadata: duration_or(
                "metadata.max_time_without_metadata",
                env.max_time_without_metadata
                    .as_deref()
                    .or(file_metadata.max_time_without_metadata.as_deref()),
                DEFAULT_MAX_TIME_WITHOUT_METADATA,
            )?,
            ledger_path: resolve_in(
                &state_dir,
                file_metadata.ledger_path.unwrap_or_else(|| {
                    PathBuf::from(DEFAULT_METADATA_LEDGER_FILE)
                }),
            ),
        };

        let config = Config {
            state_dir,
            request_timeout,
            stall,
            radarr,
            sonarr,
            transmission,
            metadata_sweep,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded: false,
            },
        };

        warnings.extend(validation::apply_guard_rails(&config)?);

        Ok((config, warnings))
    }
}

struct ServiceEnv {
    url: Option<String>,
    api_key: Option<String>,
    api_key_file: Option<PathBuf>,
}

/// A service counts as configured once any of its fields is set; guard
/// rails then insist the rest is complete.
fn compose_service(
    kind: ServiceKind,
    env: ServiceEnv,
    file: Option<FileServiceConfig>,
    global: StallThresholds,
    state_dir: &Path,
) -> Result<Option<ServiceConfig>, ConfigLoadError> {
    let file_present = file.is_some();
    let file = file.unwrap_or_default();

    let mut api_key = env.api_key.or(file.api_key);
    if api_key.is_none() {
        for path in [env.api_key_file.as_ref(), file.api_key_file.as_ref()]
            .into_iter()
            .flatten()
        {
            if let Some(secret) = read_secret_file(path)? {
                api_key = Some(secret);
                break;
            }
        }
    }

    let url = env.url.or(file.url);
    if !file_present && url.is_none() && api_key.is_none() {
        return Ok(None);
    }

    let (download_field, catchup_field) = threshold_fields(kind);
    let thresholds = StallThresholds {
        max_allowed_download_time: duration_or(
            download_field,
            file.max_allowed_download_time.as_deref(),
            global.max_allowed_download_time,
        )?,
        max_allowed_catchup_time: duration_or(
            catchup_field,
            file.max_allowed_catchup_time.as_deref(),
            global.max_allowed_catchup_time,
        )?,
    };

    let ledger_path = resolve_in(
        state_dir,
        file.ledger_path
            .unwrap_or_else(|| PathBuf::from(kind.default_ledger_file())),
    );

    Ok(Some(ServiceConfig {
        kind,
        url: url.unwrap_or_default(),
        api_key: api_key.unwrap_or_default(),
        thresholds,
        ledger_path,
    }))
}

fn compose_transmission(
    env: &EnvConfig,
    file: Option<FileTransmissionConfig>,
) -> Option<TransmissionConfig> {
    let file = file.unwrap_or_default();
    let url = env.transmission_url.clone().or(file.url)?;
    Some(TransmissionConfig {
        url,
        username: env.transmission_username.clone().or(file.username),
        password: env.transmission_password.clone().or(file.password),
    })
}

#[derive(Debug, Default)]
struct ConfigPathSource {
    explicit: Option<PathBuf>,
    env: Option<PathBuf>,
    default: Option<PathBuf>,
}

impl ConfigPathSource {
    fn resolved_path(&self) -> Option<(PathBuf, ConfigPathProvenance)> {
        if let Some(path) = &self.explicit {
            return Some((path.clone(), ConfigPathProvenance::Explicit));
        }
        if let Some(path) = &self.env {
            return Some((path.clone(), ConfigPathProvenance::Env));
        }
        if let Some(path) = &self.default {
            return Some((path.clone(), ConfigPathProvenance::Default));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigPathProvenance {
    Explicit,
    Env,
    Default,
}

impl ConfigPathProvenance {
    fn must_exist(self) -> bool {
        matches!(
            self,
            ConfigPathProvenance::Explicit | ConfigPathProvenance::Env
        )
    }
}
