use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub synth: SynthConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthConfig {
    pub pretty_output: bool,
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_secondary_indexes: usize,
    pub max_tables: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("SYNTH_PRETTY_OUTPUT") {
            self.synth.pretty_output = v.parse().unwrap_or(self.synth.pretty_output);
        }
        if let Ok(v) = env::var("SYNTH_OUTPUT_DIR") {
            self.synth.output_dir = v;
        }
        if let Ok(v) = env::var("LIMITS_MAX_SECONDARY_INDEXES") {
            self.limits.max_secondary_indexes =
                v.parse().unwrap_or(self.limits.max_secondary_indexes);
        }
        if let Ok(v) = env::var("LIMITS_MAX_TABLES") {
            self.limits.max_tables = v.parse().unwrap_or(self.limits.max_tables);
        }
        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            synth: SynthConfig {
                pretty_output: true,
                output_dir: "synth.out".to_string(),
            },
            limits: LimitsConfig {
                max_secondary_indexes: 20,
                max_tables: 50,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            synth: SynthConfig {
                pretty_output: true,
                output_dir: "synth.out".to_string(),
            },
            limits: LimitsConfig {
                max_secondary_indexes: 20,
                max_tables: 100,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            synth: SynthConfig {
                pretty_output: false,
                output_dir: "synth.out".to_string(),
            },
            limits: LimitsConfig {
                max_secondary_indexes: 20,
                max_tables: 200,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
