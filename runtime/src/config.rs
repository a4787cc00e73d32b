//! Runtime configuration (loaded from env vars)

use crate::error::ConfigError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Sampling cadence for the load sampler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerConfig {
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            interval: Duration::from_secs(3),
        }
    }
}

impl SamplerConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::try_from_env().unwrap_or_default()
    }

    pub fn try_from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            initial_delay: Duration::from_millis(env_or(
                "LOADPOOL_SAMPLE_INITIAL_DELAY_MS",
                defaults.initial_delay.as_millis() as u64,
            )?),
            interval: Duration::from_millis(env_or(
                "LOADPOOL_SAMPLE_INTERVAL_MS",
                defaults.interval.as_millis() as u64,
            )?),
        })
    }
}

/// Pool sizing limits and worker naming
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizerConfig {
    /// Upper bound for pools requested without load scaling
    pub default_threshold: usize,
    /// Capacity score units per unit of worker multiplier
    pub load_divisor: u32,
    /// Hard cap for load-scaled pools
    pub max_pool_size: usize,
    /// Bound of each pool's task queue
    pub queue_capacity: usize,
    pub thread_prefix: String,
}

impl Default for SizerConfig {
    fn default() -> Self {
        Self {
            default_threshold: 4,
            load_divisor: 1000,
            max_pool_size: 64,
            queue_capacity: 256,
            thread_prefix: "loadpool".to_string(),
        }
    }
}

impl SizerConfig {
    pub fn from_env() -> Self {
        Self::try_from_env().unwrap_or_default()
    }

    pub fn try_from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let load_divisor: u32 = env_or("LOADPOOL_LOAD_DIVISOR", defaults.load_divisor)?;
        if load_divisor == 0 {
            return Err(ConfigError::Invalid {
                var: "LOADPOOL_LOAD_DIVISOR",
                value: "0".to_string(),
            });
        }
        let max_pool_size: usize = env_or("LOADPOOL_MAX_POOL_SIZE", defaults.max_pool_size)?;
        if max_pool_size == 0 {
            return Err(ConfigError::Invalid {
                var: "LOADPOOL_MAX_POOL_SIZE",
                value: "0".to_string(),
            });
        }
        let default_threshold: usize =
            env_or("LOADPOOL_DEFAULT_THRESHOLD", defaults.default_threshold)?;
        if default_threshold == 0 {
            return Err(ConfigError::Invalid {
                var: "LOADPOOL_DEFAULT_THRESHOLD",
                value: "0".to_string(),
            });
        }
        Ok(Self {
            default_threshold,
            load_divisor,
            max_pool_size,
            queue_capacity: env_or("LOADPOOL_QUEUE_CAPACITY", defaults.queue_capacity)?.max(1),
            thread_prefix: env::var("LOADPOOL_THREAD_PREFIX")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.thread_prefix),
        })
    }

    pub fn with_max_pool_size(mut self, max: usize) -> Self {
        self.max_pool_size = max.max(1);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_thread_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_prefix = prefix.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { capacity: 10 }
    }
}

impl ChannelConfig {
    pub fn from_env() -> Self {
        Self::try_from_env().unwrap_or_default()
    }

    pub fn try_from_env() -> Result<Self, ConfigError> {
        let capacity: usize = env_or("LOADPOOL_CHANNEL_CAPACITY", Self::default().capacity)?;
        if capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "LOADPOOL_CHANNEL_CAPACITY",
                value: "0".to_string(),
            });
        }
        Ok(Self { capacity })
    }
}

fn env_or<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) if raw.trim().is_empty() => Ok(default),
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        Err(_) => Ok(default),
    }
}
