use serde::{Deserialize, Serialize};

/// Configuration for the pairing module (`modules.pairing` in the app config)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PairingConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// How long unmatch and shared-entity writers wait for the couple lock.
    #[serde(default = "default_lock_max_wait_ms")]
    pub lock_max_wait_ms: u64,
    #[serde(default)]
    pub lock_backend: LockBackend,
    /// Deadline applied to operator commands; `None` means no deadline.
    #[serde(default)]
    pub op_timeout_ms: Option<u64>,
}

/// Where the per-couple locks live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockBackend {
    /// In-process table; only correct with a single service instance.
    Local,
    /// Advisory locks in the database, shared by every instance.
    #[default]
    Database,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            max_message_length: default_max_message_length(),
            lock_max_wait_ms: default_lock_max_wait_ms(),
            lock_backend: LockBackend::default(),
            op_timeout_ms: None,
        }
    }
}

fn default_page_size() -> u32 {
    20
}

fn default_max_page_size() -> u32 {
    100
}

fn default_max_message_length() -> usize {
    500
}

fn default_lock_max_wait_ms() -> u64 {
    5000
}
