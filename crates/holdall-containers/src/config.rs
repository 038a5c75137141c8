use serde::{Deserialize, Serialize};

use crate::keys::KeyPolicy;

/// Shape of the containers a store creates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    /// Keyed by contained id; merges concurrent changes at commit.
    #[default]
    Associative,
    /// Positional, append-only with holes.
    Sequential,
}

/// Who gets stamped as the creator of added objects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatorPolicy {
    #[default]
    Disabled,
    /// The store's configured owner.
    Owner,
    /// A fixed principal.
    Principal(String),
}

/// Severity used to report deletion of objects the store does not hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    #[default]
    Debug,
    Info,
    Warn,
    Error,
}

/// Configuration for a [`ContainerStore`](crate::ContainerStore).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Hold references to objects owned elsewhere instead of owning them.
    pub weak: bool,
    pub creator: CreatorPolicy,
    /// Name stamped by [`CreatorPolicy::Owner`].
    pub owner: Option<String>,
    /// Shape of containers created on first insert.
    pub container_kind: ContainerKind,
    /// Key comparison of the container-id map.
    pub container_keys: KeyPolicy,
    /// Whether the store may assign ids to objects that have none.
    pub set_ids: bool,
    pub missing_delete_level: LogLevel,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            weak: false,
            creator: CreatorPolicy::Disabled,
            owner: None,
            container_kind: ContainerKind::Associative,
            container_keys: KeyPolicy::Exact,
            set_ids: true,
            missing_delete_level: LogLevel::Debug,
        }
    }
}

impl StoreConfig {
    /// A store that references objects owned by another store.
    pub fn weak() -> Self {
        Self {
            weak: true,
            ..Default::default()
        }
    }

    pub fn with_container_kind(mut self, kind: ContainerKind) -> Self {
        self.container_kind = kind;
        self
    }

    pub fn with_container_keys(mut self, policy: KeyPolicy) -> Self {
        self.container_keys = policy;
        self
    }

    pub fn with_set_ids(mut self, set_ids: bool) -> Self {
        self.set_ids = set_ids;
        self
    }

    pub fn with_creator(mut self, creator: CreatorPolicy) -> Self {
        self.creator = creator;
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_missing_delete_level(mut self, level: LogLevel) -> Self {
        self.missing_delete_level = level;
        self
    }

    /// The creator to stamp on added objects, if any.
    pub fn creator_name(&self) -> Option<String> {
        match &self.creator {
            CreatorPolicy::Disabled => None,
            CreatorPolicy::Owner => self.owner.clone(),
            CreatorPolicy::Principal(name) => Some(name.clone()),
        }
    }
}
