//! Static catalog of supported database engines and companion tools.
//!
//! Entries are `const` data: they are defined once and never change while
//! the process runs.

use std::fmt;
use std::str::FromStr;

use crate::constants::{CONTAINER_SUFFIX, VOLUME_SUFFIX};
use crate::error::ContainDbError;

/// Credential a database engine needs at first start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialField {
    /// Administrative username.
    Username,
    /// Administrative password.
    Password,
}

/// Binds a credential field to the environment variable the image reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialBinding {
    /// Which credential.
    pub field: CredentialField,
    /// Environment variable receiving the value.
    pub env: &'static str,
}

/// Supported database kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceKind {
    /// `MongoDB`.
    MongoDb,
    /// Redis.
    Redis,
    /// `MySQL`.
    MySql,
    /// `PostgreSQL`.
    PostgreSql,
    /// `MariaDB`.
    MariaDb,
    /// `AxioDB`.
    AxioDb,
}

/// Catalog entry for a database kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSpec {
    /// Kind this entry describes.
    pub kind: ServiceKind,
    /// Canonical image reference.
    pub image: &'static str,
    /// Port the engine listens on inside the container.
    pub port: u16,
    /// Data directory inside the container.
    pub data_path: &'static str,
    /// Credentials required at first start.
    pub credentials: &'static [CredentialBinding],
}

const PASSWORD_ONLY_MYSQL: &[CredentialBinding] = &[CredentialBinding {
    field: CredentialField::Password,
    env: "MYSQL_ROOT_PASSWORD",
}];

const POSTGRES_CREDENTIALS: &[CredentialBinding] = &[
    CredentialBinding {
        field: CredentialField::Password,
        env: "POSTGRES_PASSWORD",
    },
    CredentialBinding {
        field: CredentialField::Username,
        env: "POSTGRES_USER",
    },
];

const PASSWORD_ONLY_MARIADB: &[CredentialBinding] = &[CredentialBinding {
    field: CredentialField::Password,
    env: "MARIADB_ROOT_PASSWORD",
}];

const SERVICES: [ServiceSpec; 6] = [
    ServiceSpec {
        kind: ServiceKind::MongoDb,
        image: "mongo",
        port: 27017,
        data_path: "/data/db",
        credentials: &[],
    },
    ServiceSpec {
        kind: ServiceKind::Redis,
        image: "redis",
        port: 6379,
        data_path: "/data",
        credentials: &[],
    },
    ServiceSpec {
        kind: ServiceKind::MySql,
        image: "mysql",
        port: 3306,
        data_path: "/var/lib/mysql",
        credentials: PASSWORD_ONLY_MYSQL,
    },
    ServiceSpec {
        kind: ServiceKind::PostgreSql,
        image: "postgres",
        port: 5432,
        data_path: "/var/lib/postgresql/data",
        credentials: POSTGRES_CREDENTIALS,
    },
    ServiceSpec {
        kind: ServiceKind::MariaDb,
        image: "mariadb",
        port: 3306,
        data_path: "/var/lib/mysql",
        credentials: PASSWORD_ONLY_MARIADB,
    },
    ServiceSpec {
        kind: ServiceKind::AxioDb,
        image: "theankansaha/axiodb",
        port: 27018,
        data_path: "/app/AxioDB",
        credentials: &[],
    },
];

impl ServiceKind {
    /// Every supported kind, in menu order.
    pub const ALL: [Self; 6] = [
        Self::MongoDb,
        Self::Redis,
        Self::MySql,
        Self::PostgreSql,
        Self::MariaDb,
        Self::AxioDb,
    ];

    /// Stable lowercase identifier used in resource names.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::MongoDb => "mongodb",
            Self::Redis => "redis",
            Self::MySql => "mysql",
            Self::PostgreSql => "postgresql",
            Self::MariaDb => "mariadb",
            Self::AxioDb => "axiodb",
        }
    }

    /// Returns the catalog entry for this kind.
    #[must_use]
    pub const fn spec(self) -> &'static ServiceSpec {
        match self {
            Self::MongoDb => &SERVICES[0],
            Self::Redis => &SERVICES[1],
            Self::MySql => &SERVICES[2],
            Self::PostgreSql => &SERVICES[3],
            Self::MariaDb => &SERVICES[4],
            Self::AxioDb => &SERVICES[5],
        }
    }

    /// Container name for this kind (`redis-container`).
    #[must_use]
    pub fn container_name(self) -> String {
        format!("{}{CONTAINER_SUFFIX}", self.id())
    }

    /// Canonical volume name for this kind (`redis-data`).
    #[must_use]
    pub fn volume_name(self) -> String {
        format!("{}{VOLUME_SUFFIX}", self.id())
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ServiceKind {
    type Err = ContainDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ContainDbError::NotFound {
                kind: "database kind",
                id: s.to_string(),
            })
    }
}

/// Returns the canonical images of every database kind.
#[must_use]
pub fn database_images() -> Vec<&'static str> {
    SERVICES.iter().map(|s| s.image).collect()
}

/// Returns the canonical volume names of every database kind.
#[must_use]
pub fn canonical_volumes() -> Vec<String> {
    ServiceKind::ALL.iter().map(|k| k.volume_name()).collect()
}

/// Companion administration tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// phpMyAdmin for `MySQL`/`MariaDB`.
    PhpMyAdmin,
    /// pgAdmin for `PostgreSQL`.
    PgAdmin,
    /// `RedisInsight` for Redis.
    RedisInsight,
}

/// Catalog entry for a companion tool container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    /// Tool kind.
    pub kind: ToolKind,
    /// Fixed container name.
    pub container: &'static str,
    /// Image reference.
    pub image: &'static str,
    /// Port the tool serves on inside the container.
    pub container_port: u16,
    /// Suggested host port.
    pub default_host_port: u16,
    /// Database kinds the tool can be linked to.
    pub targets: &'static [ServiceKind],
    /// Environment variable receiving the linked database host, if any.
    pub link_env: Option<&'static str>,
    /// Login credentials the tool itself requires, as (env, label) pairs.
    pub login: &'static [(&'static str, &'static str)],
}

const TOOLS: [ToolSpec; 3] = [
    ToolSpec {
        kind: ToolKind::PhpMyAdmin,
        container: "phpmyadmin",
        image: "phpmyadmin/phpmyadmin",
        container_port: 80,
        default_host_port: 8080,
        targets: &[ServiceKind::MySql, ServiceKind::MariaDb],
        link_env: Some("PMA_HOST"),
        login: &[],
    },
    ToolSpec {
        kind: ToolKind::PgAdmin,
        container: "pgadmin",
        image: "dpage/pgadmin4",
        container_port: 80,
        default_host_port: 5050,
        targets: &[ServiceKind::PostgreSql],
        link_env: None,
        login: &[
            ("PGADMIN_DEFAULT_EMAIL", "pgAdmin login email"),
            ("PGADMIN_DEFAULT_PASSWORD", "pgAdmin login password"),
        ],
    },
    ToolSpec {
        kind: ToolKind::RedisInsight,
        container: "redisinsight",
        image: "redis/redisinsight:latest",
        container_port: 5540,
        default_host_port: 8001,
        targets: &[ServiceKind::Redis],
        link_env: None,
        login: &[],
    },
];

impl ToolKind {
    /// Every companion tool, in menu order.
    pub const ALL: [Self; 3] = [Self::PhpMyAdmin, Self::PgAdmin, Self::RedisInsight];

    /// Returns the catalog entry for this tool.
    #[must_use]
    pub const fn spec(self) -> &'static ToolSpec {
        match self {
            Self::PhpMyAdmin => &TOOLS[0],
            Self::PgAdmin => &TOOLS[1],
            Self::RedisInsight => &TOOLS[2],
        }
    }

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PhpMyAdmin => "phpMyAdmin",
            Self::PgAdmin => "pgAdmin",
            Self::RedisInsight => "RedisInsight",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returns the images of every companion tool.
#[must_use]
pub fn tool_images() -> Vec<&'static str> {
    TOOLS.iter().map(|t| t.image).collect()
}
