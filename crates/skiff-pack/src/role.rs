//! Roles and environments.
//!
//! A package participates in a bundle in one of two roles: its production
//! incarnation (`use`) or its test incarnation (`test`). Every emitted
//! artifact targets one of two environments: `client` or `server`.
//!
//! Per-(role, environment) package data is stored in the fixed-size
//! [`PerRole`] / [`PerEnv`] wrappers rather than nested maps, so lookups
//! are plain array indexing and iteration order is fixed.

use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// The incarnation of a package within a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Production code of the package.
    Use,
    /// The package's own tests.
    Test,
}

impl Role {
    /// Both roles, in fixed iteration order.
    pub const ALL: [Role; 2] = [Role::Use, Role::Test];

    fn index(self) -> usize {
        match self {
            Role::Use => 0,
            Role::Test => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Use => "use",
            Role::Test => "test",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resource will execute or be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    Client,
    Server,
}

impl Env {
    /// Both environments, in fixed iteration order.
    pub const ALL: [Env; 2] = [Env::Client, Env::Server];

    fn index(self) -> usize {
        match self {
            Env::Client => 0,
            Env::Server => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Env::Client => "client",
            Env::Server => "server",
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Env {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Env::Client),
            "server" => Ok(Env::Server),
            other => Err(format!("unknown environment: '{other}'")),
        }
    }
}

/// Per-role storage: one `T` for each [`Role`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerRole<T>([T; 2]);

impl<T> PerRole<T> {
    pub fn new(use_value: T, test_value: T) -> Self {
        Self([use_value, test_value])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &T)> {
        Role::ALL.iter().map(move |&role| (role, &self[role]))
    }
}

impl<T> Index<Role> for PerRole<T> {
    type Output = T;

    fn index(&self, role: Role) -> &T {
        &self.0[role.index()]
    }
}

impl<T> IndexMut<Role> for PerRole<T> {
    fn index_mut(&mut self, role: Role) -> &mut T {
        &mut self.0[role.index()]
    }
}

/// Per-environment storage: one `T` for each [`Env`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerEnv<T>([T; 2]);

impl<T> PerEnv<T> {
    pub fn new(client_value: T, server_value: T) -> Self {
        Self([client_value, server_value])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Env, &T)> {
        Env::ALL.iter().map(move |&env| (env, &self[env]))
    }
}

impl<T> Index<Env> for PerEnv<T> {
    type Output = T;

    fn index(&self, env: Env) -> &T {
        &self.0[env.index()]
    }
}

impl<T> IndexMut<Env> for PerEnv<T> {
    fn index_mut(&mut self, env: Env) -> &mut T {
        &mut self.0[env.index()]
    }
}
