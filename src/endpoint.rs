// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection settings of a Modbus TCP server.

use core::{fmt, str::FromStr};

use crate::frame::{DEFAULT_PORT, DEFAULT_UNIT_ID, UnitId};

/// The address of a Modbus TCP server and the unit to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP port, `502` by default.
    #[cfg_attr(feature = "serde", serde(default = "default_port"))]
    pub port: u16,
    /// Unit (slave) identifier, `1` by default.
    #[cfg_attr(feature = "serde", serde(default = "default_unit_id"))]
    pub unit_id: UnitId,
}

#[cfg(feature = "serde")]
const fn default_port() -> u16 {
    DEFAULT_PORT
}

#[cfg(feature = "serde")]
const fn default_unit_id() -> UnitId {
    DEFAULT_UNIT_ID
}

impl Endpoint {
    /// Create an endpoint for `host` with the default port and unit id.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            unit_id: DEFAULT_UNIT_ID,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_unit_id(mut self, unit_id: UnitId) -> Self {
        self.unit_id = unit_id;
        self
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("127.0.0.1")
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Error returned when parsing an [`Endpoint`] fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid endpoint: {0}")]
pub struct ParseEndpointError(String);

impl FromStr for Endpoint {
    type Err = ParseEndpointError;

    /// Parse `host`, `host:port`, `[v6]` or `[v6]:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ParseEndpointError(s.to_owned());
        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, rest) = rest.split_once(']').ok_or_else(invalid)?;
            match rest {
                "" => (host, None),
                _ => (host, Some(rest.strip_prefix(':').ok_or_else(invalid)?)),
            }
        } else {
            match s.rsplit_once(':') {
                Some((host, _)) if host.contains(':') => (s, None),
                Some((host, port)) => (host, Some(port)),
                None => (s, None),
            }
        };
        if host.is_empty() {
            return Err(invalid());
        }
        let mut endpoint = Self::new(host);
        if let Some(port) = port {
            endpoint.port = port.parse().map_err(|_| invalid())?;
        }
        Ok(endpoint)
    }
}
