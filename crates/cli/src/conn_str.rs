//! Connection strings.
//!
//! `SERVER=<host>;UID=<user>;PWD=<password>;CONNTYPE=<n>;PORT_NO=<port>`
//!
//! Keys are case-insensitive and may appear in any order. Missing keys take
//! their defaults. When formatted, the user and password are upper-cased.

use std::fmt;
use std::str::FromStr;

use veneer_executor::{Error, Result};

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default server port
pub const DEFAULT_PORT: u16 = 5656;
/// Default user
pub const DEFAULT_USER: &str = "sys";
/// Default password
pub const DEFAULT_PASSWORD: &str = "manager";
/// Default connection type (TCP)
pub const DEFAULT_CONN_TYPE: i32 = 1;

/// Parsed connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    /// Server host
    pub host: String,
    /// User name
    pub user: String,
    /// Password
    pub password: String,
    /// Connection type
    pub conn_type: i32,
    /// Server port
    pub port: u16,
}

impl Default for ConnectionString {
    fn default() -> Self {
        ConnectionString {
            host: DEFAULT_HOST.to_string(),
            user: DEFAULT_USER.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            conn_type: DEFAULT_CONN_TYPE,
            port: DEFAULT_PORT,
        }
    }
}

fn invalid(reason: String) -> Error {
    Error::InvalidInput {
        reason: format!("connection string: {}", reason),
    }
}

impl FromStr for ConnectionString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut conn = ConnectionString::default();
        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| invalid(format!("'{}' is not KEY=VALUE", part)))?;
            let value = value.trim();
            match key.trim().to_ascii_uppercase().as_str() {
                "SERVER" => conn.host = value.to_string(),
                "UID" => conn.user = value.to_string(),
                "PWD" => conn.password = value.to_string(),
                "CONNTYPE" => {
                    conn.conn_type = value
                        .parse()
                        .map_err(|_| invalid(format!("CONNTYPE '{}' is not a number", value)))?
                }
                "PORT_NO" => {
                    conn.port = value
                        .parse()
                        .map_err(|_| invalid(format!("PORT_NO '{}' is not a port", value)))?
                }
                other => return Err(invalid(format!("unknown key '{}'", other))),
            }
        }
        if conn.host.is_empty() {
            return Err(invalid("SERVER is empty".to_string()));
        }
        Ok(conn)
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SERVER={};UID={};PWD={};CONNTYPE={};PORT_NO={}",
            self.host,
            self.user.to_uppercase(),
            self.password.to_uppercase(),
            self.conn_type,
            self.port
        )
    }
}
