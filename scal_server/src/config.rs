//! Server settings read from the environment.

use std::{env, net::SocketAddr, path::PathBuf};

use tracing::warn;

static LISTEN_VAR: &str = "SCAL_LISTEN";
static CACHE_DIR_VAR: &str = "SCAL_CACHE_DIR";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// The directory of downloaded society pages.
    pub cache_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_vars(env::var(LISTEN_VAR).ok(), env::var(CACHE_DIR_VAR).ok())
    }

    fn from_vars(listen: Option<String>, cache_dir: Option<String>) -> Self {
        let default_listen = SocketAddr::from(([0, 0, 0, 0], 8008));
        let listen = match listen {
            Some(listen) => listen.parse().unwrap_or_else(|err| {
                warn!(%listen, %err, "invalid listen address, using the default");
                default_listen
            }),
            None => default_listen,
        };
        Self {
            listen,
            cache_dir: PathBuf::from(cache_dir.unwrap_or_else(|| String::from("cache"))),
        }
    }
}
