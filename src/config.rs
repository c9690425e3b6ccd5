//! Configuration management for toolscope
//!
//! This module handles discovering, loading, and validating the server
//! configuration file. Raw YAML entries are structurally ambiguous (a
//! server block may carry a `command` or a `url`); validation resolves
//! each entry into an explicit [`ServerDescriptor`] sum at load time,
//! rejecting contradictory or empty shapes before any transport is
//! constructed. `${VAR}` environment interpolation is applied to all
//! string values during loading, so downstream consumers see final
//! values only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, ToolscopeError};
use crate::retry::RetryPolicy;

/// Environment variable naming an explicit config file path.
pub const CONFIG_PATH_ENV: &str = "TOOLSCOPE_CONFIG";

/// Config file name looked up in the working directory and in the user
/// config directory.
pub const CONFIG_FILE_NAME: &str = "toolscope.yaml";

fn default_timeout_ms() -> u64 {
    30_000
}

/// How to reach one configured server.
///
/// Produced by validation from the raw YAML shape; exactly one variant is
/// ever constructed per entry. Immutable once built and shared read-only
/// across connection attempts.
#[derive(Debug, Clone)]
pub enum ServerDescriptor {
    /// Local child process speaking newline-delimited JSON over stdio.
    Stdio {
        /// Path to the server executable.
        command: PathBuf,
        /// Command-line arguments, in order.
        args: Vec<String>,
        /// Environment overlay merged over the ambient environment at
        /// spawn time; these entries win on key collision.
        env: HashMap<String, String>,
        /// Optional working directory for the child process.
        cwd: Option<PathBuf>,
    },
    /// Remote server reached over streamable HTTP.
    Http {
        /// The server endpoint, parsed eagerly at load time.
        url: url::Url,
        /// Extra headers attached to every request (auth tokens go here).
        headers: HashMap<String, String>,
        /// Optional per-request timeout override in milliseconds.
        timeout_ms: Option<u64>,
    },
}

/// Raw per-server YAML shape before structural validation.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawServerConfig {
    /// Executable path (stdio variant).
    command: Option<String>,
    /// Command-line arguments (stdio variant).
    #[serde(default)]
    args: Vec<String>,
    /// Environment overlay (stdio variant).
    #[serde(default)]
    env: HashMap<String, String>,
    /// Working directory (stdio variant).
    cwd: Option<String>,
    /// Endpoint URL (http variant).
    url: Option<String>,
    /// Extra request headers (http variant).
    #[serde(default)]
    headers: HashMap<String, String>,
    /// Per-request timeout override in milliseconds (http variant).
    timeout_ms: Option<u64>,
}

/// Top-level raw config file shape.
///
/// `servers` is kept as a [`serde_yaml::Mapping`] so the original file
/// order survives deserialization; enumeration output is reported in
/// configuration order.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    servers: serde_yaml::Mapping,
    #[serde(default)]
    retry: RetryPolicy,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
}

/// Validated application configuration.
///
/// Holds the server descriptors in file order, the retry policy, the
/// request timeout, and a snapshot of the ambient process environment
/// (captured once at load time and passed explicitly into transport
/// construction).
#[derive(Debug)]
pub struct Config {
    servers: Vec<(String, ServerDescriptor)>,
    /// Retry policy applied to connect, discovery, and invocation.
    pub retry: RetryPolicy,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Snapshot of the process environment at load time.
    pub ambient_env: HashMap<String, String>,
}

impl Config {
    /// Locate and load the configuration file.
    ///
    /// Lookup order: the explicit path argument, the
    /// [`CONFIG_PATH_ENV`] environment variable, `./toolscope.yaml`,
    /// then `<user config dir>/toolscope/toolscope.yaml`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolscopeError::Config`] if no file is found, the YAML
    /// is malformed, interpolation references an undefined variable, or
    /// any server entry fails structural validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let ambient_env: HashMap<String, String> = std::env::vars().collect();
        let path = Self::discover(explicit, &ambient_env)?;
        tracing::debug!("loading configuration from {}", path.display());
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            ToolscopeError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&contents, ambient_env)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// Exposed for tests and embedding; [`Config::load`] is the normal
    /// entry point.
    ///
    /// # Errors
    ///
    /// Same contract as [`Config::load`], minus file discovery.
    pub fn parse(yaml: &str, ambient_env: HashMap<String, String>) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(yaml)?;

        let mut servers = Vec::with_capacity(raw.servers.len());
        for (key, value) in raw.servers {
            let name = key.as_str().ok_or_else(|| {
                ToolscopeError::Config(format!("server name must be a string, got: {key:?}"))
            })?;
            let entry: RawServerConfig = serde_yaml::from_value(value).map_err(|e| {
                ToolscopeError::Config(format!("server `{name}`: {e}"))
            })?;
            let descriptor = validate_server(name, entry, &ambient_env)?;
            servers.push((name.to_string(), descriptor));
        }

        Ok(Self {
            servers,
            retry: raw.retry,
            timeout_ms: raw.timeout_ms,
            ambient_env,
        })
    }

    /// Server names in configuration order.
    pub fn server_names(&self) -> Vec<&str> {
        self.servers.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Iterate `(name, descriptor)` pairs in configuration order.
    pub fn servers(&self) -> impl Iterator<Item = (&str, &ServerDescriptor)> {
        self.servers.iter().map(|(n, d)| (n.as_str(), d))
    }

    /// Look up a server descriptor by name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolscopeError::UnknownServer`] carrying the requested
    /// name and the sorted list of known names.
    pub fn descriptor(&self, name: &str) -> Result<&ServerDescriptor> {
        self.servers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
            .ok_or_else(|| {
                let mut known: Vec<String> =
                    self.servers.iter().map(|(n, _)| n.clone()).collect();
                known.sort();
                ToolscopeError::UnknownServer {
                    name: name.to_string(),
                    known,
                }
                .into()
            })
    }

    fn discover(explicit: Option<&Path>, env: &HashMap<String, String>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = env.get(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Ok(local);
        }
        if let Some(dirs) = directories::ProjectDirs::from("", "", "toolscope") {
            let user = dirs.config_dir().join(CONFIG_FILE_NAME);
            if user.exists() {
                return Ok(user);
            }
        }
        Err(ToolscopeError::Config(format!(
            "no configuration file found; create ./{CONFIG_FILE_NAME} or set {CONFIG_PATH_ENV}"
        ))
        .into())
    }
}

/// Resolve one raw server entry into a [`ServerDescriptor`].
///
/// An entry must carry exactly one of `command` or `url`; both or
/// neither is a configuration defect reported before any transport
/// exists. HTTP URLs are parsed eagerly here so a malformed URL is a
/// fatal configuration error rather than a retried connect failure.
fn validate_server(
    name: &str,
    raw: RawServerConfig,
    env: &HashMap<String, String>,
) -> Result<ServerDescriptor> {
    match (&raw.command, &raw.url) {
        (Some(_), Some(_)) => Err(ToolscopeError::Config(format!(
            "server `{name}` specifies both `command` and `url`; pick one"
        ))
        .into()),
        (None, None) => Err(ToolscopeError::Config(format!(
            "server `{name}` specifies neither `command` nor `url`"
        ))
        .into()),
        (Some(command), None) => {
            let command = PathBuf::from(interpolate(command, env, name)?);
            let args = raw
                .args
                .iter()
                .map(|a| interpolate(a, env, name))
                .collect::<Result<Vec<_>>>()?;
            let env_overlay = raw
                .env
                .iter()
                .map(|(k, v)| Ok((k.clone(), interpolate(v, env, name)?)))
                .collect::<Result<HashMap<_, _>>>()?;
            let cwd = raw
                .cwd
                .as_deref()
                .map(|c| interpolate(c, env, name).map(PathBuf::from))
                .transpose()?;
            Ok(ServerDescriptor::Stdio {
                command,
                args,
                env: env_overlay,
                cwd,
            })
        }
        (None, Some(url)) => {
            let url_str = interpolate(url, env, name)?;
            let url = url::Url::parse(&url_str).map_err(|e| {
                ToolscopeError::Config(format!("server `{name}`: invalid URL `{url_str}`: {e}"))
            })?;
            let headers = raw
                .headers
                .iter()
                .map(|(k, v)| Ok((k.clone(), interpolate(v, env, name)?)))
                .collect::<Result<HashMap<_, _>>>()?;
            Ok(ServerDescriptor::Http {
                url,
                headers,
                timeout_ms: raw.timeout_ms,
            })
        }
    }
}

/// Substitute `${VAR}` references from the ambient environment.
///
/// An undefined variable is a configuration error naming the variable
/// and the server entry it appears in. A `$` not followed by `{` passes
/// through literally.
fn interpolate(input: &str, env: &HashMap<String, String>, server: &str) -> Result<String> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(ToolscopeError::Config(format!(
                "server `{server}`: unterminated `${{` in `{input}`"
            ))
            .into());
        };
        let var = &after[..end];
        let value = env.get(var).ok_or_else(|| {
            ToolscopeError::Config(format!(
                "server `{server}`: undefined environment variable `{var}` in `{input}`"
            ))
        })?;
        output.push_str(value);
        rest = &after[end + 1..];
    }
    output.push_str(rest);

    Ok(output)
}
