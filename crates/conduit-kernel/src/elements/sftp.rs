//! SFTP listing and download elements.
//!
//! Two single-responsibility elements sharing connection handling:
//!
//! - `SftpList` enumerates a remote path (optional glob and recursion) and
//!   yields metadata records — it never reads file content.
//! - `SftpDownload` takes a remote path string or an `SftpList` record and
//!   materializes the file per `download_mode` (`memory`, `temp`, `local`).
//!
//! libssh2 is synchronous, so each transfer runs on the blocking pool.

use std::net::TcpStream;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use conduit_types::{ConduitError, ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit, Params};
use crate::record::Record;
use crate::registry::Factory;

/// Connection settings captured from constructor parameters.
#[derive(Debug, Clone)]
struct SftpConfig {
    hostname: String,
    username: String,
    password: Option<String>,
    private_key_path: Option<String>,
    port: u16,
    timeout_secs: u64,
}

impl SftpConfig {
    fn from_params(params: &Params<'_>) -> ConduitResult<SftpConfig> {
        let config = SftpConfig {
            hostname: params.require_str("hostname")?,
            username: params.require_str("username")?,
            password: params.get_str("password"),
            private_key_path: params.get_str("private_key_path"),
            port: params.get_i64("port").unwrap_or(22) as u16,
            timeout_secs: params.get_i64("timeout").unwrap_or(30).max(1) as u64,
        };
        if config.password.is_none() && config.private_key_path.is_none() {
            return Err(ConduitError::ElementInit(
                "either password or private_key_path is required".into(),
            ));
        }
        Ok(config)
    }

    /// Open an authenticated session. Blocking; call from the blocking pool.
    fn connect(&self) -> ConduitResult<ssh2::Session> {
        let addr = format!("{}:{}", self.hostname, self.port);
        let stream = TcpStream::connect(&addr)
            .map_err(|e| ConduitError::Resource(format!("cannot reach {addr}: {e}")))?;

        let mut session = ssh2::Session::new()
            .map_err(|e| ConduitError::Resource(format!("ssh session: {e}")))?;
        session.set_timeout((self.timeout_secs * 1000) as u32);
        session.set_tcp_stream(stream);
        session
            .handshake()
            .map_err(|e| ConduitError::Resource(format!("ssh handshake with {addr}: {e}")))?;

        if let Some(key_path) = &self.private_key_path {
            session
                .userauth_pubkey_file(
                    &self.username,
                    None,
                    Path::new(key_path),
                    self.password.as_deref(),
                )
                .map_err(|e| ConduitError::Resource(format!("key auth failed: {e}")))?;
        } else if let Some(password) = &self.password {
            session
                .userauth_password(&self.username, password)
                .map_err(|e| ConduitError::Resource(format!("password auth failed: {e}")))?;
        }
        if !session.authenticated() {
            return Err(ConduitError::Resource(format!(
                "authentication with {addr} failed"
            )));
        }
        Ok(session)
    }
}

fn connection_params(spec: ElementSpec) -> ElementSpec {
    spec.param(ParamSchema::required("hostname", "string", "SFTP host"))
        .param(ParamSchema::required("username", "string", "Login user"))
        .param(ParamSchema::optional(
            "password",
            "string",
            Value::Null,
            "Password (or key passphrase)",
        ))
        .param(ParamSchema::optional(
            "private_key_path",
            "string",
            Value::Null,
            "Private key file",
        ))
        .param(ParamSchema::optional("port", "int", json!(22), "SSH port"))
        .param(ParamSchema::optional(
            "timeout",
            "int",
            json!(30),
            "Socket timeout in seconds",
        ))
}

// ============================================================
// SftpList
// ============================================================

pub(super) fn list_spec() -> ElementSpec {
    connection_params(ElementSpec::new(
        "conduit.SftpList",
        "List a remote path, yielding metadata records",
    ))
    .field(FieldSchema::required(
        "remote_path",
        "string",
        "Remote directory or file to list",
    ))
    .field(FieldSchema::optional(
        "glob_pattern",
        "string",
        "Glob matched against file names",
    ))
    .field(FieldSchema::optional("recursive", "bool", "Descend into subdirectories"))
    .field(FieldSchema::optional("list_dirs", "bool", "Include directories"))
}

pub(super) fn list_factory() -> Factory {
    Box::new(|params, _ctx| {
        Ok(Box::new(SftpList {
            config: SftpConfig::from_params(params)?,
        }))
    })
}

struct SftpList {
    config: SftpConfig,
}

fn stat_record(path: &Path, stat: &ssh2::FileStat) -> Value {
    json!({
        "remote_path": path.to_string_lossy(),
        "filename": path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
        "size": stat.size,
        "mtime": stat.mtime,
        "is_dir": stat.is_dir(),
    })
}

fn list_dir(
    sftp: &ssh2::Sftp,
    dir: &Path,
    pattern: Option<&glob::Pattern>,
    recursive: bool,
    list_dirs: bool,
    out: &mut Vec<Value>,
) -> ConduitResult<()> {
    let entries = sftp
        .readdir(dir)
        .map_err(|e| ConduitError::Resource(format!("readdir {}: {e}", dir.display())))?;
    for (path, stat) in entries {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let matches = pattern.map_or(true, |p| p.matches(&name));
        if stat.is_dir() {
            if list_dirs && matches {
                out.push(stat_record(&path, &stat));
            }
            if recursive {
                list_dir(sftp, &path, pattern, recursive, list_dirs, out)?;
            }
        } else if matches {
            out.push(stat_record(&path, &stat));
        }
    }
    Ok(())
}

#[async_trait]
impl Element for SftpList {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        let remote_path = record.require_str("remote_path")?;
        let pattern = record
            .get_str("glob_pattern")
            .map(|p| {
                glob::Pattern::new(&p)
                    .map_err(|e| ConduitError::Item(format!("invalid pattern '{p}': {e}")))
            })
            .transpose()?;
        let recursive = record.get_bool("recursive").unwrap_or(false);
        let list_dirs = record.get_bool("list_dirs").unwrap_or(false);
        let config = self.config.clone();

        let entries = tokio::task::spawn_blocking(move || -> ConduitResult<Vec<Value>> {
            let session = config.connect()?;
            let sftp = session
                .sftp()
                .map_err(|e| ConduitError::Resource(format!("sftp channel: {e}")))?;
            let root = PathBuf::from(&remote_path);

            // A file path lists just that file.
            let stat = sftp
                .stat(&root)
                .map_err(|e| ConduitError::Resource(format!("stat {remote_path}: {e}")))?;
            let mut out = Vec::new();
            if stat.is_dir() {
                list_dir(&sftp, &root, pattern.as_ref(), recursive, list_dirs, &mut out)?;
            } else {
                out.push(stat_record(&root, &stat));
            }
            Ok(out)
        })
        .await
        .map_err(|e| ConduitError::Internal(format!("sftp task: {e}")))??;

        Ok(Emit::Many(entries))
    }
}

// ============================================================
// SftpDownload
// ============================================================

pub(super) fn download_spec() -> ElementSpec {
    connection_params(ElementSpec::new(
        "conduit.SftpDownload",
        "Download a remote file per item",
    ))
    .param(ParamSchema::optional(
        "download_mode",
        "string",
        json!("memory"),
        "memory | temp | local",
    ))
    .param(ParamSchema::optional(
        "local_dir",
        "string",
        json!("."),
        "Target directory for local mode",
    ))
    .field(FieldSchema::optional(
        "input",
        "any",
        "Remote path string, or an SftpList record",
    ))
}

pub(super) fn download_factory() -> Factory {
    Box::new(|params, _ctx| {
        let mode = params
            .get_str("download_mode")
            .unwrap_or_else(|| "memory".to_string());
        if !matches!(mode.as_str(), "memory" | "temp" | "local") {
            return Err(ConduitError::ElementInit(format!(
                "unsupported download_mode '{mode}'"
            )));
        }
        Ok(Box::new(SftpDownload {
            config: SftpConfig::from_params(params)?,
            mode,
            local_dir: params.get_str("local_dir").unwrap_or_else(|| ".".to_string()),
        }))
    })
}

struct SftpDownload {
    config: SftpConfig,
    mode: String,
    local_dir: String,
}

/// Remote path out of a string item or an SftpList-shaped record.
fn remote_path_of(input: &Value) -> ConduitResult<String> {
    match input {
        Value::String(s) => Ok(s.clone()),
        Value::Object(map) => map
            .get("remote_path")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ConduitError::Item("record has no 'remote_path'".into())),
        other => Err(ConduitError::Item(format!(
            "unsupported SftpDownload input: {other}"
        ))),
    }
}

#[async_trait]
impl Element for SftpDownload {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        let input = record.require("input")?;
        let remote_path = remote_path_of(input)?;
        let config = self.config.clone();
        let mode = self.mode.clone();
        let local_dir = self.local_dir.clone();

        let result = tokio::task::spawn_blocking(move || -> ConduitResult<Value> {
            use std::io::Read;

            let session = config.connect()?;
            let sftp = session
                .sftp()
                .map_err(|e| ConduitError::Resource(format!("sftp channel: {e}")))?;
            let mut remote = sftp
                .open(Path::new(&remote_path))
                .map_err(|e| ConduitError::Resource(format!("open {remote_path}: {e}")))?;
            let mut content = Vec::new();
            remote
                .read_to_end(&mut content)
                .map_err(|e| ConduitError::Resource(format!("read {remote_path}: {e}")))?;

            match mode.as_str() {
                "memory" => Ok(json!({
                    "remote_path": remote_path,
                    "content": String::from_utf8_lossy(&content),
                })),
                "temp" => {
                    let file = tempfile::NamedTempFile::new()
                        .map_err(|e| ConduitError::Resource(e.to_string()))?;
                    std::fs::write(file.path(), &content)
                        .map_err(|e| ConduitError::Resource(e.to_string()))?;
                    // Keep the file; the pipeline owns its lifetime now.
                    let (_, path) = file
                        .keep()
                        .map_err(|e| ConduitError::Resource(e.to_string()))?;
                    Ok(json!({
                        "remote_path": remote_path,
                        "local_path": path.to_string_lossy(),
                    }))
                }
                _ => {
                    let name = Path::new(&remote_path)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "download".to_string());
                    let target = Path::new(&local_dir).join(name);
                    std::fs::create_dir_all(&local_dir)
                        .map_err(|e| ConduitError::Resource(e.to_string()))?;
                    std::fs::write(&target, &content)
                        .map_err(|e| ConduitError::Resource(e.to_string()))?;
                    Ok(json!({
                        "remote_path": remote_path,
                        "local_path": target.to_string_lossy(),
                    }))
                }
            }
        })
        .await
        .map_err(|e| ConduitError::Internal(format!("sftp task: {e}")))??;

        Ok(Emit::One(result))
    }
}
