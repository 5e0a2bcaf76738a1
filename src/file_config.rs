//! INI configuration for the forward client.
//!
//! Reads a `[forward]` section with the `rust-ini` crate and turns it into a
//! [`ForwardClientBuilder`]:
//!
//! ```ini
//! [forward]
//! host = logs.example.com
//! port = 24224
//! transport = tls
//! ca_file = /etc/fluent/ca.pem
//! connect_timeout_ms = 1000
//! buffer_size = 256
//! tls_policy = persistent
//! warn_interval_ms = 5000
//! ```
//!
//! A relative `ca_file` is resolved against the directory of the INI file.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};

use ini::{Ini, Properties};

use crate::forward::{BuildError, ForwardClientBuilder, TlsSessionPolicy};

/// Section holding the client settings.
pub const FORWARD_SECTION: &str = "forward";

const KNOWN_KEYS: &[&str] = &[
    "host",
    "port",
    "transport",
    "ca_file",
    "connect_timeout_ms",
    "buffer_size",
    "tls_policy",
    "warn_interval_ms",
];

/// Load a builder from the INI file at `path`.
pub fn builder_from_ini_file(path: impl AsRef<Path>) -> Result<ForwardClientBuilder, BuildError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => {
            BuildError::InvalidConfig(format!("{} doesn't exist", path.display()))
        }
        _ => BuildError::Io(err),
    })?;
    if text.trim().is_empty() {
        return Err(BuildError::InvalidConfig(format!(
            "{} is an empty file",
            path.display()
        )));
    }
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    parse_forward_section(&text, &base)
}

/// Load a builder from INI text. Relative CA paths resolve against the
/// current directory.
pub fn builder_from_ini_str(text: &str) -> Result<ForwardClientBuilder, BuildError> {
    parse_forward_section(text, Path::new(""))
}

fn parse_forward_section(text: &str, base: &Path) -> Result<ForwardClientBuilder, BuildError> {
    let ini = Ini::load_from_str(text)
        .map_err(|err| BuildError::InvalidConfig(format!("invalid ini: {err}")))?;
    let section = ini.section(Some(FORWARD_SECTION)).ok_or_else(|| {
        BuildError::InvalidConfig(format!("missing [{FORWARD_SECTION}] section"))
    })?;
    reject_unknown_keys(section)?;

    let host = section
        .get("host")
        .ok_or_else(|| BuildError::InvalidConfig("host is required".into()))?;
    let mut builder = ForwardClientBuilder::new().with_host(host);
    if let Some(port) = parse_value::<u16>(section, "port")? {
        builder = builder.with_port(port);
    }
    if let Some(timeout) = parse_value::<u64>(section, "connect_timeout_ms")? {
        builder = builder.with_connect_timeout_ms(timeout);
    }
    if let Some(size) = parse_value::<usize>(section, "buffer_size")? {
        builder = builder.with_buffer_size(size);
    }
    if let Some(interval) = parse_value::<u64>(section, "warn_interval_ms")? {
        builder = builder.with_warn_interval_ms(interval);
    }
    builder = apply_transport(builder, section, base)?;
    if let Some(policy) = parse_value::<TlsSessionPolicy>(section, "tls_policy")? {
        builder = builder.with_tls_policy(policy);
    }
    Ok(builder)
}

fn apply_transport(
    builder: ForwardClientBuilder,
    section: &Properties,
    base: &Path,
) -> Result<ForwardClientBuilder, BuildError> {
    let transport = section
        .get("transport")
        .map(|value| value.trim().to_ascii_lowercase());
    let ca_file = section.get("ca_file").map(|value| resolve(base, value));
    match (transport.as_deref(), ca_file) {
        (None | Some("tcp"), None) => Ok(builder),
        (None | Some("tcp"), Some(_)) => Err(BuildError::InvalidConfig(
            "ca_file is only supported for tls transports".into(),
        )),
        (Some("tls"), None) => Ok(builder.with_tls()),
        (Some("tls"), Some(ca)) => builder.with_tls_ca_file(ca),
        (Some(other), _) => Err(BuildError::InvalidConfig(format!(
            "unknown transport {other:?}; expected tcp or tls"
        ))),
    }
}

fn resolve(base: &Path, value: &str) -> PathBuf {
    let path = Path::new(value.trim());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn parse_value<T>(section: &Properties, key: &str) -> Result<Option<T>, BuildError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    section
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|err| BuildError::InvalidConfig(format!("{key} = {raw:?}: {err}")))
        })
        .transpose()
}

fn reject_unknown_keys(section: &Properties) -> Result<(), BuildError> {
    match section.iter().find(|(key, _)| !KNOWN_KEYS.contains(key)) {
        Some((key, _)) => Err(BuildError::InvalidConfig(format!(
            "unknown key {key:?} in [{FORWARD_SECTION}]"
        ))),
        None => Ok(()),
    }
}
