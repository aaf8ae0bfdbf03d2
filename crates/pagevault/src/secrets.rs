//! API key lookup for the cloud OCR backend.
//!
//! The key can sit inline in the config, in a file (Docker secrets style),
//! or in an environment variable. The first source that is configured at
//! all is the one used; a configured source that turns out empty is an
//! error rather than a reason to try the next one.

use std::path::PathBuf;

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No API key configured (set an inline key, a key file or an environment variable)")]
    NotConfigured,

    #[error("Failed to read API key file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("API key file '{path}' is empty")]
    EmptyFile { path: PathBuf },

    #[error("Environment variable '{name}' is unset or blank")]
    MissingEnv { name: String },

    #[error("Environment variable '{name}' is not valid UTF-8")]
    NonUnicodeEnv { name: String },
}

/// One place a key may come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeySource<'a> {
    Inline(&'a str),
    File(&'a str),
    Env(&'a str),
}

/// The highest-priority source that has a non-empty setting.
fn first_configured<'a>(
    inline: Option<&'a str>,
    file: Option<&'a str>,
    env: Option<&'a str>,
) -> Option<KeySource<'a>> {
    let set = |v: Option<&'a str>| v.filter(|s| !s.is_empty());
    set(inline)
        .map(KeySource::Inline)
        .or_else(|| set(file).map(KeySource::File))
        .or_else(|| set(env).map(KeySource::Env))
}

impl KeySource<'_> {
    fn read(self) -> Result<SecretString, SecretError> {
        match self {
            KeySource::Inline(value) => Ok(SecretString::from(value)),
            KeySource::File(raw) => {
                let path = expand_home(raw);
                let content = std::fs::read_to_string(&path).map_err(|source| {
                    SecretError::ReadFile {
                        path: path.clone(),
                        source,
                    }
                })?;
                match content.trim() {
                    "" => Err(SecretError::EmptyFile { path }),
                    key => Ok(SecretString::from(key)),
                }
            }
            KeySource::Env(name) => match std::env::var(name) {
                Ok(value) if !value.trim().is_empty() => Ok(SecretString::from(value.trim())),
                Ok(_) | Err(std::env::VarError::NotPresent) => Err(SecretError::MissingEnv {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::NonUnicodeEnv {
                    name: name.to_string(),
                }),
            },
        }
    }
}

/// Reads the key from the first configured source: inline value, then
/// key file, then environment variable. File and env values are trimmed.
pub fn resolve_secret(
    inline: Option<&str>,
    file: Option<&str>,
    env: Option<&str>,
) -> Result<SecretString, SecretError> {
    first_configured(inline, file, env)
        .ok_or(SecretError::NotConfigured)?
        .read()
}

/// Like [`resolve_secret`], but having no source at all is `Ok(None)`.
pub fn resolve_secret_optional(
    inline: Option<&str>,
    file: Option<&str>,
    env: Option<&str>,
) -> Result<Option<SecretString>, SecretError> {
    first_configured(inline, file, env)
        .map(KeySource::read)
        .transpose()
}

/// `~` and `~/rest` resolve against the home directory; `~user` does not.
fn expand_home(path: &str) -> PathBuf {
    let Some(home) = dirs::home_dir() else {
        return PathBuf::from(path);
    };
    if path == "~" {
        home
    } else if let Some(rest) = path.strip_prefix("~/") {
        home.join(rest)
    } else {
        PathBuf::from(path)
    }
}
