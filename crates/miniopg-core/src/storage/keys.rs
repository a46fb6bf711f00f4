//! Object key and public URL helpers.

use crate::config::StorageConfig;
use crate::util::unix_millis_now;

/// Join a directory prefix and a name with exactly one `/`.
pub fn join_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Last path component of a client-supplied file name.
///
/// Both `/` and `\` count as separators. Empty results fall back to
/// `fallback`.
pub fn base_file_name<'a>(file_name: &'a str, fallback: &'a str) -> &'a str {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        fallback
    } else {
        base
    }
}

/// Public URL of `key` in the configured bucket.
///
/// A custom domain replaces the endpoint and bucket. Key segments are
/// percent-encoded, separators are kept.
pub fn public_url(config: &StorageConfig, key: &str) -> String {
    let encoded = encode_key(key);
    match config.domain.as_deref() {
        Some(domain) => format!("{}/{encoded}", domain.trim_end_matches('/')),
        None => format!(
            "{}://{}:{}/{}/{encoded}",
            config.scheme(),
            config.endpoint,
            config.port,
            config.bucket
        ),
    }
}

fn encode_key(key: &str) -> String {
    key.trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Millisecond stamps that strictly increase for the lifetime of the value.
///
/// One request uses one `KeyStamp`, so parts sharing a file name still land
/// on distinct keys.
#[derive(Debug, Default)]
pub struct KeyStamp {
    last: Option<i64>,
}

impl KeyStamp {
    pub const fn new() -> Self {
        Self { last: None }
    }

    pub fn next(&mut self) -> i64 {
        self.next_from(unix_millis_now())
    }

    fn next_from(&mut self, now: i64) -> i64 {
        let stamp = match self.last {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last = Some(stamp);
        stamp
    }

    /// `{millis}-{file_name}` joined under `prefix`.
    pub fn object_key(&mut self, prefix: Option<&str>, file_name: &str) -> String {
        let name = format!("{}-{file_name}", self.next());
        join_key(prefix.unwrap_or_default(), &name)
    }
}
