use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("failed to read lookup cache at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file at {path} could not be decrypted: wrong key or corrupted file")]
    DecryptionFailed { path: String },

    #[error("lookup table at {path} is malformed: {message}")]
    MalformedTable { path: String, message: String },

    #[error("no local cache present and no remote lookup source configured")]
    NoSourceAvailable,

    #[error("remote lookup source `{url}` is configured but fetching it is not available in this build")]
    RemoteFetchUnavailable { url: String },
}
