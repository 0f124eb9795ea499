//! trust anchor resolution.

use std::path::PathBuf;

/// where the ca bundle published alongside a token comes from.
///
/// an inline bundle wins; a file path is the fallback. resolution happens on
/// every rotation rather than once at startup, so an operator can swap the
/// file on disk without restarting the agent.
#[derive(Debug, Clone, Default)]
pub struct TrustAnchor {
    inline: Option<Vec<u8>>,
    path: Option<PathBuf>,
}

impl TrustAnchor {
    /// anchor backed by an inline bundle.
    pub fn inline(bundle: Vec<u8>) -> Self {
        Self {
            inline: Some(bundle),
            path: None,
        }
    }

    /// anchor backed by a file on disk.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            inline: None,
            path: Some(path.into()),
        }
    }

    /// anchor from optional inline and file sources.
    pub fn new(inline: Option<Vec<u8>>, path: Option<PathBuf>) -> Self {
        Self { inline, path }
    }

    /// resolve the bundle, preferring inline data over the file.
    ///
    /// an empty inline bundle counts as absent and falls through to the
    /// file, matching how operators clear one source to switch to the other.
    pub async fn resolve(&self) -> Result<Vec<u8>, TrustAnchorError> {
        if let Some(inline) = &self.inline
            && !inline.is_empty()
        {
            return Ok(inline.clone());
        }
        let Some(path) = &self.path else {
            return Err(TrustAnchorError::Unconfigured);
        };
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| TrustAnchorError::Read {
                path: path.clone(),
                source,
            })?;
        if bytes.is_empty() {
            return Err(TrustAnchorError::EmptyFile(path.clone()));
        }
        Ok(bytes)
    }
}

/// failure to produce a ca bundle.
#[derive(Debug, thiserror::Error)]
pub enum TrustAnchorError {
    /// neither an inline bundle nor a file path was configured.
    #[error("no ca bundle configured: set an inline bundle or a file path")]
    Unconfigured,
    /// reading the configured file failed.
    #[error("reading ca bundle from {path:?}: {source}")]
    Read {
        /// the file that could not be read.
        path: PathBuf,
        /// the underlying io error.
        source: std::io::Error,
    },
    /// the configured file exists but is empty.
    #[error("ca bundle file {0:?} is empty")]
    EmptyFile(PathBuf),
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[tokio::test]
    async fn inline_takes_precedence_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"from-file").unwrap();

        let anchor = TrustAnchor::new(Some(b"from-inline".to_vec()), Some(file.path().into()));
        assert_eq!(anchor.resolve().await.unwrap(), b"from-inline");
    }

    #[tokio::test]
    async fn empty_inline_falls_through_to_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"from-file").unwrap();

        let anchor = TrustAnchor::new(Some(Vec::new()), Some(file.path().into()));
        assert_eq!(anchor.resolve().await.unwrap(), b"from-file");
    }

    #[tokio::test]
    async fn missing_file_reports_the_path() {
        let anchor = TrustAnchor::from_file("/nonexistent/spoke-ca.pem");
        let err = anchor.resolve().await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/spoke-ca.pem"));
    }

    #[tokio::test]
    async fn empty_file_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let anchor = TrustAnchor::from_file(file.path());
        assert!(matches!(
            anchor.resolve().await,
            Err(TrustAnchorError::EmptyFile(_))
        ));
    }

    #[tokio::test]
    async fn nothing_configured_is_an_error() {
        assert!(matches!(
            TrustAnchor::default().resolve().await,
            Err(TrustAnchorError::Unconfigured)
        ));
    }
}
