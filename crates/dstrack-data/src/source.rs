use std::path::Path;

use dstrack_core::errors::{ErrorInfo, TrackError};
use dstrack_core::serde::{from_json_str, to_canonical_json_string};
use serde::{Deserialize, Serialize};

const REMOTE_SCHEMES: &[&str] = &["http://", "https://", "lakefs://"];

/// Where a dataset's bytes came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatasetSource {
    /// A file on the local filesystem, as a `file://` URI.
    Local { uri: String },
    /// A remote location such as a lakeFS commit URL.
    Http { url: String },
}

impl DatasetSource {
    /// Prefers `url` when present, otherwise points at `path`.
    pub fn resolve(url: Option<&str>, path: &Path) -> Result<Self, TrackError> {
        match url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => Self::remote(url),
            None => Self::local(path),
        }
    }

    pub fn remote(url: &str) -> Result<Self, TrackError> {
        if REMOTE_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
            Ok(DatasetSource::Http {
                url: url.to_string(),
            })
        } else {
            Err(TrackError::Data(
                ErrorInfo::new("data.source_scheme", "unsupported dataset source url")
                    .with_context("url", url)
                    .with_hint("expected http://, https:// or lakefs://"),
            ))
        }
    }

    /// Canonicalises `path`, so it must exist.
    pub fn local(path: &Path) -> Result<Self, TrackError> {
        let absolute = path.canonicalize().map_err(|err| {
            TrackError::Data(ErrorInfo::new("data.source_path", err.to_string()).with_path(path))
        })?;
        let text = absolute.display().to_string().replace('\\', "/");
        let uri = if text.starts_with('/') {
            format!("file://{text}")
        } else {
            format!("file:///{text}")
        };
        Ok(DatasetSource::Local { uri })
    }

    pub fn source_type(&self) -> &'static str {
        match self {
            DatasetSource::Local { .. } => "local",
            DatasetSource::Http { .. } => "http",
        }
    }

    /// The URI or URL as written.
    pub fn location(&self) -> &str {
        match self {
            DatasetSource::Local { uri } => uri,
            DatasetSource::Http { url } => url,
        }
    }

    pub fn to_json(&self) -> Result<String, TrackError> {
        to_canonical_json_string(self)
    }

    /// Rebuilds a source from its stored type tag and JSON body.
    pub fn from_parts(source_type: &str, json: &str) -> Result<Self, TrackError> {
        let source: DatasetSource = from_json_str(json)?;
        if source.source_type() != source_type {
            return Err(TrackError::Data(
                ErrorInfo::new("data.source_type", "source body does not match its type")
                    .with_context("source_type", source_type)
                    .with_context("source", json),
            ));
        }
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_wins_over_path() {
        let source = DatasetSource::resolve(
            Some("lakefs://repo/abc123/data/iris.csv"),
            Path::new("/does/not/exist.csv"),
        )
        .unwrap();
        assert_eq!(source.source_type(), "http");
        assert_eq!(source.location(), "lakefs://repo/abc123/data/iris.csv");
        assert_eq!(
            source.to_json().unwrap(),
            r#"{"url":"lakefs://repo/abc123/data/iris.csv"}"#
        );
    }

    #[test]
    fn blank_url_falls_back_to_missing_path() {
        let err = DatasetSource::resolve(Some("  "), Path::new("/does/not/exist.csv")).unwrap_err();
        assert_eq!(err.code(), "data.source_path");
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let err = DatasetSource::remote("ftp://host/file.csv").unwrap_err();
        assert_eq!(err.code(), "data.source_scheme");
    }

    #[test]
    fn parts_roundtrip() {
        let source = DatasetSource::Local {
            uri: "file:///data/iris.csv".into(),
        };
        let json = source.to_json().unwrap();
        assert_eq!(DatasetSource::from_parts("local", &json).unwrap(), source);
        assert!(DatasetSource::from_parts("http", &json).is_err());
    }
}
