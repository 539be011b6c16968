//! Bounded fan-out of detail document downloads

use crate::error::{Error, Result};
use crate::fetcher::DocumentFetcher;
use crate::types::DownloadOutcome;
use crate::utils::redecode_latin1;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

/// One detail document to retrieve
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct DownloadRequest {
    /// Position of the originating record in the filtered sequence
    pub index: usize,
    /// Absolute document URL
    pub url: String,
    /// Local destination
    pub dest: PathBuf,
}

/// Absolute URL of a detail document from the record's relative `path`.
///
/// The path is re-decoded through its Latin-1 byte view first, then resolved
/// below `base`. A path that resolves to another origin or outside the base
/// path is rejected, since requests carry the catalog credentials.
pub(crate) fn build_url(base: &Url, path: &str) -> Result<String> {
    let decoded = redecode_latin1(path);
    let url = match base.join(decoded.trim_start_matches('/')) {
        Ok(url) => url,
        Err(e) => {
            return Err(Error::InvalidUrl {
                url: decoded,
                reason: e.to_string(),
            });
        }
    };
    if url.origin() != base.origin() || !url.path().starts_with(base.path()) {
        return Err(Error::InvalidUrl {
            url: decoded,
            reason: format!("resolves outside {}", base),
        });
    }
    Ok(url.into())
}

/// Parse a base URL, making sure relative paths resolve below it
pub(crate) fn parse_base_url(base: &str) -> Result<Url> {
    let with_slash = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };
    Url::parse(&with_slash).map_err(|e| Error::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })
}

/// Aborts the wrapped task when dropped
pub(crate) struct AbortOnDrop(pub tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Spawn the fetch stage: at most `concurrency` downloads in flight, each
/// completion sent as `(index, outcome)` in completion order.
///
/// The task ends when every request has completed or the receiver is dropped.
pub(crate) fn spawn_fetch_stage(
    fetcher: Arc<dyn DocumentFetcher>,
    requests: Vec<DownloadRequest>,
    concurrency: usize,
    tx: mpsc::Sender<(usize, DownloadOutcome)>,
) -> AbortOnDrop {
    let handle = tokio::spawn(async move {
        let mut completions = futures::stream::iter(requests)
            .map(|request| {
                let fetcher = Arc::clone(&fetcher);
                async move {
                    let outcome = match fetcher.fetch(&request.url, &request.dest).await {
                        Ok(path) => DownloadOutcome::Retrieved { path },
                        Err(e) => DownloadOutcome::Failed {
                            cause: e.to_string(),
                        },
                    };
                    (request.index, outcome)
                }
            })
            .buffer_unordered(concurrency.max(1));

        while let Some(completion) = completions.next().await {
            if tx.send(completion).await.is_err() {
                tracing::debug!("Completion receiver dropped, stopping downloads");
                break;
            }
        }
    });
    AbortOnDrop(handle)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_url_joins_relative_path() {
        let base = parse_base_url("https://data.icecat.biz").unwrap();
        assert_eq!(
            build_url(&base, "export/freexml.int/EN/1.xml").unwrap(),
            "https://data.icecat.biz/export/freexml.int/EN/1.xml"
        );
        assert_eq!(
            build_url(&base, "/prod/123.xml").unwrap(),
            "https://data.icecat.biz/prod/123.xml"
        );
    }

    #[test]
    fn build_url_keeps_base_path_prefix() {
        let base = parse_base_url("http://127.0.0.1:8080/mirror").unwrap();
        assert_eq!(
            build_url(&base, "/prod/1.xml").unwrap(),
            "http://127.0.0.1:8080/mirror/prod/1.xml"
        );
    }

    #[test]
    fn build_url_redecodes_latin1_mojibake() {
        let base = parse_base_url("https://data.icecat.biz/").unwrap();
        let url = build_url(&base, "prod/caf\u{c3}\u{a9}.xml").unwrap();
        assert_eq!(url, "https://data.icecat.biz/prod/caf%C3%A9.xml");
    }

    #[test]
    fn build_url_rejects_paths_leaving_the_base() {
        let base = parse_base_url("https://data.icecat.biz/").unwrap();
        for path in [
            "https://evil.example/steal.xml",
            "http://data.icecat.biz/prod/1.xml",
        ] {
            assert!(
                matches!(build_url(&base, path), Err(Error::InvalidUrl { .. })),
                "{} was accepted",
                path
            );
        }

        let mirror = parse_base_url("http://127.0.0.1:8080/mirror/").unwrap();
        assert!(matches!(
            build_url(&mirror, "../private/1.xml"),
            Err(Error::InvalidUrl { .. })
        ));
    }

    #[test]
    fn invalid_base_is_rejected() {
        assert!(matches!(
            parse_base_url("not a url"),
            Err(Error::InvalidUrl { .. })
        ));
    }
}
