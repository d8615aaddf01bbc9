use anyhow::{Context, Result};
use std::path::Path;
use tempfile::NamedTempFile;

pub fn is_remote(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://")
}

/// Fetch a remote audio resource into a temp file
///
/// The returned temp file must be kept alive for as long as the player has
/// the source bound. The test audio is treated as an opaque blob; the decoder
/// sniffs the format from the content, not the file name.
pub async fn fetch_to_temp(url: &str) -> Result<NamedTempFile> {
    tracing::info!("Fetching remote audio: {}", url);

    let response = reqwest::get(url)
        .await
        .with_context(|| format!("Failed to fetch {}", url))?
        .error_for_status()
        .with_context(|| format!("Server rejected request for {}", url))?;

    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read response body from {}", url))?;

    let temp = tempfile::Builder::new()
        .prefix("soundcheck-dl-")
        .tempfile()
        .context("Failed to create download temp file")?;

    tokio::fs::write(temp.path(), &bytes)
        .await
        .with_context(|| format!("Failed to write download to {:?}", temp.path()))?;

    tracing::info!("Fetched {} bytes from {}", bytes.len(), url);
    Ok(temp)
}

/// Resolve a playback URI to a local path, fetching remote sources first
pub async fn resolve(uri: &str) -> Result<(std::path::PathBuf, Option<NamedTempFile>)> {
    if is_remote(uri) {
        let temp = fetch_to_temp(uri).await?;
        Ok((temp.path().to_path_buf(), Some(temp)))
    } else {
        let path = Path::new(uri);
        if !path.exists() {
            return Err(anyhow::anyhow!("No such audio file: {}", uri));
        }
        Ok((path.to_path_buf(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.com/song.mp3"));
        assert!(is_remote("http://example.com/song.mp3"));
        assert!(!is_remote("/tmp/recording.wav"));
        assert!(!is_remote("recording.wav"));
    }

    #[tokio::test]
    async fn test_resolve_missing_local_file() {
        let result = resolve("/nonexistent/soundcheck-test.wav").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_resolve_local_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let uri = temp.path().to_string_lossy().into_owned();

        let (path, guard) = resolve(&uri).await.unwrap();
        assert_eq!(path, temp.path());
        assert!(guard.is_none());
    }
}
