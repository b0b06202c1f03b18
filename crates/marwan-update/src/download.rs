use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use thiserror::Error;
#[cfg(feature = "stream")]
use tokio::io::AsyncWriteExt;

use crate::asset::staged_file_name;
use crate::release::{ReleaseAsset, ReleaseInfo};

/// Largest slice written to disk between two progress reports.
pub const CHUNK_SIZE: usize = 8192;
pub const DOWNLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const CHECKSUM_MANIFESTS: [&str; 2] = ["SHA256SUMS", "checksums.txt"];

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("download failed with status {status}")]
    Status { status: reqwest::StatusCode },
    #[error("checksum mismatch for {asset}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        asset: String,
        expected: String,
        actual: String,
    },
    #[error("no checksum entry found for update asset '{asset}'")]
    MissingChecksumEntry { asset: String },
    #[error("size mismatch for {asset}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        asset: String,
        expected: u64,
        actual: u64,
    },
}

impl DownloadError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    fn http(context: &'static str, source: reqwest::Error) -> Self {
        Self::Http { context, source }
    }

    fn io_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::io(
            context,
            std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        )
    }
}

/// A downloaded update waiting in the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePackage {
    pub download_url: String,
    pub staged_path: PathBuf,
    pub byte_size: Option<u64>,
    pub checksum_verified: bool,
}

/// HTTP client for asset downloads. Only connecting is bounded in time so
/// large assets on slow links can still finish.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialised.
pub fn download_client(connect_timeout: Duration) -> Result<reqwest::Client, DownloadError> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .user_agent(crate::USER_AGENT)
        .build()
        .map_err(|error| DownloadError::http("failed to build download client", error))
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<reqwest::Response, DownloadError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|error| DownloadError::http("download request failed", error))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status { status });
    }
    Ok(response)
}

#[allow(clippy::cast_precision_loss)]
fn percent(done: u64, total: u64) -> f64 {
    (done as f64 / total as f64 * 100.0).min(100.0)
}

/// Download `url` into `dest`, returning the number of bytes written.
///
/// `on_progress` receives a percentage after every chunk, but only when the
/// server announced a non-zero `Content-Length`. A partially written file is
/// left in place when the transfer fails.
///
/// # Errors
/// Returns an error on transport failures, non-success status codes, or when
/// the destination cannot be written.
#[cfg(feature = "stream")]
pub async fn download<F>(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    mut on_progress: F,
) -> Result<u64, DownloadError>
where
    F: FnMut(f64),
{
    use futures_util::StreamExt;

    let response = fetch(client, url).await?;
    let total = response.content_length().filter(|total| *total > 0);
    let mut downloaded: u64 = 0;

    let mut file = tokio::fs::File::create(dest).await.map_err(|error| {
        DownloadError::io_with_path("failed to create download file", dest, &error)
    })?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|error| DownloadError::http("download stream error", error))?;
        for piece in chunk.chunks(CHUNK_SIZE) {
            file.write_all(piece).await.map_err(|error| {
                DownloadError::io_with_path("failed to write download data", dest, &error)
            })?;
            downloaded += piece.len() as u64;
            if let Some(total) = total {
                on_progress(percent(downloaded, total));
            }
        }
    }

    file.flush().await.map_err(|error| {
        DownloadError::io_with_path("failed to flush download file", dest, &error)
    })?;

    info!("Download complete: {downloaded} bytes");
    Ok(downloaded)
}

/// Download `url` into `dest` in one transfer, returning the number of bytes
/// written. Progress is never reported in this build.
///
/// # Errors
/// Returns an error on transport failures, non-success status codes, or when
/// the destination cannot be written.
#[cfg(not(feature = "stream"))]
pub async fn download<F>(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    on_progress: F,
) -> Result<u64, DownloadError>
where
    F: FnMut(f64),
{
    drop(on_progress);
    download_whole_body(client, url, dest).await
}

#[cfg(any(test, not(feature = "stream")))]
async fn download_whole_body(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<u64, DownloadError> {
    let body = fetch(client, url)
        .await?
        .bytes()
        .await
        .map_err(|error| DownloadError::http("failed to read download body", error))?;

    tokio::fs::write(dest, &body).await.map_err(|error| {
        DownloadError::io_with_path("failed to write download file", dest, &error)
    })?;

    info!("Download complete: {} bytes", body.len());
    Ok(body.len() as u64)
}

/// Download `asset` of `release` into `staging_dir` and verify it against
/// any checksum the release publishes.
///
/// # Errors
/// Returns an error when the staging directory cannot be prepared, the
/// download fails, or the checksum does not match.
pub async fn stage_update<F>(
    client: &reqwest::Client,
    release: &ReleaseInfo,
    asset: &ReleaseAsset,
    staging_dir: &Path,
    on_progress: F,
) -> Result<UpdatePackage, DownloadError>
where
    F: FnMut(f64),
{
    tokio::fs::create_dir_all(staging_dir).await.map_err(|error| {
        DownloadError::io_with_path("failed to create staging directory", staging_dir, &error)
    })?;

    let staged_path = staging_dir.join(staged_file_name(&asset.name));
    if tokio::fs::try_exists(&staged_path).await.unwrap_or(false) {
        debug!("Removing stale staged file {}", staged_path.display());
        tokio::fs::remove_file(&staged_path).await.map_err(|error| {
            DownloadError::io_with_path("failed to remove stale staged file", &staged_path, &error)
        })?;
    }

    info!(
        "Downloading {} to {}",
        asset.download_url,
        staged_path.display()
    );
    let written = download(client, &asset.download_url, &staged_path, on_progress).await?;
    if let Some(expected) = asset.size.filter(|size| *size > 0)
        && expected != written
    {
        return Err(DownloadError::SizeMismatch {
            asset: asset.name.clone(),
            expected,
            actual: written,
        });
    }
    let checksum_verified = verify_staged_file(client, release, asset, &staged_path).await?;

    Ok(UpdatePackage {
        download_url: asset.download_url.clone(),
        staged_path,
        byte_size: Some(written),
        checksum_verified,
    })
}

/// Checksum manifest published alongside `asset_name`, if any.
fn checksum_asset<'a>(release: &'a ReleaseInfo, asset_name: &str) -> Option<&'a ReleaseAsset> {
    let sidecar = format!("{asset_name}.sha256");
    release
        .assets
        .iter()
        .find(|candidate| candidate.name == sidecar)
        .or_else(|| {
            release
                .assets
                .iter()
                .find(|candidate| CHECKSUM_MANIFESTS.contains(&candidate.name.as_str()))
        })
}

async fn verify_staged_file(
    client: &reqwest::Client,
    release: &ReleaseInfo,
    asset: &ReleaseAsset,
    path: &Path,
) -> Result<bool, DownloadError> {
    if let Some(expected) = asset.digest.as_deref().and_then(parse_sha256_digest) {
        compare_checksum(&asset.name, &expected, path)?;
        return Ok(true);
    }

    let Some(manifest) = checksum_asset(release, &asset.name) else {
        warn!(
            "Release {} publishes no checksum for {}; skipping verification",
            release.tag, asset.name
        );
        return Ok(false);
    };

    let checksums = fetch(client, &manifest.download_url)
        .await?
        .text()
        .await
        .map_err(|error| DownloadError::http("failed to read checksums", error))?;
    let expected = parse_expected_checksum(&checksums, &asset.name).ok_or_else(|| {
        DownloadError::MissingChecksumEntry {
            asset: asset.name.clone(),
        }
    })?;

    compare_checksum(&asset.name, &expected, path)?;
    Ok(true)
}

fn compare_checksum(asset_name: &str, expected: &str, path: &Path) -> Result<(), DownloadError> {
    let actual = sha256_file(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        info!("Update checksum verified for {asset_name}");
        Ok(())
    } else {
        Err(DownloadError::ChecksumMismatch {
            asset: asset_name.to_string(),
            expected: expected.to_ascii_lowercase(),
            actual,
        })
    }
}

fn is_sha256_hex(hash: &str) -> bool {
    hash.len() == 64 && hash.chars().all(|ch| ch.is_ascii_hexdigit())
}

fn parse_sha256_digest(digest: &str) -> Option<String> {
    let (algorithm, hash) = digest.split_once(':')?;
    if !algorithm.eq_ignore_ascii_case("sha256") || !is_sha256_hex(hash) {
        return None;
    }
    Some(hash.to_ascii_lowercase())
}

fn parse_expected_checksum(checksums: &str, asset_name: &str) -> Option<String> {
    checksums.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let hash = parts.next()?;
        match parts.next() {
            Some(name) => {
                let name = name.trim_start_matches('*').trim_start_matches("./");
                (name == asset_name).then(|| hash.to_ascii_lowercase())
            }
            // `<asset>.sha256` sidecars often hold the bare digest.
            None => is_sha256_hex(hash).then(|| hash.to_ascii_lowercase()),
        }
    })
}

fn sha256_file(path: &Path) -> Result<String, DownloadError> {
    let mut file = std::fs::File::open(path).map_err(|error| {
        DownloadError::io_with_path("failed to open file for checksum", path, &error)
    })?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer).map_err(|error| {
            DownloadError::io_with_path("failed to read file for checksum", path, &error)
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    const PUBLISHED_SHA256: &str = "5c3f9e3b3e2f8a1c4b1f5a8b4d0d7c9a8a4f6f5c4d7b2e6b0c8f3a1e9d2c7b4a";

    fn release(assets: Vec<ReleaseAsset>) -> ReleaseInfo {
        ReleaseInfo {
            tag: "v1.2.0".to_string(),
            body: String::new(),
            html_url: None,
            assets,
        }
    }

    fn asset(name: &str, url: String) -> ReleaseAsset {
        ReleaseAsset {
            name: name.to_string(),
            download_url: url,
            size: None,
            digest: None,
        }
    }

    fn digest_of(bytes: &[u8]) -> String {
        format!("{:x}", Sha256::digest(bytes))
    }

    #[tokio::test]
    async fn download_reports_monotonic_progress_ending_at_100() {
        let body = vec![7_u8; CHUNK_SIZE * 3 + 100];
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/asset.exe")
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let dest = temp.path().join("update.exe");

        let mut reports = Vec::new();
        let written = download(
            &reqwest::Client::new(),
            &format!("{}/asset.exe", server.url()),
            &dest,
            |pct| reports.push(pct),
        )
        .await
        .expect("download should succeed");

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).expect("staged file"), body);
        if cfg!(feature = "stream") {
            assert!(reports.len() >= 4);
            assert!(reports.windows(2).all(|pair| pair[0] <= pair[1]));
            let last = *reports.last().expect("at least one report");
            assert!((last - 100.0).abs() < f64::EPSILON);
        } else {
            assert!(reports.is_empty());
        }
    }

    #[tokio::test]
    async fn download_without_content_length_reports_no_progress() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/asset.exe")
            .with_status(200)
            .with_chunked_body(|writer| {
                for _ in 0..4 {
                    writer.write_all(&[3_u8; 5_000])?;
                }
                Ok(())
            })
            .create_async()
            .await;
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let dest = temp.path().join("update.exe");

        let mut reports = Vec::new();
        let written = download(
            &reqwest::Client::new(),
            &format!("{}/asset.exe", server.url()),
            &dest,
            |pct| reports.push(pct),
        )
        .await
        .expect("download should succeed");

        assert_eq!(written, 20_000);
        assert_eq!(std::fs::read(&dest).expect("staged file").len(), 20_000);
        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn stage_update_rejects_truncated_asset() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/MarwanManagementCRM.exe")
            .with_status(200)
            .with_body(b"short")
            .create_async()
            .await;
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let mut exe = asset(
            "MarwanManagementCRM.exe",
            format!("{}/MarwanManagementCRM.exe", server.url()),
        );
        exe.size = Some(1_024);

        let result = stage_update(
            &reqwest::Client::new(),
            &release(vec![exe.clone()]),
            &exe,
            temp.path(),
            |_| {},
        )
        .await;

        assert!(matches!(
            result,
            Err(DownloadError::SizeMismatch {
                expected: 1_024,
                actual: 5,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn whole_body_download_writes_every_byte() {
        let body = vec![9_u8; CHUNK_SIZE * 2 + 17];
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/asset.exe")
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;
        let _gone = server
            .mock("GET", "/gone.exe")
            .with_status(410)
            .create_async()
            .await;
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let dest = temp.path().join("update.exe");
        let client = reqwest::Client::new();

        let written = download_whole_body(&client, &format!("{}/asset.exe", server.url()), &dest)
            .await
            .expect("download should succeed");
        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).expect("staged file"), body);

        let failed =
            download_whole_body(&client, &format!("{}/gone.exe", server.url()), &dest).await;
        assert!(matches!(
            failed,
            Err(DownloadError::Status { status }) if status == reqwest::StatusCode::GONE
        ));
    }

    #[tokio::test]
    async fn download_fails_on_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.exe")
            .with_status(404)
            .create_async()
            .await;
        let temp = tempfile::tempdir().expect("tempdir should be created");

        let result = download(
            &reqwest::Client::new(),
            &format!("{}/missing.exe", server.url()),
            &temp.path().join("update.exe"),
            |_| {},
        )
        .await;

        assert!(matches!(
            result,
            Err(DownloadError::Status { status }) if status == reqwest::StatusCode::NOT_FOUND
        ));
    }

    #[tokio::test]
    async fn stage_update_replaces_stale_file_and_verifies_manifest() {
        let payload = b"new executable bytes".to_vec();
        let mut server = mockito::Server::new_async().await;
        let _asset = server
            .mock("GET", "/MarwanManagementCRM.exe")
            .with_status(200)
            .with_body(&payload)
            .create_async()
            .await;
        let _sums = server
            .mock("GET", "/SHA256SUMS")
            .with_status(200)
            .with_body(format!(
                "{}  other.zip\n{}  MarwanManagementCRM.exe\n",
                "0".repeat(64),
                digest_of(&payload)
            ))
            .create_async()
            .await;

        let exe = asset(
            "MarwanManagementCRM.exe",
            format!("{}/MarwanManagementCRM.exe", server.url()),
        );
        let release = release(vec![
            exe.clone(),
            asset("SHA256SUMS", format!("{}/SHA256SUMS", server.url())),
        ]);

        let temp = tempfile::tempdir().expect("tempdir should be created");
        let staging = temp.path().join("temp_updates");
        std::fs::create_dir_all(&staging).expect("staging dir should be created");
        std::fs::write(staging.join("update.exe"), b"stale").expect("stale file written");

        let package = stage_update(&reqwest::Client::new(), &release, &exe, &staging, |_| {})
            .await
            .expect("staging should succeed");

        assert_eq!(package.staged_path, staging.join("update.exe"));
        assert_eq!(package.byte_size, Some(payload.len() as u64));
        assert!(package.checksum_verified);
        assert_eq!(std::fs::read(&package.staged_path).expect("staged"), payload);
    }

    #[tokio::test]
    async fn stage_update_rejects_checksum_mismatch() {
        let mut server = mockito::Server::new_async().await;
        let _asset = server
            .mock("GET", "/app.zip")
            .with_status(200)
            .with_body("tampered")
            .create_async()
            .await;
        let _sidecar = server
            .mock("GET", "/app.zip.sha256")
            .with_status(200)
            .with_body(PUBLISHED_SHA256)
            .create_async()
            .await;

        let zip = asset("app.zip", format!("{}/app.zip", server.url()));
        let release = release(vec![
            zip.clone(),
            asset("app.zip.sha256", format!("{}/app.zip.sha256", server.url())),
        ]);
        let temp = tempfile::tempdir().expect("tempdir should be created");

        let result =
            stage_update(&reqwest::Client::new(), &release, &zip, temp.path(), |_| {}).await;

        assert!(matches!(
            result,
            Err(DownloadError::ChecksumMismatch { ref expected, .. }) if expected == PUBLISHED_SHA256
        ));
    }

    #[tokio::test]
    async fn stage_update_without_checksum_is_unverified() {
        let mut server = mockito::Server::new_async().await;
        let _asset = server
            .mock("GET", "/app-linux-x86_64")
            .with_status(200)
            .with_body("binary")
            .create_async()
            .await;
        let bin = asset(
            "app-linux-x86_64",
            format!("{}/app-linux-x86_64", server.url()),
        );
        let release = release(vec![bin.clone()]);
        let temp = tempfile::tempdir().expect("tempdir should be created");

        let package = stage_update(&reqwest::Client::new(), &release, &bin, temp.path(), |_| {})
            .await
            .expect("staging should succeed");

        assert_eq!(package.staged_path, temp.path().join("update"));
        assert!(!package.checksum_verified);
    }

    #[tokio::test]
    async fn registry_digest_takes_precedence_over_manifest() {
        let payload = b"digest checked";
        let mut server = mockito::Server::new_async().await;
        let _asset = server
            .mock("GET", "/app.exe")
            .with_status(200)
            .with_body(payload)
            .create_async()
            .await;
        let sums = server
            .mock("GET", "/checksums.txt")
            .expect(0)
            .create_async()
            .await;

        let mut exe = asset("app.exe", format!("{}/app.exe", server.url()));
        exe.digest = Some(format!("sha256:{}", digest_of(payload)));
        let release = release(vec![
            exe.clone(),
            asset("checksums.txt", format!("{}/checksums.txt", server.url())),
        ]);
        let temp = tempfile::tempdir().expect("tempdir should be created");

        let package = stage_update(&reqwest::Client::new(), &release, &exe, temp.path(), |_| {})
            .await
            .expect("staging should succeed");

        assert!(package.checksum_verified);
        sums.assert_async().await;
    }

    #[test]
    fn parse_expected_checksum_matches_asset_name() {
        let checksums = "\
aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa  foo.zip
bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb *./bar.zip
";
        let parsed = parse_expected_checksum(checksums, "bar.zip");
        assert_eq!(
            parsed.as_deref(),
            Some("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")
        );
        assert!(parse_expected_checksum(checksums, "baz.zip").is_none());
    }

    #[test]
    fn parse_sha256_digest_rejects_invalid_values() {
        assert!(parse_sha256_digest("sha1:abc").is_none());
        assert!(parse_sha256_digest("sha256:not-hex").is_none());
        assert_eq!(
            parse_sha256_digest(&format!("SHA256:{}", "A".repeat(64))),
            Some("a".repeat(64))
        );
    }

    #[test]
    fn sha256_file_returns_known_digest() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let file_path = temp.path().join("payload.bin");
        std::fs::write(&file_path, b"marwan").expect("payload file should be written");

        let digest = sha256_file(&file_path).expect("checksum should be computed");
        assert_eq!(
            digest,
            "a81ccc3ede0320f8879d99eb2d075e6a404587faa0bc91cbb7812d196388f1f8"
        );
    }
}
