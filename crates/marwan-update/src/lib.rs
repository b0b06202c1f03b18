//! Self-update core for Marwan Management CRM.
//!
//! The host application uses this crate to:
//! - Compare its version against the latest published release.
//! - Pick the release asset matching the running platform.
//! - Stage the asset in the update cache and verify it.
//! - Hand the staged file to the external applier process.
//!
//! The applier binary drives [`apply::Applier`] to swap the executable once
//! the host has exited.
//!
//! # Features
//!
//! `stream` (default) downloads in chunks and reports progress. Without it
//! an asset is fetched as one body and progress is never reported. The
//! one-body transfer is compiled into every test build, so `cargo test`
//! covers it either way; `cargo test -p marwan-update --no-default-features`
//! checks the download entry point of that build.

pub mod apply;
mod asset;
mod download;
mod handoff;
mod release;
mod version;

/// Platform asset matching and staged file naming.
pub use asset::{ARCHIVE_SUFFIX, native_suffix, select_asset, select_platform_asset, staged_file_name};
/// Streaming download and staging of a selected asset.
pub use download::{
    CHUNK_SIZE, DOWNLOAD_CONNECT_TIMEOUT, DownloadError, UpdatePackage, download, download_client,
    stage_update,
};
/// Detached launch of the applier process.
pub use handoff::{APPLIER_STEM, Handoff, HandoffError, launch_applier};
/// Release registry model, lookup, and update check result.
pub use release::{
    AvailableUpdate, CheckFailure, DEFAULT_REGISTRY_BASE, ReleaseAsset, ReleaseInfo,
    ReleaseRegistry, ReleaseSource, UpdateCheck, check_for_update, is_configured_repository,
};
/// Dotted numeric version parsing and comparison.
pub use version::{Version, is_newer, parse_version};

const USER_AGENT: &str = concat!("marwan-crm/", env!("CARGO_PKG_VERSION"));
