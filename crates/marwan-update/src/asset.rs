use crate::release::{ReleaseAsset, ReleaseInfo};

pub const ARCHIVE_SUFFIX: &str = ".zip";
const WINDOWS_EXECUTABLE_SUFFIX: &str = ".exe";

/// Asset name suffix for the build running right now: `.exe` on Windows,
/// `-<os>-<arch>` (for example `-linux-x86_64`) elsewhere.
#[must_use]
pub fn native_suffix() -> String {
    if cfg!(windows) {
        WINDOWS_EXECUTABLE_SUFFIX.to_string()
    } else {
        format!("-{}-{}", std::env::consts::OS, std::env::consts::ARCH)
    }
}

fn is_executable_suffix(suffix: &str) -> bool {
    suffix == WINDOWS_EXECUTABLE_SUFFIX || suffix == native_suffix()
}

/// First asset, in registry order, whose name ends with `preferred_suffix`.
///
/// When an executable suffix finds nothing, the `.zip` archive is accepted
/// instead.
#[must_use]
pub fn select_asset<'a>(release: &'a ReleaseInfo, preferred_suffix: &str) -> Option<&'a ReleaseAsset> {
    let find = |suffix: &str| {
        release
            .assets
            .iter()
            .find(|asset| asset.name.ends_with(suffix))
    };

    find(preferred_suffix).or_else(|| {
        if is_executable_suffix(preferred_suffix) {
            find(ARCHIVE_SUFFIX)
        } else {
            None
        }
    })
}

#[must_use]
pub fn select_platform_asset(release: &ReleaseInfo) -> Option<&ReleaseAsset> {
    select_asset(release, &native_suffix())
}

/// File name used inside the staging directory for a downloaded asset.
#[must_use]
pub fn staged_file_name(asset_name: &str) -> &'static str {
    if asset_name.ends_with(ARCHIVE_SUFFIX) {
        "update.zip"
    } else if asset_name.ends_with(WINDOWS_EXECUTABLE_SUFFIX) {
        "update.exe"
    } else {
        "update"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release_with(names: &[&str]) -> ReleaseInfo {
        ReleaseInfo {
            tag: "v1.2.0".to_string(),
            body: String::new(),
            html_url: None,
            assets: names
                .iter()
                .map(|name| ReleaseAsset {
                    name: (*name).to_string(),
                    download_url: format!("https://x/{name}"),
                    size: None,
                    digest: None,
                })
                .collect(),
        }
    }

    #[test]
    fn preferred_suffix_wins_regardless_of_order() {
        let release = release_with(&["app.zip", "app.exe"]);
        let asset = select_asset(&release, ".exe").expect("exe asset should be selected");
        assert_eq!(asset.download_url, "https://x/app.exe");
    }

    #[test]
    fn executable_suffix_falls_back_to_archive() {
        let release = release_with(&["app.zip"]);
        let asset = select_asset(&release, ".exe").expect("zip fallback should be selected");
        assert_eq!(asset.download_url, "https://x/app.zip");
    }

    #[test]
    fn native_suffix_falls_back_to_archive() {
        let release = release_with(&["notes.txt", "app.zip"]);
        let asset = select_platform_asset(&release).expect("zip fallback should be selected");
        assert_eq!(asset.name, "app.zip");
    }

    #[test]
    fn native_suffix_matches_platform_build() {
        let native = format!("app{}", native_suffix());
        let release = release_with(&["app.zip", &native]);
        let asset = select_platform_asset(&release).expect("native asset should be selected");
        assert_eq!(asset.name, native);
    }

    #[test]
    fn unrelated_assets_select_nothing() {
        let release = release_with(&["readme.txt"]);
        assert!(select_asset(&release, ".exe").is_none());
    }

    #[test]
    fn non_executable_suffix_does_not_fall_back() {
        let release = release_with(&["app.zip"]);
        assert!(select_asset(&release, ".msi").is_none());
    }

    #[test]
    fn first_matching_asset_is_chosen() {
        let release = release_with(&["first.exe", "second.exe"]);
        let asset = select_asset(&release, ".exe").expect("exe asset should be selected");
        assert_eq!(asset.name, "first.exe");
    }

    #[test]
    fn staged_file_name_follows_asset_type() {
        assert_eq!(staged_file_name("MarwanManagementCRM.exe"), "update.exe");
        assert_eq!(staged_file_name("MarwanManagementCRM.zip"), "update.zip");
        assert_eq!(staged_file_name("marwan-crm-linux-x86_64"), "update");
    }
}
