/// Loads identity directories from the content root
use super::{asset_url, normalize_identity, IdentityConfig, IdentityFiles};
use crate::{
    content::{ContentSource, DirEntryInfo},
    error::{GateError, GateResult},
    locale::{is_safe_segment, locale_code, locale_file_names, lookup, parse_bundle, LocaleBundle, LocaleSet, BASE_LOCALE},
    metrics,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const LOCALES_DIR: &str = "locales";

const DEFAULT_TITLE: &str = "Identity Verification";
const DEFAULT_DESCRIPTION: &str = "Please verify your identity to access the group QR code.";
const DEFAULT_WARNING_TEXT: &str = "This verification is required to prevent spam.";
const DEFAULT_UNABLE_TO_VERIFY: &str = "If you cannot verify, please contact us.";

/// Reads identity directories through a [`ContentSource`]
pub struct ConfigStore {
    root: Option<PathBuf>,
    source: Arc<dyn ContentSource>,
}

impl ConfigStore {
    /// `root` of `None` means the content root is unconfigured; every lookup is then not-found
    pub fn new(root: Option<PathBuf>, source: Arc<dyn ContentSource>) -> Self {
        Self { root, source }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn source(&self) -> &Arc<dyn ContentSource> {
        &self.source
    }

    /// Directory of an identity, `None` if unconfigured or the key is unsafe
    pub fn identity_dir(&self, identity: &str) -> Option<PathBuf> {
        let normalized = normalize_identity(identity);
        if !is_safe_segment(&normalized) {
            return None;
        }
        self.root.as_ref().map(|root| root.join(normalized))
    }

    /// Entries directly under the content root; empty when unconfigured or missing
    pub async fn list_root(&self) -> GateResult<Vec<DirEntryInfo>> {
        match &self.root {
            Some(root) => Ok(self.source.list_dir(root).await?.unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }

    /// Check the minimum file set of an identity directory.
    ///
    /// Requires a `locales` subdirectory and a file whose name contains
    /// "qrcode". A "favicon" file is picked up when present.
    pub async fn validate_identity_dir(&self, identity: &str) -> GateResult<Option<IdentityFiles>> {
        let Some(dir) = self.identity_dir(identity) else {
            return Ok(None);
        };
        let Some(entries) = self.source.list_dir(&dir).await? else {
            return Ok(None);
        };

        let has_locales = entries.iter().any(|e| e.is_dir && e.name == LOCALES_DIR);
        let find_file = |needle: &str| {
            entries
                .iter()
                .find(|e| !e.is_dir && e.name.to_lowercase().contains(needle))
                .map(|e| e.name.clone())
        };

        match (has_locales, find_file("qrcode")) {
            (true, Some(qrcode)) => Ok(Some(IdentityFiles {
                qrcode,
                favicon: find_file("favicon"),
            })),
            _ => Ok(None),
        }
    }

    /// Load and normalize one identity. Not-found is `Ok(None)`, never an error.
    pub async fn load_identity_config(&self, identity: &str) -> GateResult<Option<IdentityConfig>> {
        let start = Instant::now();
        let result = self.load_uninstrumented(identity).await;

        let outcome = match &result {
            Ok(Some(_)) => "loaded",
            Ok(None) => "not_found",
            Err(_) => "error",
        };
        metrics::record_config_load(outcome, start.elapsed().as_secs_f64());

        result
    }

    async fn load_uninstrumented(&self, identity: &str) -> GateResult<Option<IdentityConfig>> {
        let normalized = normalize_identity(identity);

        let Some(files) = self.validate_identity_dir(&normalized).await? else {
            debug!("Identity {} not found or incomplete", normalized);
            return Ok(None);
        };
        let Some(dir) = self.identity_dir(&normalized) else {
            return Ok(None);
        };

        let locales = self.load_locales(&dir.join(LOCALES_DIR)).await?;
        Ok(Some(build_config(&normalized, &files, locales)))
    }

    async fn load_locales(&self, dir: &Path) -> GateResult<LocaleSet> {
        let entries = self.source.list_dir(dir).await?.unwrap_or_default();
        let files: BTreeSet<&str> = entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.name.as_str())
            .collect();
        let codes: BTreeSet<&str> = files.iter().copied().filter_map(locale_code).collect();

        let mut locales = LocaleSet::new();
        for code in codes {
            // `.yml` shadows `.yaml` for the same code
            let Some(file_name) = locale_file_names(code)
                .into_iter()
                .find(|name| files.contains(name.as_str()))
            else {
                continue;
            };
            let path = dir.join(&file_name);

            let Some(text) = self.source.read_to_string(&path).await? else {
                continue;
            };
            match parse_bundle(&text) {
                Ok(bundle) => {
                    locales.insert(code.to_string(), bundle);
                }
                Err(GateError::Parse(e)) => {
                    warn!("Skipping locale file {}: {}", path.display(), e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(locales)
    }

    /// Raw bytes of a file inside an identity directory
    pub async fn read_asset(&self, identity: &str, file_name: &str) -> GateResult<Option<Vec<u8>>> {
        if !is_safe_segment(file_name) {
            return Ok(None);
        }
        match self.identity_dir(identity) {
            Some(dir) => self.source.read_bytes(&dir.join(file_name)).await,
            None => Ok(None),
        }
    }
}

fn verify_field(bundle: Option<&LocaleBundle>, field: &str) -> Option<String> {
    bundle
        .and_then(|b| lookup(b, &format!("verify.{}", field)))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn build_config(identity: &str, files: &IdentityFiles, locales: LocaleSet) -> IdentityConfig {
    let base = locales
        .get(BASE_LOCALE)
        .or_else(|| locales.values().next());

    let group_names: BTreeMap<String, String> = locales
        .iter()
        .filter_map(|(code, bundle)| {
            verify_field(Some(bundle), "groupName").map(|name| (code.clone(), name))
        })
        .collect();

    let field_or = |field: &str, default: &str| {
        verify_field(base, field).unwrap_or_else(|| default.to_string())
    };

    IdentityConfig {
        identity: identity.to_string(),
        group_name: field_or("groupName", &identity.to_uppercase()),
        group_names,
        title: field_or("title", DEFAULT_TITLE),
        description: field_or("description", DEFAULT_DESCRIPTION),
        warning_text: field_or("warningText", DEFAULT_WARNING_TEXT),
        unable_to_verify_message: field_or("unableToVerifyMessage", DEFAULT_UNABLE_TO_VERIFY),
        qr_code_url: asset_url(identity, &files.qrcode),
        favicon_url: files.favicon.as_deref().map(|f| asset_url(identity, f)),
        locales,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::DiskContentSource;
    use tempfile::{tempdir, TempDir};

    fn write_identity(root: &Path, name: &str, files: &[(&str, &str)]) {
        let dir = root.join(name);
        std::fs::create_dir_all(dir.join(LOCALES_DIR)).unwrap();
        for (path, contents) in files {
            std::fs::write(dir.join(path), contents).unwrap();
        }
    }

    fn store_at(root: &TempDir) -> ConfigStore {
        ConfigStore::new(Some(root.path().to_path_buf()), Arc::new(DiskContentSource::new()))
    }

    #[tokio::test]
    async fn test_loads_full_identity() {
        let root = tempdir().unwrap();
        write_identity(
            root.path(),
            "chess",
            &[
                ("QRCode.png", "png"),
                ("favicon.ico", "ico"),
                ("locales/zh-CN.yml", "verify:\n  groupName: 国际象棋社\n  title: 身份验证\n"),
                ("locales/en-US.yaml", "verify:\n  groupName: Chess Club\n  title: Verify\n"),
            ],
        );

        let config = store_at(&root).load_identity_config("Chess").await.unwrap().unwrap();

        assert_eq!(config.identity, "chess");
        assert_eq!(config.group_name, "国际象棋社");
        assert_eq!(config.title, "身份验证");
        assert_eq!(config.group_names.len(), 2);
        assert_eq!(config.group_names["en-US"], "Chess Club");
        assert_eq!(config.description, DEFAULT_DESCRIPTION);
        assert_eq!(config.qr_code_url, "/api/identity/chess/assets/QRCode.png");
        assert_eq!(config.favicon_url.as_deref(), Some("/api/identity/chess/assets/favicon.ico"));
        assert_eq!(config.locale_codes(), vec!["en-US", "zh-CN"]);
    }

    #[tokio::test]
    async fn test_base_locale_falls_back_to_first_sorted() {
        let root = tempdir().unwrap();
        write_identity(
            root.path(),
            "go",
            &[
                ("qrcode.jpg", "jpg"),
                ("locales/fr-FR.yml", "verify:\n  title: Vérifier\n"),
                ("locales/de-DE.yml", "verify:\n  title: Prüfen\n"),
            ],
        );

        let config = store_at(&root).load_identity_config("go").await.unwrap().unwrap();
        assert_eq!(config.title, "Prüfen");
        assert_eq!(config.group_name, "GO");
        assert!(config.group_names.is_empty());
    }

    #[tokio::test]
    async fn test_favicon_is_optional() {
        let root = tempdir().unwrap();
        write_identity(root.path(), "plain", &[("qrcode.png", "png"), ("locales/en-US.yml", "a: b\n")]);

        let store = store_at(&root);
        let config = store.load_identity_config("plain").await.unwrap().unwrap();
        assert!(config.favicon_url.is_none());

        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("faviconUrl").is_none());
        assert_eq!(json["qrCodeUrl"], "/api/identity/plain/assets/qrcode.png");
    }

    #[tokio::test]
    async fn test_not_found_cases_never_error() {
        let root = tempdir().unwrap();
        // No qrcode file
        write_identity(root.path(), "noqr", &[("favicon.ico", "ico"), ("locales/en-US.yml", "a: b\n")]);
        // No locales directory
        std::fs::create_dir_all(root.path().join("nolocales")).unwrap();
        std::fs::write(root.path().join("nolocales/qrcode.png"), "png").unwrap();

        let store = store_at(&root);
        for key in ["missing", "noqr", "nolocales", "../etc", "a/b", ""] {
            assert!(store.load_identity_config(key).await.unwrap().is_none(), "{}", key);
        }

        let unconfigured = ConfigStore::new(None, Arc::new(DiskContentSource::new()));
        assert!(unconfigured.load_identity_config("noqr").await.unwrap().is_none());
        assert!(unconfigured.list_root().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broken_locale_is_skipped() {
        let root = tempdir().unwrap();
        write_identity(
            root.path(),
            "mixed",
            &[
                ("qrcode.png", "png"),
                ("locales/en-US.yml", "verify:\n  groupName: Mixed\n"),
                ("locales/zh-CN.yml", "verify: [unclosed"),
                ("locales/notes.txt", "ignored"),
            ],
        );

        let config = store_at(&root).load_identity_config("mixed").await.unwrap().unwrap();
        assert_eq!(config.locale_codes(), vec!["en-US"]);
        assert_eq!(config.group_name, "Mixed");
    }

    #[tokio::test]
    async fn test_locale_bundle_round_trip() {
        let root = tempdir().unwrap();
        let yaml = "verify:\n  groupName: Round Trip\n  nested:\n    deeper: value\n    count: 3\nhome:\n  items:\n    - one\n    - two\n";
        write_identity(root.path(), "rt", &[("qrcode.png", "png"), ("locales/en-US.yml", yaml)]);

        let config = store_at(&root).load_identity_config("rt").await.unwrap().unwrap();
        let loaded = &config.locales["en-US"];

        let written = serde_yaml::to_string(loaded).unwrap();
        let reparsed = parse_bundle(&written).unwrap();
        assert_eq!(&reparsed, loaded);

        assert_eq!(reparsed["verify"]["nested"]["deeper"], "value");
        assert_eq!(reparsed["verify"]["nested"]["count"], 3);
        assert_eq!(reparsed["home"]["items"][1], "two");
        assert_eq!(lookup(&reparsed, "verify.groupName"), Some("Round Trip"));
    }

    #[tokio::test]
    async fn test_yml_shadows_yaml() {
        let root = tempdir().unwrap();
        write_identity(
            root.path(),
            "twins",
            &[
                ("qrcode.png", "png"),
                ("locales/zh-CN.yaml", "verify:\n  groupName: From yaml\n"),
                ("locales/zh-CN.yml", "verify:\n  groupName: From yml\n"),
                ("locales/en-US.yaml", "verify:\n  groupName: Only yaml\n"),
            ],
        );

        let config = store_at(&root).load_identity_config("twins").await.unwrap().unwrap();
        assert_eq!(config.locale_codes(), vec!["en-US", "zh-CN"]);
        assert_eq!(config.group_names["zh-CN"], "From yml");
        assert_eq!(config.group_names["en-US"], "Only yaml");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_locales_dir() {
        let root = tempdir().unwrap();
        let shared = root.path().join("shared-locales");
        std::fs::create_dir_all(&shared).unwrap();
        std::fs::write(shared.join("en-US.yml"), "verify:\n  groupName: Linked\n").unwrap();

        let dir = root.path().join("chess");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("qrcode.png"), "png").unwrap();
        std::os::unix::fs::symlink("../shared-locales", dir.join(LOCALES_DIR)).unwrap();

        let config = store_at(&root).load_identity_config("chess").await.unwrap().unwrap();
        assert_eq!(config.group_name, "Linked");
        assert_eq!(config.locale_codes(), vec!["en-US"]);
    }

    #[tokio::test]
    async fn test_read_asset_stays_in_identity_dir() {
        let root = tempdir().unwrap();
        write_identity(root.path(), "chess", &[("qrcode.png", "PNGDATA"), ("locales/en-US.yml", "a: b\n")]);
        std::fs::write(root.path().join("secret.txt"), "secret").unwrap();

        let store = store_at(&root);
        assert_eq!(store.read_asset("chess", "qrcode.png").await.unwrap().unwrap(), b"PNGDATA");
        assert!(store.read_asset("chess", "../secret.txt").await.unwrap().is_none());
        assert!(store.read_asset("chess", "missing.png").await.unwrap().is_none());
    }
}
