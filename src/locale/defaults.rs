/// Home-page locale set, loaded from a directory outside the content root
use super::{is_safe_segment, locale_code, locale_file_names, parse_bundle, LocaleBundle, LocaleSet, BASE_LOCALE};
use crate::{
    cache::{ExpiringCache, RefreshFn, RefreshFuture},
    content::ContentSource,
    error::{GateError, GateResult},
};
use futures::FutureExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const CACHE_KEY: &str = "default_locales";

/// Reads locale files from one directory
#[derive(Clone)]
struct LocaleDir {
    dir: PathBuf,
    source: Arc<dyn ContentSource>,
}

impl LocaleDir {
    async fn codes(&self) -> GateResult<Vec<String>> {
        let entries = self.source.list_dir(&self.dir).await?.unwrap_or_default();

        let mut codes: Vec<String> = entries
            .iter()
            .filter(|entry| !entry.is_dir)
            .filter_map(|entry| locale_code(&entry.name))
            .map(str::to_string)
            .collect();
        codes.sort();
        codes.dedup();
        Ok(codes)
    }

    async fn bundle(&self, code: &str) -> GateResult<Option<LocaleBundle>> {
        if !is_safe_segment(code) {
            return Ok(None);
        }

        for file_name in locale_file_names(code) {
            if let Some(text) = self.source.read_to_string(&self.dir.join(&file_name)).await? {
                return parse_bundle(&text).map(Some);
            }
        }
        Ok(None)
    }

    /// Every parseable bundle; a broken file is skipped
    async fn load_all(&self) -> GateResult<LocaleSet> {
        let mut set = LocaleSet::new();
        for code in self.codes().await? {
            match self.bundle(&code).await {
                Ok(Some(bundle)) => {
                    set.insert(code, bundle);
                }
                Ok(None) => {}
                Err(GateError::Parse(e)) => {
                    warn!("Skipping default locale {}: {}", code, e);
                }
                Err(e) => return Err(e),
            }
        }
        debug!("Loaded {} default locales from {}", set.len(), self.dir.display());
        Ok(set)
    }
}

/// Default locale list and bundles
pub struct DefaultLocales {
    loader: LocaleDir,
    cache: Arc<ExpiringCache<Arc<LocaleSet>>>,
}

impl DefaultLocales {
    pub fn new(dir: PathBuf, source: Arc<dyn ContentSource>, ttl: Duration) -> Self {
        Self::with_cache(dir, source, Arc::new(ExpiringCache::new("default_locales", ttl)))
    }

    /// Build on an existing cache (tests inject a manual clock this way)
    pub fn with_cache(
        dir: PathBuf,
        source: Arc<dyn ContentSource>,
        cache: Arc<ExpiringCache<Arc<LocaleSet>>>,
    ) -> Self {
        Self {
            loader: LocaleDir { dir, source },
            cache,
        }
    }

    pub fn cache(&self) -> Arc<ExpiringCache<Arc<LocaleSet>>> {
        Arc::clone(&self.cache)
    }

    /// Sorted locale codes; `["zh-CN"]` when the directory is missing or empty
    pub async fn available(&self) -> GateResult<Vec<String>> {
        let codes = self.loader.codes().await?;
        if codes.is_empty() {
            return Ok(vec![BASE_LOCALE.to_string()]);
        }
        Ok(codes)
    }

    /// One bundle, read fresh from disk
    pub async fn bundle(&self, locale: &str) -> GateResult<LocaleBundle> {
        match self.loader.bundle(locale).await {
            Ok(Some(bundle)) => Ok(bundle),
            Ok(None) => Err(GateError::NotFound(format!("Locale {} not found", locale))),
            Err(GateError::Parse(e)) => Err(GateError::Validation(format!(
                "Invalid locale file {}: {}",
                locale, e
            ))),
            Err(e) => Err(e),
        }
    }

    /// Every default locale, cached
    pub async fn all(&self) -> GateResult<Arc<LocaleSet>> {
        if let Some(set) = self.cache.get(CACHE_KEY).await {
            return Ok(set);
        }

        let set = Arc::new(self.loader.load_all().await?);
        let loader = self.loader.clone();
        let refresh: RefreshFn<Arc<LocaleSet>> = Arc::new(move || -> RefreshFuture<Arc<LocaleSet>> {
            let loader = loader.clone();
            async move { loader.load_all().await.map(Arc::new) }.boxed()
        });
        self.cache
            .set_with_refresh(CACHE_KEY, Arc::clone(&set), None, refresh)
            .await;

        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{testing::CountingSource, DiskContentSource};
    use tempfile::tempdir;

    fn defaults_at(dir: &std::path::Path) -> DefaultLocales {
        DefaultLocales::new(
            dir.to_path_buf(),
            Arc::new(DiskContentSource::new()),
            Duration::from_secs(900),
        )
    }

    #[tokio::test]
    async fn test_available_sorted() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("zh-CN.yml"), "a: b\n").unwrap();
        std::fs::write(dir.path().join("en-US.yaml"), "a: b\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "docs").unwrap();

        let locales = defaults_at(dir.path());
        assert_eq!(locales.available().await.unwrap(), vec!["en-US", "zh-CN"]);
    }

    #[tokio::test]
    async fn test_yml_shadows_yaml() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("zh-CN.yaml"), "home:\n  title: yaml\n").unwrap();
        std::fs::write(dir.path().join("zh-CN.yml"), "home:\n  title: yml\n").unwrap();

        let locales = defaults_at(dir.path());
        assert_eq!(locales.available().await.unwrap(), vec!["zh-CN"]);
        assert_eq!(locales.bundle("zh-CN").await.unwrap()["home"]["title"], "yml");
        assert_eq!(locales.all().await.unwrap()["zh-CN"]["home"]["title"], "yml");
    }

    #[tokio::test]
    async fn test_available_defaults_to_zh_cn() {
        let dir = tempdir().unwrap();
        let empty = defaults_at(dir.path());
        assert_eq!(empty.available().await.unwrap(), vec!["zh-CN"]);

        let missing = defaults_at(&dir.path().join("absent"));
        assert_eq!(missing.available().await.unwrap(), vec!["zh-CN"]);
    }

    #[tokio::test]
    async fn test_bundle_errors() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("en-US.yml"), "home:\n  title: Welcome\n").unwrap();
        std::fs::write(dir.path().join("bad.yml"), "- not\n- a map\n").unwrap();

        let locales = defaults_at(dir.path());
        let bundle = locales.bundle("en-US").await.unwrap();
        assert_eq!(bundle["home"]["title"], "Welcome");

        assert!(matches!(locales.bundle("fr-FR").await, Err(GateError::NotFound(_))));
        assert!(matches!(locales.bundle("bad").await, Err(GateError::Validation(_))));
        assert!(matches!(locales.bundle("../en-US").await, Err(GateError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_all_skips_broken_files_and_caches() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("en-US.yml"), "home:\n  title: Welcome\n").unwrap();
        std::fs::write(dir.path().join("zh-CN.yml"), "home: [broken").unwrap();

        let counting = Arc::new(CountingSource::new(Arc::new(DiskContentSource::new())));
        let locales = DefaultLocales::new(dir.path().to_path_buf(), counting.clone(), Duration::from_secs(900));

        let first = locales.all().await.unwrap();
        assert_eq!(first.keys().collect::<Vec<_>>(), vec!["en-US"]);

        let calls = counting.calls();
        let second = locales.all().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(counting.calls(), calls);
    }
}
