//! OTA distribution client implementation

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{try_join_all, BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use url::Url;

use crate::error::{OtaError, Result};
use crate::merge;
use crate::types::{ClientOptions, FileTranslation, LanguageInfo, Manifest, TranslationContent};

/// Root of the production content-delivery network.
pub const BASE_URL: &str = "https://distributions.crowdin.net";

/// Locale used when no explicit language code is configured and none can be
/// detected from the environment.
pub const DEFAULT_LOCALE: &str = "en";

/// Client library version, exposed as read-only metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One cached (file, language) fetch. Cloning the shared future lets
/// concurrent callers await the same request instead of issuing duplicates.
type SharedFetch = Shared<BoxFuture<'static, Option<TranslationContent>>>;

/// Client for one published distribution.
///
/// Holds a manifest cache and a per-file, per-language strings cache.
/// Cloning is cheap and clones share both caches, like they share the
/// underlying connection pool.
#[derive(Clone)]
pub struct OtaClient {
    http: Client,
    base_url: Url,
    hash: String,
    default_locale: String,
    locale: Arc<RwLock<String>>,
    options: ClientOptions,
    manifest_cache: Arc<tokio::sync::Mutex<Option<Arc<Manifest>>>>,
    strings_cache: Arc<Mutex<HashMap<String, HashMap<String, SharedFetch>>>>,
}

impl OtaClient {
    /// Create a client for the distribution identified by `hash`.
    ///
    /// # Arguments
    /// * `hash` - Distribution hash from the project's OTA settings
    /// * `options` - Cache and merge behavior, see [`ClientOptions`]
    pub fn new(hash: impl Into<String>, options: ClientOptions) -> Result<Self> {
        Self::with_base_url(hash, BASE_URL, options)
    }

    /// Create a client pointed at a custom content-delivery root.
    ///
    /// Used by the [`testing`](crate::testing) harness to target an
    /// in-process server.
    pub fn with_base_url(
        hash: impl Into<String>,
        base_url: &str,
        options: ClientOptions,
    ) -> Result<Self> {
        let hash = hash.into();
        if hash.trim().is_empty() {
            return Err(OtaError::InvalidDistributionHash(hash));
        }

        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        let base_url = Url::parse(base_url)?;

        let default_locale = options
            .language_code
            .clone()
            .unwrap_or_else(preferred_locale);

        Ok(Self {
            http,
            base_url,
            hash,
            locale: Arc::new(RwLock::new(default_locale.clone())),
            default_locale,
            options,
            manifest_cache: Arc::new(tokio::sync::Mutex::new(None)),
            strings_cache: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Get the distribution hash
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Get the content-delivery root URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // =========================================================================
    // Locale Resolution
    // =========================================================================

    /// Resolve an explicit language code against the client's current locale.
    ///
    /// An explicitly supplied code always wins, even an empty one; pass
    /// `None` to use the current locale.
    pub fn language_code(&self, lang: Option<&str>) -> String {
        match lang {
            Some(code) => code.to_string(),
            None => self.locale.read().clone(),
        }
    }

    /// Get the current default locale
    pub fn current_locale(&self) -> String {
        self.locale.read().clone()
    }

    /// Change the default locale.
    ///
    /// `None` resets to the locale detected at construction.
    pub fn set_current_locale(&self, locale: Option<&str>) {
        let mut current = self.locale.write();
        *current = locale
            .map(str::to_string)
            .unwrap_or_else(|| self.default_locale.clone());
    }

    // =========================================================================
    // Manifest
    // =========================================================================

    /// URL of the distribution manifest
    pub fn manifest_url(&self) -> Result<Url> {
        Ok(self.base_url.join(&format!("/{}/manifest.json", self.hash))?)
    }

    /// Fetch the distribution manifest, serving repeated calls from cache.
    ///
    /// The cache slot lock is held across the fetch, so concurrent first
    /// calls coalesce on a single HTTP request. Failed fetches are not
    /// cached and are retried on the next access.
    #[instrument(skip(self))]
    pub async fn manifest(&self) -> Result<Arc<Manifest>> {
        let mut slot = self.manifest_cache.lock().await;
        if !self.options.disable_manifest_cache {
            if let Some(manifest) = slot.as_ref() {
                return Ok(Arc::clone(manifest));
            }
        }

        let manifest = Arc::new(self.fetch_manifest().await?);
        *slot = Some(Arc::clone(&manifest));
        Ok(manifest)
    }

    async fn fetch_manifest(&self) -> Result<Manifest> {
        let url = self.manifest_url()?;
        debug!("fetching manifest from {}", url);

        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OtaError::unexpected_status(status.as_u16(), url));
        }

        response
            .json()
            .await
            .map_err(|e| OtaError::Parse(e.to_string()))
    }

    /// Unix timestamp of the distribution's last publish
    pub async fn manifest_timestamp(&self) -> Result<i64> {
        Ok(self.manifest().await?.timestamp)
    }

    /// File paths exported into the distribution, in manifest order
    pub async fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.manifest().await?.files.clone())
    }

    /// Language codes the distribution carries translations for
    pub async fn list_languages(&self) -> Result<Vec<String>> {
        Ok(self.manifest().await?.languages.clone())
    }

    /// Per-locale placeholder overrides; empty when the distribution has none
    pub async fn language_mappings(&self) -> Result<HashMap<String, HashMap<String, String>>> {
        Ok(self.manifest().await?.language_mapping.clone())
    }

    /// Custom language definitions; empty when the distribution has none
    pub async fn custom_languages(&self) -> Result<HashMap<String, Value>> {
        Ok(self.manifest().await?.custom_languages.clone())
    }

    /// Details of the distribution's languages.
    ///
    /// Not implemented yet: always resolves to an empty list. Callers must
    /// not rely on the result being meaningful.
    pub async fn languages(&self) -> Result<Vec<LanguageInfo>> {
        Ok(Vec::new())
    }

    /// JSON files of the distribution, optionally restricted to one path.
    ///
    /// The `.json` suffix match is case-insensitive; manifest order is kept.
    #[instrument(skip(self))]
    pub async fn json_files(&self, file: Option<&str>) -> Result<Vec<String>> {
        let manifest = self.manifest().await?;
        Ok(manifest
            .files
            .iter()
            .filter(|path| path.to_lowercase().ends_with(".json"))
            .filter(|path| file.map_or(true, |wanted| path.as_str() == wanted))
            .cloned()
            .collect())
    }

    // =========================================================================
    // Translation Fetches
    // =========================================================================

    fn content_url(&self, lang: &str, file: &str, timestamp: i64) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("/{}/content/{}{}", self.hash, lang, file))?;
        url.set_query(Some(&format!("timestamp={}", timestamp)));
        Ok(url)
    }

    /// Fetch one file's translation for a language.
    ///
    /// Resolves to `Ok(None)` when the file has no translation for the
    /// language or the content fetch fails, so batch operations degrade to
    /// partial data instead of failing wholesale. Manifest resolution
    /// failures still propagate.
    ///
    /// Applying the manifest's language mapping to placeholders in the file
    /// path is a future extension; paths are used verbatim for now.
    #[instrument(skip(self))]
    pub async fn file_translations(
        &self,
        file: &str,
        lang: Option<&str>,
    ) -> Result<Option<TranslationContent>> {
        let lang = self.language_code(lang);
        let timestamp = self.manifest_timestamp().await?;
        let url = self.content_url(&lang, file, timestamp)?;
        Ok(self.fetch_content(url).await)
    }

    /// Issue the content request, converting every failure into `None`.
    async fn fetch_content(&self, url: Url) -> Option<TranslationContent> {
        debug!("fetching translation content from {}", url);

        let response = match self.http.get(url.clone()).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!("content request to {} failed: {}", url, err);
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!("content request to {} answered {}", url, status);
            return None;
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            match response.json().await {
                Ok(value) => Some(TranslationContent::Json(value)),
                Err(err) => {
                    debug!("malformed JSON from {}: {}", url, err);
                    None
                }
            }
        } else {
            match response.text().await {
                Ok(text) => Some(TranslationContent::Text(text)),
                Err(err) => {
                    debug!("failed to read body from {}: {}", url, err);
                    None
                }
            }
        }
    }

    /// Translations of every exported file for one language, fetched
    /// concurrently.
    #[instrument(skip(self))]
    pub async fn language_translations(&self, lang: Option<&str>) -> Result<Vec<FileTranslation>> {
        let lang = self.language_code(lang);
        let files = self.list_files().await?;

        let fetches = files.into_iter().map(|file| {
            let lang = lang.clone();
            async move {
                let content = self.file_translations(&file, Some(&lang)).await?;
                Ok::<_, OtaError>(FileTranslation { file, content })
            }
        });

        try_join_all(fetches).await
    }

    /// Translations of every file in every language, keyed by language code.
    #[instrument(skip(self))]
    pub async fn translations(&self) -> Result<HashMap<String, Vec<FileTranslation>>> {
        let languages = self.list_languages().await?;

        let fetches = languages.into_iter().map(|lang| async move {
            let translations = self.language_translations(Some(&lang)).await?;
            Ok::<_, OtaError>((lang, translations))
        });

        Ok(try_join_all(fetches).await?.into_iter().collect())
    }

    // =========================================================================
    // Merged Strings
    // =========================================================================

    /// Merge the JSON translations of `files` for one language into a flat map.
    ///
    /// Files are processed strictly in list order so that later files
    /// override earlier ones on key collisions; with deep merge (the
    /// default) nested objects are combined key by key. Missing or non-JSON
    /// payloads contribute nothing.
    ///
    /// With caching enabled each (file, language) pair is fetched at most
    /// once per client; concurrent callers racing on the same slot share a
    /// single in-flight request.
    #[instrument(skip(self, files))]
    pub async fn strings_by_files_and_locale<S: AsRef<str>>(
        &self,
        files: &[S],
        lang: Option<&str>,
    ) -> Result<Map<String, Value>> {
        let mut merged = Map::new();
        if files.is_empty() {
            return Ok(merged);
        }

        let lang = self.language_code(lang);
        let timestamp = self.manifest_timestamp().await?;

        for file in files {
            let file = file.as_ref();
            let content = if self.options.disable_strings_cache {
                let url = self.content_url(&lang, file, timestamp)?;
                self.fetch_content(url).await
            } else {
                self.translation_fetch(file, &lang, timestamp)?.await
            };

            if let Some(TranslationContent::Json(Value::Object(strings))) = content {
                merge::merge_object(&mut merged, strings, !self.options.disable_json_deep_merge);
            }
        }

        Ok(merged)
    }

    /// Atomically get or create the shared fetch for one (file, language)
    /// cache slot.
    fn translation_fetch(&self, file: &str, lang: &str, timestamp: i64) -> Result<SharedFetch> {
        let url = self.content_url(lang, file, timestamp)?;
        let mut cache = self.strings_cache.lock();
        let slot = cache
            .entry(file.to_string())
            .or_default()
            .entry(lang.to_string())
            .or_insert_with(|| {
                let client = self.clone();
                async move { client.fetch_content(url).await }.boxed().shared()
            });
        Ok(slot.clone())
    }

    /// Merged strings of the distribution's JSON files for one language.
    #[instrument(skip(self))]
    pub async fn strings_by_locale(
        &self,
        file: Option<&str>,
        lang: Option<&str>,
    ) -> Result<Map<String, Value>> {
        let files = self.json_files(file).await?;
        self.strings_by_files_and_locale(&files, lang).await
    }

    /// Look up a single value by key path in the merged strings of a language.
    ///
    /// `path` walks nested objects segment by segment, short-circuiting to
    /// `None` as soon as a segment is missing. An empty path yields `None`.
    #[instrument(skip(self))]
    pub async fn string_by_key(
        &self,
        path: &[&str],
        file: Option<&str>,
        lang: Option<&str>,
    ) -> Result<Option<Value>> {
        let strings = self.strings_by_locale(file, lang).await?;

        let (first, rest) = match path.split_first() {
            Some(parts) => parts,
            None => return Ok(None),
        };

        let mut current = match strings.get(*first) {
            Some(value) => value,
            None => return Ok(None),
        };
        for segment in rest {
            current = match current.get(segment) {
                Some(value) => value,
                None => return Ok(None),
            };
        }

        Ok(Some(current.clone()))
    }

    /// Merged strings for every language, keyed by language code.
    #[instrument(skip(self))]
    pub async fn strings(&self, file: Option<&str>) -> Result<HashMap<String, Map<String, Value>>> {
        let languages = self.list_languages().await?;

        let lookups = languages.into_iter().map(|lang| async move {
            let strings = self.strings_by_locale(file, Some(&lang)).await?;
            Ok::<_, OtaError>((lang, strings))
        });

        Ok(try_join_all(lookups).await?.into_iter().collect())
    }

    /// Drop every cached (file, language) translation.
    ///
    /// Shared futures already handed to in-flight callers keep resolving to
    /// their originally fetched content; later accesses fetch fresh. The
    /// manifest cache is untouched.
    pub fn clear_strings_cache(&self) {
        self.strings_cache.lock().clear();
    }
}

impl fmt::Debug for OtaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtaClient")
            .field("hash", &self.hash)
            .field("base_url", &self.base_url.as_str())
            .field("locale", &*self.locale.read())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Preferred locale of the current system, falling back to [`DEFAULT_LOCALE`].
fn preferred_locale() -> String {
    sys_locale::get_locale().unwrap_or_else(|| DEFAULT_LOCALE.to_string())
}
