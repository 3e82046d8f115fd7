//! Translation bundle processor
//!
//! Bundles are flat key → text mappings in JSON or YAML. The processor masks placeholders,
//! routes the texts through the fallback router and writes the translated bundle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::errors::{Result, TranslationError};
use crate::core::models::{RoutedTranslation, TranslationRequest};
use crate::core::router::FallbackRouter;
use crate::processors::placeholder::PlaceholderGuard;

/// On-disk bundle format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleFormat {
    Json,
    Yaml,
}

impl BundleFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "json" => Some(BundleFormat::Json),
            "yaml" | "yml" => Some(BundleFormat::Yaml),
            _ => None,
        }
    }
}

/// Ordered key/text pairs of one bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub format: BundleFormat,
    pub entries: Vec<(String, String)>,
}

impl Bundle {
    /// Parse bundle content; non-string values are skipped
    pub fn parse(content: &str, format: BundleFormat) -> Result<Self> {
        let entries = match format {
            BundleFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> =
                    serde_json::from_str(content)?;
                map.into_iter()
                    .filter_map(|(key, value)| match value {
                        serde_json::Value::String(text) => Some((key, text)),
                        other => {
                            warn!("Skipping non-string value for key '{}': {}", key, other);
                            None
                        }
                    })
                    .collect()
            }
            BundleFormat::Yaml => {
                let map: serde_yaml::Mapping = serde_yaml::from_str(content)?;
                let mut entries = Vec::with_capacity(map.len());
                for (key, value) in map {
                    let key = key.as_str().map(str::to_string).ok_or_else(|| {
                        TranslationError::InvalidFormat {
                            format: "YAML bundle keys must be strings".to_string(),
                        }
                    })?;
                    match value {
                        serde_yaml::Value::String(text) => entries.push((key, text)),
                        _ => warn!("Skipping non-string value for key '{}'", key),
                    }
                }
                entries
            }
        };

        Ok(Self { format, entries })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let format = BundleFormat::from_path(path).ok_or_else(|| TranslationError::InvalidFormat {
            format: path.display().to_string(),
        })?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TranslationError::FileError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Self::parse(&content, format)
    }

    pub fn texts(&self) -> Vec<String> {
        self.entries.iter().map(|(_, text)| text.clone()).collect()
    }

    /// Re-zip translations with the original keys
    pub fn with_translations(&self, translations: Vec<String>) -> Result<Self> {
        if translations.len() != self.entries.len() {
            return Err(TranslationError::InvalidResponse {
                message: format!(
                    "expected {} translations, got {}",
                    self.entries.len(),
                    translations.len()
                ),
            });
        }
        let entries = self
            .entries
            .iter()
            .zip(translations)
            .map(|((key, _), text)| (key.clone(), text))
            .collect();
        Ok(Self {
            format: self.format,
            entries,
        })
    }

    pub fn render(&self) -> Result<String> {
        match self.format {
            BundleFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = self
                    .entries
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect();
                Ok(serde_json::to_string_pretty(&map)? + "\n")
            }
            BundleFormat::Yaml => {
                let map: serde_yaml::Mapping = self
                    .entries
                    .iter()
                    .map(|(k, v)| {
                        (
                            serde_yaml::Value::String(k.clone()),
                            serde_yaml::Value::String(v.clone()),
                        )
                    })
                    .collect();
                Ok(serde_yaml::to_string(&map)?)
            }
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| TranslationError::FileError {
                        path: parent.display().to_string(),
                        message: e.to_string(),
                    })?;
            }
        }
        tokio::fs::write(path, self.render()?)
            .await
            .map_err(|e| TranslationError::FileError {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }
}

/// Bundle processor that keeps placeholders intact
#[derive(Clone)]
pub struct BundleProcessor {
    router: Arc<FallbackRouter>,
    guard: PlaceholderGuard,
    cancel: CancellationToken,
}

impl BundleProcessor {
    /// Create a new bundle processor
    pub fn new(router: Arc<FallbackRouter>) -> Self {
        Self {
            router,
            guard: PlaceholderGuard::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight translations when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn router(&self) -> &FallbackRouter {
        &self.router
    }

    /// Find bundle files recursively
    pub fn find_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(TranslationError::FileError {
                path: dir.display().to_string(),
                message: "Not a directory".to_string(),
            });
        }

        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && self.is_bundle_file(p))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Check if file is a bundle
    fn is_bundle_file(&self, path: &Path) -> bool {
        BundleFormat::from_path(path).is_some()
    }

    /// `<dir>/<stem>.<target>.<ext>`, next to the input unless an output directory is given.
    ///
    /// Under an output directory the input's location relative to `input_root` is kept, so
    /// same-named bundles in different subdirectories never share an output file.
    pub fn output_path(
        input: &Path,
        input_root: &Path,
        output_dir: Option<&Path>,
        target_lang: &str,
    ) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "bundle".to_string());
        let ext = input
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "json".to_string());
        let parent = input.parent().unwrap_or_else(|| Path::new(""));
        let dir = match output_dir {
            Some(out) => {
                let relative = parent
                    .strip_prefix(input_root)
                    .unwrap_or_else(|_| Path::new(""));
                out.join(relative)
            }
            None => parent.to_path_buf(),
        };
        dir.join(format!("{}.{}.{}", stem, target_lang, ext))
    }

    /// Translate texts with placeholders masked for the provider
    pub async fn translate_texts(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<RoutedTranslation> {
        let protected: Vec<_> = texts.iter().map(|t| self.guard.protect(t)).collect();
        let request = TranslationRequest::new(
            protected.iter().map(|p| p.text.clone()).collect(),
            target_lang,
        )
        .with_source_lang(source_lang);

        let mut routed = self
            .router
            .translate_batch_with_cancel(&request, &self.cancel)
            .await?;
        routed.texts = routed
            .texts
            .iter()
            .zip(&protected)
            .map(|(translated, p)| self.guard.restore(translated, &p.placeholders))
            .collect();
        Ok(routed)
    }

    pub async fn translate_bundle(
        &self,
        bundle: &Bundle,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<(Bundle, RoutedTranslation)> {
        let routed = self
            .translate_texts(&bundle.texts(), source_lang, target_lang)
            .await?;
        let translated = bundle.with_translations(routed.texts.clone())?;
        Ok((translated, routed))
    }

    /// Translate a single bundle file, returning the provider that served it
    pub async fn translate_file(
        &self,
        input: &Path,
        output: &Path,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String> {
        debug!("Translating: {}", input.display());

        let bundle = Bundle::load(input).await?;
        let (translated, routed) = self
            .translate_bundle(&bundle, source_lang, target_lang)
            .await?;
        translated.save(output).await?;

        info!(
            "Translated: {} -> {} via {} ({} fallbacks)",
            input.display(),
            output.display(),
            routed.provider_used,
            routed.fallback_count
        );
        Ok(routed.provider_used)
    }
}
