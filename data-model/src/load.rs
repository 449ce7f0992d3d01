//! Lazy loading of external record content.

use crate::{
    common::*,
    config::LoaderConfig,
    field::FieldSpec,
    record::{LoadState, Record},
    value::FieldValue,
    visit::{self, FieldVisitor},
};
use reqwest::blocking::Client;
use std::time::Duration;

static DEFAULT_LOADER: Lazy<DefaultLoader> = Lazy::new(DefaultLoader::default);

/// Reads the content at a file path or URL.
pub trait ContentLoader {
    fn read_bytes(&self, location: &str) -> Result<Vec<u8>>;

    fn read_text(&self, location: &str) -> Result<String> {
        let bytes = self.read_bytes(location)?;
        String::from_utf8(bytes).map_err(|_| {
            DataModelError::validation(location, "the content is not valid UTF-8").into()
        })
    }
}

/// Record specific loading and unloading of external content.
pub trait ResourceHooks: Send + Sync {
    /// Called after the nested records are loaded.
    fn load(&self, record: &mut Record, loader: &dyn ContentLoader) -> Result<()>;

    /// Called after the nested records are unloaded.
    fn unload(&self, record: &mut Record) -> Result<()>;
}

/// Returns true for http and https URLs.
pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Reads local files and fetches http(s) URLs.
#[derive(Debug)]
pub struct DefaultLoader {
    config: LoaderConfig,
    client: OnceCell<Client>,
}

impl DefaultLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Joins a relative path onto the data directory if one is configured.
    pub fn resolve_path(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        match &self.config.data_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_owned(),
        }
    }

    fn client(&self) -> Result<&Client> {
        self.client.get_or_try_init(|| {
            let mut builder =
                Client::builder().timeout(Duration::from_secs(self.config.http_timeout_secs));
            if let Some(user_agent) = &self.config.user_agent {
                builder = builder.user_agent(user_agent.clone());
            }
            Ok(builder.build()?)
        })
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        ensure!(
            self.config.allow_remote,
            DataModelError::validation(url, "remote locations are disabled")
        );
        let fetch_failed = |reason: String| DataModelError::FetchFailed {
            url: url.to_owned(),
            reason,
        };

        debug!("fetch '{}'", url);
        let response = self
            .client()?
            .get(url)
            .send()
            .map_err(|err| fetch_failed(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            bail!(fetch_failed(format!("status {}", status)));
        }
        let bytes = response
            .bytes()
            .map_err(|err| fetch_failed(err.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn read_local(&self, location: &str) -> Result<Vec<u8>> {
        let path = self.resolve_path(location);
        ensure!(path.exists(), DataModelError::NotFound { path });
        ensure!(
            path.is_file(),
            DataModelError::validation(location, "the location is not a regular file")
        );
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        Ok(bytes)
    }
}

impl Default for DefaultLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl ContentLoader for DefaultLoader {
    fn read_bytes(&self, location: &str) -> Result<Vec<u8>> {
        if is_remote(location) {
            self.fetch(location)
        } else {
            self.read_local(location)
        }
    }
}

impl Record {
    /// Loads external content with the default loader.
    pub fn load(&mut self) -> Result<&mut Self> {
        self.load_with(&*DEFAULT_LOADER)
    }

    /// Loads the nested records, then runs the load hook of this record.
    ///
    /// Loading a loaded record does nothing.
    pub fn load_with(&mut self, loader: &dyn ContentLoader) -> Result<&mut Self> {
        if self.is_loaded() {
            return Ok(self);
        }
        visit::walk_mut(self, &mut LoadVisitor { loader })?;
        if let Some(hooks) = self.schema().hooks() {
            hooks
                .load(self, loader)
                .with_context(|| format!("failed to load '{}'", self.name()))?;
        }
        self.set_load_state(LoadState::Loaded);
        Ok(self)
    }

    /// Releases external content. Unloading an unloaded record does nothing.
    pub fn unload(&mut self) -> Result<&mut Self> {
        if !self.is_loaded() {
            return Ok(self);
        }
        visit::walk_mut(self, &mut UnloadVisitor)?;
        if let Some(hooks) = self.schema().hooks() {
            hooks
                .unload(self)
                .with_context(|| format!("failed to unload '{}'", self.name()))?;
        }
        self.set_load_state(LoadState::Unloaded);
        Ok(self)
    }
}

struct LoadVisitor<'a> {
    loader: &'a dyn ContentLoader,
}

impl FieldVisitor for LoadVisitor<'_> {
    const OPERATION: &'static str = "load";

    fn visit_record(&mut self, record: &mut Record) -> Result<()> {
        record.load_with(self.loader)?;
        Ok(())
    }

    fn visit_record_list(&mut self, _field: &FieldSpec, list: &mut [FieldValue]) -> Result<()> {
        list.iter_mut()
            .filter_map(|item| item.as_record_mut())
            .try_for_each(|record| record.load_with(self.loader).map(|_| ()))
    }

    fn visit_value(&mut self, _field: &FieldSpec, _value: &mut FieldValue) -> Result<()> {
        Ok(())
    }
}

struct UnloadVisitor;

impl FieldVisitor for UnloadVisitor {
    const OPERATION: &'static str = "unload";

    fn visit_record(&mut self, record: &mut Record) -> Result<()> {
        record.unload()?;
        Ok(())
    }

    fn visit_record_list(&mut self, _field: &FieldSpec, list: &mut [FieldValue]) -> Result<()> {
        list.iter_mut()
            .filter_map(|item| item.as_record_mut())
            .try_for_each(|record| record.unload().map(|_| ()))
    }

    fn visit_value(&mut self, _field: &FieldSpec, _value: &mut FieldValue) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_loader_reads_local_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.txt"), "hello").unwrap();

        let loader = DefaultLoader::new(LoaderConfig {
            data_dir: Some(dir.path().to_owned()),
            ..LoaderConfig::default()
        });
        assert_eq!(loader.read_text("page.txt").unwrap(), "hello");

        let err = loader.read_bytes("missing.txt").unwrap_err();
        let kind = DataModelError::find(&err).unwrap();
        assert!(matches!(kind, DataModelError::NotFound { .. }));
        assert!(!kind.is_retryable());

        assert!(loader.read_bytes(".").is_err());
    }

    #[test]
    fn remote_fetch_can_be_disabled() {
        let loader = DefaultLoader::new(LoaderConfig {
            allow_remote: false,
            ..LoaderConfig::default()
        });
        let err = loader.read_bytes("https://example.com/a.png").unwrap_err();
        assert!(matches!(
            DataModelError::find(&err),
            Some(DataModelError::Validation { .. })
        ));
        assert!(is_remote("http://localhost/a"));
        assert!(!is_remote("/data/a.png"));
    }
}
