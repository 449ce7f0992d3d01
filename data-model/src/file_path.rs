//! Rewriting file path fields against a base directory.

use crate::{
    common::*,
    field::FieldSpec,
    load::is_remote,
    record::Record,
    value::FieldValue,
    visit::{self, FieldVisitor},
};

impl Record {
    /// Makes every file path field below `base` relative to it.
    ///
    /// Fields whose name contains `file_path` are rewritten, including those
    /// of nested records. URLs and paths outside `base` are kept.
    pub fn to_relative_file_paths(&mut self, base: impl AsRef<Path>) -> Result<&mut Self> {
        let base = base.as_ref();
        visit::walk_mut(
            self,
            &mut FilePathVisitor {
                rewrite: &|path: &Path| path.strip_prefix(base).ok().map(Path::to_path_buf),
            },
        )?;
        Ok(self)
    }

    /// Joins every relative file path field onto `base`.
    pub fn to_absolute_file_paths(&mut self, base: impl AsRef<Path>) -> Result<&mut Self> {
        let base = base.as_ref();
        visit::walk_mut(
            self,
            &mut FilePathVisitor {
                rewrite: &|path: &Path| path.is_relative().then(|| base.join(path)),
            },
        )?;
        Ok(self)
    }
}

fn is_file_path_field(field: &FieldSpec) -> bool {
    field.name().contains("file_path")
}

struct FilePathVisitor<'a> {
    rewrite: &'a dyn Fn(&Path) -> Option<PathBuf>,
}

impl FilePathVisitor<'_> {
    fn rewrite_value(&self, value: &mut FieldValue) -> Result<()> {
        match value {
            FieldValue::Str(location) if !is_remote(location) => {
                if let Some(path) = (self.rewrite)(Path::new(location)) {
                    *location = path
                        .to_str()
                        .ok_or_else(|| format_err!("non UTF-8 path '{}'", path.display()))?
                        .to_owned();
                }
            }
            FieldValue::List(list) => {
                list.iter_mut()
                    .try_for_each(|item| self.rewrite_value(item))?;
            }
            _ => {}
        }
        Ok(())
    }
}

impl FieldVisitor for FilePathVisitor<'_> {
    const OPERATION: &'static str = "rewrite the path of";

    fn visit_record(&mut self, record: &mut Record) -> Result<()> {
        visit::walk_mut(record, self)
    }

    fn visit_record_list(&mut self, _field: &FieldSpec, list: &mut [FieldValue]) -> Result<()> {
        list.iter_mut()
            .filter_map(|item| item.as_record_mut())
            .try_for_each(|record| visit::walk_mut(record, self))
    }

    fn visit_value(&mut self, field: &FieldSpec, value: &mut FieldValue) -> Result<()> {
        if is_file_path_field(field) {
            self.rewrite_value(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::image::Image;

    #[test]
    fn rewrite_image_file_path() {
        let mut image = Image::from_file_path("/data/docs/page-1.png").unwrap();
        image.to_relative_file_paths("/data").unwrap();
        assert_eq!(image.get_str("file_path").unwrap(), "docs/page-1.png");

        image.to_absolute_file_paths("/mnt/store").unwrap();
        assert_eq!(
            image.get_str("file_path").unwrap(),
            "/mnt/store/docs/page-1.png"
        );

        let mut remote = Image::from_file_path("https://example.com/page.png").unwrap();
        remote.to_relative_file_paths("/data").unwrap();
        assert_eq!(
            remote.get_str("file_path").unwrap(),
            "https://example.com/page.png"
        );
    }
}
