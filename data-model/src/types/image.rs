//! Images referenced by file path or URL and loaded on demand.

use super::insert_all;
use crate::{
    common::*,
    encoding,
    field::{BatchPolicy, FieldSpec, FieldType, TensorSpec},
    load::{is_remote, ContentLoader, ResourceHooks},
    record::Record,
    registry::Registry,
    schema::RecordSchema,
    value::FieldValue,
};
use image::imageops::FilterType;

pub const MODULE: &str = "generic.image";

static IMAGE_HOOKS: ImageHooks = ImageHooks;

static IMAGE: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(MODULE, "Image")
        .counterpart("generic.image.TensorImage")
        .field(
            FieldSpec::new("file_path", FieldType::Str)
                .optional()
                .batch(BatchPolicy::Skip),
        )
        .field(FieldSpec::new("content", FieldType::Image).optional())
        .field(FieldSpec::new("width", FieldType::Int).optional())
        .field(FieldSpec::new("height", FieldType::Int).optional())
        .hooks(&IMAGE_HOOKS)
        .normalizer(fill_dimensions)
        .build()
        .expect("the built-in Image schema is well-formed")
});

static TENSOR_IMAGE: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(MODULE, "TensorImage")
        .counterpart("generic.image.Image")
        .field(
            FieldSpec::new("file_path", FieldType::Str)
                .optional()
                .batch(BatchPolicy::Skip),
        )
        .field(FieldSpec::new("content", FieldType::Tensor(TensorSpec::float(3))).optional())
        .field(FieldSpec::new("width", FieldType::Tensor(TensorSpec::int(0))).optional())
        .field(FieldSpec::new("height", FieldType::Tensor(TensorSpec::int(0))).optional())
        .normalizer(add_channel_dim)
        .build()
        .expect("the built-in TensorImage schema is well-formed")
});

pub(super) fn register(registry: &mut Registry) {
    insert_all(registry, &[&IMAGE, &TENSOR_IMAGE]);
}

pub struct Image;

impl Image {
    pub fn schema() -> &'static RecordSchema {
        &IMAGE
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_IMAGE
    }

    /// Creates an unloaded image referring to a local path or an http(s) URL.
    pub fn from_file_path(file_path: impl Into<String>) -> Result<Record> {
        Record::new(Self::schema(), [("file_path", FieldValue::from(file_path.into()))])
    }

    pub fn from_content(content: DynamicImage) -> Result<Record> {
        Record::new(Self::schema(), [("content", FieldValue::from(content))])
    }
}

struct ImageHooks;

impl ResourceHooks for ImageHooks {
    fn load(&self, record: &mut Record, loader: &dyn ContentLoader) -> Result<()> {
        if !record.get("content")?.is_none() {
            return Ok(());
        }
        let file_path = record.get("file_path")?.as_str().ok_or_else(|| {
            DataModelError::validation("file_path", "either file_path or content must be set")
        })?;
        let bytes = loader.read_bytes(file_path)?;
        let content = encoding::decode_image(&bytes)
            .with_context(|| format!("failed to decode the image at '{}'", file_path))?;
        record.set("content", content)?;
        fill_dimensions(record)
    }

    fn unload(&self, record: &mut Record) -> Result<()> {
        record.set("content", FieldValue::None)
    }
}

/// Fills missing dimensions from the content, or from the header of an
/// existing local file.
fn fill_dimensions(record: &mut Record) -> Result<()> {
    if record.is_batched()
        || (!record.get("width")?.is_none() && !record.get("height")?.is_none())
    {
        return Ok(());
    }

    let size = match record.get("content")? {
        FieldValue::Image(content) => Some(content.dimensions()),
        _ => match record.get("file_path")?.as_str() {
            Some(path) if !is_remote(path) && Path::new(path).is_file() => {
                match imagesize::size(path) {
                    Ok(size) => Some((size.width as u32, size.height as u32)),
                    Err(err) => {
                        debug!("unable to read the image size of '{}': {}", path, err);
                        None
                    }
                }
            }
            _ => None,
        },
    };

    if let Some((width, height)) = size {
        record.set("width", width as i64)?;
        record.set("height", height as i64)?;
    }
    Ok(())
}

fn add_channel_dim(record: &mut Record) -> Result<()> {
    let depth = record.batch_depth();
    if let FieldValue::Tensor(content) = record.get_mut("content")? {
        if content.dim() == depth + 2 {
            *content = content.f_unsqueeze(depth as i64)?;
        }
    }
    Ok(())
}

/// Pixel helpers on image records.
///
/// Raw images must be unbatched and loaded. Tensor images are channel-first
/// and may be batched.
pub trait ImageExt {
    /// `(width, height)` if known.
    fn size(&self) -> Result<Option<(i64, i64)>>;

    fn channels(&self) -> Result<i64>;

    /// `[channels, height, width]`, with leading batch dimensions for tensors.
    fn shape(&self) -> Result<Vec<i64>>;

    fn to_rgb(&mut self) -> Result<&mut Self>;

    fn to_grayscale(&mut self) -> Result<&mut Self>;

    fn resize(&mut self, width: u32, height: u32) -> Result<&mut Self>;

    /// Subtracts the mean and divides by the std per channel. Tensor images only.
    fn normalize(&mut self, mean: &[f64], std: &[f64]) -> Result<&mut Self>;
}

impl ImageExt for Record {
    fn size(&self) -> Result<Option<(i64, i64)>> {
        check_is_image(self)?;
        if self.is_tensor() {
            if let FieldValue::Tensor(content) = self.get("content")? {
                let shape = content.size();
                return Ok(Some((shape[shape.len() - 1], shape[shape.len() - 2])));
            }
        }
        let width = self.get("width")?.as_int();
        let height = self.get("height")?.as_int();
        Ok(width.zip(height))
    }

    fn channels(&self) -> Result<i64> {
        let shape = self.shape()?;
        Ok(shape[shape.len() - 3])
    }

    fn shape(&self) -> Result<Vec<i64>> {
        if self.is_tensor() {
            return Ok(tensor_content(self)?.size());
        }
        let content = raw_content(self)?;
        let (width, height) = content.dimensions();
        let channels = content.color().channel_count() as i64;
        Ok(vec![channels, height as i64, width as i64])
    }

    fn to_rgb(&mut self) -> Result<&mut Self> {
        if self.is_tensor() {
            let content = tensor_content(self)?;
            let channel_dim = content.dim() - 3;
            let rgb = match content.size()[channel_dim] {
                3 => return Ok(self),
                1 => {
                    let mut repeats = vec![1; content.dim()];
                    repeats[channel_dim] = 3;
                    content.f_repeat(&repeats)?
                }
                channels => bail!(DataModelError::unsupported(
                    "content",
                    format!("cannot convert {} channels to RGB", channels)
                )),
            };
            self.set("content", rgb)?;
        } else {
            let rgb = DynamicImage::ImageRgb8(raw_content(self)?.to_rgb8());
            self.set("content", rgb)?;
        }
        Ok(self)
    }

    fn to_grayscale(&mut self) -> Result<&mut Self> {
        if self.is_tensor() {
            let content = tensor_content(self)?;
            let channel_dim = (content.dim() - 3) as i64;
            let gray = match content.size()[channel_dim as usize] {
                1 => return Ok(self),
                3 => {
                    let channel = |index: i64| content.f_select(channel_dim, index);
                    (channel(0)? * 0.2989 + channel(1)? * 0.587 + channel(2)? * 0.114)
                        .f_unsqueeze(channel_dim)?
                }
                channels => bail!(DataModelError::unsupported(
                    "content",
                    format!("cannot convert {} channels to grayscale", channels)
                )),
            };
            self.set("content", gray)?;
        } else {
            let gray = DynamicImage::ImageLuma8(raw_content(self)?.to_luma8());
            self.set("content", gray)?;
        }
        Ok(self)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<&mut Self> {
        if self.is_tensor() {
            let content = tensor_content(self)?;
            let shape = content.size();
            let (leading, chw) = shape.split_at(shape.len() - 3);
            let resized = content
                .f_reshape(&[-1, chw[0], chw[1], chw[2]])?
                .f_upsample_bicubic2d(&[height as i64, width as i64], false, None::<f64>, None::<f64>)?;
            let mut new_shape = leading.to_vec();
            new_shape.extend([chw[0], height as i64, width as i64]);
            let resized = resized.f_reshape(&new_shape)?;

            let dims = |value: u32| {
                Tensor::f_full(leading, value as i64, (Kind::Int64, content.device()))
            };
            let (width_tensor, height_tensor) = (dims(width)?, dims(height)?);
            self.set("content", resized)?;
            self.set("width", width_tensor)?;
            self.set("height", height_tensor)?;
        } else {
            let resized = raw_content(self)?.resize_exact(width, height, FilterType::CatmullRom);
            self.set("content", resized)?;
            self.set("width", width as i64)?;
            self.set("height", height as i64)?;
        }
        Ok(self)
    }

    fn normalize(&mut self, mean: &[f64], std: &[f64]) -> Result<&mut Self> {
        ensure!(
            self.is_tensor(),
            DataModelError::unsupported(
                "content",
                "raw images hold 8 bit pixels, convert the image to tensor first"
            )
        );
        let content = tensor_content(self)?;
        let channels = content.size()[content.dim() - 3];
        let per_channel = |values: &[f64], name: &str| -> Result<Tensor> {
            let values = match values.len() as i64 {
                1 => vec![values[0]; channels as usize],
                len if len == channels => values.to_vec(),
                len => bail!(DataModelError::validation(
                    name,
                    format!("expect 1 or {} values, but get {}", channels, len)
                )),
            };
            Ok(Tensor::of_slice(&values)
                .f_to_kind(content.kind())?
                .f_to_device(content.device())?
                .f_view([channels, 1, 1])?)
        };
        let mean = per_channel(mean, "mean")?;
        let std = per_channel(std, "std")?;
        let normalized = (&content - mean) / std;
        self.set("content", normalized)?;
        Ok(self)
    }
}

fn check_is_image(record: &Record) -> Result<()> {
    ensure!(
        record.raw_data_model()?.same_as(Image::schema()),
        DataModelError::unsupported(record.name(), "the record is not an image")
    );
    Ok(())
}

fn raw_content(record: &Record) -> Result<&DynamicImage> {
    check_is_image(record)?;
    ensure!(
        !record.is_batched(),
        DataModelError::illegal_state(format!(
            "pixels of batched raw '{}' are not available",
            record.name()
        ))
    );
    match record.get("content")? {
        FieldValue::Image(content) => Ok(content),
        FieldValue::None => bail!(DataModelError::illegal_state(
            "the image content is not loaded, call load() first"
        )),
        other => bail!(DataModelError::validation(
            "content",
            format!("expect an image, but get {}", other.type_name())
        )),
    }
}

fn tensor_content(record: &Record) -> Result<Tensor> {
    check_is_image(record)?;
    match record.get("content")? {
        FieldValue::Tensor(content) if content.dim() >= 3 => Ok(content.shallow_clone()),
        FieldValue::None => bail!(DataModelError::illegal_state(
            "the image content is not loaded, call load() first"
        )),
        other => bail!(DataModelError::unsupported(
            "content",
            format!("expect a channel-first image tensor, but get {:?}", other)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn sample_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 10) as u8, (y * 10) as u8, 128])
        }))
    }

    #[test]
    fn dimensions_from_content() {
        let image = Image::from_content(sample_image(6, 4)).unwrap();
        assert_eq!(image.get_int("width").unwrap(), 6);
        assert_eq!(image.get_int("height").unwrap(), 4);
        assert_eq!(image.shape().unwrap(), vec![3, 4, 6]);
    }

    #[test]
    fn dimensions_from_file_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        sample_image(7, 5).save(&path).unwrap();

        let mut image = Image::from_file_path(path.to_str().unwrap()).unwrap();
        assert_eq!(image.size().unwrap(), Some((7, 5)));
        assert!(image.get("content").unwrap().is_none());

        image.load().unwrap();
        assert!(image.is_loaded());
        assert_eq!(image.get_image("content").unwrap().dimensions(), (7, 5));

        image.unload().unwrap();
        assert!(image.get("content").unwrap().is_none());
        assert_eq!(image.size().unwrap(), Some((7, 5)));
    }

    #[test]
    fn load_requires_a_source() {
        let mut image = Record::empty(Image::schema()).unwrap();
        assert!(image.load().is_err());
        assert!(!image.is_loaded());
    }

    #[test]
    fn tensor_image_round_trip() {
        let image = Image::from_content(sample_image(3, 2)).unwrap();
        let tensor = image.to_tensor().unwrap();
        let content = tensor.get_tensor("content").unwrap();
        assert_eq!(content.size(), vec![3, 2, 3]);
        assert_eq!(content.kind(), Kind::Float);
        assert_eq!(tensor.get_tensor("width").unwrap().int64_value(&[]), 3);

        let restored = tensor.to_raw().unwrap();
        assert_eq!(restored, image);
    }

    #[test]
    fn grayscale_tensor_gets_channel_dim() {
        let tensor = Record::new(
            Image::tensor_schema(),
            [("content", Tensor::zeros(&[4, 5], (Kind::Float, Device::Cpu)))],
        )
        .unwrap();
        assert_eq!(tensor.get_tensor("content").unwrap().size(), vec![1, 4, 5]);
        assert_eq!(tensor.channels().unwrap(), 1);

        let mut tensor = tensor;
        tensor.to_rgb().unwrap();
        assert_eq!(tensor.shape().unwrap(), vec![3, 4, 5]);
        tensor.to_grayscale().unwrap();
        assert_eq!(tensor.channels().unwrap(), 1);
    }

    #[test]
    fn resize_and_normalize() {
        let mut image = Image::from_content(sample_image(8, 8)).unwrap();
        image.resize(4, 2).unwrap();
        assert_eq!(image.size().unwrap(), Some((4, 2)));
        assert!(image.normalize(&[0.5], &[0.5]).is_err());

        let images = vec![
            Image::from_content(sample_image(8, 8)).unwrap().to_tensor().unwrap(),
            Image::from_content(sample_image(8, 8)).unwrap().to_tensor().unwrap(),
        ];
        let mut batched = Record::batched(&images).unwrap();
        assert_eq!(batched.shape().unwrap(), vec![2, 3, 8, 8]);
        assert!(batched.get("file_path").unwrap().is_none());

        batched.resize(4, 6).unwrap();
        assert_eq!(batched.shape().unwrap(), vec![2, 3, 6, 4]);
        assert_eq!(batched.get_tensor("width").unwrap().size(), vec![2]);

        batched.normalize(&[0.5], &[0.5]).unwrap();
        let content = batched.get_tensor("content").unwrap();
        assert_eq!(content.size(), vec![2, 3, 6, 4]);
        assert!(content.min().double_value(&[]) >= -1.1);
        assert!(content.max().double_value(&[]) <= 1.1);
        assert!(batched.normalize(&[0.5, 0.5], &[0.5]).is_err());
    }
}
