use crate::{annotation::ImageGroup, class_table::ClassTable, common::*, error::DatasetError};
use image::imageops::FilterType;
use ndarray::{Array2, Array3};
use record::{ImageExample, RawExample};

/// Decode-time configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeConfig {
    /// Fixed box capacity per record. Records with more objects fail to
    /// decode rather than being truncated.
    pub max_boxes: usize,
    /// Optional `(height, width)` target size. Resampling is Catmull-Rom
    /// and stable across calls.
    pub resize: Option<(u32, u32)>,
    /// Attach the raw decoded fields to each item.
    pub keep_raw: bool,
}

impl DecodeConfig {
    pub fn new(max_boxes: usize) -> Self {
        Self {
            max_boxes,
            resize: None,
            keep_raw: false,
        }
    }
}

/// One decoded training item.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    /// HWC image tensor, 3 channels, pixel values in the 0-255 range.
    pub image: Array3<f32>,
    /// `(max_boxes, 5)` tensor of `(x_min, y_min, x_max, y_max, class_id)`
    /// rows in original object order, zero-padded past the object count.
    /// Coordinates are normalized to `[0, 1]`.
    pub boxes: Array2<f32>,
    /// Raw decoded fields, present when the config asks for them.
    pub raw: Option<ImageExample>,
}

/// Encode one image group into an example.
///
/// `image_bytes` must be the exact content of the group's image file;
/// reading it is the caller's job. Pixel coordinates are normalized to
/// `[0, 1]` here and nowhere else.
pub fn encode_group(
    group: &ImageGroup,
    image_bytes: Vec<u8>,
    image_key: String,
) -> Result<ImageExample> {
    ensure!(
        !group.rows.is_empty(),
        "image group '{}' has no rows",
        group.image_path.display()
    );

    let first = &group.rows[0];
    let (img_width, img_height) = (first.image_width, first.image_height);
    ensure!(
        group
            .rows
            .iter()
            .all(|row| row.image_width == img_width && row.image_height == img_height),
        "rows of '{}' disagree on image dimensions",
        group.image_path.display()
    );

    let image_file = group
        .image_path
        .file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            format_err!(
                "image path '{}' has no UTF-8 file name",
                group.image_path.display()
            )
        })?;
    let image_format = image_file.rsplit('.').next().unwrap_or("").to_owned();

    let num_objects = group.rows.len();
    let mut x_min = Vec::with_capacity(num_objects);
    let mut y_min = Vec::with_capacity(num_objects);
    let mut x_max = Vec::with_capacity(num_objects);
    let mut y_max = Vec::with_capacity(num_objects);
    let mut object_name = Vec::with_capacity(num_objects);
    let mut object_id = Vec::with_capacity(num_objects);

    for row in &group.rows {
        x_min.push((row.x_min / img_width as f64).raw() as f32);
        x_max.push((row.x_max / img_width as f64).raw() as f32);
        y_min.push((row.y_min / img_height as f64).raw() as f32);
        y_max.push((row.y_max / img_height as f64).raw() as f32);
        object_name.push(row.object_name.clone());
        object_id.push(row.object_id);
    }

    Ok(ImageExample {
        img_width: img_width as i64,
        img_height: img_height as i64,
        image_path: group.image_path.display().to_string(),
        image_file,
        image_key,
        image_data: image_bytes,
        image_format,
        x_min,
        y_min,
        x_max,
        y_max,
        object_name,
        object_id,
    })
}

/// Decode an untyped record into tensors.
///
/// See [`decode_image_example`] for the steps; schema mismatches fail with
/// the container layer's malformed-record kind.
pub fn decode_example(
    raw: RawExample,
    classes: &ClassTable,
    config: &DecodeConfig,
) -> Result<DecodedRecord> {
    decode_image_example(ImageExample::from_raw(raw)?, classes, config)
}

/// Decode a typed example into tensors.
///
/// Decodes the embedded image payload, applies the optional resize, resolves
/// class names through `classes` (unknown names become the `-1` sentinel),
/// and assembles the padded box tensor. An object count above
/// `config.max_boxes` fails with [`DatasetError::BoxOverflow`].
pub fn decode_image_example(
    example: ImageExample,
    classes: &ClassTable,
    config: &DecodeConfig,
) -> Result<DecodedRecord> {
    let num_objects = example.num_objects();
    if num_objects > config.max_boxes {
        bail!(DatasetError::BoxOverflow {
            count: num_objects,
            max_boxes: config.max_boxes,
        });
    }

    let decoded = image::load_from_memory(&example.image_data).with_context(|| {
        format!("failed to decode image payload of '{}'", example.image_file)
    })?;
    let decoded = match config.resize {
        Some((height, width)) => decoded.resize_exact(width, height, FilterType::CatmullRom),
        None => decoded,
    };

    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    let image = Array3::from_shape_vec((height as usize, width as usize, 3), rgb.into_raw())?
        .mapv(|value| value as f32);

    let mut boxes = Array2::<f32>::zeros((config.max_boxes, 5));
    for (index, (x_min, y_min, x_max, y_max, name)) in izip!(
        &example.x_min,
        &example.y_min,
        &example.x_max,
        &example.y_max,
        &example.object_name
    )
    .enumerate()
    {
        boxes[[index, 0]] = *x_min;
        boxes[[index, 1]] = *y_min;
        boxes[[index, 2]] = *x_max;
        boxes[[index, 3]] = *y_max;
        boxes[[index, 4]] = classes.lookup(name) as f32;
    }

    Ok(DecodedRecord {
        image,
        boxes,
        raw: config.keep_raw.then(|| example),
    })
}
