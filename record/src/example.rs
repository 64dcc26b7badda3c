use crate::{common::*, error::malformed, feature::Feature};

/// An untyped record: ordered map from field name to feature value.
pub type RawExample = IndexMap<String, Feature>;

/// The fixed schema of one serialized image with all its annotated objects.
///
/// Box coordinates are normalized to `[0, 1]`. The five per-object lists
/// (`x_min`, `y_min`, `x_max`, `y_max`, `object_name`) always have identical
/// length; `object_id` is either empty or of the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageExample {
    pub img_width: i64,
    pub img_height: i64,
    pub image_path: String,
    pub image_file: String,
    pub image_key: String,
    pub image_data: Vec<u8>,
    pub image_format: String,
    pub x_min: Vec<f32>,
    pub y_min: Vec<f32>,
    pub x_max: Vec<f32>,
    pub y_max: Vec<f32>,
    pub object_name: Vec<String>,
    pub object_id: Vec<i64>,
}

impl ImageExample {
    /// The number of annotated objects in this example.
    pub fn num_objects(&self) -> usize {
        self.x_min.len()
    }

    /// Parse the fixed schema out of an untyped record.
    ///
    /// Missing or kind-mismatched required fields fail with a
    /// [`RecordError::Malformed`](crate::RecordError) kind. Absent optional
    /// lists parse as empty; unknown extra fields are ignored.
    pub fn from_raw(mut raw: RawExample) -> Result<Self> {
        let example = Self {
            img_width: take_scalar_int(&mut raw, "img_width")?,
            img_height: take_scalar_int(&mut raw, "img_height")?,
            image_path: take_scalar_string(&mut raw, "image_path")?,
            image_file: take_scalar_string(&mut raw, "image_file")?,
            image_key: take_scalar_string(&mut raw, "image_key")?,
            image_data: take_scalar_bytes(&mut raw, "image_data")?,
            image_format: take_scalar_string(&mut raw, "image_format")?,
            x_min: take_floats(&mut raw, "x_min")?,
            y_min: take_floats(&mut raw, "y_min")?,
            x_max: take_floats(&mut raw, "x_max")?,
            y_max: take_floats(&mut raw, "y_max")?,
            object_name: take_strings(&mut raw, "object_name")?,
            object_id: take_ints(&mut raw, "object_id")?,
        };

        let num_objects = example.x_min.len();
        for (name, len) in [
            ("y_min", example.y_min.len()),
            ("x_max", example.x_max.len()),
            ("y_max", example.y_max.len()),
            ("object_name", example.object_name.len()),
        ] {
            if len != num_objects {
                return Err(malformed(format!(
                    "field '{}' has {} entries, expected {}",
                    name, len, num_objects
                )));
            }
        }
        if !example.object_id.is_empty() && example.object_id.len() != num_objects {
            return Err(malformed(format!(
                "field 'object_id' has {} entries, expected {} or none",
                example.object_id.len(),
                num_objects
            )));
        }

        Ok(example)
    }

    /// Lower the schema into the untyped field map, in schema order.
    pub fn into_raw(self) -> RawExample {
        let Self {
            img_width,
            img_height,
            image_path,
            image_file,
            image_key,
            image_data,
            image_format,
            x_min,
            y_min,
            x_max,
            y_max,
            object_name,
            object_id,
        } = self;

        let mut raw = RawExample::with_capacity(13);
        raw.insert("img_width".into(), Feature::IntList(vec![img_width]));
        raw.insert("img_height".into(), Feature::IntList(vec![img_height]));
        raw.insert(
            "image_path".into(),
            Feature::BytesList(vec![image_path.into_bytes()]),
        );
        raw.insert(
            "image_file".into(),
            Feature::BytesList(vec![image_file.into_bytes()]),
        );
        raw.insert(
            "image_key".into(),
            Feature::BytesList(vec![image_key.into_bytes()]),
        );
        raw.insert("image_data".into(), Feature::BytesList(vec![image_data]));
        raw.insert(
            "image_format".into(),
            Feature::BytesList(vec![image_format.into_bytes()]),
        );
        raw.insert("x_min".into(), Feature::FloatList(x_min));
        raw.insert("y_min".into(), Feature::FloatList(y_min));
        raw.insert("x_max".into(), Feature::FloatList(x_max));
        raw.insert("y_max".into(), Feature::FloatList(y_max));
        raw.insert(
            "object_name".into(),
            Feature::BytesList(object_name.into_iter().map(String::into_bytes).collect()),
        );
        raw.insert("object_id".into(), Feature::IntList(object_id));
        raw
    }
}

fn take_scalar_int(raw: &mut RawExample, name: &str) -> Result<i64> {
    match raw.swap_remove(name) {
        Some(Feature::IntList(values)) if values.len() == 1 => Ok(values[0]),
        Some(Feature::IntList(values)) => Err(malformed(format!(
            "field '{}' expects one integer, found {}",
            name,
            values.len()
        ))),
        Some(other) => Err(malformed(format!(
            "field '{}' has kind {:?}, expected integers",
            name,
            other.kind()
        ))),
        None => Err(malformed(format!("missing required field '{}'", name))),
    }
}

fn take_scalar_bytes(raw: &mut RawExample, name: &str) -> Result<Vec<u8>> {
    match raw.swap_remove(name) {
        Some(Feature::BytesList(mut items)) if items.len() == 1 => {
            Ok(mem::take(&mut items[0]))
        }
        Some(Feature::BytesList(items)) => Err(malformed(format!(
            "field '{}' expects one byte string, found {}",
            name,
            items.len()
        ))),
        Some(other) => Err(malformed(format!(
            "field '{}' has kind {:?}, expected bytes",
            name,
            other.kind()
        ))),
        None => Err(malformed(format!("missing required field '{}'", name))),
    }
}

fn take_scalar_string(raw: &mut RawExample, name: &str) -> Result<String> {
    let bytes = take_scalar_bytes(raw, name)?;
    String::from_utf8(bytes)
        .map_err(|_| malformed(format!("field '{}' is not valid UTF-8", name)))
}

fn take_floats(raw: &mut RawExample, name: &str) -> Result<Vec<f32>> {
    match raw.swap_remove(name) {
        Some(Feature::FloatList(values)) => Ok(values),
        Some(other) => Err(malformed(format!(
            "field '{}' has kind {:?}, expected floats",
            name,
            other.kind()
        ))),
        None => Ok(vec![]),
    }
}

fn take_ints(raw: &mut RawExample, name: &str) -> Result<Vec<i64>> {
    match raw.swap_remove(name) {
        Some(Feature::IntList(values)) => Ok(values),
        Some(other) => Err(malformed(format!(
            "field '{}' has kind {:?}, expected integers",
            name,
            other.kind()
        ))),
        None => Ok(vec![]),
    }
}

fn take_strings(raw: &mut RawExample, name: &str) -> Result<Vec<String>> {
    match raw.swap_remove(name) {
        Some(Feature::BytesList(items)) => items
            .into_iter()
            .map(|item| {
                String::from_utf8(item)
                    .map_err(|_| malformed(format!("field '{}' is not valid UTF-8", name)))
            })
            .try_collect(),
        Some(other) => Err(malformed(format!(
            "field '{}' has kind {:?}, expected bytes",
            name,
            other.kind()
        ))),
        None => Ok(vec![]),
    }
}
