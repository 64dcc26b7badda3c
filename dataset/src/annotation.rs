use crate::common::*;

/// One labeled object instance from the source annotation table.
///
/// Field order matches the table columns; the codec unpacks rows
/// positionally. Coordinates are in pixel units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationRow {
    pub image_path: PathBuf,
    pub image_width: u32,
    pub image_height: u32,
    pub x_min: R64,
    pub y_min: R64,
    pub x_max: R64,
    pub y_max: R64,
    pub object_name: String,
    pub object_id: i64,
}

impl AnnotationRow {
    /// Check coordinate ordering and image bounds.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.image_width > 0 && self.image_height > 0,
            "image width and height must be positive"
        );
        ensure!(
            self.x_min < self.x_max && self.y_min < self.y_max,
            "box ({}, {}, {}, {}) is not in min < max order",
            self.x_min,
            self.y_min,
            self.x_max,
            self.y_max
        );
        ensure!(
            self.x_min >= 0.0
                && self.y_min >= 0.0
                && self.x_max <= self.image_width as f64
                && self.y_max <= self.image_height as f64,
            "box ({}, {}, {}, {}) is out of the {}x{} image bounds",
            self.x_min,
            self.y_min,
            self.x_max,
            self.y_max,
            self.image_width,
            self.image_height
        );
        Ok(())
    }
}

/// All annotation rows of one source image, in table order.
///
/// The unit of partitioning: a group moves to the training or evaluation
/// subset as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageGroup {
    pub image_path: PathBuf,
    pub rows: Vec<AnnotationRow>,
}

impl ImageGroup {
    pub fn num_objects(&self) -> usize {
        self.rows.len()
    }
}

/// Load and validate the source annotation table.
pub fn load_annotation_table(path: impl AsRef<Path>) -> Result<Vec<AnnotationRow>> {
    let path = path.as_ref();
    let rows: Vec<AnnotationRow> = csv::ReaderBuilder::new()
        .has_headers(true)
        .comment(Some(b'#'))
        .from_path(path)
        .with_context(|| format!("failed to open annotation table '{}'", path.display()))?
        .deserialize()
        .try_collect()
        .with_context(|| format!("failed to parse annotation table '{}'", path.display()))?;

    for (index, row) in rows.iter().enumerate() {
        row.validate()
            .with_context(|| format!("bad annotation row {} in '{}'", index, path.display()))?;
    }

    Ok(rows)
}

/// Group rows by image path.
///
/// Images keep their first-appearance order and rows keep their table order
/// within each group.
pub fn group_by_image(rows: Vec<AnnotationRow>) -> Vec<ImageGroup> {
    let mut groups: IndexMap<PathBuf, Vec<AnnotationRow>> = IndexMap::new();
    for row in rows {
        groups.entry(row.image_path.clone()).or_default().push(row);
    }
    groups
        .into_iter()
        .map(|(image_path, rows)| ImageGroup { image_path, rows })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn row(path: &str, object_name: &str, x_min: f64) -> AnnotationRow {
        AnnotationRow {
            image_path: path.into(),
            image_width: 200,
            image_height: 100,
            x_min: r64(x_min),
            y_min: r64(10.0),
            x_max: r64(x_min + 50.0),
            y_max: r64(60.0),
            object_name: object_name.into(),
            object_id: 0,
        }
    }

    #[test]
    fn grouping_preserves_order() {
        let rows = vec![
            row("b.png", "car", 0.0),
            row("a.png", "person", 10.0),
            row("b.png", "dog", 20.0),
            row("c.png", "car", 30.0),
        ];
        let groups = group_by_image(rows);

        let paths: Vec<_> = groups.iter().map(|g| g.image_path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("b.png"),
                PathBuf::from("a.png"),
                PathBuf::from("c.png")
            ]
        );
        assert_eq!(groups[0].num_objects(), 2);
        assert_eq!(groups[0].rows[0].object_name, "car");
        assert_eq!(groups[0].rows[1].object_name, "dog");
    }

    #[test]
    fn validation_rejects_inverted_and_out_of_bound_boxes() {
        let mut inverted = row("a.png", "car", 0.0);
        inverted.x_max = r64(0.0);
        inverted.x_min = r64(50.0);
        assert!(inverted.validate().is_err());

        let mut oversized = row("a.png", "car", 0.0);
        oversized.x_max = r64(250.0);
        assert!(oversized.validate().is_err());

        assert!(row("a.png", "car", 0.0).validate().is_ok());
    }

    #[test]
    fn table_round_trips_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.csv");

        let rows = vec![row("a.png", "car", 0.0), row("a.png", "person", 60.0)];
        let mut writer = csv::Writer::from_path(&path).unwrap();
        for row in &rows {
            writer.serialize(row).unwrap();
        }
        writer.flush().unwrap();
        drop(writer);

        let loaded = load_annotation_table(&path).unwrap();
        assert_eq!(loaded, rows);
    }
}
