use crate::{
    annotation::{AnnotationRow, ImageGroup},
    codec::encode_group,
    common::*,
    error::DatasetError,
    key::content_key,
    partition::{partition, PartitionedDataset},
};
use record::RecordWriter;

/// Per-record progress report passed to the writer's observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteProgress<'a> {
    /// 1-based index of the record being written.
    pub current: usize,
    /// Total number of records in this container.
    pub total: usize,
    /// Path of the image being encoded.
    pub image_path: &'a Path,
}

impl WriteProgress<'_> {
    /// Rounded completion percentage.
    pub fn percent(&self) -> u32 {
        (100.0 * self.current as f64 / self.total as f64).round() as u32
    }
}

/// Progress observer that logs one line per image.
pub fn log_progress(progress: &WriteProgress) {
    info!(
        "building example {}/{} ({}%) {}",
        progress.current,
        progress.total,
        progress.percent(),
        progress.image_path.display()
    );
}

/// Encode image groups into a container at `output_path`, in order.
///
/// Per group: read the image bytes, derive the content key, encode, append.
/// Any unreadable image fails the whole write with
/// [`DatasetError::ImageRead`] and the partial container is removed; a
/// mid-stream failure is not resumable.
pub fn write_records(
    output_path: impl AsRef<Path>,
    groups: &[ImageGroup],
    mut progress: impl FnMut(&WriteProgress),
) -> Result<()> {
    let output_path = output_path.as_ref();
    let result = write_records_inner(output_path, groups, &mut progress);
    if result.is_err() {
        let _ = std::fs::remove_file(output_path);
    }
    result
}

fn write_records_inner(
    output_path: &Path,
    groups: &[ImageGroup],
    progress: &mut dyn FnMut(&WriteProgress),
) -> Result<()> {
    let mut writer = RecordWriter::create(output_path)?;
    let total = groups.len();

    for (index, group) in groups.iter().enumerate() {
        progress(&WriteProgress {
            current: index + 1,
            total,
            image_path: &group.image_path,
        });

        let image_bytes = std::fs::read(&group.image_path).map_err(|source| {
            DatasetError::ImageRead {
                path: group.image_path.clone(),
                source,
            }
        })?;
        let image_key = content_key(&image_bytes);
        let example = encode_group(group, image_bytes, image_key)?;
        writer
            .push(&example.into_raw())
            .with_context(|| format!("failed to append '{}'", group.image_path.display()))?;
    }

    writer.finish()?;
    Ok(())
}

/// Partition `rows` and write one container per subset.
///
/// Containers land in `output_dir` as `<name>_train.records` and
/// `<name>_test.records`; snapshot tables land in `snapshot_dir`. Returns
/// the training and evaluation container paths.
pub fn save_dataset(
    rows: Vec<AnnotationRow>,
    output_dir: impl AsRef<Path>,
    dataset_name: &str,
    test_fraction: f64,
    snapshot_dir: impl AsRef<Path>,
    mut progress: impl FnMut(&WriteProgress),
) -> Result<(PathBuf, PathBuf)> {
    let dataset = partition(rows, test_fraction, snapshot_dir)?;
    save_partitioned(&dataset, output_dir, dataset_name, &mut progress)
}

/// Write the two containers of an already partitioned dataset.
pub fn save_partitioned(
    dataset: &PartitionedDataset,
    output_dir: impl AsRef<Path>,
    dataset_name: &str,
    mut progress: impl FnMut(&WriteProgress),
) -> Result<(PathBuf, PathBuf)> {
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create '{}'", output_dir.display()))?;

    let training_path = output_dir.join(format!("{}_train.records", dataset_name));
    let test_path = output_dir.join(format!("{}_test.records", dataset_name));

    write_records(&training_path, &dataset.training, &mut progress)?;
    info!("saved training records: {}", training_path.display());
    write_records(&test_path, &dataset.evaluation, &mut progress)?;
    info!("saved evaluation records: {}", test_path.display());

    Ok((training_path, test_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{annotation::tests::row, codec::tests::png_bytes};

    fn fixture_group(dir: &Path, file: &str, objects: usize) -> ImageGroup {
        let path = dir.join(file);
        std::fs::write(&path, png_bytes(8, 6)).unwrap();

        let rows = (0..objects)
            .map(|index| {
                let path_str = path.to_str().unwrap();
                let mut one = row(path_str, "car", 10.0 * index as f64);
                one.object_id = index as i64;
                one
            })
            .collect();
        ImageGroup {
            image_path: path,
            rows,
        }
    }

    #[test]
    fn progress_reports_every_image_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let groups = vec![
            fixture_group(dir.path(), "a.png", 1),
            fixture_group(dir.path(), "b.png", 2),
            fixture_group(dir.path(), "c.png", 1),
        ];

        let mut seen = Vec::new();
        let container = dir.path().join("out.records");
        write_records(&container, &groups, |progress| {
            seen.push((progress.current, progress.total, progress.percent()));
        })
        .unwrap();

        assert_eq!(seen, vec![(1, 3, 33), (2, 3, 67), (3, 3, 100)]);
        assert!(container.is_file());
    }

    #[test]
    fn unreadable_image_aborts_and_discards_the_container() {
        let dir = tempfile::tempdir().unwrap();
        let mut groups = vec![fixture_group(dir.path(), "a.png", 1)];
        groups.push(ImageGroup {
            image_path: dir.path().join("missing.png"),
            rows: vec![row(
                dir.path().join("missing.png").to_str().unwrap(),
                "car",
                0.0,
            )],
        });

        let container = dir.path().join("out.records");
        let err = write_records(&container, &groups, |_| {}).unwrap_err();

        let kind = err.downcast_ref::<DatasetError>().unwrap();
        assert!(matches!(kind, DatasetError::ImageRead { .. }));
        assert!(!container.exists(), "partial container must be discarded");
    }

    #[test]
    fn save_partitioned_writes_both_containers() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = PartitionedDataset {
            training: vec![fixture_group(dir.path(), "a.png", 2)],
            evaluation: vec![
                fixture_group(dir.path(), "b.png", 1),
                fixture_group(dir.path(), "c.png", 3),
            ],
        };

        let out = dir.path().join("records");
        let (training_path, test_path) =
            save_partitioned(&dataset, &out, "traffic", |_| {}).unwrap();

        assert_eq!(training_path, out.join("traffic_train.records"));
        assert_eq!(test_path, out.join("traffic_test.records"));
        assert!(training_path.is_file());
        assert!(test_path.is_file());
    }
}
