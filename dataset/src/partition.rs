use crate::{
    annotation::{group_by_image, AnnotationRow, ImageGroup},
    common::*,
    error::DatasetError,
};

/// The outcome of one partition invocation: two disjoint group sequences.
///
/// Not mutated afterward; the snapshot tables on disk mirror its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionedDataset {
    pub training: Vec<ImageGroup>,
    pub evaluation: Vec<ImageGroup>,
}

impl PartitionedDataset {
    pub fn num_groups(&self) -> usize {
        self.training.len() + self.evaluation.len()
    }
}

/// Split annotation rows into training and evaluation subsets by image.
///
/// Uses the thread-local random source; splits are not repeatable run to
/// run. Callers needing a reproducible split seed their own generator and
/// use [`partition_with_rng`].
pub fn partition(
    rows: Vec<AnnotationRow>,
    test_fraction: f64,
    snapshot_dir: impl AsRef<Path>,
) -> Result<PartitionedDataset> {
    partition_with_rng(rows, test_fraction, snapshot_dir, &mut thread_rng())
}

/// [`partition`] with an injected random source.
///
/// Validates `test_fraction` before touching the filesystem, groups rows by
/// image, shuffles whole groups so no image straddles the split, and cuts at
/// `floor((1 - test_fraction) * group_count)`. Snapshot tables of the full,
/// training and evaluation rows land in `snapshot_dir` as
/// `full_data.csv`, `training_data.csv` and `test_data.csv`.
pub fn partition_with_rng<R>(
    rows: Vec<AnnotationRow>,
    test_fraction: f64,
    snapshot_dir: impl AsRef<Path>,
    rng: &mut R,
) -> Result<PartitionedDataset>
where
    R: Rng + ?Sized,
{
    if !(0.0 < test_fraction && test_fraction < 1.0) {
        bail!(DatasetError::InvalidParameter(format!(
            "test_fraction must satisfy 0 < test_fraction < 1, got {}",
            test_fraction
        )));
    }

    let rows: Vec<_> = rows.into_iter().map(clean_row).collect();

    let snapshot_dir = snapshot_dir.as_ref();
    std::fs::create_dir_all(snapshot_dir)
        .with_context(|| format!("failed to create '{}'", snapshot_dir.display()))?;
    write_snapshot(&snapshot_dir.join("full_data.csv"), rows.iter())?;

    let mut groups = group_by_image(rows);
    groups.shuffle(rng);

    let separation_index = ((1.0 - test_fraction) * groups.len() as f64).floor() as usize;
    let evaluation = groups.split_off(separation_index);
    let training = groups;

    write_snapshot(
        &snapshot_dir.join("training_data.csv"),
        training.iter().flat_map(|group| group.rows.iter()),
    )?;
    write_snapshot(
        &snapshot_dir.join("test_data.csv"),
        evaluation.iter().flat_map(|group| group.rows.iter()),
    )?;

    Ok(PartitionedDataset {
        training,
        evaluation,
    })
}

/// Coerce signed-looking object ids to non-negative, keeping the table's
/// historical cleaning behavior.
fn clean_row(mut row: AnnotationRow) -> AnnotationRow {
    if row.object_id < 0 {
        warn!(
            "coerced negative object id {} of '{}' to {}",
            row.object_id,
            row.image_path.display(),
            row.object_id.abs()
        );
        row.object_id = row.object_id.abs();
    }
    row
}

fn write_snapshot<'a>(
    path: &Path,
    rows: impl IntoIterator<Item = &'a AnnotationRow>,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create snapshot '{}'", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush snapshot '{}'", path.display()))?;
    Ok(())
}
