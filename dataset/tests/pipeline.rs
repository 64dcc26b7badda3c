//! End-to-end pipeline tests: annotation table → partition → containers →
//! decoded tensors.

use approx::assert_abs_diff_eq;
use dataset::{
    load_annotation_table, partition_with_rng, save_partitioned, AnnotationRow, DatasetError,
    DatasetReader, DecodeConfig, DecodedRecord,
};
use noisy_float::prelude::*;
use rand::prelude::*;
use std::{fs, io::Write as _, path::Path};

const MAX_BOXES: usize = 4;

fn write_png(path: &Path, width: u32, height: u32, seed: u8) {
    let image = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            seed.wrapping_add(x as u8),
            seed.wrapping_mul(2).wrapping_add(y as u8),
            seed,
        ])
    });
    image.save(path).unwrap();
}

fn annotation(path: &Path, name: &str, box_index: usize) -> AnnotationRow {
    let offset = 20.0 * box_index as f64;
    AnnotationRow {
        image_path: path.to_owned(),
        image_width: 160,
        image_height: 120,
        x_min: r64(offset),
        y_min: r64(offset / 2.0),
        x_max: r64(offset + 40.0),
        y_max: r64(offset / 2.0 + 30.0),
        object_name: name.into(),
        object_id: 0,
    }
}

/// Three images with 2, 1 and 3 objects.
fn fixture_table(dir: &Path) -> Vec<AnnotationRow> {
    let layouts: [(&str, &[&str]); 3] = [
        ("first.png", &["car", "person"]),
        ("second.png", &["dog"]),
        ("third.png", &["car", "car", "person"]),
    ];

    let mut rows = Vec::new();
    for (index, (file, names)) in layouts.iter().enumerate() {
        let path = dir.join(file);
        write_png(&path, 160, 120, index as u8 * 40);
        for (box_index, name) in names.iter().enumerate() {
            rows.push(annotation(&path, name, box_index));
        }
    }
    rows
}

fn write_class_file(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("classes.txt");
    let mut file = fs::File::create(&path).unwrap();
    write!(file, "car\nperson\ndog\n").unwrap();
    path
}

#[test]
fn full_pipeline_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let rows = fixture_table(dir.path());
    let classes_file = write_class_file(dir.path());

    // 3 groups at test_fraction 0.34: floor(0.66 * 3) = 1 training image
    let mut rng = StdRng::seed_from_u64(11);
    let dataset =
        partition_with_rng(rows.clone(), 0.34, dir.path().join("snapshots"), &mut rng)
            .unwrap();
    assert_eq!(dataset.training.len(), 1);
    assert_eq!(dataset.evaluation.len(), 2);

    let out = dir.path().join("records");
    let (training_path, test_path) =
        save_partitioned(&dataset, &out, "traffic", |_| {}).unwrap();

    // one container per subset, with the partitioned record counts
    let mut config = DecodeConfig::new(MAX_BOXES);
    config.keep_raw = true;

    let pattern = format!("{}/traffic_*.records", out.display());
    let reader = DatasetReader::open(&pattern, &classes_file, config).unwrap();
    assert_eq!(
        reader.files(),
        // glob resolution is sorted: test before train
        &[test_path.clone(), training_path.clone()]
    );

    let records: Vec<DecodedRecord> =
        reader.stream().map(|record| record.unwrap()).collect();
    assert_eq!(records.len(), 3);

    for record in &records {
        // no resize requested: tensors keep the source image shape
        assert_eq!(record.image.dim(), (120, 160, 3));
        assert_eq!(record.boxes.dim(), (MAX_BOXES, 5));

        let raw = record.raw.as_ref().unwrap();
        let num_objects = raw.object_name.len();
        assert!(num_objects >= 1 && num_objects <= 3);
        assert_eq!(raw.image_key.len(), 64);

        // pixel-space round trip within float tolerance
        for (index, name) in raw.object_name.iter().enumerate() {
            let x_min = record.boxes[[index, 0]] * 160.0;
            let y_min = record.boxes[[index, 1]] * 120.0;
            let x_max = record.boxes[[index, 2]] * 160.0;
            let y_max = record.boxes[[index, 3]] * 120.0;
            assert_abs_diff_eq!(x_max - x_min, 40.0, epsilon = 1e-3);
            assert_abs_diff_eq!(y_max - y_min, 30.0, epsilon = 1e-3);

            let class_id = record.boxes[[index, 4]];
            let expected = match name.as_str() {
                "car" => 0.0,
                "person" => 1.0,
                "dog" => 2.0,
                _ => panic!("unexpected class {}", name),
            };
            assert_eq!(class_id, expected);
        }

        // padding rows beyond the object count are exactly zero
        for index in num_objects..MAX_BOXES {
            for column in 0..5 {
                assert_eq!(record.boxes[[index, column]], 0.0);
            }
        }
    }

    // every fixture image appears exactly once
    let mut files: Vec<_> = records
        .iter()
        .map(|record| record.raw.as_ref().unwrap().image_file.clone())
        .collect();
    files.sort();
    assert_eq!(files, vec!["first.png", "second.png", "third.png"]);
}

#[test]
fn stream_is_restartable() {
    let dir = tempfile::tempdir().unwrap();
    let rows = fixture_table(dir.path());
    let classes_file = write_class_file(dir.path());

    let dataset = partition_with_rng(
        rows,
        0.34,
        dir.path().join("snapshots"),
        &mut StdRng::seed_from_u64(3),
    )
    .unwrap();
    let out = dir.path().join("records");
    save_partitioned(&dataset, &out, "traffic", |_| {}).unwrap();

    let pattern = format!("{}/traffic_*.records", out.display());
    let reader =
        DatasetReader::open(&pattern, &classes_file, DecodeConfig::new(MAX_BOXES)).unwrap();

    let first: Vec<_> = reader.stream().map(|record| record.unwrap()).collect();
    let second: Vec<_> = reader.stream().map(|record| record.unwrap()).collect();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.image, b.image);
        assert_eq!(a.boxes, b.boxes);
    }
}

#[test]
fn resized_stream_yields_fixed_shapes() {
    let dir = tempfile::tempdir().unwrap();
    let rows = fixture_table(dir.path());
    let classes_file = write_class_file(dir.path());

    let dataset = partition_with_rng(
        rows,
        0.5,
        dir.path().join("snapshots"),
        &mut StdRng::seed_from_u64(5),
    )
    .unwrap();
    let out = dir.path().join("records");
    save_partitioned(&dataset, &out, "traffic", |_| {}).unwrap();

    let mut config = DecodeConfig::new(MAX_BOXES);
    config.resize = Some((64, 64));
    let pattern = format!("{}/traffic_*.records", out.display());
    let reader = DatasetReader::open(&pattern, &classes_file, config).unwrap();

    for record in reader.stream() {
        let record = record.unwrap();
        assert_eq!(record.image.dim(), (64, 64, 3));
    }
}

#[test]
fn overflowing_record_fails_the_stream() {
    let dir = tempfile::tempdir().unwrap();
    let rows = fixture_table(dir.path());
    let classes_file = write_class_file(dir.path());

    let dataset = partition_with_rng(
        rows,
        0.34,
        dir.path().join("snapshots"),
        &mut StdRng::seed_from_u64(7),
    )
    .unwrap();
    let out = dir.path().join("records");
    save_partitioned(&dataset, &out, "traffic", |_| {}).unwrap();

    // capacity below the largest group (3 objects)
    let pattern = format!("{}/traffic_*.records", out.display());
    let reader =
        DatasetReader::open(&pattern, &classes_file, DecodeConfig::new(2)).unwrap();

    let err = reader
        .stream()
        .find_map(|record| record.err())
        .expect("a three-object record must overflow");
    let kind = err.downcast_ref::<DatasetError>().unwrap();
    assert!(matches!(kind, DatasetError::BoxOverflow { count: 3, max_boxes: 2 }));
}

#[test]
fn corrupted_container_surfaces_malformed_record() {
    let dir = tempfile::tempdir().unwrap();
    let rows = fixture_table(dir.path());
    let classes_file = write_class_file(dir.path());

    let dataset = partition_with_rng(
        rows,
        0.34,
        dir.path().join("snapshots"),
        &mut StdRng::seed_from_u64(9),
    )
    .unwrap();
    let out = dir.path().join("records");
    let (training_path, _) = save_partitioned(&dataset, &out, "traffic", |_| {}).unwrap();

    // flip one payload byte
    let mut bytes = fs::read(&training_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    fs::write(&training_path, &bytes).unwrap();

    let pattern = format!("{}/traffic_train.records", out.display());
    let reader =
        DatasetReader::open(&pattern, &classes_file, DecodeConfig::new(MAX_BOXES)).unwrap();

    let err = reader
        .stream()
        .find_map(|record| record.err())
        .expect("corrupted container must fail");
    assert!(err.downcast_ref::<record::RecordError>().is_some());
}

#[test]
fn save_dataset_partitions_and_writes_in_one_call() {
    let dir = tempfile::tempdir().unwrap();
    let rows = fixture_table(dir.path());
    let classes_file = write_class_file(dir.path());

    let out = dir.path().join("records");
    let snapshots = dir.path().join("snapshots");
    let mut reported = 0;
    let (training_path, test_path) =
        dataset::save_dataset(rows, &out, "traffic", 0.34, &snapshots, |_| reported += 1)
            .unwrap();

    // one progress call per image across both containers
    assert_eq!(reported, 3);
    for name in ["full_data.csv", "training_data.csv", "test_data.csv"] {
        assert!(snapshots.join(name).is_file());
    }

    let reader = DatasetReader::open(
        &format!("{}/traffic_*.records", out.display()),
        &classes_file,
        DecodeConfig::new(MAX_BOXES),
    )
    .unwrap();
    assert_eq!(reader.files(), &[test_path, training_path]);
    assert_eq!(reader.stream().count(), 3);
}

#[test]
fn annotation_table_feeds_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let rows = fixture_table(dir.path());

    // persist and reload the table through its CSV form
    let table_path = dir.path().join("labels.csv");
    let mut writer = csv::Writer::from_path(&table_path).unwrap();
    for row in &rows {
        writer.serialize(row).unwrap();
    }
    writer.flush().unwrap();
    drop(writer);

    let loaded = load_annotation_table(&table_path).unwrap();
    assert_eq!(loaded, rows);
}
