use nanofactory::app::draw_interactor::Job;
use nanofactory::app::DrawInteractor;
use nanofactory::container::{ContainerMeta, DataContainer};
use nanofactory::utils::path::FileFormat;
use serde_json::json;

const JOB: &str = r#"
coordinate_system:
  offset_x: 10.0
shapes:
  - type: poly_line
    points:
      - {x: 0.0, y: 0.0, z: 0.0}
      - {x: 1.0, y: 0.0, z: 0.0}
      - {x: 1.0, y: 1.0, z: 0.0}
    feed: {F: 5.0}
  - type: circle
    center: {x: 0.0, y: 0.0, z: 0.1}
    radius: 0.5
"#;

#[test]
fn test_job_draws_in_machine_coordinates() {
    let job = Job::parse(JOB, FileFormat::Yaml).unwrap();
    let response = DrawInteractor::new().draw(&job).unwrap();

    assert_eq!(response.shapes, 2);
    let summary = &response.summary;
    assert!(summary.arc_moves >= 1);
    assert!(summary.exposed_moves >= 3);
    assert!(summary.exposed_length > 2.0);

    let bounds = summary.exposed_bounds.as_ref().unwrap();
    assert!(bounds.min.x >= 9.5 - 1e-9);
    assert!(bounds.max.x <= 11.0 + 1e-9);
}

#[tokio::test]
async fn test_written_program_traces_like_drawn_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("job.pgm");

    let job = Job::parse(JOB, FileFormat::Yaml).unwrap();
    let interactor = DrawInteractor::new();
    let response = interactor.draw(&job).unwrap();
    response.program.write(&path, false).unwrap();

    let report = interactor.trace(&path).await.unwrap();
    assert_eq!(report.summary.linear_moves, response.summary.linear_moves);
    assert_eq!(report.summary.exposed_moves, response.summary.exposed_moves);
    assert!((report.summary.exposed_length - response.summary.exposed_length).abs() < 1e-6);
}

#[test]
fn test_container_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("scan.zdc");

    let mut container = DataContainer::new(
        "LayerPlane",
        1.1,
        ContainerMeta::new("Plane", "Test plane").with_author(Some("A. User".into()), None),
    )
    .unwrap();
    container
        .insert_json("data/plane.json", &json!({"z0": 2.0}))
        .unwrap();
    container.insert_text("notes.txt", "scan notes");
    container.write(&path).unwrap();

    let loaded = DataContainer::read(&path).unwrap();
    loaded.validate_type("LayerPlane", 1.1).unwrap();
    assert!(loaded.validate_type("LayerPlane", 1.0).is_err());
    assert_eq!(loaded.json("data/plane.json").unwrap()["z0"], 2.0);
    assert_eq!(loaded.json("meta.json").unwrap()["author"], "A. User");
    assert_eq!(loaded.hash().unwrap(), loaded.compute_hash().unwrap());
    assert_eq!(loaded.uuid().unwrap(), container.uuid().unwrap());
}

#[test]
fn test_container_rejects_foreign_zip() {
    assert!(DataContainer::from_bytes(b"not a zip archive").is_err());
}
