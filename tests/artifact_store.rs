use std::sync::Arc;

use bytes::Bytes;
use tempfile::TempDir;

use kartenwerk::application::repos::ArtifactRepo;
use kartenwerk::domain::artifact::{VersionSelector, artifact_path};
use kartenwerk::domain::types::{FileFormat, PngSize};
use kartenwerk::infra::artifacts::ArtifactStore;

const VERSION: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

#[tokio::test]
async fn concurrent_writers_and_readers_see_whole_artifacts() {
    let root = TempDir::new().expect("temp dir");
    let store = Arc::new(ArtifactStore::new(root.path().to_path_buf()).expect("store"));
    let payload = Bytes::from(vec![b'k'; 256 * 1024]);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let payload = payload.clone();
        tasks.push(tokio::spawn(async move {
            store
                .write("berlin", VERSION, FileFormat::Pdf, payload)
                .await
                .expect("write");
            store
                .read(
                    "berlin",
                    &VersionSelector::Exact(VERSION.to_string()),
                    FileFormat::Pdf,
                )
                .await
                .expect("read")
        }));
    }

    for task in tasks {
        let read = task.await.expect("task").expect("artifact present");
        assert_eq!(read.len(), payload.len());
    }

    let directory = store
        .path_for(
            "berlin",
            &VersionSelector::Exact(VERSION.to_string()),
            FileFormat::Pdf,
        )
        .parent()
        .expect("artifact directory")
        .to_path_buf();
    let entries = std::fs::read_dir(directory)
        .expect("list directory")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(entries, vec![format!("{VERSION}.pdf")]);
}

#[tokio::test]
async fn png_sizes_are_stored_side_by_side() {
    let root = TempDir::new().expect("temp dir");
    let store = ArtifactStore::new(root.path().to_path_buf()).expect("store");

    for (size, bytes) in [
        (PngSize::Native, &b"native"[..]),
        (PngSize::Small, &b"small"[..]),
        (PngSize::Large, &b"large"[..]),
    ] {
        store
            .write("leipzig", VERSION, FileFormat::Png(size), Bytes::copy_from_slice(bytes))
            .await
            .expect("write");
        store
            .update_latest("leipzig", VERSION, FileFormat::Png(size))
            .await
            .expect("latest");
    }

    let small = store
        .read("leipzig", &VersionSelector::Latest, FileFormat::Png(PngSize::Small))
        .await
        .expect("read")
        .expect("small present");
    assert_eq!(small.as_ref(), b"small");

    let medium = store
        .exists("leipzig", VERSION, FileFormat::Png(PngSize::Medium))
        .await
        .expect("exists");
    assert!(!medium);

    let path = artifact_path(
        "leipzig",
        &VersionSelector::Exact(VERSION.to_string()),
        FileFormat::Png(PngSize::Large),
    );
    let (dir, name) = path.split_once('/').expect("dir/name");
    assert_eq!(name, format!("{VERSION}_large.png"));
    let large = store
        .read_path(dir, name)
        .await
        .expect("read path")
        .expect("large present");
    assert_eq!(large.as_ref(), b"large");
}

#[tokio::test]
async fn reopened_store_keeps_artifacts_and_latest() {
    let root = TempDir::new().expect("temp dir");
    {
        let store = ArtifactStore::new(root.path().to_path_buf()).expect("store");
        store
            .write("dresden", VERSION, FileFormat::Svg, Bytes::from_static(b"<svg/>"))
            .await
            .expect("write");
        store
            .update_latest("dresden", VERSION, FileFormat::Svg)
            .await
            .expect("latest");
    }

    let reopened = ArtifactStore::new(root.path().to_path_buf()).expect("store");
    assert!(
        reopened
            .exists("dresden", VERSION, FileFormat::Svg)
            .await
            .expect("exists")
    );
    let latest = reopened
        .read("dresden", &VersionSelector::Latest, FileFormat::Svg)
        .await
        .expect("read")
        .expect("latest present");
    assert_eq!(latest.as_ref(), b"<svg/>");
}
