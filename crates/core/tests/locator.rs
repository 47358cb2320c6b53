//! End-to-end locator tests through a full context

use std::io::Write;
use std::sync::LazyLock;

use datalayer_core::{Context, Decryptor, EncryptionError, Error, LocatorOptions, Resource};
use tempfile::TempDir;

static PRIVATE_KEY_PEM: LazyLock<String> =
    LazyLock::new(|| Decryptor::generate_private_key(None, 2048).expect("generate key"));

fn decryptor() -> Decryptor {
    Decryptor::from_pem(&PRIVATE_KEY_PEM, None, None).expect("load key")
}

/// A scratch directory inside the working directory, so safe mode allows it
fn workspace() -> TempDir {
    tempfile::Builder::new()
        .prefix("locator-test-")
        .tempdir_in(std::env::current_dir().unwrap())
        .unwrap()
}

fn dir_url(dir: &TempDir) -> String {
    format!("file://{}/", dir.path().display())
}

#[tokio::test]
async fn test_encrypted_roundtrip_through_alias() {
    let dir = workspace();
    let decryptor = decryptor();
    let name = decryptor.name().to_string();

    let mut context = Context::new();
    context.crypto().register_decryptor(decryptor);
    context.register_url("vault", format!("{}?locator=1&encrypt={name}", dir_url(&dir)));

    let document = serde_json::json!({"user": "alice", "token": "s3cr3t-value"});
    let locator = context.locator("alias://vault/secret.json?locator=1&type=json").await.unwrap();
    assert_eq!(locator.backend_name(), "file");
    locator.put(Some(Resource::Json(document.clone()))).await.unwrap();

    let raw = std::fs::read(dir.path().join("secret.json")).unwrap();
    assert!(!raw.windows(12).any(|w| w == b"s3cr3t-value"));

    assert_eq!(locator.get().await.unwrap(), Some(Resource::Json(document)));
}

#[tokio::test]
async fn test_decrypt_requires_registered_key() {
    let dir = workspace();
    let decryptor = decryptor();
    let url = format!("{}data.bin?locator=1&encrypt={}", dir_url(&dir), decryptor.name());

    let context = Context::new();
    context.crypto().register_decryptor(decryptor);
    let locator = context.locator(&url).await.unwrap();
    locator.put(Some(Resource::from("payload"))).await.unwrap();

    {
        let _scope = context.crypto().scope();
        let err = locator.get().await.unwrap_err();
        assert!(err.is_location_error());
        assert!(matches!(err.encryption_error(), Some(EncryptionError::Registry(_))));
    }

    assert_eq!(
        locator.get().await.unwrap(),
        Some(Resource::Bytes(b"payload".to_vec()))
    );
}

#[tokio::test]
async fn test_archive_untransform() {
    let dir = workspace();
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("test.key", options).unwrap();
    writer.write_all(b"Key Content").unwrap();
    writer.start_file("test.pem", options).unwrap();
    writer.write_all(b"Pem Content").unwrap();
    let archive = writer.finish().unwrap().into_inner();
    std::fs::write(dir.path().join("bundle.zip"), archive).unwrap();

    let context = Context::new();
    let locator = context
        .locator(&format!("{}bundle.zip?locator=1&compress=zip", dir_url(&dir)))
        .await
        .unwrap();

    let Some(Resource::Archive(entries)) = locator.get().await.unwrap() else {
        panic!("expected an archive");
    };
    assert_eq!(entries.len(), 2);
    assert_eq!(entries["test.key"], b"Key Content");
    assert_eq!(entries["test.pem"], b"Pem Content");
}

#[tokio::test]
async fn test_safe_mode_boundary() {
    let context = Context::new();
    let locator = context.locator("file:///tmp/outside.json").await.unwrap();
    let err = locator.get().await.unwrap_err();
    assert!(err.is_location_error());
    assert_eq!(err.url().as_deref(), Some("file:///tmp/outside.json"));
    assert!(matches!(err.cause(), Error::UnsafePath(_)));

    let unsafe_locator = context
        .locator_with_options("file:///tmp/outside.json", LocatorOptions { safe: false })
        .await
        .unwrap();
    assert!(!unsafe_locator.target().safe);
}

#[tokio::test]
async fn test_directory_lifecycle() {
    let dir = workspace();
    let mut context = Context::new();
    context.register_url("scratch", dir_url(&dir));

    context.locator("alias://scratch/nested/").await.unwrap().put(None).await.unwrap();
    context
        .locator("alias://scratch/nested/a.txt")
        .await
        .unwrap()
        .put(Some(Resource::from("a")))
        .await
        .unwrap();
    context
        .locator("alias://scratch/b.txt")
        .await
        .unwrap()
        .put(Some(Resource::from("b")))
        .await
        .unwrap();

    let root = context.locator("alias://scratch").await.unwrap();
    assert_eq!(
        root.list().await.unwrap(),
        Some(vec!["b.txt".to_string(), "nested/".to_string()])
    );

    context.locator("alias://scratch/nested/").await.unwrap().delete().await.unwrap();
    assert_eq!(root.list().await.unwrap(), Some(vec!["b.txt".to_string()]));
    assert_eq!(
        context.locator("alias://scratch/missing/").await.unwrap().list().await.unwrap(),
        None
    );
}
