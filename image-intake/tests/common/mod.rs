//! Shared setup for integration tests

#![allow(dead_code)]

use axum::Router;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use image_intake::config::{IntakeConfig, StorageSettings};
use image_intake::handlers::router;
use image_intake::state::AppState;
use std::path::PathBuf;
use tempfile::TempDir;

/// A running test app and the directory it stores into
pub struct TestApp {
    pub server: TestServer,
    pub router: Router,
    pub temp_dir: TempDir,
}

impl TestApp {
    pub fn public_dir(&self) -> PathBuf {
        self.temp_dir.path().join("public")
    }

    pub fn temp_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.public_dir().join("temp"))
            .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
            .unwrap_or_default()
    }
}

pub fn setup_test_app() -> TestApp {
    setup_with(|_| {})
}

pub fn setup_with(configure: impl FnOnce(&mut IntakeConfig)) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let mut config = IntakeConfig {
        storage: StorageSettings {
            public_dir: temp_dir.path().join("public"),
            ..StorageSettings::default()
        },
        ..IntakeConfig::default()
    };
    configure(&mut config);

    let state = AppState::new(config).expect("Failed to create state");
    let router = router(state).expect("Failed to build router");
    let server = TestServer::new(router.clone()).expect("Failed to start test server");

    TestApp {
        server,
        router,
        temp_dir,
    }
}

pub fn upload_form(file_name: &str, mime_type: &str, data: Vec<u8>) -> MultipartForm {
    let part = Part::bytes(bytes::Bytes::from(data))
        .file_name(file_name.to_string())
        .mime_type(mime_type.to_string());
    MultipartForm::new().add_part("file", part)
}

pub fn with_signature(signature: &[u8], len: usize) -> Vec<u8> {
    let mut data = signature.to_vec();
    data.resize(len, 0);
    data
}

pub fn png(len: usize) -> Vec<u8> {
    with_signature(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A], len)
}

pub fn jpeg(len: usize) -> Vec<u8> {
    with_signature(&[0xFF, 0xD8, 0xFF, 0xE0], len)
}

pub fn gif(len: usize) -> Vec<u8> {
    with_signature(b"GIF89a", len)
}
