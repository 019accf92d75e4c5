//! Mock upload service for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::uploader::{UploadError, UploadPayload, UploadResult, Uploader};

/// Records payloads and hands out fake video links.
#[derive(Default)]
pub struct MockUploader {
    uploads: Mutex<Vec<UploadPayload>>,
    fail: AtomicBool,
}

impl MockUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upload fail until switched back.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Payloads of successful uploads.
    pub fn uploads(&self) -> Vec<UploadPayload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Uploader for MockUploader {
    async fn upload(&self, payload: &UploadPayload) -> Result<UploadResult, UploadError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(UploadError::Api {
                status: 500,
                message: "mock upload failure".to_string(),
            });
        }

        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(payload.clone());
        Ok(UploadResult {
            youtube_link: format!("https://youtu.be/mock{}", uploads.len()),
        })
    }
}
