use std::sync::Arc;

use crate::config::StorageConfig;
use crate::model::ModelManager;
use crate::quiz::QuizGenerator;
use crate::storage::Storage;
use crate::video::HlsTranscoder;

#[derive(Debug, Clone)]
pub struct AppState {
    mm: ModelManager,
    storage: Storage,
    limits: StorageConfig,
    transcoder: HlsTranscoder,
    generator: Arc<dyn QuizGenerator>,
}

impl AppState {
    pub fn new(
        mm: ModelManager,
        storage: Storage,
        limits: StorageConfig,
        transcoder: HlsTranscoder,
        generator: Arc<dyn QuizGenerator>,
    ) -> Self {
        Self {
            mm,
            storage,
            limits,
            transcoder,
            generator,
        }
    }

    pub fn pool(&self) -> &ModelManager {
        &self.mm
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn max_video_bytes(&self) -> u64 {
        self.limits.max_video_bytes
    }

    pub fn max_document_bytes(&self) -> u64 {
        self.limits.max_document_bytes
    }

    pub fn transcoder(&self) -> &HlsTranscoder {
        &self.transcoder
    }

    pub fn generator(&self) -> &dyn QuizGenerator {
        self.generator.as_ref()
    }
}
