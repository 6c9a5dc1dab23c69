use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UploadResponse {
    /// Path on the private disk, to be passed back as `temp_video_path`
    pub path: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UploadDeleteBody {
    pub path: String,
}
