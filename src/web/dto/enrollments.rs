use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct ProgressBody {
    #[validate(range(min = 0, max = 100, message = "progress must be between 0 and 100"))]
    pub progress: i32,
}
