pub mod management;
pub mod session;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use management::*;
pub use session::*;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Unauthorized")]
    pub error: String,
}
