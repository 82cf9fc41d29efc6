//! Category API endpoints
//!
//! - GET /categories - the fixed category list

use crate::api::responses::ApiResponse;
use crate::models::{Category, CATEGORIES};

/// GET /categories
pub async fn list_categories() -> ApiResponse<&'static [Category]> {
    ApiResponse::ok("Categories retrieved successfully!", CATEGORIES)
}
