//! Search document composition.
//! Mission: Denormalize a listing row into the shape the search index
//! expects (spec §4.5).

use serde::Serialize;

use crate::db::models::ListingRow;

#[derive(Debug, Serialize)]
pub struct SearchDocument {
    pub id: String,
    pub seller_id: String,
    pub seller_display_name: String,
    pub seller_username: String,
    pub seller_verified: bool,
    pub title: String,
    pub description: String,
    pub categories: Vec<String>,
    pub license: String,
    pub thumbnail_url: String,
    pub price_minor_units: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub is_free: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_price_minor_units: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_starts_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_ends_at: Option<i64>,
    pub is_physical: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dim_x_mm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dim_y_mm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dim_z_mm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_grams: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nozzle_temp_c: Option<i32>,
    pub recommended_materials: Vec<String>,
    pub is_multicolor: bool,
    pub requires_assembly: bool,
    pub hardware_items: Vec<String>,
    pub remixing_allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_listing_id: Option<String>,
    pub is_nsfw: bool,
    pub is_ai_generated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_model_name: Option<String>,
    pub likes_count: i64,
    pub downloads_count: i64,
    pub comments_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Compose a search document from a listing row. The document id is the
/// listing id, so repeated upserts are idempotent (spec §4.5, §5).
pub fn compose(row: &ListingRow, public_base_url: &str) -> SearchDocument {
    let dimensions = row.dimensions();
    let sale = row.sale_metadata();

    SearchDocument {
        id: row.id.to_string(),
        seller_id: row.seller_id.clone(),
        seller_display_name: row.seller_display_name.clone(),
        seller_username: row.seller_username.clone(),
        seller_verified: row.seller_verified,
        title: row.title.clone(),
        description: row.description.clone(),
        categories: row.categories.clone(),
        license: row.license.clone(),
        thumbnail_url: format!("{}/{}", public_base_url.trim_end_matches('/'), row.thumbnail_path.trim_start_matches('/')),
        price_minor_units: row.price_minor_units,
        currency: row.currency.clone(),
        is_free: row.is_free,
        sale_price_minor_units: sale.as_ref().map(|s| s.sale_price_minor_units),
        sale_starts_at: sale.as_ref().map(|s| s.starts_at.timestamp()),
        sale_ends_at: sale.as_ref().map(|s| s.ends_at.timestamp()),
        is_physical: row.is_physical,
        dim_x_mm: dimensions.map(|d| d.x),
        dim_y_mm: dimensions.map(|d| d.y),
        dim_z_mm: dimensions.map(|d| d.z),
        weight_grams: row.weight_grams,
        nozzle_temp_c: row.nozzle_temp_c,
        recommended_materials: row.recommended_materials.clone(),
        is_multicolor: row.is_multicolor,
        requires_assembly: row.requires_assembly,
        hardware_items: row.hardware_items.clone(),
        remixing_allowed: row.remixing_allowed,
        parent_listing_id: row.parent_listing_id.map(|id| id.to_string()),
        is_nsfw: row.is_nsfw,
        is_ai_generated: row.is_ai_generated,
        ai_model_name: row.ai_model_name.clone(),
        likes_count: row.likes_count,
        downloads_count: row.downloads_count,
        comments_count: row.comments_count,
        created_at: row.created_at.timestamp(),
        updated_at: row.updated_at.timestamp(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ListingState;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_row() -> ListingRow {
        ListingRow {
            id: Uuid::new_v4(),
            seller_id: "seller-1".to_string(),
            seller_display_name: "Seller One".to_string(),
            seller_username: "seller1".to_string(),
            seller_verified: true,
            title: "Articulated Dragon".to_string(),
            description: "A dragon model with moving joints.".to_string(),
            categories: vec!["artistic".to_string()],
            license: "standard".to_string(),
            thumbnail_path: "2026/07/28/user-1/d1/images/a.png".to_string(),
            price_minor_units: 1999,
            currency: Some("usd".to_string()),
            is_free: false,
            sale: None,
            is_physical: true,
            dimensions_mm: Some(serde_json::json!({ "width": 10.0, "depth": 20.0, "height": 30.0 })),
            weight_grams: Some(45.0),
            nozzle_temp_c: Some(210),
            recommended_materials: vec!["PLA".to_string()],
            is_multicolor: false,
            requires_assembly: false,
            hardware_items: vec![],
            remixing_allowed: true,
            parent_listing_id: None,
            is_nsfw: false,
            is_ai_generated: false,
            ai_model_name: None,
            state: ListingState::Active,
            likes_count: 3,
            downloads_count: 12,
            comments_count: 1,
            trace_id: "trace-1".to_string(),
            authorized_party: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_indexed_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn flattens_dimensions_into_dim_fields() {
        let doc = compose(&sample_row(), "https://cdn.example.test");
        assert_eq!(doc.dim_x_mm, Some(10.0));
        assert_eq!(doc.dim_y_mm, Some(20.0));
        assert_eq!(doc.dim_z_mm, Some(30.0));
    }

    #[test]
    fn thumbnail_url_has_exactly_one_slash_join() {
        let doc = compose(&sample_row(), "https://cdn.example.test/");
        assert_eq!(doc.thumbnail_url, "https://cdn.example.test/2026/07/28/user-1/d1/images/a.png");
    }

    #[test]
    fn document_id_is_listing_id() {
        let row = sample_row();
        let doc = compose(&row, "https://cdn.example.test");
        assert_eq!(doc.id, row.id.to_string());
    }
}
