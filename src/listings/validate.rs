//! Listing field validators.
//! Mission: Reject malformed listing payloads with `INVALID_INPUT` before
//! anything touches the database (spec §4.2).

use crate::db::models::FileKind;
use crate::error::{AppError, AppResult};
use crate::upload::path_belongs_to_user;

const TITLE_LEN: std::ops::RangeInclusive<usize> = 5..=100;
const DESCRIPTION_LEN: std::ops::RangeInclusive<usize> = 20..=5000;
const NOZZLE_TEMP_C: std::ops::RangeInclusive<i32> = 180..=450;

pub struct FileInput {
    pub path: String,
    pub kind: FileKind,
    pub size_bytes: i64,
}

pub struct ListingInput<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub categories: &'a [String],
    pub license: &'a str,
    pub price_minor_units: i64,
    pub currency: Option<&'a str>,
    pub dimensions_present: bool,
    pub dimensions: Option<(f64, f64, f64)>,
    pub nozzle_temp_c: Option<i32>,
    pub recommended_materials: &'a [String],
    pub hardware_items: &'a [String],
    pub is_ai_generated: bool,
    pub ai_model_name: Option<&'a str>,
    pub files: &'a [FileInput],
    pub user_id: &'a str,
}

pub fn validate_listing(input: &ListingInput) -> AppResult<()> {
    if !TITLE_LEN.contains(&input.title.len()) {
        return Err(AppError::invalid_input(format!("title must be {}-{} characters", TITLE_LEN.start(), TITLE_LEN.end())));
    }
    if !DESCRIPTION_LEN.contains(&input.description.len()) {
        return Err(AppError::invalid_input(format!(
            "description must be {}-{} characters",
            DESCRIPTION_LEN.start(),
            DESCRIPTION_LEN.end()
        )));
    }
    if input.categories.is_empty() {
        return Err(AppError::invalid_input("at least one category is required"));
    }
    if input.license.trim().is_empty() {
        return Err(AppError::invalid_input("license is required"));
    }
    if input.price_minor_units < 0 {
        return Err(AppError::invalid_input("price must be non-negative"));
    }
    if input.price_minor_units > 0 {
        match input.currency {
            Some("usd") | Some("gbp") => {}
            _ => return Err(AppError::invalid_input("priced listings require currency usd or gbp")),
        }
    }
    if let Some((x, y, z)) = input.dimensions {
        if x < 0.0 || y < 0.0 || z < 0.0 {
            return Err(AppError::invalid_input("dimensions must be non-negative"));
        }
    }
    if let Some(temp) = input.nozzle_temp_c {
        if !NOZZLE_TEMP_C.contains(&temp) {
            return Err(AppError::invalid_input(format!(
                "nozzle temp must be between {} and {} degrees C",
                NOZZLE_TEMP_C.start(),
                NOZZLE_TEMP_C.end()
            )));
        }
    }
    if input.recommended_materials.iter().any(|m| m.trim().is_empty()) {
        return Err(AppError::invalid_input("recommended materials cannot contain empty entries"));
    }
    if input.hardware_items.iter().any(|h| h.trim().is_empty()) {
        return Err(AppError::invalid_input("hardware items cannot contain empty entries"));
    }
    if input.is_ai_generated && input.ai_model_name.map(str::trim).unwrap_or("").is_empty() {
        return Err(AppError::invalid_input("AI-generated listings require a model name"));
    }

    validate_files(input.files, input.user_id)?;
    Ok(())
}

fn validate_files(files: &[FileInput], user_id: &str) -> AppResult<()> {
    let mut has_model = false;
    let mut has_image = false;

    for file in files {
        if file.path.trim().is_empty() {
            return Err(AppError::invalid_input("file path cannot be empty"));
        }
        if file.size_bytes <= 0 {
            return Err(AppError::invalid_input("file size must be positive"));
        }
        if !path_belongs_to_user(&file.path, user_id) {
            return Err(AppError::invalid_input("file path does not belong to the requesting user"));
        }
        match file.kind {
            FileKind::Model => has_model = true,
            FileKind::Image => has_image = true,
        }
    }

    if !has_model {
        return Err(AppError::invalid_input("at least one MODEL file is required"));
    }
    if !has_image {
        return Err(AppError::invalid_input("at least one IMAGE file is required"));
    }
    Ok(())
}

/// The subset of validators re-run against an update patch (spec §4.2
/// "re-run the same per-field validators that apply to create").
pub fn validate_update(
    price_minor_units: Option<i64>,
    currency: Option<Option<&str>>,
    is_ai_generated: Option<bool>,
    ai_model_name: Option<Option<&str>>,
) -> AppResult<()> {
    if let Some(price) = price_minor_units {
        if price < 0 {
            return Err(AppError::invalid_input("price must be non-negative"));
        }
        if price > 0 {
            let currency = currency.flatten();
            if !matches!(currency, Some("usd") | Some("gbp")) {
                return Err(AppError::invalid_input("priced listings require currency usd or gbp"));
            }
        }
    }
    if is_ai_generated == Some(true) {
        let name = ai_model_name.flatten().unwrap_or("");
        if name.trim().is_empty() {
            return Err(AppError::invalid_input("AI-generated listings require a model name"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> ListingInput<'static> {
        ListingInput {
            title: "Articulated Dragon",
            description: "A dragon model with moving joints and an articulated tail.",
            categories: &["artistic".to_string()],
            license: "standard",
            price_minor_units: 0,
            currency: None,
            dimensions_present: false,
            dimensions: None,
            nozzle_temp_c: None,
            recommended_materials: &[],
            hardware_items: &[],
            is_ai_generated: false,
            ai_model_name: None,
            files: &[],
            user_id: "user-1",
        }
    }

    #[test]
    fn rejects_short_title() {
        let mut input = valid_input();
        input.title = "abc";
        assert!(validate_listing(&input).is_err());
    }

    #[test]
    fn rejects_priced_listing_without_currency() {
        let mut input = valid_input();
        input.price_minor_units = 500;
        assert!(validate_listing(&input).is_err());
    }

    #[test]
    fn accepts_priced_listing_with_currency() {
        let mut input = valid_input();
        input.price_minor_units = 500;
        input.currency = Some("usd");
        input.files = &[
            FileInput { path: "2026/07/28/user-1/d1/models/a.stl".to_string(), kind: FileKind::Model, size_bytes: 10 },
            FileInput { path: "2026/07/28/user-1/d1/images/a.png".to_string(), kind: FileKind::Image, size_bytes: 10 },
        ];
        assert!(validate_listing(&input).is_ok());
    }

    #[test]
    fn rejects_ai_generated_without_model_name() {
        let mut input = valid_input();
        input.is_ai_generated = true;
        assert!(validate_listing(&input).is_err());
    }

    #[test]
    fn rejects_file_path_owned_by_another_user() {
        let mut input = valid_input();
        input.files = &[
            FileInput { path: "2026/07/28/someone-else/d1/models/a.stl".to_string(), kind: FileKind::Model, size_bytes: 10 },
            FileInput { path: "2026/07/28/user-1/d1/images/a.png".to_string(), kind: FileKind::Image, size_bytes: 10 },
        ];
        assert!(validate_listing(&input).is_err());
    }

    #[test]
    fn rejects_missing_image_file() {
        let mut input = valid_input();
        input.files = &[FileInput {
            path: "2026/07/28/user-1/d1/models/a.stl".to_string(),
            kind: FileKind::Model,
            size_bytes: 10,
        }];
        assert!(validate_listing(&input).is_err());
    }

    #[test]
    fn nozzle_temp_out_of_range_is_rejected() {
        let mut input = valid_input();
        input.nozzle_temp_c = Some(500);
        assert!(validate_listing(&input).is_err());
    }
}
