//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::dao::models::is_guild_id;

/// Validates that an id has the shape of a Discord snowflake: 1 to 20 ASCII digits.
///
/// # Examples
///
/// ```ignore
/// validate_snowflake("1297188286191767603") // Ok
/// validate_snowflake("12a")                 // Err - not a digit
/// validate_snowflake("")                    // Err - empty
/// ```
pub fn validate_snowflake(id: &str) -> Result<(), ValidationError> {
    if is_guild_id(id) {
        return Ok(());
    }

    let mut err = ValidationError::new("snowflake_format");
    err.message = Some(format!("`{id}` is not a Discord id (1 to 20 digits)").into());
    Err(err)
}

/// Validates a dot-separated entity path such as `players.456.age`.
pub fn validate_entity_path(path: &str) -> Result<(), ValidationError> {
    if !path.is_empty() && path.split('.').all(|segment| !segment.is_empty()) {
        return Ok(());
    }

    let mut err = ValidationError::new("entity_path_format");
    err.message = Some("Entity path must be non-empty segments separated by dots".into());
    Err(err)
}
