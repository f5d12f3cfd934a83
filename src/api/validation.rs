use super::ApiError;
use crate::jobs::ExportFormat;

pub fn validate_record_id(id: i64) -> Result<i64, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid record ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

pub fn validate_job_limit(limit: Option<u64>) -> Result<u64, ApiError> {
    const MAX_LIMIT: u64 = 1000;
    const MIN_LIMIT: u64 = 1;
    const DEFAULT_LIMIT: u64 = 50;

    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::validation(format!(
            "Invalid limit: {}. Limit must be between {} and {}",
            limit, MIN_LIMIT, MAX_LIMIT
        )));
    }
    Ok(limit)
}

pub fn validate_export_format(format: Option<&str>) -> Result<ExportFormat, ApiError> {
    format
        .unwrap_or("json")
        .parse::<ExportFormat>()
        .map_err(ApiError::from)
}

pub fn validate_job_name(name: &str) -> Result<&str, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Job name cannot be empty"));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_record_id() {
        assert!(validate_record_id(1).is_ok());
        assert!(validate_record_id(0).is_err());
        assert!(validate_record_id(-3).is_err());
    }

    #[test]
    fn test_validate_job_limit() {
        assert_eq!(validate_job_limit(None).unwrap(), 50);
        assert!(validate_job_limit(Some(1000)).is_ok());
        assert!(validate_job_limit(Some(0)).is_err());
        assert!(validate_job_limit(Some(1001)).is_err());
    }

    #[test]
    fn test_validate_export_format() {
        assert_eq!(validate_export_format(None).unwrap(), ExportFormat::Json);
        assert_eq!(validate_export_format(Some("CSV")).unwrap(), ExportFormat::Csv);
        assert!(validate_export_format(Some("xml")).is_err());
    }

    #[test]
    fn test_validate_job_name() {
        assert_eq!(validate_job_name("  cleanup ").unwrap(), "cleanup");
        assert!(validate_job_name("   ").is_err());
    }
}
