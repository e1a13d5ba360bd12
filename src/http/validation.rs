use crate::http::AppError;

/// Length bounds for a text field, counted in characters.
#[derive(Debug, Clone, Copy)]
pub struct TextRule {
    pub field: &'static str,
    pub min: usize,
    pub max: usize,
}

pub const CAPTION: TextRule = TextRule {
    field: "caption",
    min: 1,
    max: 2200,
};

pub const LOCATION: TextRule = TextRule {
    field: "location",
    min: 0,
    max: 100,
};

pub const COMMENT_CONTENT: TextRule = TextRule {
    field: "content",
    min: 1,
    max: 1000,
};

impl TextRule {
    pub fn check(&self, value: &str) -> Result<(), AppError> {
        let len = value.chars().count();
        if len < self.min {
            return Err(AppError::bad_request(format!("{} is required", self.field)));
        }
        if len > self.max {
            return Err(AppError::bad_request(format!(
                "{} must be at most {} characters",
                self.field, self.max
            )));
        }
        Ok(())
    }

    /// Absent or empty optional fields pass and come back as `None`.
    pub fn check_optional(&self, value: Option<String>) -> Result<Option<String>, AppError> {
        match value {
            Some(value) if !value.is_empty() => {
                self.check(&value)?;
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }
}
