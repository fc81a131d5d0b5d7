use thiserror::Error;

/// Raw form values as submitted. Callers trim before validating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GradeInput {
    pub full_name: String,
    pub student_id: String,
    pub course: String,
    pub score_text: String,
}

/// Input that passed every check; the score is parsed exactly once, here.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidGrade {
    pub full_name: String,
    pub student_id: String,
    pub course: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Failed to save data. All fields must be filled in.")]
    MissingFields,
    #[error("Failed to save data. Student ID may only contain digits.")]
    InvalidStudentId,
    #[error("Failed to save data. Score must be between 0 and 100.")]
    ScoreOutOfRange,
}

impl ValidationError {
    pub fn category(&self) -> &'static str {
        match self {
            ValidationError::MissingFields => "missing_fields",
            ValidationError::InvalidStudentId => "invalid_student_id",
            ValidationError::ScoreOutOfRange => "score_out_of_range",
        }
    }
}

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

pub fn validate(input: &GradeInput) -> Result<ValidGrade, ValidationError> {
    let full_name = input.full_name.trim();
    let student_id = input.student_id.trim();
    let course = input.course.trim();
    let score_text = input.score_text.trim();

    if [full_name, student_id, course, score_text]
        .iter()
        .any(|v| v.is_empty())
    {
        return Err(ValidationError::MissingFields);
    }

    if !student_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidStudentId);
    }

    let score = parse_score(score_text).ok_or(ValidationError::ScoreOutOfRange)?;

    Ok(ValidGrade {
        full_name: full_name.to_string(),
        student_id: student_id.to_string(),
        course: course.to_string(),
        score,
    })
}

// Strict: the whole text must be a number, so "87abc" and "0x10" are rejected.
fn parse_score(text: &str) -> Option<f64> {
    let v = text.parse::<f64>().ok()?;
    if !v.is_finite() || !(SCORE_MIN..=SCORE_MAX).contains(&v) {
        return None;
    }
    Some(v)
}
