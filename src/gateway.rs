use crate::config::Settings;
use crate::store::{
    Direction, DocumentStore, SetMode, StoreError, WriteBatch, WriteFields, GRADES, STUDENTS,
};
use crate::validate::ValidGrade;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

pub const COURSE_SEPARATOR: &str = " - ";
pub const NAME_NOT_FOUND: &str = "name not found";
pub const SUBMITTED_AT: &str = "submittedAt";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedGrade {
    pub grade_id: String,
    pub student_id: String,
    pub course_code: String,
    pub score: f64,
}

/// A grade entry joined with its student's display name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedGrade {
    pub grade_id: String,
    pub student_name: String,
    pub student_id: String,
    pub course_code: Option<String>,
    pub score: f64,
    pub submitted_at: Option<String>,
}

/// `"CS101 - Intro"` gives `"CS101"`. Without a separator the whole input is the code.
pub fn course_code(course: &str) -> &str {
    course
        .split_once(COURSE_SEPARATOR)
        .map(|(code, _)| code)
        .unwrap_or(course)
        .trim()
}

pub struct PersistenceGateway<S> {
    store: S,
    settings: Settings,
}

impl<S: DocumentStore> PersistenceGateway<S> {
    pub fn new(store: S, settings: Settings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Upserts the student, then appends the grade entry.
    pub fn save(&self, grade: &ValidGrade) -> Result<SavedGrade, GatewayError> {
        let code = course_code(&grade.course).to_string();
        let student = WriteFields::new()
            .with("id", grade.student_id.as_str())
            .with("name", grade.full_name.as_str())
            .with("program", self.settings.default_program.as_str());
        let entry = WriteFields::new()
            .with("studentId", grade.student_id.as_str())
            .with("courseCode", code.as_str())
            .with("score", grade.score)
            .with_server_timestamp(SUBMITTED_AT);

        let written = if self.settings.atomic_writes {
            let mut batch = WriteBatch::new();
            batch.set(STUDENTS, &grade.student_id, student, SetMode::Merge);
            let grade_id = batch.add(GRADES, entry);
            self.store.commit(batch).map(|()| grade_id)
        } else {
            // No rollback: a failed append leaves the upserted student in place.
            self.store
                .set(STUDENTS, &grade.student_id, student, SetMode::Merge)
                .and_then(|()| self.store.add(GRADES, entry))
        };

        let grade_id = written.map_err(|e| {
            error!(student_id = %grade.student_id, error = %e, "failed to save grade");
            GatewayError::from(e)
        })?;

        info!(
            grade_id = %grade_id,
            student_id = %grade.student_id,
            course_code = %code,
            "grade saved"
        );
        Ok(SavedGrade {
            grade_id,
            student_id: grade.student_id.clone(),
            course_code: code,
            score: grade.score,
        })
    }

    /// All grade entries, newest submission first, each with its student's name.
    pub fn load_all(&self) -> Result<Vec<ListedGrade>, GatewayError> {
        let docs = self
            .store
            .query_ordered(GRADES, SUBMITTED_AT, Direction::Descending)
            .map_err(|e| {
                error!(error = %e, "failed to load grades");
                GatewayError::from(e)
            })?;

        let mut student_ids: Vec<String> = docs
            .iter()
            .filter_map(|d| d.get_str("studentId"))
            .map(str::to_string)
            .collect();
        student_ids.sort();
        student_ids.dedup();

        let students = self.store.get_many(STUDENTS, &student_ids).map_err(|e| {
            error!(error = %e, "failed to load students");
            GatewayError::from(e)
        })?;

        let rows: Vec<ListedGrade> = docs
            .iter()
            .map(|d| {
                let student_id = d.get_str("studentId").unwrap_or_default().to_string();
                let student_name = students
                    .get(&student_id)
                    .and_then(|s| s.get_str("name"))
                    .unwrap_or(NAME_NOT_FOUND)
                    .to_string();
                ListedGrade {
                    grade_id: d.id.clone(),
                    student_name,
                    student_id,
                    course_code: d.get_str("courseCode").map(str::to_string),
                    score: d.get_f64("score").unwrap_or(0.0),
                    submitted_at: d.get_str(SUBMITTED_AT).map(str::to_string),
                }
            })
            .collect();

        debug!(
            rows = rows.len(),
            students = students.len(),
            "grades loaded"
        );
        Ok(rows)
    }
}
