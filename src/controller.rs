use crate::gateway::{PersistenceGateway, SavedGrade};
use crate::render::{ListingTable, View};
use crate::store::DocumentStore;
use crate::validate::{validate, GradeInput};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const SAVE_OK: &str = "Data saved successfully!";
pub const SAVE_FAILED: &str = "Failed to save data to the database.";

/// The entry form as the user sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormFields {
    pub full_name: String,
    pub student_id: String,
    pub course: String,
    pub score: String,
}

impl FormFields {
    pub fn trimmed(&self) -> Self {
        Self {
            full_name: self.full_name.trim().to_string(),
            student_id: self.student_id.trim().to_string(),
            course: self.course.trim().to_string(),
            score: self.score.trim().to_string(),
        }
    }

    fn to_input(&self) -> GradeInput {
        GradeInput {
            full_name: self.full_name.clone(),
            student_id: self.student_id.clone(),
            course: self.course.clone(),
            score_text: self.score.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", content = "message", rename_all = "snake_case")]
pub enum Notification {
    Info(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub saved: Option<SavedGrade>,
    /// Validation category when the input was rejected before any store call.
    pub rejected: Option<&'static str>,
    pub notifications: Vec<Notification>,
}

impl SubmitOutcome {
    pub fn is_saved(&self) -> bool {
        self.saved.is_some()
    }
}

pub struct FormController<S> {
    gateway: PersistenceGateway<S>,
    view: View,
    form: FormFields,
    table: ListingTable,
}

impl<S: DocumentStore> FormController<S> {
    pub fn new(gateway: PersistenceGateway<S>) -> Self {
        Self {
            gateway,
            view: View::Entry,
            form: FormFields::default(),
            table: ListingTable::new(),
        }
    }

    pub fn gateway(&self) -> &PersistenceGateway<S> {
        &self.gateway
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn form(&self) -> &FormFields {
        &self.form
    }

    pub fn table(&self) -> &ListingTable {
        &self.table
    }

    /// Switches the current view; arriving at the listing loads it.
    pub fn navigate(&mut self, view: View) -> bool {
        self.view = view;
        self.reload()
    }

    /// Reloads and re-renders the listing. No-op unless the listing view is current.
    pub fn reload(&mut self) -> bool {
        if self.view != View::Listing {
            debug!(view = ?self.view, "listing reload skipped");
            return false;
        }
        let listing = self.gateway.load_all();
        let rendered = self
            .table
            .render(self.view, listing.as_ref().map(|rows| rows.as_slice()));
        debug!("listing rendered\n{}", self.table.to_text());
        rendered
    }

    /// Handles one form submission. The form keeps its values unless the save succeeds.
    pub fn submit(&mut self, fields: &FormFields) -> SubmitOutcome {
        self.form = fields.clone();

        let valid = match validate(&fields.trimmed().to_input()) {
            Ok(v) => v,
            Err(e) => {
                warn!(category = e.category(), "submission rejected");
                return SubmitOutcome {
                    saved: None,
                    rejected: Some(e.category()),
                    notifications: vec![Notification::Error(e.to_string())],
                };
            }
        };

        let saved = match self.gateway.save(&valid) {
            Ok(s) => s,
            Err(_) => {
                return SubmitOutcome {
                    saved: None,
                    rejected: None,
                    notifications: vec![Notification::Error(SAVE_FAILED.into())],
                };
            }
        };

        info!(grade_id = %saved.grade_id, "submission stored");
        self.reload();
        self.form = FormFields::default();
        SubmitOutcome {
            saved: Some(saved),
            rejected: None,
            notifications: vec![Notification::Info(SAVE_OK.into())],
        }
    }
}
