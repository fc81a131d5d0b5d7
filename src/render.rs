use crate::gateway::{GatewayError, ListedGrade};
use serde::{Deserialize, Serialize};

pub const COLUMNS: [&str; 5] = ["No", "Name", "Student ID", "Course Code", "Score"];
pub const UNKNOWN_COURSE: &str = "unknown course";
pub const NO_DATA: &str = "No grade data has been stored.";
pub const LOAD_FAILED: &str = "Failed to load data!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Entry,
    Listing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Empty,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableRow {
    Data {
        no: usize,
        name: String,
        #[serde(rename = "studentId")]
        student_id: String,
        #[serde(rename = "courseCode")]
        course_code: String,
        score: String,
    },
    /// Spans every column.
    Notice { kind: NoticeKind, message: String },
}

impl TableRow {
    fn cells(&self) -> Vec<String> {
        match self {
            TableRow::Data {
                no,
                name,
                student_id,
                course_code,
                score,
            } => vec![
                no.to_string(),
                name.clone(),
                student_id.clone(),
                course_code.clone(),
                score.clone(),
            ],
            TableRow::Notice { message, .. } => vec![message.clone()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingTable {
    columns: [&'static str; 5],
    rows: Vec<TableRow>,
}

impl Default for ListingTable {
    fn default() -> Self {
        Self {
            columns: COLUMNS,
            rows: Vec::new(),
        }
    }
}

pub fn format_score(score: f64) -> String {
    format!("{:.2}", score)
}

impl ListingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn show_notice(&mut self, kind: NoticeKind, message: &str) {
        self.rows.clear();
        self.rows.push(TableRow::Notice {
            kind,
            message: message.to_string(),
        });
    }

    /// Replaces the table contents with `listing`. Does nothing outside the listing view.
    pub fn render(
        &mut self,
        view: View,
        listing: Result<&[ListedGrade], &GatewayError>,
    ) -> bool {
        if view != View::Listing {
            return false;
        }
        let grades = match listing {
            Ok(g) => g,
            Err(_) => {
                self.show_notice(NoticeKind::Error, LOAD_FAILED);
                return true;
            }
        };
        if grades.is_empty() {
            self.show_notice(NoticeKind::Empty, NO_DATA);
            return true;
        }

        self.rows.clear();
        self.rows
            .extend(grades.iter().enumerate().map(|(i, g)| TableRow::Data {
                no: i + 1,
                name: g.student_name.clone(),
                student_id: g.student_id.clone(),
                course_code: g
                    .course_code
                    .as_deref()
                    .filter(|c| !c.is_empty())
                    .unwrap_or(UNKNOWN_COURSE)
                    .to_string(),
                score: format_score(g.score),
            }));
        true
    }

    /// Plain-text rendering with aligned columns, for logs and terminals.
    pub fn to_text(&self) -> String {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            if let TableRow::Data { .. } = row {
                for (w, cell) in widths.iter_mut().zip(row.cells()) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<width$}", c, width = *w))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        let header: Vec<String> = self.columns.iter().map(|c| c.to_string()).collect();
        let mut out = vec![line(&header)];
        out.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        for row in &self.rows {
            match row {
                TableRow::Data { .. } => out.push(line(&row.cells())),
                TableRow::Notice { message, .. } => out.push(message.clone()),
            }
        }
        out.join("\n")
    }
}
