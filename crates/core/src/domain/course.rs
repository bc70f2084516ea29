use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::user::CourseListEntry;

/// Meeting pattern; `start` and `end` are HHMM clock values (e.g. `1130`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub days: String,
    pub start: u16,
    pub end: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseDescriptor {
    pub sln: String,
    pub prefix: String,
    pub number: String,
    pub title: String,
    pub schedule: Schedule,
    pub is_section: bool,
    pub instructor: String,
    pub is_open: bool,
    pub general_education: Option<String>,
    pub is_writing: bool,
    pub link: Option<String>,
}

impl CourseDescriptor {
    pub fn entry(&self) -> CourseListEntry {
        CourseListEntry::new(self.sln.clone())
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.prefix, self.number)
    }
}

/// Department prefix plus course number, as named by the user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseKey {
    pub department: String,
    pub number: String,
}

impl CourseKey {
    pub fn new(department: impl Into<String>, number: impl Into<String>) -> Self {
        Self { department: department.into(), number: number.into() }
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.department, self.number)
    }
}
