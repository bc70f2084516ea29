use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder stored in a freshly created list. Never a real course.
pub const EMPTY_LIST_SENTINEL: &str = "null";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseListEntry(pub String);

impl CourseListEntry {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_sentinel(&self) -> bool {
        self.0 == EMPTY_LIST_SENTINEL
    }
}

impl fmt::Display for CourseListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserBootstrap {
    Created,
    AlreadyExists,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveOutcome {
    Removed,
    NotPresent,
}

impl RemoveOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Removed => "removed",
            Self::NotPresent => "not_present",
        }
    }
}

/// Stored form of a user's saved courses, sentinel included.
///
/// Mutations read the whole list, change it, and hand it back for a whole-list
/// write, so callers must serialize mutations per user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCourseList {
    #[serde(rename = "courseList")]
    stored: Vec<CourseListEntry>,
}

impl UserCourseList {
    pub fn initialized() -> Self {
        Self { stored: vec![CourseListEntry::new(EMPTY_LIST_SENTINEL)] }
    }

    pub fn from_stored(stored: Vec<String>) -> Self {
        Self { stored: stored.into_iter().map(CourseListEntry).collect() }
    }

    pub fn entries(&self) -> Vec<CourseListEntry> {
        self.stored.iter().filter(|entry| !entry.is_sentinel()).cloned().collect()
    }

    pub fn contains(&self, entry: &CourseListEntry) -> bool {
        !entry.is_sentinel() && self.stored.contains(entry)
    }

    /// The sentinel can never be added; it reports as already present.
    pub fn add(&mut self, entry: CourseListEntry) -> AddOutcome {
        if entry.is_sentinel() || self.stored.contains(&entry) {
            return AddOutcome::AlreadyPresent;
        }
        self.stored.push(entry);
        AddOutcome::Added
    }

    pub fn remove(&mut self, entry: &CourseListEntry) -> RemoveOutcome {
        if entry.is_sentinel() {
            return RemoveOutcome::NotPresent;
        }
        match self.stored.iter().position(|stored| stored == entry) {
            Some(index) => {
                self.stored.remove(index);
                RemoveOutcome::Removed
            }
            None => RemoveOutcome::NotPresent,
        }
    }

    pub fn into_stored(self) -> Vec<String> {
        self.stored.into_iter().map(|entry| entry.0).collect()
    }
}

impl Default for UserCourseList {
    fn default() -> Self {
        Self::initialized()
    }
}
