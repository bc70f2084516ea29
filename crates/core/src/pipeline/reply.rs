//! Chat text for each pipeline outcome. Pure rendering; no lookups.

use crate::domain::course::{CourseDescriptor, CourseKey};
use crate::domain::intent::Greeting;
use crate::domain::user::CourseListEntry;
use crate::errors::ApplicationError;
use crate::pipeline::service::CourseListOutcome;

pub const UNKNOWN_REPLY: &str = "I'm sorry. I didn't understand what you said.";
pub const HELP_REPLY: &str = "Let me show you how I can help you! You can search for a class by \
typing \"search\" or I can add a class by Course and Title by typing \"add\" or remove a class \
by typing \"remove\"";
pub const EMPTY_PLAN_REPLY: &str =
    "You have not added any classes to your list. You may want to do so now!";
pub const DEPARTMENT_NOT_FOUND_REPLY: &str = "these classes could not be found";
pub const COURSE_NOT_FOUND_REPLY: &str = "this class could not be found";
pub const ADD_REJECTED_REPLY: &str = "Fail to add class";

pub fn render_outcome(outcome: &CourseListOutcome) -> String {
    match outcome {
        CourseListOutcome::Plan { entries } => render_plan(entries),
        CourseListOutcome::DepartmentListing { courses, .. } => render_listing(courses),
        CourseListOutcome::CourseDetail { course } => render_detail(course),
        CourseListOutcome::CourseNotFound { .. } => COURSE_NOT_FOUND_REPLY.to_owned(),
        CourseListOutcome::Added { course } => render_added(course),
        CourseListOutcome::AddRejected { .. } => ADD_REJECTED_REPLY.to_owned(),
        CourseListOutcome::RemoveAcknowledged { key, .. } => render_remove(key),
    }
}

pub fn render_plan(entries: &[CourseListEntry]) -> String {
    if entries.is_empty() {
        return EMPTY_PLAN_REPLY.to_owned();
    }
    let mut reply = String::from("These are the classes I saved for you:");
    for entry in entries {
        reply.push_str("\n ");
        reply.push_str(entry.as_str());
    }
    reply
}

pub fn render_listing(courses: &[CourseDescriptor]) -> String {
    if courses.is_empty() {
        return DEPARTMENT_NOT_FOUND_REPLY.to_owned();
    }
    let mut reply = String::from("Here is all the classes info: \n");
    for course in courses {
        reply.push_str(&format!(
            "Class: {} {} \nName of the class: {} \n",
            course.prefix, course.number, course.title
        ));
    }
    reply
}

pub fn render_detail(course: &CourseDescriptor) -> String {
    format!(
        "Here is the class info: \nSLN {} \nName of the class: {} \nStart time:  {} \nEnd time: {} \nIs it open? {} \n",
        course.sln, course.title, course.schedule.start, course.schedule.end, course.is_open
    )
}

pub fn render_added(course: &CourseDescriptor) -> String {
    format!("Added class {}, SLN: {}, to your list", course.title, course.sln)
}

/// Same text whether or not the entry was on the list.
pub fn render_remove(key: &CourseKey) -> String {
    format!("I'll remove class {} {}, just a sec!", key.department, key.number)
}

pub fn render_greeting(greeting: &Greeting) -> String {
    match greeting {
        Greeting::Intro => "Oh hi there! I'm a course finder!",
        Greeting::Nice => "Nice seeing you there! How can I help you today?",
        Greeting::How => "It has been a great day! What can I help you today?",
        Greeting::Other(_) => UNKNOWN_REPLY,
    }
    .to_owned()
}

pub fn render_help() -> String {
    HELP_REPLY.to_owned()
}

pub fn render_clarify() -> String {
    UNKNOWN_REPLY.to_owned()
}

pub fn render_failure(error: &ApplicationError) -> String {
    error.user_message().to_owned()
}
