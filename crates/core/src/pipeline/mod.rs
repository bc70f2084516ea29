pub mod dispatcher;
pub mod reply;
pub mod router;
pub mod service;

pub use dispatcher::Dispatcher;
pub use router::{IntentRouter, Route};
pub use service::{CourseListOutcome, CourseListService, ServiceTimeouts};
