pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod locks;
pub mod pipeline;
pub mod store;

pub use catalog::{CourseCatalog, InMemoryCourseCatalog};
pub use domain::course::{CourseDescriptor, CourseKey, Schedule};
pub use domain::intent::{ClassifiedIntent, Greeting, IntentFunction};
pub use domain::message::MessageEvent;
pub use domain::user::{
    AddOutcome, CourseListEntry, RemoveOutcome, UserBootstrap, UserCourseList, UserId,
    EMPTY_LIST_SENTINEL,
};
pub use errors::{ApplicationError, CatalogError, InterfaceError, StoreError};
pub use pipeline::{CourseListOutcome, CourseListService, Dispatcher, IntentRouter, Route};
pub use store::{InMemoryUserStore, UserStore};
