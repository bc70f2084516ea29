pub mod course;
pub mod intent;
pub mod message;
pub mod user;
