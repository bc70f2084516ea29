use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::catalog::CourseCatalog;
use crate::domain::intent::ClassifiedIntent;
use crate::domain::user::UserId;
use crate::pipeline::reply;
use crate::pipeline::router::{IntentRouter, Route};
use crate::pipeline::service::{CourseListService, ServiceTimeouts};
use crate::store::UserStore;

/// Routes a classified intent, runs the operation and renders one reply.
///
/// This is the terminal error boundary: every failure below becomes chat text.
pub struct Dispatcher {
    router: IntentRouter,
    service: CourseListService,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn UserStore>,
        catalog: Arc<dyn CourseCatalog>,
        timeouts: ServiceTimeouts,
    ) -> Self {
        Self { router: IntentRouter::new(), service: CourseListService::new(store, catalog, timeouts) }
    }

    pub fn service(&self) -> &CourseListService {
        &self.service
    }

    pub async fn dispatch(
        &self,
        user_id: &UserId,
        intent: &ClassifiedIntent,
        correlation_id: &str,
    ) -> String {
        let route = self.router.route(intent);
        info!(
            event_name = "dispatch.route",
            correlation_id,
            user_id = %user_id,
            function = intent.function.as_str(),
            route = route.name(),
            "routed classified intent"
        );

        let result = match &route {
            Route::Help => {
                self.register(user_id, correlation_id).await;
                return reply::render_help();
            }
            Route::Greeting(greeting) => {
                self.register(user_id, correlation_id).await;
                return reply::render_greeting(greeting);
            }
            Route::Clarify => {
                self.register(user_id, correlation_id).await;
                return reply::render_clarify();
            }
            Route::MyPlan => self.service.my_plan(user_id).await,
            Route::ListDepartment { department } => {
                self.service.list_department(user_id, department).await
            }
            Route::Find(key) => self.service.find(user_id, key).await,
            Route::Add(key) => self.service.add(user_id, key).await,
            Route::Remove(key) => self.service.remove(user_id, key).await,
        };

        match result {
            Ok(outcome) => reply::render_outcome(&outcome),
            Err(error) => {
                error!(
                    event_name = "dispatch.failed",
                    correlation_id,
                    user_id = %user_id,
                    route = route.name(),
                    unavailable = error.is_unavailable(),
                    error = %error,
                    "course list operation failed"
                );
                reply::render_failure(&error)
            }
        }
    }

    async fn register(&self, user_id: &UserId, correlation_id: &str) {
        match self.service.ensure_user(user_id).await {
            Ok(bootstrap) => {
                debug!(event_name = "dispatch.user_registered", correlation_id, ?bootstrap)
            }
            Err(error) => warn!(
                event_name = "dispatch.user_registration_failed",
                correlation_id,
                user_id = %user_id,
                error = %error,
                "could not register user; replying anyway"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::Dispatcher;
    use crate::catalog::{CourseCatalog, InMemoryCourseCatalog};
    use crate::domain::course::{CourseDescriptor, Schedule};
    use crate::domain::intent::{ClassifiedIntent, Greeting};
    use crate::domain::user::{CourseListEntry, UserBootstrap, UserId};
    use crate::errors::{CatalogError, StoreError};
    use crate::pipeline::reply;
    use crate::pipeline::service::ServiceTimeouts;
    use crate::store::{InMemoryUserStore, UserStore};

    fn course(sln: &str, number: &str) -> CourseDescriptor {
        CourseDescriptor {
            sln: sln.to_owned(),
            prefix: "CSE".to_owned(),
            number: number.to_owned(),
            title: format!("Course {number}"),
            schedule: Schedule { days: "tth".to_owned(), start: 930, end: 1020 },
            is_section: false,
            instructor: "Staff".to_owned(),
            is_open: true,
            general_education: None,
            is_writing: false,
            link: None,
        }
    }

    struct CountingCatalog {
        inner: InMemoryCourseCatalog,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CourseCatalog for CountingCatalog {
        async fn find_by_department(
            &self,
            prefix: &str,
        ) -> Result<Vec<CourseDescriptor>, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_department(prefix).await
        }

        async fn find_by_department_and_number(
            &self,
            prefix: &str,
            number: &str,
        ) -> Result<Option<CourseDescriptor>, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_department_and_number(prefix, number).await
        }
    }

    struct Fixture {
        dispatcher: Dispatcher,
        store: Arc<InMemoryUserStore>,
        catalog: Arc<CountingCatalog>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryUserStore::new());
        let catalog = Arc::new(CountingCatalog {
            inner: InMemoryCourseCatalog::new(vec![course("344", "344"), course("142", "142")]),
            calls: AtomicUsize::new(0),
        });
        let dispatcher = Dispatcher::new(store.clone(), catalog.clone(), ServiceTimeouts::default());
        Fixture { dispatcher, store, catalog }
    }

    fn u1() -> UserId {
        UserId("u1".to_owned())
    }

    fn intent(function: &str, department: Option<&str>, number: Option<&str>) -> ClassifiedIntent {
        ClassifiedIntent::from_parameters(Some(function), department, number)
    }

    #[tokio::test]
    async fn add_then_myplan_shows_saved_entry() {
        let fx = fixture();

        let added = fx.dispatcher.dispatch(&u1(), &intent("add", Some("CSE"), Some("344")), "c1").await;
        assert_eq!(added, "Added class Course 344, SLN: 344, to your list");
        assert_eq!(fx.store.get_list(&u1()).await.expect("list"), vec![CourseListEntry::new("344")]);

        let plan = fx.dispatcher.dispatch(&u1(), &intent("myplan", None, None), "c2").await;
        assert_eq!(plan, "These are the classes I saved for you:\n 344");
    }

    #[tokio::test]
    async fn add_of_missing_course_reports_not_found() {
        let fx = fixture();
        let reply = fx.dispatcher.dispatch(&u1(), &intent("add", Some("CSE"), Some("999")), "c1").await;
        assert!(reply.contains("could not be found"));
        assert!(fx.store.get_list(&u1()).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn myplan_with_only_sentinel_is_empty_reply() {
        let fx = fixture();
        fx.store.ensure_user(&u1()).await.expect("ensure");
        let reply = fx.dispatcher.dispatch(&u1(), &intent("myplan", None, None), "c1").await;
        assert_eq!(reply, reply::EMPTY_PLAN_REPLY);
    }

    #[tokio::test]
    async fn remove_of_never_added_course_is_acknowledged() {
        let fx = fixture();
        let reply =
            fx.dispatcher.dispatch(&u1(), &intent("remove", Some("CSE"), Some("142")), "c1").await;
        assert_eq!(reply, "I'll remove class CSE 142, just a sec!");
        assert!(fx.store.get_list(&u1()).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn missing_department_never_reaches_catalog() {
        let fx = fixture();
        for function in ["add", "find", "remove", "list"] {
            let reply = fx.dispatcher.dispatch(&u1(), &intent(function, None, Some("344")), "c1").await;
            assert_eq!(reply, reply::UNKNOWN_REPLY);
        }
        assert_eq!(fx.catalog.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn small_talk_registers_user() {
        let fx = fixture();
        let greeting = ClassifiedIntent::unknown().with_greeting(Some(Greeting::Nice));

        let reply = fx.dispatcher.dispatch(&u1(), &greeting, "c1").await;
        assert_eq!(reply, "Nice seeing you there! How can I help you today?");
        assert_eq!(fx.store.ensure_user(&u1()).await.expect("ensure"), UserBootstrap::AlreadyExists);
    }

    struct BrokenStore;

    #[async_trait]
    impl UserStore for BrokenStore {
        async fn ensure_user(&self, _user_id: &UserId) -> Result<UserBootstrap, StoreError> {
            Err(StoreError::Unavailable("disk full".to_owned()))
        }

        async fn get_list(&self, _user_id: &UserId) -> Result<Vec<CourseListEntry>, StoreError> {
            Err(StoreError::Unavailable("disk full".to_owned()))
        }

        async fn add_entry(
            &self,
            _user_id: &UserId,
            _entry: &CourseListEntry,
        ) -> Result<crate::domain::user::AddOutcome, StoreError> {
            Err(StoreError::Unavailable("disk full".to_owned()))
        }

        async fn remove_entry(
            &self,
            _user_id: &UserId,
            _entry: &CourseListEntry,
        ) -> Result<crate::domain::user::RemoveOutcome, StoreError> {
            Err(StoreError::Unavailable("disk full".to_owned()))
        }
    }

    #[tokio::test]
    async fn store_failure_becomes_failure_reply() {
        let dispatcher = Dispatcher::new(
            Arc::new(BrokenStore),
            Arc::new(InMemoryCourseCatalog::default()),
            ServiceTimeouts::default(),
        );

        let reply = dispatcher.dispatch(&u1(), &intent("myplan", None, None), "c1").await;
        assert!(reply.contains("saved classes"));
        assert!(!reply.contains("disk full"));

        let help = dispatcher.dispatch(&u1(), &ClassifiedIntent::unknown().with_help(true), "c2").await;
        assert_eq!(help, reply::HELP_REPLY);
    }
}
