use crate::domain::course::CourseKey;
use crate::domain::intent::{ClassifiedIntent, Greeting, IntentFunction};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Help,
    Greeting(Greeting),
    MyPlan,
    ListDepartment { department: String },
    Find(CourseKey),
    Add(CourseKey),
    Remove(CourseKey),
    Clarify,
}

impl Route {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Greeting(_) => "greeting",
            Self::MyPlan => "myplan",
            Self::ListDepartment { .. } => "list",
            Self::Find(_) => "find",
            Self::Add(_) => "add",
            Self::Remove(_) => "remove",
            Self::Clarify => "clarify",
        }
    }

    /// Routes that read or write the user's course list.
    pub fn touches_course_list(&self) -> bool {
        matches!(self, Self::MyPlan | Self::Add(_) | Self::Remove(_))
    }
}

/// Maps every classified intent to exactly one route.
///
/// Help wins over greetings, greetings win over the function. Operations whose
/// parameters are missing fall back to [`Route::Clarify`] so the catalog is
/// never consulted with a partial key.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntentRouter;

impl IntentRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, intent: &ClassifiedIntent) -> Route {
        if intent.help {
            return Route::Help;
        }
        if let Some(greeting) = &intent.greeting {
            return Route::Greeting(greeting.clone());
        }

        match intent.function {
            IntentFunction::MyPlan => Route::MyPlan,
            IntentFunction::List => match &intent.department {
                Some(department) => Route::ListDepartment { department: department.clone() },
                None => Route::Clarify,
            },
            IntentFunction::Find => course_key(intent).map(Route::Find).unwrap_or(Route::Clarify),
            IntentFunction::Add => course_key(intent).map(Route::Add).unwrap_or(Route::Clarify),
            IntentFunction::Remove => {
                course_key(intent).map(Route::Remove).unwrap_or(Route::Clarify)
            }
            IntentFunction::Unknown => Route::Clarify,
        }
    }
}

fn course_key(intent: &ClassifiedIntent) -> Option<CourseKey> {
    let department = intent.department.as_ref()?;
    let number = intent.course_number.as_ref()?;
    Some(CourseKey::new(department.clone(), number.clone()))
}
