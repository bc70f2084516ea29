use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentFunction {
    MyPlan,
    List,
    Add,
    Find,
    Remove,
    Unknown,
}

impl IntentFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MyPlan => "myplan",
            Self::List => "list",
            Self::Add => "add",
            Self::Find => "find",
            Self::Remove => "remove",
            Self::Unknown => "unknown",
        }
    }

    /// Total: anything unrecognised is `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "myplan" => Self::MyPlan,
            "list" => Self::List,
            "add" => Self::Add,
            "find" => Self::Find,
            "remove" => Self::Remove,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Greeting {
    Intro,
    Nice,
    How,
    Other(String),
}

impl Greeting {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "intro" => Self::Intro,
            "nice" => Self::Nice,
            "how" => Self::How,
            other => Self::Other(other.to_owned()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedIntent {
    pub function: IntentFunction,
    pub department: Option<String>,
    pub course_number: Option<String>,
    pub help: bool,
    pub greeting: Option<Greeting>,
}

impl ClassifiedIntent {
    pub fn new(
        function: IntentFunction,
        department: Option<String>,
        course_number: Option<String>,
    ) -> Self {
        Self {
            function,
            department: non_blank(department),
            course_number: non_blank(course_number),
            help: false,
            greeting: None,
        }
    }

    pub fn unknown() -> Self {
        Self::new(IntentFunction::Unknown, None, None)
    }

    /// Builds an intent from loosely typed classifier parameters. Blank values
    /// count as absent.
    pub fn from_parameters(
        function: Option<&str>,
        department: Option<&str>,
        course_number: Option<&str>,
    ) -> Self {
        let function = function.map(IntentFunction::parse).unwrap_or(IntentFunction::Unknown);
        Self::new(function, department.map(str::to_owned), course_number.map(str::to_owned))
    }

    pub fn with_help(mut self, help: bool) -> Self {
        self.help = help;
        self
    }

    pub fn with_greeting(mut self, greeting: Option<Greeting>) -> Self {
        self.greeting = greeting;
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{ClassifiedIntent, Greeting, IntentFunction};

    #[test]
    fn parse_is_total_over_function_values() {
        for (raw, expected) in [
            ("myplan", IntentFunction::MyPlan),
            ("LIST", IntentFunction::List),
            (" add ", IntentFunction::Add),
            ("find", IntentFunction::Find),
            ("remove", IntentFunction::Remove),
            ("", IntentFunction::Unknown),
            ("drop", IntentFunction::Unknown),
            ("search", IntentFunction::Unknown),
        ] {
            assert_eq!(IntentFunction::parse(raw), expected, "raw value `{raw}`");
        }
    }

    #[test]
    fn blank_parameters_are_absent() {
        let intent = ClassifiedIntent::from_parameters(Some("add"), Some("  "), Some(""));
        assert_eq!(intent.function, IntentFunction::Add);
        assert_eq!(intent.department, None);
        assert_eq!(intent.course_number, None);
    }

    #[test]
    fn greeting_parse_keeps_unrecognised_values() {
        assert_eq!(Greeting::parse("Intro"), Greeting::Intro);
        assert_eq!(Greeting::parse("bye"), Greeting::Other("bye".to_owned()));
    }
}
