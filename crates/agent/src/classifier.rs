use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use coursefinder_core::config::{ClassifierConfig, ClassifierProvider};
use coursefinder_core::domain::intent::{ClassifiedIntent, Greeting, IntentFunction};

const APIAI_PROTOCOL_VERSION: &str = "20150910";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Transport(String),
    #[error("classifier returned status {status_code}: {body}")]
    Status { status_code: u16, body: String },
    #[error("classifier response could not be decoded: {0}")]
    Decode(String),
    #[error("classifier is misconfigured: {0}")]
    Configuration(String),
}

/// Turns free text into a [`ClassifiedIntent`]. The session id scopes any
/// conversational state the provider keeps.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn classify(&self, text: &str, session_id: &str)
        -> Result<ClassifiedIntent, ClassifierError>;
}

pub fn classifier_from_config(
    config: &ClassifierConfig,
) -> Result<Arc<dyn IntentClassifier>, ClassifierError> {
    match config.provider {
        ClassifierProvider::Keyword => Ok(Arc::new(KeywordClassifier::new())),
        ClassifierProvider::ApiAi => {
            let token = config.client_access_token.clone().ok_or_else(|| {
                ClassifierError::Configuration("apiai requires a client access token".to_owned())
            })?;
            Ok(Arc::new(ApiAiClassifier::new(
                &config.base_url,
                token,
                &config.language,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
    }
}

/// api.ai `query` endpoint client.
pub struct ApiAiClassifier {
    http: reqwest::Client,
    endpoint: String,
    client_access_token: SecretString,
    language: String,
}

impl ApiAiClassifier {
    pub fn new(
        base_url: &str,
        client_access_token: SecretString,
        language: &str,
        timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ClassifierError::Transport(error.to_string()))?;
        Ok(Self {
            http,
            endpoint: format!("{}/query", base_url.trim_end_matches('/')),
            client_access_token,
            language: language.to_owned(),
        })
    }
}

#[async_trait]
impl IntentClassifier for ApiAiClassifier {
    fn name(&self) -> &'static str {
        "apiai"
    }

    async fn classify(
        &self,
        text: &str,
        session_id: &str,
    ) -> Result<ClassifiedIntent, ClassifierError> {
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("v", APIAI_PROTOCOL_VERSION)])
            .bearer_auth(self.client_access_token.expose_secret())
            .json(&json!({ "query": text, "lang": self.language, "sessionId": session_id }))
            .send()
            .await
            .map_err(|error| ClassifierError::Transport(error.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ClassifierError::Transport(error.without_url().to_string()))?;
        if !status.is_success() {
            return Err(ClassifierError::Status { status_code: status.as_u16(), body });
        }

        let parsed: ApiAiResponse =
            serde_json::from_str(&body).map_err(|error| ClassifierError::Decode(error.to_string()))?;
        intent_from_response(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct ApiAiResponse {
    result: Option<ApiAiResult>,
    status: Option<ApiAiStatus>,
}

#[derive(Debug, Deserialize)]
struct ApiAiStatus {
    code: u16,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiAiResult {
    #[serde(default)]
    parameters: ApiAiParameters,
}

#[derive(Debug, Default, Deserialize)]
struct ApiAiParameters {
    #[serde(rename = "Functions")]
    functions: Option<Value>,
    #[serde(rename = "Departments", alias = "Department")]
    departments: Option<Value>,
    number: Option<Value>,
    #[serde(rename = "Introduction")]
    introduction: Option<Value>,
    help: Option<Value>,
}

fn intent_from_response(response: ApiAiResponse) -> Result<ClassifiedIntent, ClassifierError> {
    if let Some(status) = &response.status {
        if status.code != 200 {
            return Err(ClassifierError::Status {
                status_code: status.code,
                body: status.error_type.clone().unwrap_or_default(),
            });
        }
    }
    let parameters = response.result.map(|result| result.parameters).unwrap_or_default();

    let function = parameters.functions.as_ref().and_then(parameter_text);
    let department = parameters.departments.as_ref().and_then(parameter_text);
    let number = parameters.number.as_ref().and_then(parameter_text);
    let help = parameters.help.as_ref().and_then(parameter_text).is_some();
    let greeting =
        parameters.introduction.as_ref().and_then(parameter_text).map(|raw| Greeting::parse(&raw));

    debug!(
        event_name = "classifier.apiai.parameters",
        function = function.as_deref().unwrap_or(""),
        department = department.as_deref().unwrap_or(""),
        number = number.as_deref().unwrap_or(""),
        help,
        "decoded classifier parameters"
    );

    let intent = ClassifiedIntent::from_parameters(
        function.as_deref(),
        department.as_deref(),
        number.as_deref(),
    );
    Ok(intent.with_help(help).with_greeting(greeting))
}

/// Entity values arrive as strings, numbers or single-element lists.
fn parameter_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        Value::Array(items) => return items.first().and_then(parameter_text),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

const FILLER_WORDS: &[&str] = &[
    "a", "about", "add", "class", "classes", "course", "courses", "delete", "details", "drop",
    "find", "for", "from", "help", "in", "info", "list", "me", "my", "myplan", "plan", "please",
    "remove", "saved", "search", "show", "the", "to", "what", "whats",
];

/// Offline keyword classifier for local runs and the operator CLI.
///
/// Function keywords win over small talk: a greeting is only reported when
/// no function keyword matched, so "hi, add CSE 344" is an add.
#[derive(Clone, Debug, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str) -> ClassifiedIntent {
        let tokens = tokenize(text);
        let lowered = tokens.iter().map(|token| token.to_ascii_lowercase()).collect::<Vec<_>>();
        let has = |word: &str| lowered.iter().any(|token| token == word);

        let help = has("help");
        let (department, number) = extract_course(&tokens);
        let function = if has("myplan") || (has("my") && has("plan")) || has("saved") {
            IntentFunction::MyPlan
        } else if has("add") {
            IntentFunction::Add
        } else if has("remove") || has("drop") || has("delete") {
            IntentFunction::Remove
        } else if has("find") || has("info") || has("details") {
            IntentFunction::Find
        } else if has("search") && number.is_some() {
            IntentFunction::Find
        } else if has("list") || has("show") || has("search") {
            IntentFunction::List
        } else {
            IntentFunction::Unknown
        };

        let greeting = if function != IntentFunction::Unknown {
            None
        } else if has("how") && (has("you") || has("going")) {
            Some(Greeting::How)
        } else if has("nice") {
            Some(Greeting::Nice)
        } else if has("hi") || has("hello") || has("hey") {
            Some(Greeting::Intro)
        } else {
            None
        };

        ClassifiedIntent::new(function, department, number)
            .with_help(help)
            .with_greeting(greeting)
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn classify(
        &self,
        text: &str,
        _session_id: &str,
    ) -> Result<ClassifiedIntent, ClassifierError> {
        Ok(self.extract(text))
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_ascii_alphanumeric() {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(|token| token.to_string()).collect()
}

fn is_department_word(token: &str) -> bool {
    (2..=6).contains(&token.len())
        && token.chars().all(|character| character.is_ascii_alphabetic())
        && !FILLER_WORDS.contains(&token.to_ascii_lowercase().as_str())
}

fn is_course_number(token: &str) -> bool {
    token.len() == 3 && token.chars().all(|character| character.is_ascii_digit())
}

/// Finds `CSE 344`, `cse344` or a bare upper-case department such as `CSE`.
fn extract_course(tokens: &[String]) -> (Option<String>, Option<String>) {
    for pair in tokens.windows(2) {
        if is_department_word(&pair[0]) && is_course_number(&pair[1]) {
            return (Some(pair[0].to_ascii_uppercase()), Some(pair[1].clone()));
        }
    }

    for token in tokens {
        let split = token.find(|character: char| character.is_ascii_digit());
        if let Some(index) = split {
            let (letters, digits) = token.split_at(index);
            if is_department_word(letters) && is_course_number(digits) {
                return (Some(letters.to_ascii_uppercase()), Some(digits.to_owned()));
            }
        }
    }

    let department = tokens
        .iter()
        .find(|token| {
            is_department_word(token) && token.chars().all(|character| character.is_ascii_uppercase())
        })
        .cloned();
    let number = tokens.iter().find(|token| is_course_number(token)).cloned();
    (department, number)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;
    use serde_json::json;

    use coursefinder_core::domain::intent::{Greeting, IntentFunction};

    use super::{
        intent_from_response, ApiAiClassifier, ApiAiResponse, ClassifierError, IntentClassifier,
        KeywordClassifier,
    };

    fn apiai_client(server: &MockServer) -> ApiAiClassifier {
        ApiAiClassifier::new(
            &server.base_url(),
            "client-token".to_owned().into(),
            "en",
            Duration::from_secs(5),
        )
        .expect("classifier client")
    }

    fn decode(raw: &str) -> ApiAiResponse {
        serde_json::from_str(raw).expect("valid response json")
    }

    #[test]
    fn apiai_parameters_map_onto_intent() {
        let intent = intent_from_response(decode(
            r#"{"result":{"parameters":{"Functions":"add","Departments":"CSE","number":344}},
                "status":{"code":200,"errorType":"success"}}"#,
        ))
        .expect("intent");

        assert_eq!(intent.function, IntentFunction::Add);
        assert_eq!(intent.department.as_deref(), Some("CSE"));
        assert_eq!(intent.course_number.as_deref(), Some("344"));
        assert!(!intent.help);
    }

    #[test]
    fn apiai_singular_department_and_small_talk() {
        let intent = intent_from_response(decode(
            r#"{"result":{"parameters":{"Functions":"","Department":["MATH"],"Introduction":"nice","help":""}}}"#,
        ))
        .expect("intent");

        assert_eq!(intent.function, IntentFunction::Unknown);
        assert_eq!(intent.department.as_deref(), Some("MATH"));
        assert_eq!(intent.greeting, Some(Greeting::Nice));
        assert!(!intent.help);
    }

    #[test]
    fn apiai_error_status_is_an_error() {
        let error = intent_from_response(decode(
            r#"{"status":{"code":401,"errorType":"unauthorized"}}"#,
        ))
        .expect_err("status error");
        assert_eq!(
            error,
            ClassifierError::Status { status_code: 401, body: "unauthorized".to_owned() }
        );
    }

    #[test]
    fn keyword_classifier_reads_course_operations() {
        let classifier = KeywordClassifier::new();

        let add = classifier.extract("please add CSE 344");
        assert_eq!(add.function, IntentFunction::Add);
        assert_eq!(add.department.as_deref(), Some("CSE"));
        assert_eq!(add.course_number.as_deref(), Some("344"));

        let remove = classifier.extract("drop cse142");
        assert_eq!(remove.function, IntentFunction::Remove);
        assert_eq!(remove.department.as_deref(), Some("CSE"));

        let list = classifier.extract("list classes in MATH");
        assert_eq!(list.function, IntentFunction::List);
        assert_eq!(list.department.as_deref(), Some("MATH"));
        assert_eq!(list.course_number, None);

        assert_eq!(classifier.extract("what is on my plan").function, IntentFunction::MyPlan);
        assert_eq!(classifier.extract("search ubw 101").function, IntentFunction::Find);
    }

    #[test]
    fn keyword_classifier_reads_help_and_greetings() {
        let classifier = KeywordClassifier::new();

        assert!(classifier.extract("help").help);
        assert_eq!(classifier.extract("hi there").greeting, Some(Greeting::Intro));
        assert_eq!(classifier.extract("how are you?").greeting, Some(Greeting::How));
        assert_eq!(classifier.extract("add 344").department, None);
        assert_eq!(classifier.extract("enroll me").function, IntentFunction::Unknown);
    }

    #[test]
    fn keyword_classifier_prefers_functions_over_greetings() {
        let classifier = KeywordClassifier::new();

        let intent = classifier.extract("hi, add CSE 344");
        assert_eq!(intent.function, IntentFunction::Add);
        assert_eq!(intent.department.as_deref(), Some("CSE"));
        assert_eq!(intent.course_number.as_deref(), Some("344"));
        assert_eq!(intent.greeting, None);

        assert_eq!(classifier.extract("nice, show my plan").greeting, None);
        assert_eq!(classifier.extract("hello friend").greeting, Some(Greeting::Intro));
    }

    #[tokio::test]
    async fn apiai_query_sends_bearer_token_version_and_session() {
        let server = MockServer::start_async().await;
        let query_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/query")
                    .query_param("v", "20150910")
                    .header("authorization", "Bearer client-token")
                    .json_body(json!({ "query": "add CSE 344", "lang": "en", "sessionId": "u1" }));
                then.status(200).header("content-type", "application/json").json_body(json!({
                    "result": { "parameters": { "Functions": "add", "Departments": "CSE", "number": "344" } },
                    "status": { "code": 200, "errorType": "success" }
                }));
            })
            .await;

        let intent = apiai_client(&server).classify("add CSE 344", "u1").await.expect("classify");
        query_mock.assert_async().await;
        assert_eq!(intent.function, IntentFunction::Add);
        assert_eq!(intent.department.as_deref(), Some("CSE"));
        assert_eq!(intent.course_number.as_deref(), Some("344"));
    }

    #[tokio::test]
    async fn apiai_server_error_surfaces_status_and_body() {
        let server = MockServer::start_async().await;
        let query_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/query");
                then.status(500).body("upstream exploded");
            })
            .await;

        let error = apiai_client(&server).classify("help", "u1").await.expect_err("status error");
        query_mock.assert_async().await;
        assert_eq!(
            error,
            ClassifierError::Status { status_code: 500, body: "upstream exploded".to_owned() }
        );
    }

    #[tokio::test]
    async fn apiai_non_json_success_is_a_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/query");
                then.status(200).body("<html>maintenance</html>");
            })
            .await;

        let error = apiai_client(&server).classify("help", "u1").await.expect_err("decode error");
        assert!(matches!(error, ClassifierError::Decode(_)));
    }
}
