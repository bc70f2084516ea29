use axum::{extract::Query, response::Html, routing::get, Router};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::webhook::WebhookRejection;

/// Query string Messenger appends when a user taps the account-linking button.
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeQuery {
    pub account_linking_token: Option<String>,
    pub redirect_uri: Option<String>,
}

pub fn router() -> Router {
    Router::new().route("/authorize", get(authorize))
}

/// Login page for account linking. Confirming follows `redirect_uri` with a
/// fresh `authorization_code`, which comes back as an `account_linking` event.
pub async fn authorize(
    Query(query): Query<AuthorizeQuery>,
) -> Result<Html<String>, WebhookRejection> {
    let (Some(token), Some(redirect_uri)) = (
        query.account_linking_token.filter(|token| !token.is_empty()),
        query.redirect_uri.filter(|uri| !uri.is_empty()),
    ) else {
        let rejection = WebhookRejection::bad_request(
            "account_linking_token and redirect_uri are required",
        );
        warn!(
            event_name = "linking.authorize.rejected",
            correlation_id = rejection.0.correlation_id(),
            "authorize request is missing linking parameters"
        );
        return Err(rejection);
    };

    let authorization_code = Uuid::new_v4().simple().to_string();
    let success_uri = success_redirect(&redirect_uri, &authorization_code);
    info!(
        event_name = "linking.authorize.rendered",
        authorization_code = %authorization_code,
        "rendered account linking page"
    );

    Ok(Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Course Finder account linking</title></head>\n<body>\n\
         <h1>Link your account</h1>\n\
         <p>Linking token: <code>{token}</code></p>\n\
         <p><a id=\"complete\" href=\"{success}\">Complete account link</a></p>\n\
         <p><a id=\"cancel\" href=\"{cancel}\">Cancel</a></p>\n\
         </body>\n</html>\n",
        token = escape_html(&token),
        success = escape_html(&success_uri),
        cancel = escape_html(&redirect_uri),
    )))
}

/// Messenger's redirect URI already carries a query string, so the code is
/// appended with `&`.
pub fn success_redirect(redirect_uri: &str, authorization_code: &str) -> String {
    format!("{redirect_uri}&authorization_code={authorization_code}")
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for character in raw.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::{router, success_redirect};

    async fn get(uri: &str) -> (StatusCode, String) {
        let response = router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[test]
    fn success_redirect_appends_authorization_code() {
        assert_eq!(
            success_redirect("https://facebook.com/link?state=abc", "c0de"),
            "https://facebook.com/link?state=abc&authorization_code=c0de"
        );
    }

    #[tokio::test]
    async fn authorize_renders_success_and_cancel_links() {
        let (status, body) = get(
            "/authorize?account_linking_token=tok-1&redirect_uri=https%3A%2F%2Ffacebook.com%2Flink%3Fstate%3Dabc",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<code>tok-1</code>"));
        assert!(body.contains(
            "id=\"complete\" href=\"https://facebook.com/link?state=abc&amp;authorization_code="
        ));
        assert!(body.contains("id=\"cancel\" href=\"https://facebook.com/link?state=abc\""));
    }

    #[tokio::test]
    async fn authorize_issues_a_fresh_code_per_request() {
        let uri = "/authorize?account_linking_token=tok&redirect_uri=https%3A%2F%2Fx.test%2F%3Fa%3D1";
        let (_, first) = get(uri).await;
        let (_, second) = get(uri).await;
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn authorize_escapes_query_values() {
        let (status, body) = get(
            "/authorize?account_linking_token=%3Cscript%3E&redirect_uri=https%3A%2F%2Fx.test%2F%3Fa%3D%22b",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("<script>"));
        assert!(body.contains("&lt;script&gt;"));
        assert!(body.contains("https://x.test/?a=&quot;b"));
    }

    #[tokio::test]
    async fn authorize_without_redirect_uri_is_bad_request() {
        let (status, body) = get("/authorize?account_linking_token=tok").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let payload: Value = serde_json::from_str(&body).expect("json body");
        assert!(payload["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));
    }
}
