//! Control API dispatch, independent of any HTTP library.
//!
//! The transport turns each request into an [`ApiRequest`], hands it to
//! [`dispatch`] and writes the [`ApiResponse`] back.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::CoreError;
use crate::question::{DocumentationRequest, NewQuestion};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Options,
    Other,
}

impl Method {
    pub fn parse(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "OPTIONS" => Method::Options,
            _ => Method::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path without query string.
    pub path: String,
    /// Raw request body.
    pub body: Vec<u8>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: Vec::new(),
        }
    }

    pub fn post(path: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: body.into(),
        }
    }

    pub fn post_json(path: impl Into<String>, body: &Value) -> Self {
        Self::post(path, body.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// `None` for an empty body (preflight).
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn success(mut fields: Value) -> Self {
        if let Value::Object(map) = &mut fields {
            map.insert("success".into(), Value::Bool(true));
        }
        Self {
            status: 200,
            body: Some(fields),
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: Some(json!({ "success": false, "error": message.into() })),
        }
    }

    pub fn empty() -> Self {
        Self {
            status: 200,
            body: None,
        }
    }

    pub fn from_error(err: &CoreError) -> Self {
        let status = status_for(err);
        if status >= 500 {
            tracing::error!(error = %err, "request failed");
        }
        let message = match err {
            CoreError::Parse(message) => message.clone(),
            other => other.to_string(),
        };
        Self::error(status, message)
    }
}

/// HTTP status for an error.
pub fn status_for(err: &CoreError) -> u16 {
    match err {
        CoreError::Validation(_) | CoreError::Parse(_) => 400,
        CoreError::NotFound(_) => 404,
        CoreError::MethodNotAllowed(_) => 405,
        _ => 500,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    AddQuestion,
    AddAndMove,
    AddDocs,
    Complete,
    GetQuestion,
    BreakStart,
    BreakEnd,
    Files,
}

impl Route {
    const ALL: [(Route, Method, &'static str); 8] = [
        (Route::AddQuestion, Method::Post, "/api/question/add"),
        (Route::AddAndMove, Method::Post, "/api/question/add-and-move"),
        (Route::AddDocs, Method::Post, "/api/docs/add"),
        (Route::Complete, Method::Get, "/api/question/complete"),
        (Route::GetQuestion, Method::Get, "/api/question/get"),
        (Route::BreakStart, Method::Get, "/api/break/start"),
        (Route::BreakEnd, Method::Get, "/api/break/end"),
        (Route::Files, Method::Get, "/api/files"),
    ];
}

/// Resolve a route. `Ok(None)` means a CORS preflight.
///
/// # Errors
/// `NotFound` for unknown paths, `MethodNotAllowed` for a known path with
/// the wrong method or an unsupported method.
pub fn route(method: Method, path: &str) -> Result<Option<Route>, CoreError> {
    if method == Method::Options {
        return Ok(None);
    }
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    let Some((route, expected, _)) = Route::ALL.iter().find(|(_, _, p)| *p == path) else {
        return Err(CoreError::NotFound(format!("endpoint {path}")));
    };
    if method != *expected {
        return Err(CoreError::MethodNotAllowed(format!("{method:?} {path}")));
    }
    Ok(Some(*route))
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, CoreError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|_| CoreError::Parse("Invalid JSON".into()))?;
    serde_json::from_value(value).map_err(|e| CoreError::Parse(format!("Invalid request: {e}")))
}

/// Execute one request against the session.
pub fn dispatch(session: &mut Session, request: ApiRequest) -> ApiResponse {
    let route = match route(request.method, &request.path) {
        Ok(Some(route)) => route,
        Ok(None) => return ApiResponse::empty(),
        Err(err) => return ApiResponse::from_error(&err),
    };
    tracing::debug!(?route, "dispatching request");
    match execute(session, route, &request.body) {
        Ok(response) => response,
        Err(err) => ApiResponse::from_error(&err),
    }
}

fn execute(session: &mut Session, route: Route, body: &[u8]) -> Result<ApiResponse, CoreError> {
    let response = match route {
        Route::AddQuestion => {
            session.add_question(parse_body::<NewQuestion>(body)?, false)?;
            ApiResponse::success(json!({ "message": "Question added" }))
        }
        Route::AddAndMove => {
            session.add_question(parse_body::<NewQuestion>(body)?, true)?;
            ApiResponse::success(json!({ "message": "Question added and moved to" }))
        }
        Route::AddDocs => {
            session.add_documentation(parse_body::<DocumentationRequest>(body)?)?;
            ApiResponse::success(json!({ "message": "Documentation added" }))
        }
        Route::Complete => {
            session.complete_current_question()?;
            ApiResponse::success(json!({ "message": "Question completed" }))
        }
        Route::GetQuestion => {
            let question = session.current_question()?;
            ApiResponse::success(json!({ "question": question }))
        }
        Route::BreakStart => {
            session.start_break()?;
            ApiResponse::success(json!({ "message": "Break started" }))
        }
        Route::BreakEnd => {
            session.end_break()?;
            ApiResponse::success(json!({ "message": "Break ended" }))
        }
        Route::Files => {
            let files = session.list_files()?;
            ApiResponse::success(json!({ "files": files }))
        }
    };
    Ok(response)
}
