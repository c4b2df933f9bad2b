use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use uuid::Uuid;

/// Request payload, kept in a form that can be turned into a body again
#[derive(Debug, Clone)]
pub(crate) enum Body {
    Json(serde_json::Value),
    File(FilePart),
}

/// One file sent as a single-part `multipart/form-data` body
#[derive(Debug, Clone)]
pub struct FilePart {
    field: String,
    filename: String,
    mime: Option<String>,
    data: Vec<u8>,
}

impl FilePart {
    pub fn new(field: impl Into<String>, filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            filename: filename.into(),
            mime: None,
            data,
        }
    }

    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Build a fresh form; multipart bodies are consumed by each send
    pub(crate) fn to_form(&self) -> reqwest::Result<Form> {
        let mut part = Part::bytes(self.data.clone()).file_name(self.filename.clone());
        if let Some(mime) = &self.mime {
            part = part.mime_str(mime)?;
        }
        Ok(Form::new().part(self.field.clone(), part))
    }
}

/// A replayable description of one logical API request.
///
/// The HTTP request is rebuilt from this on every send, so a request that hit
/// `401` can be resent with a new bearer token.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) id: Uuid,
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<Body>,
    pub(crate) retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> serde_json::Result<Self> {
        self.body = Some(Body::Json(serde_json::to_value(body)?));
        Ok(self)
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.body = Some(Body::File(part));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this request has already been through a renewal
    pub fn is_retry(&self) -> bool {
        self.retried
    }
}
