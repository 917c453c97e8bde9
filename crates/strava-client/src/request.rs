//! Outbound request descriptions
//!
//! A request that carries a body holds a factory instead of the body
//! itself. The transport calls the factory once per attempt, so a retry
//! never reuses a consumed stream and never goes out empty.

use std::sync::Arc;

use reqwest::Method;
use reqwest::multipart::{Form, Part as FormPart};

/// Body of one attempt.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(serde_json::Value),
    Bytes {
        content_type: String,
        data: bytes::Bytes,
    },
    Multipart(Vec<Part>),
}

/// One multipart field.
#[derive(Debug, Clone)]
pub enum Part {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        bytes: bytes::Bytes,
    },
}

impl Part {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Regenerates the payload for every attempt.
pub type BodyFactory = Arc<dyn Fn() -> Payload + Send + Sync>;

/// Method, URL, headers and (optionally) a body factory.
#[derive(Clone)]
pub struct ApiRequest {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<BodyFactory>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::bodiless(Method::GET, url.into())
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::bodiless(Method::DELETE, url.into())
    }

    /// Body-bearing request. The factory is required.
    pub fn with_body<F>(method: Method, url: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Payload + Send + Sync + 'static,
    {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Some(Arc::new(factory)),
        }
    }

    fn bodiless(method: Method, url: String) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Build a fresh `reqwest` request for one attempt.
    pub(crate) fn build(&self, client: &reqwest::Client, bearer: &str) -> reqwest::RequestBuilder {
        let mut builder = client
            .request(self.method.clone(), &self.url)
            .bearer_auth(bearer);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        match self.body.as_ref().map(|factory| factory()) {
            None => builder,
            Some(Payload::Json(value)) => builder.json(&value),
            Some(Payload::Bytes { content_type, data }) => builder
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(data),
            Some(Payload::Multipart(parts)) => builder.multipart(form(parts)),
        }
    }
}

impl std::fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("has_body", &self.has_body())
            .finish()
    }
}

fn form(parts: Vec<Part>) -> Form {
    parts.into_iter().fold(Form::new(), |form, part| match part {
        Part::Text { name, value } => form.text(name, value),
        Part::File {
            name,
            file_name,
            bytes,
        } => form.part(name, FormPart::bytes(bytes.to_vec()).file_name(file_name)),
    })
}
