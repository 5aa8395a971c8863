// src/transport/reqwest_integration.rs
use std::{
    path::Path,
    task::{Context, Poll},
};

use futures::future::BoxFuture;
use http::{StatusCode, header};
use reqwest::{
    Body,
    multipart::{Form, Part},
};
use snafu::{OptionExt, ResultExt};
use tower::Service;

use crate::{
    template::{BodyVariant, Invocation, MultipartPart, PartContent},
    transport::http::{BodyFileSnafu, HttpError, MissingUrlSnafu},
};

/// A `tower::Service` wrapper for `reqwest::Client` that sends [`Invocation`]s.
///
/// The response body is drained before the future resolves, so the measured
/// latency covers the complete response. Any status is a successful send.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn new_with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Invocation> for ReqwestTransport {
    type Response = StatusCode;
    type Error = HttpError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        let client = self.client.clone();
        Box::pin(send(client, invocation))
    }
}

async fn send(client: reqwest::Client, invocation: Invocation) -> Result<StatusCode, HttpError> {
    let url = invocation.url().cloned().context(MissingUrlSnafu)?;
    let multipart = invocation.body().is_multipart();

    let mut request_builder = client.request(invocation.method().into(), url);

    for declared in invocation.headers() {
        // the form supplies its own content type carrying the boundary
        if multipart && declared.name.eq_ignore_ascii_case(header::CONTENT_TYPE.as_str()) {
            continue;
        }
        request_builder = request_builder.header(declared.name.as_str(), declared.value.as_str());
    }

    if let Some(cookies) = invocation.cookie_header() {
        request_builder = request_builder.header(header::COOKIE, cookies);
    }

    request_builder = match invocation.body() {
        BodyVariant::None => request_builder,
        BodyVariant::Inline(text) => request_builder.body(text.to_string()),
        BodyVariant::FileRef(path) => request_builder.body(open_body_file(path).await?),
        BodyVariant::Multipart(parts) => request_builder.multipart(build_form(parts).await?),
    };

    let response = request_builder
        .send()
        .await
        .map_err(HttpError::from_reqwest)?;
    let status = response.status();

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        debug!(
            target: "http_pressure::transport",
            %status,
            correlation_id = invocation.correlation_id(),
            "Server error or rate limited"
        );
    }

    response.bytes().await.map_err(HttpError::from_reqwest)?;
    Ok(status)
}

async fn open_body_file(path: &Path) -> Result<Body, HttpError> {
    let file = tokio::fs::File::open(path)
        .await
        .context(BodyFileSnafu { path })?;
    Ok(Body::from(file))
}

async fn build_form(parts: &[MultipartPart]) -> Result<Form, HttpError> {
    let mut form = Form::new();
    for part in parts {
        let mut form_part = match part.content() {
            PartContent::Text(text) => Part::text(text.to_string()),
            PartContent::File(path) => {
                let form_part = Part::stream(open_body_file(path).await?);
                match part.file_name() {
                    Some(file_name) => form_part.file_name(file_name),
                    None => form_part,
                }
            }
        };
        if let Some(content_type) = part.content_type() {
            form_part = form_part
                .mime_str(content_type)
                .map_err(|e| HttpError::InvalidRequest {
                    details: format!("part '{}': {}", part.name(), e),
                })?;
        }
        form = form.part(part.name().to_string(), form_part);
    }
    Ok(form)
}
