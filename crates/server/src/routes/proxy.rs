//! Interception handler: inbound HTTP in, strategy result out.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::Response;
use url::Url;

use harbor_client::StrategyResult;
use harbor_client::fetch::is_hop_by_hop;
use harbor_core::{Destination, InterceptedRequest};

use crate::error::ServerError;
use crate::handler::AppState;

pub async fn intercept(State(state): State<AppState>, request: Request) -> Result<Response, ServerError> {
    let req = intercepted(&state.base, request, state.max_body_bytes).await?;
    let result = state.dispatcher.fetch(req).await?;
    respond(result)
}

fn header_str<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Resolve a request target, refusing anything that leaves the origin.
fn resolve_target(base: &Url, target: &str) -> Result<Url, ServerError> {
    let url = base.join(target).map_err(|e| ServerError::InvalidInput(format!("{target}: {e}")))?;
    if url.origin() != base.origin() {
        return Err(ServerError::InvalidInput(format!("{target}: resolves outside the origin")));
    }
    Ok(url)
}

/// Capture an inbound request, resolved against the origin base.
pub(crate) async fn intercepted(base: &Url, request: Request, limit: usize) -> Result<InterceptedRequest, ServerError> {
    let (parts, body) = request.into_parts();

    let target = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let url = resolve_target(base, target)?;

    let body = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| ServerError::InvalidInput(format!("request body: {e}")))?;

    let mut req = InterceptedRequest::new(parts.method.as_str(), url).with_body(body);
    for (name, value) in &parts.headers {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            req = req.with_header(name.as_str(), value);
        }
    }

    req.destination = Destination::from_fetch_dest(header_str(&parts.headers, "sec-fetch-dest").unwrap_or(""));
    req.navigate = header_str(&parts.headers, "sec-fetch-mode") == Some("navigate");
    Ok(req)
}

fn respond(result: StrategyResult) -> Result<Response, ServerError> {
    let response = result.response;
    let status = StatusCode::from_u16(response.status)
        .map_err(|e| ServerError::Internal(format!("status {}: {e}", response.status)))?;

    let mut builder = Response::builder().status(status);
    for (name, value) in response.headers.iter().filter(|(name, _)| !is_hop_by_hop(name)) {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder
        .body(Body::from(response.body))
        .map_err(|e| ServerError::Internal(format!("response: {e}")))
}
