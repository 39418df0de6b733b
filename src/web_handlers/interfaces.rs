use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, warn};

use crate::interfaces::{dispatch_with, resolve, DispatchError};
use crate::models::{AppState, ClientFormat};
use crate::utils::unix_now;

/// Requests must come through a TLS terminating reverse proxy unless the
/// service runs on localhost.
fn forwarded_over_https(req: &HttpRequest) -> bool {
    let headers = req.headers();
    let has_forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.trim().is_empty());
    let proto_is_https = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("https"));
    has_forwarded_for && proto_is_https
}

async fn serve(req: HttpRequest, state: &AppState, short_id: &str, token: &str) -> HttpResponse {
    if state.settings.server.host != "localhost" && !forwarded_over_https(&req) {
        debug!("Rejecting request for {} without forwarded https headers", short_id);
        return HttpResponse::Forbidden().finish();
    }

    // Unknown tokens never reach the panel
    if resolve(token).is_err() {
        return HttpResponse::NotFound().body(format!("Unsupported client type: {}", token));
    }

    let payload = match state.source.fetch(short_id).await {
        Ok(payload) => payload,
        Err(e) if e.is_not_found() => {
            debug!("{}", e);
            return HttpResponse::NotFound().finish();
        }
        Err(e) => {
            warn!("Failed to fetch subscription {}: {}", short_id, e);
            return HttpResponse::BadGateway().finish();
        }
    };

    match dispatch_with(
        token,
        &payload.subscription,
        &payload.nodes,
        &state.settings,
        unix_now(),
    ) {
        Ok(output) => {
            let mut resp = HttpResponse::Ok();
            resp.content_type(output.content_type);
            resp.insert_header((header::ETAG, format!("\"{}\"", output.etag())));
            for (name, value) in &output.headers {
                resp.append_header((name.as_str(), value.as_str()));
            }
            resp.body(output.body)
        }
        Err(DispatchError::UnsupportedFormat(token)) => {
            HttpResponse::NotFound().body(format!("Unsupported client type: {}", token))
        }
    }
}

/// `/{prefix}/{short_id}/{client_type}`
pub async fn client_handler(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let (short_id, client_type) = path.into_inner();
    serve(req, &state, &short_id, &client_type).await
}

/// `/{prefix}/{short_id}`, always the generic list
pub async fn generic_handler(
    req: HttpRequest,
    path: web::Path<(String,)>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let (short_id,) = path.into_inner();
    serve(req, &state, &short_id, ClientFormat::Generic.token()).await
}

/// Register the subscription routes, relative to the prefix scope.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/{short_id}", web::get().to(generic_handler))
        .route("/{short_id}/{client_type}", web::get().to(client_handler));
}

/// Scope path for a normalized prefix.
pub fn scope_path(prefix: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        String::new()
    } else {
        format!("/{}", prefix)
    }
}
