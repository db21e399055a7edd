//! Request-scoped tracing glue for the webhook's actix-web server. Global
//! subscriber initialization is shared with the controller binary via
//! `eviction_autoscaler_types::telemetry`; this module only supplies the
//! root-span builder that decides which routes get a span at all.

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use lazy_static::lazy_static;
use tracing::Span;
use tracing_actix_web::{DefaultRootSpanBuilder, RootSpanBuilder};

use std::collections::HashSet;

const NO_TELEMETRY_ENDPOINTS: &[&str] = &["/healthz", "/metrics"];

lazy_static! {
    static ref EXCLUDED_PATHS: HashSet<&'static str> = NO_TELEMETRY_ENDPOINTS.iter().copied().collect();
}

#[derive(Default)]
pub struct WebhookRootSpanBuilder;

impl RootSpanBuilder for WebhookRootSpanBuilder {
    fn on_request_start(request: &ServiceRequest) -> Span {
        if EXCLUDED_PATHS.contains(request.path()) {
            Span::none()
        } else {
            tracing_actix_web::root_span!(request)
        }
    }

    fn on_request_end<B: MessageBody>(
        span: Span,
        response: &std::result::Result<ServiceResponse<B>, actix_web::Error>,
    ) {
        DefaultRootSpanBuilder::on_request_end(span, response);
    }
}
