//! Rate limiting middleware for comment submission.

use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    web,
};
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;

use quill_shared::ErrorResponse;

use crate::state::AppState;

/// Throttles requests per client IP using `AppState::comment_limiter`.
///
/// Clients are keyed on the socket peer's IP unless
/// `AppState::trust_proxy_headers` is set. Requests pass straight through
/// when no limiter is configured. Limiter failures fail open.
pub struct RateLimitMiddleware;

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

/// The address a request is throttled under.
fn client_key(req: &ServiceRequest, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(addr) = req.connection_info().realip_remote_addr() {
            return addr.to_string();
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let throttle = req.app_data::<web::Data<AppState>>().and_then(|state| {
                state
                    .comment_limiter
                    .clone()
                    .map(|limiter| (limiter, state.trust_proxy_headers))
            });

            if let Some((limiter, trust_proxy_headers)) = throttle {
                let key = client_key(&req, trust_proxy_headers);

                match limiter.check(&key).await {
                    Ok(result) if !result.allowed => {
                        let retry_after = (result.retry_after.as_secs_f64().ceil() as u64).max(1);
                        tracing::warn!(client = %key, retry_after, "Comment rate limit exceeded");

                        let response = HttpResponse::TooManyRequests()
                            .insert_header(("Retry-After", retry_after.to_string()))
                            .json(ErrorResponse::too_many_requests(retry_after));

                        return Ok(req.into_response(response).map_into_right_body());
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "Rate limiter error, failing open"),
                }
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}
