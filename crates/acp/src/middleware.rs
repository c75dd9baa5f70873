//! Bearer-token middleware guarding every ACP route except `/events/{source}`,
//! which authenticates per-request according to the matched gateway's type.

use crate::common::check_bearer;
use crate::state::AcpState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

pub async fn bearer_middleware(State(state): State<AcpState>, req: Request, next: Next) -> Response {
    if state.bearer_token.is_empty() {
        return next.run(req).await;
    }

    match check_bearer(&state.bearer_token, req.headers()) {
        Ok(()) => next.run(req).await,
        Err(resp) => resp,
    }
}
