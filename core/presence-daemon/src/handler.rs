use presence_core::PresenceTracker;
use presence_protocol::{
    codes, parse_event, parse_report_request, ErrorInfo, Method, ReportPayload, Request, Response,
    PROTOCOL_VERSION,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub fn handle_request(request: Request, tracker: &PresenceTracker) -> Response {
    let outcome = if request.protocol_version != PROTOCOL_VERSION {
        Err(ErrorInfo::new(
            codes::PROTOCOL_MISMATCH,
            "unsupported protocol version",
        ))
    } else {
        debug!(method = ?request.method, id = ?request.id, "Request received");
        match request.method {
            Method::GetHealth => Ok(health(tracker)),
            Method::Event => handle_event(request.params, tracker),
            Method::Report => handle_report(request.params, tracker),
        }
    };
    Response::reply(request.id, outcome)
}

fn health(tracker: &PresenceTracker) -> Value {
    json!({
        "status": "ok",
        "pid": std::process::id(),
        "version": env!("CARGO_PKG_VERSION"),
        "protocol_version": PROTOCOL_VERSION,
        "tracked": tracker.tracked_count(),
    })
}

fn handle_event(params: Option<Value>, tracker: &PresenceTracker) -> Result<Value, ErrorInfo> {
    let params = params.ok_or_else(|| ErrorInfo::invalid_params("event payload is required"))?;
    let event = parse_event(params)?;

    debug!(
        identity_id = event.identity_id,
        status = ?event.status,
        observed_at = ?event.observed_at,
        "Received presence event"
    );

    match tracker.handle_event(&event) {
        Ok(Some(transition)) => Ok(json!({ "accepted": true, "transition": transition.as_str() })),
        Ok(None) => Ok(json!({ "accepted": false, "reason": "untracked" })),
        Err(err) => {
            warn!(identity_id = event.identity_id, error = %err, "Event not committed");
            Err(ErrorInfo::new(err.code(), err.to_string()))
        }
    }
}

fn handle_report(params: Option<Value>, tracker: &PresenceTracker) -> Result<Value, ErrorInfo> {
    let report_request = parse_report_request(params)?;
    let outcome = tracker
        .report(report_request.identity.as_deref())
        .map_err(|err| ErrorInfo::new(err.code(), err.to_string()))?;

    info!(
        identity = ?report_request.identity,
        kind = ?outcome.kind(),
        "Report generated"
    );
    let payload = ReportPayload {
        kind: outcome.kind(),
        text: outcome.text(),
    };
    serde_json::to_value(payload).map_err(|err| {
        ErrorInfo::new(
            codes::SERIALIZATION_ERROR,
            format!("Failed to serialize report: {}", err),
        )
    })
}
