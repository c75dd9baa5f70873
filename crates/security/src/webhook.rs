//! HMAC-SHA256 webhook authentication and the raw-body-to-event wrapper.

use gosuto_core::{Event, Payload};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Validates an `X-Hub-Signature-256: sha256=<hex>` header against `body`
/// using constant-time comparison. Unlike a "no secret configured" bypass,
/// an empty secret is still validated — the caller must have computed the
/// signature over an empty key for the check to pass.
pub fn validate_hmac_sha256(secret: &str, body: &[u8], signature_header: &str) -> bool {
    let Some(sig_hex) = signature_header.strip_prefix("sha256=") else {
        return false;
    };

    let Ok(provided_bytes) = hex::decode(sig_hex) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided_bytes).is_ok()
}

/// Computes the `sha256=<hex>` signature for `body` under `secret`. Used by
/// tests and by anything constructing a request to this server.
pub fn compute_hmac_sha256(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Fields recognized when building a human-readable summary from a raw
/// webhook body, tried in this order.
const SUMMARY_FIELDS: &[(&str, &str)] = &[
    ("action", "Action"),
    ("event", "Event"),
    ("ref", "Ref"),
    ("repository.full_name", "Repository"),
    ("type", "Type"),
];

/// Wraps a raw webhook POST body into a validated [`Event`]. If the body
/// parses as a JSON object it becomes `payload.data`; otherwise the raw text
/// is stored under `data.raw`.
pub fn wrap_raw_webhook_body(source: &str, raw_body: &[u8]) -> Event {
    let parsed: Option<serde_json::Value> = serde_json::from_slice(raw_body).ok();
    let data = match &parsed {
        Some(serde_json::Value::Object(map)) => Some(
            map.iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<std::collections::HashMap<_, _>>(),
        ),
        _ => {
            let raw_text = String::from_utf8_lossy(raw_body).into_owned();
            Some(std::collections::HashMap::from([(
                "raw".to_string(),
                serde_json::Value::String(raw_text),
            )]))
        }
    };

    let message = build_summary(parsed.as_ref(), source);

    Event {
        source: source.to_string(),
        event_type: "webhook.delivery".to_string(),
        ts: chrono::Utc::now(),
        payload: Payload { message, data },
    }
}

fn build_summary(parsed: Option<&serde_json::Value>, source: &str) -> String {
    let Some(value) = parsed else {
        return format!("Webhook delivery received from gateway \"{source}\".");
    };

    let mut summary = String::new();
    for (path, label) in SUMMARY_FIELDS {
        if let Some(v) = lookup_path(value, path) {
            if let Some(s) = v.as_str() {
                summary.push_str(&format!("{label}: \"{s}\". "));
            }
        }
    }

    if summary.is_empty() {
        format!("Webhook delivery received from gateway \"{source}\".")
    } else {
        summary.trim_end().to_string()
    }
}

fn lookup_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut cur = value;
    for segment in path.split('.') {
        cur = cur.get(segment)?;
    }
    Some(cur)
}
