//! Authentication audit trail. The signup/login/logout handlers call these
//! hooks directly so the audit record is an explicit part of the control
//! flow rather than a process-wide observer.

use actix_web::HttpRequest;
use log::{log, Level};

/// Client address for audit lines: first `X-Forwarded-For` entry when a
/// proxy set one, otherwise the peer address.
pub fn client_ip(req: &HttpRequest) -> String {
    req.headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| req.peer_addr().map(|a| a.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn login_succeeded(username: &str, ip: &str) {
    log!(Level::Info, "Login User: {} via ip: {}", username, ip);
}

pub fn logout(username: &str, ip: &str) {
    log!(Level::Info, "Logout User: {} via ip: {}", username, ip);
}

pub fn login_failed(username: &str) {
    log!(Level::Warn, "Login Failed for: {}", username);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn forwarded_header_wins_over_peer_addr() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .to_http_request();
        assert_eq!(client_ip(&req), "203.0.113.7");
    }

    #[test]
    fn missing_header_and_peer_is_unknown() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(client_ip(&req), "unknown");
    }
}
