//! Request identity extraction.
//!
//! Anonymous respondents carry no identity headers; the deployment's reverse
//! proxy or gateway sets `x-actor-id` / `x-actor-role` for authenticated
//! consultants. Forensic fields (ip, user agent, request id) are attached to
//! every audit row.

use axum::http::HeaderMap;

use diag_core::model::ActorContext;
use diag_core::types::Role;

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn actor_context(headers: &HeaderMap) -> ActorContext {
    let ip_address = header_str(headers, "x-forwarded-for")
        .map(|v| v.split(',').next().unwrap_or("").trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"));
    ActorContext {
        actor_id: header_str(headers, "x-actor-id"),
        ip_address,
        user_agent: header_str(headers, "user-agent"),
        request_id: header_str(headers, "x-request-id"),
    }
}

pub fn actor_role(headers: &HeaderMap) -> Option<Role> {
    header_str(headers, "x-actor-role").and_then(|v| Role::from_str(&v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        let actor = actor_context(&headers);
        assert_eq!(actor.ip_address.as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn real_ip_is_the_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        let actor = actor_context(&headers);
        assert_eq!(actor.ip_address.as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn role_header_parses_or_is_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(actor_role(&headers), None);
        headers.insert("x-actor-role", HeaderValue::from_static("consultant"));
        assert_eq!(actor_role(&headers), Some(Role::Consultant));
        headers.insert("x-actor-role", HeaderValue::from_static("sysadmin"));
        assert_eq!(actor_role(&headers), None);
    }
}
