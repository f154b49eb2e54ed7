//! Identity cookie handling
//!
//! After a successful payment verification the buyer's identity is stored in a
//! cookie so later visits can be checked without an explicit session id.

use axum::http::{header, HeaderMap, HeaderValue};
use std::net::IpAddr;
use vinculo_common::access::IdentityKey;

pub const IDENTITY_COOKIE: &str = "vinculo_identity";

const COOKIE_MAX_AGE_SECS: u64 = 365 * 24 * 60 * 60;

/// Identity cached in the request cookies, if any
pub fn cached_identity(headers: &HeaderMap) -> Option<IdentityKey> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == IDENTITY_COOKIE)
        .and_then(|(_, value)| IdentityKey::from_cookie_value(value))
}

/// `Set-Cookie` value caching an identity
pub fn identity_cookie(identity: &IdentityKey) -> Option<HeaderValue> {
    let cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        IDENTITY_COOKIE,
        identity.to_cookie_value(),
        COOKIE_MAX_AGE_SECS
    );
    HeaderValue::from_str(&cookie).ok()
}

/// Client address from proxy headers
pub fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next());
    let real_ip = headers.get("x-real-ip").and_then(|v| v.to_str().ok());

    forwarded
        .or(real_ip)
        .and_then(|v| v.trim().parse().ok())
}
