//! Candidate token extraction from request headers.
//!
//! Two strategies are supported:
//!
//! - `HEADER`: `Authorization: Bearer <token>`
//! - `COOKIE` (default): the `psg_auth_token` cookie
//!
//! Extraction never trusts the token; it only locates it.

use crate::errors::AuthError;
use axum::http::{request::Parts, HeaderMap, Request};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of the cookie holding the Passage auth token.
pub const AUTH_COOKIE_NAME: &str = "psg_auth_token";

/// Where the candidate token is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStrategy {
    /// `Authorization: Bearer <token>`.
    Header,
    /// `Cookie: psg_auth_token=<token>`.
    #[default]
    Cookie,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown auth strategy '{0}'")]
pub struct UnknownAuthStrategy(pub String);

impl FromStr for AuthStrategy {
    type Err = UnknownAuthStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HEADER" => Ok(AuthStrategy::Header),
            "COOKIE" => Ok(AuthStrategy::Cookie),
            _ => Err(UnknownAuthStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStrategy::Header => f.write_str("HEADER"),
            AuthStrategy::Cookie => f.write_str("COOKIE"),
        }
    }
}

/// Read access to request headers.
///
/// Lookups are case-insensitive. Values that are not visible ASCII are
/// reported as absent.
pub trait RequestHeaders {
    fn header(&self, name: &str) -> Option<&str>;
}

impl RequestHeaders for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

impl RequestHeaders for Parts {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.header(name)
    }
}

impl<B> RequestHeaders for Request<B> {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers().header(name)
    }
}

/// Locate the candidate token according to `strategy`.
pub fn extract_token<R>(request: &R, strategy: AuthStrategy) -> Result<&str, AuthError>
where
    R: RequestHeaders + ?Sized,
{
    match strategy {
        AuthStrategy::Header => extract_from_header(request),
        AuthStrategy::Cookie => extract_from_cookie(request),
    }
}

fn extract_from_header<R>(request: &R) -> Result<&str, AuthError>
where
    R: RequestHeaders + ?Sized,
{
    let value = request
        .header("authorization")
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            tracing::debug!(target: "passage.auth.extractor", "Authorization header missing");
            AuthError::HeaderMissing
        })?;

    let mut segments = value.split(' ');
    let scheme = segments.next().unwrap_or_default();
    let token = segments.next().unwrap_or_default();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        tracing::debug!(target: "passage.auth.extractor", "Authorization header is not a bearer token");
        return Err(AuthError::MalformedHeader);
    }

    Ok(token)
}

fn extract_from_cookie<R>(request: &R) -> Result<&str, AuthError>
where
    R: RequestHeaders + ?Sized,
{
    let cookies = request.header("cookie").ok_or_else(|| {
        tracing::debug!(target: "passage.auth.extractor", "Cookie header missing");
        AuthError::CookieMissing
    })?;

    find_cookie(cookies, AUTH_COOKIE_NAME)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            tracing::debug!(target: "passage.auth.extractor", cookie = AUTH_COOKIE_NAME, "Auth cookie not present");
            AuthError::AuthCookieNotFound
        })
}

/// Find `name` in a raw `Cookie` header value.
///
/// Pairs are split on `;`, then on the first `=`; keys and values are
/// trimmed. Pairs without `=` are ignored.
pub fn find_cookie<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
}
