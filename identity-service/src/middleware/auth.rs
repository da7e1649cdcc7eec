use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::config::AuthConfig;
use crate::services::{AssertedPrincipal, Credentials};
use crate::AppState;

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// Collects the token and, when the proxy is trusted, the asserted principal.
pub fn credentials_from_headers(headers: &HeaderMap, config: &AuthConfig) -> Credentials {
    let token = header_value(headers, &config.token_header);

    let principal = if config.trust_principal_headers {
        header_value(headers, &config.principal_email_header).map(|email| AssertedPrincipal {
            email,
            is_admin: header_value(headers, &config.principal_admin_header)
                .map(|flag| is_truthy(&flag))
                .unwrap_or(false),
        })
    } else {
        None
    };

    Credentials { token, principal }
}

/// Attaches a `RequestContext` to every request. Never rejects: unresolved
/// credentials leave the request anonymous.
pub async fn authenticate_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let credentials = credentials_from_headers(req.headers(), &state.config.auth);
    let ctx = state.authenticator.authenticate(&credentials).await;

    req.extensions_mut().insert(ctx);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn token_header_is_read() {
        let creds = credentials_from_headers(
            &headers(&[("x-auth-token", "SA:abc")]),
            &AuthConfig::default(),
        );
        assert_eq!(creds.token.as_deref(), Some("SA:abc"));
        assert_eq!(creds.principal, None);
    }

    #[test]
    fn principal_headers_ignored_unless_trusted() {
        let map = headers(&[
            ("x-principal-email", "root@example.com"),
            ("x-principal-admin", "true"),
        ]);
        assert_eq!(credentials_from_headers(&map, &AuthConfig::default()).principal, None);

        let trusted = AuthConfig {
            trust_principal_headers: true,
            ..AuthConfig::default()
        };
        let creds = credentials_from_headers(&map, &trusted);
        assert_eq!(
            creds.principal,
            Some(AssertedPrincipal {
                email: "root@example.com".into(),
                is_admin: true,
            })
        );
    }

    #[test]
    fn admin_flag_defaults_to_false() {
        let trusted = AuthConfig {
            trust_principal_headers: true,
            ..AuthConfig::default()
        };
        let creds = credentials_from_headers(
            &headers(&[("x-principal-email", "dev@example.com"), ("x-principal-admin", "no")]),
            &trusted,
        );
        assert_eq!(creds.principal.map(|p| p.is_admin), Some(false));
    }
}
