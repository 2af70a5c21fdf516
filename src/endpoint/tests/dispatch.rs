use std::borrow::Cow;
use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

use super::defaults::*;
use super::{basic_authorization, expect_error, expect_token, post, BrokenSigner, Setup};

use crate::code_grant::error::ErrorKind;
use crate::endpoint::{Messages, TokenEndpoint};
use crate::frontends::simple::endpoint::Generic;
use crate::frontends::simple::request::Request;
use crate::primitives::prelude::*;

fn service_request() -> Vec<(&'static str, &'static str)> {
    vec![
        ("grant_type", "client_credentials"),
        ("client_id", SERVICE_ID),
        ("client_secret", PASSPHRASE),
    ]
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    sub: &'a str,
    iss: &'a str,
    exp: i64,
}

fn assertion(client_id: &str, key: &[u8]) -> String {
    let claims = AssertionClaims {
        sub: client_id,
        iss: client_id,
        exp: Utc::now().timestamp() + 300,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(key)).unwrap()
}

#[test]
fn only_post_is_allowed() {
    let setup = Setup::new();
    for method in ["GET", "PUT", "DELETE", "post"] {
        let mut request = post(TENANT, service_request());
        request.method = method.to_owned();
        expect_error(&setup.execute(request), 405, "METHOD_NOT_ALLOWED");
    }
}

#[test]
fn content_type_must_be_form() {
    let setup = Setup::new();

    for content_type in [None, Some("application/json"), Some("text/plain"), Some("")] {
        let mut request = post(TENANT, service_request());
        request.content_type = content_type.map(str::to_owned);
        expect_error(&setup.execute(request), 401, "INVALID_CONTENT_TYPE");
    }

    for content_type in [
        "application/x-www-form-urlencoded; charset=UTF-8",
        "Application/X-WWW-Form-Urlencoded",
    ] {
        let mut request = post(TENANT, service_request());
        request.content_type = Some(content_type.to_owned());
        expect_token(&setup.execute(request));
    }
}

#[test]
fn method_is_checked_before_content_type() {
    let setup = Setup::new();
    let mut request = post(TENANT, Vec::<(&'static str, &'static str)>::new());
    request.method = "GET".to_owned();
    request.content_type = None;
    expect_error(&setup.execute(request), 405, "METHOD_NOT_ALLOWED");
}

#[test]
fn tenant_is_required() {
    let setup = Setup::new();
    let mut request = post(TENANT, service_request());
    request.tenant = None;
    expect_error(&setup.execute(request), 401, "INVALID_TENANT");

    expect_error(&setup.execute(post("", service_request())), 401, "INVALID_TENANT");
}

#[test]
fn client_id_is_required() {
    let setup = Setup::new();

    let missing = vec![("grant_type", "client_credentials"), ("client_secret", PASSPHRASE)];
    expect_error(&setup.execute(post(TENANT, missing)), 401, "MISSING_CLIENT_ID");

    let empty = vec![
        ("grant_type", "client_credentials"),
        ("client_id", ""),
        ("client_secret", PASSPHRASE),
    ];
    expect_error(&setup.execute(post(TENANT, empty)), 401, "MISSING_CLIENT_ID");

    // Reported before the grant type.
    let neither = vec![("client_secret", PASSPHRASE)];
    expect_error(&setup.execute(post(TENANT, neither)), 401, "MISSING_CLIENT_ID");
}

#[test]
fn grant_type_is_required() {
    let setup = Setup::new();

    for grant_type in [None, Some(""), Some("password"), Some("implicit")] {
        let mut params = vec![("client_id", SERVICE_ID), ("client_secret", PASSPHRASE)];
        if let Some(grant_type) = grant_type {
            params.push(("grant_type", grant_type));
        }
        expect_error(
            &setup.execute(post(TENANT, params)),
            401,
            "MISSING_OR_INVALID_GRANT_TYPE",
        );
    }
}

#[test]
fn duplicate_parameters_are_ignored() {
    let setup = Setup::new();

    let mut params = service_request();
    params.push(("client_id", CLIENT_ID));
    expect_error(&setup.execute(post(TENANT, params)), 401, "MISSING_CLIENT_ID");

    let mut params = service_request();
    params.push(("client_secret", PASSPHRASE));
    expect_error(&setup.execute(post(TENANT, params)), 401, "MISSING_CLIENT_CREDENTIALS");
}

#[test]
fn identical_input_identical_error() {
    let setup = Setup::new();
    let malformed = || {
        let mut request = post(TENANT, vec![("grant_type", "refresh_token")]);
        request.content_type = Some("application/json".to_owned());
        request
    };

    let first = setup.execute(malformed());
    let second = setup.execute(malformed());
    assert_eq!(first, second);

    let unknown = || {
        post(
            TENANT,
            vec![("grant_type", "authorization_code"), ("client_id", CLIENT_ID), ("code", "nope")],
        )
    };
    assert_eq!(setup.execute(unknown()).body, setup.execute(unknown()).body);
}

#[test]
fn basic_authorization_header() {
    let setup = Setup::new();
    let params = || vec![("grant_type", "client_credentials"), ("client_id", SERVICE_ID)];

    let request = post(TENANT, params()).with_auth(basic_authorization(SERVICE_ID, PASSPHRASE));
    expect_token(&setup.execute(request));

    // The header must name the same client as the body.
    let request = post(TENANT, params()).with_auth(basic_authorization(CLIENT_ID, PASSPHRASE));
    expect_error(&setup.execute(request), 401, "INVALID_CLIENT_CREDENTIALS");

    let request = post(TENANT, params()).with_auth("Basic not-base64!");
    expect_error(&setup.execute(request), 401, "INVALID_CLIENT_CREDENTIALS");

    // A secret in the body takes precedence over the one in the header.
    let request = post(TENANT, service_request()).with_auth(basic_authorization(SERVICE_ID, "stale"));
    expect_token(&setup.execute(request));
}

#[test]
fn assertion_authorization() {
    let setup = Setup::new();
    let params = || vec![("grant_type", "client_credentials"), ("client_id", CLIENT_ID)];

    let jwt = assertion(CLIENT_ID, ASSERTION_KEY);
    let request = post(TENANT, params()).with_auth(format!("Bearer {}", jwt));
    expect_token(&setup.execute(request));

    // Without the scheme the header is taken as the assertion itself.
    let request = post(TENANT, params()).with_auth(jwt);
    expect_token(&setup.execute(request));

    let forged = assertion(CLIENT_ID, b"some other key");
    let request = post(TENANT, params()).with_auth(format!("Bearer {}", forged));
    expect_error(&setup.execute(request), 401, "INVALID_CLIENT_CREDENTIALS");

    let impersonated = assertion(SERVICE_ID, ASSERTION_KEY);
    let request = post(TENANT, params()).with_auth(format!("Bearer {}", impersonated));
    expect_error(&setup.execute(request), 401, "INVALID_CLIENT_CREDENTIALS");
}

struct Pirate;

impl Messages for Pirate {
    fn translate(&self, kind: ErrorKind) -> Cow<'static, str> {
        match kind {
            ErrorKind::InvalidTenant => Cow::Borrowed("Arr, no such ship."),
            other => Cow::Borrowed(other.canonical_message()),
        }
    }
}

#[test]
fn translated_messages() {
    let registrar = Arc::new(ClientMap::new());
    let endpoint = TokenEndpoint::new(Generic {
        registrar: registrar.clone(),
        authorizer: AuthMap::new(RandomGenerator::new(16)),
        issuer: TokenMap::new(),
        signer: TokenSigner::ephemeral(),
        credentials: ClientAuthenticator::new(registrar, PlaintextSecrets),
        generator: RandomGenerator::new(32),
        pkce: Default::default(),
    })
    .with_messages(Pirate);

    let mut request = post("nowhere", service_request());
    let response = smol::block_on(endpoint.execute(&mut request)).unwrap();
    expect_error(&response, 401, "INVALID_TENANT");

    let json = response.json().unwrap();
    let detail = &json["errorDetails"][0];
    assert_eq!(detail["errorMessageTranslated"], "Arr, no such ship.");
    assert_eq!(detail["errorMessageCanonical"], ErrorKind::InvalidTenant.canonical_message());
}

#[test]
fn failing_primitive_is_server_error() {
    let registrar = Arc::new(ClientMap::new());
    registrar.register_tenant(Tenant {
        tenant_id: TENANT.into(),
        enabled: true,
    });
    registrar.register_client(
        Client::new(TENANT, SERVICE_ID, ClientType::ServiceAccountOnly)
            .with_encrypted_secret(PASSPHRASE.as_bytes().to_vec()),
    );

    let endpoint = Generic {
        registrar: registrar.clone(),
        authorizer: AuthMap::new(RandomGenerator::new(16)),
        issuer: TokenMap::new(),
        signer: BrokenSigner,
        credentials: ClientAuthenticator::new(registrar, PlaintextSecrets),
        generator: RandomGenerator::new(32),
        pkce: Default::default(),
    }
    .token_endpoint();

    let mut request: Request = post(TENANT, service_request());
    let response = smol::block_on(endpoint.execute(&mut request)).unwrap();
    expect_error(&response, 500, "SERVER_ERROR");

    // Nothing about the failure leaks into the body.
    assert!(!response.body.unwrap().contains("hsm"));
}
