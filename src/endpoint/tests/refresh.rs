use super::defaults::*;
use super::{basic_authorization, expect_error, expect_token, post, Setup};

use crate::code_grant::refresh::revoke_refresh_token;
use crate::primitives::prelude::*;

fn refresh_request(client_id: &'static str, token: &str) -> Vec<(&'static str, String)> {
    vec![
        ("grant_type", "refresh_token".into()),
        ("client_id", client_id.into()),
        ("refresh_token", token.into()),
    ]
}

fn confidential_request(token: &str) -> Vec<(&'static str, String)> {
    let mut params = refresh_request(CLIENT_ID, token);
    params.push(("client_secret", PASSPHRASE.into()));
    params
}

#[test]
fn rotation() {
    let setup = Setup::new();
    let old = setup.refresh_token(PUBLIC_ID, RefreshTokenClientType::Pkce, 0);

    let token = expect_token(&setup.execute(post(TENANT, refresh_request(PUBLIC_ID, &old))));
    let new = token.refresh_token.expect("Rotation must return a successor");
    assert_ne!(new, old);
    assert_eq!(token.scope, "default example");

    let claims = setup.signer.verify(&token.access_token).unwrap();
    assert_eq!(claims.principal, Principal::User(OWNER_ID.into()));

    assert!(setup.issuer.get(&hash_token(&old)).is_none());
    let record = setup.issuer.get(&hash_token(&new)).unwrap();
    assert_eq!(record.refresh_count, 1);
    assert_eq!(record.client_type, RefreshTokenClientType::Pkce);
    assert_eq!(setup.issuer.len(), 1);
}

#[test]
fn rotated_token_is_dead() {
    let setup = Setup::new();
    let old = setup.refresh_token(PUBLIC_ID, RefreshTokenClientType::Pkce, 0);

    let token = expect_token(&setup.execute(post(TENANT, refresh_request(PUBLIC_ID, &old))));
    expect_error(
        &setup.execute(post(TENANT, refresh_request(PUBLIC_ID, &old))),
        401,
        "INVALID_REFRESH_TOKEN",
    );

    // The successor is unaffected by the replay.
    let new = token.refresh_token.unwrap();
    expect_token(&setup.execute(post(TENANT, refresh_request(PUBLIC_ID, &new))));
}

#[test]
fn refresh_ceiling() {
    let setup = Setup::new();
    let mut current = setup.refresh_token(LIMITED_ID, RefreshTokenClientType::Pkce, 0);

    // Counts 0 through the limit itself still rotate.
    for expected in 1..=LIMIT + 1 {
        let token = expect_token(&setup.execute(post(TENANT, refresh_request(LIMITED_ID, &current))));
        current = token.refresh_token.unwrap();
        assert_eq!(setup.issuer.get(&hash_token(&current)).unwrap().refresh_count, expected);
    }

    expect_error(
        &setup.execute(post(TENANT, refresh_request(LIMITED_ID, &current))),
        401,
        "MAXIMUM_REFRESH_COUNT_REACHED",
    );
    assert!(setup.issuer.is_empty());

    expect_error(
        &setup.execute(post(TENANT, refresh_request(LIMITED_ID, &current))),
        401,
        "INVALID_REFRESH_TOKEN",
    );
}

#[test]
fn confidential_tokens_require_credentials() {
    let setup = Setup::new();
    let token = setup.refresh_token(CLIENT_ID, RefreshTokenClientType::Confidential, 0);

    expect_error(
        &setup.execute(post(TENANT, refresh_request(CLIENT_ID, &token))),
        401,
        "MISSING_CLIENT_CREDENTIALS",
    );

    let mut wrong = refresh_request(CLIENT_ID, &token);
    wrong.push(("client_secret", "wrong".into()));
    expect_error(&setup.execute(post(TENANT, wrong)), 401, "INVALID_CLIENT_CREDENTIALS");

    // Neither attempt consumed the token.
    let record = setup.issuer.get(&hash_token(&token)).unwrap();
    assert_eq!(record.refresh_count, 0);

    let response = expect_token(&setup.execute(post(TENANT, confidential_request(&token))));
    assert!(response.refresh_token.is_some());

    let token = setup.refresh_token(CLIENT_ID, RefreshTokenClientType::Confidential, 0);
    let request = post(TENANT, refresh_request(CLIENT_ID, &token))
        .with_auth(basic_authorization(CLIENT_ID, PASSPHRASE));
    expect_token(&setup.execute(request));
}

#[test]
fn token_is_bound_to_client_and_tenant() {
    let setup = Setup::new();
    let token = setup.refresh_token(CLIENT_ID, RefreshTokenClientType::Confidential, 0);

    expect_error(
        &setup.execute(post(TENANT, refresh_request(PUBLIC_ID, &token))),
        401,
        "INVALID_REFRESH_TOKEN",
    );
    expect_error(
        &setup.execute(post(OTHER_TENANT, confidential_request(&token))),
        401,
        "INVALID_TENANT_AND_CLIENT",
    );

    assert!(setup.issuer.get(&hash_token(&token)).is_some());
}

#[test]
fn unknown_or_missing_token() {
    let setup = Setup::new();
    expect_error(
        &setup.execute(post(TENANT, refresh_request(PUBLIC_ID, "made-up-token"))),
        401,
        "INVALID_REFRESH_TOKEN",
    );
    expect_error(
        &setup.execute(post(TENANT, refresh_request(PUBLIC_ID, ""))),
        401,
        "MISSING_REFRESH_TOKEN",
    );
}

#[test]
fn service_accounts_can_not_refresh() {
    let setup = Setup::new();
    let token = setup.refresh_token(SERVICE_ID, RefreshTokenClientType::Confidential, 0);

    let mut params = refresh_request(SERVICE_ID, &token);
    params.push(("client_secret", PASSPHRASE.into()));
    expect_error(
        &setup.execute(post(TENANT, params)),
        401,
        "INVALID_CLIENT_TYPE_FOR_REFRESH_TOKEN_GRANT",
    );
}

#[test]
fn scope_may_only_narrow() {
    let setup = Setup::new();
    let token = setup.refresh_token(PUBLIC_ID, RefreshTokenClientType::Pkce, 0);

    let mut wider = refresh_request(PUBLIC_ID, &token);
    wider.push(("scope", "default example admin".into()));
    expect_error(&setup.execute(post(TENANT, wider)), 401, "INVALID_SCOPE");
    assert!(setup.issuer.get(&hash_token(&token)).is_some());

    let mut narrower = refresh_request(PUBLIC_ID, &token);
    narrower.push(("scope", "example".into()));
    let response = expect_token(&setup.execute(post(TENANT, narrower)));
    assert_eq!(response.scope, "example");

    // The family keeps its original grant.
    let next = response.refresh_token.unwrap();
    let record = setup.issuer.get(&hash_token(&next)).unwrap();
    assert_eq!(record.scope, SCOPE.parse::<Scope>().unwrap());
}

#[test]
fn explicit_revocation() {
    let setup = Setup::new();
    let token = setup.refresh_token(PUBLIC_ID, RefreshTokenClientType::Pkce, 0);

    let issuer: &TokenMap = &setup.issuer;
    assert!(smol::block_on(revoke_refresh_token(issuer, &token)).unwrap());
    assert!(!smol::block_on(revoke_refresh_token(issuer, &token)).unwrap());
    assert!(smol::block_on(revoke_refresh_token(issuer, "")).is_err());

    expect_error(
        &setup.execute(post(TENANT, refresh_request(PUBLIC_ID, &token))),
        401,
        "INVALID_REFRESH_TOKEN",
    );
}
