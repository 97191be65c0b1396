mod common;

use axum::http::StatusCode;
use common::{MockBehavior, MockService};
use leaky_mesh::chain::{leak_endpoint, leak_url};
use leaky_mesh::identity::{unverified_claims, IdToken, StubTokenSource};
use leaky_mesh::{AuthClient, ChainResolver, Error};
use std::sync::Arc;

fn resolver() -> ChainResolver {
    ChainResolver::new(AuthClient::new(Arc::new(StubTokenSource::new("intruder-service"))))
}

#[tokio::test]
async fn test_each_hop_presents_previous_token() {
    let a = MockService::spawn("a", MockBehavior::default()).await;
    let b = MockService::spawn("b", MockBehavior::default()).await;
    let c = MockService::spawn("c", MockBehavior::default()).await;
    let route = vec![a.url.clone(), b.url.clone(), c.url.clone()];
    let target = "http://target.invalid/attacks/1";

    let token = resolver().resolve(&route, target).await.unwrap();
    assert_eq!(token.as_str(), c.leaked_token());

    let (a_leaks, b_leaks, c_leaks) = (a.leaks(), b.leaks(), c.leaks());
    assert_eq!(a_leaks.len(), 1);
    assert_eq!(b_leaks.len(), 1);
    assert_eq!(c_leaks.len(), 1);

    // first hop: our own token, minted for the full leak request URL
    let claims = unverified_claims(&a_leaks[0].bearer).unwrap();
    assert_eq!(claims.sub.as_deref(), Some("intruder-service"));
    let first_request = leak_url(&a.url, &leak_endpoint(&b.url)).unwrap();
    assert_eq!(claims.aud.as_deref(), Some(first_request.as_str()));
    assert_eq!(a_leaks[0].target, leak_endpoint(&b.url));

    assert_eq!(b_leaks[0].bearer, a.leaked_token());
    assert_eq!(b_leaks[0].target, leak_endpoint(&c.url));

    assert_eq!(c_leaks[0].bearer, b.leaked_token());
    assert_eq!(c_leaks[0].target, target);
}

#[tokio::test]
async fn test_broken_hop_stops_the_chain() {
    let a = MockService::spawn("a", MockBehavior::default()).await;
    let b = MockService::spawn(
        "b",
        MockBehavior {
            leak_status: StatusCode::FORBIDDEN,
            ..Default::default()
        },
    )
    .await;
    let c = MockService::spawn("c", MockBehavior::default()).await;
    let route = vec![a.url.clone(), b.url.clone(), c.url.clone()];

    let err = resolver()
        .resolve(&route, "http://target.invalid/attacks")
        .await
        .unwrap_err();

    match err {
        Error::ChainBreak { hop, service, reason } => {
            assert_eq!(hop, 1);
            assert_eq!(service, b.url);
            assert!(reason.contains("403"));
        }
        other => panic!("expected chain break, got {other:?}"),
    }
    assert_eq!(a.leaks().len(), 1);
    assert_eq!(b.leaks().len(), 1);
    assert!(c.leaks().is_empty());
}

#[tokio::test]
async fn test_non_200_success_breaks_the_hop() {
    let website = MockService::spawn(
        "website",
        MockBehavior {
            leak_status: StatusCode::ACCEPTED,
            ..Default::default()
        },
    )
    .await;
    let route = vec![website.url.clone()];

    let err = resolver()
        .resolve(&route, "http://order/attacks")
        .await
        .unwrap_err();

    match err {
        Error::ChainBreak { hop, reason, .. } => {
            assert_eq!(hop, 0);
            assert!(reason.contains("202"));
        }
        other => panic!("expected chain break, got {other:?}"),
    }
}

#[tokio::test]
async fn test_single_leak_uses_given_bearer() {
    let payment = MockService::spawn("payment", MockBehavior::default()).await;

    let token = resolver()
        .leak_token(&payment.url, "http://number/ranges/payment", &IdToken::new("borrowed"))
        .await
        .unwrap();

    assert_eq!(token.as_str(), payment.leaked_token());
    let leaks = payment.leaks();
    assert_eq!(leaks[0].bearer, "borrowed");
    assert_eq!(leaks[0].target, "http://number/ranges/payment");
}

#[tokio::test]
async fn test_single_hop_route() {
    let website = MockService::spawn("website", MockBehavior::default()).await;
    let route = vec![website.url.clone()];

    let token = resolver()
        .resolve(&route, "http://order/attacks")
        .await
        .unwrap();

    assert_eq!(token.as_str(), website.leaked_token());
    assert_eq!(website.leaks()[0].target, "http://order/attacks");
}
