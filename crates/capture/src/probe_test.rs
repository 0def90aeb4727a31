use super::*;
use axum::http::StatusCode as AxumStatus;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    base_url
}

fn client() -> reqwest::Client {
    crate::client::probe_client().unwrap()
}

#[tokio::test]
async fn test_active_session_returns_meta() {
    let base_url = serve(Router::new().route(
        "/session",
        get(|| async { r#"{"sessionid":"7B1C","match_type":"Echo_Arena"}"# }),
    ))
    .await;

    match probe_session(&client(), &base_url).await.unwrap() {
        Probe::Active(meta) => {
            assert_eq!(meta.session_uuid, "7B1C");
            assert_eq!(meta.match_type, "Echo_Arena");
        }
        Probe::Inactive => panic!("expected an active session"),
    }
}

#[tokio::test]
async fn test_empty_uuid_is_inactive() {
    let base_url = serve(Router::new().route(
        "/session",
        get(|| async { r#"{"sessionid":"","game_status":"idle"}"# }),
    ))
    .await;

    assert!(matches!(
        probe_session(&client(), &base_url).await.unwrap(),
        Probe::Inactive
    ));
}

#[tokio::test]
async fn test_404_is_inactive() {
    let base_url = serve(Router::new().route(
        "/session",
        get(|| async { AxumStatus::NOT_FOUND.into_response() }),
    ))
    .await;

    assert!(matches!(
        probe_session(&client(), &base_url).await.unwrap(),
        Probe::Inactive
    ));
}

#[tokio::test]
async fn test_500_is_api_disabled() {
    let base_url = serve(Router::new().route(
        "/session",
        get(|| async { AxumStatus::INTERNAL_SERVER_ERROR.into_response() }),
    ))
    .await;

    assert!(matches!(
        probe_session(&client(), &base_url).await,
        Err(ProbeError::ApiAccessDisabled)
    ));
}

#[tokio::test]
async fn test_closed_port_is_inactive_not_error() {
    // Bind a listener to reserve a port, then drop it so nothing listens
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    assert!(matches!(
        probe_session(&client(), &base_url).await.unwrap(),
        Probe::Inactive
    ));
}

#[tokio::test]
async fn test_malformed_body_is_error() {
    let base_url = serve(Router::new().route("/session", get(|| async { "not json" }))).await;

    assert!(matches!(
        probe_session(&client(), &base_url).await,
        Err(ProbeError::Malformed(_))
    ));
}

#[tokio::test]
async fn test_unexpected_status_is_error() {
    let base_url = serve(Router::new().route(
        "/session",
        get(|| async { AxumStatus::IM_A_TEAPOT.into_response() }),
    ))
    .await;

    assert!(matches!(
        probe_session(&client(), &base_url).await,
        Err(ProbeError::UnexpectedStatus(418))
    ));
}
