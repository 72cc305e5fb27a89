//! Profile card demo binary
//!
//! Mounts the session shell against a scripted identity provider and walks
//! through a redirect sign-in, a failed sign-in and a sign-out, printing the
//! card after every step.

use session_shell_auth::{
    AUTH_TOPIC, AttributeBag, Principal, SessionController, SessionEnvironment, SignInProvider,
    listener::{SIGN_IN_WITH_REDIRECT, SIGN_IN_WITH_REDIRECT_FAILURE},
    mocks::MockIdentityProvider,
    state::AttributeKey,
};
use session_shell_core::hub::{BroadcastHub, Hub, HubEvent};
use session_shell_runtime::metrics::MetricsExporter;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

async fn show(step: &str, controller: &SessionController<MockIdentityProvider>) {
    // Hub delivery is asynchronous; give the listener a moment to pick events up
    tokio::time::sleep(Duration::from_millis(20)).await;
    if !controller.settle(SETTLE_TIMEOUT).await {
        tracing::warn!(step, "Session still reconciling");
    }
    println!("\n>>> {step}");
    print!("{}", controller.view().await);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "profile_card=debug,session_shell_auth=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut exporter = MetricsExporter::new();
    exporter.install()?;

    println!("=== Profile Card: Session Shell Demo ===");

    let hub = BroadcastHub::new();
    let provider = MockIdentityProvider::new();
    let controller =
        SessionController::mount(SessionEnvironment::new(provider.clone()), &hub).await?;
    show("Mounted without a session", &controller).await;

    // The user picks Google; the provider navigates away
    controller.initiate_sign_in(SignInProvider::Google, "/").await;
    println!("\nRedirecting to {:?}", provider.last_sign_in());

    // A cancelled redirect lands back here
    hub.publish(
        AUTH_TOPIC,
        HubEvent::new(SIGN_IN_WITH_REDIRECT_FAILURE)
            .with_payload(serde_json::json!({ "message": "User cancelled login" })),
    )?;
    show("Redirect failed", &controller).await;

    // Second attempt succeeds and the provider now holds credentials
    provider.set_principal(Ok(Principal::new("u1", "alice")));
    provider.set_attributes(Ok(AttributeBag::new()
        .with(AttributeKey::Sub, "u1")
        .with(AttributeKey::GivenName, "Alice")
        .with(AttributeKey::FamilyName, "Doe")
        .with(AttributeKey::Email, "a@x.com")
        .with(AttributeKey::PhoneNumber, "+15550100")));
    hub.publish(AUTH_TOPIC, HubEvent::new(SIGN_IN_WITH_REDIRECT))?;
    show("Redirect completed", &controller).await;

    controller.terminate_session().await;
    show("Signed out", &controller).await;

    let final_state = controller.teardown().await;
    tracing::info!(?final_state, "View torn down");

    if let Some(rendered) = exporter.render() {
        println!("\n=== Metrics ===\n{rendered}");
    }

    Ok(())
}
