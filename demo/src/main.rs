//! Session coordinator walkthrough.
//!
//! Runs a full sign-in/sign-out cycle against the in-memory identity
//! provider and prints what a UI would see. With `REST_API_ROOT` set the
//! profile comes from that backend instead of the in-memory service.
//!
//! ```text
//! RUST_LOG=sessionflow_auth=debug cargo run -p sessionflow-demo
//! ```

use anyhow::Context;
use sessionflow_auth::mocks::{MockIdentityProvider, MockNavigator, MockProfileService};
use sessionflow_auth::providers::{ProfileService, RawUser};
use sessionflow_auth::{
    CoordinatorConfig, LoginMethod, Profile, ProviderKind, SessionCoordinator, SessionEnvironment,
    SessionState, TokenManager,
};
use sessionflow_core::environment::SystemClock;
use sessionflow_profile_api::{ProfileApiConfig, RestProfileService};
use sessionflow_runtime::metrics::MetricsExporter;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut exporter = MetricsExporter::new();
    exporter.install().context("installing metrics exporter")?;
    sessionflow_auth::register_metrics();

    let config = CoordinatorConfig::default();
    let identity = MockIdentityProvider::new()
        .with_sign_in_user(RawUser::new("u1").with_email("a@x.com").with_display_name("Ada"));
    let tokens = TokenManager::new(identity.clone(), SystemClock, config.token_expiry_skew);

    if std::env::var_os("REST_API_ROOT").is_some() {
        let api = ProfileApiConfig::from_env()?;
        tracing::info!(base_url = %api.base_url, "Using REST profile backend");
        let profiles = RestProfileService::new(api, tokens.clone())?;
        run(&config, identity, profiles, tokens).await?;
    } else {
        let profiles = MockProfileService::new()
            .with_profile("u1", Profile::new("p1").with_role("DRIVER"));
        run(&config, identity, profiles, tokens).await?;
    }

    if let Some(text) = exporter.render() {
        println!("\n# Metrics\n{text}");
    }

    Ok(())
}

async fn run<S>(
    config: &CoordinatorConfig,
    identity: MockIdentityProvider,
    profiles: S,
    tokens: TokenManager<MockIdentityProvider, SystemClock>,
) -> anyhow::Result<()>
where
    S: ProfileService + Clone + 'static,
{
    let navigator = MockNavigator::new();
    let env = SessionEnvironment::with_tokens(identity, profiles, navigator.clone(), SystemClock, tokens);
    let coordinator = SessionCoordinator::from_environment(config, env);

    let mut changes = coordinator.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(view) = changes.changed().await {
            match serde_json::to_string(&view) {
                Ok(json) if view.state.is_loading() => println!("view (loading): {json}"),
                Ok(json) => println!("view: {json}"),
                Err(error) => tracing::warn!(error = %error, "Could not render view"),
            }
        }
    });

    // The login page was opened from a protected page.
    coordinator.observe_location("?from=/billing").await?;
    coordinator.start().await?;
    coordinator
        .wait_for(|view| view.state == SessionState::Unauthenticated, WAIT)
        .await?;

    coordinator
        .login(LoginMethod::Interactive(ProviderKind::Google))
        .await?;
    let view = coordinator
        .wait_for(|view| view.state == SessionState::Authenticated, WAIT)
        .await?;
    if let Some(warning) = &view.warning {
        println!("warning: {warning}");
    }

    match coordinator.get_token(false).await? {
        Some(token) => println!("token expires: {:?}", token.expiration_hint),
        None => println!("no token"),
    }

    coordinator.logout().await?.wait().await;
    coordinator
        .wait_for(|view| view.state == SessionState::Unauthenticated, WAIT)
        .await?;

    println!("navigations: {:?}", navigator.paths());
    for transition in coordinator.history().await {
        println!(
            "{} {:>15} -> {:<15} (generation {})",
            transition.at.format("%H:%M:%S%.3f"),
            transition.from.label(),
            transition.to.label(),
            transition.generation
        );
    }

    coordinator.shutdown(WAIT).await?;
    drop(coordinator);
    printer.await.context("view printer")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sessionflow_auth=info,sessionflow_runtime=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
