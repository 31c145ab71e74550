use std::sync::Arc;
use std::sync::Once;

use crate::gemini::fake::FakeGeminiClient;
use crate::gemini::GeminiClientTrait;
use crate::AppState;

static INIT: Once = Once::new();

/// Initialize test logging in a thread-safe way.
/// This function ensures that logging is initialized only once across all tests,
/// even when multiple test files are running in parallel.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .finish();

        // Another test harness may already own the global subscriber.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// App state backed by `client`, returned alongside it so tests can inspect
/// the recorded requests.
pub fn state_with_fake_client(
    client: FakeGeminiClient,
) -> (Arc<AppState>, Arc<FakeGeminiClient>) {
    let client = Arc::new(client);
    let shared: Arc<dyn GeminiClientTrait> = client.clone();
    let state = AppState::new_for_testing_with_client(Some(shared));
    (Arc::new(state), client)
}
