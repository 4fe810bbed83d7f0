use hookscope_application::WebhookService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub webhook_service: WebhookService,
}
