use std::sync::Arc;

use keel_api::app::{build_router, services::AppServices};
use keel_client::{ApiClient, ClientError, FormPhase, Toast, ToastQueue};
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let services = AppServices::in_memory("client-test-secret", chrono::Duration::hours(1));
        let app = build_router(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn signed_in(srv: &TestServer) -> ApiClient {
    let client = ApiClient::new(&srv.base_url);
    client.signup("clerk@example.com", "password123").await.unwrap();
    client
}

#[tokio::test]
async fn requests_without_a_session_are_unauthorized() {
    let srv = TestServer::spawn().await;
    let client = ApiClient::new(&srv.base_url);
    let invoices = client.resource("ap", "invoices").unwrap();

    assert_eq!(client.list(&invoices).await.unwrap_err(), ClientError::Unauthorized);
}

#[tokio::test]
async fn created_record_shows_up_in_the_next_list() {
    let srv = TestServer::spawn().await;
    let client = signed_in(&srv).await;
    let invoices = client.resource("ap", "invoices").unwrap();

    assert!(client.list(&invoices).await.unwrap().is_empty());

    let created = client
        .create(&invoices)
        .mutate(json!({ "vendor": "Acme", "invoice_number": "INV-1", "amount": 99 }))
        .await
        .unwrap();

    let items = client.list(&invoices).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], created["id"]);
}

#[tokio::test]
async fn deleted_record_leaves_the_list() {
    let srv = TestServer::spawn().await;
    let client = signed_in(&srv).await;
    let leads = client.resource("crm", "leads").unwrap();
    let toasts = ToastQueue::new();

    let mut form = client.form(&leads);
    for def in leads.fields.iter().filter(|f| f.required) {
        form.set(def.name, "x");
    }
    let created = form.submit(&client.create(&leads), &toasts).await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(client.list(&leads).await.unwrap().len(), 1);

    assert_eq!(client.delete(&leads, &id).mutate(json!(null)).await.unwrap(), json!(null));
    assert!(client.list(&leads).await.unwrap().is_empty());
}

#[tokio::test]
async fn transitions_reach_their_target_status() {
    let srv = TestServer::spawn().await;
    let client = signed_in(&srv).await;
    let invoices = client.resource("ap", "invoices").unwrap();

    let created = client
        .create(&invoices)
        .mutate(json!({ "vendor": "Acme", "invoice_number": "INV-2", "amount": "10" }))
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    // Prime the item cache so the transition has something to invalidate.
    assert_eq!(client.get(&invoices, id).await.unwrap()["status"], "Draft");

    let err = client.transition(&invoices, id, "approve").mutate(json!(null)).await.unwrap_err();
    assert!(matches!(err, ClientError::Http { status: 409, .. }));

    client.transition(&invoices, id, "submit").mutate(json!(null)).await.unwrap();
    let approve = client.transition(&invoices, id, "approve");
    let first = approve.mutate(json!(null)).await.unwrap();
    let second = approve.mutate(json!(null)).await.unwrap();
    assert_eq!(first["status"], "Approved");
    assert_eq!(second["status"], first["status"]);

    assert_eq!(client.get(&invoices, id).await.unwrap()["status"], "Approved");
    assert_eq!(client.list(&invoices).await.unwrap()[0]["status"], "Approved");
}

#[tokio::test]
async fn required_field_left_empty_sends_no_request() {
    let srv = TestServer::spawn().await;
    let client = signed_in(&srv).await;
    let invoices = client.resource("ap", "invoices").unwrap();
    let toasts = ToastQueue::new();

    let mut form = client.form(&invoices);
    form.set("vendor", "Acme");
    form.set("amount", "10");

    let err = form.submit(&client.create(&invoices), &toasts).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(form.phase(), FormPhase::Error);
    assert!(client.list(&invoices).await.unwrap().is_empty());
}

#[tokio::test]
async fn expense_line_entry_end_to_end() {
    let srv = TestServer::spawn().await;
    let client = signed_in(&srv).await;
    let expenses = client.resource("expenses", "lines").unwrap();
    let toasts = ToastQueue::new();

    let mut lines = client.line_items(&expenses, "amount");
    {
        let row = lines.row_mut(0).unwrap();
        row.set("description", "Client dinner");
        row.set("amount", "125.50");
    }
    assert_eq!(lines.formatted_total(), "$125.50");

    assert_eq!(lines.submit(&client.create(&expenses), &toasts).await.unwrap(), 1);
    assert_eq!(lines.len(), 1);
    assert!(lines.is_empty());
    assert_eq!(toasts.latest(), Some(Toast::success("Saved 1 line")));

    let items = client.list(&expenses).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["amount"], json!(125.5));
    assert_eq!(items[0]["status"], "Draft");
}

#[tokio::test]
async fn list_view_follows_mutations() {
    let srv = TestServer::spawn().await;
    let client = signed_in(&srv).await;
    let ledger_sets = client.resource("gl", "ledger-sets").unwrap();

    let mut view = client.list_view(&ledger_sets);
    assert!(view.load().await.unwrap().is_empty());

    client
        .create(&ledger_sets)
        .mutate(json!({ "name": "Primary", "currency": "USD" }))
        .await
        .unwrap();

    // Skip the update from the initial load, then pick up the invalidation.
    loop {
        let items = view.wait_for_change().await.unwrap().unwrap();
        if !items.is_empty() {
            break;
        }
    }
    assert_eq!(view.items()[0]["name"], "Primary");
}

#[tokio::test]
async fn logout_clears_the_session() {
    let srv = TestServer::spawn().await;
    let client = signed_in(&srv).await;
    let invoices = client.resource("ap", "invoices").unwrap();
    client.list(&invoices).await.unwrap();

    client.logout();
    assert!(client.transport().token().is_none());
    assert_eq!(client.list(&invoices).await.unwrap_err(), ClientError::Unauthorized);

    client.login("clerk@example.com", "password123").await.unwrap();
    assert!(client.list(&invoices).await.unwrap().is_empty());
}
