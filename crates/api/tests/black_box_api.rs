use reqwest::StatusCode;
use serde_json::{Value, json};

use remitflow_infra::PipelineConfig;

const FILE_IBAN: &str = "ES9121000418450200051332";
const DIRECTORY_IBAN: &str = "ES5700811234560001234567";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let config = PipelineConfig::from_lookup(|_| None).unwrap();
        let app = remitflow_api::app::build_app(&config).expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn seed_provider(&self, tax_id: &str, body: Value) {
        let res = self
            .client
            .put(self.url(&format!("/providers/{tax_id}")))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    async fn upload(&self, filename: &str, rows: &Value, force: bool) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/imports?force={force}")))
            .header("x-filename", filename)
            .body(serde_json::to_vec(rows).unwrap())
            .send()
            .await
            .unwrap()
    }

    async fn resolve(&self, import_id: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/imports/{import_id}/resolutions")))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn norte() -> Value {
    json!({
        "name": "Suministros Norte SL",
        "email": { "mode": "replace", "value": "pagos@norte.es" },
        "address": "Calle Mayor 1",
        "city": "Bilbao",
        "postal_code": "48001",
        "country": "ES",
        "account": DIRECTORY_IBAN,
    })
}

async fn provider_eventually(srv: &TestServer, tax_id: &str, pred: impl Fn(&Value) -> bool) -> Value {
    // Directory writes land asynchronously; poll briefly.
    for _ in 0..100 {
        let res = srv
            .client
            .get(srv.url(&format!("/providers/{tax_id}")))
            .send()
            .await
            .unwrap();
        if res.status() == StatusCode::OK {
            let body: Value = res.json().await.unwrap();
            if pred(&body) {
                return body;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("directory entry for {tax_id} did not reach the expected state");
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn account_conflict_resolved_then_submitted() {
    let srv = TestServer::spawn().await;
    srv.seed_provider("B12345674", norte()).await;

    let rows = json!([
        { "cif": "B12345674", "importe": "120,50", "iban": FILE_IBAN, "factura": "F-1" },
        { "cif": "B12345674", "importe": 80, "iban": FILE_IBAN, "factura": "F-2" },
    ]);
    let res = srv.upload("march.json", &rows, false).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let opened: Value = res.json().await.unwrap();
    let id = opened["id"].as_str().unwrap().to_string();
    assert_eq!(opened["stage"]["state"], "awaiting_resolution");
    assert_eq!(opened["stage"]["conflict"]["category"], "account_conflict");
    assert_eq!(opened["submittable"], false);

    // one group for both records
    let res = srv
        .client
        .get(srv.url(&format!("/imports/{id}/conflict")))
        .send()
        .await
        .unwrap();
    let stage: Value = res.json().await.unwrap();
    let groups = stage["conflict"]["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["record_ids"], json!([1, 2]));

    // submitting early is refused
    let res = srv
        .client
        .post(srv.url(&format!("/imports/{id}/submit")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "unresolved_conflicts");

    let res = srv
        .resolve(
            &id,
            json!({
                "category": "account_conflict",
                "group": groups[0]["key"],
                "decision": { "kind": "use_file_account" },
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let resolved: Value = res.json().await.unwrap();
    assert_eq!(resolved["stage"]["state"], "ready");
    assert_eq!(resolved["submittable"], true);
    assert_eq!(resolved["records"][0]["iban_mismatch"], false);

    let res = srv
        .client
        .post(srv.url(&format!("/imports/{id}/submit")))
        .json(&json!({ "due_date": "2024-04-30" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let submitted: Value = res.json().await.unwrap();
    let batch_id = submitted["batch_id"].as_str().unwrap();

    let batch: Value = srv
        .client
        .get(srv.url(&format!("/batches/{batch_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(batch["total_amount_cents"], 20_050);
    assert_eq!(batch["records"][1]["due_date"], "2024-04-30");

    // the session has ended
    let res = srv
        .client
        .get(srv.url(&format!("/imports/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // the chosen account reached the directory
    provider_eventually(&srv, "B12345674", |p| p["account"] == FILE_IBAN).await;

    // same bytes again: refused, unless forced
    let res = srv.upload("march.json", &rows, false).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "duplicate_import");
    let res = srv.upload("march.json", &rows, true).await;
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn missing_fields_resolved_for_the_whole_stage() {
    let srv = TestServer::spawn().await;

    let rows = json!([
        { "nif": "12345678Z", "amount": 10, "iban": FILE_IBAN },
        { "nif": "12345678Z", "amount": 20, "iban": FILE_IBAN },
    ]);
    let opened: Value = srv.upload("april.json", &rows, false).await.json().await.unwrap();
    let id = opened["id"].as_str().unwrap().to_string();
    assert_eq!(opened["stage"]["conflict"]["category"], "missing_directory_fields");
    let group = opened["stage"]["conflict"]["groups"][0]["key"].clone();

    // a required value left out keeps everything untouched
    let res = srv
        .resolve(
            &id,
            json!({
                "category": "missing_directory_fields",
                "decisions": [{
                    "group": group,
                    "decision": {
                        "kind": "complete_fields",
                        "values": { "name": "Talleres Sur SA", "city": "Sevilla" },
                    },
                }],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "incomplete_resolution");

    let res = srv
        .resolve(
            &id,
            json!({
                "category": "missing_directory_fields",
                "decisions": [{
                    "group": group,
                    "decision": {
                        "kind": "complete_fields",
                        "values": {
                            "name": "Talleres Sur SA",
                            "address": "Av. Andalucia 12",
                            "city": "Sevilla",
                            "postal_code": "41001",
                            "country": "ES",
                            "contact_email": "admin@talleres.es",
                            "payment_account": FILE_IBAN,
                        },
                    },
                }],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let resolved: Value = res.json().await.unwrap();
    assert_eq!(resolved["stage"]["state"], "ready");
    for record in resolved["records"].as_array().unwrap() {
        assert_eq!(record["city"], "Sevilla");
        assert_eq!(record["contact_email"], "admin@talleres.es");
    }

    provider_eventually(&srv, "12345678Z", |p| p["name"] == "Talleres Sur SA").await;
}

#[tokio::test]
async fn manual_edit_fixes_a_blocking_record() {
    let srv = TestServer::spawn().await;
    srv.seed_provider("B12345674", norte()).await;

    let rows = json!([
        { "cif": "B12345674", "amount": 10, "iban": DIRECTORY_IBAN },
        { "amount": 20, "iban": DIRECTORY_IBAN },
    ]);
    let opened: Value = srv.upload("may.json", &rows, false).await.json().await.unwrap();
    let id = opened["id"].as_str().unwrap().to_string();
    assert_eq!(opened["stage"]["state"], "ready");
    assert_eq!(opened["records"][1]["status"], "ERROR");
    assert_eq!(opened["submittable"], false);

    let res = srv
        .client
        .patch(srv.url(&format!("/imports/{id}/records/2")))
        .json(&json!({ "provider_id": "B12345674" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let edited: Value = res.json().await.unwrap();
    assert_eq!(edited["records"][1]["validation_message"], "corrected manually");
    assert_ne!(edited["records"][1]["status"], "ERROR");

    let res = srv
        .client
        .patch(srv.url(&format!("/imports/{id}/records/9")))
        .json(&json!({ "city": "Bilbao" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv
        .client
        .delete(srv.url(&format!("/imports/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn bad_uploads_are_refused() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .post(srv.url("/imports"))
        .body("[]")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv.upload("report.xlsx", &json!([]), false).await;
    assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let res = srv
        .client
        .get(srv.url("/imports/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let notifications: Value = srv
        .client
        .get(srv.url("/notifications"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(notifications["failures"], json!([]));
}

#[tokio::test]
async fn upload_history_lists_refusals_too() {
    let srv = TestServer::spawn().await;
    srv.seed_provider("B12345674", norte()).await;

    let rows = json!([{ "cif": "B12345674", "amount": 10, "iban": DIRECTORY_IBAN }]);
    assert_eq!(srv.upload("june.json", &rows, false).await.status(), StatusCode::CREATED);
    let huge = json!([{ "cif": "B12345674", "amount": 1e300 }]);
    assert_eq!(srv.upload("july.json", &huge, false).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        srv.upload("july.xlsx", &rows, false).await.status(),
        StatusCode::UNSUPPORTED_MEDIA_TYPE
    );

    let log: Value = srv
        .client
        .get(srv.url("/imports/log?limit=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entries = log["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["filename"], "july.xlsx");
    assert_eq!(entries[0]["outcome"], "ERROR");
    assert_eq!(entries[1]["details"], "malformed file: row 1: amount out of range");

    let log: Value = srv
        .client
        .get(srv.url("/imports/log?offset=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(log["entries"][0]["outcome"], "SUCCESS");
    assert_eq!(log["entries"][0]["total_invoices"], 1);
}
