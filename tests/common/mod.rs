//! Shared fixtures: a programmable in-process ledger and a fully wired
//! service stack on the in-memory store.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use primitive_types::H256;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cert_anchor::app::anchor::AnchorService;
use cert_anchor::app::workflow::WorkflowService;
use cert_anchor::domain::ledger::{
    AnchorReceipt, AnchorRequest, BatchAnchorRequest, LedgerError, LedgerGateway, LedgerRecord,
    LedgerStats,
};
use cert_anchor::domain::model::{Actor, NewApplication, Role};
use cert_anchor::domain::verify::VerificationService;
use cert_anchor::infra::render::TextCertificateRenderer;
use cert_anchor::domain::model::{Application, Certificate};
use cert_anchor::storage::{ApplicationStore, CertificateStore, MemoryStore, WhitelistStore};

/// A ledger that answers from scripted state instead of a chain.
pub struct MockLedger {
    pub available: Mutex<bool>,
    /// Results consumed in order by `submit`/`submit_batch`. When empty, a
    /// default success receipt is produced.
    submit_results: Mutex<VecDeque<Result<AnchorReceipt, LedgerError>>>,
    pub submit_calls: AtomicUsize,
    /// Artificial latency per submission, to widen race windows in tests.
    pub submit_delay: Mutex<Duration>,
    /// Scripted query answers keyed by hash.
    records: Mutex<Vec<LedgerRecord>>,
    pub revoked: Mutex<Vec<(H256, String)>>,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            available: Mutex::new(true),
            submit_results: Mutex::new(VecDeque::new()),
            submit_calls: AtomicUsize::new(0),
            submit_delay: Mutex::new(Duration::from_millis(0)),
            records: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
        })
    }

    pub fn set_available(&self, available: bool) {
        *self.available.lock().unwrap() = available;
    }

    pub fn push_submit_result(&self, result: Result<AnchorReceipt, LedgerError>) {
        self.submit_results.lock().unwrap().push_back(result);
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock().unwrap() = delay;
    }

    pub fn add_record(&self, record: LedgerRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn submit_count(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    fn next_submit_result(&self) -> Result<AnchorReceipt, LedgerError> {
        self.submit_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(AnchorReceipt {
                    tx_hash: "0xabc".to_string(),
                    block_number: 1000,
                })
            })
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn is_available(&self) -> bool {
        *self.available.lock().unwrap()
    }

    fn chain_id(&self) -> String {
        "mock-chain".to_string()
    }

    async fn submit(&self, _req: &AnchorRequest) -> Result<AnchorReceipt, LedgerError> {
        let delay = *self.submit_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.next_submit_result()
    }

    async fn submit_batch(&self, _req: &BatchAnchorRequest) -> Result<AnchorReceipt, LedgerError> {
        let delay = *self.submit_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.next_submit_result()
    }

    async fn query(&self, cert_hash: H256) -> Result<Option<LedgerRecord>, LedgerError> {
        if !*self.available.lock().unwrap() {
            return Err(LedgerError::Unavailable("scripted outage".to_string()));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.cert_hash == cert_hash)
            .cloned())
    }

    async fn revoke(&self, cert_hash: H256, reason: &str) -> Result<String, LedgerError> {
        if !*self.available.lock().unwrap() {
            return Err(LedgerError::Unavailable("scripted outage".to_string()));
        }
        self.revoked
            .lock()
            .unwrap()
            .push((cert_hash, reason.to_string()));
        Ok("0xrevoke".to_string())
    }

    async fn statistics(&self) -> Result<LedgerStats, LedgerError> {
        let records = self.records.lock().unwrap();
        let active = records.iter().filter(|r| r.valid).count() as u64;
        Ok(LedgerStats {
            total: records.len() as u64,
            active,
            revoked: records.len() as u64 - active,
        })
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub ledger: Arc<MockLedger>,
    pub anchors: Arc<AnchorService>,
    pub workflow: Arc<WorkflowService>,
    pub verifier: Arc<VerificationService>,
}

/// Wires the whole stack on the in-memory store. Anchoring is left to
/// explicit triggers so tests control the timing.
pub fn fixture() -> Fixture {
    fixture_with(false, 5)
}

pub fn fixture_with(anchor_immediately: bool, ledger_timeout_secs: u64) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let ledger = MockLedger::new();
    let anchors = AnchorService::new(
        store.clone(),
        ledger.clone(),
        Arc::new(TextCertificateRenderer),
        store.clone(),
        ledger_timeout_secs,
    );
    let workflow = WorkflowService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        anchors.clone(),
        "https://certs.example".to_string(),
        anchor_immediately,
    );
    let verifier = VerificationService::new(store.clone(), ledger.clone(), store.clone());
    Fixture {
        store,
        ledger,
        anchors,
        workflow,
        verifier,
    }
}

pub fn student(user_id: i64) -> Actor {
    Actor {
        user_id,
        role: Role::Student,
        org_code: None,
    }
}

pub fn company_member(user_id: i64, code: &str) -> Actor {
    Actor {
        user_id,
        role: Role::Company,
        org_code: Some(code.to_string()),
    }
}

pub fn university_member(user_id: i64, code: &str) -> Actor {
    Actor {
        user_id,
        role: Role::University,
        org_code: Some(code.to_string()),
    }
}

pub fn admin(user_id: i64) -> Actor {
    Actor {
        user_id,
        role: Role::Admin,
        org_code: None,
    }
}

pub fn new_application(student_id: &str, user_id: i64) -> NewApplication {
    NewApplication {
        student_id: student_id.to_string(),
        student_user_id: user_id,
        student_wallet: None,
        company_code: "C".to_string(),
        position: "Intern".to_string(),
        start_date: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        end_date: Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap(),
        description: "Summer internship".to_string(),
    }
}

/// Whitelists a student under university `U`.
pub async fn whitelist(fx: &Fixture, student_id: &str) {
    WhitelistStore::insert(fx.store.as_ref(), student_id, "U")
        .await
        .unwrap();
}

pub async fn get_cert(fx: &Fixture, id: i64) -> Certificate {
    CertificateStore::get(fx.store.as_ref(), id)
        .await
        .unwrap()
        .expect("certificate exists")
}

pub async fn get_app(fx: &Fixture, id: i64) -> Application {
    ApplicationStore::get(fx.store.as_ref(), id)
        .await
        .unwrap()
        .expect("application exists")
}

/// Runs the full approval pipeline and returns the issued certificate id.
pub async fn issue_certificate(fx: &Fixture, student_id: &str, user_id: i64) -> i64 {
    whitelist(fx, student_id).await;
    let app = fx
        .workflow
        .create_application(&student(user_id), new_application(student_id, user_id))
        .await
        .unwrap();
    fx.workflow
        .submit(&student(user_id), app.id)
        .await
        .unwrap();
    fx.workflow
        .company_approve(&company_member(100, "C"), app.id, 90, Some("Great work".to_string()))
        .await
        .unwrap();
    let (_, cert) = fx
        .workflow
        .university_approve(&university_member(200, "U"), app.id, None)
        .await
        .unwrap();
    cert.id
}
