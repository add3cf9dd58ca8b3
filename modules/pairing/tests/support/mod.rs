//! In-memory implementations of every pairing port.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

use pairing::contract::client::PairingApi;
use pairing::contract::couple_id::CoupleId;
use pairing::contract::model::{MatchRequest, MatchRequestStatus, User};
use pairing::domain::repo::{
    Couple, CoupleLocks, CoupleRepository, FormCouple, FormOutcome, InsertOutcome, ListFilter,
    MatchRequestRepository, PurgeEntry, PurgeIntent, PurgeJournal, SharedDataPurger,
    UsersRepository,
};
use pairing::domain::service::{Service, ServiceConfig, Stores};
use pairing::gateways::local::PairingLocalClient;
use pairing::infra::locks::LocalCoupleLocks;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    /// Insertion order, oldest first.
    requests: Vec<MatchRequest>,
    couples: HashMap<CoupleId, Couple>,
    journal: Vec<PurgeEntry>,
}

/// One store behind every persistence port, so that `form` and `dissolve`
/// are atomic the same way the database transactions are.
#[derive(Default)]
pub struct MemStore {
    state: Mutex<State>,
    fail_form: AtomicBool,
    hide_pending: AtomicBool,
    form_gate: Mutex<Option<Arc<FormGate>>>,
}

/// Parks one `form` call until the test lets it through.
#[derive(Default)]
pub struct FormGate {
    entered: Notify,
    release: Notify,
}

impl FormGate {
    /// Resolves once the gated `form` call is parked.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn open(&self) {
        self.release.notify_one();
    }
}

impl MemStore {
    pub fn add_user(&self, email: &str, display_name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let user = User {
            id,
            email: email.to_string(),
            display_name: display_name.to_string(),
            couple_id: None,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().users.insert(id, user);
        id
    }

    pub fn remove_user(&self, id: Uuid) {
        self.state.lock().unwrap().users.remove(&id);
    }

    pub fn user(&self, id: Uuid) -> User {
        self.state.lock().unwrap().users[&id].clone()
    }

    pub fn request(&self, id: Uuid) -> Option<MatchRequest> {
        let state = self.state.lock().unwrap();
        state.requests.iter().find(|r| r.id == id).cloned()
    }

    pub fn couple(&self, id: &CoupleId) -> Option<Couple> {
        self.state.lock().unwrap().couples.get(id).cloned()
    }

    pub fn journal_entries(&self) -> Vec<PurgeEntry> {
        self.state.lock().unwrap().journal.clone()
    }

    /// Make the next `form` calls fail before anything is written.
    pub fn fail_form(&self, fail: bool) {
        self.fail_form.store(fail, Ordering::SeqCst);
    }

    /// Make `pending_exists` always answer false, so only the insert
    /// constraint stands between two identical sends.
    pub fn hide_pending(&self, hide: bool) {
        self.hide_pending.store(hide, Ordering::SeqCst);
    }

    /// Park the next `form` call before it touches any state.
    pub fn gate_next_form(&self) -> Arc<FormGate> {
        let gate = Arc::new(FormGate::default());
        *self.form_gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait::async_trait]
impl UsersRepository for MemStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.lock().unwrap().users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .values()
            .find(|u| u.email.to_lowercase() == email.to_lowercase())
            .cloned())
    }
}

#[async_trait::async_trait]
impl MatchRequestRepository for MemStore {
    async fn insert_pending(&self, req: MatchRequest) -> Result<InsertOutcome> {
        let mut state = self.state.lock().unwrap();
        let clash = state.requests.iter().any(|r| {
            r.is_pending() && r.sender_id == req.sender_id && r.receiver_id == req.receiver_id
        });
        if clash {
            return Ok(InsertOutcome::DuplicatePending);
        }
        state.requests.push(req);
        Ok(InsertOutcome::Inserted)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MatchRequest>> {
        Ok(self.request(id))
    }

    async fn pending_exists(&self, sender: Uuid, receiver: Uuid) -> Result<bool> {
        if self.hide_pending.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .requests
            .iter()
            .any(|r| r.is_pending() && r.sender_id == sender && r.receiver_id == receiver))
    }

    async fn list_by_sender(
        &self,
        sender: Uuid,
        filter: ListFilter,
    ) -> Result<(Vec<MatchRequest>, u64)> {
        Ok(self.list(|r| r.sender_id == sender, filter))
    }

    async fn list_by_receiver(
        &self,
        receiver: Uuid,
        filter: ListFilter,
    ) -> Result<(Vec<MatchRequest>, u64)> {
        Ok(self.list(|r| r.receiver_id == receiver, filter))
    }

    async fn decline(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state.requests.iter_mut().find(|r| r.id == id && r.is_pending()) {
            Some(r) => {
                r.status = MatchRequestStatus::Declined;
                r.updated_at = at;
                r.responded_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_pending(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let before = state.requests.len();
        state.requests.retain(|r| !(r.id == id && r.is_pending()));
        Ok(state.requests.len() < before)
    }
}

impl MemStore {
    fn list(
        &self,
        pred: impl Fn(&MatchRequest) -> bool,
        filter: ListFilter,
    ) -> (Vec<MatchRequest>, u64) {
        let state = self.state.lock().unwrap();
        let mut matching: Vec<MatchRequest> = state
            .requests
            .iter()
            .rev()
            .filter(|r| pred(r))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        // stable: equal timestamps keep newest-inserted first
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect();
        (items, total)
    }
}

#[async_trait::async_trait]
impl CoupleRepository for MemStore {
    async fn form(&self, form: FormCouple) -> Result<FormOutcome> {
        let gate = self.form_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.fail_form.load(Ordering::SeqCst) {
            anyhow::bail!("user store unavailable");
        }
        let mut state = self.state.lock().unwrap();
        let couple = form.couple;

        let unfinished = state
            .journal
            .iter()
            .any(|e| e.intent.couple_id == couple.id && e.completed_at.is_none());
        if unfinished {
            return Ok(FormOutcome::PurgePending);
        }

        let Some(idx) = state
            .requests
            .iter()
            .position(|r| r.id == couple.request_id && r.is_pending())
        else {
            return Ok(FormOutcome::RequestNotPending);
        };

        let (a, b) = couple.id.members();
        for member in [a, b] {
            match state.users.get(&member) {
                Some(u) if u.couple_id.is_none() => {}
                _ => return Ok(FormOutcome::MemberUnavailable(member)),
            }
        }

        let req = &mut state.requests[idx];
        req.status = MatchRequestStatus::Accepted;
        req.updated_at = form.responded_at;
        req.responded_at = Some(form.responded_at);
        for member in [a, b] {
            if let Some(u) = state.users.get_mut(&member) {
                u.couple_id = Some(couple.id.clone());
            }
        }
        state.couples.insert(couple.id.clone(), couple);
        Ok(FormOutcome::Formed)
    }

    async fn find_by_id(&self, id: &CoupleId) -> Result<Option<Couple>> {
        Ok(self.couple(id))
    }

    async fn dissolve(&self, intent: &PurgeIntent) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.couples.remove(&intent.couple_id).is_none() {
            return Ok(false);
        }
        for u in state.users.values_mut() {
            if u.couple_id.as_ref() == Some(&intent.couple_id) {
                u.couple_id = None;
            }
        }
        state.journal.push(PurgeEntry::from(intent.clone()));
        Ok(true)
    }
}

#[async_trait::async_trait]
impl PurgeJournal for MemStore {
    async fn record_step(&self, journal_id: Uuid, store: &str, purged: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .journal
            .iter_mut()
            .find(|e| e.intent.journal_id == journal_id)
            .ok_or_else(|| anyhow::anyhow!("journal {journal_id} not found"))?;
        entry.purged.insert(store.to_string(), purged);
        Ok(())
    }

    async fn complete(&self, journal_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state
            .journal
            .iter_mut()
            .find(|e| e.intent.journal_id == journal_id)
        {
            entry.completed_at.get_or_insert(at);
        }
        Ok(())
    }

    async fn find(&self, journal_id: Uuid) -> Result<Option<PurgeEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .journal
            .iter()
            .find(|e| e.intent.journal_id == journal_id)
            .cloned())
    }

    async fn list_incomplete(&self) -> Result<Vec<PurgeEntry>> {
        let state = self.state.lock().unwrap();
        let mut pending: Vec<PurgeEntry> = state
            .journal
            .iter()
            .filter(|e| e.completed_at.is_none())
            .cloned()
            .collect();
        pending.sort_by_key(|e| e.intent.requested_at);
        Ok(pending)
    }
}

/// A couple-scoped store holding record counts per couple id.
pub struct MemShared {
    kind: &'static str,
    records: Mutex<HashMap<CoupleId, u64>>,
    failing: AtomicBool,
}

impl MemShared {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            records: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn add(&self, couple_id: &CoupleId, n: u64) {
        *self
            .records
            .lock()
            .unwrap()
            .entry(couple_id.clone())
            .or_default() += n;
    }

    pub fn count(&self, couple_id: &CoupleId) -> u64 {
        self.records
            .lock()
            .unwrap()
            .get(couple_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl SharedDataPurger for MemShared {
    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn purge_by_couple(&self, couple_id: &CoupleId) -> Result<u64> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("{} store unavailable", self.kind);
        }
        Ok(self.records.lock().unwrap().remove(couple_id).unwrap_or(0))
    }
}

/// Everything a test needs, wired the way `PairingModule` wires production.
pub struct Harness {
    pub store: Arc<MemStore>,
    pub events: Arc<MemShared>,
    pub photos: Arc<MemShared>,
    pub locks: Arc<LocalCoupleLocks>,
    pub service: Arc<Service>,
    pub client: Arc<dyn PairingApi>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(ServiceConfig::default(), Duration::from_secs(5))
    }

    pub fn with(config: ServiceConfig, lock_wait: Duration) -> Self {
        let store = Arc::new(MemStore::default());
        let events = Arc::new(MemShared::new("events"));
        let photos = Arc::new(MemShared::new("photos"));
        let locks = Arc::new(LocalCoupleLocks::new(lock_wait));

        let stores = Stores {
            users: store.clone(),
            requests: store.clone(),
            couples: store.clone(),
            journal: store.clone(),
        };
        let purgers: Vec<Arc<dyn SharedDataPurger>> = vec![events.clone(), photos.clone()];
        let service = Arc::new(Service::new(
            stores,
            purgers,
            locks.clone() as Arc<dyn CoupleLocks>,
            config,
        ));
        let client: Arc<dyn PairingApi> = Arc::new(PairingLocalClient::new(service.clone()));

        Self {
            store,
            events,
            photos,
            locks,
            service,
            client,
        }
    }
}
