//! In-memory clients for tests
//!
//! The fakes record every call and can be told to fail a call or to lag
//! behind a change for a number of reads, the way a controller applying
//! changes asynchronously does.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tfjuju_client::machine::STATUS_PENDING;
use tfjuju_client::{
    AccessClient, AccessRequest, ClientError, ClientResult, CreateMachineInput, Machine,
    MachineClient, PrincipalKind, RelationshipTuple, StoragePool, StoragePoolClient,
    StoragePoolKey, Tag, TupleFilter, TuplePage,
};

use crate::access::reconcile::Operation;
use crate::provider::Clients;

/// Largest page the fake access client returns
pub const PAGE_SIZE: usize = 2;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessCall {
    Grant(PrincipalKind, Vec<String>),
    Revoke(PrincipalKind, Vec<String>),
    List,
}

#[derive(Default)]
struct AccessState {
    tuples: Vec<RelationshipTuple>,
    calls: Vec<AccessCall>,
    fail_on: Option<(Operation, PrincipalKind)>,
}

#[derive(Default)]
pub struct FakeAccessClient {
    state: Mutex<AccessState>,
}

impl FakeAccessClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store existing grants without recording a call
    pub fn seed(&self, target: &Tag, access: &str, kind: PrincipalKind, ids: &[&str]) {
        let request = AccessRequest {
            target: target.clone(),
            access: access.to_string(),
            principal_kind: kind,
            principals: ids.iter().map(|s| s.to_string()).collect(),
        };
        let mut state = lock(&self.state);
        for tuple in request.tuples() {
            if !state.tuples.contains(&tuple) {
                state.tuples.push(tuple);
            }
        }
    }

    pub fn fail_on(&self, operation: Operation, kind: PrincipalKind) {
        lock(&self.state).fail_on = Some((operation, kind));
    }

    pub fn calls(&self) -> Vec<AccessCall> {
        lock(&self.state).calls.clone()
    }

    /// Grant and revoke calls only
    pub fn mutations(&self) -> Vec<AccessCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, AccessCall::List))
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    pub fn tuples(&self) -> Vec<RelationshipTuple> {
        lock(&self.state).tuples.clone()
    }

    fn apply(&self, operation: Operation, request: &AccessRequest) -> ClientResult<()> {
        let mut state = lock(&self.state);
        let call = match operation {
            Operation::Grant => AccessCall::Grant(request.principal_kind, request.principals.clone()),
            Operation::Revoke => AccessCall::Revoke(request.principal_kind, request.principals.clone()),
        };
        state.calls.push(call);

        if state.fail_on == Some((operation, request.principal_kind)) {
            return Err(ClientError::Remote(format!(
                "{} rejected for {}",
                operation, request.principal_kind
            )));
        }

        for tuple in request.tuples() {
            match operation {
                Operation::Grant if !state.tuples.contains(&tuple) => state.tuples.push(tuple),
                Operation::Grant => {}
                Operation::Revoke => state.tuples.retain(|t| *t != tuple),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AccessClient for FakeAccessClient {
    async fn grant_access(&self, request: &AccessRequest) -> ClientResult<()> {
        self.apply(Operation::Grant, request)
    }

    async fn revoke_access(&self, request: &AccessRequest) -> ClientResult<()> {
        self.apply(Operation::Revoke, request)
    }

    async fn list_relationship_tuples(&self, filter: &TupleFilter) -> ClientResult<TuplePage> {
        let mut state = lock(&self.state);
        state.calls.push(AccessCall::List);

        let offset = match &filter.continuation_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ClientError::InvalidArgument(format!("bad token {:?}", token)))?,
            None => 0,
        };
        let page_size = filter
            .page_size
            .map_or(PAGE_SIZE, |n| (n as usize).min(PAGE_SIZE));

        let matching: Vec<RelationshipTuple> = state
            .tuples
            .iter()
            .filter(|t| t.target_object == filter.target_object)
            .filter(|t| filter.relation.as_ref().is_none_or(|r| *r == t.relation))
            .filter(|t| {
                filter
                    .object_prefix
                    .as_ref()
                    .is_none_or(|p| t.object.starts_with(&format!("{}-", p)))
            })
            .cloned()
            .collect();

        let end = (offset + page_size).min(matching.len());
        let tuples = matching.get(offset..end).unwrap_or_default().to_vec();
        let continuation_token = (end < matching.len()).then(|| end.to_string());

        Ok(TuplePage {
            tuples,
            continuation_token,
        })
    }
}

struct FakePool {
    pool: StoragePool,
    /// Reads that still miss the pool after creation
    hidden_reads: u32,
    /// Reads that still return the old pool after removal
    lingering_reads: Option<u32>,
}

#[derive(Default)]
struct StorageState {
    pools: HashMap<StoragePoolKey, FakePool>,
    lag: u32,
    reads: u32,
    /// Provider reported on reads instead of the stored one
    reported_provider: Option<String>,
}

#[derive(Default)]
pub struct FakeStorageClient {
    state: Mutex<StorageState>,
}

impl FakeStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every change becomes visible only after `reads` reads
    pub fn with_lag(self, reads: u32) -> Self {
        lock(&self.state).lag = reads;
        self
    }

    pub fn report_provider(&self, provider: &str) {
        lock(&self.state).reported_provider = Some(provider.to_string());
    }

    pub fn reads(&self) -> u32 {
        lock(&self.state).reads
    }

    pub fn contains(&self, key: &StoragePoolKey) -> bool {
        lock(&self.state)
            .pools
            .get(key)
            .is_some_and(|p| p.lingering_reads.is_none())
    }
}

#[async_trait]
impl StoragePoolClient for FakeStorageClient {
    async fn create_storage_pool(&self, model_uuid: &str, pool: &StoragePool) -> ClientResult<()> {
        let mut state = lock(&self.state);
        let key = StoragePoolKey {
            model_uuid: model_uuid.to_string(),
            name: pool.name.clone(),
        };
        if state.pools.contains_key(&key) {
            return Err(ClientError::AlreadyExists {
                kind: "storage pool".to_string(),
                name: pool.name.clone(),
            });
        }
        let hidden_reads = state.lag;
        state.pools.insert(
            key,
            FakePool {
                pool: pool.clone(),
                hidden_reads,
                lingering_reads: None,
            },
        );
        Ok(())
    }

    async fn get_storage_pool(&self, key: &StoragePoolKey) -> ClientResult<StoragePool> {
        let mut state = lock(&self.state);
        state.reads += 1;
        let reported_provider = state.reported_provider.clone();

        let not_found = || ClientError::not_found("storage pool", key.name.clone());
        let entry = state.pools.get_mut(key).ok_or_else(not_found)?;

        if entry.hidden_reads > 0 {
            entry.hidden_reads -= 1;
            return Err(not_found());
        }
        match entry.lingering_reads {
            Some(0) => {
                state.pools.remove(key);
                return Err(not_found());
            }
            Some(ref mut n) => *n -= 1,
            None => {}
        }

        let mut pool = entry.pool.clone();
        if let Some(provider) = reported_provider {
            pool.provider = provider;
        }
        Ok(pool)
    }

    async fn update_storage_pool(&self, model_uuid: &str, pool: &StoragePool) -> ClientResult<()> {
        let mut state = lock(&self.state);
        let key = StoragePoolKey {
            model_uuid: model_uuid.to_string(),
            name: pool.name.clone(),
        };
        let entry = state
            .pools
            .get_mut(&key)
            .ok_or_else(|| ClientError::not_found("storage pool", pool.name.clone()))?;
        entry.pool.attributes = pool.attributes.clone();
        Ok(())
    }

    async fn remove_storage_pool(&self, key: &StoragePoolKey) -> ClientResult<()> {
        let mut state = lock(&self.state);
        let lag = state.lag;
        let entry = state
            .pools
            .get_mut(key)
            .ok_or_else(|| ClientError::not_found("storage pool", key.name.clone()))?;
        entry.lingering_reads = Some(lag);
        Ok(())
    }
}

struct FakeMachine {
    machine: Machine,
    pending_reads: u32,
    lingering_reads: Option<u32>,
}

#[derive(Default)]
struct MachineState {
    machines: HashMap<(String, String), FakeMachine>,
    next_id: u32,
    pending_reads: u32,
    destroys: Vec<String>,
}

#[derive(Default)]
pub struct FakeMachineClient {
    state: Mutex<MachineState>,
}

impl FakeMachineClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// New machines report `pending` for this many reads
    pub fn with_pending_reads(self, reads: u32) -> Self {
        lock(&self.state).pending_reads = reads;
        self
    }

    pub fn destroys(&self) -> Vec<String> {
        lock(&self.state).destroys.clone()
    }
}

#[async_trait]
impl MachineClient for FakeMachineClient {
    async fn create_machine(&self, input: &CreateMachineInput) -> ClientResult<String> {
        let mut state = lock(&self.state);
        let machine_id = state.next_id.to_string();
        state.next_id += 1;
        let pending_reads = state.pending_reads;
        state.machines.insert(
            (input.model_uuid.clone(), machine_id.clone()),
            FakeMachine {
                machine: Machine {
                    machine_id: machine_id.clone(),
                    base: input.base.clone().unwrap_or_else(|| "ubuntu@22.04".to_string()),
                    constraints: input.constraints.clone().unwrap_or_default(),
                    status: "started".to_string(),
                    hostname: Some(format!("juju-{}", machine_id)),
                },
                pending_reads,
                lingering_reads: None,
            },
        );
        Ok(machine_id)
    }

    async fn read_machine(&self, model_uuid: &str, machine_id: &str) -> ClientResult<Machine> {
        let mut state = lock(&self.state);
        let key = (model_uuid.to_string(), machine_id.to_string());
        let not_found = || ClientError::not_found("machine", machine_id);
        let entry = state.machines.get_mut(&key).ok_or_else(not_found)?;

        match entry.lingering_reads {
            Some(0) => {
                state.machines.remove(&key);
                return Err(not_found());
            }
            Some(ref mut n) => *n -= 1,
            None => {}
        }

        let mut machine = entry.machine.clone();
        if entry.pending_reads > 0 {
            entry.pending_reads -= 1;
            machine.status = STATUS_PENDING.to_string();
        }
        Ok(machine)
    }

    async fn destroy_machine(&self, model_uuid: &str, machine_id: &str) -> ClientResult<()> {
        let mut state = lock(&self.state);
        state.destroys.push(machine_id.to_string());
        let key = (model_uuid.to_string(), machine_id.to_string());
        let entry = state
            .machines
            .get_mut(&key)
            .ok_or_else(|| ClientError::not_found("machine", machine_id))?;
        entry.lingering_reads = Some(1);
        Ok(())
    }
}

/// Fakes behind the handles a provider is built from
pub struct Fakes {
    pub access: Arc<FakeAccessClient>,
    pub storage: Arc<FakeStorageClient>,
    pub machines: Arc<FakeMachineClient>,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            access: Arc::new(FakeAccessClient::new()),
            storage: Arc::new(FakeStorageClient::new()),
            machines: Arc::new(FakeMachineClient::new()),
        }
    }

    pub fn clients(&self) -> Clients {
        Clients {
            access: Some(self.access.clone()),
            storage: self.storage.clone(),
            machines: self.machines.clone(),
        }
    }

    /// Clients of a plain controller, without JAAS
    pub fn controller_clients(&self) -> Clients {
        Clients {
            access: None,
            ..self.clients()
        }
    }
}
