//! In-memory registry of container records.
//!
//! Each record sits behind its own mutex, so writers to one container are
//! serialised without blocking writers to any other. The outer lock is
//! only held for insert, remove, and lookup.

use crate::info::ContainerInfo;
use crate::pipeline::Pipeline;
use scm_common::{ContainerId, LifeCycleState, ScmError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

type Entry = Arc<Mutex<ContainerInfo>>;

/// The container manager's table of live containers.
#[derive(Debug)]
pub struct ContainerMap {
    containers: RwLock<BTreeMap<ContainerId, Entry>>,
    next_id: AtomicI64,
}

impl ContainerMap {
    /// Create an empty map whose first allocated id is `first_container_id`.
    pub fn new(first_container_id: i64) -> Self {
        Self {
            containers: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(first_container_id),
        }
    }

    /// Register a new OPEN container on `pipeline` and return a snapshot.
    pub async fn allocate(
        &self,
        pipeline: Arc<Pipeline>,
        owner: Option<String>,
        state_enter_time: i64,
    ) -> Result<ContainerInfo, ScmError> {
        let id = self
            .next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| id.checked_add(1))
            .map_err(|_| ScmError::InvalidArgument("container id space exhausted".into()))?;
        let info = ContainerInfo::builder(pipeline)
            .container_id(id)
            .state(LifeCycleState::Open)
            .state_enter_time(state_enter_time)
            .optional_owner(owner)
            .build()?;

        self.insert(info.clone()).await?;
        scm_metrics::metrics().containers_allocated.inc();
        tracing::debug!(
            "allocated container {} on pipeline {}",
            info.container_id(),
            info.pipeline().id()
        );
        Ok(info)
    }

    /// Add an existing record, e.g. one received from a peer.
    pub async fn insert(&self, info: ContainerInfo) -> Result<(), ScmError> {
        let id = info.container_id();
        let mut containers = self.containers.write().await;
        if containers.contains_key(&id) {
            return Err(ScmError::ContainerExists(id));
        }
        containers.insert(id, Arc::new(Mutex::new(info)));
        // Keep allocation ahead of anything inserted by hand. The last id
        // leaves the counter at i64::MAX, which allocate treats as exhausted.
        let after = id.next().map_or(i64::MAX, |next| next.get());
        self.next_id.fetch_max(after, Ordering::SeqCst);
        scm_metrics::metrics()
            .containers_tracked
            .set(containers.len() as i64);
        Ok(())
    }

    /// Drop a record from the map, returning it.
    pub async fn remove(&self, id: ContainerId) -> Result<ContainerInfo, ScmError> {
        let entry = {
            let mut containers = self.containers.write().await;
            let entry = containers
                .remove(&id)
                .ok_or(ScmError::ContainerNotFound(id))?;
            scm_metrics::metrics()
                .containers_tracked
                .set(containers.len() as i64);
            entry
        };
        tracing::debug!("removed container {}", id);
        let info = entry.lock().await;
        Ok(info.clone())
    }

    async fn entry(&self, id: ContainerId) -> Result<Entry, ScmError> {
        self.containers
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ScmError::ContainerNotFound(id))
    }

    /// Snapshot of one record.
    pub async fn get(&self, id: ContainerId) -> Result<ContainerInfo, ScmError> {
        let entry = self.entry(id).await?;
        let info = entry.lock().await;
        Ok(info.clone())
    }

    /// Run `f` against the record while holding its lock.
    pub async fn update<F, T>(&self, id: ContainerId, f: F) -> Result<T, ScmError>
    where
        F: FnOnce(&mut ContainerInfo) -> T,
    {
        let entry = self.entry(id).await?;
        let mut info = entry.lock().await;
        Ok(f(&mut *info))
    }

    /// Move a container to `state`. The caller is responsible for checking
    /// that the transition is legal.
    pub async fn update_state(
        &self,
        id: ContainerId,
        state: LifeCycleState,
    ) -> Result<LifeCycleState, ScmError> {
        let previous = self
            .update(id, |info| {
                let previous = info.state();
                info.set_state(state);
                previous
            })
            .await?;
        tracing::debug!("container {} state {} -> {}", id, previous, state);
        Ok(previous)
    }

    /// Add `delta` to the container's allocated bytes, returning the new total.
    pub async fn update_allocated_bytes(
        &self,
        id: ContainerId,
        delta: i64,
    ) -> Result<i64, ScmError> {
        self.update(id, |info| {
            info.update_allocated_bytes(delta);
            info.allocated_bytes()
        })
        .await
    }

    /// Apply a delete transaction id, returning the id now stored.
    pub async fn merge_delete_transaction_id(
        &self,
        id: ContainerId,
        transaction_id: i64,
    ) -> Result<i64, ScmError> {
        self.update(id, |info| {
            info.merge_delete_transaction_id(transaction_id);
            info.delete_transaction_id()
        })
        .await
    }

    /// Mark the container as used now.
    pub async fn touch(&self, id: ContainerId) -> Result<(), ScmError> {
        self.update(id, ContainerInfo::touch).await
    }

    /// Up to `count` records with id >= `start`, in ascending id order.
    pub async fn list(&self, start: ContainerId, count: usize) -> Vec<ContainerInfo> {
        let entries: Vec<Entry> = {
            let containers = self.containers.read().await;
            containers
                .range(start..)
                .take(count)
                .map(|(_, e)| e.clone())
                .collect()
        };
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            out.push(entry.lock().await.clone());
        }
        out
    }

    /// Records in `state` belonging to `owner`, least recently used first.
    pub async fn least_recently_used(
        &self,
        state: LifeCycleState,
        owner: Option<&str>,
    ) -> Vec<ContainerInfo> {
        let entries: Vec<Entry> = self.containers.read().await.values().cloned().collect();
        let mut matching = Vec::new();
        for entry in entries {
            let info = entry.lock().await;
            if info.state() == state && info.owner() == owner {
                matching.push(info.clone());
            }
        }
        matching.sort_by(|a, b| a.cmp_last_used(b));
        matching
    }

    /// Number of containers currently tracked.
    pub async fn len(&self) -> usize {
        self.containers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.containers.read().await.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::DatanodeDetails;
    use scm_common::{DatanodeId, PipelineId, ReplicationFactor, ReplicationType};
    use tokio::time::Duration;

    fn pipeline() -> Arc<Pipeline> {
        Arc::new(Pipeline::new(
            PipelineId::random(),
            ReplicationFactor::One,
            ReplicationType::StandAlone,
            vec![DatanodeDetails::with_dummy_addr(DatanodeId::random())],
        ))
    }

    #[tokio::test]
    async fn test_allocate_assigns_sequential_ids() {
        let map = ContainerMap::new(1);
        let p = pipeline();
        let a = map.allocate(p.clone(), Some("ozone".into()), 10).await.unwrap();
        let b = map.allocate(p.clone(), None, 11).await.unwrap();

        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert_eq!(a.state(), LifeCycleState::Open);
        assert_eq!(a.state_enter_time(), 10);
        assert_eq!(a.owner(), Some("ozone"));
        assert!(Arc::ptr_eq(a.pipeline(), &p));
        assert_eq!(map.len().await, 2);
    }

    #[tokio::test]
    async fn test_insert_duplicate_and_id_bump() {
        let map = ContainerMap::new(1);
        let info = ContainerInfo::builder(pipeline())
            .container_id(50)
            .build()
            .unwrap();
        map.insert(info.clone()).await.unwrap();
        let err = map.insert(info).await.unwrap_err();
        assert!(matches!(err, ScmError::ContainerExists(id) if id.get() == 50));

        let next = map.allocate(pipeline(), None, 0).await.unwrap();
        assert_eq!(next.id(), 51);
    }

    #[tokio::test]
    async fn test_insert_last_id_exhausts_allocation() {
        let map = ContainerMap::new(1);
        let last = ContainerInfo::builder(pipeline())
            .container_id(i64::MAX)
            .build()
            .unwrap();
        map.insert(last).await.unwrap();
        assert_eq!(map.get(ContainerId::new(i64::MAX)).await.unwrap().id(), i64::MAX);

        let err = map.allocate(pipeline(), None, 0).await.unwrap_err();
        assert!(matches!(err, ScmError::InvalidArgument(_)));
        assert_eq!(map.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_and_remove() {
        let map = ContainerMap::new(0);
        let info = map.allocate(pipeline(), None, 0).await.unwrap();
        let id = info.container_id();

        assert_eq!(map.get(id).await.unwrap(), info);
        let removed = map.remove(id).await.unwrap();
        assert_eq!(removed, info);
        assert!(matches!(
            map.get(id).await,
            Err(ScmError::ContainerNotFound(_))
        ));
        assert!(map.remove(id).await.is_err());
        assert!(map.is_empty().await);
    }

    #[tokio::test]
    async fn test_mutations_through_map() {
        let map = ContainerMap::new(0);
        let id = map.allocate(pipeline(), None, 0).await.unwrap().container_id();

        assert_eq!(map.update_allocated_bytes(id, 100).await.unwrap(), 100);
        assert_eq!(map.update_allocated_bytes(id, -130).await.unwrap(), -30);

        assert_eq!(map.merge_delete_transaction_id(id, 7).await.unwrap(), 7);
        assert_eq!(map.merge_delete_transaction_id(id, 3).await.unwrap(), 7);

        let previous = map.update_state(id, LifeCycleState::Closing).await.unwrap();
        assert_eq!(previous, LifeCycleState::Open);
        assert_eq!(map.get(id).await.unwrap().state(), LifeCycleState::Closing);

        let missing = ContainerId::new(999);
        assert!(map.update_allocated_bytes(missing, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_allocations_serialised_per_container() {
        let map = Arc::new(ContainerMap::new(0));
        let id = map.allocate(pipeline(), None, 0).await.unwrap().container_id();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let map = map.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    map.update_allocated_bytes(id, 1).await.unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(map.get(id).await.unwrap().allocated_bytes(), 1600);
    }

    #[tokio::test]
    async fn test_list_range() {
        let map = ContainerMap::new(1);
        for _ in 0..10 {
            map.allocate(pipeline(), None, 0).await.unwrap();
        }
        let ids: Vec<i64> = map
            .list(ContainerId::new(4), 3)
            .await
            .iter()
            .map(|c| c.id())
            .collect();
        assert_eq!(ids, vec![4, 5, 6]);

        assert_eq!(map.list(ContainerId::new(9), 100).await.len(), 2);
        assert!(map.list(ContainerId::new(11), 100).await.is_empty());
    }

    #[tokio::test]
    async fn test_least_recently_used() {
        tokio::time::pause();

        let map = ContainerMap::new(1);
        for _ in 0..3 {
            map.allocate(pipeline(), Some("ozone".into()), 0).await.unwrap();
            tokio::time::advance(Duration::from_millis(5)).await;
        }
        map.allocate(pipeline(), Some("other".into()), 0).await.unwrap();
        map.update_state(ContainerId::new(2), LifeCycleState::Closed)
            .await
            .unwrap();
        map.touch(ContainerId::new(1)).await.unwrap();

        let ids: Vec<i64> = map
            .least_recently_used(LifeCycleState::Open, Some("ozone"))
            .await
            .iter()
            .map(|c| c.id())
            .collect();
        assert_eq!(ids, vec![3, 1]);
    }
}
