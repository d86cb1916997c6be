use crate::errors::QueryError;
use crate::model::{QueryRequest, VariableResult};
use crate::store::{PointStore, PointStoreError};
use airgrid_core::ValidationError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct QueryService {
    store: Arc<dyn PointStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn PointStore>) -> Self {
        Self { store }
    }

    /// Looks up every requested variable concurrently.
    ///
    /// Results come back in request order. The first failing lookup cancels
    /// the others and is the only error returned; there is no partial result.
    /// Cancelling `cancel` abandons all lookups.
    pub async fn get_variables(
        &self,
        request: &QueryRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<VariableResult>, QueryError> {
        if request.variables.is_empty() {
            return Err(ValidationError::EmptyVariableList.into());
        }

        let scope = cancel.child_token();
        let _scope_guard = scope.clone().drop_guard();
        let mut slots: Vec<Option<VariableResult>> =
            (0..request.variables.len()).map(|_| None).collect();
        let mut lookups = JoinSet::new();

        for (index, variable) in request.variables.iter().enumerate() {
            let store = Arc::clone(&self.store);
            let scope = scope.clone();
            let variable = variable.clone();
            let (time, lat, lon) = (request.time, request.lat, request.lon);
            lookups.spawn(async move {
                let outcome = tokio::select! {
                    biased;
                    _ = scope.cancelled() => Err(QueryError::Cancelled),
                    found = lookup(store.as_ref(), variable, time, lat, lon) => found,
                };
                (index, outcome)
            });
        }

        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    lookups.abort_all();
                    return Err(QueryError::Cancelled);
                }
                joined = lookups.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };

            let failure = match joined {
                Ok((index, Ok(result))) => {
                    slots[index] = Some(result);
                    continue;
                }
                Ok((_, Err(err))) => err,
                Err(join_err) => QueryError::Task(join_err.to_string()),
            };
            scope.cancel();
            lookups.abort_all();
            warn!(error = %failure, kind = failure.kind(), "query aborted");
            return Err(failure);
        }

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| QueryError::Task("lookup finished without a result".to_string()))
    }
}

async fn lookup(
    store: &dyn PointStore,
    variable: String,
    time: DateTime<Utc>,
    lat: f64,
    lon: f64,
) -> Result<VariableResult, QueryError> {
    match store.get_value(&variable, time, lat, lon).await {
        Ok(grid) => {
            debug!(variable = %variable, sample_time = %grid.timestamp, "variable resolved");
            Ok(VariableResult::new(variable, grid))
        }
        Err(PointStoreError::NotFound) => Err(QueryError::VariableNotFound {
            variable,
            timestamp: time,
            lat,
            lon,
        }),
        Err(source) => Err(QueryError::Infrastructure { variable, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPointStore;
    use crate::model::GridValue;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 12, 12, 0, 0)
            .single()
            .expect("time")
    }

    fn grid(value: f64) -> GridValue {
        GridValue {
            value,
            unit: "ug/m3".to_string(),
            lat: 52.25,
            lon: 21.0,
            timestamp: Utc
                .with_ymd_and_hms(2025, 3, 12, 8, 0, 0)
                .single()
                .expect("time"),
            catalog_id: Uuid::from_u128(7),
        }
    }

    fn request(names: &[&str]) -> QueryRequest {
        QueryRequest::new(
            52.23,
            21.01,
            noon(),
            names.iter().map(|name| name.to_string()).collect(),
        )
        .expect("request")
    }

    enum Scripted {
        Value { delay: Duration, value: f64 },
        Missing { delay: Duration },
        Broken,
    }

    /// Answers per variable after a scripted delay and counts finished lookups.
    struct ScriptedStore {
        script: HashMap<&'static str, Scripted>,
        completed: AtomicUsize,
    }

    impl ScriptedStore {
        fn new(script: Vec<(&'static str, Scripted)>) -> Arc<Self> {
            Arc::new(Self {
                script: script.into_iter().collect(),
                completed: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PointStore for ScriptedStore {
        async fn get_value(
            &self,
            variable: &str,
            _timestamp: DateTime<Utc>,
            _lat: f64,
            _lon: f64,
        ) -> Result<GridValue, PointStoreError> {
            let outcome = match self.script.get(variable) {
                Some(Scripted::Value { delay, value }) => {
                    tokio::time::sleep(*delay).await;
                    Ok(grid(*value))
                }
                Some(Scripted::Missing { delay }) => {
                    tokio::time::sleep(*delay).await;
                    Err(PointStoreError::NotFound)
                }
                Some(Scripted::Broken) => {
                    Err(PointStoreError::Backend("connection refused".to_string()))
                }
                None => Err(PointStoreError::NotFound),
            };
            self.completed.fetch_add(1, Ordering::SeqCst);
            outcome
        }
    }

    #[tokio::test]
    async fn results_follow_request_order_not_completion_order() {
        let store = ScriptedStore::new(vec![
            ("a", Scripted::Value { delay: Duration::from_millis(90), value: 1.0 }),
            ("b", Scripted::Value { delay: Duration::from_millis(40), value: 2.0 }),
            ("c", Scripted::Value { delay: Duration::from_millis(1), value: 3.0 }),
        ]);
        let service = QueryService::new(store);

        let results = service
            .get_variables(&request(&["a", "b", "c"]), &CancellationToken::new())
            .await
            .expect("all resolve");

        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        let values: Vec<_> = results.iter().map(|r| r.value).collect();
        assert_eq!(values, [1.0, 2.0, 3.0]);
        assert_eq!(results[0].catalog_id, Uuid::from_u128(7));
    }

    #[tokio::test]
    async fn one_missing_variable_fails_the_whole_query() {
        let store = ScriptedStore::new(vec![
            ("a", Scripted::Value { delay: Duration::from_millis(1), value: 1.0 }),
            ("b", Scripted::Missing { delay: Duration::from_millis(5) }),
        ]);
        let service = QueryService::new(store);

        let err = service
            .get_variables(&request(&["a", "b"]), &CancellationToken::new())
            .await
            .expect_err("b is missing");

        match err {
            QueryError::VariableNotFound {
                variable,
                timestamp,
                lat,
                lon,
            } => {
                assert_eq!(variable, "b");
                assert_eq!(timestamp, noon());
                assert_eq!((lat, lon), (52.23, 21.01));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_failure_cancels_slow_siblings() {
        let store = ScriptedStore::new(vec![
            ("slow", Scripted::Value { delay: Duration::from_secs(30), value: 1.0 }),
            ("broken", Scripted::Broken),
        ]);
        let service = QueryService::new(store.clone());

        let started = std::time::Instant::now();
        let err = service
            .get_variables(&request(&["slow", "broken"]), &CancellationToken::new())
            .await
            .expect_err("backend failure");

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(err.kind(), "infrastructure_error");
        assert!(matches!(
            err,
            QueryError::Infrastructure { ref variable, source: PointStoreError::Backend(_) } if variable == "broken"
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_variable_list_is_rejected_before_any_lookup() {
        let store = ScriptedStore::new(Vec::new());
        let service = QueryService::new(store.clone());
        let request = QueryRequest {
            lat: 0.0,
            lon: 0.0,
            time: noon(),
            variables: Vec::new(),
        };

        let err = service
            .get_variables(&request, &CancellationToken::new())
            .await
            .expect_err("empty list");

        assert!(matches!(
            err,
            QueryError::Validation(ValidationError::EmptyVariableList)
        ));
        assert_eq!(store.completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn duplicate_variables_each_get_a_slot() {
        let store = ScriptedStore::new(vec![
            ("a", Scripted::Value { delay: Duration::from_millis(1), value: 1.0 }),
            ("b", Scripted::Value { delay: Duration::from_millis(1), value: 2.0 }),
        ]);
        let service = QueryService::new(store.clone());

        let results = service
            .get_variables(&request(&["a", "b", "a"]), &CancellationToken::new())
            .await
            .expect("resolve");

        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "a"]);
        assert_eq!(store.completed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn caller_cancellation_abandons_lookups() {
        let store = ScriptedStore::new(vec![(
            "slow",
            Scripted::Value { delay: Duration::from_secs(30), value: 1.0 },
        )]);
        let service = QueryService::new(store);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = service
            .get_variables(&request(&["slow"]), &cancel)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, QueryError::Cancelled));
    }

    #[tokio::test]
    async fn works_against_the_memory_store() {
        let store = Arc::new(MemoryPointStore::new());
        store.insert("pm2p5", grid(11.5));
        store.insert("pm10", grid(20.0));
        let service = QueryService::new(store);

        let results = service
            .get_variables(&request(&["pm10", "pm2p5"]), &CancellationToken::new())
            .await
            .expect("resolve");

        assert_eq!(results[0].name, "pm10");
        assert_eq!(results[0].value, 20.0);
        assert_eq!(results[1].value, 11.5);
        assert_eq!(results[1].unit, "ug/m3");
    }
}
