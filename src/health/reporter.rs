//! Health snapshot built from live upstream diagnostics.

use std::sync::Arc;

use serde::Serialize;

use crate::session::SessionManager;
use crate::upstream::{UpstreamError, UpstreamResult};

/// Row count for one table.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TableCount {
    pub name: String,
    pub count: i64,
}

/// Liveness/readiness snapshot of the upstream server.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub version: String,
    pub start_time: i64,
    pub read_only: bool,
    pub tables: Vec<TableCount>,
}

/// Exercises the shared session with diagnostic queries.
pub struct HealthReporter {
    manager: Arc<SessionManager>,
}

impl HealthReporter {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    /// Run the full diagnostic sequence: server status, table list, then a
    /// count query per table. Aborts on the first failure; a partial snapshot
    /// is never reported.
    pub async fn snapshot(&self) -> UpstreamResult<HealthSnapshot> {
        let _guard = self.manager.lock_sequence().await;
        let client = self.manager.client();
        let session = self.manager.session().as_str();

        let status = client.get_server_status(session).await?;
        let names = client.get_tables(session).await?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let result = client
                .sql_execute(
                    session,
                    &format!("SELECT COUNT(*) FROM {name}"),
                    true,
                    0,
                    1,
                )
                .await?;
            let count = result.scalar().ok_or_else(|| {
                UpstreamError::Protocol(format!("count query for {name} returned no rows"))
            })?;
            tables.push(TableCount { name, count });
        }

        Ok(HealthSnapshot {
            version: status.version,
            start_time: status.start_time,
            read_only: status.read_only,
            tables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;
    use crate::upstream::{Column, DbClient, ResultSet, ServerStatus};
    use async_trait::async_trait;

    /// Scripted upstream: two tables with fixed row counts.
    struct ScriptedClient {
        fail_tables: bool,
    }

    #[async_trait]
    impl DbClient for ScriptedClient {
        async fn connect(&self, _: &str, _: &str, _: &str) -> UpstreamResult<String> {
            Ok("11112222333344445555666677778888".into())
        }

        async fn disconnect(&self, _: &str) -> UpstreamResult<()> {
            Ok(())
        }

        async fn get_server_status(&self, _: &str) -> UpstreamResult<ServerStatus> {
            Ok(ServerStatus {
                version: "4.1.0".into(),
                start_time: 1714000000,
                read_only: false,
            })
        }

        async fn get_tables(&self, _: &str) -> UpstreamResult<Vec<String>> {
            if self.fail_tables {
                Err(UpstreamError::Exception("Session not valid".into()))
            } else {
                Ok(vec!["t1".into(), "t2".into()])
            }
        }

        async fn sql_execute(
            &self,
            _: &str,
            query: &str,
            _: bool,
            _: i64,
            _: i64,
        ) -> UpstreamResult<ResultSet> {
            let count = if query.contains("t1") { 3 } else { 0 };
            Ok(ResultSet {
                columns: vec![Column {
                    nulls: vec![false],
                    int_data: vec![count],
                }],
            })
        }
    }

    async fn reporter(fail_tables: bool) -> HealthReporter {
        let manager = SessionManager::connect(
            Arc::new(ScriptedClient { fail_tables }),
            &UpstreamConfig::default(),
        )
        .await
        .unwrap();
        HealthReporter::new(Arc::new(manager))
    }

    #[tokio::test]
    async fn test_snapshot_accumulates_per_table_counts() {
        let snapshot = reporter(false).await.snapshot().await.unwrap();
        assert_eq!(snapshot.version, "4.1.0");
        assert_eq!(snapshot.start_time, 1714000000);
        assert!(!snapshot.read_only);
        assert_eq!(
            snapshot.tables,
            vec![
                TableCount {
                    name: "t1".into(),
                    count: 3
                },
                TableCount {
                    name: "t2".into(),
                    count: 0
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_snapshot_json_shape() {
        let snapshot = reporter(false).await.snapshot().await.unwrap();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["tables"][0], serde_json::json!({"name": "t1", "count": 3}));
        assert_eq!(json["read_only"], serde_json::json!(false));
    }

    #[tokio::test]
    async fn test_failure_discards_partial_results() {
        let result = reporter(true).await.snapshot().await;
        assert!(matches!(result, Err(UpstreamError::Exception(_))));
    }
}
