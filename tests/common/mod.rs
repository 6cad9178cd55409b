//! MySQL testcontainers harness shared by the scenario tests below.

use sqlx::MySqlPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::mysql::Mysql;

use lhm::adapter::SqlxAdapter;

/// A disposable MySQL container plus a connected pool/adapter. Dropping this
/// tears down the container.
pub struct TestDb {
    pub pool: MySqlPool,
    _container: ContainerAsync<Mysql>,
}

impl TestDb {
    pub async fn new() -> Self {
        let container = Mysql::default()
            .start()
            .await
            .expect("failed to start mysql container");
        let port = container
            .get_host_port_ipv4(3306)
            .await
            .expect("failed to get mapped port");
        let url = format!("mysql://root@127.0.0.1:{port}/test");

        let pool = Self::connect_with_retry(&url, 20).await;
        Self {
            pool,
            _container: container,
        }
    }

    async fn connect_with_retry(url: &str, attempts: u32) -> MySqlPool {
        let mut last_err = None;
        for _ in 0..attempts {
            match MySqlPool::connect(url).await {
                Ok(pool) => return pool,
                Err(e) => {
                    last_err = Some(e);
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                }
            }
        }
        panic!("could not connect to mysql container: {:?}", last_err);
    }

    pub fn adapter(&self) -> SqlxAdapter {
        SqlxAdapter::new(self.pool.clone())
    }

    pub async fn execute(&self, sql: &str) {
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .unwrap_or_else(|e| panic!("statement failed: {sql}: {e}"));
    }

    pub async fn count(&self, table: &str) -> i64 {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM `{table}`"))
            .fetch_one(&self.pool)
            .await
            .unwrap();
        row.0
    }

    pub async fn trigger_exists(&self, name: &str) -> bool {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM information_schema.triggers WHERE trigger_schema = DATABASE() AND trigger_name = ?",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .unwrap();
        row.0 > 0
    }

    pub async fn table_exists(&self, name: &str) -> bool {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = ?",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .unwrap();
        row.0 > 0
    }
}
