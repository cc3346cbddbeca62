use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use girder_core::{ConnectionFactory, ConnectionKey, EngineConnection, EngineFailure};

use crate::error::ShutdownError;

/// How to tear the pool down.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ShutdownStrategy {
    /// Synchronously close every pooled connection, then reset the factory's
    /// implementation cache.
    Graceful,
    /// Abort in-flight work. Not supported.
    Forceful,
}

/// Identity-keyed cache of open participant connections. The map is the only
/// shared mutable state and every access happens under one lock, including
/// connection creation: concurrent first requests for the same key must
/// observe exactly one factory call.
pub struct ConnectionPool {
    factory: Arc<dyn ConnectionFactory>,
    connections: Mutex<HashMap<ConnectionKey, Arc<dyn EngineConnection>>>,
}

impl ConnectionPool {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            factory,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Return the pooled connection for `key`, opening one through the
    /// factory if none exists yet. Creation happens inside the critical
    /// section; this serializes first-time setup per key but steady-state
    /// reuse of distinct keys never contends on the factory.
    pub fn get_or_create(
        &self,
        key: &ConnectionKey,
    ) -> Result<Arc<dyn EngineConnection>, EngineFailure> {
        let mut connections = self.connections.lock();
        if let Some(existing) = connections.get(key) {
            debug!(project_dir = %key.project_dir.display(), "reusing pooled connection");
            return Ok(Arc::clone(existing));
        }
        debug!(project_dir = %key.project_dir.display(), "opening new connection");
        let connection = self.factory.open(key)?;
        connections.insert(key.clone(), Arc::clone(&connection));
        Ok(connection)
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    /// Tear the pool down. Graceful shutdown closes every connection (a
    /// failing close is logged and does not stop the rest), empties the map,
    /// and resets the factory so later connections rediscover their engine
    /// implementations. The pool stays usable afterwards: `get_or_create`
    /// may repopulate it.
    pub fn shutdown(&self, strategy: ShutdownStrategy) -> Result<(), ShutdownError> {
        match strategy {
            ShutdownStrategy::Forceful => Err(ShutdownError::UnsupportedStrategy(strategy)),
            ShutdownStrategy::Graceful => {
                {
                    let mut connections = self.connections.lock();
                    let count = connections.len();
                    for (key, connection) in connections.drain() {
                        if let Err(failure) = connection.close() {
                            error!(
                                project_dir = %key.project_dir.display(),
                                %failure,
                                "error closing pooled connection"
                            );
                        }
                    }
                    info!(closed = count, "connection pool shut down");
                }
                self.factory.reset();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConnection, MockFactory};
    use girder_core::Distribution;
    use girder_telemetry::capture::{capture_subscriber, LogBuffer};
    use std::path::PathBuf;
    use std::time::Duration;

    fn key(dir: &str) -> ConnectionKey {
        ConnectionKey::new(dir)
    }

    #[test]
    fn same_key_returns_same_handle() {
        let factory = Arc::new(MockFactory::new());
        let pool = ConnectionPool::new(Arc::clone(&factory) as Arc<dyn ConnectionFactory>);

        let a = pool.get_or_create(&key("/work/app")).unwrap();
        let b = pool.get_or_create(&key("/work/app")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.open_count(), 1);
    }

    #[test]
    fn distinct_keys_get_distinct_handles() {
        let factory = Arc::new(MockFactory::new());
        let pool = ConnectionPool::new(Arc::clone(&factory) as Arc<dyn ConnectionFactory>);

        let a = pool.get_or_create(&key("/work/app")).unwrap();
        let b = pool.get_or_create(&key("/work/other")).unwrap();
        let c = pool
            .get_or_create(&ConnectionKey {
                engine_user_home: Some(PathBuf::from("/home/u/.engine")),
                ..key("/work/app")
            })
            .unwrap();
        let d = pool
            .get_or_create(&ConnectionKey {
                distribution: Distribution::Version {
                    version: "8.0".into(),
                },
                ..key("/work/app")
            })
            .unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(!Arc::ptr_eq(&a, &d));
        assert_eq!(factory.open_count(), 4);
        assert_eq!(pool.len(), 4);
    }

    #[test]
    fn concurrent_first_requests_create_exactly_once() {
        let factory = Arc::new(MockFactory::new().with_open_delay(Duration::from_millis(30)));
        let pool = Arc::new(ConnectionPool::new(
            Arc::clone(&factory) as Arc<dyn ConnectionFactory>
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || pool.get_or_create(&key("/work/app")).unwrap())
            })
            .collect();
        let connections: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(factory.open_count(), 1);
        for connection in &connections[1..] {
            assert!(Arc::ptr_eq(&connections[0], connection));
        }
    }

    #[test]
    fn factory_failure_is_not_cached() {
        let factory = Arc::new(MockFactory::new().fail_next_open(EngineFailure::ConnectionBroken(
            "spawn failed".into(),
        )));
        let pool = ConnectionPool::new(Arc::clone(&factory) as Arc<dyn ConnectionFactory>);

        let err = pool.get_or_create(&key("/work/app")).err().unwrap();
        assert_eq!(err, EngineFailure::ConnectionBroken("spawn failed".into()));
        assert!(pool.is_empty());

        // The next attempt opens fresh.
        assert!(pool.get_or_create(&key("/work/app")).is_ok());
    }

    #[test]
    fn forceful_shutdown_fails_fast() {
        let factory = Arc::new(MockFactory::new());
        let pool = ConnectionPool::new(Arc::clone(&factory) as Arc<dyn ConnectionFactory>);
        pool.get_or_create(&key("/work/app")).unwrap();

        let err = pool.shutdown(ShutdownStrategy::Forceful).unwrap_err();
        assert_eq!(
            err,
            ShutdownError::UnsupportedStrategy(ShutdownStrategy::Forceful)
        );
        // Nothing was closed.
        assert_eq!(pool.len(), 1);
        assert_eq!(factory.reset_count(), 0);
    }

    #[test]
    fn graceful_shutdown_closes_all_despite_failures() {
        let failing = Arc::new(
            MockConnection::new(vec![])
                .with_close_failure(EngineFailure::ConnectionBroken("already dead".into())),
        );
        let first = Arc::new(MockConnection::new(vec![]));
        let third = Arc::new(MockConnection::new(vec![]));
        let factory = Arc::new(MockFactory::with_connections(vec![
            Arc::clone(&first) as Arc<dyn EngineConnection>,
            Arc::clone(&failing) as Arc<dyn EngineConnection>,
            Arc::clone(&third) as Arc<dyn EngineConnection>,
        ]));
        let pool = ConnectionPool::new(Arc::clone(&factory) as Arc<dyn ConnectionFactory>);
        pool.get_or_create(&key("/a")).unwrap();
        pool.get_or_create(&key("/b")).unwrap();
        pool.get_or_create(&key("/c")).unwrap();

        let logs = LogBuffer::new();
        tracing::subscriber::with_default(capture_subscriber(&logs), || {
            pool.shutdown(ShutdownStrategy::Graceful).unwrap();
        });

        assert_eq!(first.close_count(), 1);
        assert_eq!(failing.close_count(), 1);
        assert_eq!(third.close_count(), 1);
        assert!(pool.is_empty());
        assert_eq!(factory.reset_count(), 1);
        assert!(logs.contains("ERROR", "error closing pooled connection"));
    }

    #[test]
    fn pool_is_reusable_after_graceful_shutdown() {
        let factory = Arc::new(MockFactory::new());
        let pool = ConnectionPool::new(Arc::clone(&factory) as Arc<dyn ConnectionFactory>);
        pool.get_or_create(&key("/work/app")).unwrap();
        pool.shutdown(ShutdownStrategy::Graceful).unwrap();

        assert!(pool.is_empty());
        pool.get_or_create(&key("/work/app")).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(factory.open_count(), 2);
    }
}
