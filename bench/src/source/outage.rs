//! Simulated outages for exercising the harness failure path.

use super::{
    AuthorGraph, AuthorQuery, AuthorRow, CompiledQuery, Connector, DataSource, QueryArgs,
};
use crate::error::{Error, Result};
use authors_core::BooksCountDrift;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Wraps a connector and makes every fetch on chosen connections fail with
/// [`Error::SourceUnavailable`]. Connections are numbered from 0 in the order
/// `connect` is called.
pub struct FlakyConnector<C> {
    inner: C,
    failing: BTreeSet<usize>,
    opened: AtomicUsize,
}

impl<C: Connector> FlakyConnector<C> {
    pub fn new(inner: C, failing: impl IntoIterator<Item = usize>) -> Self {
        Self {
            inner,
            failing: failing.into_iter().collect(),
            opened: AtomicUsize::new(0),
        }
    }

    /// Number of connections handed out so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl<C: Connector> Connector for FlakyConnector<C> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn connect(&self) -> Result<Box<dyn DataSource>> {
        let number = self.opened.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.connect()?;
        if self.failing.contains(&number) {
            log::debug!("Connection {number} to {} is scheduled to fail", self.name());
            Ok(Box::new(UnavailableSource { number }))
        } else {
            Ok(inner)
        }
    }
}

struct UnavailableSource {
    number: usize,
}

impl UnavailableSource {
    fn error(&self) -> Error {
        Error::unavailable(format!("connection {} lost", self.number))
    }
}

impl DataSource for UnavailableSource {
    fn fetch_graphs(&self, _query: &AuthorQuery) -> Result<Vec<AuthorGraph>> {
        Err(self.error())
    }

    fn fetch_projected(&self, _query: &AuthorQuery) -> Result<Vec<AuthorRow>> {
        Err(self.error())
    }

    fn fetch_compiled(
        &self,
        _compiled: &CompiledQuery,
        _args: &QueryArgs,
    ) -> Result<Vec<AuthorRow>> {
        Err(self.error())
    }

    fn audit_books_count(&self) -> Result<Vec<BooksCountDrift>> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::populate::fixtures;
    use crate::source::memory::MemoryConnector;
    use std::sync::Arc;

    #[test]
    fn only_scheduled_connections_fail() {
        let connector = FlakyConnector::new(
            MemoryConnector::new(Arc::new(fixtures::serbian_authors())),
            [1],
        );
        let query = AuthorQuery::new();

        assert!(connector.connect().unwrap().fetch_projected(&query).is_ok());
        let err = connector
            .connect()
            .unwrap()
            .fetch_projected(&query)
            .unwrap_err();
        assert!(err.is_source_unavailable());
        assert!(connector.connect().unwrap().fetch_projected(&query).is_ok());
        assert_eq!(connector.opened(), 3);
    }
}
