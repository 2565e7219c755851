//! Schema reference resolution
//!
//! Walks the reference closure of a schema depth-first, in declaration
//! order, invoking a visitor once for every distinct reference name.
//!
//! Every walk owns a private seen-map from reference name to version. A
//! name encountered again with the same version is skipped, which makes
//! diamonds visit once and cycles terminate. A name encountered again with a
//! different version aborts the walk with [`SchemaError::VersionConflict`]
//! before the visitor sees the second occurrence.
//!
//! Traversal uses an explicit stack: children are pushed in reverse so they
//! pop in list order, and each popped reference is checked against the
//! seen-map at that point. This yields the same order as recursive
//! pre-order traversal.

use crate::error::{BoxError, SchemaError, SchemaResult};
use crate::types::{SchemaInfo, SchemaReference, SchemaVersion};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Source of schemas by subject and version
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch_by_subject_version(
        &self,
        subject: &str,
        version: SchemaVersion,
    ) -> SchemaResult<SchemaInfo>;
}

/// Callback invoked for every distinct schema reached during a walk
///
/// Implemented for any `FnMut(&str, &SchemaInfo) -> Result<(), BoxError>`.
pub trait ReferenceVisitor: Send {
    fn visit(&mut self, name: &str, info: &SchemaInfo) -> Result<(), BoxError>;
}

impl<F> ReferenceVisitor for F
where
    F: FnMut(&str, &SchemaInfo) -> Result<(), BoxError> + Send,
{
    fn visit(&mut self, name: &str, info: &SchemaInfo) -> Result<(), BoxError> {
        self(name, info)
    }
}

/// Outcome of checking a reference against the seen-map
enum Seen {
    New,
    Duplicate,
}

/// Traversal state of one top-level walk
struct WalkState {
    pending: Vec<SchemaReference>,
    seen: HashMap<String, u32>,
}

impl WalkState {
    fn new(references: &[SchemaReference]) -> Self {
        Self {
            pending: references.iter().rev().cloned().collect(),
            seen: HashMap::new(),
        }
    }

    fn next(&mut self) -> Option<SchemaReference> {
        self.pending.pop()
    }

    fn check(&self, reference: &SchemaReference) -> SchemaResult<Seen> {
        match self.seen.get(&reference.name) {
            None => Ok(Seen::New),
            Some(&seen) if seen == reference.version => Ok(Seen::Duplicate),
            Some(&seen) => Err(SchemaError::VersionConflict {
                name: reference.name.clone(),
                seen,
                found: reference.version,
            }),
        }
    }

    fn record(&mut self, reference: SchemaReference, children: Vec<SchemaReference>) {
        self.seen.insert(reference.name, reference.version);
        self.pending.extend(children.into_iter().rev());
    }
}

/// Resolves reference closures through a [`SchemaFetcher`]
///
/// The walker itself holds no traversal state; concurrent walks over the
/// same fetcher are independent.
pub struct ReferenceWalker<'a, F: SchemaFetcher + ?Sized> {
    fetcher: &'a F,
}

impl<'a, F: SchemaFetcher + ?Sized> ReferenceWalker<'a, F> {
    pub fn new(fetcher: &'a F) -> Self {
        Self { fetcher }
    }

    /// Visit every schema reachable from `references`
    ///
    /// Fetch failures, visitor failures and version conflicts abort the walk;
    /// no reference after the failing one is visited.
    pub async fn walk<V>(&self, references: &[SchemaReference], visitor: &mut V) -> SchemaResult<()>
    where
        V: ReferenceVisitor + ?Sized,
    {
        let mut state = WalkState::new(references);
        let mut visited = 0usize;

        while let Some(reference) = state.next() {
            if let Seen::Duplicate = state.check(&reference)? {
                trace!(name = %reference.name, version = reference.version, "reference already visited");
                continue;
            }

            let info = self
                .fetcher
                .fetch_by_subject_version(&reference.subject, SchemaVersion::new(reference.version))
                .await?;

            visitor
                .visit(&reference.name, &info)
                .map_err(|source| SchemaError::Visitor {
                    name: reference.name.clone(),
                    source,
                })?;
            visited += 1;

            debug!(
                name = %reference.name,
                subject = %reference.subject,
                version = reference.version,
                id = info.id,
                children = info.references.len(),
                "visited schema reference"
            );
            state.record(reference, info.references);
        }

        debug!(visited, "reference walk complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory registry keyed by (subject, version)
    #[derive(Default)]
    struct MemoryFetcher {
        schemas: HashMap<(String, u32), SchemaInfo>,
        fetched: Mutex<Vec<(String, u32)>>,
    }

    impl MemoryFetcher {
        fn with(mut self, subject: &str, version: u32, id: u32, refs: Vec<SchemaReference>) -> Self {
            self.schemas.insert(
                (subject.to_string(), version),
                SchemaInfo {
                    id,
                    schema_type: String::new(),
                    schema: format!("schema of {}@{}", subject, version),
                    references: refs,
                },
            );
            self
        }

        fn fetched(&self) -> Vec<(String, u32)> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SchemaFetcher for MemoryFetcher {
        async fn fetch_by_subject_version(
            &self,
            subject: &str,
            version: SchemaVersion,
        ) -> SchemaResult<SchemaInfo> {
            let Some(number) = version.number() else {
                return Err(SchemaError::Config("walks fetch explicit versions".to_string()));
            };
            let key = (subject.to_string(), number);
            self.fetched.lock().unwrap().push(key.clone());
            self.schemas.get(&key).cloned().ok_or_else(|| {
                SchemaError::NotFound(format!("subject '{}' version {}", subject, version))
            })
        }
    }

    fn r(name: &str, subject: &str, version: u32) -> SchemaReference {
        SchemaReference::new(name, subject, version)
    }

    async fn collect(
        fetcher: &MemoryFetcher,
        refs: &[SchemaReference],
    ) -> (SchemaResult<()>, Vec<(String, u32)>) {
        let mut visits = Vec::new();
        let mut visitor = |name: &str, info: &SchemaInfo| -> Result<(), BoxError> {
            visits.push((name.to_string(), info.id));
            Ok(())
        };
        let result = ReferenceWalker::new(fetcher).walk(refs, &mut visitor).await;
        (result, visits)
    }

    fn names(visits: &[(String, u32)]) -> Vec<&str> {
        visits.iter().map(|(n, _)| n.as_str()).collect()
    }

    #[tokio::test]
    async fn test_single_reference() {
        let fetcher = MemoryFetcher::default().with("money", 1, 7, vec![]);

        let (result, visits) = collect(&fetcher, &[r("Money", "money", 1)]).await;
        result.unwrap();
        assert_eq!(visits, vec![("Money".to_string(), 7)]);
    }

    #[tokio::test]
    async fn test_empty_references() {
        let fetcher = MemoryFetcher::default();
        let (result, visits) = collect(&fetcher, &[]).await;
        result.unwrap();
        assert!(visits.is_empty());
        assert!(fetcher.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_depth_first_list_order() {
        let fetcher = MemoryFetcher::default()
            .with("b", 1, 2, vec![r("D", "d", 1), r("E", "e", 1)])
            .with("c", 1, 3, vec![r("F", "f", 1)])
            .with("d", 1, 4, vec![])
            .with("e", 1, 5, vec![])
            .with("f", 1, 6, vec![]);

        let (result, visits) = collect(&fetcher, &[r("B", "b", 1), r("C", "c", 1)]).await;
        result.unwrap();
        assert_eq!(names(&visits), vec!["B", "D", "E", "C", "F"]);
    }

    #[tokio::test]
    async fn test_diamond_visits_shared_dependency_once() {
        let fetcher = MemoryFetcher::default()
            .with("b", 1, 2, vec![r("D", "d", 1)])
            .with("c", 1, 3, vec![r("D", "d", 1)])
            .with("d", 1, 4, vec![]);

        let (result, visits) = collect(&fetcher, &[r("B", "b", 1), r("C", "c", 1)]).await;
        result.unwrap();
        assert_eq!(names(&visits), vec!["B", "D", "C"]);
        assert_eq!(
            fetcher.fetched().iter().filter(|(s, _)| s == "d").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        let fetcher = MemoryFetcher::default()
            .with("a", 1, 1, vec![r("B", "b", 1)])
            .with("b", 1, 2, vec![r("A", "a", 1)]);

        let (result, visits) = collect(&fetcher, &[r("A", "a", 1)]).await;
        result.unwrap();
        assert_eq!(names(&visits), vec!["A", "B"]);
        assert_eq!(fetcher.fetched().len(), 2);
    }

    #[tokio::test]
    async fn test_self_reference_terminates() {
        let fetcher = MemoryFetcher::default().with("node", 1, 1, vec![r("Node", "node", 1)]);

        let (result, visits) = collect(&fetcher, &[r("Node", "node", 1)]).await;
        result.unwrap();
        assert_eq!(names(&visits), vec!["Node"]);
    }

    #[tokio::test]
    async fn test_repeated_top_level_reference_skipped() {
        let fetcher = MemoryFetcher::default().with("money", 1, 7, vec![]);

        let (result, visits) =
            collect(&fetcher, &[r("Money", "money", 1), r("Money", "money", 1)]).await;
        result.unwrap();
        assert_eq!(visits.len(), 1);
        assert_eq!(fetcher.fetched().len(), 1);
    }

    #[tokio::test]
    async fn test_seen_map_keyed_by_name() {
        // Two aliases of the same subject version are distinct references
        let fetcher = MemoryFetcher::default().with("money", 1, 7, vec![]);

        let (result, visits) =
            collect(&fetcher, &[r("Money", "money", 1), r("Price", "money", 1)]).await;
        result.unwrap();
        assert_eq!(names(&visits), vec!["Money", "Price"]);
    }

    #[tokio::test]
    async fn test_conflict_detected_deep_in_graph() {
        let fetcher = MemoryFetcher::default()
            .with("b", 1, 2, vec![r("D", "d", 1)])
            .with("c", 1, 3, vec![r("D", "d", 2)])
            .with("d", 1, 4, vec![])
            .with("d", 2, 5, vec![]);

        let (result, visits) = collect(&fetcher, &[r("B", "b", 1), r("C", "c", 1)]).await;
        match result.unwrap_err() {
            SchemaError::VersionConflict { name, seen, found } => {
                assert_eq!(name, "D");
                assert_eq!(seen, 1);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(names(&visits), vec!["B", "D", "C"]);
        assert!(!fetcher.fetched().contains(&("d".to_string(), 2)));
    }

    #[tokio::test]
    async fn test_conflict_at_top_level() {
        let fetcher = MemoryFetcher::default()
            .with("money", 1, 7, vec![])
            .with("money", 2, 8, vec![])
            .with("other", 1, 9, vec![]);

        let (result, visits) = collect(
            &fetcher,
            &[r("Money", "money", 1), r("Money", "money", 2), r("Other", "other", 1)],
        )
        .await;
        assert!(matches!(
            result,
            Err(SchemaError::VersionConflict { seen: 1, found: 2, .. })
        ));
        assert_eq!(names(&visits), vec!["Money"]);
    }

    #[tokio::test]
    async fn test_visitor_failure_stops_walk() {
        let fetcher = MemoryFetcher::default()
            .with("a", 1, 1, vec![])
            .with("b", 1, 2, vec![r("X", "x", 1)])
            .with("c", 1, 3, vec![])
            .with("x", 1, 4, vec![]);

        let mut visits = Vec::new();
        let mut visitor = |name: &str, _info: &SchemaInfo| -> Result<(), BoxError> {
            visits.push(name.to_string());
            if name == "B" {
                return Err("cache rejected schema".into());
            }
            Ok(())
        };
        let err = ReferenceWalker::new(&fetcher)
            .walk(&[r("A", "a", 1), r("B", "b", 1), r("C", "c", 1)], &mut visitor)
            .await
            .unwrap_err();

        match &err {
            SchemaError::Visitor { name, source } => {
                assert_eq!(name, "B");
                assert_eq!(source.to_string(), "cache rejected schema");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(visits, vec!["A", "B"]);
        assert_eq!(fetcher.fetched().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts() {
        let fetcher = MemoryFetcher::default()
            .with("a", 1, 1, vec![r("Missing", "missing", 3)])
            .with("c", 1, 3, vec![]);

        let (result, visits) = collect(&fetcher, &[r("A", "a", 1), r("C", "c", 1)]).await;
        let err = result.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("missing"));
        assert_eq!(names(&visits), vec!["A"]);
    }

    #[tokio::test]
    async fn test_max_version_is_fetched_explicitly() {
        let fetcher = MemoryFetcher::default().with("money", u32::MAX, 7, vec![]);

        let (result, visits) = collect(&fetcher, &[r("Money", "money", u32::MAX)]).await;
        result.unwrap();
        assert_eq!(visits, vec![("Money".to_string(), 7)]);
        assert_eq!(fetcher.fetched(), vec![("money".to_string(), u32::MAX)]);
    }

    #[tokio::test]
    async fn test_walks_are_independent() {
        let fetcher = MemoryFetcher::default().with("money", 1, 7, vec![]);
        let walker = ReferenceWalker::new(&fetcher);

        let mut count = 0;
        let mut visitor = |_: &str, _: &SchemaInfo| -> Result<(), BoxError> {
            count += 1;
            Ok(())
        };
        walker.walk(&[r("Money", "money", 1)], &mut visitor).await.unwrap();
        walker.walk(&[r("Money", "money", 1)], &mut visitor).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_struct_visitor() {
        #[derive(Default)]
        struct Collector(Vec<String>);

        impl ReferenceVisitor for Collector {
            fn visit(&mut self, name: &str, info: &SchemaInfo) -> Result<(), BoxError> {
                self.0.push(format!("{}={}", name, info.schema));
                Ok(())
            }
        }

        let fetcher = MemoryFetcher::default().with("money", 1, 7, vec![]);
        let mut collector = Collector::default();
        ReferenceWalker::new(&fetcher)
            .walk(&[r("Money", "money", 1)], &mut collector)
            .await
            .unwrap();
        assert_eq!(collector.0, vec!["Money=schema of money@1"]);
    }
}
