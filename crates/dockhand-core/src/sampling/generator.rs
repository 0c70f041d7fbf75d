//! Candidate generator interface and the shared strategy fan-out.

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};

use crate::domain::{SamplingError, SamplingResult};
use crate::sampling::candidate::Candidate;
use crate::sampling::context::GenerationContext;

/// Incremental progress of a generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationProgress {
    pub generator: String,
    pub completed: usize,
    pub total: usize,
    /// Share of strategies finished, 0–100.
    pub percent: u8,
}

/// Callback receiving [`GenerationProgress`] updates.
pub type ProgressFn = Arc<dyn Fn(GenerationProgress) + Send + Sync>;

/// Produces up to `count` candidates of one artifact type.
///
/// Implementations may return fewer candidates than requested, including
/// none when the context needs no work. A call that produces nothing while
/// at least one strategy failed is an error.
#[async_trait]
pub trait CandidateGenerator<T>: Send + Sync {
    /// Stable identity used in traces and errors.
    fn name(&self) -> &str;

    /// Strategy names in the order they are attempted.
    fn strategies(&self) -> Vec<String>;

    async fn generate(
        &self,
        context: &GenerationContext,
        count: usize,
    ) -> SamplingResult<Vec<Candidate<T>>>;
}

/// Run strategies concurrently until `count` candidates exist or the list
/// runs out, and join the results.
///
/// The first `count` strategies start together. Each one that fails or
/// returns `Ok(None)` (nothing to contribute for this context) frees its
/// slot for the next unattempted strategy. Output keeps strategy order
/// regardless of completion order, and candidate ids are made unique within
/// the call. Producing no candidate while any attempt failed is a
/// [`SamplingError::GenerationFailure`].
pub async fn run_strategies<S, T, F, Fut>(
    generator: &str,
    strategies: &[S],
    count: usize,
    progress: Option<&ProgressFn>,
    attempt: F,
) -> SamplingResult<Vec<Candidate<T>>>
where
    S: Display,
    F: Fn(&S) -> Fut,
    Fut: Future<Output = SamplingResult<Option<Candidate<T>>>>,
{
    let launch = |index: usize| {
        let fut = attempt(&strategies[index]);
        async move { (index, fut.await) }
    };

    let mut next = count.min(strategies.len());
    if next == 0 {
        return Ok(Vec::new());
    }
    let mut pending: FuturesUnordered<_> = (0..next).map(&launch).collect();

    let mut slots: Vec<Option<Candidate<T>>> = (0..strategies.len()).map(|_| None).collect();
    let mut failures = Vec::new();
    let mut produced = 0usize;
    let mut completed = 0usize;

    while let Some((index, outcome)) = pending.next().await {
        completed += 1;
        let strategy = &strategies[index];
        match outcome {
            Ok(Some(candidate)) => {
                debug!(generator, strategy = %strategy, candidate_id = %candidate.id, "strategy produced candidate");
                slots[index] = Some(candidate);
                produced += 1;
            }
            Ok(None) => {
                debug!(generator, strategy = %strategy, "strategy not applicable");
            }
            Err(e) => {
                warn!(generator, strategy = %strategy, error = %e, "strategy failed");
                failures.push(format!("{strategy}: {e}"));
            }
        }

        if produced + pending.len() < count && next < strategies.len() {
            debug!(generator, strategy = %strategies[next], "backfilling strategy");
            pending.push(launch(next));
            next += 1;
        }

        let total = next;
        let percent = ((completed * 100) / total) as u8;
        debug!(generator, completed, total, percent, "generation progress");
        if let Some(report) = progress {
            report(GenerationProgress {
                generator: generator.to_string(),
                completed,
                total,
                percent,
            });
        }
    }

    if produced == 0 && !failures.is_empty() {
        return Err(SamplingError::GenerationFailure {
            generator: generator.to_string(),
            reason: failures.join("; "),
        });
    }

    let mut candidates: Vec<Candidate<T>> = slots.into_iter().flatten().collect();
    dedupe_ids(&mut candidates);
    Ok(candidates)
}

fn dedupe_ids<T>(candidates: &mut [Candidate<T>]) {
    let mut seen = HashSet::new();
    for candidate in candidates.iter_mut() {
        if seen.contains(&candidate.id) {
            let base = candidate.id.clone();
            let mut n = 1;
            while seen.contains(&format!("{base}-{n}")) {
                n += 1;
            }
            candidate.id = format!("{base}-{n}");
        }
        seen.insert(candidate.id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContentSourceError;
    use crate::sampling::candidate::CandidateSource;
    use std::sync::Mutex;

    fn candidate(strategy: &str) -> Candidate<String> {
        Candidate::new(strategy, CandidateSource::Template, 0.5, strategy.to_string())
    }

    #[tokio::test]
    async fn test_never_exceeds_count() {
        let strategies = ["a", "b", "c", "d"];
        let out = run_strategies("gen", &strategies, 2, None, |s| {
            let s = s.to_string();
            async move { Ok::<_, SamplingError>(Some(candidate(&s))) }
        })
        .await
        .expect("generate");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].strategy(), "a");
        assert_eq!(out[1].strategy(), "b");
    }

    #[tokio::test]
    async fn test_partial_failure_tolerated() {
        let strategies = ["ok", "broken", "ok2"];
        let out = run_strategies("gen", &strategies, 3, None, |s| {
            let s = s.to_string();
            async move {
                if s == "broken" {
                    Err(SamplingError::from(ContentSourceError::Unavailable(
                        "timeout".to_string(),
                    )))
                } else {
                    Ok(Some(candidate(&s)))
                }
            }
        })
        .await
        .expect("partial success");
        let names: Vec<&str> = out.iter().map(|c| c.strategy()).collect();
        assert_eq!(names, vec!["ok", "ok2"]);
    }

    #[tokio::test]
    async fn test_total_failure_is_error() {
        let strategies = ["x", "y"];
        let err = run_strategies::<_, String, _, _>("gen", &strategies, 2, None, |_| async {
            Err::<Option<Candidate<String>>, _>(SamplingError::from(
                ContentSourceError::Unavailable("down".to_string()),
            ))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, SamplingError::GenerationFailure { .. }));
    }

    #[tokio::test]
    async fn test_not_applicable_is_success() {
        let strategies = ["x"];
        let out = run_strategies::<_, String, _, _>("gen", &strategies, 1, None, |_| async {
            Ok::<_, SamplingError>(None)
        })
        .await
        .expect("empty success");
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_failure_with_only_inapplicable_rest_is_error() {
        let strategies = ["skip", "broken"];
        let err = run_strategies::<_, String, _, _>("gen", &strategies, 2, None, |s| {
            let broken = *s == "broken";
            async move {
                if broken {
                    Err(SamplingError::from(ContentSourceError::Unavailable(
                        "down".to_string(),
                    )))
                } else {
                    Ok(None)
                }
            }
        })
        .await
        .unwrap_err();
        match err {
            SamplingError::GenerationFailure { reason, .. } => {
                assert!(reason.starts_with("broken:"), "{reason}")
            }
            other => panic!("expected generation failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_later_strategies_fill_unused_slots() {
        let strategies = ["skip", "broken", "c", "d", "e"];
        let out = run_strategies("gen", &strategies, 2, None, |s| {
            let s = s.to_string();
            async move {
                match s.as_str() {
                    "skip" => Ok(None),
                    "broken" => Err(SamplingError::from(ContentSourceError::Unavailable(
                        "timeout".to_string(),
                    ))),
                    _ => Ok(Some(candidate(&s))),
                }
            }
        })
        .await
        .expect("backfilled");
        let names: Vec<&str> = out.iter().map(|c| c.strategy()).collect();
        assert_eq!(names, vec!["c", "d"]);
    }

    #[tokio::test]
    async fn test_progress_reported_per_strategy() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress: ProgressFn = Arc::new(move |p| sink.lock().unwrap().push(p.percent));

        let strategies = ["a", "b", "c", "d"];
        run_strategies("gen", &strategies, 4, Some(&progress), |s| {
            let s = s.to_string();
            async move { Ok::<_, SamplingError>(Some(candidate(&s))) }
        })
        .await
        .expect("generate");

        assert_eq!(*seen.lock().unwrap(), vec![25, 50, 75, 100]);
    }

    #[test]
    fn test_dedupe_ids() {
        let mut list = vec![candidate("a"), candidate("a"), candidate("a")];
        list[1].id = list[0].id.clone();
        list[2].id = list[0].id.clone();
        dedupe_ids(&mut list);
        let unique: HashSet<_> = list.iter().map(|c| c.id.clone()).collect();
        assert_eq!(unique.len(), 3);
        assert!(list[1].id.ends_with("-1"));
        assert!(list[2].id.ends_with("-2"));
    }
}
