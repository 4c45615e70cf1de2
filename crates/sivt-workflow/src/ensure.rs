//! The ensure-deployed skeleton shared by every deployable entity.
//!
//! check state -> skip if satisfied -> actuate -> poll until converged ->
//! record and commit. State is only written after the actuation (and its
//! convergence wait) returned successfully, so a failure leaves the
//! document exactly as it was.

use std::fmt;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::{debug, error, info};

use sivt_common::{wait_with_timeout, DeploymentState, Error, PollBudget, PollResult, Result, StateStore};

/// Result of one ensure pass
#[derive(Debug)]
pub enum Outcome {
    Skipped,
    Succeeded,
    Failed(Error),
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// Collapse into a `Result`, treating skip as success
    pub fn into_result(self) -> Result<()> {
        match self {
            Outcome::Skipped | Outcome::Succeeded => Ok(()),
            Outcome::Failed(e) => Err(e),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Skipped => f.write_str("SKIPPED"),
            Outcome::Succeeded => f.write_str("SUCCEEDED"),
            Outcome::Failed(e) => write!(f, "FAILED: {e}"),
        }
    }
}

/// One entity the workflow can bring to its desired state
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Deployable: Send + Sync {
    /// Name used in logs, errors and reports
    fn entity(&self) -> String;

    /// Whether the recorded state already satisfies the request.
    ///
    /// An error here is a precondition or configuration failure and stops
    /// the pass before any actuation.
    fn is_satisfied(&self, state: &DeploymentState) -> Result<bool>;

    async fn actuate(&self) -> Result<()>;

    /// Budget for asynchronous convergence, `None` when `actuate` is synchronous
    fn convergence(&self) -> Option<PollBudget> {
        None
    }

    async fn converged(&self) -> PollResult<()> {
        Ok(Some(()))
    }

    /// Apply the success mutation to the state document
    fn record(&self, state: &mut DeploymentState) -> Result<()>;

    fn commit_message(&self) -> String;
}

/// Bring `item` to its desired state. Never panics on actuator failure and
/// never writes state for an actuation that did not complete.
pub async fn ensure(store: &StateStore, item: &dyn Deployable) -> Outcome {
    let entity = item.entity();
    match run(store, item, &entity).await {
        Ok(true) => {
            info!(entity = %entity, "Deployed successfully");
            Outcome::Succeeded
        }
        Ok(false) => Outcome::Skipped,
        Err(e) => {
            let e = e.in_entity(&entity);
            error!(entity = %entity, kind = %e.kind(), error = %e, "Ensure failed");
            Outcome::Failed(e)
        }
    }
}

async fn run(store: &StateStore, item: &dyn Deployable, entity: &str) -> Result<bool> {
    let state = store.load()?;
    if item.is_satisfied(&state)? {
        info!(entity = %entity, "Already deployed, skipping");
        return Ok(false);
    }

    info!(entity = %entity, "Deploying");
    item.actuate().await?;

    if let Some(budget) = item.convergence() {
        debug!(
            entity = %entity,
            timeout_secs = budget.timeout.as_secs(),
            interval_secs = budget.interval.as_secs(),
            "Waiting for convergence"
        );
        wait_with_timeout(budget, entity, || item.converged()).await?;
    }

    store.update(&item.commit_message(), |state| item.record(state))?;
    Ok(true)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    use sivt_common::ClusterRef;
    use tempfile::TempDir;

    pub(crate) fn store(dir: &TempDir) -> StateStore {
        let store = StateStore::new(dir.path().join("deployment-state").join("state.yml"));
        store.init_fresh().unwrap();
        store
    }

    fn shared_cluster(actuations: usize) -> MockDeployable {
        let mut item = MockDeployable::new();
        item.expect_entity().return_const("shared".to_string());
        item.expect_commit_message()
            .return_const("Successful Shared Cluster deployment [shared]".to_string());
        item.expect_is_satisfied()
            .returning(|s| Ok(s.shared_services.deployed));
        item.expect_actuate().times(actuations).returning(|| Ok(()));
        item.expect_convergence().return_const(None::<PollBudget>);
        item.expect_record().returning(|s| {
            s.record_cluster_deployed(&ClusterRef::SharedServices, "shared", "1.4.0");
            Ok(())
        });
        item
    }

    #[tokio::test]
    async fn second_pass_skips_without_actuating() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let first = shared_cluster(1);
        assert!(matches!(ensure(&store, &first).await, Outcome::Succeeded));

        let second = shared_cluster(0);
        assert!(matches!(ensure(&store, &second).await, Outcome::Skipped));

        let state = store.load().unwrap();
        assert!(state.shared_services.deployed);
        assert_eq!(state.shared_services.version, "1.4.0");
    }

    #[tokio::test]
    async fn failed_actuation_leaves_state_bytes_untouched() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let before = std::fs::read(store.path()).unwrap();

        let mut item = MockDeployable::new();
        item.expect_entity().return_const("harbor".to_string());
        item.expect_is_satisfied().returning(|_| Ok(false));
        item.expect_actuate()
            .times(1)
            .returning(|| Err(Error::actuation("harbor", "tanzu package install exited 1")));
        item.expect_record().times(0);

        let outcome = ensure(&store, &item).await;
        assert!(outcome.is_failed());
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn precondition_failure_stops_before_actuation() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let mut item = MockDeployable::new();
        item.expect_entity().return_const("contour".to_string());
        item.expect_is_satisfied()
            .returning(|_| Err(Error::precondition("contour", "not deployed")));
        item.expect_actuate().times(0);

        match ensure(&store, &item).await {
            Outcome::Failed(e) => assert!(matches!(e, Error::Precondition { .. })),
            other => panic!("expected failure, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn convergence_timeout_is_failure_not_success() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let before = std::fs::read(store.path()).unwrap();

        let mut item = MockDeployable::new();
        item.expect_entity().return_const("grafana".to_string());
        item.expect_is_satisfied().returning(|_| Ok(false));
        item.expect_actuate().returning(|| Ok(()));
        item.expect_convergence().return_const(Some(PollBudget::new(
            Duration::from_secs(900),
            Duration::from_secs(20),
        )));
        item.expect_converged().returning(|| Ok(None));
        item.expect_record().times(0);

        match ensure(&store, &item).await {
            Outcome::Failed(e) => assert!(matches!(e, Error::Timeout { .. })),
            other => panic!("expected timeout, got {other}"),
        }
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn corrupt_state_halts_before_actuation() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(store.path(), "avi: [").unwrap();

        let mut item = MockDeployable::new();
        item.expect_entity().return_const("mgmt".to_string());
        item.expect_actuate().times(0);

        match ensure(&store, &item).await {
            Outcome::Failed(e) => assert!(matches!(e, Error::StateCorruption { .. })),
            other => panic!("expected state corruption, got {other}"),
        }
    }

    #[test]
    fn outcome_report_text() {
        assert_eq!(Outcome::Skipped.to_string(), "SKIPPED");
        assert_eq!(Outcome::Succeeded.to_string(), "SUCCEEDED");
        assert!(Outcome::Failed(Error::timeout("x"))
            .to_string()
            .starts_with("FAILED: "));
    }
}
