use crate::domain::job::JobResult;

/// A unit of work in a batch. Routines report their outcome instead of
/// failing, so one broken routine never stops the others.
#[async_trait::async_trait]
pub trait Routine: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> JobResult;
}
