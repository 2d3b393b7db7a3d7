//! Fire-and-supersede behaviour of the live session.

use std::time::Duration;

use lumen_core::id::SubmissionId;
use lumen_sandbox::{
    DomainConfig, Evaluator, EvaluatorConfig, LiveSession, Project, RunFailure, SessionError,
    SourceText,
};
use lumen_trace::CancelReason;

const SOURCE: &str = r#"
int Sum(int n)
{
    int t = 0;
    for (int i = 0; i < n; i++)
    {
        t += i;
    }
    return t;
}

void Forever()
{
    int i = 0;
    while (true)
    {
        i++;
    }
}
"#;

fn session(root: &std::path::Path) -> LiveSession {
    LiveSession::new(Evaluator::new(EvaluatorConfig {
        domain: DomainConfig {
            root: Some(root.to_path_buf()),
            ..DomainConfig::default()
        },
        ..EvaluatorConfig::default()
    }))
}

fn project() -> Project {
    Project::new(vec![SourceText::new("Main.lm", SOURCE)])
}

#[tokio::test]
async fn publishes_the_current_submission() {
    let root = tempfile::tempdir().unwrap();
    let session = session(root.path());
    let mut updates = session.subscribe();

    let published = session.submit(project(), "Sum(3);").await.unwrap().unwrap();
    assert_eq!(published.submission, SubmissionId(1));
    let evaluation = published.result.as_ref().unwrap();
    assert_eq!(evaluation.root().unwrap().name, "Sum");
    assert!(!published.locations.is_empty());

    updates.changed().await.unwrap();
    let latest = updates.borrow().clone().unwrap();
    assert_eq!(latest.submission, SubmissionId(1));
}

#[tokio::test]
async fn newer_submission_supersedes_a_running_one() {
    let root = tempfile::tempdir().unwrap();
    let session = session(root.path());

    let first = session.submit(project(), "Forever();");
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = session.submit(project(), "Sum(4);");

    assert!(first.await.unwrap().is_none());
    let published = second.await.unwrap().unwrap();
    assert_eq!(published.submission, SubmissionId(2));
    assert!(published.result.as_ref().unwrap().is_complete());
    assert_eq!(session.latest().unwrap().submission, SubmissionId(2));
}

#[tokio::test]
async fn cancel_stops_the_running_submission() {
    let root = tempfile::tempdir().unwrap();
    let session = session(root.path());

    let running = session.submit(project(), "Forever();");
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.cancel();

    let published = running.await.unwrap().unwrap();
    let evaluation = published.result.as_ref().unwrap();
    assert_eq!(
        evaluation.failure,
        Some(RunFailure::Canceled {
            reason: CancelReason::Requested
        })
    );
    assert_eq!(evaluation.root().unwrap().name, "Forever");
}

#[tokio::test]
async fn rejected_projects_are_published_too() {
    let root = tempfile::tempdir().unwrap();
    let session = session(root.path());
    let broken = Project::new(vec![SourceText::new("Main.lm", "int F() { return q; }")]);

    let published = session.submit(broken, "F();").await.unwrap().unwrap();
    let Err(SessionError::Rejected(rejected)) = &published.result else {
        panic!("expected a rejection, got {:?}", published.result);
    };
    assert_eq!(rejected.diagnostics.len(), 1);
    assert!(published.locations.is_empty());
}
