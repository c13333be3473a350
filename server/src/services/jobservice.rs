mod authorizer;
pub use self::authorizer::Authorizer;

use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use joblib::types::JobId;
use joblib::JobLauncher;
use serde::Deserialize;
use tracing::{info, warn};

/// Shared by every request handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub launcher: JobLauncher,
    pub authorizer: Authorizer,
}

impl AppState {
    pub fn new(launcher: JobLauncher, authorizer: Authorizer) -> Self {
        Self {
            launcher,
            authorizer,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/job", get(start_job).post(start_job))
        .route("/kill", get(kill_job).post(kill_job))
        .route("/status", get(job_status))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct StartParams {
    job: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobIdParams {
    id: Option<String>,
    token: Option<String>,
}

async fn start_job(
    State(state): State<AppState>,
    Query(params): Query<StartParams>,
) -> ApiResult<String> {
    let job = required(params.job, "job")?;
    if let Err(err) = state.authorizer.check(params.token.as_deref()) {
        warn!(job = %job, "token invalid");
        return Err(err);
    }

    let id = state.launcher.start(&job).await?;
    info!(job = %job, job_id = id, "job accepted");
    Ok(format!("job {} start, id is {}", job, id))
}

async fn kill_job(
    State(state): State<AppState>,
    Query(params): Query<JobIdParams>,
) -> ApiResult<&'static str> {
    let id = required(params.id, "id")?;
    state.authorizer.check(params.token.as_deref())?;
    let id = parse_id(&id)?;

    state.launcher.kill(id)?;
    Ok("job killed")
}

async fn job_status(
    State(state): State<AppState>,
    Query(params): Query<JobIdParams>,
) -> ApiResult<String> {
    let id = required(params.id, "id")?;
    state.authorizer.check(params.token.as_deref())?;
    let id = parse_id(&id)?;

    let job = state.launcher.status(id)?;
    Ok(format!("job {} {} {}", job.id, job.name, job.state))
}

fn required(value: Option<String>, name: &'static str) -> ApiResult<String> {
    value
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::MissingParam(name))
}

fn parse_id(raw: &str) -> ApiResult<JobId> {
    match raw.parse::<JobId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::MalformedId(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use joblib::{JobEvent, LogEntry};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tokio::time::timeout;
    use tower::ServiceExt;

    const TOKEN: &str = "s3cret";

    struct Harness {
        app: Router,
        state: AppState,
        log: mpsc::UnboundedReceiver<LogEntry>,
        _scripts: TempDir,
    }

    impl Harness {
        fn new(scripts: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().unwrap();
            for (name, body) in scripts {
                let path = dir.path().join(format!("{}.sh", name));
                fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
                fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            }
            let (sink, log) = mpsc::unbounded_channel();
            let state = AppState::new(JobLauncher::new(dir.path(), sink), Authorizer::new(TOKEN));
            Self {
                app: router(state.clone()),
                state,
                log,
                _scripts: dir,
            }
        }

        async fn get(&self, uri: &str) -> (StatusCode, String) {
            let response = self
                .app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, String::from_utf8(body.to_vec()).unwrap())
        }

        /// Log lines of one job, up to and including its last one.
        async fn log_of(&mut self, id: JobId) -> Vec<String> {
            let log = &mut self.log;
            let wait = async {
                let mut lines = vec![];
                while let Some(entry) = log.recv().await {
                    if entry.job_id == id {
                        lines.push(entry.to_string());
                        if entry.event.is_terminal() {
                            break;
                        }
                    }
                }
                lines
            };
            timeout(Duration::from_secs(10), wait)
                .await
                .expect("job never finished")
        }

        async fn wait_for_output(&mut self, id: JobId, line: &str) {
            let log = &mut self.log;
            let wait = async {
                while let Some(entry) = log.recv().await {
                    if entry.job_id == id && entry.event == JobEvent::Output(line.into()) {
                        return;
                    }
                }
                panic!("log closed before {:?}", line);
            };
            timeout(Duration::from_secs(10), wait)
                .await
                .expect("output never arrived");
        }
    }

    #[tokio::test]
    async fn start_runs_the_script() {
        let mut harness = Harness::new(&[("build", "echo A\necho B\nexit 0")]);

        let (status, body) = harness.get("/job?job=build&token=s3cret").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "job build start, id is 1");

        assert_eq!(
            harness.log_of(1).await,
            vec![
                "job build start",
                "AID:1 JOB:build Output A",
                "AID:1 JOB:build Output B",
                "AID:1 JOB:build Output Job Finished",
            ]
        );
        assert!(harness.state.launcher.status(1).is_err());
        let (status, _) = harness.get("/status?id=1&token=s3cret").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn start_rejections_create_no_job() {
        let harness = Harness::new(&[("build", "true")]);

        let (status, body) = harness.get("/job?token=s3cret").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Missing 'job' parameter");

        let (status, body) = harness.get("/job?job=build&token=wrong").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Token wrong");

        let (status, _) = harness.get("/job?job=build").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = harness.get("/job?job=deploy&token=s3cret").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Can not find job deploy");

        let (status, _) = harness.get("/job?job=..%2Fbuild&token=s3cret").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(harness.state.launcher.registry().ids().is_empty());
        // none of the rejections used up an id
        let (_, body) = harness.get("/job?job=build&token=s3cret").await;
        assert_eq!(body, "job build start, id is 1");
    }

    #[tokio::test]
    async fn kill_running_job() {
        let mut harness = Harness::new(&[("serve", "echo up\nsleep 60")]);

        let (_, body) = harness.get("/job?job=serve&token=s3cret").await;
        assert_eq!(body, "job serve start, id is 1");
        harness.wait_for_output(1, "up").await;

        let (status, body) = harness.get("/status?id=1&token=s3cret").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "job 1 serve running");

        let (status, body) = harness.get("/kill?id=1&token=s3cret").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "job killed");

        assert_eq!(
            harness.log_of(1).await,
            vec!["AID:1 JOB:serve Output Killed by API"]
        );
        let (status, _) = harness.get("/kill?id=1&token=s3cret").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn kill_unknown_id() {
        let mut harness = Harness::new(&[]);
        let (status, body) = harness.get("/kill?id=999&token=s3cret").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "job 999 not exists");
        assert!(harness.log.try_recv().is_err());
    }

    #[tokio::test]
    async fn kill_rejections() {
        let harness = Harness::new(&[]);

        let (status, body) = harness.get("/kill?token=s3cret").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Missing 'id' parameter");

        let (status, _) = harness.get("/kill?id=1&token=nope").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        for bad in ["abc", "-1", "0", "1.5"] {
            let (status, _) = harness
                .get(&format!("/kill?id={}&token=s3cret", bad))
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "id {:?}", bad);
        }
    }

    #[test]
    fn parses_positive_ids_only() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(parse_id("0").is_err());
        assert!(parse_id(" 1").is_err());
        assert!(parse_id("18446744073709551616").is_err());
    }
}
