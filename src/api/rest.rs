//! Trigger endpoints: an authenticated batch endpoint for the external
//! scheduler and a single-trial endpoint for manual runs.

use std::convert::Infallible;
use std::sync::Arc;

use serde::Serialize;
use warp::http::StatusCode;
use warp::Filter;

use crate::runner::{RunOptions, Runner, TrialOutcome};

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub status: String,
    pub trials_processed: usize,
}

#[derive(Debug, Serialize)]
pub struct SingleRunResponse {
    pub status: String,
    pub trial_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

pub struct RestApi {
    runner: Arc<Runner>,
    cron_secret: String,
}

impl RestApi {
    pub fn new(runner: Arc<Runner>, cron_secret: String) -> Self {
        RestApi { runner, cron_secret }
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        self.run_daily().or(self.run_single())
    }

    /// POST /cron/run-daily-ai, authenticated via the x-cron-secret header.
    fn run_daily(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let runner = Arc::clone(&self.runner);
        let secret = self.cron_secret.clone();

        warp::path!("cron" / "run-daily-ai")
            .and(warp::post())
            .and(warp::header::optional::<String>("x-cron-secret"))
            .and_then(move |header: Option<String>| {
                let runner = Arc::clone(&runner);
                let secret = secret.clone();
                async move {
                    if header.as_deref() != Some(secret.as_str()) {
                        let body = ErrorResponse {
                            status: "error".to_string(),
                            message: "Unauthorized".to_string(),
                        };
                        return Ok::<_, Infallible>(warp::reply::with_status(
                            warp::reply::json(&body),
                            StatusCode::UNAUTHORIZED,
                        ));
                    }

                    match runner.run_all_active() {
                        Ok(reports) => {
                            let failed = reports
                                .iter()
                                .filter(|r| matches!(r.outcome, TrialOutcome::Failed(_)))
                                .count();
                            if failed > 0 {
                                log::warn!("batch run: {} of {} trials failed", failed, reports.len());
                            }
                            let body = BatchResponse {
                                status: "ok".to_string(),
                                trials_processed: reports.len(),
                            };
                            Ok(warp::reply::with_status(
                                warp::reply::json(&body),
                                StatusCode::OK,
                            ))
                        }
                        Err(err) => {
                            let body = ErrorResponse {
                                status: "error".to_string(),
                                message: err.to_string(),
                            };
                            Ok(warp::reply::with_status(
                                warp::reply::json(&body),
                                StatusCode::INTERNAL_SERVER_ERROR,
                            ))
                        }
                    }
                }
            })
    }

    /// POST /run-ai/<trial_id>, manual trigger for one trial.
    fn run_single(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let runner = Arc::clone(&self.runner);

        warp::path!("run-ai" / String)
            .and(warp::post())
            .and_then(move |trial_id: String| {
                let runner = Arc::clone(&runner);
                async move {
                    match runner.run_trial(&trial_id, RunOptions::manual(None)) {
                        Ok(_) => {
                            let body = SingleRunResponse {
                                status: "completed".to_string(),
                                trial_id,
                            };
                            Ok::<_, Infallible>(warp::reply::with_status(
                                warp::reply::json(&body),
                                StatusCode::OK,
                            ))
                        }
                        Err(err) => {
                            let body = ErrorResponse {
                                status: "error".to_string(),
                                message: err.to_string(),
                            };
                            Ok(warp::reply::with_status(
                                warp::reply::json(&body),
                                StatusCode::INTERNAL_SERVER_ERROR,
                            ))
                        }
                    }
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FusionWeights, TrialPhase};
    use crate::store::MemoryStore;

    fn api_with_empty_store() -> RestApi {
        let store = Arc::new(MemoryStore::new());
        let runner = Arc::new(Runner::new(
            store,
            TrialPhase::Phase3,
            FusionWeights::default(),
        ));
        RestApi::new(runner, "s3cret".to_string())
    }

    #[tokio::test]
    async fn batch_endpoint_rejects_a_missing_or_wrong_secret() {
        let api = api_with_empty_store();
        let routes = api.routes();

        let res = warp::test::request()
            .method("POST")
            .path("/cron/run-daily-ai")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = warp::test::request()
            .method("POST")
            .path("/cron/run-daily-ai")
            .header("x-cron-secret", "wrong")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn batch_endpoint_reports_processed_trials() {
        let store = Arc::new(MemoryStore::new());
        store.add_active_trial("trial-empty");
        let runner = Arc::new(Runner::new(
            Arc::clone(&store) as Arc<dyn crate::store::TrialStore>,
            TrialPhase::Phase3,
            FusionWeights::default(),
        ));
        let api = RestApi::new(runner, "s3cret".to_string());
        let routes = api.routes();

        let res = warp::test::request()
            .method("POST")
            .path("/cron/run-daily-ai")
            .header("x-cron-secret", "s3cret")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["trials_processed"], 1);
    }

    #[tokio::test]
    async fn single_run_endpoint_completes_for_an_empty_trial() {
        let api = api_with_empty_store();
        let routes = api.routes();

        let res = warp::test::request()
            .method("POST")
            .path("/run-ai/trial-1")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["status"], "completed");
        assert_eq!(body["trial_id"], "trial-1");
    }
}
