use reqwest::{Client, StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server said {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

pub struct ClientCli {
    inner: Client,
    server: String,
    token: String,
}

impl ClientCli {
    pub fn new(server: &str, token: &str) -> Self {
        Self {
            inner: Client::new(),
            server: server.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.server, path)
    }

    pub async fn start_job(&self, job: &str) -> Result<(), CliError> {
        let body = self.call("job", &[("job", job)]).await?;
        println!("{}", body);
        Ok(())
    }

    pub async fn kill_job(&self, id: u64) -> Result<(), CliError> {
        let body = self.call("kill", &[("id", &id.to_string())]).await?;
        println!("{}", body);
        Ok(())
    }

    pub async fn query_status(&self, id: u64) -> Result<(), CliError> {
        let body = self.call("status", &[("id", &id.to_string())]).await?;
        println!("{}", body);
        Ok(())
    }

    async fn call(&self, path: &str, params: &[(&str, &str)]) -> Result<String, CliError> {
        let response = self
            .inner
            .get(self.endpoint(path))
            .query(params)
            .query(&[("token", self.token.as_str())])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(CliError::Rejected { status, body })
        }
    }
}
