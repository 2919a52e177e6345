use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use serde::Deserialize;
use tokio::process::Command;

/// HTTP client using curl for making GitHub API requests.
///
/// The token travels only in the Authorization header; it is never part of
/// the URL or of any error text.
pub struct GithubCurlClient {
    token: String,
}

#[derive(Debug, Deserialize)]
struct GithubError {
    message: String,
}

impl GithubCurlClient {
    pub fn new(token: String) -> Self {
        Self { token }
    }

    /// Make a POST request with a JSON body
    pub async fn post(&self, url: &str, json_data: &str) -> Result<String> {
        self.request("POST", url, json_data).await
    }

    /// Make a PUT request with a JSON body
    pub async fn put(&self, url: &str, json_data: &str) -> Result<String> {
        self.request("PUT", url, json_data).await
    }

    /// Send a request and return the response body.
    ///
    /// curl appends the HTTP status to the output via `-w`; a 4xx/5xx status
    /// becomes an error carrying the response body. There is no timeout.
    async fn request(&self, method: &str, url: &str, json_data: &str) -> Result<String> {
        let output = Command::new("curl")
            .args([
                "-s",
                "-w",
                "\n%{http_code}",
                "-X",
                method,
                "-H",
                &format!("Authorization: Bearer {}", self.token),
                "-H",
                "Accept: application/vnd.github+json",
                "-H",
                "Content-Type: application/json",
                "-H",
                "User-Agent: prbot",
                "-d",
                json_data,
                url,
            ])
            .output()
            .await
            .context("Failed to execute curl command")?;

        if !output.status.success() {
            bail!(
                "curl command failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }

        parse_response(output.stdout)
    }
}

/// Split the `-w`-appended status code off the response and check it.
fn parse_response(stdout: Vec<u8>) -> Result<String> {
    let raw = String::from_utf8(stdout)?;
    let (body, status) = match raw.rsplit_once('\n') {
        Some((body, trailer)) => (body, trailer.trim().parse::<u16>().unwrap_or(0)),
        None => (raw.as_str(), 0),
    };

    if status >= 400 {
        // Surface the API's own message when the body is parseable
        if let Ok(error) = serde_json::from_str::<GithubError>(body) {
            bail!("GitHub API error: {}", error.message);
        }
        bail!(
            "GitHub API request failed with status {}: {}",
            status,
            body
        );
    }

    Ok(body.to_string())
}
