use backon::{ExponentialBuilder, Retryable};
use tracing::warn;
use url::Url;

use crate::error::ChronikosError;
use crate::types::openai::ChatCompletionRequest;

pub struct OpenAiApi;

impl OpenAiApi {
    /// POST `{base_url}/chat/completions`, retrying while the upstream answers 5xx.
    pub async fn try_post_chat(
        client: reqwest::Client,
        base_url: &Url,
        api_key: impl AsRef<str>,
        retry_policy: ExponentialBuilder,
        body: &ChatCompletionRequest<'_>,
    ) -> Result<reqwest::Response, ChronikosError> {
        let url = base_url.join("chat/completions")?;

        let resp = (|| async {
            let resp = client
                .post(url.clone())
                .bearer_auth(api_key.as_ref())
                .json(body)
                .send()
                .await?;
            if resp.status().is_server_error() {
                let status = resp.status();
                let err = resp.error_for_status().unwrap_err();
                warn!("LLM server error (will retry): {}", status);
                return Err(err);
            }
            Ok(resp)
        })
        .retry(retry_policy)
        .await?;
        Ok(resp)
    }
}
