//! Request issuing with manual redirect following.
//!
//! The HTTP client is built without a redirect policy so that the hop limit
//! and the handling of bad `Location` headers are under our control.

use reqwest::header::{LOCATION, RANGE};
use reqwest::{Client, Response};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::error::TransferError;

/// Issue a GET for `url`, following redirects up to `max_redirects` hops.
///
/// When `resume_from` is non-zero every hop carries a `Range` header
/// starting at that offset.
pub(super) async fn open(
    client: &Client,
    url: &str,
    resume_from: u64,
    max_redirects: usize,
    cancel: &CancellationToken,
) -> Result<Response, TransferError> {
    let mut current = Url::parse(url).map_err(|e| TransferError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let mut redirects = 0;

    loop {
        let mut request = client.get(current.clone());
        if resume_from > 0 {
            request = request.header(RANGE, format!("bytes={resume_from}-"));
        }

        debug!(url = %current, resume_from, hop = redirects, "Requesting");
        let response = tokio::select! {
            () = cancel.cancelled() => return Err(TransferError::Cancelled),
            result = request.send() => result?,
        };

        if !response.status().is_redirection() {
            return Ok(response);
        }

        if redirects == max_redirects {
            return Err(TransferError::TooManyRedirects {
                limit: max_redirects,
            });
        }

        current = redirect_target(&current, &response)?;
        redirects += 1;
    }
}

fn redirect_target(current: &Url, response: &Response) -> Result<Url, TransferError> {
    let location = response
        .headers()
        .get(LOCATION)
        .ok_or_else(|| {
            TransferError::InvalidRedirectUrl(format!(
                "HTTP {} without a Location header",
                response.status().as_u16()
            ))
        })?
        .to_str()
        .map_err(|e| TransferError::InvalidRedirectUrl(e.to_string()))?;

    let next = current
        .join(location)
        .map_err(|e| TransferError::InvalidRedirectUrl(format!("{location}: {e}")))?;

    match next.scheme() {
        "http" | "https" => Ok(next),
        other => Err(TransferError::InvalidRedirectUrl(format!(
            "{location}: unsupported scheme '{other}'"
        ))),
    }
}
