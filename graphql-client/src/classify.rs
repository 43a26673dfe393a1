//! Maps one HTTP attempt onto the next step of the retry state machine.
//!
//! Kept free of I/O so every branch can be tested without a server.

use crate::endpoint::Endpoint;
use crate::envelope::ResponseEnvelope;
use crate::error::AuthRequiredError;
use crate::error::GraphqlClientError;
use crate::error::TransportError;
use crate::transport::HttpResponse;
use crate::transport::truncate_body;
use reqwest::StatusCode;
use serde_json::Value;

/// What the client knows about the attempt it just made.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Attempt<'a> {
    pub endpoint: &'a Endpoint,
    pub at_public_default: bool,
    /// A hop to the public default is still possible: retry is enabled, the
    /// default has not been tried, and the privacy gate allows it.
    pub can_fall_back: bool,
    pub sent_token: bool,
    /// The one token-invalidation replay for this endpoint is still unused.
    pub can_replay_token: bool,
    pub repository_specific: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Step {
    Success {
        envelope: ResponseEnvelope,
        remember_affinity: bool,
    },
    RetryDifferentEndpoint {
        evict_affinity: bool,
    },
    RetryAfterTokenInvalidation,
    Terminal {
        outcome: Result<ResponseEnvelope, GraphqlClientError>,
        evict_affinity: bool,
    },
}

impl Step {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Step::Success { .. } => "success",
            Step::RetryDifferentEndpoint { .. } => "retry-different-endpoint",
            Step::RetryAfterTokenInvalidation => "retry-after-token-invalidation",
            Step::Terminal { outcome: Ok(_), .. } => "terminal-envelope",
            Step::Terminal { outcome: Err(_), .. } => "terminal-error",
        }
    }
}

/// Classify in priority order: transport failure / non-2xx, 401, not
/// resolvable here, success. A 401 overwrites `last_auth_error` so the latest
/// one wins.
pub(crate) fn classify(
    attempt: Attempt<'_>,
    result: Result<HttpResponse, TransportError>,
    last_auth_error: &mut Option<AuthRequiredError>,
) -> Step {
    let response = match result {
        Ok(response) => response,
        Err(err) => return fail(attempt, err, last_auth_error),
    };

    if response.status == StatusCode::UNAUTHORIZED {
        *last_auth_error = Some(AuthRequiredError {
            endpoint: attempt.endpoint.clone(),
        });
        if attempt.sent_token && attempt.can_replay_token {
            return Step::RetryAfterTokenInvalidation;
        }
        let err = TransportError::Status {
            status: response.status,
            body: truncate_body(&response.body),
        };
        return fail(attempt, err, last_auth_error);
    }

    if !response.status.is_success() {
        let err = TransportError::Status {
            status: response.status,
            body: truncate_body(&response.body),
        };
        return fail(attempt, err, last_auth_error);
    }

    let envelope: ResponseEnvelope = match serde_json::from_slice(&response.body) {
        Ok(envelope) => envelope,
        Err(err) => return fail(attempt, err.into(), last_auth_error),
    };

    if !is_resolvable(&envelope) {
        if attempt.can_fall_back {
            return Step::RetryDifferentEndpoint {
                evict_affinity: true,
            };
        }
        // "Not found" can be a legitimate answer; hand the envelope back.
        return Step::Terminal {
            outcome: Ok(envelope),
            evict_affinity: true,
        };
    }

    let resolved_repository = envelope
        .repository()
        .is_some_and(|repository| !repository.is_null());
    Step::Success {
        remember_affinity: attempt.repository_specific
            && resolved_repository
            && !attempt.at_public_default,
        envelope,
    }
}

fn fail(
    attempt: Attempt<'_>,
    err: TransportError,
    last_auth_error: &Option<AuthRequiredError>,
) -> Step {
    if attempt.can_fall_back {
        return Step::RetryDifferentEndpoint {
            evict_affinity: false,
        };
    }
    let error = match last_auth_error {
        Some(auth) => GraphqlClientError::AuthRequired(auth.clone()),
        None => GraphqlClientError::Transport(err),
    };
    Step::Terminal {
        outcome: Err(error),
        evict_affinity: true,
    }
}

/// False for a missing `data`, a `null` repository, or a repository with a
/// `null` commit that is not being cloned. Fields the query did not select
/// are absent, not null, and do not count.
fn is_resolvable(envelope: &ResponseEnvelope) -> bool {
    let Some(data) = envelope.data.as_ref().filter(|data| !data.is_null()) else {
        return false;
    };
    match data.get("repository") {
        None => true,
        Some(Value::Null) => false,
        Some(repository) => {
            let commit_missing = matches!(repository.get("commit"), Some(Value::Null));
            !(commit_missing && !envelope.clone_in_progress())
        }
    }
}
