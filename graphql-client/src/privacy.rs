use crate::endpoint::Endpoint;
use crate::request::GraphqlRequest;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

/// Source of the "is the current page a private repository" signal. The
/// heuristics live with the caller; the client only asks.
pub trait PageVisibility: Send + Sync {
    fn is_private_repository(&self) -> bool;
}

impl<F> PageVisibility for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_private_repository(&self) -> bool {
        self()
    }
}

/// A flag the caller flips as the user navigates between pages.
#[derive(Debug, Default)]
pub struct PrivatePageFlag(AtomicBool);

impl PrivatePageFlag {
    pub fn new(is_private: bool) -> Self {
        Self(AtomicBool::new(is_private))
    }

    pub fn set(&self, is_private: bool) {
        self.0.store(is_private, Ordering::Release);
    }
}

impl PageVisibility for PrivatePageFlag {
    fn is_private_repository(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Keeps possibly-private requests away from the public instance.
#[derive(Debug, Clone)]
pub struct PrivacyGate {
    public_endpoint: Endpoint,
}

impl PrivacyGate {
    pub fn new(public_endpoint: Endpoint) -> Self {
        Self { public_endpoint }
    }

    pub fn public_endpoint(&self) -> &Endpoint {
        &self.public_endpoint
    }

    /// Denies only when the target is the public endpoint, the page is
    /// private, and the request is flagged as possibly private.
    pub fn allow(
        &self,
        request: &GraphqlRequest,
        is_current_page_private_repo: bool,
        target: &Endpoint,
    ) -> bool {
        !(*target == self.public_endpoint
            && is_current_page_private_repo
            && request.might_contain_private_info)
    }
}
