use std::sync::{Arc, Mutex, PoisonError};

/// Life cycle state of a navigation request. Both [`Self::Complete`] and
/// [`Self::Failed`] are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavRequestState {
    Processing,
    Complete,
    Failed,
}

/// Handle of an asynchronously processed navigation request.
///
/// The handle is cheap to clone and all clones refer to the same request.
/// Clients poll [`Self::state`] until the request is finished.
pub struct NavRequest<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

struct Inner<T> {
    state: NavRequestState,
    data: Option<T>,
}

impl<T> NavRequest<T> {
    pub(crate) fn new() -> Self {
        Self::with_state(NavRequestState::Processing)
    }

    /// Creates an already failed request.
    pub(crate) fn failed() -> Self {
        Self::with_state(NavRequestState::Failed)
    }

    fn with_state(state: NavRequestState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { state, data: None })),
        }
    }

    pub fn state(&self) -> NavRequestState {
        self.lock(|inner| inner.state)
    }

    pub fn is_finished(&self) -> bool {
        self.state() != NavRequestState::Processing
    }

    /// Returns true if both handles refer to the same request.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Finishes the request successfully. A finished request is not changed.
    pub(crate) fn complete(&self, data: T) {
        self.lock(|inner| {
            if inner.state == NavRequestState::Processing {
                inner.state = NavRequestState::Complete;
                inner.data = Some(data);
            }
        });
    }

    /// Fails the request. A finished request is not changed.
    pub(crate) fn fail(&self) {
        self.lock(|inner| {
            if inner.state == NavRequestState::Processing {
                inner.state = NavRequestState::Failed;
            }
        });
    }

    fn lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut Inner<T>) -> R,
    {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut inner)
    }
}

impl<T: Clone> NavRequest<T> {
    /// Returns the result of a completed request.
    pub fn data(&self) -> Option<T> {
        self.lock(|inner| inner.data.clone())
    }
}

impl<T> Clone for NavRequest<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
