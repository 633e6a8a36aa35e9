use std::future::Future;

use core_types::{BoxError, ContextResult};
use futures::FutureExt;
use futures::future::BoxFuture;

type ReleaseAction = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

struct Registered {
    name: String,
    action: ReleaseAction,
}

/// Ordered builder that remembers how to undo every step that succeeded.
///
/// Each acquired resource registers a release action with [`Startup::defer`].
/// When a later step fails inside [`Startup::attempt`], every registered action
/// runs in reverse registration order before the step's error is handed back.
/// On success, [`Startup::finish`] moves the actions into a [`Release`].
#[derive(Default)]
pub struct Startup {
    stack: Vec<Registered>,
    released: Vec<String>,
}

impl Startup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the cleanup for a resource that was just acquired.
    pub fn defer<F, Fut>(&mut self, name: &str, release: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.stack.push(Registered {
            name: name.to_string(),
            action: Box::new(move || release().boxed()),
        });
    }

    /// Runs one startup step. A failure rolls back everything registered so far.
    pub async fn attempt<T, Fut>(&mut self, name: &str, step: Fut) -> ContextResult<T>
    where
        Fut: Future<Output = ContextResult<T>>,
    {
        match step.await {
            Ok(value) => {
                tracing::debug!(step = name, "Startup step completed");
                Ok(value)
            }
            Err(err) => {
                tracing::error!(step = name, error = %err, "Startup step failed, rolling back");
                self.rollback().await;
                Err(err)
            }
        }
    }

    /// Releases everything registered so far, newest first.
    pub async fn rollback(&mut self) {
        let stack = std::mem::take(&mut self.stack);
        let released = release_in_reverse(stack).await;
        self.released.extend(released);
    }

    /// Names of the resources released by rollbacks, in the order they ran.
    pub fn released(&self) -> &[String] {
        &self.released
    }

    /// Number of release actions waiting to run.
    pub fn pending(&self) -> usize {
        self.stack.len()
    }

    pub fn finish(self) -> Release {
        Release { stack: self.stack }
    }
}

/// The teardown of a fully started application.
///
/// Dropping it without calling [`Release::release_all`] skips every action.
#[must_use = "resources are only released by `release_all`"]
pub struct Release {
    stack: Vec<Registered>,
}

impl Release {
    /// Resource names in the order they will be released.
    pub fn names(&self) -> Vec<&str> {
        self.stack.iter().rev().map(|r| r.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Runs every action sequentially, newest first. Failures are logged and skipped.
    pub async fn release_all(self) -> Vec<String> {
        tracing::info!(resources = self.stack.len(), "Releasing application resources");
        release_in_reverse(self.stack).await
    }
}

async fn release_in_reverse(stack: Vec<Registered>) -> Vec<String> {
    let mut released = Vec::with_capacity(stack.len());
    for Registered { name, action } in stack.into_iter().rev() {
        match action().await {
            Ok(()) => tracing::debug!(resource = %name, "Released"),
            Err(e) => tracing::error!(resource = %name, error = %e, "Release failed"),
        }
        released.push(name);
    }
    released
}
