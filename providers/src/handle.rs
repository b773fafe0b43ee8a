//! Deferred-construction handle to a client.
//!
//! ```text
//! Uninitialized --get(), factory Ok--> Ready(client)     (terminal)
//! Uninitialized --get(), factory Err--> Uninitialized    (error returned)
//! ```
//!
//! Reads after construction go through [`OnceLock::get`] and take no lock.
//! Construction itself is serialized by a mutex, so concurrent first callers
//! never build two clients.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use crate::client::AiClient;
use crate::config::{ClientConfig, ClientDefaults};
use crate::error::ClientError;

type Factory<C> = Box<dyn Fn() -> Result<C, ClientError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Uninitialized,
    Ready,
}

pub struct ClientHandle<C> {
    client: OnceLock<C>,
    init_lock: Mutex<()>,
    attempts: AtomicU32,
    factory: Factory<C>,
}

impl<C> ClientHandle<C> {
    /// Create a handle that builds its client with `factory` on first use.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<C, ClientError> + Send + Sync + 'static,
    {
        Self {
            client: OnceLock::new(),
            init_lock: Mutex::new(()),
            attempts: AtomicU32::new(0),
            factory: Box::new(factory),
        }
    }

    /// The client, constructing it if this is the first successful call.
    ///
    /// A construction failure is returned to this caller and not cached; the
    /// next call runs the factory again.
    pub fn get(&self) -> Result<&C, ClientError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }

        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = self.client.get() {
            return Ok(client);
        }

        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(attempt, "Constructing client");

        match (self.factory)() {
            Ok(client) => {
                tracing::debug!(attempt, "Client handle ready");
                Ok(self.client.get_or_init(|| client))
            }
            Err(err) => {
                tracing::warn!(attempt, error = %err, "Client construction failed");
                Err(err)
            }
        }
    }

    /// The client if it has already been constructed. Never runs the factory.
    #[must_use]
    pub fn try_get(&self) -> Option<&C> {
        self.client.get()
    }

    #[must_use]
    pub fn state(&self) -> HandleState {
        if self.client.get().is_some() {
            HandleState::Ready
        } else {
            HandleState::Uninitialized
        }
    }

    /// How many times construction has been attempted.
    #[must_use]
    pub fn init_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl ClientHandle<AiClient> {
    /// Handle that resolves [`ClientConfig`] from the environment on first use.
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_defaults(ClientDefaults::default())
    }

    /// Like [`ClientHandle::from_env`], with file-level defaults for the
    /// non-secret settings.
    #[must_use]
    pub fn with_defaults(defaults: ClientDefaults) -> Self {
        Self::new(move || {
            let config = ClientConfig::from_env_with(&defaults)?;
            let client = AiClient::new(config)?;
            let policy = client.retry_policy();
            tracing::info!(
                model = client.model(),
                base_url = %client.base_url(),
                max_retries = policy.max_retries,
                timeout_secs = policy.timeout.as_secs(),
                "Completion client constructed"
            );
            Ok(client)
        })
    }
}

impl<C> std::fmt::Debug for ClientHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("state", &self.state())
            .field("init_attempts", &self.init_attempts())
            .finish_non_exhaustive()
    }
}
