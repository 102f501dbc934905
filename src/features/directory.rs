use crate::features::error::{DirectoryError, TransportError};
use crate::structs::{ClientId, ClientSuggestion};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

const MIN_NAME_CHARS: usize = 2;
const MAX_NAME_CHARS: usize = 100;

/// Whether two names refer to the same client: equal after trimming, ignoring case.
#[must_use]
pub fn same_client_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Backend client directory.
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    async fn list_clients(&self) -> Result<Vec<ClientSuggestion>, TransportError>;

    /// Creates a client. Not idempotent: every call makes a new record.
    async fn create_client(&self, name: &str) -> Result<ClientId, TransportError>;
}

/// Typeahead search over a cached client list, plus get-or-create resolution.
pub struct ClientDirectoryResolver {
    directory: Arc<dyn ClientDirectory>,
    cache: Vec<ClientSuggestion>,
    loaded: bool,
    suggestion_limit: usize,
}

impl ClientDirectoryResolver {
    pub fn new(directory: Arc<dyn ClientDirectory>, suggestion_limit: usize) -> Self {
        Self {
            directory,
            cache: Vec::new(),
            loaded: false,
            suggestion_limit,
        }
    }

    /// Replaces the cache with the directory's current client list.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::Transport`] if the listing fails. The previous cache is kept.
    pub async fn refresh(&mut self) -> Result<usize, DirectoryError> {
        let clients = self.directory.list_clients().await?;
        debug!(count = clients.len(), "Client directory loaded");
        self.cache = clients;
        self.loaded = true;
        Ok(self.cache.len())
    }

    #[must_use]
    pub fn cached(&self) -> &[ClientSuggestion] {
        &self.cache
    }

    /// Case-insensitive substring search over cached names, capped at the suggestion limit.
    /// A blank term matches every client.
    #[must_use]
    pub fn search(&self, term: &str) -> Suggestions<'_> {
        Suggestions {
            clients: self.cache.iter(),
            needle: term.trim().to_lowercase(),
            remaining: self.suggestion_limit,
        }
    }

    /// Cached client whose name equals `name`, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn find_exact(&self, name: &str) -> Option<&ClientSuggestion> {
        self.cache
            .iter()
            .find(|client| same_client_name(&client.name, name))
    }

    /// Returns the id of the client called `name`, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// * [`DirectoryError::InvalidName`] if the trimmed name is outside 2–100
    ///   characters. Checked before any backend call.
    /// * [`DirectoryError::Transport`] if loading the list or creating the client fails.
    pub async fn resolve(&mut self, name: &str) -> Result<ClientId, DirectoryError> {
        let name = name.trim();
        let length = name.chars().count();
        if !(MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&length) {
            return Err(DirectoryError::InvalidName(name.to_string()));
        }

        if !self.loaded {
            self.refresh().await?;
        }
        if let Some(existing) = self.find_exact(name) {
            debug!(client_id = %existing.id, "Resolved existing client");
            return Ok(existing.id);
        }

        let id = self.directory.create_client(name).await?;
        info!(client_id = %id, name, "Created client");
        self.cache.push(ClientSuggestion {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }
}

/// Lazy, capped iterator over matching clients. Clone it to restart from the top.
#[derive(Debug, Clone)]
pub struct Suggestions<'a> {
    clients: std::slice::Iter<'a, ClientSuggestion>,
    needle: String,
    remaining: usize,
}

impl<'a> Iterator for Suggestions<'a> {
    type Item = &'a ClientSuggestion;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let needle = &self.needle;
        let found = self
            .clients
            .find(|client| needle.is_empty() || client.name.to_lowercase().contains(needle.as_str()))?;
        self.remaining -= 1;
        Some(found)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining.min(self.clients.len())))
    }
}
