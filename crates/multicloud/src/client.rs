//! The MultiCloud client
//!
//! Combines the injected collaborators (template source, credential store,
//! authorization callback) with the OAuth2 engine and the template-driven
//! operations.
//!
//! ## Design Notes
//!
//! - One foreground call at a time: every public operation takes a
//!   `try_lock` on an internal guard and fails with
//!   [`FacadeError::OperationInProgress`] instead of queueing.
//! - Expired tokens with a refresh token are refreshed before the operation
//!   is built.
//! - [`MultiCloud::abort`] cancels the running operation or grant.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use multicloud_core::config::Config;
use multicloud_core::domain::{
    AccountInfo, AccountQuota, FileDescriptor, OAuth2Settings, OperationKind, ProviderTemplates,
    RequestTemplate, Token,
};
use multicloud_core::ports::{
    AuthorizationCallback, CredentialStore, ProgressListener, ProgressTracker, TemplateSource,
};
use multicloud_http::download::{DownloadSource, FileDownloadOp};
use multicloud_http::ops::{
    require_file, require_folder, AccountInfoOp, AccountQuotaOp, CopyOp, DeleteOp,
    FolderCreateOp, FolderListOp, MoveOp, RenameOp,
};
use multicloud_http::upload::{FileUploadOp, UploadTemplates};
use multicloud_http::{CloudClient, Operation, OperationHandler, OperationOutcome};
use multicloud_oauth2::{AuthorizationOutcome, GrantFactory, OAuth2, RedirectListener};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::account::{Account, AccountRegistry};
use crate::error::{FacadeError, Result};

/// Multi-provider cloud storage client
pub struct MultiCloud {
    templates: Arc<dyn TemplateSource>,
    credentials: Arc<dyn CredentialStore>,
    accounts: AccountRegistry,
    oauth: OAuth2,
    http: reqwest::Client,
    config: Config,
    progress: Option<Arc<dyn ProgressListener>>,
    guard: tokio::sync::Mutex<()>,
    current: Mutex<Option<CancellationToken>>,
}

impl MultiCloud {
    /// Creates a client
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::Config`] when `config` fails validation.
    pub fn new(
        templates: Arc<dyn TemplateSource>,
        credentials: Arc<dyn CredentialStore>,
        config: Config,
    ) -> Result<Self> {
        let problems = config.validate();
        if !problems.is_empty() {
            let joined = problems
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(FacadeError::Config(joined));
        }

        let http = reqwest::Client::builder()
            .user_agent(config.http.user_agent.clone())
            .build()
            .map_err(|e| FacadeError::Operation(e.into()))?;
        let listener = Arc::new(RedirectListener::from_config(&config.oauth));
        let oauth = OAuth2::new(&config.oauth, listener)
            .with_http_client(http.clone())
            .with_store(Arc::clone(&credentials));

        Ok(Self {
            templates,
            credentials,
            accounts: AccountRegistry::new(),
            oauth,
            http,
            config,
            progress: None,
            guard: tokio::sync::Mutex::new(()),
            current: Mutex::new(None),
        })
    }

    /// Surfaces authorization URLs through `callback`
    pub fn with_callback(mut self, callback: Arc<dyn AuthorizationCallback>) -> Self {
        self.oauth = self.oauth.with_callback(callback);
        self
    }

    /// Reports transfer progress of uploads and downloads to `listener`
    pub fn with_progress_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.progress = Some(listener);
        self
    }

    /// Makes a custom grant available to providers that name it
    pub fn register_grant(&mut self, name: impl Into<String>, factory: GrantFactory) {
        self.oauth.register_extension(name, factory);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn redirect_listener(&self) -> &Arc<RedirectListener> {
        self.oauth.listener()
    }

    /// Cancels the running operation or authorization, if any
    pub fn abort(&self) {
        if let Some(token) = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            token.cancel();
        }
        self.oauth.abort();
    }

    /// Stops the redirect listener if a grant started it
    pub async fn shutdown(&self) {
        self.oauth.listener().stop().await;
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Registers an account for a known provider
    ///
    /// # Errors
    ///
    /// Fails for a blank name, a name already in use or an unknown provider.
    pub fn add_account(&self, name: &str, provider: &str) -> Result<Account> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FacadeError::EmptyName);
        }
        if self.provider(provider)?.is_none() {
            return Err(FacadeError::UnknownProvider(provider.to_string()));
        }

        let account = Account::new(name, provider);
        if !self.accounts.insert(account.clone()) {
            return Err(FacadeError::AccountExists(name.to_string()));
        }
        info!(account = %name, provider = %provider, "Account added");
        Ok(account)
    }

    /// Re-registers a previously persisted account, token identifier included
    pub fn restore_account(&self, account: Account) -> Result<()> {
        let name = account.name.clone();
        if !self.accounts.insert(account) {
            return Err(FacadeError::AccountExists(name));
        }
        Ok(())
    }

    /// Removes an account and deletes its stored token
    pub async fn remove_account(&self, name: &str) -> Result<Account> {
        let account = self
            .accounts
            .remove(name)
            .ok_or_else(|| FacadeError::NoAccount(name.to_string()))?;
        if let Some(token_id) = &account.token_id {
            self.credentials
                .delete(token_id)
                .await
                .map_err(FacadeError::Storage)?;
        }
        info!(account = %name, "Account removed");
        Ok(account)
    }

    pub fn account(&self, name: &str) -> Result<Account> {
        self.accounts
            .get(name)
            .ok_or_else(|| FacadeError::NoAccount(name.to_string()))
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.accounts.list()
    }

    /// Root folder descriptor of the account's provider
    pub fn root_folder(&self, name: &str) -> Result<FileDescriptor> {
        let account = self.account(name)?;
        let root = self
            .provider(&account.provider)?
            .and_then(|templates| templates.root_folder)
            .unwrap_or_else(|| FileDescriptor::folder_at("/"));
        Ok(FileDescriptor {
            is_root: true,
            ..root
        })
    }

    // ========================================================================
    // Authorization
    // ========================================================================

    /// Runs the provider's OAuth2 grant for an account
    ///
    /// A previously stored token is replaced under the same identifier. On
    /// failure the account keeps its previous state.
    pub async fn authorize_account(&self, name: &str) -> Result<AuthorizationOutcome> {
        let _guard = self.lock()?;
        let account = self.account(name)?;
        let settings = self.oauth_settings(&account.provider)?;

        let outcome = self
            .oauth
            .authorize(&settings, account.token_id.as_deref())
            .await?;
        if let AuthorizationOutcome::Authorized { store_key, .. } = &outcome {
            self.accounts.set_token_id(name, Some(store_key.clone()));
        }
        Ok(outcome)
    }

    /// Refreshes an account's token regardless of its expiry
    pub async fn refresh_account(&self, name: &str) -> Result<AuthorizationOutcome> {
        let _guard = self.lock()?;
        let account = self.account(name)?;
        let token_id = account
            .token_id
            .clone()
            .ok_or_else(|| FacadeError::NotAuthorized(name.to_string()))?;
        let settings = self.oauth_settings(&account.provider)?;
        Ok(self.oauth.refresh(&settings, &token_id).await?)
    }

    // ========================================================================
    // Operations
    // ========================================================================

    pub async fn account_info(&self, name: &str) -> Result<OperationOutcome<AccountInfo>> {
        let _guard = self.lock()?;
        let account = self.account(name)?;
        let template = self.template(&account, OperationKind::AccountInfo)?;
        self.run(&account, AccountInfoOp::new(template)).await
    }

    pub async fn account_quota(&self, name: &str) -> Result<OperationOutcome<AccountQuota>> {
        let _guard = self.lock()?;
        let account = self.account(name)?;
        let template = self.template(&account, OperationKind::AccountQuota)?;
        self.run(&account, AccountQuotaOp::new(template)).await
    }

    /// Lists the children of `folder`
    pub async fn list_folder(
        &self,
        name: &str,
        folder: &FileDescriptor,
        show_deleted: bool,
    ) -> Result<OperationOutcome<FileDescriptor>> {
        let _guard = self.lock()?;
        let account = self.account(name)?;
        require_folder(folder)?;
        let template = self.template(&account, OperationKind::ListFolder)?;
        let handler = FolderListOp::new(template, folder.clone())?.show_deleted(show_deleted);
        self.run(&account, handler).await
    }

    pub async fn create_folder(
        &self,
        name: &str,
        parent: &FileDescriptor,
        folder_name: &str,
    ) -> Result<OperationOutcome<FileDescriptor>> {
        let _guard = self.lock()?;
        let account = self.account(name)?;
        require_folder(parent)?;
        let template = self.template(&account, OperationKind::CreateFolder)?;
        let handler = FolderCreateOp::new(template, parent.clone(), folder_name)?;
        self.run(&account, handler).await
    }

    pub async fn rename(
        &self,
        name: &str,
        item: &FileDescriptor,
        new_name: &str,
    ) -> Result<OperationOutcome<FileDescriptor>> {
        let _guard = self.lock()?;
        let account = self.account(name)?;
        let template = self.template(&account, OperationKind::Rename)?;
        let handler = RenameOp::new(template, item.clone(), new_name)?;
        self.run(&account, handler).await
    }

    /// Copies `item` into `destination`, optionally under a new name
    pub async fn copy(
        &self,
        name: &str,
        item: &FileDescriptor,
        destination: &FileDescriptor,
        new_name: Option<&str>,
    ) -> Result<OperationOutcome<FileDescriptor>> {
        let _guard = self.lock()?;
        let account = self.account(name)?;
        require_folder(destination)?;
        let template = self.template(&account, OperationKind::Copy)?;
        let handler = CopyOp::new(
            template,
            item.clone(),
            destination.clone(),
            new_name.map(str::to_string),
        )?;
        self.run(&account, handler).await
    }

    /// Moves `item` into `destination`, optionally under a new name
    pub async fn move_item(
        &self,
        name: &str,
        item: &FileDescriptor,
        destination: &FileDescriptor,
        new_name: Option<&str>,
    ) -> Result<OperationOutcome<FileDescriptor>> {
        let _guard = self.lock()?;
        let account = self.account(name)?;
        require_folder(destination)?;
        let template = self.template(&account, OperationKind::Move)?;
        let handler = MoveOp::new(
            template,
            item.clone(),
            destination.clone(),
            new_name.map(str::to_string),
        )?;
        self.run(&account, handler).await
    }

    pub async fn delete(
        &self,
        name: &str,
        item: &FileDescriptor,
    ) -> Result<OperationOutcome<FileDescriptor>> {
        let _guard = self.lock()?;
        let account = self.account(name)?;
        let template = self.template(&account, OperationKind::Delete)?;
        self.run(&account, DeleteOp::new(template, item.clone())).await
    }

    /// Downloads one logical file from several accounts at once
    ///
    /// # Arguments
    ///
    /// * `sources` - `(account name, file as that account sees it)` pairs;
    ///   the first one is the reference the others must match
    /// * `destination` - Local path, created or truncated
    ///
    /// # Errors
    ///
    /// Fails with [`FacadeError::NoSources`] for an empty `sources` list and
    /// with [`FacadeError::Validation`] when a source is a folder.
    pub async fn download(
        &self,
        sources: &[(&str, FileDescriptor)],
        destination: impl Into<PathBuf>,
    ) -> Result<OperationOutcome<FileDescriptor>> {
        let _guard = self.lock()?;
        if sources.is_empty() {
            return Err(FacadeError::NoSources);
        }
        let mut resolved = Vec::with_capacity(sources.len());
        let mut first = None;
        for (name, file) in sources {
            let account = self.account(name)?;
            require_file(file)?;
            let template = self.template(&account, OperationKind::Download)?;
            let token = self.token(&account).await?;
            first.get_or_insert_with(|| account.clone());
            resolved.push(DownloadSource::new(
                account.name.clone(),
                file.clone(),
                template,
                token,
            ));
        }
        let mut handler = FileDownloadOp::new(resolved, destination)?
            .with_chunk_size(self.config.transfer.download_chunk_size);
        let account = first.ok_or(FacadeError::NoSources)?;
        if let Some(tracker) = self.tracker() {
            handler = handler.with_progress(tracker);
        }
        self.run(&account, handler).await
    }

    /// Uploads `size` bytes from `reader` as `file_name` inside `folder`
    pub async fn upload(
        &self,
        name: &str,
        folder: &FileDescriptor,
        file_name: &str,
        size: u64,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Result<OperationOutcome<FileDescriptor>> {
        let _guard = self.lock()?;
        let account = self.account(name)?;
        require_folder(folder)?;
        let provider = self
            .provider(&account.provider)?
            .ok_or_else(|| FacadeError::UnknownProvider(account.provider.clone()))?;
        let templates = UploadTemplates::from_provider(&provider);
        if templates.is_empty() {
            return Err(FacadeError::MissingTemplate {
                provider: account.provider.clone(),
                kind: OperationKind::UploadExecute,
            });
        }

        let mut handler = FileUploadOp::new(templates, folder.clone(), file_name, size, reader)?
            .with_chunk_size(self.config.transfer.upload_chunk_size)?;
        if let Some(tracker) = self.tracker() {
            handler = handler.with_progress(tracker);
        }
        self.run(&account, handler).await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn lock(&self) -> Result<tokio::sync::MutexGuard<'_, ()>> {
        self.guard
            .try_lock()
            .map_err(|_| FacadeError::OperationInProgress)
    }

    fn provider(&self, provider: &str) -> Result<Option<ProviderTemplates>> {
        self.templates
            .provider(provider)
            .map_err(FacadeError::Storage)
    }

    fn template(&self, account: &Account, kind: OperationKind) -> Result<RequestTemplate> {
        self.templates
            .template(&account.provider, kind)
            .map_err(FacadeError::Storage)?
            .ok_or_else(|| FacadeError::MissingTemplate {
                provider: account.provider.clone(),
                kind,
            })
    }

    fn oauth_settings(&self, provider: &str) -> Result<OAuth2Settings> {
        self.templates
            .oauth_settings(provider)
            .map_err(FacadeError::Storage)?
            .ok_or_else(|| FacadeError::MissingOAuthSettings(provider.to_string()))
    }

    fn tracker(&self) -> Option<Arc<ProgressTracker>> {
        self.progress.as_ref().map(|listener| {
            Arc::new(ProgressTracker::with_interval(
                Arc::clone(listener),
                self.config.transfer.progress_interval(),
            ))
        })
    }

    /// Loads the account's token, refreshing it first when it has expired
    async fn token(&self, account: &Account) -> Result<Token> {
        let not_authorized = || FacadeError::NotAuthorized(account.name.clone());
        let token_id = account.token_id.as_deref().ok_or_else(not_authorized)?;
        let token = self
            .credentials
            .retrieve(token_id)
            .await
            .map_err(FacadeError::Storage)?
            .ok_or_else(not_authorized)?;

        if !token.is_expired() {
            return Ok(token);
        }
        if !token.can_refresh() {
            warn!(account = %account.name, "Token expired and cannot be refreshed");
            return Ok(token);
        }

        debug!(account = %account.name, "Token expired, refreshing");
        let settings = self.oauth_settings(&account.provider)?;
        match self.oauth.refresh(&settings, token_id).await? {
            AuthorizationOutcome::Authorized { token, .. } => Ok(token),
            AuthorizationOutcome::Failed(error) => Err(FacadeError::Refresh(error)),
        }
    }

    async fn run<H: OperationHandler>(
        &self,
        account: &Account,
        handler: H,
    ) -> Result<OperationOutcome<H::Output>> {
        let token = self.token(account).await?;
        let cancellation = CancellationToken::new();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancellation.clone());

        let client = CloudClient::with_client(self.http.clone(), token);
        let mut operation = Operation::new(handler, client).with_cancellation(cancellation);
        let kind = operation.kind();
        debug!(account = %account.name, %kind, "Running operation");

        let executed = operation.execute().await;
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
        executed?;

        let outcome = operation.into_outcome();
        if let Some(error) = &outcome.error {
            warn!(account = %account.name, %kind, code = error.code, "Provider reported an error");
        }
        Ok(outcome)
    }
}

impl std::fmt::Debug for MultiCloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiCloud")
            .field("accounts", &self.accounts)
            .field("oauth", &self.oauth)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
