//! Identity provider wrapper.
//!
//! Wraps the user directory, its client registration, the request authorizer
//! and the privileged-role grouping behind an explicit state machine. Stage
//! order is a hard precondition, not a convention: running a stage out of
//! order (or twice) aborts composition.

use crate::error::{ComposeError, ComposeResult};
use crate::resource::context::Composition;
use crate::resource::{AuthorizerHandle, ClientHandle, DirectoryHandle, RoleHandle};

/// Composition stages of the identity provider, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Uninitialized,
    DirectoryCreated,
    ClientRegistered,
    AuthorizerAttached,
    PrivilegedGroupLinked,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Uninitialized => "uninitialized",
            Stage::DirectoryCreated => "directory_created",
            Stage::ClientRegistered => "client_registered",
            Stage::AuthorizerAttached => "authorizer_attached",
            Stage::PrivilegedGroupLinked => "privileged_group_linked",
        }
    }
}

pub struct IdentityProvider {
    service: String,
    stage: Stage,
    directory: Option<DirectoryHandle>,
    client: Option<ClientHandle>,
    authorizer: Option<AuthorizerHandle>,
}

impl IdentityProvider {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            stage: Stage::Uninitialized,
            directory: None,
            client: None,
            authorizer: None,
        }
    }

    /// Run every stage in order. The privileged-group link requires a role
    /// handle from a collaborator.
    pub fn initialize(
        cx: &mut Composition,
        service: impl Into<String>,
        role: Option<&RoleHandle>,
    ) -> ComposeResult<Self> {
        let mut provider = Self::new(service);
        provider.create_directory(cx)?;
        provider.register_client(cx)?;
        provider.attach_authorizer(cx)?;
        provider.link_privileged_group(cx, role)?;
        Ok(provider)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn expect_stage(&self, expected: Stage, operation: &'static str) -> ComposeResult<()> {
        if self.stage != expected {
            return Err(ComposeError::missing_prerequisite(
                operation,
                expected.as_str(),
                self.stage.as_str(),
            ));
        }
        Ok(())
    }

    pub fn create_directory(&mut self, cx: &mut Composition) -> ComposeResult<()> {
        self.expect_stage(Stage::Uninitialized, "create_directory")?;
        let name = format!("{}-users", self.service);
        let directory = cx.create_directory(&name)?;
        cx.add_output("DirectoryId", directory.directory_id());
        tracing::debug!(directory = %name, "created user directory");
        self.directory = Some(directory);
        self.stage = Stage::DirectoryCreated;
        Ok(())
    }

    pub fn register_client(&mut self, cx: &mut Composition) -> ComposeResult<()> {
        self.expect_stage(Stage::DirectoryCreated, "register_client")?;
        let directory = self.directory()?;
        let name = format!("{}-client", directory.id());
        let client = cx.register_client(&name, directory)?;
        cx.add_output("DirectoryClientId", client.id());
        self.client = Some(client);
        self.stage = Stage::ClientRegistered;
        Ok(())
    }

    pub fn attach_authorizer(&mut self, cx: &mut Composition) -> ComposeResult<()> {
        self.expect_stage(Stage::ClientRegistered, "attach_authorizer")?;
        let directory = self.directory()?;
        let name = format!("{}-authorizer", self.service);
        let authorizer = cx.attach_authorizer(&name, directory)?;
        self.authorizer = Some(authorizer);
        self.stage = Stage::AuthorizerAttached;
        Ok(())
    }

    /// Terminal stage. The role comes from a collaborator (the composition
    /// root); linking without one is a configuration error.
    pub fn link_privileged_group(
        &mut self,
        cx: &mut Composition,
        role: Option<&RoleHandle>,
    ) -> ComposeResult<()> {
        self.expect_stage(Stage::AuthorizerAttached, "link_privileged_group")?;
        let role = role.ok_or(ComposeError::MissingRole)?;
        let directory = self.directory()?;
        cx.link_group("admins", directory, role)?;
        self.stage = Stage::PrivilegedGroupLinked;
        Ok(())
    }

    /// The directory's identifier. Available from `DirectoryCreated` onward.
    pub fn directory_id(&self) -> ComposeResult<&str> {
        self.directory
            .as_ref()
            .map(|d| d.directory_id())
            .ok_or_else(|| ComposeError::not_initialized("directory_id", "create_directory"))
    }

    pub fn directory(&self) -> ComposeResult<&DirectoryHandle> {
        self.directory
            .as_ref()
            .ok_or_else(|| ComposeError::not_initialized("directory", "create_directory"))
    }

    pub fn client(&self) -> ComposeResult<&ClientHandle> {
        self.client
            .as_ref()
            .ok_or_else(|| ComposeError::not_initialized("client", "register_client"))
    }

    /// The request-authorization capability shared by every route binding.
    /// Available from `AuthorizerAttached` onward.
    pub fn authorizer(&self) -> ComposeResult<&AuthorizerHandle> {
        self.authorizer
            .as_ref()
            .ok_or_else(|| ComposeError::not_initialized("authorizer", "attach_authorizer"))
    }
}
