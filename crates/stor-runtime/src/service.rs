use std::{path::PathBuf, sync::Arc};

use stor_core::{
    CommandCatalog, METHOD_GET_USAGE, METHOD_KILL_RESIZE_MEDIA, METHOD_LIST_GROUPS,
    METHOD_LIST_MOUNTS, METHOD_LIST_VOLUMES, METHOD_MOUNT_EXT3FS, METHOD_MOUNT_MEDIA,
    METHOD_MOUNT_OPTWARE, METHOD_RESIZE_MEDIA, METHOD_STATUS, METHOD_UNMOUNT_BIND,
    METHOD_UNMOUNT_EXT3FS, METHOD_UNMOUNT_MEDIA, METHOD_UNMOUNT_OPTWARE, METHOD_VERSION,
};
use tracing::{debug, error, info};

use crate::{
    generic_failure_reply, handle_simple_command, handle_status, handle_version,
    unknown_method_reply, CommandRunner, ResizeCoordinator, ServiceRequest, TransportError,
    DEFAULT_MAX_LINE_BYTES, DEFAULT_SHELL,
};

pub const DEFAULT_MAX_REPLY_BYTES: usize = 64 * 1024;

/// Runtime limits and the shell used to run catalog commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub shell: PathBuf,
    pub max_reply_bytes: usize,
    pub max_line_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            max_reply_bytes: DEFAULT_MAX_REPLY_BYTES,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMethod {
    Status,
    Version,
    ListGroups,
    ListVolumes,
    ListMounts,
    GetUsage,
    UnmountBind,
    UnmountMedia,
    MountMedia,
    ResizeMedia,
    KillResizeMedia,
    UnmountExt3fs,
    MountExt3fs,
    UnmountOptware,
    MountOptware,
}

impl ServiceMethod {
    pub const ALL: [Self; 15] = [
        Self::Status,
        Self::Version,
        Self::ListGroups,
        Self::ListVolumes,
        Self::ListMounts,
        Self::GetUsage,
        Self::UnmountBind,
        Self::UnmountMedia,
        Self::MountMedia,
        Self::ResizeMedia,
        Self::KillResizeMedia,
        Self::UnmountExt3fs,
        Self::MountExt3fs,
        Self::UnmountOptware,
        Self::MountOptware,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => METHOD_STATUS,
            Self::Version => METHOD_VERSION,
            Self::ListGroups => METHOD_LIST_GROUPS,
            Self::ListVolumes => METHOD_LIST_VOLUMES,
            Self::ListMounts => METHOD_LIST_MOUNTS,
            Self::GetUsage => METHOD_GET_USAGE,
            Self::UnmountBind => METHOD_UNMOUNT_BIND,
            Self::UnmountMedia => METHOD_UNMOUNT_MEDIA,
            Self::MountMedia => METHOD_MOUNT_MEDIA,
            Self::ResizeMedia => METHOD_RESIZE_MEDIA,
            Self::KillResizeMedia => METHOD_KILL_RESIZE_MEDIA,
            Self::UnmountExt3fs => METHOD_UNMOUNT_EXT3FS,
            Self::MountExt3fs => METHOD_MOUNT_EXT3FS,
            Self::UnmountOptware => METHOD_UNMOUNT_OPTWARE,
            Self::MountOptware => METHOD_MOUNT_OPTWARE,
        }
    }
}

/// One storage service instance: config, command table, runner and the
/// resize slot.
#[derive(Debug, Clone)]
pub struct StorageService {
    config: ServiceConfig,
    catalog: CommandCatalog,
    runner: CommandRunner,
    resize: ResizeCoordinator,
}

impl StorageService {
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_catalog(config, CommandCatalog::default())
    }

    pub fn with_catalog(config: ServiceConfig, catalog: CommandCatalog) -> Self {
        let runner = CommandRunner::new(config.shell.clone(), config.max_line_bytes);
        Self {
            config,
            catalog,
            runner,
            resize: ResizeCoordinator::new(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn resize_coordinator(&self) -> &ResizeCoordinator {
        &self.resize
    }

    /// Routes one request to its handler. Every method replies at least once
    /// unless the reply channel itself fails.
    pub async fn dispatch(&self, request: Arc<ServiceRequest>) -> Result<(), TransportError> {
        let Some(method) = ServiceMethod::parse(request.method()) else {
            info!(method = request.method(), "unknown method");
            return request
                .respond(&unknown_method_reply(request.method()))
                .await;
        };
        debug!(method = method.as_str(), "dispatching request");

        match method {
            ServiceMethod::Status => handle_status(&request).await,
            ServiceMethod::Version => handle_version(&request).await,
            ServiceMethod::KillResizeMedia => self.resize.kill(&request).await,
            ServiceMethod::ResizeMedia => {
                let Some(template) = self.catalog.template(method.as_str()) else {
                    return self.reply_missing_template(&request, method).await;
                };
                self.resize
                    .start(
                        Arc::clone(&request),
                        template,
                        &self.runner,
                        self.config.max_reply_bytes,
                    )
                    .await
            }
            _ => {
                let Some(template) = self.catalog.template(method.as_str()) else {
                    return self.reply_missing_template(&request, method).await;
                };
                handle_simple_command(
                    &request,
                    template,
                    &self.runner,
                    self.config.max_reply_bytes,
                )
                .await
            }
        }
    }

    async fn reply_missing_template(
        &self,
        request: &ServiceRequest,
        method: ServiceMethod,
    ) -> Result<(), TransportError> {
        error!(method = method.as_str(), "no command template configured");
        request
            .respond(&generic_failure_reply(&format!(
                "No command configured for {}",
                method.as_str()
            )))
            .await
    }
}
