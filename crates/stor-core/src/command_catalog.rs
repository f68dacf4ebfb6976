use std::collections::BTreeMap;
use std::fmt;

use crate::{StorageError, ValidatedArgument};

/// Marker replaced by the validated argument when a template is rendered.
pub const ARGUMENT_PLACEHOLDER: &str = "{}";

pub const METHOD_STATUS: &str = "status";
pub const METHOD_VERSION: &str = "version";
pub const METHOD_LIST_GROUPS: &str = "listGroups";
pub const METHOD_LIST_VOLUMES: &str = "listVolumes";
pub const METHOD_LIST_MOUNTS: &str = "listMounts";
pub const METHOD_GET_USAGE: &str = "getUsage";
pub const METHOD_UNMOUNT_BIND: &str = "unmountBind";
pub const METHOD_UNMOUNT_MEDIA: &str = "unmountMedia";
pub const METHOD_MOUNT_MEDIA: &str = "mountMedia";
pub const METHOD_RESIZE_MEDIA: &str = "resizeMedia";
pub const METHOD_KILL_RESIZE_MEDIA: &str = "killResizeMedia";
pub const METHOD_UNMOUNT_EXT3FS: &str = "unmountExt3fs";
pub const METHOD_MOUNT_EXT3FS: &str = "mountExt3fs";
pub const METHOD_UNMOUNT_OPTWARE: &str = "unmountOptware";
pub const METHOD_MOUNT_OPTWARE: &str = "mountOptware";

const DEFAULT_TEMPLATES: &[(&str, &str, Option<&str>)] = &[
    (METHOD_LIST_GROUPS, "/usr/sbin/vgdisplay -c 2>&1", None),
    (
        METHOD_LIST_VOLUMES,
        "/usr/sbin/lvdisplay {} -c 2>&1",
        Some("group"),
    ),
    (METHOD_LIST_MOUNTS, "cat /proc/mounts 2>&1", None),
    (
        METHOD_GET_USAGE,
        "/bin/df -m /dev/mapper/{} 2>&1",
        Some("filesystem"),
    ),
    (METHOD_UNMOUNT_BIND, "/bin/umount {} 2>&1", Some("directory")),
    (
        METHOD_UNMOUNT_MEDIA,
        "( /usr/bin/pkill -SIGUSR1 cryptofs && /bin/umount /media/internal ) 2>&1",
        None,
    ),
    (
        METHOD_MOUNT_MEDIA,
        "( /bin/mount /media/internal && /usr/bin/pkill -SIGUSR2 cryptofs ) 2>&1",
        None,
    ),
    (
        METHOD_RESIZE_MEDIA,
        "/bin/resizefat -v /dev/mapper/store-media {} 2>&1",
        Some("size"),
    ),
    (METHOD_UNMOUNT_EXT3FS, "/bin/umount /media/ext3fs 2>&1", None),
    (METHOD_MOUNT_EXT3FS, "/bin/mount /media/ext3fs 2>&1", None),
    (
        METHOD_UNMOUNT_OPTWARE,
        "/sbin/stop org.webosinternals.optware 2>&1",
        None,
    ),
    (
        METHOD_MOUNT_OPTWARE,
        "/sbin/start org.webosinternals.optware 2>&1",
        None,
    ),
];

/// A shell command line assembled from a fixed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine(String);

impl CommandLine {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One fixed shell template and the request field that feeds it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    method: String,
    template: String,
    argument_field: Option<String>,
}

impl CommandTemplate {
    pub fn new(
        method: impl Into<String>,
        template: impl Into<String>,
        argument_field: Option<&str>,
    ) -> Self {
        Self {
            method: method.into(),
            template: template.into(),
            argument_field: argument_field.map(ToString::to_string),
        }
    }

    pub fn method(&self) -> &str {
        self.method.as_str()
    }

    pub fn template(&self) -> &str {
        self.template.as_str()
    }

    /// Name of the payload field substituted into the template.
    pub fn argument_field(&self) -> Option<&str> {
        self.argument_field.as_deref()
    }

    /// Substitutes `argument` into the template.
    ///
    /// Templates with a placeholder require an argument; templates without one
    /// refuse it.
    pub fn render(&self, argument: Option<&ValidatedArgument>) -> Result<CommandLine, StorageError> {
        let takes_argument = self.template.contains(ARGUMENT_PLACEHOLDER);
        match (takes_argument, argument) {
            (true, Some(argument)) => Ok(CommandLine(self.template.replacen(
                ARGUMENT_PLACEHOLDER,
                argument.as_str(),
                1,
            ))),
            (true, None) => Err(StorageError::MissingArgument {
                template: self.template.clone(),
            }),
            (false, Some(_)) => Err(StorageError::UnexpectedArgument {
                template: self.template.clone(),
            }),
            (false, None) => Ok(CommandLine(self.template.clone())),
        }
    }
}

/// Method name to shell template table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCatalog {
    templates: BTreeMap<String, CommandTemplate>,
}

impl Default for CommandCatalog {
    fn default() -> Self {
        let templates = DEFAULT_TEMPLATES
            .iter()
            .map(|(method, template, field)| {
                (
                    (*method).to_string(),
                    CommandTemplate::new(*method, *template, *field),
                )
            })
            .collect();
        Self { templates }
    }
}

impl CommandCatalog {
    /// Creates a catalog with no templates.
    pub fn empty() -> Self {
        Self {
            templates: BTreeMap::new(),
        }
    }

    /// Adds or replaces the template for one method.
    pub fn with_template(mut self, template: CommandTemplate) -> Self {
        self.templates
            .insert(template.method().to_string(), template);
        self
    }

    pub fn template(&self, method: &str) -> Option<&CommandTemplate> {
        self.templates.get(method)
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CommandCatalog, CommandTemplate, METHOD_GET_USAGE, METHOD_LIST_GROUPS,
        METHOD_LIST_VOLUMES, METHOD_RESIZE_MEDIA,
    };
    use crate::{validate_argument, StorageError};

    #[test]
    fn unit_default_catalog_covers_shell_backed_methods() {
        let catalog = CommandCatalog::default();
        let methods = catalog.methods().collect::<Vec<_>>();
        assert_eq!(methods.len(), 12);
        assert!(catalog.template("status").is_none());
        assert!(catalog.template("killResizeMedia").is_none());
        assert_eq!(
            catalog
                .template(METHOD_RESIZE_MEDIA)
                .and_then(CommandTemplate::argument_field),
            Some("size")
        );
    }

    #[test]
    fn functional_render_substitutes_validated_argument() {
        let catalog = CommandCatalog::default();
        let group = validate_argument("group", "store").expect("valid");
        let command = catalog
            .template(METHOD_LIST_VOLUMES)
            .expect("template")
            .render(Some(&group))
            .expect("render");
        assert_eq!(command.as_str(), "/usr/sbin/lvdisplay store -c 2>&1");

        let filesystem = validate_argument("filesystem", "store-media").expect("valid");
        let command = catalog
            .template(METHOD_GET_USAGE)
            .expect("template")
            .render(Some(&filesystem))
            .expect("render");
        assert_eq!(
            command.to_string(),
            "/bin/df -m /dev/mapper/store-media 2>&1"
        );
    }

    #[test]
    fn regression_render_rejects_argument_mismatches() {
        let catalog = CommandCatalog::default();
        let group = validate_argument("group", "store").expect("valid");
        assert!(matches!(
            catalog
                .template(METHOD_LIST_GROUPS)
                .expect("template")
                .render(Some(&group)),
            Err(StorageError::UnexpectedArgument { .. })
        ));
        assert!(matches!(
            catalog
                .template(METHOD_LIST_VOLUMES)
                .expect("template")
                .render(None),
            Err(StorageError::MissingArgument { .. })
        ));
    }

    #[test]
    fn unit_with_template_overrides_entry() {
        let catalog = CommandCatalog::empty().with_template(CommandTemplate::new(
            METHOD_RESIZE_MEDIA,
            "echo resizing {}",
            Some("size"),
        ));
        let size = validate_argument("size", "512").expect("valid");
        let command = catalog
            .template(METHOD_RESIZE_MEDIA)
            .expect("template")
            .render(Some(&size))
            .expect("render");
        assert_eq!(command.as_str(), "echo resizing 512");
    }
}
