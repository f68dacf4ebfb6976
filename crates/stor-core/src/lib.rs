//! Foundational building blocks for the storage-management service.
//!
//! Provides argument validation, JSON string escaping, bounded reply buffers,
//! and the fixed shell command catalog shared by the runtime and transports.

pub mod argument_validator;
pub mod command_catalog;
pub mod error;
pub mod json_escape;
pub mod reply_buffer;

pub use argument_validator::{
    extract_argument, is_allowed_argument, validate_argument, ValidatedArgument,
    ALLOWED_ARGUMENT_CHARS, MAX_ARGUMENT_BYTES,
};
pub use command_catalog::{
    CommandCatalog, CommandLine, CommandTemplate, ARGUMENT_PLACEHOLDER, METHOD_GET_USAGE,
    METHOD_KILL_RESIZE_MEDIA, METHOD_LIST_GROUPS, METHOD_LIST_MOUNTS, METHOD_LIST_VOLUMES,
    METHOD_MOUNT_EXT3FS, METHOD_MOUNT_MEDIA, METHOD_MOUNT_OPTWARE, METHOD_RESIZE_MEDIA,
    METHOD_STATUS, METHOD_UNMOUNT_BIND, METHOD_UNMOUNT_EXT3FS, METHOD_UNMOUNT_MEDIA,
    METHOD_UNMOUNT_OPTWARE, METHOD_VERSION,
};
pub use error::StorageError;
pub use json_escape::{
    escaped_prefix_len, json_escape_bytes, json_escape_str, json_escaped_byte_len,
    MAX_ESCAPE_INPUT_BYTES,
};
pub use reply_buffer::ReplyBuffer;
