//! Tag and naming conventions of deployed stacks
//!
//! ## Conventions
//!
//! | Resource | Convention |
//! |----------|------------|
//! | EC2 instances, security groups, key pairs, spot requests | tag `Stack=<name>` |
//! | Filesystems | tag `Stack=<name>` or `Name=<name>-efs` |
//! | Mount targets, access points | children of the stack's filesystems |
//! | Load balancers, target groups, distributions, alarms, log groups, IAM | tag `Stack=<name>` |
//! | Policy attachments | children of the stack's roles |

use std::collections::HashMap;

/// Default tag key carrying the stack name
pub const TAG_STACK: &str = "Stack";

/// Tag key holding a resource's display name
pub const TAG_NAME: &str = "Name";

/// Suffix appended to the stack name for its shared filesystem
pub const EFS_NAME_SUFFIX: &str = "-efs";

/// Conventional filesystem name for a stack
pub fn efs_name_for(stack: &str) -> String {
    format!("{stack}{EFS_NAME_SUFFIX}")
}

/// Extract tags from any provider tag type into a HashMap.
///
/// Provider SDKs each ship their own tag struct with key/value accessors of
/// differing optionality; closures adapt each one.
pub fn extract_tags<T>(
    tags: &[T],
    key: impl Fn(&T) -> Option<&str>,
    value: impl Fn(&T) -> Option<&str>,
) -> HashMap<String, String> {
    tags.iter()
        .filter_map(|t| match (key(t), value(t)) {
            (Some(k), Some(v)) => Some((k.to_string(), v.to_string())),
            _ => None,
        })
        .collect()
}

/// The `Name` tag, if any
pub fn name_tag(tags: &HashMap<String, String>) -> Option<String> {
    tags.get(TAG_NAME).cloned()
}
