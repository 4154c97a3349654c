//! Role/capability authorization.
//!
//! A user has exactly one role and a role carries a list of capability strings.
//! Authorization is a set-membership test of the required capabilities against that list.

pub const MANAGE_SETTINGS: &str = "manage_settings";
pub const MANAGE_MENUS: &str = "manage_menus";
pub const MANAGE_USERS: &str = "manage_users";
pub const EDIT_POSTS: &str = "edit_posts";
pub const EDIT_OTHERS_POSTS: &str = "edit_others_posts";
pub const PUBLISH_POST: &str = "publish_post";
pub const DELETE_POSTS: &str = "delete_posts";
pub const MANAGE_PAGES: &str = "manage_pages";
pub const UPLOAD_MEDIA: &str = "upload_media";
pub const DELETE_MEDIA: &str = "delete_media";
pub const VIEW_ANALYTICS: &str = "view_analytics";

/// Every capability the backend checks for.
pub const ALL: &[&str] = &[
    MANAGE_SETTINGS,
    MANAGE_MENUS,
    MANAGE_USERS,
    EDIT_POSTS,
    EDIT_OTHERS_POSTS,
    PUBLISH_POST,
    DELETE_POSTS,
    MANAGE_PAGES,
    UPLOAD_MEDIA,
    DELETE_MEDIA,
    VIEW_ANALYTICS,
];

/// How a list of required capabilities is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// At least one required capability must be granted.
    Any,
    /// Every required capability must be granted.
    All,
}

/// Returns true when `granted` satisfies `required` under `mode`.
///
/// With an empty `required` list, `All` holds vacuously and `Any` never does.
pub fn is_allowed<S: AsRef<str>>(granted: &[S], required: &[&str], mode: Mode) -> bool {
    let has = |cap: &&str| granted.iter().any(|g| g.as_ref() == *cap);
    match mode {
        Mode::Any => required.iter().any(has),
        Mode::All => required.iter().all(has),
    }
}

/// A set of capabilities and how they must be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement<'a> {
    pub capabilities: &'a [&'a str],
    pub mode: Mode,
}

impl<'a> Requirement<'a> {
    pub const fn any(capabilities: &'a [&'a str]) -> Self {
        Self { capabilities, mode: Mode::Any }
    }

    pub const fn all(capabilities: &'a [&'a str]) -> Self {
        Self { capabilities, mode: Mode::All }
    }

    pub fn is_met_by<S: AsRef<str>>(&self, granted: &[S]) -> bool {
        is_allowed(granted, self.capabilities, self.mode)
    }
}
