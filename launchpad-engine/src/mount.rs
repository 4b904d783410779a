//! Selection of storage folders and their mount aliases.
//!
//! Folders are mounted under the mount home (e.g., `/home/work/<name>`)
//! unless they are given an alias. A relative alias is placed under the mount
//! home; an absolute alias is used as-is. Folders whose name starts with a
//! `.` are mounted automatically and cannot be selected or aliased.

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Absolute directories that an alias may not mount over.
const RESERVED_PATHS: &[&str] = &[
    "/bin", "/boot", "/dev", "/etc", "/lib", "/lib64", "/media", "/mnt", "/opt", "/proc",
    "/root", "/run", "/sbin", "/srv", "/sys", "/tmp", "/usr", "/var",
];

/// An error when changing a mount selection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The folder is not in the list of available folders.
    #[error("folder `{0}` does not exist")]
    UnknownFolder(String),

    /// The folder is mounted automatically.
    #[error("folder `{0}` is mounted automatically")]
    AutoMounted(String),

    /// The folder has not been selected.
    #[error("folder `{0}` is not selected")]
    NotSelected(String),

    /// Another folder already mounts at the same path.
    #[error("alias `{alias}` is already used by folder `{folder}`")]
    AliasInUse {
        /// The offending alias.
        alias: String,
        /// The folder that already mounts at the alias.
        folder: String,
    },

    /// The alias targets a reserved system directory.
    #[error("alias `{0}` targets a reserved path")]
    ReservedPath(String),

    /// The alias is malformed.
    #[error("alias `{0}` is not a valid path")]
    InvalidAlias(String),
}

/// A storage folder that can be mounted into a session.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Folder {
    /// The folder name.
    pub name: String,
}

impl Folder {
    /// Creates a folder with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Whether the folder is mounted automatically.
    pub fn is_auto_mount(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// The set of folders to mount and their aliases.
#[derive(Clone, Debug)]
pub struct Selection {
    /// The directory folders are mounted under by default.
    home: String,

    /// The folders the owner can mount.
    available: Vec<Folder>,

    /// The selected folders (in selection order) and their aliases.
    selected: IndexMap<String, Option<String>>,
}

impl Selection {
    /// Creates an empty selection mounting under `home`.
    pub fn new(home: impl Into<String>) -> Self {
        let home = home.into();

        Self {
            home: home.trim_end_matches('/').to_string(),
            available: Default::default(),
            selected: Default::default(),
        }
    }

    /// Gets the mount home.
    pub fn home(&self) -> &str {
        &self.home
    }

    /// Gets the available folders.
    pub fn available(&self) -> &[Folder] {
        &self.available
    }

    /// Replaces the available folders.
    ///
    /// Selected folders that are no longer available are deselected.
    pub fn set_available(&mut self, folders: Vec<Folder>) {
        self.available = folders;

        let available = &self.available;
        self.selected.retain(|name, _| {
            let keep = available
                .iter()
                .any(|folder| &folder.name == name && !folder.is_auto_mount());

            if !keep {
                debug!("folder `{name}` is no longer available and was deselected");
            }

            keep
        });
    }

    /// Gets the folders that are mounted automatically.
    pub fn auto_mounts(&self) -> impl Iterator<Item = &str> {
        self.available
            .iter()
            .filter(|folder| folder.is_auto_mount())
            .map(|folder| folder.name.as_str())
    }

    /// Gets the selected folders in selection order.
    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.selected.keys().map(String::as_str)
    }

    /// Whether no folder has been selected.
    ///
    /// Automatic mounts are not counted.
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selects a folder.
    ///
    /// Selecting an already selected folder keeps its alias.
    pub fn select(&mut self, name: &str) -> Result<(), Error> {
        let folder = self
            .available
            .iter()
            .find(|folder| folder.name == name)
            .ok_or_else(|| Error::UnknownFolder(name.to_string()))?;

        if folder.is_auto_mount() {
            return Err(Error::AutoMounted(name.to_string()));
        }

        self.selected.entry(name.to_string()).or_default();
        Ok(())
    }

    /// Deselects a folder, dropping its alias.
    ///
    /// Returns `true` if the folder was selected.
    pub fn deselect(&mut self, name: &str) -> bool {
        self.selected.shift_remove(name).is_some()
    }

    /// Gets the alias of a selected folder.
    pub fn alias(&self, name: &str) -> Option<&str> {
        self.selected.get(name)?.as_deref()
    }

    /// Sets the alias of a selected folder.
    ///
    /// The alias is trimmed; an empty alias clears it. The selection is left
    /// untouched when the alias is rejected.
    pub fn set_alias(&mut self, name: &str, alias: &str) -> Result<(), Error> {
        if !self.selected.contains_key(name) {
            return Err(Error::NotSelected(name.to_string()));
        }

        let alias = alias.trim();
        if alias.is_empty() {
            self.selected.insert(name.to_string(), None);
            return Ok(());
        }

        let target = self.validate_alias(alias)?;

        if let Some(other) = self
            .targets()
            .find(|(folder, path)| *folder != name && *path == target)
            .map(|(folder, _)| folder.to_string())
        {
            debug!("rejected alias `{alias}` for `{name}`: already used by `{other}`");
            return Err(Error::AliasInUse {
                alias: alias.to_string(),
                folder: other,
            });
        }

        self.selected
            .insert(name.to_string(), Some(alias.to_string()));
        Ok(())
    }

    /// Checks an alias and resolves it to its mount path.
    fn validate_alias(&self, alias: &str) -> Result<String, Error> {
        if alias.split('/').any(|component| component == "..") {
            return Err(Error::InvalidAlias(alias.to_string()));
        }

        let target = self.resolve(alias);
        if target == self.home
            || RESERVED_PATHS
                .iter()
                .any(|reserved| target == *reserved || target.starts_with(&format!("{reserved}/")))
        {
            return Err(Error::ReservedPath(alias.to_string()));
        }

        Ok(target)
    }

    /// Resolves an alias (or a folder name) to a mount path.
    fn resolve(&self, alias: &str) -> String {
        if alias.starts_with('/') {
            let trimmed = alias.trim_end_matches('/');
            if trimmed.is_empty() {
                return String::from("/");
            }

            trimmed.to_string()
        } else {
            format!("{home}/{alias}", home = self.home, alias = alias.trim_end_matches('/'))
        }
    }

    /// Gets the mount path of a selected or automatically mounted folder.
    pub fn target(&self, name: &str) -> Option<String> {
        match self.selected.get(name) {
            Some(Some(alias)) => Some(self.resolve(alias)),
            Some(None) => Some(self.resolve(name)),
            None => self
                .auto_mounts()
                .find(|auto| *auto == name)
                .map(|auto| self.resolve(auto)),
        }
    }

    /// Iterates the mount path of every mounted folder.
    fn targets(&self) -> impl Iterator<Item = (&str, String)> {
        self.selected
            .iter()
            .map(|(name, alias)| {
                let path = self.resolve(alias.as_deref().unwrap_or(name));
                (name.as_str(), path)
            })
            .chain(self.auto_mounts().map(|name| (name, self.resolve(name))))
    }

    /// Gets the names of every folder to mount: the selected folders followed
    /// by the automatic mounts.
    pub fn mounts(&self) -> Vec<String> {
        self.selected()
            .chain(self.auto_mounts())
            .map(String::from)
            .collect()
    }

    /// Gets the mount map: aliased folder name → mount path.
    ///
    /// Folders without an alias mount under the home implicitly and are not
    /// included.
    pub fn mount_map(&self) -> IndexMap<String, String> {
        self.selected
            .iter()
            .filter_map(|(name, alias)| {
                alias
                    .as_deref()
                    .map(|alias| (name.clone(), self.resolve(alias)))
            })
            .collect()
    }

    /// Checks that no two mounted folders share a mount path.
    pub fn check_collisions(&self) -> Result<(), Error> {
        let mut seen: IndexMap<String, &str> = IndexMap::new();

        for (name, path) in self.targets() {
            if let Some(existing) = seen.insert(path, name) {
                return Err(Error::AliasInUse {
                    alias: self.alias(name).unwrap_or(name).to_string(),
                    folder: existing.to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection() -> Selection {
        let mut selection = Selection::new("/home/work");
        selection.set_available(vec![
            Folder::new("data"),
            Folder::new("models"),
            Folder::new("scratch"),
            Folder::new(".local"),
        ]);
        selection.select("data").unwrap();
        selection.select("models").unwrap();
        selection
    }

    #[test]
    fn aliases_must_be_unique() {
        let mut selection = selection();
        selection.set_alias("data", "x").unwrap();

        let err = selection.set_alias("models", "x").unwrap_err();
        assert_eq!(
            err,
            Error::AliasInUse {
                alias: String::from("x"),
                folder: String::from("data"),
            }
        );
        assert_eq!(selection.alias("models"), None);
    }

    #[test]
    fn alias_cannot_take_another_folders_default_path() {
        let mut selection = selection();

        assert!(matches!(
            selection.set_alias("data", "models"),
            Err(Error::AliasInUse { .. })
        ));
        assert!(matches!(
            selection.set_alias("data", "/home/work/.local"),
            Err(Error::AliasInUse { .. })
        ));
    }

    #[test]
    fn reserved_and_malformed_aliases_are_rejected() {
        let mut selection = selection();

        assert_eq!(
            selection.set_alias("data", "/etc"),
            Err(Error::ReservedPath(String::from("/etc")))
        );
        assert_eq!(
            selection.set_alias("data", "/usr/local/data"),
            Err(Error::ReservedPath(String::from("/usr/local/data")))
        );
        assert_eq!(
            selection.set_alias("data", "/home/work/"),
            Err(Error::ReservedPath(String::from("/home/work/")))
        );
        assert_eq!(
            selection.set_alias("data", "../escape"),
            Err(Error::InvalidAlias(String::from("../escape")))
        );
        assert_eq!(
            selection.set_alias("scratch", "s"),
            Err(Error::NotSelected(String::from("scratch")))
        );
    }

    #[test]
    fn mount_map_resolves_aliases() {
        let mut selection = selection();
        selection.set_alias("data", " input ").unwrap();
        selection.set_alias("models", "/models").unwrap();

        let map = selection.mount_map();
        assert_eq!(map["data"], "/home/work/input");
        assert_eq!(map["models"], "/models");

        selection.set_alias("models", "").unwrap();
        assert!(!selection.mount_map().contains_key("models"));
        assert_eq!(selection.target("models").unwrap(), "/home/work/models");
    }

    #[test]
    fn deselect_drops_the_alias() {
        let mut selection = selection();
        selection.set_alias("data", "input").unwrap();

        assert!(selection.deselect("data"));
        assert!(selection.mount_map().is_empty());

        selection.select("data").unwrap();
        assert_eq!(selection.alias("data"), None);
    }

    #[test]
    fn auto_mounts_are_always_included() {
        let mut selection = selection();
        assert_eq!(
            selection.select(".local"),
            Err(Error::AutoMounted(String::from(".local")))
        );
        assert_eq!(selection.mounts(), vec!["data", "models", ".local"]);

        selection.deselect("data");
        selection.deselect("models");
        assert!(selection.is_empty());
        assert_eq!(selection.mounts(), vec![".local"]);
        assert!(selection.check_collisions().is_ok());
    }

    #[test]
    fn refreshing_drops_vanished_folders() {
        let mut selection = selection();
        selection.set_available(vec![Folder::new("models")]);

        assert_eq!(selection.selected().collect::<Vec<_>>(), vec!["models"]);
        assert_eq!(
            selection.select("data"),
            Err(Error::UnknownFolder(String::from("data")))
        );
    }
}
