//! Test doubles shared by the unit tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::probe::AccessProbe;

/// In-memory probe. Clones share state, so a configuration holding a clone
/// sees later `unplug`/`with_dir` changes.
#[derive(Debug, Clone, Default)]
pub(crate) struct FixedProbe {
    dirs: Rc<RefCell<HashMap<PathBuf, (bool, bool)>>>,
}

impl FixedProbe {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register an existing directory with the given read/write verdicts.
    pub(crate) fn with_dir<P: AsRef<Path>>(self, path: P, readable: bool, writable: bool) -> Self {
        self.set_dir(path, readable, writable);
        self
    }

    pub(crate) fn set_dir<P: AsRef<Path>>(&self, path: P, readable: bool, writable: bool) {
        self.dirs
            .borrow_mut()
            .insert(path.as_ref().to_path_buf(), (readable, writable));
    }

    /// Forget a directory, as if its drive were removed.
    pub(crate) fn unplug<P: AsRef<Path>>(&self, path: P) {
        self.dirs.borrow_mut().remove(path.as_ref());
    }
}

impl AccessProbe for FixedProbe {
    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.borrow().contains_key(path)
    }

    fn can_read(&self, path: &Path) -> bool {
        self.dirs.borrow().get(path).is_some_and(|(r, _)| *r)
    }

    fn can_write(&self, path: &Path) -> bool {
        self.dirs.borrow().get(path).is_some_and(|(_, w)| *w)
    }
}
