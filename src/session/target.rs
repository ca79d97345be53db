//! The script a session traces, as the inspector names it

use std::path::{Path, PathBuf};

use url::Url;

use crate::common::{Error, Result};

#[derive(Debug, Clone)]
pub struct ScriptTarget {
    path: PathBuf,
    url: String,
}

impl ScriptTarget {
    /// Resolve `script` to the real path Node.js will load it from
    pub fn new(script: &Path) -> Result<Self> {
        let path = std::fs::canonicalize(script).map_err(|e| Error::script_read(script, e))?;
        let url = Url::from_file_path(&path)
            .map_err(|_| Error::script_read(&path, "not an absolute file path"))?
            .to_string();
        Ok(Self { path, url })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `file://` URL used for breakpoints
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether a call frame's script URL is this script
    pub fn owns(&self, script_url: &str) -> bool {
        script_url == self.url || Path::new(script_url) == self.path
    }

    /// Line in a `<path>:<line>` reference to this script inside `text`
    ///
    /// Node.js prefixes compile errors with such a reference.
    pub fn line_in(&self, text: &str) -> Option<usize> {
        let path = self.path.to_string_lossy();
        [path.as_ref(), self.url.as_str()].iter().find_map(|name| {
            text.match_indices(name).find_map(|(at, _)| {
                let rest = text[at + name.len()..].strip_prefix(':')?;
                let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().ok()
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> (tempfile::TempDir, ScriptTarget) {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("sample.spec.js");
        std::fs::write(&script, "it('x', function () {});\n").unwrap();
        let target = ScriptTarget::new(&script).unwrap();
        (dir, target)
    }

    #[test]
    fn test_owns_url_and_path() {
        let (_dir, target) = target();
        assert!(target.url().starts_with("file:///"));
        assert!(target.owns(target.url()));
        assert!(target.owns(&target.path().to_string_lossy()));
        assert!(!target.owns("node:internal/modules/cjs/loader"));
        assert!(!target.owns(""));
    }

    #[test]
    fn test_line_in_compile_error() {
        let (_dir, target) = target();
        let description = format!(
            "{}:3\n  foo(;\n      ^\n\nSyntaxError: Unexpected token ';'",
            target.path().display()
        );
        assert_eq!(target.line_in(&description), Some(3));
        assert_eq!(target.line_in("SyntaxError: Unexpected token ';'"), None);
    }

    #[test]
    fn test_missing_script() {
        let err = ScriptTarget::new(Path::new("/definitely/not/here.js")).unwrap_err();
        assert!(matches!(err, Error::ScriptRead { .. }));
    }
}
