//! Template analysis: discover every template reachable from an entry

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::TemplateError;
use crate::parser::{self, BlockMap};

/// Everything the composer needs to know about one template file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInfo {
    /// Normalized path relative to the templates root
    pub path: PathBuf,
    /// Resolved parent template
    pub extends: Option<PathBuf>,
    /// Resolved include targets in source order
    pub includes: Vec<PathBuf>,
    pub defined_blocks: BlockMap,
    pub used_blocks: BlockMap,
    /// True only for the template originally requested
    pub is_entry: bool,
    /// Raw text as read during analysis
    pub source: String,
}

/// Templates reachable from one entry, keyed by path
///
/// Built fresh for every render and dropped with it.
#[derive(Debug, Default)]
pub struct TemplateAnalysis {
    templates: HashMap<PathBuf, TemplateInfo>,
    /// Paths in the order they were analysed
    order: Vec<PathBuf>,
}

impl TemplateAnalysis {
    /// Create an empty analysis
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a template; a path already present is left as it was
    pub fn insert(&mut self, info: TemplateInfo) {
        if self.templates.contains_key(&info.path) {
            return;
        }
        self.order.push(info.path.clone());
        self.templates.insert(info.path.clone(), info);
    }

    pub fn get(&self, path: &Path) -> Option<&TemplateInfo> {
        self.templates.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.templates.contains_key(path)
    }

    /// The template flagged as entry, if any
    pub fn entry(&self) -> Option<&TemplateInfo> {
        self.iter().find(|info| info.is_entry)
    }

    /// Iterate templates in analysis order
    pub fn iter(&self) -> impl Iterator<Item = &TemplateInfo> {
        self.order.iter().filter_map(|path| self.templates.get(path))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Analyze the entry template and everything it reaches
///
/// The entry is parsed first, then its includes in declaration order, then
/// its parent. Any unreadable file aborts the whole analysis.
pub fn analyze(root: &Path, entry: &str) -> Result<TemplateAnalysis, TemplateError> {
    let entry_path = resolve_entry(entry)?;
    let mut analyzer = Analyzer {
        root,
        analysis: TemplateAnalysis::new(),
        visiting: Vec::new(),
    };
    analyzer.visit(&entry_path, true)?;
    Ok(analyzer.analysis)
}

struct Analyzer<'a> {
    root: &'a Path,
    analysis: TemplateAnalysis,
    /// Templates currently being analysed (cycle detection)
    visiting: Vec<PathBuf>,
}

impl Analyzer<'_> {
    fn visit(&mut self, path: &Path, is_entry: bool) -> Result<(), TemplateError> {
        if self.visiting.iter().any(|p| p == path) {
            let mut chain = self.visiting.clone();
            chain.push(path.to_path_buf());
            return Err(TemplateError::CircularReference { chain });
        }
        if self.analysis.contains(path) {
            return Ok(());
        }

        let full_path = self.root.join(path);
        let source =
            fs::read_to_string(&full_path).map_err(|e| TemplateError::TemplateUnreadable {
                path: full_path.clone(),
                source: e,
            })?;

        let parsed = parser::parse(&source);
        let includes = parsed
            .includes
            .iter()
            .map(|reference| resolve_include(path, reference))
            .collect::<Result<Vec<_>, _>>()?;
        let extends = parsed
            .extends
            .as_deref()
            .map(|reference| resolve_extends(path, reference))
            .transpose()?;

        debug!(
            template = %path.display(),
            extends = ?extends,
            includes = includes.len(),
            blocks = parsed.defined_blocks.len(),
            "analyzed template"
        );

        self.analysis.insert(TemplateInfo {
            path: path.to_path_buf(),
            extends: extends.clone(),
            includes: includes.clone(),
            defined_blocks: parsed.defined_blocks,
            used_blocks: parsed.used_blocks,
            is_entry,
            source,
        });

        self.visiting.push(path.to_path_buf());
        for include in &includes {
            self.visit(include, false)?;
        }
        if let Some(parent) = &extends {
            self.visit(parent, false)?;
        }
        self.visiting.pop();

        Ok(())
    }
}

/// Resolve the requested entry name against the templates root
pub fn resolve_entry(reference: &str) -> Result<PathBuf, TemplateError> {
    normalize(Path::new(reference)).ok_or_else(|| TemplateError::InvalidPath {
        reference: reference.to_string(),
        from: None,
    })
}

/// Resolve an `extends` reference; parents live relative to the templates root
pub fn resolve_extends(from: &Path, reference: &str) -> Result<PathBuf, TemplateError> {
    normalize(Path::new(reference)).ok_or_else(|| TemplateError::InvalidPath {
        reference: reference.to_string(),
        from: Some(from.to_path_buf()),
    })
}

/// Resolve an `include` reference relative to the including file's directory
pub fn resolve_include(from: &Path, reference: &str) -> Result<PathBuf, TemplateError> {
    let dir = from.parent().unwrap_or_else(|| Path::new(""));
    normalize(&dir.join(reference)).ok_or_else(|| TemplateError::InvalidPath {
        reference: reference.to_string(),
        from: Some(from.to_path_buf()),
    })
}

/// Fold `.` and `..` lexically; None if the path is absolute or leaves the root
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}
