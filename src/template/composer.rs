//! Composition: collapse the extends/include/block chain into one document

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::TemplateError;
use crate::parser::lexer::{lex, Token};
use crate::parser::{block_spans, defined_blocks, splice, BlockMap};

use super::analyzer::{resolve_include, TemplateAnalysis, TemplateInfo};

/// A template resolved against everything below it in the extends chain
#[derive(Debug, Clone)]
struct Resolved {
    /// Merged document text
    text: String,
    /// The template's own block map, after include splicing
    blocks: BlockMap,
}

/// Compose the entry template into a single document
///
/// Variables are not touched; block spans nobody supplied content for are left
/// in place for the finalizer.
pub fn compose(analysis: &TemplateAnalysis, entry: &Path) -> Result<String, TemplateError> {
    let mut composer = Composer {
        analysis,
        resolving: Vec::new(),
    };
    let resolved = composer.resolve(entry, &BlockMap::new())?;
    Ok(fill_entry_slots(&resolved.text, &resolved.blocks))
}

struct Composer<'a> {
    analysis: &'a TemplateAnalysis,
    /// Extends chain currently being resolved (cycle detection)
    resolving: Vec<PathBuf>,
}

impl<'a> Composer<'a> {
    fn lookup(&self, path: &Path) -> Result<&'a TemplateInfo, TemplateError> {
        let analysis = self.analysis;
        analysis
            .get(path)
            .ok_or_else(|| TemplateError::TemplateNotAnalyzed {
                path: path.to_path_buf(),
            })
    }

    /// Resolve one node; `overrides` holds blocks from templates extending it
    fn resolve(&mut self, path: &Path, overrides: &BlockMap) -> Result<Resolved, TemplateError> {
        if self.resolving.iter().any(|p| p == path) {
            let mut chain = self.resolving.clone();
            chain.push(path.to_path_buf());
            return Err(TemplateError::CircularReference { chain });
        }

        let info = self.lookup(path)?;
        self.resolving.push(path.to_path_buf());
        let result = self.resolve_node(info, overrides);
        self.resolving.pop();
        result
    }

    fn resolve_node(
        &mut self,
        info: &TemplateInfo,
        overrides: &BlockMap,
    ) -> Result<Resolved, TemplateError> {
        let mut content = self.splice_includes(info)?;
        let mut blocks = if info.includes.is_empty() {
            info.defined_blocks.clone()
        } else {
            defined_blocks(&content)
        };

        // Usage markers take the same precedence as spans: descendants first
        let effective = overlay(&blocks, overrides);
        if let Some(substituted) = replace_usages(&content, &effective) {
            content = substituted;
            blocks = defined_blocks(&content);
        }

        match &info.extends {
            Some(parent) => {
                debug!(
                    template = %info.path.display(),
                    parent = %parent.display(),
                    "resolving parent"
                );
                let inherited = overlay(&blocks, overrides);
                let parent = self.resolve(parent, &inherited)?;
                Ok(Resolved {
                    text: parent.text,
                    blocks,
                })
            }
            None => {
                // An empty body in the root layout reserves a slot, it supplies nothing
                let own: BlockMap = blocks
                    .iter()
                    .filter(|(_, body)| !body.is_empty())
                    .map(|(name, body)| (name.clone(), body.clone()))
                    .collect();
                let text = merge_blocks(&content, &own, overrides);
                Ok(Resolved { text, blocks })
            }
        }
    }

    /// Replace each include directive with the raw text of its target
    ///
    /// The included text is spliced verbatim; its own directives are not
    /// resolved here.
    fn splice_includes(&self, info: &TemplateInfo) -> Result<String, TemplateError> {
        if info.includes.is_empty() {
            return Ok(info.source.clone());
        }

        let mut edits = Vec::with_capacity(info.includes.len());
        for (token, span) in lex(&info.source) {
            if let Token::Include(reference) = token {
                let path = resolve_include(&info.path, &reference)?;
                let included = self.lookup(&path)?;
                edits.push((span, included.source.as_str()));
            }
        }
        Ok(splice(&info.source, edits))
    }
}

/// `overrides` laid over `base`; override entries win
fn overlay(base: &BlockMap, overrides: &BlockMap) -> BlockMap {
    let mut merged = base.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Replace usage markers whose block is known; None if nothing changed
fn replace_usages(content: &str, blocks: &BlockMap) -> Option<String> {
    let edits: Vec<_> = lex(content)
        .filter_map(|(token, span)| match token {
            Token::BlockUsage(name) => blocks.get(&name).map(|body| (span, body.as_str())),
            _ => None,
        })
        .collect();

    if edits.is_empty() {
        None
    } else {
        Some(splice(content, edits))
    }
}

/// Substitute every block span in `content`
///
/// Child content wins over parent content; a span neither map knows is left
/// untouched. Every occurrence is replaced, and substituted text is not
/// scanned again.
pub fn merge_blocks(content: &str, parent_blocks: &BlockMap, child_blocks: &BlockMap) -> String {
    let edits = block_spans(content).into_iter().filter_map(|block| {
        let body = child_blocks
            .get(&block.name)
            .or_else(|| parent_blocks.get(&block.name))?;
        Some((block.span, body.as_str()))
    });
    splice(content, edits)
}

/// Fill remaining empty slots and usage markers from the entry's own blocks
fn fill_entry_slots(document: &str, entry_blocks: &BlockMap) -> String {
    if entry_blocks.is_empty() {
        return document.to_string();
    }

    let mut edits: Vec<_> = block_spans(document)
        .into_iter()
        .filter(|block| block.is_empty_slot())
        .filter_map(|block| {
            entry_blocks
                .get(&block.name)
                .map(|body| (block.span, body.as_str()))
        })
        .collect();
    edits.extend(lex(document).filter_map(|(token, span)| match token {
        Token::BlockUsage(name) => entry_blocks.get(&name).map(|body| (span, body.as_str())),
        _ => None,
    }));
    edits.sort_by_key(|(span, _)| span.start);

    splice(document, edits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use pretty_assertions::assert_eq;

    /// Build an analysis in memory, bypassing the filesystem
    fn analysis_of(templates: &[(&str, &str)]) -> TemplateAnalysis {
        let mut analysis = TemplateAnalysis::new();
        for (i, (name, source)) in templates.iter().enumerate() {
            let path = PathBuf::from(name);
            let parsed = parser::parse(source);
            let includes = parsed
                .includes
                .iter()
                .map(|r| resolve_include(&path, r).unwrap())
                .collect();
            analysis.insert(TemplateInfo {
                extends: parsed.extends.map(PathBuf::from),
                includes,
                defined_blocks: parsed.defined_blocks,
                used_blocks: parsed.used_blocks,
                is_entry: i == 0,
                source: source.to_string(),
                path,
            });
        }
        analysis
    }

    fn compose_first(templates: &[(&str, &str)]) -> Result<String, TemplateError> {
        let analysis = analysis_of(templates);
        compose(&analysis, Path::new(templates[0].0))
    }

    fn blocks(pairs: &[(&str, &str)]) -> BlockMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_child_overrides_parent_block() {
        let out = compose_first(&[
            (
                "child.html",
                r#"{% extends "base.html" %}{% block title %}Custom{% endblock %}"#,
            ),
            ("base.html", "<title>{% block title %}Default{% endblock %}</title>"),
        ])
        .unwrap();
        assert_eq!(out, "<title>Custom</title>");
    }

    #[test]
    fn test_parent_default_kept_when_not_overridden() {
        let out = compose_first(&[
            (
                "child.html",
                r#"{% extends "base.html" %}{% block title %}Custom{% endblock %}"#,
            ),
            (
                "base.html",
                "<h1>{% block title %}Default{% endblock %}</h1><footer>{% block footer %}Copyright{% endblock %}</footer>",
            ),
        ])
        .unwrap();
        assert_eq!(out, "<h1>Custom</h1><footer>Copyright</footer>");
    }

    #[test]
    fn test_child_text_outside_blocks_discarded() {
        let out = compose_first(&[
            (
                "child.html",
                r#"{% extends "base.html" %}stray text{% block a %}A{% endblock %}"#,
            ),
            ("base.html", "[{% block a %}{% endblock %}]"),
        ])
        .unwrap();
        assert_eq!(out, "[A]");
    }

    #[test]
    fn test_three_level_chain_nearest_descendant_wins() {
        let out = compose_first(&[
            (
                "article.html",
                r#"{% extends "section.html" %}{% block content %}Article{% endblock %}"#,
            ),
            (
                "section.html",
                r#"{% extends "base.html" %}{% block content %}Section{% endblock %}{% block footer %}Section footer{% endblock %}"#,
            ),
            (
                "base.html",
                "{% block content %}Base{% endblock %}|{% block footer %}Base footer{% endblock %}|{% block nav %}Nav{% endblock %}",
            ),
        ])
        .unwrap();
        assert_eq!(out, "Article|Section footer|Nav");
    }

    #[test]
    fn test_include_spliced_verbatim() {
        let out = compose_first(&[
            ("page.html", r#"<body>{% include "partial.html" %}</body>"#),
            ("partial.html", "<p>{% include \"deeper.html\" %} {{ x }}</p>"),
            ("deeper.html", "never spliced"),
        ])
        .unwrap();
        assert_eq!(out, "<body><p>{% include \"deeper.html\" %} {{ x }}</p></body>");
    }

    #[test]
    fn test_include_inside_child_block() {
        let out = compose_first(&[
            (
                "page.html",
                r#"{% extends "base.html" %}{% block content %}{% include "card.html" %}{% endblock %}"#,
            ),
            ("card.html", "<div>card</div>"),
            ("base.html", "<main>{% block content %}{% endblock %}</main>"),
        ])
        .unwrap();
        assert_eq!(out, "<main><div>card</div></main>");
    }

    #[test]
    fn test_local_usage_marker() {
        let out = compose_first(&[(
            "page.html",
            r#"<nav>{{ block("menu") }}</nav>{% block menu %}Home{% endblock %}"#,
        )])
        .unwrap();
        assert_eq!(out, "<nav>Home</nav>Home");
    }

    #[test]
    fn test_usage_marker_prefers_descendant_override() {
        let out = compose_first(&[
            (
                "page.html",
                r#"{% extends "base.html" %}{% block title %}Page{% endblock %}"#,
            ),
            (
                "base.html",
                r#"<title>{% block title %}Site{% endblock %}</title><h1>{{ block("title") }}</h1>"#,
            ),
        ])
        .unwrap();
        assert_eq!(out, "<title>Page</title><h1>Page</h1>");
    }

    #[test]
    fn test_usage_marker_inside_included_text() {
        let out = compose_first(&[
            (
                "page.html",
                r#"{% extends "base.html" %}{% block title %}Page{% endblock %}"#,
            ),
            (
                "base.html",
                r#"<title>{% block title %}Site{% endblock %}</title>{% include "heading.html" %}"#,
            ),
            ("heading.html", r#"<h1>{{ block("title") }}</h1>"#),
        ])
        .unwrap();
        assert_eq!(out, "<title>Page</title><h1>Page</h1>");
    }

    #[test]
    fn test_unknown_usage_marker_left_alone() {
        let out = compose_first(&[("page.html", r#"a{{ block("nothing") }}b"#)]).unwrap();
        assert_eq!(out, r#"a{{ block("nothing") }}b"#);
    }

    #[test]
    fn test_unfilled_layout_slot_left_for_finalizer() {
        let out = compose_first(&[
            (
                "page.html",
                r#"{% extends "base.html" %}{% block content %}Body{% endblock %}"#,
            ),
            (
                "base.html",
                "<aside>{% block sidebar %}{% endblock %}</aside>{% block content %}{% endblock %}",
            ),
        ])
        .unwrap();
        assert_eq!(out, "<aside>{% block sidebar %}{% endblock %}</aside>Body");
    }

    #[test]
    fn test_child_can_blank_a_block() {
        let out = compose_first(&[
            (
                "page.html",
                r#"{% extends "base.html" %}{% block ads %}{% endblock %}"#,
            ),
            ("base.html", "[{% block ads %}Buy now{% endblock %}]"),
        ])
        .unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_every_occurrence_of_a_span_replaced() {
        let out = compose_first(&[
            (
                "page.html",
                r#"{% extends "base.html" %}{% block x %}X{% endblock %}"#,
            ),
            ("base.html", "{% block x %}d{% endblock %}-{% block x %}d{% endblock %}"),
        ])
        .unwrap();
        assert_eq!(out, "X-X");
    }

    #[test]
    fn test_entry_slot_pass_fills_slots_from_substituted_content() {
        // The outer body ends at the first endblock, so the inner slot only
        // appears once the outer span has been substituted.
        let out = compose_first(&[
            (
                "page.html",
                r#"{% extends "base.html" %}{% block inner %}I{% endblock %}"#,
            ),
            (
                "base.html",
                "<div>{% block outer %}{% block inner %}{% endblock %}{% endblock %}</div>",
            ),
        ])
        .unwrap();
        assert_eq!(out, "<div>I</div>");
    }

    #[test]
    fn test_circular_chain_in_handbuilt_analysis() {
        let err = compose_first(&[
            ("a.html", r#"{% extends "b.html" %}"#),
            ("b.html", r#"{% extends "a.html" %}"#),
        ])
        .unwrap_err();
        assert!(matches!(err, TemplateError::CircularReference { .. }));
    }

    #[test]
    fn test_missing_node_is_not_analyzed() {
        let err = compose_first(&[("page.html", r#"{% extends "ghost.html" %}"#)]).unwrap_err();
        match err {
            TemplateError::TemplateNotAnalyzed { path } => assert_eq!(path, PathBuf::from("ghost.html")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_merge_blocks_precedence() {
        let content = "{% block a %}x{% endblock %}{% block b %}y{% endblock %}{% block c %}z{% endblock %}";
        let parent = blocks(&[("a", "PA"), ("b", "PB")]);
        let child = blocks(&[("a", "CA")]);
        assert_eq!(
            merge_blocks(content, &parent, &child),
            "CAPB{% block c %}z{% endblock %}"
        );
    }
}
