//! Template analysis and composition
//!
//! Rendering a page happens in two structural steps before variables are
//! applied:
//!
//! 1. [`analyze`] reads the entry template and, recursively, every template it
//!    includes or extends, producing a [`TemplateAnalysis`] keyed by path.
//! 2. [`compose`] walks the extends chain of the entry, splices includes and
//!    resolves blocks into a single document.
//!
//! # Example
//!
//! ```text
//! base.html:
//! <title>{% block title %}Site{% endblock %}</title>
//! {% include "nav.html" %}
//! <main>{% block content %}{% endblock %}</main>
//!
//! page.html:
//! {% extends "base.html" %}
//! {% block title %}About{% endblock %}
//! {% block content %}<p>Hello</p>{% endblock %}
//! ```

mod analyzer;
mod composer;

pub use analyzer::{
    analyze, resolve_entry, resolve_extends, resolve_include, TemplateAnalysis, TemplateInfo,
};
pub use composer::{compose, merge_blocks};
