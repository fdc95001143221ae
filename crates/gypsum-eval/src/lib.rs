//!
//! ## Introduction
//! This crate turns a loaded build file into its evaluated form: variable references expanded,
//! commands run, conditions resolved and chosen branches merged back in. It knows nothing about
//! targets or dependencies; `gypsum` drives it once per file in the early phase and once per
//! target in the late phase.
//!
//! ## Terminology
//!
//! ### References
//! Consider this snippet:
//!
//! ```text
//! {
//!   'variables': {'libs': ['-lz', '-lm'], 'arch%': 'x64'},
//!   'defines': ['ARCH=<(arch)'],
//!   'ldflags': ['<@(libs)', '<!@(pkg-config --libs glib-2.0)'],
//! }
//! ```
//!
//! `<(arch)` is a **string reference**: it is replaced in place, and a list variable is joined
//! into one shell-quoted string. `<@(libs)` is a **list reference**: it must be the whole
//! string, and the list item holding it is replaced by the items it expands to. The `!` forms
//! are **command references**, whose contents run in the build file's directory.
//!
//! Every reference belongs to a [Phase]. `<` references expand while loading, `>` references
//! expand after dependent settings are merged, so a target can refer to what its dependencies
//! gave it.
//!
//! ### Scopes
//! Each dict is evaluated in a [VariableScope] built from its parent's scope, its own `variables`
//! dict and its **automatic variables** (`_sources` for a `sources` key, and so on). A variable
//! whose name ends in `%` is a **default**: it only applies when nothing above set it.
//!
//! ### Conditions
//! `conditions` (early) and `target_conditions` (late) are lists of
//! `[expression, {then}, expression2, {then2}, ..., {else}]`. The first true expression wins;
//! its dict is evaluated and then merged into the dict holding the conditions, following the
//! usual [merge rules](merge).

pub mod command;
pub mod condition;
pub mod errors;
pub mod expand;
pub mod filters;
pub mod merge;
pub mod process;
pub mod scope;

#[cfg(test)]
mod tests;

use std::path::Path;

use gypsum_syntax::Mapping;

pub use command::{CommandLine, CommandRunner};
pub use errors::{EvalError, EvalResult};
pub use expand::{Expander, Phase};
pub use filters::process_list_filters;
pub use merge::{is_path_section, merge_dicts, merge_lists, MergeContext};
pub use scope::VariableScope;

/// Evaluate a whole build file (or a single target) in `phase`.
pub fn process_document(
    doc: &mut Mapping,
    phase: Phase,
    scope: &VariableScope,
    runner: &CommandRunner,
    build_file: &Path,
) -> EvalResult<()> {
    Expander::new(runner, phase, build_file).process_dict(doc, scope, None)
}
