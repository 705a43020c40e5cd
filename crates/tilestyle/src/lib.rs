//! tilestyle - a compiler for vector map styles
//!
//! Builds style documents (sources plus an ordered list of layers with
//! filters, zoom ranges, layout and paint properties) from a compact
//! description, and lowers them to style JSON.
//!
//! ## Quick Start
//!
//! ```ignore
//! let doc = tilestyle::compile_str(r#"
//!     version 8
//!     source :shortbread, type: "vector", url: "https://example.com/tiles.json", default: true
//!
//!     layer :streets, zoom: 10..13 {
//!         line_width 6
//!         line_color 0x888888
//!         on kind == :motorway { line_color 0x0000ff }
//!     }
//! "#)?;
//! println!("{}", serde_json::to_string_pretty(&doc)?);
//! ```
//!
//! ## Builder API
//!
//! The same document without the text front-end:
//!
//! ```ignore
//! use tilestyle::{Expression, Stylesheet, Value};
//!
//! let mut sheet = Stylesheet::new();
//! sheet.set_property("version", 8);
//! sheet.layer("streets", Default::default(), |l| {
//!     l.set("line_width", 6)?;
//!     l.on(vec![Expression::get("kind").eq("motorway").into()], |c| {
//!         c.set("line_color", 0x0000ff)
//!     })
//! })?;
//! let doc = sheet.compile()?;
//! ```
//!
//! ## Cascades
//!
//! - `on(cond) { .. }` derives a sub-layer filtered by `cond` and the parent's filter
//! - `cascade(cond) { .. }` records overrides that every later `on` replays
//!   as an extra sibling layer under `cond`
//! - `uncascaded(cond)` narrows direct children only

mod ast;
mod color;
mod eval;
mod expr;
mod extension;
mod include;
mod layer;
mod parse;
mod props;
mod stylesheet;
mod value;

use std::path::{Path, PathBuf};

use thiserror::Error;

// ============ Primary Public API ============

pub use color::ColorValue;
pub use expr::{Combinator, Expression, and_optional, condition_from, merge};
pub use extension::{ExtensionFn, ExtensionRegistry};
pub use include::{FsResolver, IncludeResolver};
pub use layer::{CascadeEntry, Layer, LayerBuilder};
pub use props::{PropertyClass, RenderType, Resolution, classify, resolve};
pub use stylesheet::{CompileOptions, REF_FIELDS, Sources, Stylesheet};
pub use value::{Value, ValueMap, ZoomRange};

/// Compile stylesheet source text with default options
pub fn compile_str(source: &str) -> Result<serde_json::Value, TilestyleError> {
    let mut sheet = Stylesheet::new();
    load_str(&mut sheet, source)?;
    Ok(sheet.compile()?)
}

/// Parse `source` and apply it to an existing stylesheet, e.g. one with
/// extensions or a custom include resolver configured
pub fn load_str(sheet: &mut Stylesheet, source: &str) -> Result<(), TilestyleError> {
    let program = parse::parse(source)?;
    eval::eval_program(&program, sheet)
}

/// Compile a stylesheet file; includes resolve relative to its directory
pub fn compile_file(
    path: impl AsRef<Path>,
    options: &CompileOptions,
) -> Result<serde_json::Value, TilestyleError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| CompileError::Include {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut sheet = Stylesheet::new().with_base_dir(base_dir);
    load_str(&mut sheet, &source)?;
    Ok(sheet.compile_with(options)?)
}

// ============ Errors ============

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("layer `{layer}`: `{property}` is not a layout, paint or layer property")]
    UnclassifiedProperty { layer: String, property: String },

    #[error(
        "layer `{layer}`: `{property}` conflicts with type `{deduced}` deduced from `{deduced_from}`"
    )]
    TypeConflict {
        layer: String,
        property: String,
        deduced: RenderType,
        deduced_from: String,
    },

    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("Argument error: {0}")]
    Argument(String),

    #[error("include `{}`: {source}", path.display())]
    Include {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum TilestyleError {
    #[error("Parse error: {0}")]
    Parse(#[from] parse::ParseError),
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),
}

pub use parse::ParseError;

// ============ Advanced: AST Access ============

/// Low-level front-end pieces (for tooling or custom drivers)
pub mod advanced {
    pub use crate::ast::surface::{Expr as SurfaceExpr, Stmt, SurfaceArg};
    pub use crate::ast::{Arg, BinOp, Literal, UnaryOp};
    pub use crate::color::{hsl_to_rgb, hsluv_to_rgb, rgb_to_hsl, rgb_to_hsluv};
    pub use crate::eval::{Scope, eval_args, eval_body, eval_expr, eval_program};
    pub use crate::expr::{DOT_METHODS, FUNCTIONS, wire_token};
    pub use crate::parse::{parse, parse_expr};
    pub use crate::props::{HIDDEN, LAYOUT, PAINT, TOP_LEVEL, hyphenate, normalize};
}
