//! Property classification and identifier resolution
//!
//! Static tables decide where a property lands in the compiled layer
//! (layout, paint, or the layer object itself) and which render type it
//! implies. `resolve` is the single entry point deciding what a bare name
//! in a layer body means.

use serde::Serialize;

use crate::expr;
use crate::extension::{ExtensionFn, ExtensionRegistry};

pub const LAYOUT: &[&str] = &[
    "visibility",
    "fill_sort_key",
    "circle_sort_key",
    "line_cap", "line_join", "line_miter_limit", "line_round_limit", "line_sort_key",
    "symbol_placement", "symbol_spacing", "symbol_avoid_edges", "symbol_sort_key",
    "symbol_z_order",
    "icon_allow_overlap", "icon_overlap", "icon_ignore_placement", "icon_optional",
    "icon_rotation_alignment", "icon_size", "icon_text_fit", "icon_text_fit_padding",
    "icon_image", "icon_rotate", "icon_padding", "icon_keep_upright", "icon_offset",
    "icon_anchor", "icon_pitch_alignment",
    "text_pitch_alignment", "text_rotation_alignment", "text_field", "text_font",
    "text_size", "text_max_width", "text_line_height", "text_letter_spacing",
    "text_justify", "text_radial_offset", "text_variable_anchor",
    "text_variable_anchor_offset", "text_anchor", "text_max_angle", "text_writing_mode",
    "text_rotate", "text_padding", "text_keep_upright", "text_transform", "text_offset",
    "text_allow_overlap", "text_overlap", "text_ignore_placement", "text_optional",
];

pub const PAINT: &[&str] = &[
    "background_color", "background_pattern", "background_opacity",
    "fill_antialias", "fill_opacity", "fill_color", "fill_outline_color", "fill_translate",
    "fill_translate_anchor", "fill_pattern",
    "circle_radius", "circle_color", "circle_blur", "circle_opacity", "circle_translate",
    "circle_translate_anchor", "circle_pitch_scale", "circle_pitch_alignment",
    "circle_stroke_width", "circle_stroke_color", "circle_stroke_opacity",
    "heatmap_radius", "heatmap_weight", "heatmap_intensity", "heatmap_color",
    "heatmap_opacity",
    "fill_extrusion_opacity", "fill_extrusion_color", "fill_extrusion_translate",
    "fill_extrusion_translate_anchor", "fill_extrusion_pattern", "fill_extrusion_height",
    "fill_extrusion_base", "fill_extrusion_vertical_gradient",
    "line_opacity", "line_color", "line_translate", "line_translate_anchor", "line_width",
    "line_gap_width", "line_offset", "line_blur", "line_dasharray", "line_pattern",
    "line_gradient",
    "icon_opacity", "icon_color", "icon_halo_color", "icon_halo_width", "icon_halo_blur",
    "icon_translate", "icon_translate_anchor",
    "text_opacity", "text_color", "text_halo_color", "text_halo_width", "text_halo_blur",
    "text_translate", "text_translate_anchor",
    "raster_opacity", "raster_hue_rotate", "raster_brightness_min", "raster_brightness_max",
    "raster_saturation", "raster_contrast", "raster_resampling", "raster_fade_duration",
    "hillshade_illumination_direction", "hillshade_illumination_altitude",
    "hillshade_illumination_anchor", "hillshade_exaggeration", "hillshade_shadow_color",
    "hillshade_highlight_color", "hillshade_accent_color", "hillshade_method",
    "color_relief_opacity", "color_relief_color",
];

pub const TOP_LEVEL: &[&str] = &["metadata", "zoom", "interactive"];

/// Layer fields managed by the compiler itself
pub const HIDDEN: &[&str] = &[
    "source", "source_layer", "id", "type", "filter", "layout", "paint",
];

/// Where a property ends up in the compiled layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyClass {
    Layout,
    Paint,
    TopLevel,
    Hidden,
}

impl PropertyClass {
    /// Layout and paint properties can be assigned from a layer body
    pub fn is_settable(self) -> bool {
        !matches!(self, PropertyClass::Hidden)
    }

    pub fn implies_type(self) -> bool {
        matches!(self, PropertyClass::Layout | PropertyClass::Paint)
    }
}

/// Canonical bag key: `line-width` and `line_width` are the same property
pub fn normalize(name: &str) -> String {
    name.replace('-', "_")
}

/// Output form of a property name
pub fn hyphenate(name: &str) -> String {
    name.replace('_', "-")
}

pub fn classify(name: &str) -> Option<PropertyClass> {
    let key = normalize(name);
    let key = key.as_str();
    if LAYOUT.contains(&key) {
        Some(PropertyClass::Layout)
    } else if PAINT.contains(&key) {
        Some(PropertyClass::Paint)
    } else if TOP_LEVEL.contains(&key) {
        Some(PropertyClass::TopLevel)
    } else if HIDDEN.contains(&key) {
        Some(PropertyClass::Hidden)
    } else {
        None
    }
}

/// Render type of a compiled layer, deduced from its property names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderType {
    Background,
    Fill,
    Line,
    Symbol,
    Circle,
    Heatmap,
    FillExtrusion,
    Raster,
    Hillshade,
    ColorRelief,
}

impl RenderType {
    /// Deduce from a hyphenated property name; names without a hyphen imply
    /// nothing (`visibility`).
    pub fn from_property(hyphenated: &str) -> Option<Self> {
        if !hyphenated.contains('-') {
            return None;
        }
        if hyphenated.starts_with("fill-extrusion") {
            return Some(RenderType::FillExtrusion);
        }
        if hyphenated.starts_with("color-relief") {
            return Some(RenderType::ColorRelief);
        }
        let prefix = hyphenated.split('-').next()?;
        Some(match prefix {
            "background" => RenderType::Background,
            "fill" => RenderType::Fill,
            "line" => RenderType::Line,
            "symbol" | "icon" | "text" => RenderType::Symbol,
            "circle" => RenderType::Circle,
            "heatmap" => RenderType::Heatmap,
            "raster" => RenderType::Raster,
            "hillshade" => RenderType::Hillshade,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RenderType::Background => "background",
            RenderType::Fill => "fill",
            RenderType::Line => "line",
            RenderType::Symbol => "symbol",
            RenderType::Circle => "circle",
            RenderType::Heatmap => "heatmap",
            RenderType::FillExtrusion => "fill-extrusion",
            RenderType::Raster => "raster",
            RenderType::Hillshade => "hillshade",
            RenderType::ColorRelief => "color-relief",
        }
    }
}

impl std::fmt::Display for RenderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a name used in a layer body refers to
#[derive(Clone)]
pub enum Resolution {
    /// A registered extension macro
    Extension(ExtensionFn),
    /// A catalogue function of the expression language
    Builtin(&'static str),
    /// A settable layout/paint/top-level property
    Property(PropertyClass),
    /// Anything else reads a feature field: `["get", name]`
    FieldAccess,
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Extension(_) => write!(f, "Extension"),
            Resolution::Builtin(name) => write!(f, "Builtin({name})"),
            Resolution::Property(class) => write!(f, "Property({class:?})"),
            Resolution::FieldAccess => write!(f, "FieldAccess"),
        }
    }
}

/// Resolve a name in priority order: extension, builtin, property, field.
pub fn resolve(name: &str, extensions: &ExtensionRegistry) -> Resolution {
    let resolution = if let Some(ext) = extensions.get(name) {
        Resolution::Extension(ext)
    } else if let Some(builtin) = expr::FUNCTIONS.iter().find(|f| **f == name).copied() {
        Resolution::Builtin(builtin)
    } else {
        match classify(name) {
            Some(class) if class.is_settable() => Resolution::Property(class),
            _ => Resolution::FieldAccess,
        }
    };
    log::trace!("resolved `{name}` as {resolution:?}");
    resolution
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_both_spellings() {
        assert_eq!(classify("line_width"), Some(PropertyClass::Paint));
        assert_eq!(classify("line-width"), Some(PropertyClass::Paint));
        assert_eq!(classify("text_field"), Some(PropertyClass::Layout));
        assert_eq!(classify("metadata"), Some(PropertyClass::TopLevel));
        assert_eq!(classify("source_layer"), Some(PropertyClass::Hidden));
        assert_eq!(classify("highway"), None);
    }

    #[test]
    fn render_type_special_cases() {
        assert_eq!(RenderType::from_property("line-width"), Some(RenderType::Line));
        assert_eq!(
            RenderType::from_property("fill-extrusion-height"),
            Some(RenderType::FillExtrusion)
        );
        assert_eq!(RenderType::from_property("fill-color"), Some(RenderType::Fill));
        assert_eq!(RenderType::from_property("icon-image"), Some(RenderType::Symbol));
        assert_eq!(RenderType::from_property("text-size"), Some(RenderType::Symbol));
        assert_eq!(
            RenderType::from_property("color-relief-opacity"),
            Some(RenderType::ColorRelief)
        );
        assert_eq!(RenderType::from_property("visibility"), None);
    }

    #[test]
    fn render_type_serializes_hyphenated() {
        let json = serde_json::to_value(RenderType::FillExtrusion).unwrap();
        assert_eq!(json, serde_json::json!("fill-extrusion"));
    }

    #[test]
    fn resolution_priority() {
        let mut registry = ExtensionRegistry::new();
        assert!(matches!(resolve("match", &registry), Resolution::Builtin("match")));
        assert!(matches!(
            resolve("line_width", &registry),
            Resolution::Property(PropertyClass::Paint)
        ));
        assert!(matches!(resolve("highway", &registry), Resolution::FieldAccess));
        // hidden fields are not assignable by name
        assert!(matches!(resolve("source", &registry), Resolution::FieldAccess));

        registry.register("line_width", |_, _| Ok(()));
        assert!(matches!(
            resolve("line_width", &registry),
            Resolution::Extension(_)
        ));
    }
}
