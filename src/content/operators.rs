//! Content stream operator table.
//!
//! One entry per operator of ISO 32000-1 Annex A, with its operand count
//! and PostScript counterpart.

use lazy_static::lazy_static;
use std::collections::HashMap;

/// Static description of a content operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    /// Operator keyword as it appears in the stream
    pub name: &'static str,
    /// Operand count, `None` when it varies with the color space or data
    pub arity: Option<usize>,
    /// Equivalent PostScript operators
    pub postscript: Option<&'static str>,
    /// Human-readable meaning
    pub description: &'static str,
}

const fn op(
    name: &'static str,
    arity: Option<usize>,
    postscript: Option<&'static str>,
    description: &'static str,
) -> OpInfo {
    OpInfo {
        name,
        arity,
        postscript,
        description,
    }
}

/// Every content stream operator.
pub static OPERATORS: &[OpInfo] = &[
    // General graphics state
    op("w", Some(1), Some("setlinewidth"), "Set line width"),
    op("J", Some(1), Some("setlinecap"), "Set line cap style"),
    op("j", Some(1), Some("setlinejoin"), "Set line join style"),
    op("M", Some(1), Some("setmiterlimit"), "Set miter limit"),
    op("d", Some(2), Some("setdash"), "Set line dash pattern"),
    op("ri", Some(1), None, "Set color rendering intent"),
    op("i", Some(1), Some("setflat"), "Set flatness tolerance"),
    op("gs", Some(1), None, "Set parameters from graphics state parameter dictionary"),
    // Special graphics state
    op("q", Some(0), Some("gsave"), "Save graphics state"),
    op("Q", Some(0), Some("grestore"), "Restore graphics state"),
    op("cm", Some(6), Some("concat"), "Concatenate matrix to current transformation matrix"),
    // Path construction
    op("m", Some(2), Some("moveto"), "Begin new subpath"),
    op("l", Some(2), Some("lineto"), "Append straight line segment to path"),
    op("c", Some(6), Some("curveto"), "Append curved segment to path (three control points)"),
    op("v", Some(4), Some("curveto"), "Append curved segment to path (initial point replicated)"),
    op("y", Some(4), Some("curveto"), "Append curved segment to path (final point replicated)"),
    op("h", Some(0), Some("closepath"), "Close subpath"),
    op("re", Some(4), None, "Append rectangle to path"),
    // Path painting
    op("S", Some(0), Some("stroke"), "Stroke path"),
    op("s", Some(0), Some("closepath, stroke"), "Close and stroke path"),
    op("f", Some(0), Some("fill"), "Fill path using nonzero winding number rule"),
    op("F", Some(0), Some("fill"), "Fill path using nonzero winding number rule (obsolete)"),
    op("f*", Some(0), Some("eofill"), "Fill path using even-odd rule"),
    op("B", Some(0), Some("fill, stroke"), "Fill and stroke path using nonzero winding number rule"),
    op("B*", Some(0), Some("eofill, stroke"), "Fill and stroke path using even-odd rule"),
    op(
        "b",
        Some(0),
        Some("closepath, fill, stroke"),
        "Close, fill, and stroke path using nonzero winding number rule",
    ),
    op(
        "b*",
        Some(0),
        Some("closepath, eofill, stroke"),
        "Close, fill, and stroke path using even-odd rule",
    ),
    op("n", Some(0), None, "End path without filling or stroking"),
    // Clipping paths
    op("W", Some(0), Some("clip"), "Set clipping path using nonzero winding number rule"),
    op("W*", Some(0), Some("eoclip"), "Set clipping path using even-odd rule"),
    // Text objects
    op("BT", Some(0), None, "Begin text object"),
    op("ET", Some(0), None, "End text object"),
    // Text state
    op("Tc", Some(1), None, "Set character spacing"),
    op("Tw", Some(1), None, "Set word spacing"),
    op("Tz", Some(1), None, "Set horizontal text scaling"),
    op("TL", Some(1), None, "Set text leading"),
    op("Tf", Some(2), Some("selectfont"), "Set text font and size"),
    op("Tr", Some(1), None, "Set text rendering mode"),
    op("Ts", Some(1), None, "Set text rise"),
    // Text positioning
    op("Td", Some(2), None, "Move text position"),
    op("TD", Some(2), None, "Move text position and set leading"),
    op("Tm", Some(6), None, "Set text matrix and text line matrix"),
    op("T*", Some(0), None, "Move to start of next text line"),
    // Text showing
    op("Tj", Some(1), Some("show"), "Show text"),
    op("TJ", Some(1), None, "Show text, allowing individual glyph positioning"),
    op("'", Some(1), None, "Move to next line and show text"),
    op("\"", Some(3), None, "Set word and character spacing, move to next line, and show text"),
    // Type 3 fonts
    op("d0", Some(2), Some("setcharwidth"), "Set glyph width in Type 3 font"),
    op("d1", Some(6), Some("setcachedevice"), "Set glyph width and bounding box in Type 3 font"),
    // Color
    op("CS", Some(1), Some("setcolorspace"), "Set color space for stroking operations"),
    op("cs", Some(1), Some("setcolorspace"), "Set color space for nonstroking operations"),
    op("SC", None, Some("setcolor"), "Set color for stroking operations"),
    op(
        "SCN",
        None,
        Some("setcolor"),
        "Set color for stroking operations (ICCBased and special color spaces)",
    ),
    op("sc", None, Some("setcolor"), "Set color for nonstroking operations"),
    op(
        "scn",
        None,
        Some("setcolor"),
        "Set color for nonstroking operations (ICCBased and special color spaces)",
    ),
    op("G", Some(1), Some("setgray"), "Set gray level for stroking operations"),
    op("g", Some(1), Some("setgray"), "Set gray level for nonstroking operations"),
    op("RG", Some(3), Some("setrgbcolor"), "Set RGB color for stroking operations"),
    op("rg", Some(3), Some("setrgbcolor"), "Set RGB color for nonstroking operations"),
    op("K", Some(4), Some("setcmykcolor"), "Set CMYK color for stroking operations"),
    op("k", Some(4), Some("setcmykcolor"), "Set CMYK color for nonstroking operations"),
    // Shading patterns
    op("sh", Some(1), Some("shfill"), "Paint area defined by shading pattern"),
    // Inline images
    op("BI", Some(0), None, "Begin inline image object"),
    op("ID", Some(0), None, "Begin inline image data"),
    op("EI", Some(0), None, "End inline image object"),
    // XObjects
    op("Do", Some(1), None, "Invoke named XObject"),
    // Marked content
    op("MP", Some(1), None, "Define marked-content point"),
    op("DP", Some(2), None, "Define marked-content point with property list"),
    op("BMC", Some(1), None, "Begin marked-content sequence"),
    op("BDC", Some(2), None, "Begin marked-content sequence with property list"),
    op("EMC", Some(0), None, "End marked-content sequence"),
    // Compatibility
    op("BX", Some(0), None, "Begin compatibility section"),
    op("EX", Some(0), None, "End compatibility section"),
];

lazy_static! {
    static ref OPERATOR_INDEX: HashMap<&'static str, &'static OpInfo> =
        OPERATORS.iter().map(|info| (info.name, info)).collect();
}

/// Look up an operator by keyword.
pub fn lookup_operator(name: &str) -> Option<&'static OpInfo> {
    OPERATOR_INDEX.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_is_complete() {
        assert_eq!(OPERATORS.len(), 73);
        let names: HashSet<_> = OPERATORS.iter().map(|o| o.name).collect();
        assert_eq!(names.len(), OPERATORS.len());
    }

    #[test]
    fn test_lookup() {
        let tf = lookup_operator("Tf").unwrap();
        assert_eq!(tf.arity, Some(2));
        assert_eq!(tf.postscript, Some("selectfont"));

        assert_eq!(lookup_operator("re").unwrap().arity, Some(4));
        assert_eq!(lookup_operator("\"").unwrap().arity, Some(3));
        assert_eq!(lookup_operator("scn").unwrap().arity, None);
        assert_eq!(lookup_operator("b*").unwrap().postscript, Some("closepath, eofill, stroke"));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        assert_ne!(lookup_operator("w"), lookup_operator("W"));
        assert!(lookup_operator("BDc").is_none());
        assert!(lookup_operator("xyz").is_none());
    }
}
