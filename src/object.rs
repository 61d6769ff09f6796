//! PDF object types.
//!
//! The object graph is a tree of direct values whose only cross-links are
//! [`Object::Reference`] handles. A reference stores just the target id; the
//! live value is owned by the [`CrossRefTable`](crate::table::CrossRefTable).

use crate::error::{Error, Result};
use bytes::Bytes;
use indexmap::IndexMap;

/// A PDF dictionary: name keys in insertion order.
pub type Dictionary = IndexMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array)
    String(Vec<u8>),
    /// Name (without the leading /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dictionary),
    /// Stream (dictionary + raw, still filter-encoded data)
    Stream {
        /// Stream dictionary
        dict: Dictionary,
        /// Stream data
        data: Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Identifier of an indirect object.
///
/// Ordering compares the object number first, then the generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl Object {
    /// Create a name object.
    pub fn name(name: impl Into<String>) -> Self {
        Object::Name(name.into())
    }

    /// Create a string object from bytes.
    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Object::String(bytes.into())
    }

    /// Create a stream object. `/Length` is set from the data.
    pub fn stream(mut dict: Dictionary, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
        Object::Stream { dict, data }
    }

    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integer or real, widened to `f64`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Mutable dictionary access. Works for both Dictionary and Stream objects.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to real number.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Raw stream payload, if this is a stream.
    pub fn stream_data(&self) -> Option<&Bytes> {
        match self {
            Object::Stream { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Check if this is a stream object.
    pub fn is_stream(&self) -> bool {
        matches!(self, Object::Stream { .. })
    }

    /// `/Type` of a dictionary or stream.
    pub fn dict_type(&self) -> Option<&str> {
        self.as_dict()?.get("Type")?.as_name()
    }

    /// Call `f` for every reference contained directly or nested in this object.
    ///
    /// Does not follow the references themselves.
    pub fn for_each_reference(&self, f: &mut dyn FnMut(ObjectRef)) {
        match self {
            Object::Reference(r) => f(*r),
            Object::Array(arr) => {
                for item in arr {
                    item.for_each_reference(f);
                }
            },
            Object::Dictionary(dict) | Object::Stream { dict, .. } => {
                for value in dict.values() {
                    value.for_each_reference(f);
                }
            },
            _ => {},
        }
    }

    /// Rewrite every nested reference through `map`. References for which
    /// `map` returns `None` are left untouched.
    pub fn rewrite_references(&mut self, map: &dyn Fn(ObjectRef) -> Option<ObjectRef>) {
        match self {
            Object::Reference(r) => {
                if let Some(new_ref) = map(*r) {
                    *r = new_ref;
                }
            },
            Object::Array(arr) => {
                for item in arr.iter_mut() {
                    item.rewrite_references(map);
                }
            },
            Object::Dictionary(dict) | Object::Stream { dict, .. } => {
                for value in dict.values_mut() {
                    value.rewrite_references(map);
                }
            },
            _ => {},
        }
    }

    /// Decode stream data using the filters named in the stream dictionary.
    ///
    /// Decryption, if any, must already have been applied by the reader.
    pub fn decode_stream_data(&self) -> Result<Vec<u8>> {
        self.decode_stream_data_with_limit(crate::filters::MAX_DECOMPRESSED_SIZE)
    }

    /// Decode stream data, failing once output exceeds `max_output` bytes.
    pub fn decode_stream_data_with_limit(&self, max_output: usize) -> Result<Vec<u8>> {
        match self {
            Object::Stream { dict, data } => {
                let filters = dict.get("Filter").map(filter_names).unwrap_or_default();
                if filters.is_empty() {
                    return Ok(data.to_vec());
                }

                let params = decode_params(dict.get("DecodeParms"), filters.len());
                log::debug!("Decoding stream through {:?}", filters);
                crate::filters::decode_with_filters(data, &filters, &params, max_output)
            },
            _ => Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: self.type_name().to_string(),
            }),
        }
    }
}

/// Extract filter names from a Filter object.
///
/// The Filter entry can be either a single Name or an Array of Names.
pub fn filter_names(filter_obj: &Object) -> Vec<String> {
    match filter_obj {
        Object::Name(name) => vec![name.clone()],
        Object::Array(arr) => arr
            .iter()
            .filter_map(|obj| obj.as_name().map(|s| s.to_string()))
            .collect(),
        _ => vec![],
    }
}

/// Per-filter decode parameters aligned with the filter list.
///
/// `/DecodeParms` is either one dictionary (for a single filter) or an array
/// with one entry per filter, where `null` means "no parameters".
pub fn decode_params(params_obj: Option<&Object>, filter_count: usize) -> Vec<Option<Dictionary>> {
    let mut params = match params_obj {
        Some(Object::Dictionary(d)) => vec![Some(d.clone())],
        Some(Object::Array(arr)) => arr.iter().map(|obj| obj.as_dict().cloned()).collect(),
        _ => Vec::new(),
    };
    params.resize(filter_count, None);
    params
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Boolean(value)
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Object::Integer(value)
    }
}

impl From<i32> for Object {
    fn from(value: i32) -> Self {
        Object::Integer(value as i64)
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Object::Real(value)
    }
}

impl From<ObjectRef> for Object {
    fn from(value: ObjectRef) -> Self {
        Object::Reference(value)
    }
}

impl From<Vec<Object>> for Object {
    fn from(value: Vec<Object>) -> Self {
        Object::Array(value)
    }
}

impl From<Dictionary> for Object {
    fn from(value: Dictionary) -> Self {
        Object::Dictionary(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref_ordering() {
        let mut refs = vec![
            ObjectRef::new(3, 0),
            ObjectRef::new(1, 2),
            ObjectRef::new(1, 0),
            ObjectRef::new(2, 5),
        ];
        refs.sort();
        assert_eq!(
            refs,
            vec![
                ObjectRef::new(1, 0),
                ObjectRef::new(1, 2),
                ObjectRef::new(2, 5),
                ObjectRef::new(3, 0),
            ]
        );
    }

    #[test]
    fn test_object_ref_display() {
        assert_eq!(ObjectRef::new(12, 0).to_string(), "12 0 R");
    }

    #[test]
    fn test_dictionary_keeps_insertion_order() {
        let mut dict = Dictionary::new();
        dict.insert("Zeta".to_string(), Object::Integer(1));
        dict.insert("Alpha".to_string(), Object::Integer(2));
        let keys: Vec<&str> = dict.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn test_stream_constructor_sets_length() {
        let obj = Object::stream(Dictionary::new(), b"hello".to_vec());
        assert_eq!(obj.as_dict().unwrap().get("Length"), Some(&Object::Integer(5)));
        assert!(obj.is_stream());
    }

    #[test]
    fn test_for_each_reference_walks_nested_values() {
        let mut inner = Dictionary::new();
        inner.insert("P".to_string(), Object::Reference(ObjectRef::new(4, 0)));
        let mut dict = Dictionary::new();
        dict.insert(
            "Kids".to_string(),
            Object::Array(vec![
                Object::Reference(ObjectRef::new(2, 0)),
                Object::Dictionary(inner),
            ]),
        );
        dict.insert("Count".to_string(), Object::Integer(1));

        let mut seen = Vec::new();
        Object::Dictionary(dict).for_each_reference(&mut |r| seen.push(r));
        assert_eq!(seen, vec![ObjectRef::new(2, 0), ObjectRef::new(4, 0)]);
    }

    #[test]
    fn test_rewrite_references() {
        let mut obj = Object::Array(vec![
            Object::Reference(ObjectRef::new(5, 0)),
            Object::Reference(ObjectRef::new(9, 0)),
        ]);
        obj.rewrite_references(&|r| (r.id == 5).then(|| ObjectRef::new(1, 0)));
        assert_eq!(
            obj,
            Object::Array(vec![
                Object::Reference(ObjectRef::new(1, 0)),
                Object::Reference(ObjectRef::new(9, 0)),
            ])
        );
    }

    #[test]
    fn test_decode_params_alignment() {
        let mut flate_params = Dictionary::new();
        flate_params.insert("Predictor".to_string(), Object::Integer(12));
        let params = decode_params(
            Some(&Object::Array(vec![Object::Null, Object::Dictionary(flate_params)])),
            2,
        );
        assert_eq!(params.len(), 2);
        assert!(params[0].is_none());
        assert!(params[1].is_some());

        assert_eq!(decode_params(None, 3), vec![None, None, None]);
    }

    #[test]
    fn test_decode_unfiltered_stream() {
        let obj = Object::stream(Dictionary::new(), b"raw".to_vec());
        assert_eq!(obj.decode_stream_data().unwrap(), b"raw");
    }

    #[test]
    fn test_decode_non_stream_is_type_error() {
        let err = Object::Integer(1).decode_stream_data().unwrap_err();
        assert!(matches!(err, Error::InvalidObjectType { .. }));
    }
}
