//! Content stream serialization.

use super::parser::{ContentObject, Operation};
use crate::object::Object;
use crate::writer::ObjectSerializer;

/// Writes content objects back to stream bytes, one operation per line.
#[derive(Debug)]
pub struct ContentWriter {
    out: Vec<u8>,
    serializer: ObjectSerializer,
}

impl Default for ContentWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self {
            out: Vec::new(),
            serializer: ObjectSerializer::compact(),
        }
    }

    /// Append one operation.
    pub fn write_operation(&mut self, op: &Operation) -> &mut Self {
        for operand in &op.operands {
            self.write_operand(operand);
            self.out.push(b' ');
        }
        self.out.extend_from_slice(op.name.as_bytes());
        self.out.push(b'\n');
        self
    }

    /// Append a sequence; bare operands go on their own line.
    pub fn write_all(&mut self, objects: &[ContentObject]) -> &mut Self {
        for obj in objects {
            match obj {
                ContentObject::Operator(op) => {
                    self.write_operation(op);
                },
                operand => {
                    self.write_operand(operand);
                    self.out.push(b'\n');
                },
            }
        }
        self
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.out
    }

    /// Consume the writer.
    pub fn finish(self) -> Vec<u8> {
        self.out
    }

    fn write_operand(&mut self, obj: &ContentObject) {
        let scalar = match obj {
            ContentObject::Integer(i) => Object::Integer(*i),
            ContentObject::Real(r) => Object::Real(*r),
            ContentObject::String(s) => Object::String(s.clone()),
            ContentObject::Name(n) => Object::Name(n.clone()),
            ContentObject::Boolean(b) => Object::Boolean(*b),
            ContentObject::Null => Object::Null,
            ContentObject::Dictionary(blob) => {
                self.out.extend_from_slice(blob.as_bytes());
                return;
            },
            ContentObject::Array(items) => {
                self.out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push(b' ');
                    }
                    self.write_operand(item);
                }
                self.out.push(b']');
                return;
            },
            ContentObject::Operator(op) => {
                // Not a valid operand; keep the keyword so nothing is lost.
                self.out.extend_from_slice(op.name.as_bytes());
                return;
            },
        };
        self.serializer.write_object(&mut self.out, &scalar);
    }
}

/// Serialize a parsed sequence.
pub fn write_content(objects: &[ContentObject]) -> Vec<u8> {
    let mut writer = ContentWriter::new();
    writer.write_all(objects);
    writer.finish()
}
