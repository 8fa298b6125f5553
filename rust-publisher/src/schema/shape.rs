//! Declarative object shapes and the walker that checks JSON against them.
//!
//! A shape lists the declared fields of one object level. Keys that are not
//! declared are ignored by the walker, so unknown provider fields never cause
//! a rejection. Every violation found is collected; the walk does not stop at
//! the first one.

use std::fmt;

use serde_json::Value;

/// Expected kind of a declared field.
#[derive(Debug, Clone, Copy)]
pub enum Kind {
    String,
    Number,
    Boolean,
    /// A string restricted to the listed values.
    Enum(&'static [&'static str]),
    Object(&'static ObjectShape),
    /// An array whose every element must match the object shape.
    ObjectArray(&'static ObjectShape),
}

impl Kind {
    fn expected(&self) -> &'static str {
        match self {
            Kind::String | Kind::Enum(_) => "string",
            Kind::Number => "number",
            Kind::Boolean => "boolean",
            Kind::Object(_) => "object",
            Kind::ObjectArray(_) => "array",
        }
    }
}

/// One declared field of an object shape.
#[derive(Debug, Clone, Copy)]
pub struct FieldShape {
    pub name: &'static str,
    pub kind: Kind,
    pub required: bool,
}

/// Declared field, must be present.
pub const fn required(name: &'static str, kind: Kind) -> FieldShape {
    FieldShape {
        name,
        kind,
        required: true,
    }
}

/// Declared field, may be absent (but not `null`).
pub const fn optional(name: &'static str, kind: Kind) -> FieldShape {
    FieldShape {
        name,
        kind,
        required: false,
    }
}

/// The declared fields of one object level.
#[derive(Debug)]
pub struct ObjectShape {
    pub name: &'static str,
    pub fields: &'static [FieldShape],
}

impl ObjectShape {
    /// Check `value` against this shape, collecting every violation.
    pub fn check(&'static self, value: &Value) -> Result<(), Vec<Violation>> {
        let mut walker = Walker::default();
        walker.check_kind(&Kind::Object(self), Some(value));

        if walker.violations.is_empty() {
            Ok(())
        } else {
            Err(walker.violations)
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldShape> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One step of a path into the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(&'static str),
    Index(usize),
}

/// Location of a violation. The empty path is the payload root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                PathSegment::Key(key) => f.write_str(key)?,
                PathSegment::Index(index) => write!(f, "{}", index)?,
            }
        }
        Ok(())
    }
}

/// Nature of a violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// A required field is absent.
    Required,
    InvalidType {
        expected: &'static str,
        received: &'static str,
    },
    InvalidEnumValue {
        options: &'static [&'static str],
        received: String,
    },
    /// The body could not be parsed as JSON at all.
    Unparseable(String),
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Required => f.write_str("Required"),
            ViolationKind::InvalidType { expected, received } => {
                write!(f, "Expected {}, received {}", expected, received)
            }
            ViolationKind::InvalidEnumValue { options, received } => {
                let options = options
                    .iter()
                    .map(|o| format!("'{}'", o))
                    .collect::<Vec<_>>()
                    .join(" | ");
                write!(
                    f,
                    "Invalid enum value. Expected {}, received '{}'",
                    options, received
                )
            }
            ViolationKind::Unparseable(reason) => write!(f, "Invalid JSON: {}", reason),
        }
    }
}

/// A single failed constraint at a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: FieldPath,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(path: FieldPath, kind: ViolationKind) -> Self {
        Self { path, kind }
    }

    /// Machine-readable code for the violation kind.
    pub fn code(&self) -> &'static str {
        match self.kind {
            ViolationKind::Required => "required",
            ViolationKind::InvalidType { .. } => "invalid_type",
            ViolationKind::InvalidEnumValue { .. } => "invalid_enum_value",
            ViolationKind::Unparseable(_) => "invalid_json",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.path, self.kind)
        }
    }
}

/// JSON type name as reported in violations.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Default)]
struct Walker {
    path: Vec<PathSegment>,
    violations: Vec<Violation>,
}

impl Walker {
    fn report(&mut self, kind: ViolationKind) {
        self.violations
            .push(Violation::new(FieldPath(self.path.clone()), kind));
    }

    fn check_kind(&mut self, kind: &Kind, value: Option<&Value>) {
        let value = match value {
            Some(v) => v,
            None => return self.report(ViolationKind::Required),
        };

        match (kind, value) {
            (Kind::String, Value::String(_))
            | (Kind::Number, Value::Number(_))
            | (Kind::Boolean, Value::Bool(_)) => {}
            (Kind::Enum(options), Value::String(s)) => {
                if !options.contains(&s.as_str()) {
                    self.report(ViolationKind::InvalidEnumValue {
                        options: *options,
                        received: s.clone(),
                    });
                }
            }
            (Kind::Object(shape), Value::Object(_)) => self.check_object(*shape, value),
            (Kind::ObjectArray(shape), Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    self.path.push(PathSegment::Index(index));
                    self.check_kind(&Kind::Object(*shape), Some(item));
                    self.path.pop();
                }
            }
            (kind, value) => self.report(ViolationKind::InvalidType {
                expected: kind.expected(),
                received: json_type_name(value),
            }),
        }
    }

    fn check_object(&mut self, shape: &'static ObjectShape, value: &Value) {
        for field in shape.fields {
            self.path.push(PathSegment::Key(field.name));
            match value.get(field.name) {
                None if !field.required => {}
                found => self.check_kind(&field.kind, found),
            }
            self.path.pop();
        }
    }
}
