//! Canonical stream name resolution.
//!
//! A stream name is built from one or more "streamable" references: plain
//! strings, domain objects with a stable global identity, or arbitrarily
//! nested lists of either. Resolution is pure — the same references always
//! produce the same name, regardless of call site.

/// Separator between the parts of a canonical stream name.
const SEPARATOR: &str = ":";

/// A reference that resolves to a stable, globally unique identity string,
/// preferred over its plain display form when building stream names.
pub trait GlobalIdentity {
    fn to_global_param(&self) -> String;
}

/// One or more streamable references, possibly nested.
///
/// Order is significant: `["boards", "posts"]` and `["posts", "boards"]`
/// name different streams.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamTarget {
    Part(String),
    Many(Vec<StreamTarget>),
}

impl StreamTarget {
    /// Target naming a streamable by its global identity.
    pub fn of<T: GlobalIdentity + ?Sized>(streamable: &T) -> Self {
        StreamTarget::Part(streamable.to_global_param())
    }

    /// Resolve to the canonical stream name.
    ///
    /// Nested lists flatten fully, blank parts are dropped, survivors join
    /// with `:` in order. Nothing surviving resolves to the empty string —
    /// a valid but useless stream, allowed through by policy.
    pub fn resolve(&self) -> String {
        let mut parts = Vec::new();
        self.collect(&mut parts);
        parts.join(SEPARATOR)
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            StreamTarget::Part(part) => {
                if !part.trim().is_empty() {
                    out.push(part);
                }
            }
            StreamTarget::Many(items) => {
                for item in items {
                    item.collect(out);
                }
            }
        }
    }
}

/// Resolve any streamable shape to its canonical stream name.
pub fn stream_name_from(target: impl Into<StreamTarget>) -> String {
    target.into().resolve()
}

impl From<&str> for StreamTarget {
    fn from(part: &str) -> Self {
        StreamTarget::Part(part.to_string())
    }
}

impl From<String> for StreamTarget {
    fn from(part: String) -> Self {
        StreamTarget::Part(part)
    }
}

impl<T: Into<StreamTarget>> From<Option<T>> for StreamTarget {
    fn from(part: Option<T>) -> Self {
        match part {
            Some(part) => part.into(),
            None => StreamTarget::Many(Vec::new()),
        }
    }
}

impl<T: Into<StreamTarget>> From<Vec<T>> for StreamTarget {
    fn from(parts: Vec<T>) -> Self {
        StreamTarget::Many(parts.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<StreamTarget>, const N: usize> From<[T; N]> for StreamTarget {
    fn from(parts: [T; N]) -> Self {
        StreamTarget::Many(parts.into_iter().map(Into::into).collect())
    }
}
