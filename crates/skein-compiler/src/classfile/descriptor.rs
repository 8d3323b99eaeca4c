//! Field and method descriptor parsing.
//!
//! Only the stack shape matters to the emitter, so the narrow integral types
//! all collapse into [`FieldType::Integer`].

use thiserror::Error;

/// A descriptor could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed descriptor '{descriptor}': {reason}")]
pub struct DescriptorError {
    /// The descriptor text.
    pub descriptor: String,
    /// What is wrong with it.
    pub reason: &'static str,
}

/// Stack shape of one field or parameter type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `Z`, `B`, `C`, `S`, `I`
    Integer,
    /// `F`
    Float,
    /// `J`
    Long,
    /// `D`
    Double,
    /// Class internal name, or the full descriptor for arrays.
    Reference(String),
}

/// A parsed method descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Parameter types in order.
    pub params: Vec<FieldType>,
    /// Return type, `None` for `V`.
    pub ret: Option<FieldType>,
}

impl MethodDescriptor {
    /// Parse a method descriptor such as `(ILjava/lang/String;)V`.
    pub fn parse(descriptor: &str) -> Result<Self, DescriptorError> {
        let fail = |reason| DescriptorError {
            descriptor: descriptor.to_string(),
            reason,
        };
        let rest = descriptor
            .strip_prefix('(')
            .ok_or_else(|| fail("expected '('"))?;
        let close = rest.find(')').ok_or_else(|| fail("missing ')'"))?;
        let (mut params_text, ret_text) = (&rest[..close], &rest[close + 1..]);

        let mut params = Vec::new();
        while !params_text.is_empty() {
            let (field, remaining) = parse_one(params_text).map_err(fail)?;
            params.push(field);
            params_text = remaining;
        }

        let ret = if ret_text == "V" {
            None
        } else {
            let (field, remaining) = parse_one(ret_text).map_err(fail)?;
            if !remaining.is_empty() {
                return Err(fail("trailing characters after return type"));
            }
            Some(field)
        };
        Ok(Self { params, ret })
    }

    /// Total parameter slots, counting `long` and `double` twice.
    pub fn param_slots(&self) -> usize {
        self.params
            .iter()
            .map(|p| match p {
                FieldType::Long | FieldType::Double => 2,
                _ => 1,
            })
            .sum()
    }
}

/// Parse a single field descriptor such as `Ljava/io/PrintStream;`.
pub fn parse_field(descriptor: &str) -> Result<FieldType, DescriptorError> {
    let fail = |reason| DescriptorError {
        descriptor: descriptor.to_string(),
        reason,
    };
    let (field, remaining) = parse_one(descriptor).map_err(fail)?;
    if !remaining.is_empty() {
        return Err(fail("trailing characters"));
    }
    Ok(field)
}

fn parse_one(text: &str) -> Result<(FieldType, &str), &'static str> {
    let first = text.chars().next().ok_or("unexpected end")?;
    let rest = &text[first.len_utf8()..];
    match first {
        'Z' | 'B' | 'C' | 'S' | 'I' => Ok((FieldType::Integer, rest)),
        'F' => Ok((FieldType::Float, rest)),
        'J' => Ok((FieldType::Long, rest)),
        'D' => Ok((FieldType::Double, rest)),
        'L' => {
            let end = rest.find(';').ok_or("unterminated class name")?;
            if end == 0 {
                return Err("empty class name");
            }
            Ok((FieldType::Reference(rest[..end].to_string()), &rest[end + 1..]))
        }
        '[' => {
            let dims = text.len() - text.trim_start_matches('[').len();
            let (_, remaining) = parse_one(&text[dims..])?;
            let consumed = text.len() - remaining.len();
            Ok((FieldType::Reference(text[..consumed].to_string()), remaining))
        }
        _ => Err("unknown type character"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_runtime_call() {
        let desc = MethodDescriptor::parse("(Lst/core/PrimObject;ILst/core/PrimContext;)V").unwrap();
        assert_eq!(
            desc.params,
            vec![
                FieldType::Reference("st/core/PrimObject".into()),
                FieldType::Integer,
                FieldType::Reference("st/core/PrimContext".into()),
            ]
        );
        assert_eq!(desc.ret, None);
    }

    #[test]
    fn parse_arrays_and_wide_types() {
        let desc = MethodDescriptor::parse("([[IJD)[Ljava/lang/String;").unwrap();
        assert_eq!(desc.params[0], FieldType::Reference("[[I".into()));
        assert_eq!(desc.param_slots(), 5);
        assert_eq!(desc.ret, Some(FieldType::Reference("[Ljava/lang/String;".into())));
    }

    #[test]
    fn reject_malformed() {
        assert!(MethodDescriptor::parse("I)V").is_err());
        assert!(MethodDescriptor::parse("(Ljava/lang/String)V").is_err());
        assert!(MethodDescriptor::parse("(Q)V").is_err());
        assert!(MethodDescriptor::parse("()").is_err());
        assert!(MethodDescriptor::parse("()VV").is_err());
    }

    #[test]
    fn parse_single_field() {
        assert_eq!(
            parse_field("Ljava/io/PrintStream;").unwrap(),
            FieldType::Reference("java/io/PrintStream".into())
        );
        let err = parse_field("L;").unwrap_err();
        assert_eq!(err.reason, "empty class name");
    }
}
