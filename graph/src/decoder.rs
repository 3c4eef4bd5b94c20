use std::str::FromStr;

/// The type of one `:`-separated attribute of a node row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Int,
    Float,
    String,
}

impl FromStr for AttrType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "string" => Ok(Self::String),
            other => Err(format!("unknown attribute type '{other}'")),
        }
    }
}

/// Describes how to read the columns of a graph table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoder {
    attr_types: Vec<AttrType>,
    weighted: bool,
}

/// The decoded attributes of a node row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attrs {
    pub features: Vec<f32>,
    pub strings: Vec<String>,
}

impl Decoder {
    /// Creates a `Decoder` for node tables with the given attribute layout.
    ///
    /// # Arguments
    /// * `attr_types` - One entry per `:`-separated attribute.
    pub fn new(attr_types: Vec<AttrType>) -> Self {
        Self {
            attr_types,
            weighted: false,
        }
    }

    /// Creates a `Decoder` for edge tables with a weight column.
    pub fn weighted() -> Self {
        Self {
            attr_types: Vec::new(),
            weighted: true,
        }
    }

    pub fn is_weighted(&self) -> bool {
        self.weighted
    }

    /// The length of the feature vector produced by `decode_attrs`.
    ///
    /// Int and float attributes become features, strings are kept aside.
    pub fn feature_dim(&self) -> usize {
        self.attr_types
            .iter()
            .filter(|t| !matches!(t, AttrType::String))
            .count()
    }

    /// Decodes the attribute column of a node row.
    ///
    /// # Arguments
    /// * `column` - The raw `:`-joined attributes.
    ///
    /// # Returns
    /// The decoded attributes or a description of the first malformed one.
    pub fn decode_attrs(&self, column: &str) -> Result<Attrs, String> {
        let mut attrs = Attrs::default();

        if self.attr_types.is_empty() {
            return Ok(attrs);
        }

        let values: Vec<&str> = column.split(':').collect();
        if values.len() != self.attr_types.len() {
            return Err(format!(
                "expected {} attributes, got {}",
                self.attr_types.len(),
                values.len()
            ));
        }

        for (ty, value) in self.attr_types.iter().zip(values) {
            match ty {
                AttrType::Int => {
                    let v: i64 = value
                        .trim()
                        .parse()
                        .map_err(|e| format!("bad int attribute '{value}': {e}"))?;
                    attrs.features.push(v as f32);
                }
                AttrType::Float => {
                    let v: f32 = value
                        .trim()
                        .parse()
                        .map_err(|e| format!("bad float attribute '{value}': {e}"))?;
                    attrs.features.push(v);
                }
                AttrType::String => attrs.strings.push(value.to_string()),
            }
        }

        Ok(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_and_string_attributes() {
        let decoder = Decoder::new(vec![AttrType::Float, AttrType::Float, AttrType::String]);
        let attrs = decoder.decode_attrs("0.5:1.5:alice").unwrap();

        assert_eq!(decoder.feature_dim(), 2);
        assert_eq!(attrs.features, [0.5, 1.5]);
        assert_eq!(attrs.strings, ["alice"]);
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let decoder = Decoder::new(vec![AttrType::Float, AttrType::Int]);
        assert!(decoder.decode_attrs("0.5").is_err());
        assert!(decoder.decode_attrs("0.5:x").is_err());
    }

    #[test]
    fn attr_type_names() {
        assert_eq!("float".parse::<AttrType>(), Ok(AttrType::Float));
        assert!("double".parse::<AttrType>().is_err());
    }
}
