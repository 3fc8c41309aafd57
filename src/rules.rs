use regex::Regex;
use semver::Version;

use crate::obfuscation::{decode_base64_str, md5_hex};
use crate::ufc::{Condition, ConditionOperator, Rule};
use crate::value::{Attributes, Value};

impl Rule {
    /// Returns `true` iff every condition passes. An empty rule passes vacuously.
    pub(crate) fn eval(&self, attributes: &Attributes, obfuscated: bool) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.eval(attributes, obfuscated))
    }
}

impl Condition {
    fn eval(&self, attributes: &Attributes, obfuscated: bool) -> bool {
        self.operator
            .eval(attributes.get(&self.attribute), &self.value, obfuscated)
    }
}

impl ConditionOperator {
    /// Applying `Operator` to the values. Returns `false` if the operator cannot be applied or
    /// there's a misconfiguration.
    pub(crate) fn eval(
        &self,
        attribute: Option<&Value>,
        condition_value: &Value,
        obfuscated: bool,
    ) -> bool {
        self.try_eval(attribute, condition_value, obfuscated)
            .unwrap_or(false)
    }

    /// Try applying `Operator` to the values, returning `None` if the operator cannot be applied.
    ///
    /// In obfuscated mode, membership lists hold MD5 hashes, regexes are matched against the
    /// MD5-hex of the attribute, and ordering/null-check literals are base64-encoded.
    fn try_eval(
        &self,
        attribute: Option<&Value>,
        condition_value: &Value,
        obfuscated: bool,
    ) -> Option<bool> {
        match self {
            Self::Matches | Self::NotMatches => {
                let target = attribute?.to_display_string()?;
                let target = if obfuscated { md5_hex(&target) } else { target };
                let regex = Regex::new(condition_value.as_str()?).ok()?;
                let matches = regex.is_match(&target);
                Some(if matches!(self, Self::Matches) {
                    matches
                } else {
                    !matches
                })
            }

            Self::OneOf | Self::NotOneOf => {
                let s = attribute?.to_display_string()?;
                let s = if obfuscated { md5_hex(&s) } else { s };
                let values = condition_value.as_string_array()?;
                let is_one_of = values.iter().any(|v| v == &s);
                let has_to_be_one_of = *self == Self::OneOf;
                Some(is_one_of == has_to_be_one_of)
            }

            Self::IsNull => {
                let is_null = attribute.is_none() || attribute.is_some_and(Value::is_null);
                let expected_null = match condition_value {
                    Value::Boolean(b) => *b,
                    Value::String(s) if obfuscated => {
                        match decode_base64_str(s)?.as_str() {
                            "true" => true,
                            "false" => false,
                            _ => return None,
                        }
                    }
                    _ => return None,
                };
                Some(is_null == expected_null)
            }

            Self::Gte | Self::Gt | Self::Lte | Self::Lt => {
                let condition_operand = match condition_value {
                    Value::Number(n) => OrderingOperand::Number(*n),
                    Value::String(s) if obfuscated => {
                        OrderingOperand::Text(decode_base64_str(s)?)
                    }
                    Value::String(s) => OrderingOperand::Text(s.clone()),
                    _ => return None,
                };

                // Numeric comparison when both sides coerce to numbers.
                let condition_number = match &condition_operand {
                    OrderingOperand::Number(n) => Some(*n),
                    OrderingOperand::Text(s) => s.parse().ok(),
                };
                let attribute_number = match attribute {
                    Some(Value::Number(n)) => Some(*n),
                    Some(Value::String(s)) => s.parse().ok(),
                    _ => None,
                };
                if let (Some(attribute_number), Some(condition_number)) =
                    (attribute_number, condition_number)
                {
                    return Some(self.compare(attribute_number, condition_number));
                }

                // Fall back to semantic-version comparison.
                let condition_version = match &condition_operand {
                    OrderingOperand::Text(s) => Version::parse(s).ok()?,
                    OrderingOperand::Number(_) => return None,
                };
                let attribute_version = match attribute {
                    Some(Value::String(s)) => Version::parse(s).ok()?,
                    _ => return None,
                };
                Some(self.compare(attribute_version, condition_version))
            }
        }
    }

    fn compare<T: PartialOrd>(&self, attribute: T, condition: T) -> bool {
        match self {
            Self::Gt => attribute > condition,
            Self::Gte => attribute >= condition,
            Self::Lt => attribute < condition,
            Self::Lte => attribute <= condition,
            _ => false,
        }
    }
}

enum OrderingOperand {
    Number(f64),
    Text(String),
}
