//! Flag evaluation: the allocation→rule→split→shard pipeline.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::assignment::{Assignment, AssignmentValue};
use crate::assignment_logger::AssignmentEvent;
use crate::configuration::Configuration;
use crate::error::{EvaluationError, EvaluationFailure};
use crate::eval_details::{
    AllocationEvaluationCode, AllocationEvaluationDetails, EvaluationDetails,
    EvaluationResultWithDetails, FlagEvaluationCode,
};
use crate::obfuscation::{decode_base64_str, str_obf_to_plain};
use crate::sharder::get_md5_shard;
use crate::ufc::{Allocation, Flag, Rule, Shard, Split, Timestamp, VariationType};
use crate::value::{Attributes, Value};

/// Evaluate the specified feature flag for the given subject and return the assigned variation
/// and an optional assignment event for logging.
pub(crate) fn get_assignment(
    configuration: Option<&Configuration>,
    flag_key: &str,
    subject_key: &str,
    subject_attributes: &Attributes,
    expected_type: Option<VariationType>,
    now: DateTime<Utc>,
) -> Result<Option<Assignment>, EvaluationError> {
    let eval = eval_flag(
        configuration,
        flag_key,
        subject_key,
        subject_attributes,
        expected_type,
        now,
    );

    match eval.result {
        Ok(assignment) => {
            log::trace!(target: "eppo",
                        flag_key,
                        subject_key,
                        assignment:serde = assignment.value;
                        "evaluated a flag");
            Ok(Some(assignment))
        }

        Err(EvaluationFailure::ConfigurationMissing) => {
            log::warn!(target: "eppo",
                       flag_key,
                       subject_key;
                       "evaluating a flag before Eppo configuration has been fetched");
            Ok(None)
        }

        Err(EvaluationFailure::Error(err)) => {
            log::warn!(target: "eppo",
                       flag_key,
                       subject_key;
                       "error occurred while evaluating a flag: {err}");
            Err(err)
        }

        // Non-Error failures are considered normal conditions and usually don't need extra
        // attention, so we remap them to Ok(None) before returning to the user.
        Err(err) => {
            log::trace!(target: "eppo",
                        flag_key,
                        subject_key;
                        "returning default assignment because of: {err}");
            Ok(None)
        }
    }
}

/// Evaluate the specified feature flag for the given subject and return evaluation details along
/// with an optional assignment event.
pub(crate) fn get_assignment_details(
    configuration: Option<&Configuration>,
    flag_key: &str,
    subject_key: &str,
    subject_attributes: &Attributes,
    expected_type: Option<VariationType>,
    now: DateTime<Utc>,
) -> (
    EvaluationResultWithDetails<Option<AssignmentValue>>,
    Option<AssignmentEvent>,
) {
    let eval = eval_flag(
        configuration,
        flag_key,
        subject_key,
        subject_attributes,
        expected_type,
        now,
    );

    let flag_evaluation_code = match &eval.result {
        Ok(_) => FlagEvaluationCode::Match,
        Err(failure) => failure.into(),
    };
    let flag_evaluation_description = evaluation_description(flag_key, subject_key, &eval);

    let (variation, event) = match eval.result {
        Ok(Assignment { value, event }) => (Some(value), event),
        Err(_) => (None, None),
    };

    let details = EvaluationDetails {
        flag_key: flag_key.to_owned(),
        subject_key: subject_key.to_owned(),
        subject_attributes: subject_attributes.clone(),
        timestamp: now,
        config_fetched_at: configuration.map(|it| it.fetched_at),
        config_published_at: configuration.map(|it| it.published_at()),
        environment_name: configuration.map(|it| it.environment_name().to_owned()),
        flag_evaluation_code,
        flag_evaluation_description,
        variation_key: eval.variation_key,
        variation_value: eval.variation_value,
        matched_rule: eval.matched_rule,
        allocations: eval.allocations,
    };

    (
        EvaluationResultWithDetails {
            variation,
            evaluation_details: details,
        },
        event,
    )
}

/// Raw outcome of a single flag evaluation, before remapping for the public surface.
struct FlagEval {
    result: Result<Assignment, EvaluationFailure>,
    /// Key of the selected variation (plain form), if any allocation matched.
    variation_key: Option<String>,
    /// Configured value of the selected variation (plain form where decodable).
    variation_value: Option<Value>,
    /// First passing rule of the matched allocation.
    matched_rule: Option<Rule>,
    allocations: Vec<AllocationEvaluationDetails>,
}

impl FlagEval {
    fn failure(failure: EvaluationFailure) -> FlagEval {
        FlagEval {
            result: Err(failure),
            variation_key: None,
            variation_value: None,
            matched_rule: None,
            allocations: Vec::new(),
        }
    }
}

fn eval_flag(
    configuration: Option<&Configuration>,
    flag_key: &str,
    subject_key: &str,
    subject_attributes: &Attributes,
    expected_type: Option<VariationType>,
    now: DateTime<Utc>,
) -> FlagEval {
    let Some(configuration) = configuration else {
        return FlagEval::failure(EvaluationFailure::ConfigurationMissing);
    };

    let Some(flag) = configuration.get_flag(flag_key) else {
        return FlagEval::failure(EvaluationFailure::FlagUnrecognizedOrDisabled);
    };
    let Some(flag) = Option::<&Flag>::from(flag) else {
        // The flag is present but failed to parse (e.g., a newer server format).
        return FlagEval::failure(EvaluationError::UnexpectedConfigurationError.into());
    };

    if !flag.enabled {
        return FlagEval::failure(EvaluationFailure::FlagUnrecognizedOrDisabled);
    }

    if let Some(expected_type) = expected_type {
        if flag.variation_type != expected_type {
            return FlagEval::failure(
                EvaluationError::TypeMismatch {
                    expected: expected_type,
                    found: flag.variation_type,
                }
                .into(),
            );
        }
    }

    let obfuscated = configuration.obfuscated;

    // Augmenting subject_attributes with id, so that subject_key can be used in the rules.
    let augmented_subject_attributes = {
        let mut sa = subject_attributes.clone();
        sa.entry("id".into()).or_insert_with(|| subject_key.into());
        sa
    };

    let mut allocations = Vec::with_capacity(flag.allocations.len());
    let mut matched: Option<Matched> = None;

    for (i, allocation) in flag.allocations.iter().enumerate() {
        let allocation_key = if obfuscated {
            str_obf_to_plain(&allocation.key)
        } else {
            allocation.key.clone()
        };

        let code = if matched.is_some() {
            AllocationEvaluationCode::Unevaluated
        } else {
            match allocation.get_matching_split(
                subject_key,
                &augmented_subject_attributes,
                flag.total_shards,
                obfuscated,
                now,
            ) {
                Ok((split, rule)) => {
                    matched = Some(Matched {
                        allocation,
                        allocation_key: allocation_key.clone(),
                        split,
                        rule: rule.cloned(),
                    });
                    AllocationEvaluationCode::Match
                }
                Err(code) => code,
            }
        };

        allocations.push(AllocationEvaluationDetails {
            key: allocation_key,
            order_position: i + 1,
            allocation_evaluation_code: code,
        });
    }

    let Some(matched) = matched else {
        return FlagEval {
            result: Err(EvaluationFailure::DefaultAllocationNull),
            variation_key: None,
            variation_value: None,
            matched_rule: None,
            allocations,
        };
    };

    let Some(variation) = flag.variations.get(&matched.split.variation_key) else {
        log::warn!(target: "eppo",
                   flag_key,
                   subject_key,
                   variation_key:display = matched.split.variation_key;
                   "internal: unable to find variation");
        return FlagEval {
            result: Err(EvaluationError::UnexpectedConfigurationError.into()),
            variation_key: None,
            variation_value: None,
            matched_rule: matched.rule,
            allocations,
        };
    };

    let variation_key = if obfuscated {
        str_obf_to_plain(&variation.key)
    } else {
        variation.key.clone()
    };

    let Some(value) = to_assignment_value(&variation.value, flag.variation_type, obfuscated)
    else {
        log::warn!(target: "eppo",
                   flag_key,
                   subject_key,
                   variation_key:display = variation_key;
                   "variation value is incompatible with the flag type");
        return FlagEval {
            result: Err(EvaluationError::AssignmentError {
                variation_key: variation_key.clone(),
                value: variation.value.clone(),
            }
            .into()),
            variation_key: Some(variation_key),
            variation_value: Some(variation.value.clone()),
            matched_rule: matched.rule,
            allocations,
        };
    };

    let event = matched.allocation.do_log.then(|| AssignmentEvent {
        feature_flag: flag_key.to_owned(),
        allocation: matched.allocation_key.clone(),
        experiment: format!("{}-{}", flag_key, matched.allocation_key),
        variation: variation_key.clone(),
        subject: subject_key.to_owned(),
        subject_attributes: subject_attributes.clone(),
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        entity_id: matched.allocation.entity_id.or(flag.entity_id),
        meta_data: HashMap::from([
            ("sdkLanguage".to_owned(), "rust".to_owned()),
            (
                "sdkVersion".to_owned(),
                env!("CARGO_PKG_VERSION").to_owned(),
            ),
        ]),
        extra_logging: translate_extra_logging(&matched.split.extra_logging, obfuscated),
    });

    FlagEval {
        result: Ok(Assignment { value, event }),
        variation_key: Some(variation_key),
        variation_value: Some(decode_variation_value(&variation.value, obfuscated)),
        matched_rule: matched.rule,
        allocations,
    }
}

struct Matched<'a> {
    allocation: &'a Allocation,
    allocation_key: String,
    split: &'a Split,
    rule: Option<Rule>,
}

impl Allocation {
    /// Find the split matching the subject, or the reason why the allocation does not apply.
    ///
    /// Also returns the first passing rule for tracing.
    fn get_matching_split(
        &self,
        subject_key: &str,
        augmented_subject_attributes: &Attributes,
        total_shards: u64,
        obfuscated: bool,
        now: Timestamp,
    ) -> Result<(&Split, Option<&Rule>), AllocationEvaluationCode> {
        if self.start_at.is_some_and(|t| now < t) {
            return Err(AllocationEvaluationCode::BeforeStart);
        }
        if self.end_at.is_some_and(|t| now > t) {
            return Err(AllocationEvaluationCode::AfterEnd);
        }

        let matched_rule = if self.rules.is_empty() {
            None
        } else {
            let rule = self
                .rules
                .iter()
                .find(|rule| rule.eval(augmented_subject_attributes, obfuscated));
            match rule {
                Some(rule) => Some(rule),
                None => return Err(AllocationEvaluationCode::FailingRule),
            }
        };

        self.splits
            .iter()
            .find(|split| split.matches(subject_key, total_shards, obfuscated))
            .map(|split| (split, matched_rule))
            .ok_or(AllocationEvaluationCode::Empty)
    }
}

impl Split {
    /// Return `true` if `subject_key` matches the given split.
    ///
    /// To match a split, the subject must match all underlying shards.
    fn matches(&self, subject_key: &str, total_shards: u64, obfuscated: bool) -> bool {
        self.shards
            .iter()
            .all(|shard| shard.matches(subject_key, total_shards, obfuscated))
    }
}

impl Shard {
    /// Return `true` if `subject_key` matches the given shard.
    fn matches(&self, subject_key: &str, total_shards: u64, obfuscated: bool) -> bool {
        if total_shards == 0 {
            return false;
        }
        let h = if obfuscated {
            let salt = str_obf_to_plain(&self.salt);
            get_md5_shard(&[salt.as_str(), subject_key], total_shards)
        } else {
            get_md5_shard(&[self.salt.as_str(), subject_key], total_shards)
        };
        self.ranges.iter().any(|range| range.contains(h))
    }
}

/// Interpret a configured variation value against the flag-level type, decoding the obfuscated
/// form first where applicable. Returns `None` if the value is incompatible with the type.
fn to_assignment_value(
    value: &Value,
    ty: VariationType,
    obfuscated: bool,
) -> Option<AssignmentValue> {
    if obfuscated {
        // Obfuscated documents store every variation value as base64 of its string form.
        let s = decode_base64_str(value.as_str()?)?;
        return Some(match ty {
            VariationType::String => AssignmentValue::String(s),
            VariationType::Integer => {
                let f: f64 = s.parse().ok()?;
                let i = f as i64;
                if i as f64 != f {
                    return None;
                }
                AssignmentValue::Integer(i)
            }
            VariationType::Numeric => AssignmentValue::Numeric(s.parse().ok()?),
            VariationType::Boolean => match s.as_str() {
                "true" => AssignmentValue::Boolean(true),
                "false" => AssignmentValue::Boolean(false),
                _ => return None,
            },
            VariationType::Json => AssignmentValue::Json(serde_json::from_str(&s).ok()?),
        });
    }

    Some(match ty {
        VariationType::String => AssignmentValue::String(value.as_str()?.to_owned()),
        VariationType::Integer => AssignmentValue::Integer(value.as_integer()?),
        VariationType::Numeric => AssignmentValue::Numeric(value.as_number()?),
        VariationType::Boolean => AssignmentValue::Boolean(value.as_boolean()?),
        VariationType::Json => AssignmentValue::Json(serde_json::from_str(value.as_str()?).ok()?),
    })
}

/// Plain form of a configured variation value, for evaluation details.
fn decode_variation_value(value: &Value, obfuscated: bool) -> Value {
    if obfuscated {
        if let Some(s) = value.as_str() {
            return Value::String(str_obf_to_plain(s));
        }
    }
    value.clone()
}

/// Best-effort translation of obfuscated extraLogging entries. An entry that fails to decode is
/// kept in its original form.
fn translate_extra_logging(
    extra_logging: &HashMap<String, String>,
    obfuscated: bool,
) -> HashMap<String, String> {
    if !obfuscated {
        return extra_logging.clone();
    }
    extra_logging
        .iter()
        .map(|(k, v)| (str_obf_to_plain(k), str_obf_to_plain(v)))
        .collect()
}

fn evaluation_description(flag_key: &str, subject_key: &str, eval: &FlagEval) -> String {
    match &eval.result {
        Ok(_) => {
            let variation_key = eval.variation_key.as_deref().unwrap_or_default();
            let matched_allocation = eval
                .allocations
                .iter()
                .find(|it| it.allocation_evaluation_code == AllocationEvaluationCode::Match);
            let allocation_key = matched_allocation.map(|it| it.key.as_str()).unwrap_or_default();
            if eval.matched_rule.is_some() {
                format!(
                    "Supplied attributes match rules defined in allocation {allocation_key:?} \
                     and {subject_key} belongs to the range of traffic assigned to \
                     {variation_key:?}."
                )
            } else {
                format!(
                    "{subject_key} belongs to the range of traffic assigned to {variation_key:?} \
                     defined in allocation {allocation_key:?}."
                )
            }
        }
        Err(EvaluationFailure::Error(EvaluationError::TypeMismatch { expected, found })) => {
            format!(
                "Variation value does not have the correct type. Found: {found:?} != {expected:?} \
                 for flag {flag_key}"
            )
        }
        Err(EvaluationFailure::Error(EvaluationError::AssignmentError {
            variation_key, ..
        })) => {
            format!(
                "Variation ({variation_key}) is configured for flag {flag_key}, but its value is \
                 incompatible with the flag type"
            )
        }
        Err(EvaluationFailure::Error(EvaluationError::UnexpectedConfigurationError)) => {
            "Configuration error. This might indicate that you're using an outdated version of \
             Eppo SDK"
                .to_owned()
        }
        Err(EvaluationFailure::ConfigurationMissing) => {
            "Configuration has not been fetched yet".to_owned()
        }
        Err(EvaluationFailure::FlagUnrecognizedOrDisabled) => {
            format!("Unrecognized or disabled flag: {flag_key}")
        }
        Err(EvaluationFailure::DefaultAllocationNull) => {
            "No allocations matched. Falling back to \"Default Allocation\", serving NULL"
                .to_owned()
        }
    }
}
