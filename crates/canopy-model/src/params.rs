//! The four tunable hyperparameters and their mapping onto a forest config.

use std::fmt;

use canopy_rf::{ClassWeight, MaxFeatures, RandomForestConfig, SplitCriterion};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Named feature-subsampling rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeaturesRule {
    Sqrt,
    Log2,
}

/// `max_features` as written in JSON: an integer count, a float fraction,
/// or one of the strings `"sqrt"` / `"log2"`.
///
/// JSON integers deserialize as [`MaxFeaturesParam::Count`] and JSON floats
/// (including `1.0`) as [`MaxFeaturesParam::Fraction`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxFeaturesParam {
    Count(usize),
    Fraction(f64),
    Rule(MaxFeaturesRule),
}

impl MaxFeaturesParam {
    /// Zero counts and zero fractions read as "unset".
    #[must_use]
    pub fn is_zero(self) -> bool {
        match self {
            MaxFeaturesParam::Count(n) => n == 0,
            MaxFeaturesParam::Fraction(f) => f == 0.0,
            MaxFeaturesParam::Rule(_) => false,
        }
    }

    #[must_use]
    pub fn to_max_features(self) -> MaxFeatures {
        match self {
            MaxFeaturesParam::Count(n) => MaxFeatures::Fixed(n),
            MaxFeaturesParam::Fraction(f) => MaxFeatures::Fraction(f),
            MaxFeaturesParam::Rule(MaxFeaturesRule::Sqrt) => MaxFeatures::Sqrt,
            MaxFeaturesParam::Rule(MaxFeaturesRule::Log2) => MaxFeatures::Log2,
        }
    }
}

impl fmt::Display for MaxFeaturesParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxFeaturesParam::Count(n) => write!(f, "{n}"),
            MaxFeaturesParam::Fraction(x) => write!(f, "{x}"),
            MaxFeaturesParam::Rule(MaxFeaturesRule::Sqrt) => f.write_str("sqrt"),
            MaxFeaturesParam::Rule(MaxFeaturesRule::Log2) => f.write_str("log2"),
        }
    }
}

/// A hyperparameter set. Every key is optional until tuned.
///
/// Serializes with the keys `n_estimators`, `max_features`, `max_depth`,
/// `criterion`; unset keys are written as `null`, and absent keys read as
/// unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    #[serde(default)]
    pub n_estimators: Option<usize>,
    #[serde(default)]
    pub max_features: Option<MaxFeaturesParam>,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub criterion: Option<SplitCriterion>,
}

impl Hyperparameters {
    /// A fully specified set.
    #[must_use]
    pub fn new(
        n_estimators: usize,
        max_features: MaxFeaturesParam,
        max_depth: usize,
        criterion: SplitCriterion,
    ) -> Self {
        Self {
            n_estimators: Some(n_estimators),
            max_features: Some(max_features),
            max_depth: Some(max_depth),
            criterion: Some(criterion),
        }
    }

    /// Fixed set used in test mode: 100 trees, 10% of features, depth 4,
    /// entropy.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::new(
            100,
            MaxFeaturesParam::Fraction(0.1),
            4,
            SplitCriterion::Entropy,
        )
    }

    /// True when every key is set and non-zero.
    ///
    /// A zero tree count, zero depth or zero feature share counts as unset.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.n_estimators.is_some_and(|n| n > 0)
            && self.max_features.is_some_and(|m| !m.is_zero())
            && self.max_depth.is_some_and(|d| d > 0)
            && self.criterion.is_some()
    }

    /// Build a forest config from this set. An unset `max_depth` grows
    /// trees without a depth limit.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::IncompleteHyperparameters`] | a key other than `max_depth` is unset |
    /// | [`ModelError::Forest`] | `n_estimators` is zero |
    pub fn to_forest_config(
        &self,
        class_weight: ClassWeight,
        seed: u64,
    ) -> Result<RandomForestConfig, ModelError> {
        let n_estimators = self
            .n_estimators
            .ok_or(ModelError::IncompleteHyperparameters { missing: "n_estimators" })?;
        let max_features = self
            .max_features
            .ok_or(ModelError::IncompleteHyperparameters { missing: "max_features" })?;
        let criterion = self
            .criterion
            .ok_or(ModelError::IncompleteHyperparameters { missing: "criterion" })?;

        Ok(RandomForestConfig::new(n_estimators)?
            .with_max_features(max_features.to_max_features())
            .with_max_depth(self.max_depth)
            .with_criterion(criterion)
            .with_class_weight(class_weight)
            .with_seed(seed))
    }
}

impl fmt::Display for Hyperparameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show<T: fmt::Display>(value: Option<T>) -> String {
            value.map_or_else(|| "unset".to_string(), |v| v.to_string())
        }
        write!(
            f,
            "n_estimators={} max_features={} max_depth={} criterion={}",
            show(self.n_estimators),
            show(self.max_features),
            show(self.max_depth),
            show(self.criterion),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_features_json_forms() {
        let parsed: Vec<MaxFeaturesParam> =
            serde_json::from_str(r#"[3, 0.25, 1.0, "sqrt", "log2"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                MaxFeaturesParam::Count(3),
                MaxFeaturesParam::Fraction(0.25),
                MaxFeaturesParam::Fraction(1.0),
                MaxFeaturesParam::Rule(MaxFeaturesRule::Sqrt),
                MaxFeaturesParam::Rule(MaxFeaturesRule::Log2),
            ]
        );
        assert!(serde_json::from_str::<MaxFeaturesParam>(r#""auto""#).is_err());
    }

    #[test]
    fn unset_keys_serialize_as_null() {
        let json = serde_json::to_string(&Hyperparameters::default()).unwrap();
        assert_eq!(
            json,
            r#"{"n_estimators":null,"max_features":null,"max_depth":null,"criterion":null}"#
        );
    }

    #[test]
    fn absent_keys_read_as_unset() {
        let params: Hyperparameters = serde_json::from_str(r#"{"n_estimators": 50}"#).unwrap();
        assert_eq!(params.n_estimators, Some(50));
        assert!(params.max_depth.is_none());
        assert!(!params.is_complete());
    }

    #[test]
    fn placeholder_is_complete() {
        let p = Hyperparameters::placeholder();
        assert!(p.is_complete());
        assert_eq!(p.max_features, Some(MaxFeaturesParam::Fraction(0.1)));
        assert_eq!(p.criterion, Some(SplitCriterion::Entropy));
    }

    #[test]
    fn zero_values_count_as_unset() {
        let base = Hyperparameters::placeholder();
        for params in [
            Hyperparameters { n_estimators: Some(0), ..base.clone() },
            Hyperparameters { max_depth: Some(0), ..base.clone() },
            Hyperparameters { max_features: Some(MaxFeaturesParam::Fraction(0.0)), ..base.clone() },
            Hyperparameters { max_features: Some(MaxFeaturesParam::Count(0)), ..base.clone() },
            Hyperparameters { criterion: None, ..base },
        ] {
            assert!(!params.is_complete(), "{params} should be incomplete");
        }
    }

    #[test]
    fn forest_config_carries_values() {
        let params = Hyperparameters::new(
            12,
            MaxFeaturesParam::Rule(MaxFeaturesRule::Log2),
            6,
            SplitCriterion::Gini,
        );
        let config = params.to_forest_config(ClassWeight::Balanced, 9).unwrap();
        assert_eq!(config.n_trees(), 12);
        assert_eq!(config.max_features(), MaxFeatures::Log2);
        assert_eq!(config.max_depth(), Some(6));
        assert_eq!(config.criterion(), SplitCriterion::Gini);
        assert_eq!(config.class_weight(), ClassWeight::Balanced);
        assert_eq!(config.seed(), 9);
    }

    #[test]
    fn forest_config_requires_keys() {
        let params = Hyperparameters {
            criterion: None,
            ..Hyperparameters::placeholder()
        };
        assert!(matches!(
            params.to_forest_config(ClassWeight::Uniform, 0),
            Err(ModelError::IncompleteHyperparameters { missing: "criterion" })
        ));
    }

    #[test]
    fn unset_depth_is_unbounded() {
        let params = Hyperparameters {
            max_depth: None,
            ..Hyperparameters::placeholder()
        };
        assert!(!params.is_complete());
        let config = params.to_forest_config(ClassWeight::Balanced, 0).unwrap();
        assert_eq!(config.max_depth(), None);
    }
}
