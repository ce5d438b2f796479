use dimodel_core::config::DesignRuleMode;
use dimodel_core::DesignViolation;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Warn { warnings: Vec<String> },
    Deny { reason_code: &'static str, user_message: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub mode: DesignRuleMode,
}

impl GuardrailPolicy {
    pub fn new(mode: DesignRuleMode) -> Self {
        Self { mode }
    }

    pub fn advisory() -> Self {
        Self::new(DesignRuleMode::Advisory)
    }

    pub fn evaluate(&self, violations: &[DesignViolation]) -> GuardrailDecision {
        let Some(first) = violations.first() else {
            return GuardrailDecision::Allow;
        };

        match self.mode {
            DesignRuleMode::Advisory => GuardrailDecision::Warn {
                warnings: violations.iter().map(ToString::to_string).collect(),
            },
            DesignRuleMode::Strict => GuardrailDecision::Deny {
                reason_code: first.rule.code(),
                user_message: format!(
                    "Table rejected by the dimensional design rules: {}. \
                     Call dimensional_design_principles and resubmit the table.",
                    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
                ),
            },
        }
    }
}
